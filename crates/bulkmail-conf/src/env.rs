//! Environment variable handling
//!
//! Typed readers over a key lookup. The lookup is the process environment in
//! production and a plain map in tests, so nothing below touches global state
//! directly.

use std::collections::HashMap;
use std::path::PathBuf;

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable reader with typed accessors
pub struct Env {
	lookup: Lookup,
}

impl Env {
	/// Read from the process environment
	pub fn from_process() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Read through an arbitrary lookup function
	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String> + Send + Sync + 'static,
	{
		Self {
			lookup: Box::new(lookup),
		}
	}

	/// Read from an in-memory map
	///
	/// # Examples
	///
	/// ```
	/// use bulkmail_conf::Env;
	/// use std::collections::HashMap;
	///
	/// let mut vars = HashMap::new();
	/// vars.insert("SMTP_PORT".to_string(), "465".to_string());
	///
	/// let env = Env::from_map(vars);
	/// assert_eq!(env.u64_with_default("SMTP_PORT", 587).unwrap(), 465);
	/// ```
	pub fn from_map(vars: HashMap<String, String>) -> Self {
		Self::from_lookup(move |key| vars.get(key).cloned())
	}

	/// Read an optional value. Blank values count as unset.
	pub fn optional(&self, key: &str) -> Option<String> {
		(self.lookup)(key).filter(|value| !value.trim().is_empty())
	}

	/// Read a required string value
	pub fn str(&self, key: &str) -> Result<String, EnvError> {
		self.optional(key)
			.ok_or_else(|| EnvError::MissingVariable(key.to_string()))
	}

	/// Read a string value with a default
	pub fn str_with_default(&self, key: &str, default: &str) -> String {
		self.optional(key).unwrap_or_else(|| default.to_string())
	}

	/// Read a boolean value with a default
	pub fn bool_with_default(&self, key: &str, default: bool) -> Result<bool, EnvError> {
		match self.optional(key) {
			Some(val) => parse_bool(&val).map_err(|error| EnvError::ParseError {
				key: key.to_string(),
				value_len: val.len(),
				error,
			}),
			None => Ok(default),
		}
	}

	/// Read an unsigned integer value with a default
	pub fn u64_with_default(&self, key: &str, default: u64) -> Result<u64, EnvError> {
		match self.optional(key) {
			Some(val) => val.trim().parse::<u64>().map_err(|e| EnvError::ParseError {
				key: key.to_string(),
				value_len: val.len(),
				error: e.to_string(),
			}),
			None => Ok(default),
		}
	}

	/// Read a path value with a default
	pub fn path_with_default(&self, key: &str, default: &str) -> PathBuf {
		PathBuf::from(self.str_with_default(key, default))
	}
}

/// Parse a boolean from common textual spellings
///
/// # Examples
///
/// ```
/// use bulkmail_conf::parse_bool;
///
/// assert_eq!(parse_bool("yes"), Ok(true));
/// assert_eq!(parse_bool("OFF"), Ok(false));
/// assert!(parse_bool("maybe").is_err());
/// ```
pub fn parse_bool(value: &str) -> Result<bool, String> {
	match value.trim().to_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Ok(true),
		"false" | "0" | "no" | "off" => Ok(false),
		_ => Err("expected one of true/false/1/0/yes/no/on/off".to_string()),
	}
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
	#[error("Missing environment variable: {0}")]
	MissingVariable(String),

	#[error("Failed to parse environment variable '{key}' (value length: {value_len}): {error}")]
	ParseError {
		key: String,
		/// Length of the original value (stored instead of the raw value to prevent secret leakage)
		value_len: usize,
		error: String,
	},
}

//! Settings for the SMTP channel and campaign runs

use crate::env::{Env, EnvError};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

/// Outbound SMTP channel settings
///
/// Mirrors the knobs of a pooled SMTP transport: endpoint, credentials,
/// TLS mode, timeouts and pool sizing.
#[derive(Debug)]
pub struct SmtpSettings {
	pub host: String,
	pub port: u16,
	pub username: Option<String>,
	pub password: Option<SecretString>,
	/// Sender address. Defaults to the SMTP username.
	pub from_email: String,
	/// Implicit TLS on connect (port 465 style)
	pub secure: bool,
	/// Refuse to continue without STARTTLS when `secure` is off
	pub require_tls: bool,
	pub pool: bool,
	pub max_connections: u32,
	/// Messages sent through one pooled transport before it is recycled
	pub max_messages: u32,
	pub connection_timeout: Duration,
	pub greeting_timeout: Duration,
	pub socket_timeout: Duration,
}

impl Default for SmtpSettings {
	fn default() -> Self {
		Self {
			host: "smtp.gmail.com".to_string(),
			port: 587,
			username: None,
			password: None,
			from_email: String::new(),
			secure: false,
			require_tls: true,
			pool: true,
			max_connections: 5,
			max_messages: 100,
			connection_timeout: Duration::from_millis(30_000),
			greeting_timeout: Duration::from_millis(30_000),
			socket_timeout: Duration::from_millis(30_000),
		}
	}
}

/// Campaign tuning: retries, pacing, templates and upload staging
#[derive(Debug, Clone)]
pub struct CampaignSettings {
	/// Additional attempts after the first failed send
	pub max_retries: u32,
	pub retry_delay: Duration,
	pub retry_max_delay: Duration,
	/// Pause between two consecutive rows
	pub send_interval: Duration,
	/// Subject template (`{name}` syntax). `None` uses the built-in one.
	pub subject: Option<String>,
	/// Plain-text body template (`{name}` syntax). `None` uses the built-in one.
	pub body: Option<String>,
	pub verify_connection: bool,
	pub skip_blank_recipients: bool,
	pub uploads_dir: PathBuf,
}

impl Default for CampaignSettings {
	fn default() -> Self {
		Self {
			max_retries: 2,
			retry_delay: Duration::from_millis(5_000),
			retry_max_delay: Duration::from_millis(30_000),
			send_interval: Duration::from_millis(1_500),
			subject: None,
			body: None,
			verify_connection: true,
			skip_blank_recipients: false,
			uploads_dir: PathBuf::from("uploads"),
		}
	}
}

/// Process-wide settings
#[derive(Debug, Default)]
pub struct Settings {
	pub smtp: SmtpSettings,
	pub campaign: CampaignSettings,
}

impl Settings {
	/// Load settings from the process environment
	///
	/// A `.env` file in the working directory (or a parent) is loaded first;
	/// variables already set in the environment win.
	pub fn from_env() -> Result<Self, SettingsError> {
		dotenv::dotenv().ok();
		Self::from_reader(&Env::from_process())
	}

	/// Load settings through an arbitrary key lookup
	///
	/// # Examples
	///
	/// ```
	/// use bulkmail_conf::Settings;
	///
	/// let settings = Settings::from_lookup(|key| match key {
	///     "SMTP_USER" => Some("mailer@example.com".to_string()),
	///     "SMTP_PASS" => Some("app-password".to_string()),
	///     _ => None,
	/// })
	/// .unwrap();
	///
	/// assert_eq!(settings.smtp.port, 587);
	/// assert_eq!(settings.smtp.from_email, "mailer@example.com");
	/// ```
	pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
	where
		F: Fn(&str) -> Option<String> + Send + Sync + 'static,
	{
		Self::from_reader(&Env::from_lookup(lookup))
	}

	fn from_reader(env: &Env) -> Result<Self, SettingsError> {
		let defaults = Settings::default();

		let username = env.optional("SMTP_USER");
		let from_email = env
			.optional("SMTP_FROM")
			.or_else(|| username.clone())
			.unwrap_or_default();

		let port = env.u64_with_default("SMTP_PORT", u64::from(defaults.smtp.port))?;
		let port = u16::try_from(port).map_err(|_| {
			SettingsError::ValidationError(format!("SMTP_PORT {} is out of range", port))
		})?;

		let smtp = SmtpSettings {
			host: env.str_with_default("SMTP_HOST", &defaults.smtp.host),
			port,
			username,
			password: env.optional("SMTP_PASS").map(SecretString::from),
			from_email,
			secure: env.bool_with_default("SMTP_SECURE", defaults.smtp.secure)?,
			require_tls: env.bool_with_default("SMTP_REQUIRE_TLS", defaults.smtp.require_tls)?,
			pool: env.bool_with_default("SMTP_POOL", defaults.smtp.pool)?,
			max_connections: read_u32(env, "SMTP_MAX_CONNECTIONS", defaults.smtp.max_connections)?,
			max_messages: read_u32(env, "SMTP_MAX_MESSAGES", defaults.smtp.max_messages)?,
			connection_timeout: read_millis(
				env,
				"SMTP_CONNECTION_TIMEOUT",
				defaults.smtp.connection_timeout,
			)?,
			greeting_timeout: read_millis(
				env,
				"SMTP_GREETING_TIMEOUT",
				defaults.smtp.greeting_timeout,
			)?,
			socket_timeout: read_millis(env, "SMTP_SOCKET_TIMEOUT", defaults.smtp.socket_timeout)?,
		};

		let campaign = CampaignSettings {
			max_retries: read_u32(env, "SMTP_RETRIES", defaults.campaign.max_retries)?,
			retry_delay: read_millis(env, "SMTP_RETRY_DELAY_MS", defaults.campaign.retry_delay)?,
			retry_max_delay: read_millis(
				env,
				"SMTP_RETRY_MAX_DELAY_MS",
				defaults.campaign.retry_max_delay,
			)?,
			send_interval: read_millis(
				env,
				"CAMPAIGN_SEND_INTERVAL_MS",
				defaults.campaign.send_interval,
			)?,
			subject: env.optional("CAMPAIGN_SUBJECT"),
			body: env.optional("CAMPAIGN_BODY"),
			verify_connection: env
				.bool_with_default("CAMPAIGN_VERIFY", defaults.campaign.verify_connection)?,
			skip_blank_recipients: env.bool_with_default(
				"CAMPAIGN_SKIP_BLANK_RECIPIENTS",
				defaults.campaign.skip_blank_recipients,
			)?,
			uploads_dir: env.path_with_default("UPLOADS_DIR", "uploads"),
		};

		Ok(Self { smtp, campaign })
	}

	/// Validate settings
	///
	/// Credentials are a startup precondition: a process without them must
	/// not start serving campaigns.
	pub fn validate(&self) -> Result<(), SettingsError> {
		let mut missing = Vec::new();
		if self.smtp.username.is_none() {
			missing.push("SMTP_USER");
		}
		if self.smtp.password.is_none() {
			missing.push("SMTP_PASS");
		}
		if !missing.is_empty() {
			return Err(SettingsError::MissingCredentials(missing.join(", ")));
		}

		if self.smtp.from_email.trim().is_empty() {
			return Err(SettingsError::ValidationError(
				"sender address must not be empty".to_string(),
			));
		}

		if self.smtp.pool && self.smtp.max_connections == 0 {
			return Err(SettingsError::ValidationError(
				"SMTP_MAX_CONNECTIONS must be at least 1".to_string(),
			));
		}

		if self.smtp.max_messages == 0 {
			return Err(SettingsError::ValidationError(
				"SMTP_MAX_MESSAGES must be at least 1".to_string(),
			));
		}

		Ok(())
	}
}

fn read_u32(env: &Env, key: &str, default: u32) -> Result<u32, SettingsError> {
	let value = env.u64_with_default(key, u64::from(default))?;
	u32::try_from(value)
		.map_err(|_| SettingsError::ValidationError(format!("{} {} is out of range", key, value)))
}

fn read_millis(env: &Env, key: &str, default: Duration) -> Result<Duration, SettingsError> {
	let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
	env.u64_with_default(key, default_ms)
		.map(Duration::from_millis)
		.map_err(SettingsError::from)
}

/// Settings error
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("SMTP credentials missing: {0} must be set in a .env file or environment")]
	MissingCredentials(String),

	#[error(transparent)]
	Env(#[from] EnvError),

	#[error("Validation error: {0}")]
	ValidationError(String),
}

//! Column role detection
//!
//! Uploads come from hand-made sheets, so the recipient, name and attachment
//! columns are found through alias lists instead of fixed header names.

use crate::row::Row;

/// Logical role a column can play in a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
	Email,
	Name,
	Attachment,
}

impl ColumnRole {
	/// Header aliases in priority order
	pub fn aliases(&self) -> &'static [&'static str] {
		match self {
			ColumnRole::Email => &["Email", "To"],
			ColumnRole::Name => &["Name", "Full Name", "FullName"],
			ColumnRole::Attachment => &["Attachment", "File", "FilePath", "Path", "File Path"],
		}
	}
}

/// Find the first column matching an alias
///
/// Aliases are tried in order; a column matches when its trimmed lower-case
/// form equals the alias's.
///
/// # Examples
///
/// ```
/// use bulkmail_tabular::find_column;
///
/// let columns = vec![" email ".to_string(), "To".to_string()];
/// assert_eq!(find_column(&columns, &["Email", "To"]), Some(" email "));
/// assert_eq!(find_column(&columns, &["Name"]), None);
/// ```
pub fn find_column<'a, S>(columns: &'a [S], aliases: &[&str]) -> Option<&'a str>
where
	S: AsRef<str>,
{
	aliases.iter().find_map(|alias| {
		let wanted = normalize(alias);
		columns
			.iter()
			.map(|column| column.as_ref())
			.find(|column| normalize(column) == wanted)
	})
}

fn normalize(value: &str) -> String {
	value.trim().to_lowercase()
}

/// Resolved role columns of one upload
///
/// Only the email column matters for delivery; a missing name or attachment
/// column just means empty names and no attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
	pub email: Option<String>,
	pub name: Option<String>,
	pub attachment: Option<String>,
}

impl ColumnMap {
	/// Resolve roles from a header
	pub fn resolve<S: AsRef<str>>(columns: &[S]) -> Self {
		let lookup = |role: ColumnRole| find_column(columns, role.aliases()).map(str::to_string);
		Self {
			email: lookup(ColumnRole::Email),
			name: lookup(ColumnRole::Name),
			attachment: lookup(ColumnRole::Attachment),
		}
	}

	/// Resolve roles from the first row's columns (all unresolved when empty)
	pub fn from_rows(rows: &[Row]) -> Self {
		let columns: Vec<&str> = rows.first().map(|row| row.columns().collect()).unwrap_or_default();
		Self::resolve(&columns)
	}

	pub fn column(&self, role: ColumnRole) -> Option<&str> {
		match role {
			ColumnRole::Email => self.email.as_deref(),
			ColumnRole::Name => self.name.as_deref(),
			ColumnRole::Attachment => self.attachment.as_deref(),
		}
	}

	/// Cell of `row` for `role`, empty when unresolved or blank
	pub fn value<'r>(&self, row: &'r Row, role: ColumnRole) -> &'r str {
		row.value_or_empty(self.column(role))
	}
}

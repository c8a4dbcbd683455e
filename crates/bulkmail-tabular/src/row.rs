use indexmap::IndexMap;

/// One record of an uploaded sheet, keyed by header name
///
/// Column order follows the header. Every row of one parse shares the same
/// keys; cells a source row did not provide are empty strings.
///
/// # Examples
///
/// ```
/// use bulkmail_tabular::Row;
///
/// let row = Row::from_pairs([("Name", "Ann"), ("Email", "ann@x.com")]);
/// assert_eq!(row.get("Email"), Some("ann@x.com"));
/// assert_eq!(row.columns().collect::<Vec<_>>(), vec!["Name", "Email"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
	cells: IndexMap<String, String>,
}

impl Row {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			cells: pairs
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}

	pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
		self.cells.insert(column.into(), value.into());
	}

	/// Cell value for an exact (case-preserved) column name
	pub fn get(&self, column: &str) -> Option<&str> {
		self.cells.get(column).map(String::as_str)
	}

	/// Cell value for an optional column, empty when either is missing
	pub fn value_or_empty(&self, column: Option<&str>) -> &str {
		column.and_then(|c| self.get(c)).unwrap_or("")
	}

	pub fn columns(&self) -> impl Iterator<Item = &str> {
		self.cells.keys().map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.cells.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	pub fn len(&self) -> usize {
		self.cells.len()
	}

	pub fn is_empty(&self) -> bool {
		self.cells.is_empty()
	}
}

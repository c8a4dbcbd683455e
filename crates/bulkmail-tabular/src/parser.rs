//! Upload parsing for delimited text and spreadsheet workbooks

use crate::row::Row;
use crate::{TabularError, TabularResult};
use calamine::{Reader, open_workbook_auto_from_rs};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

/// Upload format, sniffed from the declared file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
	/// Comma-separated values with a header line
	Csv,
	/// Any workbook calamine can open (xlsx, xlsm, xlsb, xls, ods)
	Spreadsheet,
}

impl TabularFormat {
	/// Detect format from a file name
	///
	/// Only `.csv` is treated as text; everything else goes to the workbook
	/// reader, which sniffs the actual container from the bytes.
	///
	/// # Examples
	///
	/// ```
	/// use bulkmail_tabular::TabularFormat;
	///
	/// assert_eq!(TabularFormat::from_filename("list.CSV"), TabularFormat::Csv);
	/// assert_eq!(TabularFormat::from_filename("list.xlsx"), TabularFormat::Spreadsheet);
	/// assert_eq!(TabularFormat::from_filename("noext"), TabularFormat::Spreadsheet);
	/// ```
	pub fn from_filename(filename: &str) -> Self {
		let is_csv = Path::new(filename)
			.extension()
			.and_then(|ext| ext.to_str())
			.is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
		if is_csv {
			TabularFormat::Csv
		} else {
			TabularFormat::Spreadsheet
		}
	}
}

/// Parse an upload into rows
///
/// # Examples
///
/// ```
/// use bulkmail_tabular::{parse, TabularFormat};
///
/// let rows = parse(b"Name,Email\nAnn,ann@x.com\n\nBo,bo@x.com\n", TabularFormat::Csv).unwrap();
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[1].get("Name"), Some("Bo"));
/// ```
pub fn parse(data: &[u8], format: TabularFormat) -> TabularResult<Vec<Row>> {
	match format {
		TabularFormat::Csv => parse_csv(data),
		TabularFormat::Spreadsheet => parse_spreadsheet(data),
	}
}

/// Read an upload from disk and parse it
///
/// `original_name` is the name the file was uploaded under; the stored file
/// usually has a random name without extension.
pub fn read_file(path: &Path, original_name: &str) -> TabularResult<Vec<Row>> {
	let data = std::fs::read(path)?;
	parse(&data, TabularFormat::from_filename(original_name))
}

fn parse_csv(data: &[u8]) -> TabularResult<Vec<Row>> {
	// Strict column count; the csv reader already skips blank lines and a UTF-8 BOM
	let mut reader = ReaderBuilder::new()
		.has_headers(true)
		.flexible(false)
		.from_reader(Cursor::new(data));

	let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

	let mut rows = Vec::new();
	for record in reader.records() {
		let record = record?;
		let mut row = Row::new();
		for (header, value) in headers.iter().zip(record.iter()) {
			row.insert(header.clone(), value);
		}
		rows.push(row);
	}

	tracing::debug!(rows = rows.len(), columns = headers.len(), "parsed csv upload");
	Ok(rows)
}

fn parse_spreadsheet(data: &[u8]) -> TabularResult<Vec<Row>> {
	let mut workbook = open_workbook_auto_from_rs(Cursor::new(data.to_vec()))?;
	let range = workbook
		.worksheet_range_at(0)
		.ok_or(TabularError::NoWorksheet)??;

	let mut sheet_rows = range.rows();
	let Some(header_cells) = sheet_rows.next() else {
		return Ok(Vec::new());
	};
	let headers = header_names(header_cells.iter().map(|cell| cell.to_string()));

	let mut rows = Vec::new();
	for cells in sheet_rows {
		let values: Vec<String> = cells.iter().map(|cell| cell.to_string()).collect();
		if values.iter().all(|v| v.is_empty()) {
			continue;
		}

		let mut row = Row::new();
		for (index, header) in headers.iter().enumerate() {
			row.insert(header.clone(), values.get(index).cloned().unwrap_or_default());
		}
		rows.push(row);
	}

	tracing::debug!(rows = rows.len(), columns = headers.len(), "parsed spreadsheet upload");
	Ok(rows)
}

/// Name header cells, filling blanks with `__EMPTY` and suffixing duplicates
fn header_names(cells: impl Iterator<Item = String>) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut names = Vec::new();

	for cell in cells {
		let base = if cell.is_empty() {
			"__EMPTY".to_string()
		} else {
			cell
		};

		let mut name = base.clone();
		let mut suffix = 0;
		while seen.contains(&name) {
			suffix += 1;
			name = format!("{}_{}", base, suffix);
		}

		seen.insert(name.clone());
		names.push(name);
	}

	names
}

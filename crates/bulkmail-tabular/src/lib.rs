//! # bulkmail-tabular
//!
//! Turns an uploaded recipient list into rows and finds the columns that
//! matter for sending.
//!
//! ## Features
//!
//! - **CSV**: RFC 4180 parsing with a mandatory header line
//! - **Workbooks**: first sheet of xlsx/xls/xlsb/ods files, cells coerced to text
//! - **Column roles**: case- and whitespace-insensitive alias matching for the
//!   email, name and attachment columns
//!
//! ## Example
//!
//! ```
//! use bulkmail_tabular::{ColumnMap, TabularFormat, parse};
//!
//! let rows = parse(b"Full Name,To\nAnn,ann@x.com", TabularFormat::Csv).unwrap();
//! let columns = ColumnMap::from_rows(&rows);
//!
//! assert_eq!(columns.email.as_deref(), Some("To"));
//! assert_eq!(columns.name.as_deref(), Some("Full Name"));
//! assert_eq!(columns.attachment, None);
//! ```

pub mod columns;
pub mod parser;
pub mod row;

use thiserror::Error;

pub use columns::{ColumnMap, ColumnRole, find_column};
pub use parser::{TabularFormat, parse, read_file};
pub use row::Row;

#[derive(Debug, Error)]
pub enum TabularError {
	#[error("{0}")]
	Csv(#[from] csv::Error),

	#[error("{0}")]
	Spreadsheet(#[from] calamine::Error),

	#[error("workbook contains no worksheet")]
	NoWorksheet,

	#[error("{0}")]
	Io(#[from] std::io::Error),
}

pub type TabularResult<T> = std::result::Result<T, TabularError>;

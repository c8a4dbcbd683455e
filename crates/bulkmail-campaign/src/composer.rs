//! Per-row message composition
//!
//! The HTML part of each message comes from the first available source:
//! the pasted template, an `.html`/`.htm` file named in the attachment
//! column, or the plain-text body wrapped in `<pre>`. A non-HTML file in the
//! attachment column is attached instead, unless a pasted template is given.

use bulkmail_mail::{
	Attachment, EmailError, EmailMessage, EmailResult, TemplateContext, render_default,
	render_template, wrap_pre,
};
use bulkmail_tabular::{ColumnMap, ColumnRole, Row};
use std::path::{Path, PathBuf};

/// Bindings for one row: recipient fields first, then every column
pub fn row_context(row: &Row, name: &str, email: &str) -> TemplateContext {
	let mut context = TemplateContext::for_recipient(name, email);
	context.extend(row.iter());
	context
}

/// Where a message's HTML part came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlSource {
	Pasted,
	File(PathBuf),
	Default,
}

/// A composed message and the source of its HTML part
#[derive(Debug, Clone)]
pub struct Composed {
	pub message: EmailMessage,
	pub html_source: HtmlSource,
}

/// Builds one message per row from fixed campaign inputs
#[derive(Debug, Clone)]
pub struct Composer<'a> {
	from_email: &'a str,
	subject_template: &'a str,
	body_template: &'a str,
	pasted_template: Option<&'a str>,
	columns: &'a ColumnMap,
}

impl<'a> Composer<'a> {
	pub fn new(
		from_email: &'a str,
		subject_template: &'a str,
		body_template: &'a str,
		columns: &'a ColumnMap,
	) -> Self {
		Self {
			from_email,
			subject_template,
			body_template,
			pasted_template: None,
			columns,
		}
	}

	/// Use a pasted HTML template; blank input is ignored
	pub fn with_pasted_template(mut self, template: Option<&'a str>) -> Self {
		self.pasted_template = template.filter(|t| !t.trim().is_empty());
		self
	}

	pub fn recipient<'r>(&self, row: &'r Row) -> &'r str {
		self.columns.value(row, ColumnRole::Email)
	}

	pub async fn compose(&self, row: &Row) -> EmailResult<Composed> {
		let to = self.columns.value(row, ColumnRole::Email);
		let name = self.columns.value(row, ColumnRole::Name);
		let file_cell = self.columns.value(row, ColumnRole::Attachment);

		let body = render_default(self.body_template, name);
		let mut builder = EmailMessage::builder()
			.from(self.from_email)
			.to(to)
			.subject(render_default(self.subject_template, name))
			.body(body.clone());

		let html_source = if let Some(template) = self.pasted_template {
			builder = builder.html(render_template(template, &row_context(row, name, to)));
			HtmlSource::Pasted
		} else {
			match existing_file(file_cell).await {
				Some(path) if is_html(path) => {
					let template = read_html(path).await?;
					builder = builder.html(render_template(&template, &row_context(row, name, to)));
					HtmlSource::File(path.to_path_buf())
				}
				Some(path) => {
					builder = builder
						.attachment(Attachment::from_path(path))
						.html(wrap_pre(&body));
					HtmlSource::Default
				}
				None => {
					builder = builder.html(wrap_pre(&body));
					HtmlSource::Default
				}
			}
		};

		Ok(Composed {
			message: builder.build()?,
			html_source,
		})
	}
}

async fn existing_file(cell: &str) -> Option<&Path> {
	if cell.is_empty() {
		return None;
	}
	let path = Path::new(cell);
	match tokio::fs::metadata(path).await {
		Ok(metadata) if metadata.is_file() => Some(path),
		_ => None,
	}
}

fn is_html(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

async fn read_html(path: &Path) -> EmailResult<String> {
	let bytes = tokio::fs::read(path)
		.await
		.map_err(|e| EmailError::TemplateError(format!("{}: {}", path.display(), e)))?;
	String::from_utf8(bytes).map_err(|_| {
		EmailError::TemplateError(format!("{} is not valid UTF-8", path.display()))
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use bulkmail_mail::{DEFAULT_BODY, DEFAULT_SUBJECT};
	use rstest::rstest;
	use std::fs;

	fn columns_for(row: &Row) -> ColumnMap {
		ColumnMap::from_rows(std::slice::from_ref(row))
	}

	#[rstest]
	fn test_row_context_order() {
		// Arrange
		let row = Row::from_pairs([("Name", "Ann"), ("Email", "ann@x.com"), ("City", "")]);

		// Act
		let context = row_context(&row, "Ann", "ann@x.com");

		// Assert
		let keys: Vec<_> = context.iter().map(|(k, _)| k).collect();
		assert_eq!(keys, vec!["to_name", "email", "name", "Name", "Email", "City"]);
		assert_eq!(render_template("[{{City}}]", &context), "[]");
	}

	#[rstest]
	#[tokio::test]
	async fn test_default_html_wraps_body() {
		// Arrange
		let row = Row::from_pairs([("Name", "Ann"), ("Email", "ann@x.com")]);
		let columns = columns_for(&row);
		let composer = Composer::new("mailer@x.com", DEFAULT_SUBJECT, DEFAULT_BODY, &columns);

		// Act
		let composed = composer.compose(&row).await.unwrap();

		// Assert
		let message = composed.message;
		assert_eq!(composed.html_source, HtmlSource::Default);
		assert!(message.body().starts_with("Hi Ann,"));
		assert_eq!(message.html_body(), Some(wrap_pre(message.body()).as_str()));
		assert!(message.attachment().is_none());
	}

	#[rstest]
	#[tokio::test]
	async fn test_pasted_template_uses_columns() {
		// Arrange
		let row = Row::from_pairs([("Name", "Ann"), ("Email", "ann@x.com"), ("Plan", "Gold")]);
		let columns = columns_for(&row);
		let composer = Composer::new("mailer@x.com", DEFAULT_SUBJECT, DEFAULT_BODY, &columns)
			.with_pasted_template(Some("<p>{{to_name}} / {{email}} / {{Plan}}</p>"));

		// Act
		let composed = composer.compose(&row).await.unwrap();

		// Assert
		assert_eq!(composed.html_source, HtmlSource::Pasted);
		assert_eq!(
			composed.message.html_body(),
			Some("<p>Ann / ann@x.com / Gold</p>")
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_blank_pasted_template_is_ignored() {
		// Arrange
		let row = Row::from_pairs([("Name", "Ann"), ("Email", "ann@x.com")]);
		let columns = columns_for(&row);
		let composer = Composer::new("mailer@x.com", DEFAULT_SUBJECT, DEFAULT_BODY, &columns)
			.with_pasted_template(Some("  \n\t"));

		// Act
		let composed = composer.compose(&row).await.unwrap();

		// Assert
		assert_eq!(composed.html_source, HtmlSource::Default);
	}

	#[rstest]
	#[tokio::test]
	async fn test_missing_file_falls_back_to_default() {
		// Arrange
		let row = Row::from_pairs([
			("Name", "Ann"),
			("Email", "ann@x.com"),
			("File", "/definitely/not/here.pdf"),
		]);
		let columns = columns_for(&row);
		let composer = Composer::new("mailer@x.com", DEFAULT_SUBJECT, DEFAULT_BODY, &columns);

		// Act
		let composed = composer.compose(&row).await.unwrap();

		// Assert
		assert_eq!(composed.html_source, HtmlSource::Default);
		assert!(composed.message.attachment().is_none());
	}

	#[rstest]
	#[tokio::test]
	async fn test_directory_cell_is_not_an_attachment() {
		// Arrange
		let dir = tempfile::tempdir().unwrap();
		let row = Row::from_pairs([
			("Name", "Ann"),
			("Email", "ann@x.com"),
			("File", dir.path().to_str().unwrap()),
		]);
		let columns = columns_for(&row);
		let composer = Composer::new("mailer@x.com", DEFAULT_SUBJECT, DEFAULT_BODY, &columns);

		// Act
		let composed = composer.compose(&row).await.unwrap();

		// Assert
		assert_eq!(composed.html_source, HtmlSource::Default);
		assert!(composed.message.attachment().is_none());
	}

	#[rstest]
	#[tokio::test]
	async fn test_uppercase_htm_extension_is_html() {
		// Arrange
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("invite.HTM");
		fs::write(&path, "<b>{{name}}</b>").unwrap();
		let row = Row::from_pairs([
			("Name", "Bo"),
			("Email", "bo@x.com"),
			("Attachment", path.to_str().unwrap()),
		]);
		let columns = columns_for(&row);
		let composer = Composer::new("mailer@x.com", DEFAULT_SUBJECT, DEFAULT_BODY, &columns);

		// Act
		let composed = composer.compose(&row).await.unwrap();

		// Assert
		assert_eq!(composed.html_source, HtmlSource::File(path));
		assert_eq!(composed.message.html_body(), Some("<b>Bo</b>"));
		assert!(composed.message.attachment().is_none());
	}

	#[rstest]
	#[tokio::test]
	async fn test_non_utf8_html_file_is_template_error() {
		// Arrange
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("broken.html");
		fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
		let row = Row::from_pairs([("Email", "bo@x.com"), ("Path", path.to_str().unwrap())]);
		let columns = columns_for(&row);
		let composer = Composer::new("mailer@x.com", DEFAULT_SUBJECT, DEFAULT_BODY, &columns);

		// Act
		let result = composer.compose(&row).await;

		// Assert
		assert!(matches!(result, Err(EmailError::TemplateError(_))));
	}

	#[rstest]
	#[tokio::test]
	async fn test_subject_template_gets_name() {
		// Arrange
		let row = Row::from_pairs([("Full Name", "Cy"), ("To", "cy@x.com")]);
		let columns = columns_for(&row);
		let composer = Composer::new("mailer@x.com", "News for {name}", "Hello {name}", &columns);

		// Act
		let composed = composer.compose(&row).await.unwrap();

		// Assert
		assert_eq!(composed.message.subject(), "News for Cy");
		assert_eq!(composed.message.body(), "Hello Cy");
		assert_eq!(composed.message.to(), "cy@x.com");
	}
}

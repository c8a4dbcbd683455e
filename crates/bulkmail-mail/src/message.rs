use crate::{EmailError, EmailResult};
use std::path::{Path, PathBuf};

/// A file attached to a message by reference
///
/// Only the path is held; the bytes are read when the message is handed to a
/// transport, so a campaign never keeps every attachment in memory.
///
/// # Examples
///
/// ```
/// use bulkmail_mail::Attachment;
///
/// let attachment = Attachment::from_path("/srv/files/report.pdf");
/// assert_eq!(attachment.filename(), "report.pdf");
/// assert_eq!(attachment.mime_type(), "application/pdf");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
	path: PathBuf,
	/// File name presented to the recipient
	filename: String,
	mime_type: String,
}

impl Attachment {
	/// Reference a file on disk, named after its basename
	pub fn from_path(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let filename = path
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_else(|| "attachment".to_string());
		let mime_type = Self::detect_mime_type(&filename);

		Self {
			path,
			filename,
			mime_type,
		}
	}

	/// Set a custom MIME type
	pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
		self.mime_type = mime_type.into();
		self
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn filename(&self) -> &str {
		&self.filename
	}

	pub fn mime_type(&self) -> &str {
		&self.mime_type
	}

	/// Read the referenced file
	pub async fn read(&self) -> EmailResult<Vec<u8>> {
		tokio::fs::read(&self.path).await.map_err(|e| {
			EmailError::AttachmentError(format!("{}: {}", self.path.display(), e))
		})
	}

	fn detect_mime_type(filename: &str) -> String {
		mime_guess::from_path(filename)
			.first()
			.map(|mime| mime.to_string())
			.unwrap_or_else(|| "application/octet-stream".to_string())
	}
}

/// One outbound message
///
/// Fields are private; construct through [`EmailMessage::builder`]. The
/// recipient may be empty: address checks belong to the transport, which
/// reports a bad address as a delivery failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
	from_email: String,
	to: String,
	subject: String,
	body: String,
	html_body: Option<String>,
	attachment: Option<Attachment>,
}

impl EmailMessage {
	pub fn builder() -> EmailMessageBuilder {
		EmailMessageBuilder::default()
	}

	pub fn from_email(&self) -> &str {
		&self.from_email
	}

	/// Recipient address
	pub fn to(&self) -> &str {
		&self.to
	}

	pub fn subject(&self) -> &str {
		&self.subject
	}

	/// Plain-text body
	pub fn body(&self) -> &str {
		&self.body
	}

	pub fn html_body(&self) -> Option<&str> {
		self.html_body.as_deref()
	}

	pub fn attachment(&self) -> Option<&Attachment> {
		self.attachment.as_ref()
	}
}

#[derive(Debug, Default)]
pub struct EmailMessageBuilder {
	from_email: String,
	to: String,
	subject: String,
	body: String,
	html_body: Option<String>,
	attachment: Option<Attachment>,
}

impl EmailMessageBuilder {
	pub fn from(mut self, from: impl Into<String>) -> Self {
		self.from_email = from.into();
		self
	}

	pub fn to(mut self, to: impl Into<String>) -> Self {
		self.to = to.into();
		self
	}

	pub fn subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = subject.into();
		self
	}

	pub fn body(mut self, body: impl Into<String>) -> Self {
		self.body = body.into();
		self
	}

	pub fn html(mut self, html: impl Into<String>) -> Self {
		self.html_body = Some(html.into());
		self
	}

	pub fn attachment(mut self, attachment: Attachment) -> Self {
		self.attachment = Some(attachment);
		self
	}

	/// Build the message
	///
	/// Only the sender is mandatory; it is process-wide configuration, so an
	/// empty one is a programming error rather than bad row data.
	pub fn build(self) -> EmailResult<EmailMessage> {
		if self.from_email.trim().is_empty() {
			return Err(EmailError::MissingField("from_email".to_string()));
		}

		if self.subject.contains(['\r', '\n']) {
			return Err(EmailError::TemplateError(
				"subject must not contain line breaks".to_string(),
			));
		}

		Ok(EmailMessage {
			from_email: self.from_email,
			to: self.to,
			subject: self.subject,
			body: self.body,
			html_body: self.html_body,
			attachment: self.attachment,
		})
	}
}

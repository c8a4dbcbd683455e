//! # bulkmail-mail
//!
//! Message model, template rendering and delivery for bulkmail.
//!
//! ## Features
//!
//! - **EmailMessage**: one recipient, plain-text body, optional HTML
//!   alternative and an optional file attachment read at send time
//! - **Templates**: literal `{{key}}` substitution plus the single-brace
//!   `{name}` syntax of the built-in default text
//! - **Backends**: pooled SMTP through lettre, an in-memory backend for tests
//!   and a console backend for dry runs
//! - **Retry**: linear backoff with a ceiling, bounded attempt count
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use bulkmail_mail::{EmailMessage, RetryPolicy, SmtpBackend, SmtpConfig, SmtpSecurity, send_with_retry};
//!
//! let config = SmtpConfig::new("smtp.example.com", 587)
//!     .with_credentials("mailer@example.com", "app-password")
//!     .with_security(SmtpSecurity::StartTls);
//! let backend = SmtpBackend::new(config)?;
//!
//! let message = EmailMessage::builder()
//!     .from("mailer@example.com")
//!     .to("ann@example.com")
//!     .subject("Hello")
//!     .body("Hi Ann,")
//!     .build()?;
//!
//! let delivered = send_with_retry(&backend, &message, &RetryPolicy::default()).await?;
//! println!("sent after {} attempt(s)", delivered.attempts);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod message;
pub mod retry;
pub mod templates;

use thiserror::Error;

pub use backends::{
	ConsoleBackend, EmailBackend, MemoryBackend, SmtpBackend, SmtpConfig, SmtpSecurity,
};
pub use message::{Attachment, EmailMessage, EmailMessageBuilder};
pub use retry::{Delivered, DeliveryError, RetryPolicy, retry, send_with_retry};
pub use templates::{
	DEFAULT_BODY, DEFAULT_SUBJECT, TemplateContext, render_default, render_template, wrap_pre,
};

#[derive(Debug, Error)]
pub enum EmailError {
	#[error("Invalid email address: {0:?}")]
	InvalidAddress(String),

	#[error("Missing required field: {0}")]
	MissingField(String),

	#[error("Backend error: {0}")]
	BackendError(String),

	/// Transient SMTP failure (connection drop, 4xx reply, ...)
	#[error("SMTP error: {0}")]
	SmtpError(String),

	/// Permanent SMTP failure (5xx reply)
	#[error("SMTP rejected message: {0}")]
	Rejected(String),

	#[error("SMTP timeout: {0}")]
	Timeout(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Template error: {0}")]
	TemplateError(String),

	#[error("Attachment error: {0}")]
	AttachmentError(String),
}

impl EmailError {
	/// Whether sending the same message again could succeed
	///
	/// Malformed messages and permanent rejections fail the same way on
	/// every attempt.
	pub fn is_retryable(&self) -> bool {
		!matches!(
			self,
			EmailError::InvalidAddress(_)
				| EmailError::MissingField(_)
				| EmailError::BackendError(_)
				| EmailError::Rejected(_)
				| EmailError::TemplateError(_)
				| EmailError::AttachmentError(_)
		)
	}
}

pub type EmailResult<T> = std::result::Result<T, EmailError>;

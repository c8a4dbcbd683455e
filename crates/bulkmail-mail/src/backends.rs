//! Delivery backends
//!
//! [`SmtpBackend`] delivers through lettre's pooled async SMTP transport.
//! [`MemoryBackend`] keeps messages for assertions and [`ConsoleBackend`]
//! prints them, which is what a dry run uses.

use crate::message::EmailMessage;
use crate::{EmailError, EmailResult};
use async_trait::async_trait;
use bulkmail_conf::SmtpSettings;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::{AsyncSmtpTransportBuilder, PoolConfig};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;

type Transport = AsyncSmtpTransport<Tokio1Executor>;

/// A channel that can deliver messages
#[async_trait]
pub trait EmailBackend: Send + Sync {
	/// Deliver one message
	async fn send_message(&self, message: &EmailMessage) -> EmailResult<()>;

	/// Deliver messages one after another, stopping at the first failure
	///
	/// Returns the number of messages sent.
	async fn send_messages(&self, messages: &[EmailMessage]) -> EmailResult<usize> {
		for message in messages {
			self.send_message(message).await?;
		}
		Ok(messages.len())
	}

	/// Check that the channel is reachable and accepts the configured login
	async fn verify(&self) -> EmailResult<()> {
		Ok(())
	}
}

/// How the SMTP session is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
	/// Implicit TLS from the first byte (usually port 465)
	Tls,
	/// Plain connect followed by a mandatory STARTTLS upgrade
	StartTls,
	/// STARTTLS when the server offers it, plain text otherwise
	Opportunistic,
	/// No encryption
	None,
}

/// Immutable SMTP channel configuration
#[derive(Debug)]
pub struct SmtpConfig {
	pub host: String,
	pub port: u16,
	pub username: Option<String>,
	pub password: Option<SecretString>,
	pub security: SmtpSecurity,
	pub connection_timeout: Duration,
	pub greeting_timeout: Duration,
	/// Per-command IO timeout of an established session
	pub socket_timeout: Duration,
	pub pool: bool,
	pub max_connections: u32,
	/// Sends through one transport before it is replaced
	pub max_messages: u32,
}

impl SmtpConfig {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			username: None,
			password: None,
			security: SmtpSecurity::StartTls,
			connection_timeout: Duration::from_secs(30),
			greeting_timeout: Duration::from_secs(30),
			socket_timeout: Duration::from_secs(30),
			pool: true,
			max_connections: 5,
			max_messages: 100,
		}
	}

	/// Build the channel configuration from loaded settings
	///
	/// `secure` selects implicit TLS; otherwise `require_tls` chooses between
	/// mandatory and opportunistic STARTTLS.
	pub fn from_settings(settings: &SmtpSettings) -> Self {
		let security = if settings.secure {
			SmtpSecurity::Tls
		} else if settings.require_tls {
			SmtpSecurity::StartTls
		} else {
			SmtpSecurity::Opportunistic
		};

		Self {
			host: settings.host.clone(),
			port: settings.port,
			username: settings.username.clone(),
			password: settings
				.password
				.as_ref()
				.map(|password| SecretString::from(password.expose_secret().to_string())),
			security,
			connection_timeout: settings.connection_timeout,
			greeting_timeout: settings.greeting_timeout,
			socket_timeout: settings.socket_timeout,
			pool: settings.pool,
			max_connections: settings.max_connections,
			max_messages: settings.max_messages,
		}
	}

	pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
		self.username = Some(username.into());
		self.password = Some(SecretString::from(password.into()));
		self
	}

	pub fn with_security(mut self, security: SmtpSecurity) -> Self {
		self.security = security;
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.socket_timeout = timeout;
		self
	}

	pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
		self.connection_timeout = timeout;
		self
	}

	pub fn with_greeting_timeout(mut self, timeout: Duration) -> Self {
		self.greeting_timeout = timeout;
		self
	}

	pub fn with_pool(mut self, pool: bool) -> Self {
		self.pool = pool;
		self
	}

	pub fn with_max_connections(mut self, max_connections: u32) -> Self {
		self.max_connections = max_connections;
		self
	}

	pub fn with_max_messages(mut self, max_messages: u32) -> Self {
		self.max_messages = max_messages;
		self
	}

	/// Sends allowed through one transport; a non-pooled channel reconnects every time
	fn messages_per_transport(&self) -> u32 {
		if self.pool { self.max_messages.max(1) } else { 1 }
	}
}

struct TransportSlot {
	transport: Option<Arc<Transport>>,
	sent: u32,
}

/// SMTP delivery through lettre
///
/// The transport is created on first use, inside the runtime, and replaced
/// after `max_messages` sends. Dropping a replaced transport closes its
/// pooled connections.
pub struct SmtpBackend {
	config: SmtpConfig,
	slot: Mutex<TransportSlot>,
}

impl SmtpBackend {
	/// Create a backend, checking that the configuration yields a transport
	pub fn new(config: SmtpConfig) -> EmailResult<Self> {
		if config.host.trim().is_empty() {
			return Err(EmailError::MissingField("host".to_string()));
		}
		Self::transport_builder(&config)?;

		Ok(Self {
			config,
			slot: Mutex::new(TransportSlot {
				transport: None,
				sent: 0,
			}),
		})
	}

	pub fn config(&self) -> &SmtpConfig {
		&self.config
	}

	fn transport_builder(config: &SmtpConfig) -> EmailResult<AsyncSmtpTransportBuilder> {
		let builder = match config.security {
			SmtpSecurity::Tls => Transport::relay(&config.host).map_err(map_smtp_error)?,
			SmtpSecurity::StartTls => {
				Transport::starttls_relay(&config.host).map_err(map_smtp_error)?
			}
			SmtpSecurity::Opportunistic => {
				let parameters = TlsParameters::new(config.host.clone()).map_err(map_smtp_error)?;
				Transport::builder_dangerous(&config.host).tls(Tls::Opportunistic(parameters))
			}
			SmtpSecurity::None => Transport::builder_dangerous(&config.host),
		};

		let max_size = if config.pool { config.max_connections.max(1) } else { 1 };
		let mut builder = builder
			.port(config.port)
			.timeout(Some(config.socket_timeout))
			.pool_config(PoolConfig::new().max_size(max_size));

		if let (Some(username), Some(password)) = (&config.username, &config.password) {
			builder = builder.credentials(Credentials::new(
				username.clone(),
				password.expose_secret().to_string(),
			));
		}

		Ok(builder)
	}

	/// Transport for the next send, rotating it when its quota is used up
	fn checkout(&self) -> EmailResult<Arc<Transport>> {
		let mut slot = self.slot.lock();
		let quota = self.config.messages_per_transport();

		let reusable = match &slot.transport {
			Some(transport) if slot.sent < quota => Some(Arc::clone(transport)),
			_ => None,
		};

		let transport = match reusable {
			Some(transport) => transport,
			None => {
				if slot.transport.is_some() {
					tracing::debug!(sent = slot.sent, "recycling smtp transport");
				}
				let transport = Arc::new(Self::transport_builder(&self.config)?.build());
				slot.transport = Some(Arc::clone(&transport));
				slot.sent = 0;
				transport
			}
		};

		slot.sent += 1;
		Ok(transport)
	}
}

#[async_trait]
impl EmailBackend for SmtpBackend {
	async fn send_message(&self, message: &EmailMessage) -> EmailResult<()> {
		let email = build_lettre_message(message).await?;
		let transport = self.checkout()?;

		transport.send(email).await.map_err(map_smtp_error)?;
		Ok(())
	}

	async fn verify(&self) -> EmailResult<()> {
		let transport: Transport = Self::transport_builder(&self.config)?.build();
		let limit = self.config.connection_timeout + self.config.greeting_timeout;

		match tokio::time::timeout(limit, transport.test_connection()).await {
			Ok(Ok(true)) => Ok(()),
			Ok(Ok(false)) => Err(EmailError::SmtpError(
				"server did not accept the connection test".to_string(),
			)),
			Ok(Err(e)) => Err(map_smtp_error(e)),
			Err(_) => Err(EmailError::Timeout(format!(
				"no greeting from {}:{} within {:?}",
				self.config.host, self.config.port, limit
			))),
		}
	}
}

fn map_smtp_error(error: lettre::transport::smtp::Error) -> EmailError {
	if error.is_permanent() {
		EmailError::Rejected(error.to_string())
	} else if error.is_timeout() {
		EmailError::Timeout(error.to_string())
	} else {
		EmailError::SmtpError(error.to_string())
	}
}

fn parse_mailbox(address: &str) -> EmailResult<Mailbox> {
	address
		.parse()
		.map_err(|_| EmailError::InvalidAddress(address.to_string()))
}

/// Convert a message into its MIME form, reading the attachment from disk
pub(crate) async fn build_lettre_message(message: &EmailMessage) -> EmailResult<Message> {
	let builder = Message::builder()
		.from(parse_mailbox(message.from_email())?)
		.to(parse_mailbox(message.to())?)
		.subject(message.subject());

	let attachment = match message.attachment() {
		Some(attachment) => {
			let content = attachment.read().await?;
			let content_type = ContentType::parse(attachment.mime_type()).map_err(|e| {
				EmailError::AttachmentError(format!("{}: {}", attachment.mime_type(), e))
			})?;
			Some(
				lettre::message::Attachment::new(attachment.filename().to_string())
					.body(content, content_type),
			)
		}
		None => None,
	};

	let body = message.body().to_string();
	let built = match (message.html_body(), attachment) {
		(Some(html), Some(attachment)) => builder.multipart(
			MultiPart::mixed()
				.multipart(MultiPart::alternative_plain_html(body, html.to_string()))
				.singlepart(attachment),
		),
		(Some(html), None) => {
			builder.multipart(MultiPart::alternative_plain_html(body, html.to_string()))
		}
		(None, Some(attachment)) => builder.multipart(
			MultiPart::mixed()
				.singlepart(SinglePart::plain(body))
				.singlepart(attachment),
		),
		(None, None) => builder.singlepart(SinglePart::plain(body)),
	};

	built.map_err(|e| EmailError::BackendError(e.to_string()))
}

/// Keeps every sent message in memory
#[derive(Default)]
pub struct MemoryBackend {
	messages: Mutex<Vec<EmailMessage>>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Messages sent so far, in send order
	pub fn messages(&self) -> Vec<EmailMessage> {
		self.messages.lock().clone()
	}

	pub fn count(&self) -> usize {
		self.messages.lock().len()
	}

	pub fn clear(&self) {
		self.messages.lock().clear();
	}
}

#[async_trait]
impl EmailBackend for MemoryBackend {
	async fn send_message(&self, message: &EmailMessage) -> EmailResult<()> {
		self.messages.lock().push(message.clone());
		Ok(())
	}
}

/// Prints messages to stdout instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleBackend;

#[async_trait]
impl EmailBackend for ConsoleBackend {
	async fn send_message(&self, message: &EmailMessage) -> EmailResult<()> {
		println!("From: {}", message.from_email());
		println!("To: {}", message.to());
		println!("Subject: {}", message.subject());
		if let Some(attachment) = message.attachment() {
			println!(
				"Attachment: {} ({})",
				attachment.filename(),
				attachment.mime_type()
			);
		}
		println!();
		println!("{}", message.body());
		if let Some(html) = message.html_body() {
			println!();
			println!("{}", html);
		}
		println!("{}", "-".repeat(72));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::Attachment;
	use rstest::rstest;
	use std::io::Write;

	fn message_to(to: &str) -> EmailMessage {
		EmailMessage::builder()
			.from("mailer@example.com")
			.to(to)
			.subject("Hello")
			.body("Hi Ann,")
			.html("<pre>Hi Ann,</pre>")
			.build()
			.unwrap()
	}

	#[rstest]
	#[case(true, true, SmtpSecurity::Tls)]
	#[case(false, true, SmtpSecurity::StartTls)]
	#[case(false, false, SmtpSecurity::Opportunistic)]
	fn test_security_from_settings(
		#[case] secure: bool,
		#[case] require_tls: bool,
		#[case] expected: SmtpSecurity,
	) {
		// Arrange
		let settings = SmtpSettings {
			secure,
			require_tls,
			..SmtpSettings::default()
		};

		// Act
		let config = SmtpConfig::from_settings(&settings);

		// Assert
		assert_eq!(config.security, expected);
		assert_eq!(config.host, "smtp.gmail.com");
		assert_eq!(config.max_messages, 100);
	}

	#[rstest]
	fn test_credentials_are_redacted_in_debug() {
		// Arrange
		let config = SmtpConfig::new("smtp.example.com", 587)
			.with_credentials("mailer@example.com", "hunter2");

		// Act
		let rendered = format!("{:?}", config);

		// Assert
		assert!(!rendered.contains("hunter2"));
		assert_eq!(
			config.password.as_ref().map(|p| p.expose_secret()),
			Some("hunter2")
		);
	}

	#[rstest]
	fn test_empty_host_is_rejected() {
		// Act
		let result = SmtpBackend::new(SmtpConfig::new("  ", 25));

		// Assert
		assert!(matches!(result, Err(EmailError::MissingField(_))));
	}

	#[rstest]
	#[tokio::test]
	async fn test_transport_rotates_after_quota() {
		// Arrange
		let config = SmtpConfig::new("localhost", 2525)
			.with_security(SmtpSecurity::None)
			.with_max_messages(2);
		let backend = SmtpBackend::new(config).unwrap();

		// Act
		let first = backend.checkout().unwrap();
		let second = backend.checkout().unwrap();
		let third = backend.checkout().unwrap();

		// Assert
		assert!(Arc::ptr_eq(&first, &second));
		assert!(!Arc::ptr_eq(&second, &third));
	}

	#[rstest]
	#[tokio::test]
	async fn test_unpooled_transport_is_fresh_per_send() {
		// Arrange
		let config = SmtpConfig::new("localhost", 2525)
			.with_security(SmtpSecurity::None)
			.with_pool(false);
		let backend = SmtpBackend::new(config).unwrap();

		// Act
		let first = backend.checkout().unwrap();
		let second = backend.checkout().unwrap();

		// Assert
		assert!(!Arc::ptr_eq(&first, &second));
	}

	#[rstest]
	#[tokio::test]
	async fn test_blank_recipient_is_invalid_address() {
		// Act
		let result = build_lettre_message(&message_to("")).await;

		// Assert
		match result {
			Err(e @ EmailError::InvalidAddress(_)) => {
				assert!(!e.is_retryable());
				assert_eq!(e.to_string(), "Invalid email address: \"\"");
			}
			other => panic!("expected invalid address, got {:?}", other.map(|_| ())),
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_html_message_is_alternative() {
		// Act
		let email = build_lettre_message(&message_to("ann@example.com"))
			.await
			.unwrap();

		// Assert
		let formatted = String::from_utf8(email.formatted()).unwrap();
		assert!(formatted.contains("multipart/alternative"));
		assert!(formatted.contains("<pre>Hi Ann,</pre>"));
		assert!(formatted.contains("To: ann@example.com"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_attachment_is_embedded() {
		// Arrange
		let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
		file.write_all(b"attached notes").unwrap();
		let attachment = Attachment::from_path(file.path());
		let filename = attachment.filename().to_string();
		let message = EmailMessage::builder()
			.from("mailer@example.com")
			.to("ann@example.com")
			.subject("Hello")
			.body("Hi Ann,")
			.attachment(attachment)
			.build()
			.unwrap();

		// Act
		let email = build_lettre_message(&message).await.unwrap();

		// Assert
		let formatted = String::from_utf8(email.formatted()).unwrap();
		assert!(formatted.contains("multipart/mixed"));
		assert!(formatted.contains(&filename));
		assert!(formatted.contains("attached notes"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_memory_backend_records_in_order() {
		// Arrange
		let backend = MemoryBackend::new();
		let messages = vec![message_to("ann@x.com"), message_to("bo@x.com")];

		// Act
		let sent = backend.send_messages(&messages).await.unwrap();

		// Assert
		assert_eq!(sent, 2);
		let recorded: Vec<_> = backend
			.messages()
			.iter()
			.map(|m| m.to().to_string())
			.collect();
		assert_eq!(recorded, vec!["ann@x.com", "bo@x.com"]);
		assert!(backend.verify().await.is_ok());
	}
}

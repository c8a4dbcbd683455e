//! Delivery retry integration tests
//!
//! Tests send_with_retry against a scripted backend: eventual success,
//! exhausted attempts, non-retryable failures and backoff timing.

use async_trait::async_trait;
use bulkmail_mail::{
	EmailBackend, EmailError, EmailMessage, EmailResult, RetryPolicy, send_with_retry,
};
use parking_lot::Mutex;
use rstest::*;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Backend replaying a fixed script of results, then succeeding
#[derive(Default)]
struct ScriptedBackend {
	script: Mutex<VecDeque<EmailResult<()>>>,
	calls: Mutex<u32>,
}

impl ScriptedBackend {
	fn new(script: Vec<EmailResult<()>>) -> Self {
		Self {
			script: Mutex::new(script.into()),
			calls: Mutex::new(0),
		}
	}

	fn always_failing(count: usize) -> Self {
		Self::new(
			(1..=count)
				.map(|i| Err(EmailError::SmtpError(format!("421 busy #{}", i))))
				.collect(),
		)
	}

	fn calls(&self) -> u32 {
		*self.calls.lock()
	}
}

#[async_trait]
impl EmailBackend for ScriptedBackend {
	async fn send_message(&self, _message: &EmailMessage) -> EmailResult<()> {
		*self.calls.lock() += 1;
		self.script.lock().pop_front().unwrap_or(Ok(()))
	}
}

#[fixture]
fn message() -> EmailMessage {
	EmailMessage::builder()
		.from("mailer@example.com")
		.to("ann@example.com")
		.subject("Hello")
		.body("Hi Ann,")
		.build()
		.unwrap()
}

/// Test: two transient failures then success takes three attempts
#[rstest]
#[tokio::test(start_paused = true)]
async fn test_fail_twice_then_succeed(message: EmailMessage) {
	// Arrange
	let backend = ScriptedBackend::always_failing(2);

	// Act
	let delivered = send_with_retry(&backend, &message, &RetryPolicy::default())
		.await
		.unwrap();

	// Assert
	assert_eq!(delivered.attempts, 3);
	assert_eq!(backend.calls(), 3);
}

/// Test: a channel that never recovers is tried three times, last error kept
#[rstest]
#[tokio::test(start_paused = true)]
async fn test_always_failing_reports_last_error(message: EmailMessage) {
	// Arrange
	let backend = ScriptedBackend::always_failing(10);

	// Act
	let error = send_with_retry(&backend, &message, &RetryPolicy::default())
		.await
		.unwrap_err();

	// Assert
	assert_eq!(error.attempts, 3);
	assert_eq!(backend.calls(), 3);
	assert_eq!(error.source.to_string(), "SMTP error: 421 busy #3");
}

/// Test: backoff follows min(base * attempt, max)
#[rstest]
#[tokio::test(start_paused = true)]
async fn test_backoff_timing(message: EmailMessage) {
	// Arrange
	let backend = ScriptedBackend::always_failing(10);
	let policy = RetryPolicy::new(4, Duration::from_secs(5), Duration::from_secs(12));
	let start = Instant::now();

	// Act
	let error = send_with_retry(&backend, &message, &policy).await.unwrap_err();

	// Assert
	assert_eq!(error.attempts, 5);
	// 5 + 10 + 12 + 12
	assert_eq!(start.elapsed(), Duration::from_secs(39));
}

/// Test: errors retrying cannot fix stop after the first attempt
#[rstest]
#[case(EmailError::InvalidAddress(String::new()))]
#[case(EmailError::Rejected("550 mailbox unavailable".to_string()))]
#[case(EmailError::AttachmentError("gone".to_string()))]
#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_stops_immediately(
	message: EmailMessage,
	#[case] failure: EmailError,
) {
	// Arrange
	let backend = ScriptedBackend::new(vec![Err(failure)]);
	let start = Instant::now();

	// Act
	let error = send_with_retry(&backend, &message, &RetryPolicy::default())
		.await
		.unwrap_err();

	// Assert
	assert_eq!(error.attempts, 1);
	assert_eq!(backend.calls(), 1);
	assert_eq!(start.elapsed(), Duration::ZERO);
}

/// Test: immediate success takes one attempt and no time
#[rstest]
#[tokio::test(start_paused = true)]
async fn test_first_attempt_success(message: EmailMessage) {
	// Arrange
	let backend = ScriptedBackend::default();

	// Act
	let delivered = send_with_retry(&backend, &message, &RetryPolicy::default())
		.await
		.unwrap();

	// Assert
	assert_eq!(delivered.attempts, 1);
}

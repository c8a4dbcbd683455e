//! Bounded retry with linear backoff

use crate::backends::EmailBackend;
use crate::message::EmailMessage;
use crate::{EmailError, EmailResult};
use bulkmail_conf::CampaignSettings;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// How often and how patiently a failed send is repeated
///
/// # Examples
///
/// ```
/// use bulkmail_mail::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts(), 3);
/// assert_eq!(policy.delay_for(1), Duration::from_secs(5));
/// assert_eq!(policy.delay_for(2), Duration::from_secs(10));
/// assert_eq!(policy.delay_for(9), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Attempts after the first one
	pub max_retries: u32,
	pub base_delay: Duration,
	/// Ceiling of a single backoff
	pub max_delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 2,
			base_delay: Duration::from_secs(5),
			max_delay: Duration::from_secs(30),
		}
	}
}

impl RetryPolicy {
	pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
		Self {
			max_retries,
			base_delay,
			max_delay,
		}
	}

	/// A policy that gives up after the first failure
	pub fn no_retry() -> Self {
		Self {
			max_retries: 0,
			..Self::default()
		}
	}

	pub fn from_settings(settings: &CampaignSettings) -> Self {
		Self::new(
			settings.max_retries,
			settings.retry_delay,
			settings.retry_max_delay,
		)
	}

	pub fn max_attempts(&self) -> u32 {
		self.max_retries.saturating_add(1)
	}

	/// Pause after failed attempt `attempt` (1-based)
	pub fn delay_for(&self, attempt: u32) -> Duration {
		self.base_delay
			.checked_mul(attempt)
			.map_or(self.max_delay, |delay| delay.min(self.max_delay))
	}
}

/// A message that reached the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
	pub attempts: u32,
}

/// A message given up on, with the error of the last attempt
#[derive(Debug, Error)]
#[error("{source} (after {attempts} attempt(s))")]
pub struct DeliveryError {
	pub attempts: u32,
	#[source]
	pub source: EmailError,
}

/// Run `operation` until it succeeds, fails permanently or runs out of attempts
///
/// The closure receives the 1-based attempt number. On success the value is
/// returned with the number of attempts it took.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<(T, u32), DeliveryError>
where
	F: FnMut(u32) -> Fut,
	Fut: Future<Output = EmailResult<T>>,
{
	let max_attempts = policy.max_attempts();
	let mut attempt = 1;

	loop {
		match operation(attempt).await {
			Ok(value) => return Ok((value, attempt)),
			Err(error) if attempt >= max_attempts || !error.is_retryable() => {
				return Err(DeliveryError {
					attempts: attempt,
					source: error,
				});
			}
			Err(error) => {
				let delay = policy.delay_for(attempt);
				tracing::warn!(
					attempt,
					max_attempts,
					delay_ms = delay.as_millis() as u64,
					error = %error,
					"attempt failed, backing off"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
		}
	}
}

/// Send one message through `backend`, retrying per `policy`
pub async fn send_with_retry<B>(
	backend: &B,
	message: &EmailMessage,
	policy: &RetryPolicy,
) -> Result<Delivered, DeliveryError>
where
	B: EmailBackend + ?Sized,
{
	let result = retry(policy, |attempt| {
		tracing::debug!(to = message.to(), attempt, "sending message");
		backend.send_message(message)
	})
	.await;

	match result {
		Ok(((), attempts)) => {
			tracing::info!(to = message.to(), attempts, "message sent");
			Ok(Delivered { attempts })
		}
		Err(error) => {
			tracing::warn!(
				to = message.to(),
				attempts = error.attempts,
				error = %error.source,
				"message not sent"
			);
			Err(error)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::sync::atomic::{AtomicU32, Ordering};
	use tokio::time::Instant;

	#[rstest]
	#[case(1, 5_000)]
	#[case(2, 10_000)]
	#[case(6, 30_000)]
	#[case(u32::MAX, 30_000)]
	fn test_linear_backoff_with_ceiling(#[case] attempt: u32, #[case] expected_ms: u64) {
		// Act
		let delay = RetryPolicy::default().delay_for(attempt);

		// Assert
		assert_eq!(delay, Duration::from_millis(expected_ms));
	}

	#[rstest]
	fn test_policy_from_settings() {
		// Arrange
		let settings = CampaignSettings {
			max_retries: 4,
			retry_delay: Duration::from_millis(100),
			retry_max_delay: Duration::from_millis(250),
			..CampaignSettings::default()
		};

		// Act
		let policy = RetryPolicy::from_settings(&settings);

		// Assert
		assert_eq!(policy.max_attempts(), 5);
		assert_eq!(policy.delay_for(3), Duration::from_millis(250));
	}

	#[rstest]
	#[tokio::test(start_paused = true)]
	async fn test_retry_sleeps_between_attempts() {
		// Arrange
		let calls = AtomicU32::new(0);
		let start = Instant::now();

		// Act
		let result = retry(&RetryPolicy::default(), |_| {
			let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
			async move {
				if call < 3 {
					Err(EmailError::SmtpError("421 try later".to_string()))
				} else {
					Ok(call)
				}
			}
		})
		.await;

		// Assert
		let (value, attempts) = result.unwrap();
		assert_eq!(value, 3);
		assert_eq!(attempts, 3);
		assert_eq!(start.elapsed(), Duration::from_secs(15));
	}

	#[rstest]
	#[tokio::test(start_paused = true)]
	async fn test_permanent_error_is_not_retried() {
		// Arrange
		let calls = AtomicU32::new(0);

		// Act
		let result: Result<((), u32), _> = retry(&RetryPolicy::default(), |_| {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Err(EmailError::Rejected("550 no such user".to_string())) }
		})
		.await;

		// Assert
		let error = result.unwrap_err();
		assert_eq!(error.attempts, 1);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(matches!(error.source, EmailError::Rejected(_)));
	}

	#[rstest]
	#[tokio::test(start_paused = true)]
	async fn test_no_retry_policy_makes_one_attempt() {
		// Act
		let result: Result<((), u32), _> = retry(&RetryPolicy::no_retry(), |_| async {
			Err(EmailError::Timeout("greeting".to_string()))
		})
		.await;

		// Assert
		assert_eq!(result.unwrap_err().attempts, 1);
	}
}

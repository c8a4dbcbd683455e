//! Per-recipient results of a campaign

use serde::Serialize;
use std::fmt;

/// What happened to one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
	Sent { attempts: u32 },
	/// `attempts` is zero when the message could not even be composed
	Failed { attempts: u32, error: String },
	Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
	/// 1-based data row number
	pub row: usize,
	pub recipient: String,
	#[serde(flatten)]
	pub status: DeliveryStatus,
}

impl DeliveryOutcome {
	pub fn sent(row: usize, recipient: impl Into<String>, attempts: u32) -> Self {
		Self {
			row,
			recipient: recipient.into(),
			status: DeliveryStatus::Sent { attempts },
		}
	}

	pub fn failed(
		row: usize,
		recipient: impl Into<String>,
		attempts: u32,
		error: impl Into<String>,
	) -> Self {
		Self {
			row,
			recipient: recipient.into(),
			status: DeliveryStatus::Failed {
				attempts,
				error: error.into(),
			},
		}
	}

	pub fn skipped(row: usize, recipient: impl Into<String>, reason: impl Into<String>) -> Self {
		Self {
			row,
			recipient: recipient.into(),
			status: DeliveryStatus::Skipped {
				reason: reason.into(),
			},
		}
	}

	pub fn is_sent(&self) -> bool {
		matches!(self.status, DeliveryStatus::Sent { .. })
	}
}

impl fmt::Display for DeliveryOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.status {
			DeliveryStatus::Sent { .. } => write!(f, "✅ Sent to {}", self.recipient),
			DeliveryStatus::Failed { error, .. } => {
				write!(f, "❌ Failed to send to {}: {}", self.recipient, error)
			}
			DeliveryStatus::Skipped { reason } => {
				write!(f, "⚠️ Skipped row {}: {}", self.row, reason)
			}
		}
	}
}

/// Result of the channel check made before the first row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum VerifyNote {
	Verified,
	Failed(String),
}

impl fmt::Display for VerifyNote {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			VerifyNote::Verified => write!(f, "✅ SMTP connection verified."),
			VerifyNote::Failed(error) => write!(f, "⚠️ SMTP verify failed: {}", error),
		}
	}
}

/// Ordered log of one campaign run
///
/// Renders as one line per entry, the verification note first.
///
/// # Examples
///
/// ```
/// use bulkmail_campaign::{CampaignLog, DeliveryOutcome, VerifyNote};
///
/// let mut log = CampaignLog::new();
/// log.set_verify(VerifyNote::Verified);
/// log.push(DeliveryOutcome::sent(1, "ann@x.com", 1));
/// log.push(DeliveryOutcome::failed(2, "bo@x.com", 3, "SMTP error: 421"));
///
/// assert_eq!(
///     log.to_string(),
///     "✅ SMTP connection verified.\n✅ Sent to ann@x.com\n❌ Failed to send to bo@x.com: SMTP error: 421\n"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampaignLog {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub verify: Option<VerifyNote>,
	pub outcomes: Vec<DeliveryOutcome>,
}

impl CampaignLog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_verify(&mut self, note: VerifyNote) {
		self.verify = Some(note);
	}

	pub fn push(&mut self, outcome: DeliveryOutcome) {
		self.outcomes.push(outcome);
	}

	pub fn sent_count(&self) -> usize {
		self.outcomes.iter().filter(|o| o.is_sent()).count()
	}

	pub fn failed_count(&self) -> usize {
		self.outcomes
			.iter()
			.filter(|o| matches!(o.status, DeliveryStatus::Failed { .. }))
			.count()
	}

	pub fn skipped_count(&self) -> usize {
		self.outcomes
			.iter()
			.filter(|o| matches!(o.status, DeliveryStatus::Skipped { .. }))
			.count()
	}

	/// Log lines in order
	pub fn lines(&self) -> Vec<String> {
		self.verify
			.iter()
			.map(ToString::to_string)
			.chain(self.outcomes.iter().map(ToString::to_string))
			.collect()
	}
}

impl fmt::Display for CampaignLog {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for line in self.lines() {
			writeln!(f, "{}", line)?;
		}
		Ok(())
	}
}

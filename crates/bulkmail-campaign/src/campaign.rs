//! The campaign run loop

use crate::composer::Composer;
use crate::outcome::{CampaignLog, DeliveryOutcome, DeliveryStatus, VerifyNote};
use crate::upload::{UploadGuard, UploadedFile};
use crate::{CampaignError, CampaignResult};
use bulkmail_conf::Settings;
use bulkmail_mail::{DEFAULT_BODY, DEFAULT_SUBJECT, EmailBackend, RetryPolicy, send_with_retry};
use bulkmail_tabular::{ColumnMap, Row, TabularFormat, TabularResult, parse};
use std::sync::Arc;
use std::time::Duration;

/// Fixed inputs of every run
#[derive(Debug, Clone)]
pub struct CampaignConfig {
	pub from_email: String,
	/// Subject template (`{name}` syntax)
	pub subject: String,
	/// Plain-text body template (`{name}` syntax)
	pub body: String,
	pub retry: RetryPolicy,
	/// Pause between two consecutive rows
	pub send_interval: Duration,
	pub verify_connection: bool,
	/// Record rows without a recipient as skipped instead of attempting them
	pub skip_blank_recipients: bool,
}

impl CampaignConfig {
	pub fn new(from_email: impl Into<String>) -> Self {
		Self {
			from_email: from_email.into(),
			subject: DEFAULT_SUBJECT.to_string(),
			body: DEFAULT_BODY.to_string(),
			retry: RetryPolicy::default(),
			send_interval: Duration::from_millis(1_500),
			verify_connection: true,
			skip_blank_recipients: false,
		}
	}

	pub fn from_settings(settings: &Settings) -> Self {
		let campaign = &settings.campaign;
		Self {
			from_email: settings.smtp.from_email.clone(),
			subject: campaign
				.subject
				.clone()
				.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
			body: campaign
				.body
				.clone()
				.unwrap_or_else(|| DEFAULT_BODY.to_string()),
			retry: RetryPolicy::from_settings(campaign),
			send_interval: campaign.send_interval,
			verify_connection: campaign.verify_connection,
			skip_blank_recipients: campaign.skip_blank_recipients,
		}
	}

	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	pub fn with_send_interval(mut self, interval: Duration) -> Self {
		self.send_interval = interval;
		self
	}

	pub fn with_verify_connection(mut self, verify: bool) -> Self {
		self.verify_connection = verify;
		self
	}

	pub fn with_skip_blank_recipients(mut self, skip: bool) -> Self {
		self.skip_blank_recipients = skip;
		self
	}

	pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = subject.into();
		self
	}

	pub fn with_body(mut self, body: impl Into<String>) -> Self {
		self.body = body.into();
		self
	}
}

/// Stage of a run, reported in debug logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignPhase {
	Init,
	Parsing,
	Resolving,
	Verifying,
	SendingRow(usize),
	Complete,
	Failed,
}

/// Sends one uploaded recipient list through a backend
///
/// Rows are processed one at a time: compose, deliver with retry, record,
/// then pause before the next row. The upload is deleted when the run ends,
/// whichever way it ends.
///
/// # Examples
///
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use bulkmail_campaign::{Campaign, CampaignConfig, UploadedFile};
/// use bulkmail_mail::MemoryBackend;
/// use std::sync::Arc;
///
/// let campaign = Campaign::new(Arc::new(MemoryBackend::new()), CampaignConfig::new("mailer@x.com"));
/// let log = campaign
///     .run(UploadedFile::new("uploads/3f2a", "contacts.csv"), None)
///     .await?;
/// print!("{}", log);
/// # Ok(())
/// # }
/// ```
pub struct Campaign {
	backend: Arc<dyn EmailBackend>,
	config: CampaignConfig,
}

impl Campaign {
	pub fn new(backend: Arc<dyn EmailBackend>, config: CampaignConfig) -> Self {
		Self { backend, config }
	}

	pub fn config(&self) -> &CampaignConfig {
		&self.config
	}

	/// Run the campaign over `upload`, consuming the file
	///
	/// `pasted_template` is an HTML template applied to every row; blank
	/// input counts as none. Only an unreadable upload fails the run; every
	/// per-row problem becomes a log entry.
	pub async fn run(
		&self,
		upload: UploadedFile,
		pasted_template: Option<&str>,
	) -> CampaignResult<CampaignLog> {
		let mut guard = UploadGuard::new(&upload.path);
		let mut phase = CampaignPhase::Init;
		advance(&mut phase, CampaignPhase::Parsing);

		let rows = match load_rows(&upload).await {
			Ok(rows) => rows,
			Err(e) => {
				advance(&mut phase, CampaignPhase::Failed);
				tracing::warn!(file = %upload.original_name, error = %e, "failed to read upload");
				guard.remove();
				return Err(CampaignError::Parse(e));
			}
		};

		advance(&mut phase, CampaignPhase::Resolving);
		let columns = ColumnMap::from_rows(&rows);
		tracing::info!(
			file = %upload.original_name,
			rows = rows.len(),
			email = ?columns.email,
			name = ?columns.name,
			attachment = ?columns.attachment,
			"loaded recipient list"
		);

		let mut log = CampaignLog::new();
		if self.config.verify_connection {
			advance(&mut phase, CampaignPhase::Verifying);
			log.set_verify(self.verify().await);
		}

		let composer = Composer::new(
			&self.config.from_email,
			&self.config.subject,
			&self.config.body,
			&columns,
		)
		.with_pasted_template(pasted_template);

		for (index, row) in rows.iter().enumerate() {
			let number = index + 1;
			advance(&mut phase, CampaignPhase::SendingRow(number));

			let outcome = self.process_row(&composer, number, row).await;
			match &outcome.status {
				DeliveryStatus::Sent { .. } => tracing::info!("{}", outcome),
				_ => tracing::warn!("{}", outcome),
			}
			log.push(outcome);

			if number < rows.len() {
				tokio::time::sleep(self.config.send_interval).await;
			}
		}

		advance(&mut phase, CampaignPhase::Complete);
		tracing::info!(
			sent = log.sent_count(),
			failed = log.failed_count(),
			skipped = log.skipped_count(),
			"campaign finished"
		);
		guard.remove();
		Ok(log)
	}

	async fn verify(&self) -> VerifyNote {
		match self.backend.verify().await {
			Ok(()) => {
				tracing::info!("SMTP connection verified.");
				VerifyNote::Verified
			}
			Err(e) => {
				tracing::warn!(error = %e, "SMTP verify failed");
				VerifyNote::Failed(e.to_string())
			}
		}
	}

	async fn process_row(&self, composer: &Composer<'_>, number: usize, row: &Row) -> DeliveryOutcome {
		let recipient = composer.recipient(row);
		if self.config.skip_blank_recipients && recipient.trim().is_empty() {
			return DeliveryOutcome::skipped(number, recipient, "no recipient address");
		}

		let composed = match composer.compose(row).await {
			Ok(composed) => composed,
			Err(e) => return DeliveryOutcome::failed(number, recipient, 0, e.to_string()),
		};
		tracing::debug!(row = number, source = ?composed.html_source, "composed message");

		match send_with_retry(self.backend.as_ref(), &composed.message, &self.config.retry).await {
			Ok(delivered) => DeliveryOutcome::sent(number, recipient, delivered.attempts),
			Err(e) => DeliveryOutcome::failed(number, recipient, e.attempts, e.source.to_string()),
		}
	}
}

fn advance(phase: &mut CampaignPhase, next: CampaignPhase) {
	tracing::debug!(from = ?*phase, to = ?next, "campaign phase");
	*phase = next;
}

/// Read the stored upload and parse it under its declared name
async fn load_rows(upload: &UploadedFile) -> TabularResult<Vec<Row>> {
	let data = tokio::fs::read(&upload.path).await?;
	parse(&data, TabularFormat::from_filename(&upload.original_name))
}

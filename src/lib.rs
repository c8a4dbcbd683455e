//! # bulkmail
//!
//! Personalized bulk email from an uploaded recipient list.
//!
//! A campaign parses a CSV or spreadsheet upload, finds its email, name and
//! attachment columns, renders one message per row and delivers it over SMTP
//! with bounded retries and a fixed pause between rows. The result is an
//! ordered, per-recipient log; the upload is removed afterwards.
//!
//! ## Crates
//!
//! - [`conf`]: settings from the environment, with a fail-fast credential check
//! - [`tabular`]: CSV and workbook parsing, column role detection
//! - [`mail`]: message model, `{{key}}` templates, SMTP backend and retry
//! - [`campaign`]: the run loop, outcome log and upload cleanup
//!
//! ## Feature Flags
//!
//! - `campaign` (default): campaign orchestration; disable it to use only
//!   parsing, templates and delivery
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use bulkmail::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let settings = Settings::from_env()?;
//! settings.validate()?;
//!
//! let backend = SmtpBackend::new(SmtpConfig::from_settings(&settings.smtp))?;
//! let campaign = Campaign::new(Arc::new(backend), CampaignConfig::from_settings(&settings));
//!
//! let upload = UploadedFile::stage(Path::new("contacts.csv"), &settings.campaign.uploads_dir)?;
//! print!("{}", campaign.run(upload, None).await?);
//! # Ok(())
//! # }
//! ```

pub use bulkmail_conf as conf;
pub use bulkmail_mail as mail;
pub use bulkmail_tabular as tabular;

#[cfg(feature = "campaign")]
pub use bulkmail_campaign as campaign;

pub use bulkmail_conf::{Settings, SettingsError};
pub use bulkmail_mail::{EmailBackend, EmailError, EmailMessage, SmtpBackend, SmtpConfig};
pub use bulkmail_tabular::{ColumnMap, Row, TabularError};

#[cfg(feature = "campaign")]
pub use bulkmail_campaign::{Campaign, CampaignConfig, CampaignError, CampaignLog, UploadedFile};

/// Common imports for building and running campaigns
pub mod prelude {
	pub use bulkmail_conf::{Settings, SettingsError};
	pub use bulkmail_mail::{
		EmailBackend, EmailMessage, MemoryBackend, RetryPolicy, SmtpBackend, SmtpConfig,
		SmtpSecurity,
	};
	pub use bulkmail_tabular::{ColumnMap, Row};

	#[cfg(feature = "campaign")]
	pub use bulkmail_campaign::{
		Campaign, CampaignConfig, CampaignError, CampaignLog, DeliveryOutcome, UploadedFile,
	};
}

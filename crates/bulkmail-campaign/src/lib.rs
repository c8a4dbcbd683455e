//! # bulkmail-campaign
//!
//! Runs one bulk-send campaign: parse the uploaded recipient list, resolve
//! its columns, compose and deliver one message per row at a fixed pace, and
//! return an ordered log. The upload is deleted afterwards on every path.
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use bulkmail_campaign::{Campaign, CampaignConfig, UploadedFile};
//! use bulkmail_conf::Settings;
//! use bulkmail_mail::{SmtpBackend, SmtpConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let settings = Settings::from_env()?;
//! settings.validate()?;
//!
//! let backend = SmtpBackend::new(SmtpConfig::from_settings(&settings.smtp))?;
//! let campaign = Campaign::new(Arc::new(backend), CampaignConfig::from_settings(&settings));
//!
//! let upload = UploadedFile::stage(Path::new("contacts.xlsx"), &settings.campaign.uploads_dir)?;
//! let log = campaign.run(upload, Some("<h1>Hi {{name}}</h1>")).await?;
//! print!("{}", log);
//! # Ok(())
//! # }
//! ```

pub mod campaign;
pub mod composer;
pub mod outcome;
pub mod upload;

use bulkmail_tabular::TabularError;
use thiserror::Error;

pub use campaign::{Campaign, CampaignConfig, CampaignPhase};
pub use composer::{Composed, Composer, HtmlSource, row_context};
pub use outcome::{CampaignLog, DeliveryOutcome, DeliveryStatus, VerifyNote};
pub use upload::{UploadGuard, UploadedFile};

#[derive(Debug, Error)]
pub enum CampaignError {
	/// The upload could not be parsed; no row was processed
	#[error("Failed to read file: {0}")]
	Parse(#[from] TabularError),
}

pub type CampaignResult<T> = std::result::Result<T, CampaignError>;

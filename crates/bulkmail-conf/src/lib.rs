//! # bulkmail-conf
//!
//! Process configuration for bulkmail: SMTP channel settings and campaign
//! tuning, loaded from environment variables (and an optional `.env` file).
//!
//! ```rust,no_run
//! use bulkmail_conf::Settings;
//!
//! let settings = Settings::from_env()?;
//! settings.validate()?;
//! # Ok::<(), bulkmail_conf::SettingsError>(())
//! ```

pub mod env;
pub mod settings;

pub use env::{Env, EnvError, parse_bool};
pub use settings::{CampaignSettings, Settings, SettingsError, SmtpSettings};

//! bulkmail CLI
//!
//! Sends one personalized email per row of a CSV or spreadsheet recipient
//! list, and checks the configured SMTP channel.
//!
//! ## Usage
//!
//! ```bash
//! bulkmail send contacts.xlsx
//! bulkmail send contacts.csv --template invite.html --json
//! bulkmail send contacts.csv --dry-run -v
//! bulkmail verify
//! ```
//!
//! SMTP credentials and campaign tuning are read from the environment (or a
//! `.env` file); `SMTP_USER` and `SMTP_PASS` are required.

use bulkmail_campaign::{Campaign, CampaignConfig, CampaignError, CampaignLog, UploadedFile};
use bulkmail_conf::{Settings, SettingsError};
use bulkmail_mail::{
	ConsoleBackend, EmailBackend, EmailError, RetryPolicy, SmtpBackend, SmtpConfig,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bulkmail")]
#[command(about = "Send personalized email to every row of a recipient list", long_about = None)]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Verbosity level (can be repeated)
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbosity: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Send one message per row of a CSV or spreadsheet file
	Send {
		/// Recipient list (.csv, or any workbook format)
		#[arg(value_name = "FILE")]
		file: PathBuf,

		/// HTML template applied to every row ({{column}} placeholders)
		#[arg(short, long, value_name = "HTML_FILE")]
		template: Option<PathBuf>,

		/// Print messages instead of sending them
		#[arg(long)]
		dry_run: bool,

		/// Print the send log as JSON
		#[arg(long)]
		json: bool,
	},

	/// Check that the SMTP server is reachable and accepts the login
	Verify,
}

#[derive(Debug, Error)]
enum CliError {
	#[error(transparent)]
	Settings(#[from] SettingsError),

	#[error(transparent)]
	Mail(#[from] EmailError),

	#[error(transparent)]
	Campaign(#[from] CampaignError),

	#[error("SMTP verify failed: {0}")]
	Verify(EmailError),

	#[error("{}: {source}", .path.display())]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("Failed to encode log: {0}")]
	Json(#[from] serde_json::Error),
}

type CliResult<T> = Result<T, CliError>;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	init_tracing(cli.verbosity);

	let json_output = matches!(cli.command, Commands::Send { json: true, .. });
	let result = match cli.command {
		Commands::Send {
			file,
			template,
			dry_run,
			json,
		} => run_send(&file, template.as_deref(), dry_run, json).await,
		Commands::Verify => run_verify().await,
	};

	if let Err(e) = result {
		if json_output {
			println!("{}", error_json(&e));
		} else {
			eprintln!("{} {}", "Error:".red().bold(), e);
		}
		process::exit(1);
	}
}

/// Failure report for `--json` output
fn error_json(error: &CliError) -> String {
	serde_json::json!({ "error": error.to_string() }).to_string()
}

fn init_tracing(verbosity: u8) {
	let filter = match verbosity {
		0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		1 => EnvFilter::new("debug"),
		_ => EnvFilter::new("trace"),
	};

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

/// Load settings and refuse to continue without credentials
fn load_settings() -> CliResult<Settings> {
	let settings = Settings::from_env()?;
	settings.validate()?;
	Ok(settings)
}

async fn run_send(file: &Path, template: Option<&Path>, dry_run: bool, json: bool) -> CliResult<()> {
	let settings = load_settings()?;

	let pasted_template = template
		.map(|path| {
			std::fs::read_to_string(path).map_err(|source| CliError::Io {
				path: path.to_path_buf(),
				source,
			})
		})
		.transpose()?;

	let (backend, config) = campaign_parts(&settings, dry_run)?;
	let upload = UploadedFile::stage(file, &settings.campaign.uploads_dir).map_err(|source| {
		CliError::Io {
			path: file.to_path_buf(),
			source,
		}
	})?;

	let log = Campaign::new(backend, config)
		.run(upload, pasted_template.as_deref())
		.await?;

	print_log(&log, json)
}

fn campaign_parts(
	settings: &Settings,
	dry_run: bool,
) -> CliResult<(Arc<dyn EmailBackend>, CampaignConfig)> {
	let config = CampaignConfig::from_settings(settings);
	if dry_run {
		let config = config
			.with_verify_connection(false)
			.with_send_interval(Duration::ZERO)
			.with_retry(RetryPolicy::no_retry());
		return Ok((Arc::new(ConsoleBackend), config));
	}

	let backend = SmtpBackend::new(SmtpConfig::from_settings(&settings.smtp))?;
	Ok((Arc::new(backend), config))
}

fn print_log(log: &CampaignLog, json: bool) -> CliResult<()> {
	if json {
		println!("{}", serde_json::to_string_pretty(log)?);
	} else {
		print!("{}", log);
		println!(
			"{} sent, {} failed, {} skipped",
			log.sent_count().to_string().green(),
			log.failed_count().to_string().red(),
			log.skipped_count()
		);
	}
	Ok(())
}

async fn run_verify() -> CliResult<()> {
	let settings = load_settings()?;
	let backend = SmtpBackend::new(SmtpConfig::from_settings(&settings.smtp))?;

	backend.verify().await.map_err(CliError::Verify)?;
	println!("SMTP verify: {}", "OK".green());
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_parse_send_with_options() {
		// Act
		let cli = Cli::try_parse_from([
			"bulkmail",
			"send",
			"contacts.csv",
			"--template",
			"invite.html",
			"--dry-run",
			"--json",
			"-vv",
		])
		.unwrap();

		// Assert
		assert_eq!(cli.verbosity, 2);
		match cli.command {
			Commands::Send {
				file,
				template,
				dry_run,
				json,
			} => {
				assert_eq!(file, PathBuf::from("contacts.csv"));
				assert_eq!(template, Some(PathBuf::from("invite.html")));
				assert!(dry_run);
				assert!(json);
			}
			other => panic!("expected send, got {:?}", other),
		}
	}

	#[rstest]
	fn test_send_requires_file() {
		// Act
		let result = Cli::try_parse_from(["bulkmail", "send"]);

		// Assert
		assert!(result.is_err());
	}

	#[rstest]
	fn test_parse_verify() {
		// Act
		let cli = Cli::try_parse_from(["bulkmail", "verify"]).unwrap();

		// Assert
		assert!(matches!(cli.command, Commands::Verify));
		assert_eq!(cli.verbosity, 0);
	}

	#[rstest]
	fn test_dry_run_disables_pacing_and_verification() {
		// Arrange
		let settings = Settings::from_lookup(|key| match key {
			"SMTP_USER" => Some("mailer@example.com".to_string()),
			"SMTP_PASS" => Some("app-password".to_string()),
			_ => None,
		})
		.unwrap();

		// Act
		let (_, config) = campaign_parts(&settings, true).unwrap();

		// Assert
		assert!(!config.verify_connection);
		assert_eq!(config.send_interval, Duration::ZERO);
		assert_eq!(config.retry.max_attempts(), 1);
		assert_eq!(config.from_email, "mailer@example.com");
	}

	#[rstest]
	fn test_json_error_report() {
		// Arrange
		let error = CliError::Campaign(CampaignError::Parse(
			std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into(),
		));

		// Act
		let report: serde_json::Value = serde_json::from_str(&error_json(&error)).unwrap();

		// Assert
		assert_eq!(
			report,
			serde_json::json!({ "error": "Failed to read file: gone" })
		);
	}

	#[rstest]
	fn test_verify_error_message() {
		// Arrange
		let error = CliError::Verify(EmailError::Timeout("greeting".to_string()));

		// Act / Assert
		assert_eq!(error.to_string(), "SMTP verify failed: SMTP timeout: greeting");
	}
}

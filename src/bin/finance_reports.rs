//! Finance Reports Command Line Interface
//!
//! Runs report requests end to end, decodes download tokens and lists the
//! report catalogue.
//!
//! # Usage
//!
//! ```bash
//! # Run one report request (JSON file, or stdin with `-`)
//! finance-reports run --request request.json
//!
//! # Write to a local directory and log the email instead of sending it
//! echo '{"reportType":"Debt","reportSubtype":"FeeChase","email":"me@example.com"}' \
//!     | finance-reports run --request - --output-dir ./out --dry-run-notify
//!
//! # Inspect a download link's token
//! finance-reports decode-token eyJLZXkiOi...
//!
//! # List every report
//! finance-reports list
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use finance_reports::database::{mask_database_url, DatabaseManager};
use finance_reports::notify::{GovUkNotifyClient, LoggingNotifyClient, NotifyClient};
use finance_reports::storage::{LocalReportStorage, ReportStorage, S3ReportStorage};
use finance_reports::types::ReportRequest;
use finance_reports::{
    AppConfig, Clock, DownloadTokenCodec, ReportPipeline, ReportRegistry, ReportWorkerPool,
    SystemClock, TerminalState,
};

#[derive(Parser)]
#[command(name = "finance-reports")]
#[command(version)]
#[command(about = "Generate finance reports and deliver them by email")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML config file overriding environment settings
    #[arg(long, short, global = true, env = "FINANCE_REPORTS_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one report request end to end
    Run {
        /// Request JSON file, or `-` for stdin
        #[arg(short, long)]
        request: String,

        /// Write reports under this directory instead of S3
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run_notify: bool,
    },

    /// Decode a download token
    DecodeToken {
        /// Token from a download link's `uid` parameter
        token: String,
    },

    /// List every report with its key and display name
    List,
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Run {
                request,
                output_dir,
                dry_run_notify,
            } => cmd_run(&config, &request, output_dir, dry_run_notify, cli.format).await,
            Commands::DecodeToken { token } => cmd_decode_token(&config, &token, cli.format),
            Commands::List => cmd_list(cli.format),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_file(path),
        None => Ok(AppConfig::from_env()),
    }
}

fn read_request(source: &str) -> anyhow::Result<ReportRequest> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read request file: {}", source))?
    };
    serde_json::from_str(&content).context("Invalid report request")
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

async fn cmd_run(
    config: &AppConfig,
    request_source: &str,
    output_dir: Option<PathBuf>,
    dry_run_notify: bool,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let request = read_request(request_source)?;

    if config.reports.token_secret.is_empty() {
        bail!("DOWNLOAD_TOKEN_SECRET is not set");
    }

    let database = DatabaseManager::new(&config.database)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {}",
                mask_database_url(&config.database.database_url)
            )
        })?;

    let storage: Arc<dyn ReportStorage> = match output_dir {
        Some(dir) => Arc::new(LocalReportStorage::new(dir)),
        None => Arc::new(S3ReportStorage::new(config.storage.clone())),
    };

    let notify: Arc<dyn NotifyClient> = if dry_run_notify {
        Arc::new(LoggingNotifyClient)
    } else {
        Arc::new(GovUkNotifyClient::from_config(&config.notify).context("Invalid Notify configuration")?)
    };

    let pipeline = Arc::new(ReportPipeline::from_config(
        config,
        Arc::new(database.report_data_store()),
        storage,
        notify,
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.reports.go_live_date));
    let pool = ReportWorkerPool::new(pipeline, clock, config.reports.workers, config.reports.run_timeout);

    let handle = pool.submit(request);
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    // Room for the failure email after cancellation.
    let grace = config.reports.notify_timeout + Duration::from_secs(5);
    let outcome = pool
        .join_or_shutdown(handle, interrupt, grace)
        .await
        .context("Report run did not complete")?;
    database.close().await;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "run_id": outcome.run_id,
                    "terminal": outcome.terminal.to_string(),
                    "failed_stage": outcome.failed_stage.map(|s| s.as_str()),
                    "error": outcome.error,
                    "object_key": outcome.object_key,
                    "download_link": outcome.download_link,
                })
            );
        }
        OutputFormat::Pretty => {
            let terminal = match outcome.terminal {
                TerminalState::NotifiedSuccess => outcome.terminal.to_string().green(),
                TerminalState::NotifiedFailure => outcome.terminal.to_string().yellow(),
                TerminalState::NotifyAttemptFailed => outcome.terminal.to_string().red(),
            };
            println!("{} run {}", terminal, outcome.run_id);
            if let Some(key) = &outcome.object_key {
                println!("  {} {}", "object:".bold(), key);
            }
            if let Some(link) = &outcome.download_link {
                println!("  {} {}", "link:".bold(), link);
            }
            if let (Some(stage), Some(error)) = (outcome.failed_stage, &outcome.error) {
                println!("  {} {} ({})", "failed:".bold(), error, stage);
            }
        }
    }

    Ok(if outcome.failed_stage.is_none() && outcome.terminal == TerminalState::NotifiedSuccess {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_decode_token(config: &AppConfig, token: &str, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let codec = DownloadTokenCodec::new(&config.reports.token_secret);
    let decoded = codec.decode(token).context("Invalid download token")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&decoded)?),
        OutputFormat::Pretty => {
            println!("{} {}", "key:".bold(), decoded.key);
            println!("{} {}", "version:".bold(), decoded.version_id);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_list(format: OutputFormat) -> anyhow::Result<ExitCode> {
    let registry = ReportRegistry::new();
    let subtypes = registry.subtypes();

    match format {
        OutputFormat::Json => {
            let reports: Vec<_> = subtypes
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "category": s.category().key(),
                        "key": s.key(),
                        "name": s.translation(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        OutputFormat::Pretty => {
            let mut category = None;
            for subtype in subtypes {
                if category != Some(subtype.category()) {
                    category = Some(subtype.category());
                    println!("{}", subtype.category().translation().bold());
                }
                println!("  {:<36} {}", subtype.key(), subtype.translation());
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

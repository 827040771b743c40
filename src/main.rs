//! html-probe command line entry point
//!
//! Prints the JSON response of a probe to stdout, or serves the same
//! responses over HTTP with `serve`; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use html_probe_lib::api::{self, ApiState};
use html_probe_lib::application::{CheckRequest, CompareRequest, ProbeResponse, ProbeService};
use html_probe_lib::domain::ProbeOutcome;
use html_probe_lib::infrastructure::config::{AppConfig, ConfigManager};
use html_probe_lib::infrastructure::logging;
use html_probe_lib::infrastructure::streaming::{ScanMode, reader_source};

#[derive(Parser, Debug)]
#[command(name = "html-probe", version, about = "Check whether a CSS selector matches content on a web page")]
struct Cli {
    /// Config file (TOML, JSON or YAML); defaults to the per-user config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report the text of every element matching the selector
    Check {
        #[arg(long)]
        url: String,
        #[arg(long)]
        selector: String,
    },
    /// Report the first matched text containing the expected content
    Compare {
        #[arg(long)]
        url: String,
        #[arg(long)]
        selector: String,
        /// Case-insensitive substring to look for
        #[arg(long = "expected")]
        expected_content: String,
    },
    /// Scan a local file, or stdin when no file is given
    Extract {
        #[arg(long)]
        selector: String,
        /// Switch to comparison mode with this substring
        #[arg(long)]
        expected: Option<String>,
        file: Option<PathBuf>,
    },
    /// Serve `POST /check` and `POST /compare` over HTTP
    Serve {
        /// Defaults to `server.host`
        #[arg(long)]
        host: Option<String>,
        /// Defaults to `server.port`
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    match cli.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }
    config.logging.json_format |= cli.json_logs;

    logging::init_logging_with_config(&config.logging)?;
    logging::log_system_info();

    let service = ProbeService::from_config(&config)?;
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    let response = match cli.command {
        Command::Check { url, selector } => service.check(&CheckRequest { url, selector }, &cancel).await,
        Command::Compare {
            url,
            selector,
            expected_content,
        } => {
            let request = CompareRequest {
                url,
                selector,
                expected_content,
            };
            service.compare(&request, &cancel).await
        }
        Command::Extract { selector, expected, file } => {
            extract(&service, &config, &selector, expected, file, &cancel).await?
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let address = config.server.bind_address();
            let listener = TcpListener::bind(&address)
                .await
                .with_context(|| format!("Failed to bind {}", address))?;
            api::serve(listener, ApiState::new(service, cancel)).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(ExitCode::SUCCESS);
        }
    };

    println!("{}", response.to_json()?);
    Ok(exit_code(&response))
}

fn load_config(path: Option<&std::path::Path>) -> Result<AppConfig> {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    manager
        .load()
        .with_context(|| format!("Failed to load configuration from {}", manager.config_path().display()))
}

async fn extract(
    service: &ProbeService,
    config: &AppConfig,
    selector: &str,
    expected: Option<String>,
    file: Option<PathBuf>,
    cancel: &CancellationToken,
) -> Result<ProbeResponse> {
    let mode = match expected {
        Some(expected) => ScanMode::Contains { expected },
        None => ScanMode::Existence,
    };
    let capacity = config.scan.read_buffer_bytes;

    let report = match file {
        Some(path) => {
            info!("[extract] Scanning file: {}", path.display());
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            service.extract(reader_source(file, capacity), selector, &mode, cancel).await
        }
        None => {
            info!("[extract] Scanning stdin");
            service
                .extract(reader_source(tokio::io::stdin(), capacity), selector, &mode, cancel)
                .await
        }
    };

    let response = match report {
        Ok(report) => match report.outcome(&mode) {
            ProbeOutcome::Found { contents } => ProbeResponse::contents(contents),
            ProbeOutcome::Matched { matched_content } => ProbeResponse::matched(matched_content),
            ProbeOutcome::NoMatch if matches!(mode, ScanMode::Existence) => ProbeResponse::element_not_found(),
            ProbeOutcome::NoMatch => ProbeResponse::content_not_found(),
        },
        Err(err) => {
            warn!("[extract] Error: {}", err);
            ProbeResponse::from(&err)
        }
    };
    Ok(response)
}

/// 0 on success, 1 when nothing matched, 2 on any error
fn exit_code(response: &ProbeResponse) -> ExitCode {
    match response.status {
        200 => ExitCode::SUCCESS,
        404 => ExitCode::from(1),
        _ => ExitCode::from(2),
    }
}

async fn cancel_on_shutdown(cancel: CancellationToken) {
    shutdown_signal().await;
    info!("Shutdown signal received, cancelling in-flight scans");
    cancel.cancel();
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

//! mssql-script-export CLI - export SQL Server programmable objects as re-runnable scripts.

use clap::{Parser, Subcommand};
use mssql_script_export::{
    CategoryStatus, Config, ExportError, ExportSummary, ObjectCategory, Orchestrator,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "mssql-script-export")]
#[command(about = "Export SQL Server procedures, functions and views as CREATE OR ALTER scripts")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// ADO.NET connection string; overrides the source section of the config
    #[arg(long)]
    connection_string: Option<String>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export scripts for the configured object categories
    Run {
        /// Only export these categories (procedure, function, view)
        #[arg(long = "category")]
        categories: Vec<ObjectCategory>,

        /// Override the output root directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Override number of concurrent export workers
        #[arg(long)]
        workers: Option<usize>,

        /// Query the catalog and report counts without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Test the catalog connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, ExportError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(ExportError::Config)?;

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run {
            categories,
            output_dir,
            workers,
            dry_run,
        } => {
            let config = apply_run_overrides(config, categories, output_dir, workers)?;

            let cancel_token = setup_signal_handler();
            let orchestrator = Orchestrator::new(config).await?.with_dry_run(dry_run);
            let summary = orchestrator.run(cancel_token).await?;

            if cli.output_json {
                println!("{}", summary.to_json()?);
            } else {
                print_summary(&summary);
            }

            Ok(summary.exit_code())
        }

        Commands::HealthCheck => {
            let result = Orchestrator::check_connection(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Catalog ({}): {} ({}ms)",
                    result.db_type,
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
            }

            if !result.connected {
                return Err(ExportError::Connectivity(
                    result.error.unwrap_or_else(|| "Health check failed".to_string()),
                ));
            }
            Ok(0)
        }
    }
}

/// Load the config file, or build one from `--connection-string` when no file exists.
fn load_config(cli: &Cli) -> Result<Config, ExportError> {
    match cli.connection_string {
        Some(ref conn) if !cli.config.exists() => {
            info!("No config file at {:?}, using --connection-string", cli.config);
            Config::from_connection_string(conn)
        }
        Some(ref conn) => {
            let config = Config::load_with_connection_string(&cli.config, conn)?;
            info!("Loaded configuration from {:?}", cli.config);
            Ok(config)
        }
        None => {
            let config = Config::load(&cli.config)?;
            info!("Loaded configuration from {:?}", cli.config);
            Ok(config)
        }
    }
}

/// Apply `run` flags, validate, then auto-tune whatever is still unset.
fn apply_run_overrides(
    mut config: Config,
    categories: Vec<ObjectCategory>,
    output_dir: Option<PathBuf>,
    workers: Option<usize>,
) -> Result<Config, ExportError> {
    if !categories.is_empty() {
        config.export.categories = categories;
    }
    if let Some(dir) = output_dir {
        config.export.output_dir = dir;
    }
    if let Some(w) = workers {
        config.export.workers = Some(w);
    }
    config.validate()?;
    Ok(config.with_auto_tuning())
}

fn print_summary(summary: &ExportSummary) {
    let heading = if summary.dry_run {
        "Dry run completed!"
    } else {
        "Export completed!"
    };
    println!("\n{}", heading);
    println!("  Run ID: {}", summary.run_id);
    println!("  Duration: {:.2}s", summary.duration_seconds);

    for report in &summary.categories {
        match report.status {
            CategoryStatus::Completed => {
                println!(
                    "  Successfully wrote {} {} to file(s)",
                    report.exported,
                    report.category.plural_label()
                );
            }
            CategoryStatus::Failed => {
                println!(
                    "  Error with {} scripts: {}",
                    report.category,
                    report.error.as_deref().unwrap_or("unknown error")
                );
                if report.exported > 0 {
                    println!(
                        "    {} {} written before the failure",
                        report.exported,
                        report.category.plural_label()
                    );
                }
            }
            CategoryStatus::Skipped => {
                println!("  Skipped {} (cancelled)", report.category.plural_label());
            }
        }
        for failure in &report.failures {
            println!(
                "    ✗ {} -> {}: {}",
                failure.object,
                failure.filename,
                failure.message.as_deref().unwrap_or("failed")
            );
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    result.map_err(|e| format!("failed to install log subscriber: {}", e))
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Cancellation stops the run before the next category; scripts already
/// being written always finish.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Finishing in-flight scripts...", name);
                    token.cancel();
                });
            }
            Err(e) => eprintln!("Failed to setup {} handler: {}", name, e),
        }
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Finishing in-flight scripts...");
            token.cancel();
        }
    });

    cancel_token
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config::from_connection_string("Server=tcp:db,1433;Database=x").unwrap()
    }

    #[test]
    fn test_workers_flag_wins_over_auto_tuning() {
        let config = apply_run_overrides(base_config(), Vec::new(), None, Some(3)).unwrap();
        assert_eq!(config.export.workers, Some(3));
    }

    #[test]
    fn test_auto_tuning_fills_unset_workers() {
        let config = apply_run_overrides(base_config(), Vec::new(), None, None).unwrap();
        let workers = config.export.workers.unwrap();
        assert!((4..=64).contains(&workers));
    }

    #[test]
    fn test_overrides_are_validated_before_tuning() {
        let err = apply_run_overrides(base_config(), Vec::new(), None, Some(0)).unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
    }

    #[test]
    fn test_category_and_output_overrides() {
        let config = apply_run_overrides(
            base_config(),
            vec![ObjectCategory::View],
            Some(PathBuf::from("out")),
            Some(2),
        )
        .unwrap();
        assert_eq!(config.export.categories, vec![ObjectCategory::View]);
        assert_eq!(config.export.output_dir, PathBuf::from("out"));
    }
}

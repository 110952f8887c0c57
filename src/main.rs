mod aggregate;
mod config;
mod error;
mod gauges;
mod models;
mod scheduler;
mod server;
mod service;
mod source;
mod telemetry;
mod window;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use config::{load_config, ConfigOverrides, ExporterConfig, CONFIG_ENV};
use error::AppError;
use gauges::CostGauges;
use prometheus::Registry;
use scheduler::Scheduler;
use serde::Serialize;
use models::CycleReport;
use service::CostRefresher;
use source::aws::CostExplorerSource;
use std::path::PathBuf;
use std::sync::Arc;
use telemetry::RefreshMetrics;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cost-exporter")]
#[command(about = "Expose AWS cost by service and region as Prometheus gauges")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// TOML config file
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    refresh_seconds: Option<u64>,
}

impl ConfigArgs {
    fn load(&self) -> Result<ExporterConfig, AppError> {
        load_config(
            self.config.as_deref(),
            &ConfigOverrides {
                region: self.region.clone(),
                port: self.port,
                refresh_seconds: self.refresh_seconds,
            },
        )
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Refresh on a schedule and serve /metrics and /health
    Serve {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the date range each configured window would query
    Windows {
        #[command(flatten)]
        config: ConfigArgs,
        /// Reference date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run one refresh cycle and print the exposition
    Once {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Debug, Serialize)]
struct WindowRow {
    window: models::WindowKind,
    metric: &'static str,
    granularity: models::Granularity,
    start: NaiveDate,
    end: NaiveDate,
}

fn parse_date(input: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Config(format!("Invalid date '{input}'. Use YYYY-MM-DD.")))
}

fn window_rows(cfg: &ExporterConfig, today: NaiveDate) -> Vec<WindowRow> {
    cfg.windows
        .iter()
        .map(|kind| {
            let range = window::compute_range(*kind, today);
            WindowRow {
                window: *kind,
                metric: kind.metric_name(),
                granularity: kind.granularity(),
                start: range.start,
                end: range.end,
            }
        })
        .collect()
}

fn ensure_complete(report: CycleReport) -> Result<(), AppError> {
    if report.is_complete() {
        Ok(())
    } else {
        Err(AppError::Incomplete(report.failed))
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn build_refresher(
    cfg: &ExporterConfig,
) -> Result<(Arc<Registry>, CostRefresher), AppError> {
    let registry = Arc::new(Registry::new());
    let gauges = CostGauges::new(&cfg.windows)?;
    gauges.register(&registry)?;
    let telemetry = RefreshMetrics::new()?;
    telemetry.register(&registry)?;

    let source = Arc::new(CostExplorerSource::from_config(cfg).await);
    let refresher = CostRefresher::new(source, cfg.cost_metric.clone(), &gauges, cfg.failure_policy)
        .with_metrics(telemetry);
    Ok((registry, refresher))
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Serve { config } => {
            let cfg = config.load()?;
            info!(
                region = %cfg.region,
                windows = ?cfg.windows,
                refresh_seconds = cfg.refresh_seconds,
                "loaded configuration"
            );
            let (registry, refresher) = build_refresher(&cfg).await?;
            let scheduler = Scheduler::new(Arc::new(refresher), cfg.refresh_interval(), cfg.time_zone);
            scheduler.startup().await;

            let cancel = CancellationToken::new();
            let refresh_task = tokio::spawn(scheduler.run(cancel.clone()));

            let shutdown = {
                let cancel = cancel.clone();
                async move {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "failed to listen for shutdown signal");
                        return;
                    }
                    info!("shutdown signal received");
                    cancel.cancel();
                }
            };
            let served = server::serve(registry, cfg.port, shutdown).await;

            cancel.cancel();
            if let Err(e) = refresh_task.await {
                warn!(error = %e, "refresh task ended abnormally");
            }
            served?;
        }
        Commands::Windows {
            config,
            date,
            format,
        } => {
            let cfg = config.load()?;
            let today = match date {
                Some(raw) => parse_date(&raw)?,
                None => cfg.time_zone.today(),
            };
            let rows = window_rows(&cfg, today);
            if format.eq_ignore_ascii_case("json") {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if format.eq_ignore_ascii_case("text") {
                for row in rows {
                    println!(
                        "{:<15} {:<8} {} {} {}",
                        row.window.as_label(),
                        row.granularity.as_label(),
                        row.start,
                        row.end,
                        row.metric
                    );
                }
            } else {
                return Err(AppError::Config(
                    "Unsupported output format. Use text or json".into(),
                ));
            }
        }
        Commands::Once { config } => {
            let cfg = config.load()?;
            let (registry, refresher) = build_refresher(&cfg).await?;
            let result = refresher.run_cycle(cfg.time_zone.today()).await;
            print!("{}", server::render_metrics(&registry)?);
            ensure_complete(result?)?;
        }
    }

    Ok(())
}

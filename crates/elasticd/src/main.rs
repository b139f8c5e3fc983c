//! elasticd — the Elastic daemon.
//!
//! Single binary that assembles the worker service:
//! - Worker pool (named OS threads running the synthetic workload)
//! - Autoscaler (per-thread CPU sampling, scale decisions)
//! - HTTP API (`/hello`, `/status`, `/metrics`)
//!
//! # Usage
//!
//! ```text
//! elasticd run --config elastic.toml --port 18080
//! elasticd config --config elastic.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use elastic_autoscale::Autoscaler;
use elastic_core::ElasticConfig;
use elastic_sampler::ProcfsThreadSource;
use elastic_worker::WorkerPool;

const DEFAULT_LOG_FILTER: &str = "info,elasticd=debug,elastic=debug";

#[derive(Parser)]
#[command(name = "elasticd", about = "Elastic worker service daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker service with the autoscaler.
    Run(Overrides),

    /// Print the effective configuration as TOML and exit.
    Config(Overrides),
}

/// Config file location and per-key overrides.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Path to an elastic.toml file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Pool floor.
    #[arg(long)]
    min_instances: Option<u32>,

    /// Pool ceiling.
    #[arg(long)]
    max_instances: Option<u32>,

    /// Per-thread load above which an interval is a violation, in (0, 1].
    #[arg(long)]
    load_threshold: Option<f64>,

    /// Checking ticks to wait after a scale-up before scaling down.
    #[arg(long)]
    grace_period_cycles: Option<u32>,

    /// Intervals kept per thread.
    #[arg(long)]
    monitor_window: Option<usize>,

    /// Violations in the window that trigger a scale-up.
    #[arg(long)]
    max_threshold_violations: Option<usize>,

    /// Checking interval in milliseconds.
    #[arg(long)]
    check_interval_ms: Option<u64>,

    /// Polling interval in milliseconds.
    #[arg(long)]
    polling_interval_ms: Option<u64>,

    /// Iterations of the synthetic workload per request.
    #[arg(long)]
    load_factor: Option<u32>,
}

impl Overrides {
    /// Load the config file (if any) and apply flag overrides on top.
    fn load(&self) -> anyhow::Result<ElasticConfig> {
        let mut config = match &self.config {
            Some(path) => ElasticConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ElasticConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut ElasticConfig) {
        let a = &mut config.autoscaler;
        a.min_instances = self.min_instances.or(a.min_instances);
        a.max_instances = self.max_instances.or(a.max_instances);
        a.load_threshold = self.load_threshold.or(a.load_threshold);
        a.grace_period_cycles = self.grace_period_cycles.or(a.grace_period_cycles);
        a.monitor_window = self.monitor_window.or(a.monitor_window);
        a.max_threshold_violations = self.max_threshold_violations.or(a.max_threshold_violations);
        a.check_interval_ms = self.check_interval_ms.or(a.check_interval_ms);
        a.polling_interval_ms = self.polling_interval_ms.or(a.polling_interval_ms);

        let w = &mut config.worker;
        w.port = self.port.or(w.port);
        w.load_factor = self.load_factor.or(w.load_factor);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run(overrides) => run(overrides.load()?).await,
        Command::Config(overrides) => {
            print!("{}", overrides.load()?.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: ElasticConfig) -> anyhow::Result<()> {
    info!("Elastic daemon starting");

    let settings = config.settings().context("invalid autoscaler configuration")?;
    let worker_settings = config
        .worker_settings()
        .context("invalid worker configuration")?;
    info!("effective configuration:\n{}", config.to_toml_string()?);
    info!(?settings, "autoscaler settings");

    // Bind before any worker starts so a taken port leaves nothing behind.
    let addr = SocketAddr::from(([0, 0, 0, 0], worker_settings.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    // ── Initialize subsystems ──────────────────────────────────

    let pool = WorkerPool::new(worker_settings);
    let mut autoscaler = Autoscaler::new(
        settings,
        Arc::new(ProcfsThreadSource::new()),
        Arc::new(pool.clone()),
    );
    let status = autoscaler.subscribe();

    // ── Start background tasks ─────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let autoscale_handle = tokio::spawn(async move {
        autoscaler.run(shutdown_rx).await;
    });

    // ── Start API server ───────────────────────────────────────

    let router = elastic_api::build_router(pool.clone(), status);
    info!(%addr, "API server listening");

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let served = server.await;

    // Stop scaling before tearing the pool down.
    let _ = autoscale_handle.await;
    pool.stop_all().await;

    served?;
    info!("Elastic daemon stopped");
    Ok(())
}

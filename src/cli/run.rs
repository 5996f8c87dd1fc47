//! Handler for the `run` command.

use std::sync::Arc;

use tokio::signal;
use tracing::info;

use crate::adapter::outbound::http::{HttpResultSource, HttpValuationEngine};
use crate::cli::RunArgs;
use crate::error::Result;
use crate::infrastructure::config::{Config, LogFormat};
use crate::infrastructure::Services;

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;

    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = LogFormat::Json;
    }
    if let Some(workers) = args.workers {
        config.scheduler.workers = workers;
        config.scheduler.validate()?;
    }

    config.init_logging();

    let timeout = config.endpoints.request_timeout();
    let valuation_url = config.endpoints.valuation()?;
    let results_url = config.endpoints.results()?;
    info!(
        workers = config.scheduler.workers,
        valuation = %valuation_url,
        results = %results_url,
        "edgeguard starting"
    );

    let engine = HttpValuationEngine::new(valuation_url, timeout);
    let results = HttpResultSource::new(results_url, timeout);

    let mut services = Services::build(&config, Arc::new(engine), Arc::new(results));
    services.start();

    let signal = signal::ctrl_c().await;
    info!("Shutdown signal received");
    services.shutdown().await;
    signal?;

    info!("edgeguard stopped");
    Ok(())
}

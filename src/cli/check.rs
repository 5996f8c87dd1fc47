//! Handler for the `check-config` command.

use std::path::Path;

use crate::error::Result;
use crate::infrastructure::config::Config;

/// Validate a configuration file without starting anything.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    println!("Checking configuration: {}", path.display());
    println!();

    let config = Config::load(path)?;
    println!("✓ Configuration file is valid");
    println!();
    print_summary(&config);
    println!();

    match (&config.endpoints.valuation_url, &config.endpoints.results_url) {
        (Some(_), Some(_)) => println!("Configuration is ready to use."),
        _ => {
            println!("⚠ `run` needs both endpoints:");
            if config.endpoints.valuation_url.is_none() {
                println!("    - endpoints.valuation_url");
            }
            if config.endpoints.results_url.is_none() {
                println!("    - endpoints.results_url");
            }
        }
    }
    Ok(())
}

fn print_summary(config: &Config) {
    let s = &config.scheduler;
    println!("Scheduler:");
    println!("  Workers: {}", s.workers);
    println!(
        "  Queue: max {} (saturation {:.0}%, action {:?})",
        s.queue_max_size,
        s.saturation_threshold * 100.0,
        s.saturation_action
    );
    println!("  Debounce: {}ms", s.debounce_window_ms);
    println!(
        "  Timeouts: fast {}ms, full {}ms",
        s.fast_timeout_ms, s.full_timeout_ms
    );
    println!(
        "  Breaker: {} failures / {}s, {} per prop",
        s.breaker.failure_threshold, s.breaker.window_secs, s.breaker.prop_failure_threshold
    );

    println!("Edges:");
    println!("  Cleanup every {}s", config.edges.cleanup_interval_secs);

    let c = &config.calibration;
    println!("Calibration:");
    println!("  Min samples: {}", c.min_samples);
    println!(
        "  Alerts: calibration error > {:.2}, accuracy drop > {:.2}",
        c.alert_calibration_error, c.alert_accuracy_drop
    );

    let st = &config.settlement;
    println!("Settlement:");
    println!("  Poll every {}s", st.poll_interval_secs);
    println!(
        "  Outlier ratio {:.2}, mismatch confidence {:.2}",
        st.outlier_error_ratio, st.mismatch_confidence
    );

    println!("Telemetry:");
    println!("  Snapshot every {}s", config.telemetry.interval_secs);

    println!("Endpoints:");
    println!(
        "  Valuation: {}",
        config.endpoints.valuation_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Results: {}",
        config.endpoints.results_url.as_deref().unwrap_or("(not set)")
    );
}

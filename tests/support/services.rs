use std::sync::Arc;

use edgeguard::infrastructure::config::Config;
use edgeguard::infrastructure::Services;
use edgeguard::testkit::results::StaticResultSource;
use edgeguard::testkit::valuation::ScriptedValuationEngine;

/// Services wired to scripted collaborators, with handles to both.
pub struct TestServices {
    pub services: Services,
    pub engine: Arc<ScriptedValuationEngine>,
    pub results: Arc<StaticResultSource>,
}

/// Default config with the single-worker test scheduler.
pub fn config() -> Config {
    Config {
        scheduler: edgeguard::testkit::config::scheduler(),
        ..Config::default()
    }
}

pub fn build(config: &Config, engine: ScriptedValuationEngine) -> TestServices {
    let engine = Arc::new(engine);
    let results = Arc::new(StaticResultSource::default());
    let services = Services::build(config, engine.clone(), results.clone());
    TestServices {
        services,
        engine,
        results,
    }
}

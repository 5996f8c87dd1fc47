//! Scripted [`ValuationEngine`] for scheduler tests.
//!
//! Each call pops the next scripted step; once the script runs out the
//! fallback step repeats. Per-game steps override both, which lets a test mix
//! failing and healthy games on one engine.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::id::GameId;
use crate::domain::recompute::RecomputeJob;
use crate::error::ValuationError;
use crate::port::outbound::valuation::{Valuation, ValuationEngine};

/// What the engine does for one call.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Succeed(Valuation),
    Fail(ValuationError),
    /// Sleep, then succeed. Sleeps longer than the job budget time out.
    Delay(Duration, Valuation),
    Panic(String),
}

impl ScriptedStep {
    /// Succeed with no props updated and no edge updates.
    #[must_use]
    pub fn ok() -> Self {
        Self::Succeed(Valuation::default())
    }

    #[must_use]
    pub fn fail(message: &str) -> Self {
        Self::Fail(ValuationError::Rejected(message.to_string()))
    }
}

pub struct ScriptedValuationEngine {
    steps: Mutex<VecDeque<ScriptedStep>>,
    per_game: Mutex<HashMap<GameId, ScriptedStep>>,
    fallback: ScriptedStep,
    calls: Mutex<Vec<RecomputeJob>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedValuationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::with_fallback(ScriptedStep::ok())
    }

    /// An engine that repeats `fallback` for every unscripted call.
    #[must_use]
    pub fn with_fallback(fallback: ScriptedStep) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            per_game: Mutex::new(HashMap::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_steps(self, steps: Vec<ScriptedStep>) -> Self {
        *self.steps.lock() = steps.into();
        self
    }

    /// Always use `step` for jobs of `game_id`.
    #[must_use]
    pub fn with_game_step(self, game_id: impl Into<GameId>, step: ScriptedStep) -> Self {
        self.per_game.lock().insert(game_id.into(), step);
        self
    }

    /// Jobs received so far, in call order.
    pub fn calls(&self) -> Vec<RecomputeJob> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, game_id: &GameId) -> ScriptedStep {
        if let Some(step) = self.per_game.lock().get(game_id) {
            return step.clone();
        }
        self.steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for ScriptedValuationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight gauge even when the call is aborted.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ValuationEngine for ScriptedValuationEngine {
    async fn recompute(&self, job: RecomputeJob) -> Result<Valuation, ValuationError> {
        let step = self.next_step(&job.game_id);
        self.calls.lock().push(job);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match step {
            ScriptedStep::Succeed(valuation) => Ok(valuation),
            ScriptedStep::Fail(error) => Err(error),
            ScriptedStep::Delay(delay, valuation) => {
                tokio::time::sleep(delay).await;
                Ok(valuation)
            }
            ScriptedStep::Panic(message) => panic!("{message}"),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

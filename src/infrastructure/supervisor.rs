//! Supervised periodic tasks.
//!
//! Every background loop is spawned here so shutdown can cancel and join
//! them together.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Supervised {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Owns the cancellation token and handles of background tasks.
pub struct Supervisor {
    token: CancellationToken,
    tasks: Vec<Supervised>,
}

impl Supervisor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Token cancelled by [`Supervisor::shutdown`].
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Number of tasks spawned and not yet joined.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Run `tick` every `period` until shutdown.
    ///
    /// The first run happens one period after spawning. Ticks missed while a
    /// run is in progress are skipped. A run in progress at shutdown is
    /// allowed to finish.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(
                task = name,
                period_ms = period.as_millis() as u64,
                "Periodic task started"
            );

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = interval.tick() => tick().await,
                }
            }
            debug!(task = name, "Periodic task stopped");
        });
        self.tasks.push(Supervised { name, handle });
    }

    /// Cancel every task and wait for them to finish.
    pub async fn shutdown(&mut self) {
        self.token.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.handle.await {
                warn!(task = task.name, error = %e, "Supervised task ended abnormally");
            }
        }
        info!("Supervisor stopped");
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

//! Per-game debounce window.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::id::GameId;

/// Tracks the last accepted trigger per game.
pub(crate) struct Debouncer {
    window: Duration,
    last_accepted: HashMap<GameId, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: HashMap::new(),
        }
    }

    /// Whether a trigger for `game_id` at `now` falls inside the window.
    pub fn is_debounced(&self, game_id: &GameId, now: Instant) -> bool {
        self.last_accepted
            .get(game_id)
            .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
    }

    /// Record an accepted trigger and drop entries that can no longer debounce.
    pub fn accept(&mut self, game_id: &GameId, now: Instant) {
        let window = self.window;
        self.last_accepted
            .retain(|_, last| now.saturating_duration_since(*last) < window);
        self.last_accepted.insert(game_id.clone(), now);
    }

    pub fn tracked_games(&self) -> usize {
        self.last_accepted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn window_is_per_game_and_expires() {
        let mut debouncer = Debouncer::new(Duration::from_secs(2));
        let g1 = GameId::new("G1");
        let g2 = GameId::new("G2");

        debouncer.accept(&g1, Instant::now());
        assert!(debouncer.is_debounced(&g1, Instant::now()));
        assert!(!debouncer.is_debounced(&g2, Instant::now()));

        tokio::time::advance(Duration::from_millis(1999)).await;
        assert!(debouncer.is_debounced(&g1, Instant::now()));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!debouncer.is_debounced(&g1, Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entries_are_pruned_on_accept() {
        let mut debouncer = Debouncer::new(Duration::from_secs(2));
        debouncer.accept(&GameId::new("G1"), Instant::now());
        tokio::time::advance(Duration::from_secs(3)).await;
        debouncer.accept(&GameId::new("G2"), Instant::now());
        assert_eq!(debouncer.tracked_games(), 1);
    }
}

//! In-memory [`GameResultSource`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::id::GameId;
use crate::domain::settlement::GameResult;
use crate::error::ResultSourceError;
use crate::port::outbound::results::GameResultSource;

/// Serves results that tests insert; unknown games are not completed yet.
#[derive(Default)]
pub struct StaticResultSource {
    results: RwLock<HashMap<GameId, GameResult>>,
    failing: RwLock<HashSet<GameId>>,
    fetches: AtomicUsize,
}

impl StaticResultSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_result(self, result: GameResult) -> Self {
        self.insert(result);
        self
    }

    /// Make a game's result available, as if the game just completed.
    pub fn insert(&self, result: GameResult) {
        self.results.write().insert(result.game_id.clone(), result);
    }

    /// Fail every fetch for `game_id`.
    pub fn fail_game(&self, game_id: impl Into<GameId>) {
        self.failing.write().insert(game_id.into());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GameResultSource for StaticResultSource {
    async fn fetch_game_result(
        &self,
        game_id: &GameId,
    ) -> Result<Option<GameResult>, ResultSourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.read().contains(game_id) {
            return Err(ResultSourceError::Unavailable(format!(
                "scripted failure for {game_id}"
            )));
        }
        Ok(self.results.read().get(game_id).cloned())
    }
}

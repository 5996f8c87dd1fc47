//! Game result source port.

use async_trait::async_trait;

use crate::domain::{id::GameId, settlement::GameResult};
use crate::error::ResultSourceError;

/// Port for fetching completed game results from a sports-data service.
#[async_trait]
pub trait GameResultSource: Send + Sync {
    /// Fetch the final result for a game.
    ///
    /// Returns `Ok(None)` while the game has not completed.
    async fn fetch_game_result(
        &self,
        game_id: &GameId,
    ) -> Result<Option<GameResult>, ResultSourceError>;
}

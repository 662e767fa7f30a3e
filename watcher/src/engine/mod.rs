pub mod uci;

use async_trait::async_trait;
use board_watch_common::score::Score;
use serde::Serialize;

/// Result of one engine search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// UCI move, `None` when the side to move has no legal move.
    pub best_move: Option<String>,
    /// Relative to the side to move.
    pub score: Score,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to spawn engine: {0}")]
    Spawn(String),
    #[error("failed to write to engine stdin: {0}")]
    Write(String),
    #[error("failed to read engine output: {0}")]
    Read(String),
    #[error("engine exited unexpectedly")]
    Exited,
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("no position set")]
    NoPosition,
}

/// A chess engine connection.
///
/// A failed call leaves the connection in an unknown state; callers recover
/// with [`Evaluator::reconnect`].
#[async_trait]
pub trait Evaluator: Send {
    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError>;

    fn set_search_depth(&mut self, depth: u32);

    async fn evaluate(&mut self) -> Result<Evaluation, EngineError>;

    /// Discard the current connection and open a fresh one.
    async fn reconnect(&mut self) -> Result<(), EngineError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

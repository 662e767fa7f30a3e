//! Latest-only publication of loop results.
//!
//! The loop never waits on consumers: every update replaces the current
//! [`Report`] in a `watch` channel, and slow readers simply see the newest one.

use board_watch_common::position::{Color, PositionRecord};
use board_watch_common::score::{EvalBar, Score};
use serde::Serialize;
use tokio::sync::watch;

use crate::engine::Evaluation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    WaitingForFirstMove,
    BoardUnchanged,
    NoMoverDetected,
    OpponentTurn,
    InvalidPosition,
    Analysed,
    EngineError,
    Crashed,
    Paused,
}

impl Status {
    pub fn message(self) -> &'static str {
        match self {
            Status::Idle => "Idle",
            Status::WaitingForFirstMove => "Waiting for first move...",
            Status::BoardUnchanged => "Board unchanged",
            Status::NoMoverDetected => "No move detected",
            Status::OpponentTurn => "Opponent to move",
            Status::InvalidPosition => "Invalid position",
            Status::Analysed => "Analysis ready",
            Status::EngineError => "Engine error, restarting engine",
            Status::Crashed => "Watcher crashed, restarting",
            Status::Paused => "Paused",
        }
    }
}

/// Engine result for one accepted position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub fen: String,
    pub side_to_move: Color,
    pub best_move: Option<String>,
    /// Relative to the side to move, as reported by the engine.
    pub score: Score,
    pub eval_bar: EvalBar,
}

impl Analysis {
    pub fn new(record: &PositionRecord, evaluation: Evaluation, viewer: Color) -> Self {
        let side_to_move = record.side_to_move.unwrap_or(Color::White);
        Self {
            fen: record.fen(),
            side_to_move,
            best_move: evaluation.best_move,
            score: evaluation.score,
            eval_bar: EvalBar::new(evaluation.score, side_to_move, viewer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub status: Status,
    pub message: String,
    /// Error text for `EngineError` and `Crashed`.
    pub detail: Option<String>,
    /// Most recent analysis; kept across later statuses.
    pub analysis: Option<Analysis>,
    pub cycles: u64,
    pub updated_at_ms: i64,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            status: Status::Idle,
            message: Status::Idle.message().to_string(),
            detail: None,
            analysis: None,
            cycles: 0,
            updated_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

pub struct Presenter {
    tx: watch::Sender<Report>,
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Report::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Report> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Report {
        self.tx.borrow().clone()
    }

    pub fn status(&self, status: Status, cycles: u64) {
        self.publish(status, None, None, cycles);
    }

    pub fn error(&self, status: Status, detail: String, cycles: u64) {
        self.publish(status, Some(detail), None, cycles);
    }

    /// Record a cycle that changed nothing visible.
    pub fn tick(&self, cycles: u64) {
        self.tx.send_modify(|report| {
            report.cycles = cycles;
            report.updated_at_ms = chrono::Utc::now().timestamp_millis();
        });
    }

    pub fn analysis(&self, analysis: Analysis, cycles: u64) {
        self.publish(Status::Analysed, None, Some(analysis), cycles);
    }

    fn publish(
        &self,
        status: Status,
        detail: Option<String>,
        analysis: Option<Analysis>,
        cycles: u64,
    ) {
        self.tx.send_modify(|report| {
            report.status = status;
            report.message = status.message().to_string();
            report.detail = detail;
            if analysis.is_some() {
                report.analysis = analysis;
            }
            report.cycles = cycles;
            report.updated_at_ms = chrono::Utc::now().timestamp_millis();
        });
    }
}

use std::time::Duration;

use board_watch_common::config::RetryConfig;
use board_watch_common::position::PositionRecord;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureError, CaptureSource};
use crate::classifier::BoardClassifier;
use crate::control::{ControlHandle, Settings};
use crate::engine::{EngineError, Evaluation, Evaluator};
use crate::filter::{FrameFilter, PixelChangeGate};
use crate::presenter::{Analysis, Presenter, Report, Status};
use crate::rules::PositionValidator;
use crate::tracker::{BoardTracker, Decision};

/// A cycle failure that escapes in-cycle recovery.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("engine restart failed: {0}")]
    EngineRestart(#[source] EngineError),
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("giving up after {failures} consecutive failed cycles: {last}")]
    TooManyFailures { failures: u32, last: CycleError },
}

/// The sequential capture → gate → classify → track → evaluate loop.
///
/// All cached state (previous frame, baseline, last accepted position) lives
/// in fields owned by the loop.
pub struct WatchLoop {
    capture: Box<dyn CaptureSource>,
    classifier: Box<dyn BoardClassifier>,
    evaluator: Box<dyn Evaluator>,
    validator: Box<dyn PositionValidator>,
    gate: PixelChangeGate,
    tracker: BoardTracker,
    presenter: Presenter,
    control: ControlHandle,
    retry: RetryConfig,
    normalize_size: u32,
    cycles: u64,
}

impl WatchLoop {
    pub fn new(
        capture: Box<dyn CaptureSource>,
        classifier: Box<dyn BoardClassifier>,
        evaluator: Box<dyn Evaluator>,
        validator: Box<dyn PositionValidator>,
        control: ControlHandle,
        retry: RetryConfig,
        normalize_size: u32,
    ) -> Self {
        Self {
            capture,
            classifier,
            evaluator,
            validator,
            gate: PixelChangeGate::new(),
            tracker: BoardTracker::new(),
            presenter: Presenter::new(),
            control,
            retry,
            normalize_size,
            cycles: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Report> {
        self.presenter.subscribe()
    }

    /// Run until shutdown is requested or too many consecutive cycles fail.
    pub async fn run(mut self) -> Result<(), RunError> {
        let initial_backoff = Duration::from_millis(self.retry.initial_backoff_ms);
        let max_backoff = Duration::from_millis(self.retry.max_backoff_ms);
        let mut backoff = initial_backoff;
        let mut failures: u32 = 0;

        info!(
            capture = self.capture.name(),
            gate = self.gate.name(),
            classifier = self.classifier.name(),
            evaluator = self.evaluator.name(),
            "watch loop started"
        );

        while !self.control.is_shutdown() {
            if !self.control.is_active() {
                if self.presenter.current().status != Status::Paused {
                    self.presenter.status(Status::Paused, self.cycles);
                }
                self.control.changed().await;
                continue;
            }

            let settings = self.control.settings();
            match self.run_cycle(&settings).await {
                Ok(status) => {
                    debug!(cycle = self.cycles, ?status, "cycle complete");
                    failures = 0;
                    backoff = initial_backoff;
                    pause(&self.control, settings.cooldown()).await;
                }
                Err(e) => {
                    failures += 1;
                    error!(error = %e, failures, "watch cycle failed");
                    self.presenter
                        .error(Status::Crashed, e.to_string(), self.cycles);

                    let limit = self.retry.max_consecutive_failures;
                    if limit > 0 && failures >= limit {
                        return Err(RunError::TooManyFailures { failures, last: e });
                    }
                    if let Err(e) = self.evaluator.reconnect().await {
                        warn!(error = %e, "engine reset after crash failed");
                    }
                    warn!(backoff_ms = backoff.as_millis() as u64, "restarting watch loop");
                    pause(&self.control, backoff).await;
                    backoff = (backoff * 2).min(max_backoff);
                }
            }
        }

        info!(cycles = self.cycles, "watch loop stopped");
        Ok(())
    }

    /// One pass through the pipeline. Evaluator failures are recovered here;
    /// anything else is returned to the loop.
    pub async fn run_cycle(&mut self, settings: &Settings) -> Result<Status, CycleError> {
        self.cycles += 1;

        let frame = self.capture.capture().await?;
        let image = frame.normalized(self.normalize_size);
        if !self.gate.has_changed(&image) {
            self.presenter.tick(self.cycles);
            return Ok(Status::BoardUnchanged);
        }

        let raw = self
            .classifier
            .classify(&image, settings.my_color)
            .await;
        debug!(seq = frame.seq, raw, "board classified");

        let status = match self.tracker.observe(&raw, settings, self.validator.as_ref()) {
            Decision::Baseline => Status::WaitingForFirstMove,
            Decision::NoMover(_) => Status::NoMoverDetected,
            Decision::OpponentTurn(_) => Status::OpponentTurn,
            Decision::Invalid(_) => Status::InvalidPosition,
            Decision::Unchanged(_) => Status::BoardUnchanged,
            Decision::Evaluate(record) => return self.evaluate(&record, settings).await,
        };
        self.presenter.status(status, self.cycles);
        Ok(status)
    }

    async fn evaluate(
        &mut self,
        record: &PositionRecord,
        settings: &Settings,
    ) -> Result<Status, CycleError> {
        match search(self.evaluator.as_mut(), &record.fen(), settings.depth).await {
            Ok(evaluation) => {
                info!(
                    fen = %record,
                    best_move = ?evaluation.best_move,
                    score = %evaluation.score,
                    "position analysed"
                );
                let analysis = Analysis::new(record, evaluation, settings.my_color);
                self.presenter.analysis(analysis, self.cycles);
                Ok(Status::Analysed)
            }
            Err(e) => {
                warn!(error = %e, fen = %record, "engine failed, reconnecting");
                self.presenter
                    .error(Status::EngineError, e.to_string(), self.cycles);
                self.evaluator
                    .reconnect()
                    .await
                    .map_err(CycleError::EngineRestart)?;
                Ok(Status::EngineError)
            }
        }
    }
}

/// Sleep, waking early on a control request.
async fn pause(control: &ControlHandle, duration: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = control.changed() => {}
    }
}

async fn search(
    evaluator: &mut dyn Evaluator,
    fen: &str,
    depth: u32,
) -> Result<Evaluation, EngineError> {
    evaluator.set_position(fen).await?;
    evaluator.set_search_depth(depth);
    evaluator.evaluate().await
}

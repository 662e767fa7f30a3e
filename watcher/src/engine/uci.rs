use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use board_watch_common::config::EngineConfig;
use board_watch_common::score::Score;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::{EngineError, Evaluation, Evaluator};

/// A running UCI engine process.
struct UciProcess {
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl UciProcess {
    /// Spawn the engine and complete the `uci` / `isready` handshake.
    async fn spawn(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut cmd = Command::new(&config.path);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {e}", config.path)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("could not get stdin handle".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("could not get stdout handle".into()))?;

        let mut process = Self {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let ready_timeout = Duration::from_secs(config.ready_timeout_secs);
        process.send("uci").await?;
        process
            .read_until(ready_timeout, "uciok", |line| line == "uciok")
            .await?;
        process
            .send(&format!("setoption name Threads value {}", config.threads))
            .await?;
        process
            .send(&format!(
                "setoption name Minimum Thinking Time value {}",
                config.minimum_thinking_time_ms
            ))
            .await?;
        process.sync(ready_timeout).await?;

        info!(path = config.path, threads = config.threads, "engine started");
        Ok(process)
    }

    async fn send(&mut self, command: &str) -> Result<(), EngineError> {
        debug!(command, "engine <");
        self.stdin
            .write_all(format!("{command}\n").as_bytes())
            .await
            .map_err(|e| EngineError::Write(e.to_string()))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| EngineError::Write(e.to_string()))
    }

    async fn next_line(&mut self) -> Result<String, EngineError> {
        match self.stdout.next_line().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(EngineError::Exited),
            Err(e) => Err(EngineError::Read(e.to_string())),
        }
    }

    /// Read lines until `done` accepts one, giving up after `timeout`.
    async fn read_until(
        &mut self,
        timeout: Duration,
        waiting_for: &'static str,
        mut done: impl FnMut(&str) -> bool,
    ) -> Result<(), EngineError> {
        tokio::time::timeout(timeout, async {
            loop {
                let line = self.next_line().await?;
                if done(line.trim()) {
                    return Ok(());
                }
            }
        })
        .await
        .map_err(|_| EngineError::Timeout(waiting_for))?
    }

    async fn sync(&mut self, timeout: Duration) -> Result<(), EngineError> {
        self.send("isready").await?;
        self.read_until(timeout, "readyok", |line| line == "readyok")
            .await
    }
}

/// Parse the score of an `info` line. Bound scores are ignored.
pub fn parse_info_score(line: &str) -> Option<Score> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "info" {
        return None;
    }
    while let Some(token) = tokens.next() {
        if token != "score" {
            continue;
        }
        let kind = tokens.next()?;
        let value: i32 = tokens.next()?.parse().ok()?;
        if matches!(tokens.next(), Some("lowerbound" | "upperbound")) {
            return None;
        }
        return match kind {
            "cp" => Some(Score::Centipawns(value)),
            "mate" => Some(Score::Mate(value)),
            _ => None,
        };
    }
    None
}

/// Parse a `bestmove` line. The outer `None` means "not a bestmove line";
/// `Some(None)` means the engine reported no move.
pub fn parse_bestmove(line: &str) -> Option<Option<String>> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "bestmove" {
        return None;
    }
    match tokens.next() {
        None | Some("(none)") | Some("0000") => Some(None),
        Some(mv) => Some(Some(mv.to_string())),
    }
}

/// UCI engine (e.g. Stockfish) driven over stdin/stdout.
///
/// The process is started lazily on first use and restarted by
/// [`Evaluator::reconnect`].
pub struct UciEngine {
    config: EngineConfig,
    process: Option<UciProcess>,
    position: Option<String>,
    depth: u32,
}

impl UciEngine {
    pub fn new(config: EngineConfig) -> Self {
        let depth = config.depth;
        Self {
            config,
            process: None,
            position: None,
            depth,
        }
    }

    async fn process(&mut self) -> Result<&mut UciProcess, EngineError> {
        if self.process.is_none() {
            self.process = Some(UciProcess::spawn(&self.config).await?);
        }
        self.process.as_mut().ok_or(EngineError::Exited)
    }
}

#[async_trait]
impl Evaluator for UciEngine {
    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
        let timeout = Duration::from_secs(self.config.ready_timeout_secs);
        let process = self.process().await?;
        process.send("ucinewgame").await?;
        process.send(&format!("position fen {fen}")).await?;
        process.sync(timeout).await?;
        self.position = Some(fen.to_string());
        Ok(())
    }

    fn set_search_depth(&mut self, depth: u32) {
        self.depth = depth.max(1);
    }

    async fn evaluate(&mut self) -> Result<Evaluation, EngineError> {
        if self.position.is_none() {
            return Err(EngineError::NoPosition);
        }
        let depth = self.depth;
        let timeout = Duration::from_secs(self.config.search_timeout_secs);
        let process = self.process().await?;
        process.send(&format!("go depth {depth}")).await?;

        let mut score = None;
        let mut best_move = None;
        process
            .read_until(timeout, "bestmove", |line| {
                if let Some(s) = parse_info_score(line) {
                    score = Some(s);
                    return false;
                }
                match parse_bestmove(line) {
                    Some(mv) => {
                        best_move = mv;
                        true
                    }
                    None => false,
                }
            })
            .await?;

        let evaluation = Evaluation {
            best_move,
            score: score.unwrap_or(Score::Centipawns(0)),
        };
        debug!(
            depth,
            best_move = ?evaluation.best_move,
            score = %evaluation.score,
            "search finished"
        );
        Ok(evaluation)
    }

    async fn reconnect(&mut self) -> Result<(), EngineError> {
        if let Some(mut old) = self.process.take() {
            if let Err(e) = old.send("quit").await {
                debug!(error = %e, "engine did not accept quit");
            }
        }
        self.position = None;
        warn!(path = self.config.path, "restarting engine");
        self.process = Some(UciProcess::spawn(&self.config).await?);
        Ok(())
    }

    fn name(&self) -> &str {
        "uci"
    }
}

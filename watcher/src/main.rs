mod capture;
mod classifier;
mod control;
mod engine;
mod filter;
mod presenter;
mod rules;
mod runner;
mod server;
mod tracker;

use std::path::PathBuf;
use std::sync::Arc;

use board_watch_common::config::Config;
use control::{ControlHandle, Settings};
use engine::uci::UciEngine;
use presenter::{Report, Status};
use runner::WatchLoop;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        source = config.capture.source,
        classifier = config.classifier.backend,
        engine = config.engine.path,
        depth = config.engine.depth,
        my_color = %config.watch.my_color,
        policy = ?config.watch.policy,
        cooldown_secs = config.watch.cooldown_secs,
        "starting board-watch"
    );

    let capture = match capture::from_config(&config.capture) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to set up capture source");
            std::process::exit(1);
        }
    };
    let classifier = match classifier::from_config(&config.classifier) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to set up board classifier");
            std::process::exit(1);
        }
    };

    let control = ControlHandle::new(Settings::from_config(&config), config.watch.autostart);
    let watch_loop = WatchLoop::new(
        capture,
        classifier,
        Box::new(UciEngine::new(config.engine.clone())),
        Box::new(rules::ShakmatyValidator),
        control.clone(),
        config.retry.clone(),
        config.capture.normalize_size,
    );
    let reports = watch_loop.subscribe();

    if config.server.enabled {
        let state = Arc::new(server::AppState {
            control: control.clone(),
            reports: reports.clone(),
        });
        let port = config.server.port;
        tokio::spawn(async move {
            if let Err(e) = server::serve(port, state).await {
                error!(error = %e, port, "status server failed");
            }
        });
    }

    tokio::spawn(log_reports(reports));

    let shutdown = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current cycle");
            shutdown.shutdown();
        }
    });

    if let Err(e) = watch_loop.run().await {
        error!(error = %e, "watch loop stopped");
        std::process::exit(1);
    }
}

/// Log each new status and each new analysis as it is published.
async fn log_reports(mut reports: watch::Receiver<Report>) {
    let mut last: Option<(Status, Option<String>)> = None;
    while reports.changed().await.is_ok() {
        let report = reports.borrow_and_update().clone();
        let key = (
            report.status,
            report.analysis.as_ref().map(|a| a.fen.clone()),
        );
        if last.as_ref() == Some(&key) {
            continue;
        }
        last = Some(key);

        match (&report.status, &report.analysis) {
            (Status::Analysed, Some(analysis)) => info!(
                fen = analysis.fen,
                best_move = analysis.best_move.as_deref().unwrap_or("(none)"),
                score = %analysis.score,
                eval = analysis.eval_bar.label,
                "analysis"
            ),
            _ => info!(
                status = ?report.status,
                message = report.message,
                detail = report.detail.as_deref().unwrap_or(""),
                cycles = report.cycles,
                "status"
            ),
        }
    }
}

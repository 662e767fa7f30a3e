//! Runtime controls shared between the watch loop and the HTTP server.
//!
//! The loop reads [`Settings`] and the start/pause flag once per cycle; a cycle
//! that is already running always completes with the values it started with.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use board_watch_common::config::{AcceptancePolicy, Config};
use board_watch_common::position::Color;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tracing::info;

/// Deepest search the settings endpoint accepts.
pub const MAX_DEPTH: u32 = 50;

/// User-adjustable watch settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub my_color: Color,
    pub depth: u32,
    pub cooldown_secs: f64,
    pub policy: AcceptancePolicy,
    pub skip_opponent_turn: bool,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            my_color: config.watch.my_color,
            depth: config.engine.depth,
            cooldown_secs: config.watch.cooldown_secs,
            policy: config.watch.policy,
            skip_opponent_turn: config.watch.skip_opponent_turn,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs.max(0.0))
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SettingsError {
    #[error("depth must be between 1 and {MAX_DEPTH}, got {0}")]
    Depth(u32),
    #[error("cooldown_secs must be a non-negative number, got {0}")]
    Cooldown(f64),
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsPatch {
    pub my_color: Option<Color>,
    pub depth: Option<u32>,
    pub cooldown_secs: Option<f64>,
    pub policy: Option<AcceptancePolicy>,
    pub skip_opponent_turn: Option<bool>,
}

impl SettingsPatch {
    pub fn apply(&self, current: &Settings) -> Result<Settings, SettingsError> {
        let mut next = current.clone();
        if let Some(color) = self.my_color {
            next.my_color = color;
        }
        if let Some(depth) = self.depth {
            if depth == 0 || depth > MAX_DEPTH {
                return Err(SettingsError::Depth(depth));
            }
            next.depth = depth;
        }
        if let Some(cooldown) = self.cooldown_secs {
            if !cooldown.is_finite() || cooldown < 0.0 {
                return Err(SettingsError::Cooldown(cooldown));
            }
            next.cooldown_secs = cooldown;
        }
        if let Some(policy) = self.policy {
            next.policy = policy;
        }
        if let Some(skip) = self.skip_opponent_turn {
            next.skip_opponent_turn = skip;
        }
        Ok(next)
    }
}

/// Cloneable handle to the loop's start/pause/shutdown flags and settings.
#[derive(Clone)]
pub struct ControlHandle {
    active: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
    settings: Arc<watch::Sender<Settings>>,
}

impl ControlHandle {
    pub fn new(settings: Settings, active: bool) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self {
            active: Arc::new(AtomicBool::new(active)),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            settings: Arc::new(tx),
        }
    }

    /// Repeated starts leave no wake-up behind.
    pub fn start(&self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            info!("watching started");
            self.wake.notify_one();
        }
    }

    pub fn pause(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("watching paused");
            self.wake.notify_one();
        }
    }

    /// Ask the loop to exit after the current cycle.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Resolves on the next start, pause or shutdown request.
    pub async fn changed(&self) {
        self.wake.notified().await;
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings, SettingsError> {
        let next = patch.apply(&self.settings.borrow())?;
        self.settings.send_replace(next.clone());
        info!(
            my_color = %next.my_color,
            depth = next.depth,
            cooldown_secs = next.cooldown_secs,
            policy = ?next.policy,
            skip_opponent_turn = next.skip_opponent_turn,
            "settings updated"
        );
        Ok(next)
    }
}

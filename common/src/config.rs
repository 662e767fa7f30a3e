use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::position::Color;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub capture: CaptureConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// "file", "http" or "screen".
    pub source: String,
    /// Snapshot URL for the "http" source.
    pub url: Option<String>,
    /// Image path for the "file" source.
    pub path: Option<PathBuf>,
    /// Board region inside the captured image (or on screen).
    pub region: Option<Region>,
    #[serde(default = "default_normalize_size")]
    pub normalize_size: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// "command" or "onnx".
    #[serde(default = "default_classifier_backend")]
    pub backend: String,
    /// Predictor executable for the "command" backend.
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Model file for the "onnx" backend.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_path")]
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_threads")]
    pub threads: u32,
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default = "default_min_thinking_time")]
    pub minimum_thinking_time_ms: u64,
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
}

/// How a classified board is turned into an evaluable position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptancePolicy {
    /// Infer the side to move from the first square that changed.
    Diff,
    /// Trust the side to move reported by the classifier.
    Classifier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_my_color")]
    pub my_color: Color,
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: f64,
    #[serde(default = "default_policy")]
    pub policy: AcceptancePolicy,
    #[serde(default)]
    pub skip_opponent_turn: bool,
    #[serde(default = "default_true")]
    pub autostart: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// 0 keeps retrying forever.
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: default_classifier_backend(),
            program: None,
            args: Vec::new(),
            model_path: None,
            timeout_secs: default_classifier_timeout(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            args: Vec::new(),
            threads: default_threads(),
            depth: default_depth(),
            minimum_thinking_time_ms: default_min_thinking_time(),
            ready_timeout_secs: default_ready_timeout(),
            search_timeout_secs: default_search_timeout(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            my_color: default_my_color(),
            cooldown_secs: default_cooldown(),
            policy: default_policy(),
            skip_opponent_turn: false,
            autostart: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            max_consecutive_failures: default_max_failures(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.capture.source.as_str() {
            "http" if self.capture.url.is_none() => {
                return Err(ConfigError::Invalid("capture.url is required for the http source".into()))
            }
            "file" if self.capture.path.is_none() => {
                return Err(ConfigError::Invalid("capture.path is required for the file source".into()))
            }
            "screen" if self.capture.region.is_none() => {
                return Err(ConfigError::Invalid("capture.region is required for the screen source".into()))
            }
            "http" | "file" | "screen" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown capture.source '{other}', expected file, http or screen"
                )))
            }
        }
        if let Some(region) = &self.capture.region {
            if region.width == 0 || region.height == 0 {
                return Err(ConfigError::Invalid("capture.region must not be empty".into()));
            }
        }
        if self.capture.normalize_size == 0 {
            return Err(ConfigError::Invalid("capture.normalize_size must be positive".into()));
        }
        match self.classifier.backend.as_str() {
            "command" if self.classifier.program.is_none() => {
                return Err(ConfigError::Invalid(
                    "classifier.program is required for the command backend".into(),
                ))
            }
            "onnx" if self.classifier.model_path.is_none() => {
                return Err(ConfigError::Invalid(
                    "classifier.model_path is required for the onnx backend".into(),
                ))
            }
            "command" | "onnx" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown classifier.backend '{other}', expected command or onnx"
                )))
            }
        }
        if self.engine.depth == 0 {
            return Err(ConfigError::Invalid("engine.depth must be at least 1".into()));
        }
        if !self.watch.cooldown_secs.is_finite() || self.watch.cooldown_secs < 0.0 {
            return Err(ConfigError::Invalid("watch.cooldown_secs must be >= 0".into()));
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.max_backoff_ms must be >= retry.initial_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_normalize_size() -> u32 {
    256
}
fn default_request_timeout() -> u64 {
    5
}
fn default_classifier_backend() -> String {
    "command".into()
}
fn default_classifier_timeout() -> u64 {
    10
}
fn default_engine_path() -> String {
    "stockfish".into()
}
fn default_threads() -> u32 {
    2
}
fn default_depth() -> u32 {
    15
}
fn default_min_thinking_time() -> u64 {
    30
}
fn default_ready_timeout() -> u64 {
    10
}
fn default_search_timeout() -> u64 {
    60
}
fn default_my_color() -> Color {
    Color::White
}
fn default_cooldown() -> f64 {
    1.5
}
fn default_policy() -> AcceptancePolicy {
    AcceptancePolicy::Diff
}
fn default_initial_backoff() -> u64 {
    1000
}
fn default_max_backoff() -> u64 {
    30_000
}
fn default_max_failures() -> u32 {
    10
}
fn default_port() -> u16 {
    8090
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [capture]
        source = "file"
        path = "board.png"

        [classifier]
        program = "predict-fen"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.capture.normalize_size, 256);
        assert_eq!(config.classifier.backend, "command");
        assert_eq!(config.engine.path, "stockfish");
        assert_eq!(config.engine.depth, 15);
        assert_eq!(config.watch.my_color, Color::White);
        assert_eq!(config.watch.cooldown_secs, 1.5);
        assert_eq!(config.watch.policy, AcceptancePolicy::Diff);
        assert!(!config.watch.skip_opponent_turn);
        assert_eq!(config.retry.max_consecutive_failures, 10);
        assert!(config.server.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn example_config_parses() {
        let config = Config::from_toml(include_str!("../../config.example.toml")).unwrap();
        assert_eq!(config.capture.source, "http");
        assert_eq!(config.engine.threads, 2);
    }

    #[test]
    fn full_config_parses() {
        let config = Config::from_toml(
            r#"
            [capture]
            source = "http"
            url = "http://127.0.0.1:9000/snapshot.png"
            region = { x = 10, y = 20, width = 400, height = 400 }

            [classifier]
            backend = "onnx"
            model_path = "ccn_model.onnx"

            [engine]
            path = "/usr/games/stockfish"
            depth = 20

            [watch]
            my_color = "b"
            cooldown_secs = 0.5
            policy = "classifier"
            skip_opponent_turn = true

            [server]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(
            config.capture.region,
            Some(Region {
                x: 10,
                y: 20,
                width: 400,
                height: 400
            })
        );
        assert_eq!(config.watch.my_color, Color::Black);
        assert_eq!(config.watch.policy, AcceptancePolicy::Classifier);
        assert_eq!(config.engine.depth, 20);
        assert!(!config.server.enabled);
    }

    #[test]
    fn missing_source_details_are_rejected() {
        let err = Config::from_toml(
            r#"
            [capture]
            source = "http"
            [classifier]
            program = "predict-fen"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn negative_cooldown_is_rejected() {
        let toml = format!("{MINIMAL}\n[watch]\ncooldown_secs = -1.0\n");
        assert!(matches!(
            Config::from_toml(&toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Config::from_toml("[capture"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load(Path::new("/nonexistent/board-watch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(..)));
    }
}

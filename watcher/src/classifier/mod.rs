pub mod command;
pub mod labels;
#[cfg(feature = "onnx")]
pub mod onnx;

use async_trait::async_trait;
use board_watch_common::config::ClassifierConfig;
use board_watch_common::position::Color;
use image::RgbImage;

/// Maps a normalized board image to a raw `"<placement> <side>"` string.
///
/// Classification is best effort: implementations never fail, and ambiguous
/// or broken input yields whatever string the model produces (possibly empty
/// or not a valid board). The tracker is responsible for rejecting it.
#[async_trait]
pub trait BoardClassifier: Send + Sync {
    async fn classify(&self, image: &RgbImage, side_hint: Color) -> String;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier backend '{0}' is not available in this build")]
    Unsupported(String),
    #[error("classifier backend '{0}' is missing its {1}")]
    Missing(String, &'static str),
    #[cfg(feature = "onnx")]
    #[error("failed to load model: {0}")]
    Model(String),
}

/// Build the classifier named by `config.backend`.
pub fn from_config(config: &ClassifierConfig) -> Result<Box<dyn BoardClassifier>, ClassifierError> {
    match config.backend.as_str() {
        "command" => {
            let program = config
                .program
                .clone()
                .ok_or_else(|| ClassifierError::Missing("command".into(), "program"))?;
            Ok(Box::new(command::CommandClassifier::new(
                program,
                config.args.clone(),
                std::time::Duration::from_secs(config.timeout_secs),
            )))
        }
        #[cfg(feature = "onnx")]
        "onnx" => {
            let path = config
                .model_path
                .as_ref()
                .ok_or_else(|| ClassifierError::Missing("onnx".into(), "model_path"))?;
            Ok(Box::new(onnx::OnnxClassifier::load(path)?))
        }
        other => Err(ClassifierError::Unsupported(other.to_string())),
    }
}

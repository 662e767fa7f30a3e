//! In-process board classifier backed by an ONNX export of the board model.
//!
//! Requires the `onnx` feature.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use board_watch_common::position::Color;
use image::RgbImage;
use tracing::{debug, warn};
use tract_onnx::prelude::*;

use super::labels::{argmax, labels_to_placement, LabelGrid, CLASSES};
use super::{BoardClassifier, ClassifierError};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Runs a model taking `[1, 3, H, W]` RGB in 0..1 and producing per-square
/// logits shaped `[1, 8, 8, 13]`.
pub struct OnnxClassifier {
    model: Arc<Plan>,
}

impl OnnxClassifier {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| ClassifierError::Model(format!("failed to load {}: {e}", path.display())))?
            .into_optimized()
            .map_err(|e| ClassifierError::Model(format!("failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| ClassifierError::Model(format!("failed to make model runnable: {e}")))?;
        debug!(path = %path.display(), "ONNX board model loaded");
        Ok(Self {
            model: Arc::new(model),
        })
    }
}

fn to_input(image: &RgbImage) -> Tensor {
    let (w, h) = image.dimensions();
    tract_ndarray::Array4::from_shape_fn((1, 3, h as usize, w as usize), |(_, c, y, x)| {
        image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
    .into()
}

fn infer(model: &Plan, input: Tensor) -> Result<LabelGrid, String> {
    let outputs = model
        .run(tvec!(input.into()))
        .map_err(|e| format!("inference failed: {e}"))?;
    let logits = outputs[0]
        .to_array_view::<f32>()
        .map_err(|e| format!("unexpected output type: {e}"))?;
    if logits.shape() != [1, 8, 8, CLASSES.len()] {
        return Err(format!("unexpected output shape {:?}", logits.shape()));
    }

    let mut labels: LabelGrid = [[0; 8]; 8];
    for (r, row) in labels.iter_mut().enumerate() {
        for (c, label) in row.iter_mut().enumerate() {
            let scores: Vec<f32> = (0..CLASSES.len()).map(|k| logits[[0, r, c, k]]).collect();
            *label = argmax(&scores);
        }
    }
    Ok(labels)
}

#[async_trait]
impl BoardClassifier for OnnxClassifier {
    async fn classify(&self, image: &RgbImage, side_hint: Color) -> String {
        let model = Arc::clone(&self.model);
        let input = to_input(image);
        let result = tokio::task::spawn_blocking(move || infer(&model, input))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r);

        match result {
            Ok(labels) => format!("{} {side_hint}", labels_to_placement(&labels, side_hint)),
            Err(e) => {
                warn!(error = e, "ONNX board classification failed");
                String::new()
            }
        }
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

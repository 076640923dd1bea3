//! DetectionEngine - ONNX Object Detector Wrapper
//!
//! ## Responsibilities
//!
//! - Own the loaded inference model and the fixed label taxonomy
//! - Letterbox preprocessing, tensor build, inference, box postprocessing
//!
//! The engine has no knowledge of rooms, sockets, or protocol. A missing or
//! unloadable model is a steady-state condition: the engine stays available
//! to callers and yields empty detection lists so the signaling path keeps
//! functioning without detection capability. The model plan is read-only
//! after load and safe to invoke concurrently from multiple pool workers.

use std::path::Path;

use image::DynamicImage;
use tract_onnx::prelude::*;

use crate::error::Result;
use crate::frame_codec::{self, LetterboxTransform};
use crate::models::Detection;

/// COCO-80 label taxonomy (YOLOv5 class order)
pub const CLASS_NAMES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Default confidence threshold applied to both objectness and class score
pub const DEFAULT_CONF_THRESHOLD: f32 = 0.25;

/// Fixed model input edge length (square input)
pub const MODEL_INPUT_SIZE: u32 = 640;

type Plan = TypedRunnableModel<TypedModel>;

/// DetectionEngine instance
pub struct DetectionEngine {
    plan: Option<Plan>,
    input_width: u32,
    input_height: u32,
    conf_threshold: f32,
}

impl DetectionEngine {
    /// Load an ONNX model from disk.
    ///
    /// A missing or unloadable model is logged and leaves the engine in the
    /// unavailable state rather than failing startup.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        input_width: u32,
        input_height: u32,
        conf_threshold: f32,
    ) -> Self {
        let model_path = model_path.as_ref();

        let plan = if model_path.exists() {
            match Self::build_plan(model_path, input_width, input_height) {
                Ok(plan) => {
                    tracing::info!(path = %model_path.display(), "Detection model loaded");
                    Some(plan)
                }
                Err(e) => {
                    tracing::error!(path = %model_path.display(), error = %e, "Failed to load detection model");
                    None
                }
            }
        } else {
            tracing::warn!(path = %model_path.display(), "Model file not found, detection disabled");
            None
        };

        Self {
            plan,
            input_width,
            input_height,
            conf_threshold,
        }
    }

    /// Engine without a model; every detect call yields an empty list
    pub fn disabled(input_width: u32, input_height: u32, conf_threshold: f32) -> Self {
        Self {
            plan: None,
            input_width,
            input_height,
            conf_threshold,
        }
    }

    fn build_plan(path: &Path, width: u32, height: u32) -> anyhow::Result<Plan> {
        let plan = tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )?
            .into_optimized()?
            .into_runnable()?;
        Ok(plan)
    }

    /// Whether a model is loaded
    pub fn available(&self) -> bool {
        self.plan.is_some()
    }

    /// Run object detection on a decoded image.
    ///
    /// Returns detections ordered as emitted by the model. No non-max
    /// suppression is performed; overlapping boxes above threshold are all
    /// emitted as-is.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let Some(plan) = &self.plan else {
            return Ok(Vec::new());
        };

        let (canvas, transform) = frame_codec::letterbox(image, self.input_width, self.input_height);

        let (w, h) = (self.input_width as usize, self.input_height as usize);
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, h, w), |(_, channel, y, x)| {
            canvas.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        });

        let outputs = plan
            .run(tvec!(input.into_tensor().into()))
            .map_err(|e| crate::error::Error::Inference(e.to_string()))?;
        let output = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| crate::error::Error::Inference(e.to_string()))?;

        // Candidate rows are [x_center, y_center, width, height, objectness,
        // class_scores...]; a leading batch axis may or may not be present.
        let shape = output.shape();
        let row_len = *shape.last().unwrap_or(&0);
        let rows: Vec<f32> = output.iter().copied().collect();

        Ok(self.postprocess(&rows, row_len, &transform, image.width(), image.height()))
    }

    /// Filter and map raw model rows to normalized detections.
    fn postprocess(
        &self,
        rows: &[f32],
        row_len: usize,
        transform: &LetterboxTransform,
        orig_w: u32,
        orig_h: u32,
    ) -> Vec<Detection> {
        if row_len < 6 {
            return Vec::new();
        }

        let mut detections = Vec::new();
        for row in rows.chunks_exact(row_len) {
            let (cx, cy, w, h, objectness) = (row[0], row[1], row[2], row[3], row[4]);
            if objectness < self.conf_threshold {
                continue;
            }

            let (class_id, class_score) = row[5..]
                .iter()
                .copied()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (idx, score)| {
                    if score > best.1 {
                        (idx, score)
                    } else {
                        best
                    }
                });
            // Both gates are required: a candidate can pass objectness but
            // fail per-class confidence.
            if class_score < self.conf_threshold {
                continue;
            }

            let model_box = [
                cx - w / 2.0,
                cy - h / 2.0,
                cx + w / 2.0,
                cy + h / 2.0,
            ];
            let [xmin, ymin, xmax, ymax] =
                frame_codec::unletterbox(model_box, transform, orig_w, orig_h);

            let label = CLASS_NAMES
                .get(class_id)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("class_{class_id}"));

            detections.push(Detection {
                label,
                score: objectness * class_score,
                xmin,
                ymin,
                xmax,
                ymax,
            });
        }

        detections
    }
}

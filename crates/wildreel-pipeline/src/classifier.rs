//! Relevance classification via a pretrained ONNX image classifier.
//!
//! Preprocessing matches the model's training pipeline exactly: resize
//! the shortest side, center-crop, normalize per channel. The session is
//! kept behind a mutex; the runtime is not assumed reentrant.

use std::path::PathBuf;
use std::sync::Mutex;

use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};

use crate::error::{PipelineError, PipelineResult};

/// Per-channel normalization constants for ImageNet-trained models.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Shortest side after the initial resize.
pub const DEFAULT_RESIZE_SIZE: u32 = 256;
/// Edge length of the center crop fed to the model.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Classifier configuration.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Path to the ONNX model.
    pub model_path: PathBuf,
    /// Path to the JSON array of vocabulary labels, index-aligned with
    /// the model's output.
    pub labels_path: PathBuf,
    pub resize_size: u32,
    pub input_size: u32,
    /// Name of the logits output tensor.
    pub output_name: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/models/classifier.onnx"),
            labels_path: PathBuf::from("assets/labels/labels.json"),
            resize_size: DEFAULT_RESIZE_SIZE,
            input_size: DEFAULT_INPUT_SIZE,
            output_name: "logits".to_string(),
        }
    }
}

impl ClassifierConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("WILDREEL_CLASSIFIER_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            labels_path: std::env::var("WILDREEL_CLASSIFIER_LABELS")
                .map(PathBuf::from)
                .unwrap_or(defaults.labels_path),
            resize_size: defaults.resize_size,
            input_size: defaults.input_size,
            output_name: std::env::var("WILDREEL_CLASSIFIER_OUTPUT")
                .unwrap_or(defaults.output_name),
        }
    }
}

/// ONNX Runtime-backed image classifier with a fixed label vocabulary.
pub struct ImageClassifier {
    session: Mutex<Session>,
    labels: Vec<String>,
    config: ClassifierConfig,
}

impl ImageClassifier {
    /// Load the model and vocabulary from the configured paths.
    pub fn load(config: ClassifierConfig) -> PipelineResult<Self> {
        let model_bytes = std::fs::read(&config.model_path).map_err(|e| {
            PipelineError::classifier(format!(
                "read model {}: {e}",
                config.model_path.display()
            ))
        })?;

        let session = Session::builder()
            .map_err(|e| PipelineError::classifier(format!("ORT session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PipelineError::classifier(format!("ORT opt level: {e}")))?
            .commit_from_memory(model_bytes.as_slice())
            .map_err(|e| PipelineError::classifier(format!("ORT load model: {e}")))?;

        let label_bytes = std::fs::read(&config.labels_path).map_err(|e| {
            PipelineError::classifier(format!(
                "read labels {}: {e}",
                config.labels_path.display()
            ))
        })?;
        let labels: Vec<String> = serde_json::from_slice(&label_bytes)
            .map_err(|e| PipelineError::classifier(format!("parse labels: {e}")))?;
        if labels.is_empty() {
            return Err(PipelineError::classifier("label vocabulary is empty"));
        }

        Ok(Self {
            session: Mutex::new(session),
            labels,
            config,
        })
    }

    /// The label vocabulary.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Whether any vocabulary label contains the subject name. Drives
    /// the automatic-vs-manual gate selection.
    pub fn vocabulary_covers(&self, subject: &str) -> bool {
        let needle = subject.to_lowercase();
        self.labels.iter().any(|l| l.to_lowercase().contains(&needle))
    }

    /// Top-1 label for an image.
    pub fn predict_label(&self, image: &RgbImage) -> PipelineResult<String> {
        let tensor = preprocess(image, self.config.resize_size, self.config.input_size);
        let shape = vec![
            1usize,
            3,
            self.config.input_size as usize,
            self.config.input_size as usize,
        ];
        let input = Tensor::from_array((shape, tensor.into_raw_vec().into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| PipelineError::classifier(format!("ORT tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::classifier("ORT session poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| PipelineError::classifier(format!("ORT run failed: {e}")))?;

        let output = outputs.get(&self.config.output_name).ok_or_else(|| {
            PipelineError::classifier(format!(
                "missing output tensor '{}'",
                self.config.output_name
            ))
        })?;

        let (_, logits) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::classifier(format!("ORT extract: {e}")))?;

        let best = argmax(logits)
            .ok_or_else(|| PipelineError::classifier("model produced no logits"))?;

        self.labels.get(best).cloned().ok_or_else(|| {
            PipelineError::classifier(format!("predicted index {best} outside vocabulary"))
        })
    }
}

/// Index of the largest logit.
fn argmax(logits: &[f32]) -> Option<usize> {
    logits
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}

/// Resize the shortest side to `resize_size`, center-crop to
/// `input_size`, and normalize into a CHW tensor.
pub fn preprocess(image: &RgbImage, resize_size: u32, input_size: u32) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = if width <= height {
        let scaled = (height as f64 * resize_size as f64 / width as f64).round() as u32;
        (resize_size, scaled.max(1))
    } else {
        let scaled = (width as f64 * resize_size as f64 / height as f64).round() as u32;
        (scaled.max(1), resize_size)
    };
    let resized = imageops::resize(image, new_width, new_height, FilterType::Triangle);

    let crop_x = (new_width.saturating_sub(input_size)) / 2;
    let crop_y = (new_height.saturating_sub(input_size)) / 2;
    let cropped = imageops::crop_imm(&resized, crop_x, crop_y, input_size, input_size).to_image();

    let size = input_size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in cropped.enumerate_pixels() {
        for channel in 0..3 {
            let value = pixel[channel] as f32 / 255.0;
            tensor[[0, channel, y as usize, x as usize]] =
                (value - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
        }
    }
    tensor
}

/// Coarse semantic match: the expected subject is a case-insensitive
/// substring of the predicted label. Vocabularies are coarser than
/// arbitrary subject names, so exact equality would be too strict.
pub fn label_matches(expected: &str, predicted: &str) -> bool {
    predicted.to_lowercase().contains(&expected.to_lowercase())
}

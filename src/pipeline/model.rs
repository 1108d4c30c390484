use std::path::{Path, PathBuf};
use std::sync::Arc;

use tract_onnx::prelude::*;

use super::disease::CLASS_COUNT;
use super::error::{InferenceError, ModelLoadError};
use super::inference::PredictionVector;
use super::preprocess::{InputTensor, INPUT_SIZE};

// ---------------------------------------------------------------------------
// Classifier – the seam between the pipeline and whatever runs the model
// ---------------------------------------------------------------------------

/// A loaded, read-only classifier shared across detections.
pub trait Classifier: Send + Sync {
    /// Run one forward pass. The tensor is consumed and freed here.
    fn predict(&self, input: InputTensor) -> Result<PredictionVector, InferenceError>;
}

type RunnablePlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX classifier executed with tract.
pub struct OnnxClassifier {
    plan: RunnablePlan,
}

impl Classifier for OnnxClassifier {
    fn predict(&self, input: InputTensor) -> Result<PredictionVector, InferenceError> {
        log::debug!("Forward pass on {:?}", input.shape());
        let tensor: Tensor = input.into_array().into();
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| InferenceError::Forward(e.to_string()))?;

        let first = outputs.first().ok_or(InferenceError::EmptyOutput)?;
        let scores = first
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Forward(e.to_string()))?;
        Ok(PredictionVector::new(scores.iter().copied().collect()))
    }
}

// ---------------------------------------------------------------------------
// ModelLoader
// ---------------------------------------------------------------------------

/// Loads the classifier from a fixed location. Called from a worker thread;
/// the session decides when a load may start.
#[derive(Debug, Clone)]
pub struct ModelLoader {
    path: PathBuf,
}

impl ModelLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse, pin the input shape, optimize and check the output width.
    pub fn load(&self) -> Result<Arc<dyn Classifier>, ModelLoadError> {
        if !self.path.is_file() {
            return Err(ModelLoadError::NotFound(self.path.clone()));
        }
        log::info!("Loading classifier from {}", self.path.display());

        let side = INPUT_SIZE as usize;
        let optimized = tract_onnx::onnx()
            .model_for_path(&self.path)
            .map_err(|e| ModelLoadError::Parse(e.to_string()))?
            .with_input_fact(0, f32::fact([1, side, side, 3]).into())
            .map_err(|e| ModelLoadError::Compile(e.to_string()))?
            .into_optimized()
            .map_err(|e| ModelLoadError::Compile(e.to_string()))?;

        if let Some(width) = output_width(&optimized) {
            if width != CLASS_COUNT {
                return Err(ModelLoadError::OutputWidth {
                    expected: CLASS_COUNT,
                    actual: width,
                });
            }
        }

        let plan = optimized
            .into_runnable()
            .map_err(|e| ModelLoadError::Compile(e.to_string()))?;

        log::info!("Classifier ready");
        Ok(Arc::new(OnnxClassifier { plan }))
    }
}

/// Last output dimension, when the optimized graph knows it statically.
fn output_width(model: &TypedModel) -> Option<usize> {
    let fact = model.output_fact(0).ok()?;
    fact.shape.as_concrete()?.last().copied()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the same scores for every input and counts forward passes.
    pub struct FixedScores {
        scores: Vec<f32>,
        pub calls: AtomicUsize,
    }

    impl FixedScores {
        pub fn new(scores: &[f32]) -> Self {
            Self {
                scores: scores.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Classifier for FixedScores {
        fn predict(&self, input: InputTensor) -> Result<PredictionVector, InferenceError> {
            assert_eq!(input.shape(), &[1, 256, 256, 3]);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PredictionVector::new(self.scores.clone()))
        }
    }

    /// Always fails its forward pass.
    pub struct Broken;

    impl Classifier for Broken {
        fn predict(&self, _input: InputTensor) -> Result<PredictionVector, InferenceError> {
            Err(InferenceError::Forward("device lost".into()))
        }
    }
}

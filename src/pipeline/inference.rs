use super::disease::DetectionResult;
use super::error::{DetectError, InferenceError};
use super::model::Classifier;
use super::preprocess::{preprocess, InputTensor};
use super::source::ImageHandle;

/// Per-class scores from one forward pass, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionVector(Vec<f32>);

impl PredictionVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn scores(&self) -> &[f32] {
        &self.0
    }

    /// Index and score of the largest entry; the first one wins on ties.
    pub fn argmax(&self) -> Result<Prediction, InferenceError> {
        let mut best: Option<Prediction> = None;
        for (index, &score) in self.0.iter().enumerate() {
            if score.is_nan() {
                return Err(InferenceError::NotANumber(index));
            }
            match best {
                Some(b) if score <= b.confidence => {}
                _ => {
                    best = Some(Prediction {
                        index,
                        confidence: score,
                    })
                }
            }
        }
        best.ok_or(InferenceError::EmptyOutput)
    }
}

/// The winning class of one detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub confidence: f32,
}

/// One forward pass followed by arg-max. The tensor does not outlive the call.
pub fn infer(model: &dyn Classifier, tensor: InputTensor) -> Result<Prediction, InferenceError> {
    let scores = model.predict(tensor)?;
    log::debug!("Scores: {:?}", scores.scores());
    scores.argmax()
}

/// Full pipeline for one image: preprocess, infer, resolve.
pub fn detect(model: &dyn Classifier, image: &ImageHandle) -> Result<DetectionResult, DetectError> {
    let tensor = preprocess(image)?;
    let prediction = infer(model, tensor)?;
    let result = DetectionResult::from_prediction(prediction.index, prediction.confidence)?;
    log::info!(
        "Detected {} ({}) from {} image",
        result.label,
        result.confidence_percent(),
        image.origin()
    );
    Ok(result)
}

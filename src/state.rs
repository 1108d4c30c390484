use std::fmt;
use std::sync::Arc;

use crate::pipeline::disease::DetectionResult;
use crate::pipeline::error::{DetectError, InferenceError, ModelLoadError, SourceError};
use crate::pipeline::inference::detect;
use crate::pipeline::model::Classifier;
use crate::pipeline::source::{Acquisition, ImageHandle};

// ---------------------------------------------------------------------------
// Phase – what the UI is currently showing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ModelLoading,
    ModelFailed,
    AwaitingImage,
    ImageSelected,
    Detecting,
    ResultReady,
    DetectionFailed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Phase::Idle => "idle",
            Phase::ModelLoading => "loading model",
            Phase::ModelFailed => "model unavailable",
            Phase::AwaitingImage => "waiting for a photo",
            Phase::ImageSelected => "photo selected",
            Phase::Detecting => "detecting",
            Phase::ResultReady => "result ready",
            Phase::DetectionFailed => "detection failed",
        };
        f.write_str(text)
    }
}

// ---------------------------------------------------------------------------
// Events delivered by worker threads and dialogs
// ---------------------------------------------------------------------------

pub enum SessionEvent {
    ModelLoaded(Result<Arc<dyn Classifier>, ModelLoadError>),
    ImageAcquired(Result<Acquisition, SourceError>),
    DetectionFinished {
        ticket: u64,
        outcome: Result<DetectionResult, DetectError>,
    },
}

impl SessionEvent {
    /// Stand-in for a model load whose worker died without reporting.
    pub fn model_load_lost(reason: String) -> Self {
        SessionEvent::ModelLoaded(Err(ModelLoadError::Compile(reason)))
    }

    /// Stand-in for a camera capture whose worker died without reporting.
    pub fn capture_lost(reason: String) -> Self {
        SessionEvent::ImageAcquired(Err(SourceError::Device(reason)))
    }

    /// Stand-in for detection `ticket` when its worker died without reporting.
    pub fn detection_lost(ticket: u64, reason: String) -> Self {
        SessionEvent::DetectionFinished {
            ticket,
            outcome: Err(InferenceError::Forward(reason).into()),
        }
    }
}

/// Everything a worker needs to run one detection.
pub struct DetectionJob {
    pub ticket: u64,
    model: Arc<dyn Classifier>,
    image: ImageHandle,
}

impl DetectionJob {
    /// Run the pipeline and package the outcome for [`Session::apply`].
    pub fn run(self) -> SessionEvent {
        let outcome = detect(&*self.model, &self.image);
        SessionEvent::DetectionFinished {
            ticket: self.ticket,
            outcome,
        }
    }
}

// ---------------------------------------------------------------------------
// Session – the state machine
// ---------------------------------------------------------------------------

/// One user session: model readiness, the held photo and the last result.
///
/// Every method returns `true` when it changed the phase or the held data
/// and `false` when the request was not valid in the current phase.
pub struct Session {
    phase: Phase,
    model: Option<Arc<dyn Classifier>>,
    image: Option<ImageHandle>,
    result: Option<DetectionResult>,

    /// Dismissible message for the last recoverable failure.
    pub status_message: Option<String>,

    /// Ticket of the detection in flight (or the last one started).
    ticket: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            model: None,
            image: None,
            result: None,
            status_message: None,
            ticket: 0,
        }
    }
}

impl Session {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn image(&self) -> Option<&ImageHandle> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        self.result.as_ref()
    }

    pub fn model_ready(&self) -> bool {
        self.model.is_some()
    }

    /// Whether a new photo would be accepted right now.
    pub fn can_acquire(&self) -> bool {
        matches!(
            self.phase,
            Phase::AwaitingImage | Phase::ImageSelected | Phase::ResultReady | Phase::DetectionFailed
        )
    }

    /// Like [`Session::can_acquire`], but also closed while a camera
    /// capture is still running, whatever the source of the new photo.
    pub fn can_start_acquisition(&self, capturing: bool) -> bool {
        self.can_acquire() && !capturing
    }

    pub fn can_detect(&self) -> bool {
        matches!(self.phase, Phase::ImageSelected | Phase::DetectionFailed)
            && self.model.is_some()
            && self.image.is_some()
    }

    /// A held photo can be dropped at any point outside a detection.
    pub fn can_reset(&self) -> bool {
        matches!(
            self.phase,
            Phase::ImageSelected | Phase::ResultReady | Phase::DetectionFailed
        )
    }

    pub fn dismiss_notice(&mut self) {
        self.status_message = None;
    }

    /// Dispatch an event from a worker or dialog.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::ModelLoaded(result) => self.model_loaded(result),
            SessionEvent::ImageAcquired(result) => self.image_acquired(result),
            SessionEvent::DetectionFinished { ticket, outcome } => {
                self.detection_finished(ticket, outcome)
            }
        }
    }

    // ---- Model ----

    /// Start (or retry) loading. The caller runs the loader only on `true`,
    /// so a load already in flight is never duplicated.
    pub fn request_model_load(&mut self) -> bool {
        match self.phase {
            Phase::Idle | Phase::ModelFailed => {
                self.phase = Phase::ModelLoading;
                self.status_message = None;
                true
            }
            _ => false,
        }
    }

    pub fn model_loaded(&mut self, result: Result<Arc<dyn Classifier>, ModelLoadError>) -> bool {
        if self.phase != Phase::ModelLoading {
            log::warn!("Ignoring model load completion while {}", self.phase);
            return false;
        }
        match result {
            Ok(model) => {
                self.model = Some(model);
                self.phase = Phase::AwaitingImage;
            }
            Err(e) => {
                log::error!("Failed to load model: {e}");
                self.model = None;
                self.phase = Phase::ModelFailed;
                self.status_message = Some(format!("Model could not be loaded: {e}"));
            }
        }
        true
    }

    // ---- Image ----

    /// Take a new photo, discarding the previous one and any result.
    /// Cancellation leaves everything as it was.
    pub fn image_acquired(&mut self, result: Result<Acquisition, SourceError>) -> bool {
        if !self.can_acquire() {
            log::warn!("Ignoring image acquisition while {}", self.phase);
            return false;
        }
        match result {
            Ok(Acquisition::Captured(handle)) => {
                self.image = Some(handle);
                self.result = None;
                self.status_message = None;
                self.phase = Phase::ImageSelected;
                true
            }
            Ok(Acquisition::Cancelled) => false,
            Err(e) => {
                log::warn!("Image acquisition failed: {e}");
                self.status_message = Some(format!("Could not open image: {e}"));
                false
            }
        }
    }

    // ---- Detection ----

    /// Enter `Detecting` and hand out the job, or `None` if detection is
    /// not possible (no model, no photo, or one already running).
    pub fn begin_detection(&mut self) -> Option<DetectionJob> {
        if !self.can_detect() {
            log::debug!("Detect request ignored while {}", self.phase);
            return None;
        }
        let model = self.model.clone()?;
        let image = self.image.clone()?;
        self.ticket += 1;
        self.phase = Phase::Detecting;
        self.result = None;
        self.status_message = None;
        Some(DetectionJob {
            ticket: self.ticket,
            model,
            image,
        })
    }

    pub fn detection_finished(
        &mut self,
        ticket: u64,
        outcome: Result<DetectionResult, DetectError>,
    ) -> bool {
        if self.phase != Phase::Detecting || ticket != self.ticket {
            log::warn!("Discarding stale detection #{ticket}");
            return false;
        }
        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.phase = Phase::ResultReady;
            }
            Err(e) if e.is_recoverable() => {
                log::warn!("Detection failed: {e}");
                self.status_message = Some(format!("Detection failed: {e}"));
                self.phase = Phase::DetectionFailed;
            }
            Err(e) => {
                log::error!("Classifier and disease table disagree: {e}");
                self.model = None;
                self.status_message = Some(format!("Model is incompatible: {e}"));
                self.phase = Phase::ModelFailed;
            }
        }
        true
    }

    // ---- Reset ----

    /// Drop the photo and result and wait for a new photo.
    pub fn reset(&mut self) -> bool {
        if !self.can_reset() {
            return false;
        }
        self.image = None;
        self.result = None;
        self.status_message = None;
        self.phase = Phase::AwaitingImage;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::{ImageDecodeError, IndexOutOfRange};
    use crate::pipeline::model::testing::{Broken, FixedScores};
    use crate::pipeline::source::ImageOrigin;
    use image::RgbImage;

    fn photo() -> Acquisition {
        let img = RgbImage::new(256, 256);
        Acquisition::Captured(ImageHandle::from_rgb(img, ImageOrigin::Gallery).unwrap())
    }

    fn stub(scores: &[f32]) -> Arc<dyn Classifier> {
        Arc::new(FixedScores::new(scores))
    }

    fn ready_session(model: Arc<dyn Classifier>) -> Session {
        let mut s = Session::default();
        assert!(s.request_model_load());
        assert!(s.model_loaded(Ok(model)));
        s
    }

    fn with_photo(model: Arc<dyn Classifier>) -> Session {
        let mut s = ready_session(model);
        assert!(s.image_acquired(Ok(photo())));
        s
    }

    fn run_detection(s: &mut Session) {
        let job = s.begin_detection().expect("detection should start");
        assert_eq!(s.phase(), Phase::Detecting);
        assert!(s.apply(job.run()));
    }

    #[test]
    fn startup_goes_through_loading() {
        let mut s = Session::default();
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.request_model_load());
        assert_eq!(s.phase(), Phase::ModelLoading);
        assert!(!s.request_model_load(), "second load must be a no-op");
        assert!(s.apply(SessionEvent::ModelLoaded(Ok(stub(&[1.0; 5])))));
        assert_eq!(s.phase(), Phase::AwaitingImage);
        assert!(s.model_ready());
        assert!(!s.request_model_load());
    }

    #[test]
    fn model_failure_blocks_detection_until_retry() {
        let mut s = Session::default();
        s.request_model_load();
        s.model_loaded(Err(ModelLoadError::NotFound("model.onnx".into())));
        assert_eq!(s.phase(), Phase::ModelFailed);
        assert!(!s.model_ready());
        assert!(s.status_message.is_some());

        assert!(!s.image_acquired(Ok(photo())));
        assert!(s.image().is_none());
        assert!(s.begin_detection().is_none());

        assert!(s.request_model_load());
        assert_eq!(s.phase(), Phase::ModelLoading);
        assert!(s.status_message.is_none());
        s.model_loaded(Ok(stub(&[1.0; 5])));
        assert_eq!(s.phase(), Phase::AwaitingImage);
    }

    #[test]
    fn images_before_model_are_ignored() {
        let mut s = Session::default();
        s.request_model_load();
        assert!(!s.image_acquired(Ok(photo())));
        assert_eq!(s.phase(), Phase::ModelLoading);
        assert!(s.image().is_none());
    }

    #[test]
    fn selecting_photo_and_reselecting() {
        let mut s = with_photo(stub(&[1.0; 5]));
        assert_eq!(s.phase(), Phase::ImageSelected);
        assert!(s.image_acquired(Ok(photo())));
        assert_eq!(s.phase(), Phase::ImageSelected);
        assert!(s.image().is_some());
    }

    #[test]
    fn cancellation_changes_nothing() {
        let mut s = ready_session(stub(&[1.0; 5]));
        assert!(!s.image_acquired(Ok(Acquisition::Cancelled)));
        assert_eq!(s.phase(), Phase::AwaitingImage);

        let mut s = with_photo(stub(&[1.0; 5]));
        run_detection(&mut s);
        assert!(!s.image_acquired(Ok(Acquisition::Cancelled)));
        assert_eq!(s.phase(), Phase::ResultReady);
        assert!(s.image().is_some());
        assert!(s.result().is_some());
    }

    #[test]
    fn decode_error_keeps_phase_and_surfaces_message() {
        let mut s = with_photo(stub(&[1.0; 5]));
        let err = SourceError::Decode(ImageDecodeError::Empty);
        assert!(!s.image_acquired(Err(err)));
        assert_eq!(s.phase(), Phase::ImageSelected);
        assert!(s.image().is_some());
        assert!(s.status_message.is_some());
        s.dismiss_notice();
        assert!(s.status_message.is_none());
        assert_eq!(s.phase(), Phase::ImageSelected);
    }

    #[test]
    fn detecting_requires_model_and_photo() {
        let mut s = Session::default();
        assert!(s.begin_detection().is_none());

        let mut s = ready_session(stub(&[1.0; 5]));
        assert!(s.begin_detection().is_none());
        assert_eq!(s.phase(), Phase::AwaitingImage);
    }

    #[test]
    fn successful_detection_shows_result() {
        let mut s = with_photo(stub(&[0.9, 0.02, 0.02, 0.03, 0.03]));
        run_detection(&mut s);
        assert_eq!(s.phase(), Phase::ResultReady);
        let result = s.result().unwrap();
        assert_eq!(result.label, "Bacteria wilt");
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn second_detect_while_detecting_is_rejected() {
        let model = Arc::new(FixedScores::new(&[0.1, 0.9, 0.0, 0.0, 0.0]));
        let mut s = with_photo(model.clone());
        let job = s.begin_detection().unwrap();
        assert!(s.begin_detection().is_none());
        assert!(!s.image_acquired(Ok(photo())), "no new photo mid-detection");
        assert!(!s.reset());

        assert!(s.apply(job.run()));
        assert_eq!(model.calls(), 1);
        assert_eq!(s.result().unwrap().label, "Early blight");
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut s = with_photo(stub(&[1.0; 5]));
        let job = s.begin_detection().unwrap();
        let stale = DetectionResult::from_prediction(3, 0.4).unwrap();
        assert!(!s.detection_finished(job.ticket + 1, Ok(stale)));
        assert_eq!(s.phase(), Phase::Detecting);
        assert!(s.apply(job.run()));
        assert_eq!(s.phase(), Phase::ResultReady);
    }

    #[test]
    fn recoverable_failure_allows_retry_and_new_photo() {
        let mut s = with_photo(Arc::new(Broken));
        run_detection(&mut s);
        assert_eq!(s.phase(), Phase::DetectionFailed);
        assert!(s.result().is_none());
        assert!(s.image().is_some());
        assert!(s.status_message.is_some());

        // retry with the same photo
        let job = s.begin_detection().unwrap();
        assert_eq!(s.phase(), Phase::Detecting);
        s.detection_finished(job.ticket, Err(InferenceError::EmptyOutput.into()));
        assert_eq!(s.phase(), Phase::DetectionFailed);

        assert!(s.image_acquired(Ok(photo())));
        assert_eq!(s.phase(), Phase::ImageSelected);
        assert!(s.status_message.is_none());
    }

    #[test]
    fn table_mismatch_disables_the_model() {
        let mut s = with_photo(stub(&[1.0; 5]));
        let job = s.begin_detection().unwrap();
        let err = DetectError::IndexOutOfRange(IndexOutOfRange { index: 7, len: 5 });
        s.detection_finished(job.ticket, Err(err));
        assert_eq!(s.phase(), Phase::ModelFailed);
        assert!(!s.model_ready());
        assert!(s.result().is_none());
    }

    #[test]
    fn reset_clears_photo_and_result() {
        let mut s = with_photo(stub(&[0.9, 0.02, 0.02, 0.03, 0.03]));
        run_detection(&mut s);
        assert!(s.reset());
        assert_eq!(s.phase(), Phase::AwaitingImage);
        assert!(s.image().is_none());
        assert!(s.result().is_none());
        assert!(s.model_ready());
    }

    #[test]
    fn reset_after_failure() {
        let mut s = with_photo(Arc::new(Broken));
        run_detection(&mut s);
        assert!(s.reset());
        assert_eq!(s.phase(), Phase::AwaitingImage);
        assert!(s.image().is_none());
        assert!(s.status_message.is_none());
    }

    #[test]
    fn new_photo_invalidates_previous_result() {
        let mut s = with_photo(stub(&[0.9, 0.02, 0.02, 0.03, 0.03]));
        run_detection(&mut s);
        assert!(s.image_acquired(Ok(photo())));
        assert_eq!(s.phase(), Phase::ImageSelected);
        assert!(s.result().is_none());
    }

    #[test]
    fn selected_photo_can_be_discarded_before_detecting() {
        let model = Arc::new(FixedScores::new(&[1.0; 5]));
        let mut s = with_photo(model.clone());
        assert!(s.can_reset());
        assert!(s.reset());
        assert_eq!(s.phase(), Phase::AwaitingImage);
        assert!(s.image().is_none());
        assert!(s.begin_detection().is_none());
        assert_eq!(model.calls(), 0);

        // nothing left to discard
        assert!(!s.reset());
        assert!(s.image_acquired(Ok(photo())));
        assert_eq!(s.phase(), Phase::ImageSelected);
    }

    #[test]
    fn reset_is_closed_without_a_photo_and_mid_detection() {
        let mut s = Session::default();
        assert!(!s.reset());
        let mut s = ready_session(stub(&[1.0; 5]));
        assert!(!s.reset());

        let mut s = with_photo(stub(&[1.0; 5]));
        let _job = s.begin_detection().unwrap();
        assert!(!s.can_reset());
        assert!(!s.reset());
        assert!(s.image().is_some());
    }

    #[test]
    fn lost_detection_worker_leaves_the_photo_retryable() {
        let mut s = with_photo(stub(&[1.0; 5]));
        let job = s.begin_detection().unwrap();
        assert_eq!(s.phase(), Phase::Detecting);

        let lost = SessionEvent::detection_lost(job.ticket, "worker panicked".into());
        assert!(s.apply(lost));
        assert_eq!(s.phase(), Phase::DetectionFailed);
        assert!(s.model_ready());
        assert!(s.status_message.as_deref().unwrap().contains("worker panicked"));
        assert!(s.can_detect());
        assert!(s.can_reset());

        // a lost worker for an older ticket is ignored like any stale result
        let job = s.begin_detection().unwrap();
        assert!(!s.apply(SessionEvent::detection_lost(job.ticket - 1, "old".into())));
        assert_eq!(s.phase(), Phase::Detecting);
    }

    #[test]
    fn lost_model_loader_offers_retry() {
        let mut s = Session::default();
        assert!(s.request_model_load());
        assert!(s.apply(SessionEvent::model_load_lost("loader panicked".into())));
        assert_eq!(s.phase(), Phase::ModelFailed);
        assert!(!s.model_ready());
        assert!(s.status_message.is_some());

        assert!(s.request_model_load());
        assert!(s.model_loaded(Ok(stub(&[1.0; 5]))));
        assert_eq!(s.phase(), Phase::AwaitingImage);
    }

    #[test]
    fn lost_camera_worker_is_a_notice_not_a_phase_change() {
        let mut s = with_photo(stub(&[1.0; 5]));
        assert!(!s.apply(SessionEvent::capture_lost("camera panicked".into())));
        assert_eq!(s.phase(), Phase::ImageSelected);
        assert!(s.image().is_some());
        assert!(s.status_message.is_some());
    }

    #[test]
    fn running_capture_blocks_every_other_source() {
        let s = ready_session(stub(&[1.0; 5]));
        assert!(s.can_start_acquisition(false));
        assert!(!s.can_start_acquisition(true));

        let mut s = Session::default();
        s.request_model_load();
        assert!(!s.can_start_acquisition(false));
    }
}

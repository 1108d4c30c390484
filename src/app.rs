use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions};

use crate::config::AppConfig;
use crate::pipeline::error::SourceError;
use crate::pipeline::model::ModelLoader;
use crate::pipeline::source::{self, CommandCamera, GalleryDialog, ImageHandle};
use crate::state::{Session, SessionEvent};
use crate::ui::{panels, result, Intent};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct LeafScanApp {
    pub session: Session,
    loader: ModelLoader,
    camera: Option<CommandCamera>,
    /// True while the camera command runs on a worker.
    capturing: bool,
    /// Texture for the held photo, paired with the handle it was built from.
    preview: Option<(ImageHandle, TextureHandle)>,
    tx: mpsc::Sender<SessionEvent>,
    rx: mpsc::Receiver<SessionEvent>,
}

impl LeafScanApp {
    pub fn new(ctx: &egui::Context, config: AppConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        let mut app = Self {
            session: Session::default(),
            loader: ModelLoader::new(config.model_path),
            camera: CommandCamera::new(config.camera_command),
            capturing: false,
            preview: None,
            tx,
            rx,
        };
        app.start_model_load(ctx);
        app
    }

    /// Run `job` on a worker thread and wake the UI when its event arrives.
    ///
    /// Exactly one event is delivered per call: if the worker cannot be
    /// spawned or `job` panics, `lost` builds the event instead.
    fn spawn_worker<F, L>(&mut self, ctx: &egui::Context, name: &str, job: F, lost: L)
    where
        F: FnOnce() -> SessionEvent + Send + 'static,
        L: FnOnce(String) -> SessionEvent + Clone + Send + 'static,
    {
        let tx = self.tx.clone();
        let repaint = ctx.clone();
        let on_panic = lost.clone();
        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            // The receiver only goes away when the window closes.
            let _ = tx.send(run_guarded(job, on_panic));
            repaint.request_repaint();
        });
        if let Err(e) = spawned {
            log::error!("Failed to spawn {name} worker: {e}");
            self.deliver(lost(format!("could not start {name} worker: {e}")));
        }
    }

    fn start_model_load(&mut self, ctx: &egui::Context) {
        if !self.session.request_model_load() {
            return;
        }
        log::debug!("Spawning model loader for {}", self.loader.path().display());
        let loader = self.loader.clone();
        self.spawn_worker(
            ctx,
            "model-loader",
            move || SessionEvent::ModelLoaded(loader.load()),
            SessionEvent::model_load_lost,
        );
    }

    fn start_capture(&mut self, ctx: &egui::Context) {
        let Some(camera) = self.camera.clone() else {
            self.session
                .apply(SessionEvent::ImageAcquired(Err(SourceError::Unavailable)));
            return;
        };
        self.capturing = true;
        self.spawn_worker(
            ctx,
            "camera",
            move || SessionEvent::ImageAcquired(source::from_camera(&camera)),
            SessionEvent::capture_lost,
        );
    }

    fn start_detection(&mut self, ctx: &egui::Context) {
        if let Some(job) = self.session.begin_detection() {
            let ticket = job.ticket;
            log::info!("Starting detection #{ticket}");
            self.spawn_worker(
                ctx,
                "detector",
                move || job.run(),
                move |reason| SessionEvent::detection_lost(ticket, reason),
            );
        }
    }

    fn handle(&mut self, ctx: &egui::Context, intent: Intent) {
        match intent {
            Intent::PickFile => {
                if self.session.can_start_acquisition(self.capturing) {
                    let outcome = source::pick_file();
                    self.session.apply(SessionEvent::ImageAcquired(outcome));
                }
            }
            Intent::OpenGallery => {
                if self.session.can_start_acquisition(self.capturing) {
                    let outcome = source::from_gallery(&GalleryDialog::default());
                    self.session.apply(SessionEvent::ImageAcquired(outcome));
                }
            }
            Intent::Capture => {
                if self.session.can_start_acquisition(self.capturing) {
                    self.start_capture(ctx);
                }
            }
            Intent::Detect => self.start_detection(ctx),
            Intent::Reset => {
                self.session.reset();
            }
            Intent::RetryModel => self.start_model_load(ctx),
            Intent::DismissNotice => self.session.dismiss_notice(),
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.deliver(event);
        }
    }

    fn deliver(&mut self, event: SessionEvent) {
        if matches!(event, SessionEvent::ImageAcquired(_)) {
            self.capturing = false;
        }
        self.session.apply(event);
    }

    /// Keep the preview texture in step with the session's photo.
    fn sync_preview(&mut self, ctx: &egui::Context) {
        let current = self.session.image();
        let stale = match (&self.preview, current) {
            (Some((shown, _)), Some(image)) => !shown.same_pixels(image),
            (None, None) => false,
            _ => true,
        };
        if !stale {
            return;
        }
        self.preview = current.map(|image| {
            let (w, h) = image.dimensions();
            let pixels = ColorImage::from_rgb([w as usize, h as usize], image.pixels().as_raw());
            let texture = ctx.load_texture("leaf-photo", pixels, TextureOptions::LINEAR);
            (image.clone(), texture)
        });
    }
}

impl eframe::App for LeafScanApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.sync_preview(ctx);

        let mut intents = Vec::new();

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &self.session, self.capturing, &mut intents);
        });

        // ---- Left side panel: controls ----
        egui::SidePanel::left("control_panel")
            .default_width(220.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(
                    ui,
                    &self.session,
                    self.camera.is_some(),
                    self.capturing,
                    &mut intents,
                );
            });

        // ---- Central panel: photo and result ----
        egui::CentralPanel::default().show(ctx, |ui| {
            let texture = self.preview.as_ref().map(|(_, t)| t);
            result::central_panel(ui, &self.session, texture);
        });

        if !intents.is_empty() {
            for intent in intents {
                self.handle(ctx, intent);
            }
            ctx.request_repaint();
        }
    }
}

/// Run `job`, turning a panic into the event built by `lost`.
fn run_guarded<F, L>(job: F, lost: L) -> SessionEvent
where
    F: FnOnce() -> SessionEvent,
    L: FnOnce(String) -> SessionEvent,
{
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        let reason = panic_message(&*payload);
        log::error!("Worker panicked: {reason}");
        lost(format!("worker panicked: {reason}"))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

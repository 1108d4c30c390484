use eframe::egui::{self, Color32, RichText, Ui};

use crate::state::{Phase, Session};
use crate::ui::Intent;

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / status line.
pub fn top_bar(ui: &mut Ui, session: &Session, capturing: bool, intents: &mut Vec<Intent>) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            let enabled = session.can_start_acquisition(capturing);
            if ui
                .add_enabled(enabled, egui::Button::new("Open photo…"))
                .clicked()
            {
                intents.push(Intent::PickFile);
                ui.close_menu();
            }
        });

        ui.separator();

        match session.phase() {
            Phase::Idle | Phase::ModelLoading => {
                ui.spinner();
                ui.label("Loading deep learning model…");
            }
            phase if session.model_ready() => {
                ui.label(format!("Model ready, {phase}"));
            }
            _ => {
                ui.label(RichText::new("Model unavailable").color(Color32::RED));
            }
        }

        if let Some(msg) = &session.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
            if ui.small_button("✖").clicked() {
                intents.push(Intent::DismissNotice);
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Left side panel – acquisition and detection controls
// ---------------------------------------------------------------------------

/// Render the control panel. `capturing` is true while the camera runs.
pub fn side_panel(
    ui: &mut Ui,
    session: &Session,
    camera_available: bool,
    capturing: bool,
    intents: &mut Vec<Intent>,
) {
    ui.heading("Leaf photo");
    ui.separator();

    let can_acquire = session.can_start_acquisition(capturing);
    let width = ui.available_width();
    let wide = |text: &str| wide_button(text, width);

    if ui.add_enabled(can_acquire, wide("Upload file")).clicked() {
        intents.push(Intent::PickFile);
    }
    if ui.add_enabled(can_acquire, wide("Choose from gallery")).clicked() {
        intents.push(Intent::OpenGallery);
    }
    let camera = ui.add_enabled(can_acquire && camera_available, wide("Take photo"));
    if camera.clicked() {
        intents.push(Intent::Capture);
    }
    if !camera_available {
        camera.on_disabled_hover_text("No camera command configured (LEAFSCAN_CAMERA)");
    }
    if capturing {
        ui.horizontal(|ui: &mut Ui| {
            ui.spinner();
            ui.label("Waiting for camera…");
        });
    }

    ui.add_space(12.0);
    ui.heading("Detection");
    ui.separator();

    if ui.add_enabled(session.can_detect(), wide("Detect disease")).clicked() {
        intents.push(Intent::Detect);
    }
    let reset_label = match session.phase() {
        Phase::ImageSelected => "Remove photo",
        _ => "Start over",
    };
    if ui.add_enabled(session.can_reset(), wide(reset_label)).clicked() {
        intents.push(Intent::Reset);
    }
    if session.phase() == Phase::ModelFailed && ui.add(wide("Retry loading model")).clicked() {
        intents.push(Intent::RetryModel);
    }

    if let Some(image) = session.image() {
        ui.add_space(12.0);
        let (w, h) = image.dimensions();
        ui.weak(format!("{w}×{h} from {}", image.origin()));
    }
}

fn wide_button(text: &str, width: f32) -> egui::Button<'static> {
    egui::Button::new(text.to_owned()).min_size(egui::vec2(width, 28.0))
}

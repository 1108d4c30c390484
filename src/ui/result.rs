use eframe::egui::{self, Color32, RichText, TextureHandle, Ui};

use crate::pipeline::disease::DetectionResult;
use crate::state::{Phase, Session};

// ---------------------------------------------------------------------------
// Central panel – photo preview and detection result
// ---------------------------------------------------------------------------

/// Render the preview of the held photo and, once available, the result.
pub fn central_panel(ui: &mut Ui, session: &Session, preview: Option<&TextureHandle>) {
    let Some(texture) = preview else {
        ui.centered_and_justified(|ui: &mut Ui| {
            let hint = match session.phase() {
                Phase::Idle | Phase::ModelLoading => "Loading the disease model…",
                Phase::ModelFailed => "The disease model could not be loaded.",
                _ => "Upload, choose or take a photo of a potato leaf.",
            };
            ui.heading(hint);
        });
        return;
    };

    ui.columns(2, |columns| {
        let room = columns[0].available_size();
        columns[0].add(
            egui::Image::new(texture)
                .max_size(room)
                .maintain_aspect_ratio(true)
                .rounding(4.0),
        );

        let ui = &mut columns[1];
        match (session.phase(), session.result()) {
            (Phase::Detecting, _) => {
                ui.horizontal(|ui: &mut Ui| {
                    ui.spinner();
                    ui.label("Analysing leaf…");
                });
            }
            (Phase::ResultReady, Some(result)) => result_card(ui, result),
            (Phase::DetectionFailed, _) => {
                ui.label(RichText::new("Detection failed.").color(Color32::RED));
                ui.label("Try again or pick another photo.");
            }
            _ => {
                ui.label("Press \"Detect disease\" to analyse this photo.");
            }
        }
    });
}

fn result_card(ui: &mut Ui, result: &DetectionResult) {
    egui::Frame::group(ui.style()).show(ui, |ui: &mut Ui| {
        ui.label(RichText::new(result.label).heading().strong());
        if result.local_name != result.label {
            ui.weak(result.local_name);
        }
        ui.add_space(6.0);

        ui.add(
            egui::ProgressBar::new(result.confidence.clamp(0.0, 1.0))
                .text(format!("Confidence {}", result.confidence_percent())),
        );
        ui.add_space(6.0);

        ui.strong("Cause");
        ui.label(result.cause);
        ui.add_space(4.0);
        ui.strong("Solution");
        ui.label(result.solution);
    });
}

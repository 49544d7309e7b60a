//! Settings panel rendering for the service connection and versions.

use super::{Panel, UiApp};
use eframe::egui;

impl UiApp {
    /// Renders the settings screen with the classification service details.
    pub(super) fn render_settings_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Settings");
        ui.add_space(8.0);
        ui.label(egui::RichText::new("Classification service").strong());
        egui::Grid::new("service-grid")
            .num_columns(2)
            .spacing([12.0, 4.0])
            .show(ui, |ui| {
                ui.label("Endpoint");
                ui.monospace(&self.config.service.endpoint);
                ui.end_row();
                ui.label("Upload field");
                ui.monospace(&self.config.service.upload_field);
                ui.end_row();
                ui.label("Configuration file");
                match &self.config_path {
                    Some(path) => ui.monospace(path.display().to_string()),
                    None => ui.label("unavailable on this platform"),
                };
                ui.end_row();
            });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui
                .add_enabled(
                    !self.service_check_in_progress,
                    egui::Button::new("Check connection"),
                )
                .clicked()
            {
                self.check_service(ui.ctx());
            }
            if ui
                .add_enabled(
                    self.config_path.is_some(),
                    egui::Button::new("Reload configuration"),
                )
                .clicked()
            {
                self.reload_config();
            }
        });
        if let Some(status) = &self.service_status {
            ui.label(status);
        }

        ui.add_space(16.0);
        ui.separator();
        ui.add_space(6.0);
        ui.heading("Versions");
        ui.label(format!("App version: {}", self.app_version));

        ui.add_space(12.0);
        if ui.button("Back to identification").clicked() {
            self.panel = Panel::Identify;
        }
    }
}

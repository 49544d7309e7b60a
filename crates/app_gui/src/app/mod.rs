//! Main window: image selection, submission and the results panel.

mod jobs;
mod preview;
mod settings;

use eframe::{App, Frame, egui};
use flora_core::config::CONFIG_FILE_NAME;
use flora_core::{
    AppConfig, HttpClassifier, IMAGE_EXTENSIONS, ImagePayload, PredictionRow, ResultsPanel,
    ServiceConfig, Session, SessionView, export_csv, present,
};
use jobs::{JobMessage, Jobs};
use preview::TexturePreviews;
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::Arc;

const PREVIEW_HEIGHT: f32 = 320.0;
const EMERALD: egui::Color32 = egui::Color32::from_rgb(16, 185, 129);
const EMERALD_DARK: egui::Color32 = egui::Color32::from_rgb(4, 120, 87);
const ERROR_RED: egui::Color32 = egui::Color32::from_rgb(220, 38, 38);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Panel {
    Identify,
    Settings,
}

/// What the user asked for during a frame; applied once drawing is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UiAction {
    PickImage,
    ClearImage,
    Identify,
    ExportCsv,
}

pub(crate) struct UiApp {
    session: Session<TexturePreviews>,
    config: AppConfig,
    config_path: Option<PathBuf>,
    classifier: Result<Arc<HttpClassifier>, String>,
    jobs: Jobs,
    panel: Panel,
    status: String,
    service_status: Option<String>,
    service_check_in_progress: bool,
    app_version: &'static str,
}

impl UiApp {
    pub(crate) fn new(ctx: &egui::Context) -> Self {
        let config_path = config_path();
        let mut status = String::new();
        let config = match &config_path {
            Some(path) => AppConfig::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load configuration: {e:#}");
                status = format!("Configuration ignored: {e:#}");
                AppConfig::default()
            }),
            None => AppConfig::default(),
        };
        let classifier = build_classifier(&config.service);
        if let Err(e) = &classifier {
            status = e.clone();
        }
        Self {
            session: Session::new(TexturePreviews::new(ctx)),
            config,
            config_path,
            classifier,
            jobs: Jobs::new(),
            panel: Panel::Identify,
            status,
            service_status: None,
            service_check_in_progress: false,
            app_version: env!("FLORA_VERSION"),
        }
    }

    fn drain_jobs(&mut self) {
        while let Ok(message) = self.jobs.try_recv_message() {
            match message {
                JobMessage::Classified { ticket, outcome } => {
                    self.session.finish_identify(ticket, outcome);
                }
                JobMessage::ServiceChecked(result) => {
                    self.service_check_in_progress = false;
                    self.service_status = Some(match result {
                        Ok(message) => format!("Online: {message}"),
                        Err(e) => {
                            tracing::warn!("Service check failed: {e}");
                            format!("Unreachable: {e}")
                        }
                    });
                }
            }
        }
    }

    fn apply(&mut self, ctx: &egui::Context, action: UiAction) {
        match action {
            UiAction::PickImage => self.pick_image(),
            UiAction::ClearImage => {
                self.session.clear_image();
            }
            UiAction::Identify => self.identify(ctx),
            UiAction::ExportCsv => self.export_results(),
        }
    }

    fn pick_image(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("Images", IMAGE_EXTENSIONS)
            .pick_file()
        else {
            return;
        };
        match ImagePayload::from_path(&path) {
            Ok(payload) => {
                self.status.clear();
                self.session.select_image(payload);
            }
            Err(e) => {
                tracing::warn!("{e:#}");
                self.status = format!("Could not open image: {e:#}");
            }
        }
    }

    fn identify(&mut self, ctx: &egui::Context) {
        let classifier = match &self.classifier {
            Ok(classifier) => Arc::clone(classifier),
            Err(e) => {
                self.status = e.clone();
                return;
            }
        };
        if let Some(submission) = self.session.begin_identify() {
            self.jobs.spawn_classify(ctx, classifier, submission);
        }
    }

    fn export_results(&mut self) {
        let Some(predictions) = self.session.predictions() else {
            return;
        };
        let default_name = format!(
            "flora_{}.csv",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let Some(path) = FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name(default_name)
            .save_file()
        else {
            return;
        };
        if let Err(e) = export_csv(predictions, &path) {
            self.status = format!("Export failed: {e}");
        } else {
            self.status = format!("CSV exported: {}", path.display());
        }
    }

    pub(super) fn check_service(&mut self, ctx: &egui::Context) {
        if self.service_check_in_progress {
            return;
        }
        match &self.classifier {
            Ok(classifier) => {
                self.service_check_in_progress = true;
                self.service_status = Some("Checking...".to_string());
                self.jobs.spawn_service_check(ctx, Arc::clone(classifier));
            }
            Err(e) => self.service_status = Some(e.clone()),
        }
    }

    pub(super) fn reload_config(&mut self) {
        let Some(path) = self.config_path.clone() else {
            return;
        };
        match AppConfig::load(&path) {
            Ok(config) => {
                self.classifier = build_classifier(&config.service);
                self.status = match &self.classifier {
                    Ok(_) => "Configuration reloaded.".to_string(),
                    Err(e) => e.clone(),
                };
                self.config = config;
                self.service_status = None;
            }
            Err(e) => {
                tracing::warn!("Failed to reload configuration: {e:#}");
                self.status = format!("Configuration not reloaded: {e:#}");
            }
        }
    }

    fn render_identify_panel(&self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        let view = present(&self.session, &self.config.display);
        ui.columns(2, |columns| {
            self.render_selection(&mut columns[0], &view, actions);
            render_results(&mut columns[1], &view, actions);
        });
    }

    fn render_selection(&self, ui: &mut egui::Ui, view: &SessionView, actions: &mut Vec<UiAction>) {
        ui.heading("Photo");
        ui.add_space(6.0);
        match self.session.preview() {
            Some(Some(texture)) => {
                ui.add(
                    egui::Image::new(texture)
                        .max_height(PREVIEW_HEIGHT)
                        .max_width(ui.available_width())
                        .maintain_aspect_ratio(true),
                );
            }
            Some(None) => {
                let name = self
                    .session
                    .selected()
                    .map(|p| p.file_name.as_str())
                    .unwrap_or_default();
                ui.label(format!("No preview available for {name}"));
            }
            None => {
                ui.label(egui::RichText::new("Pick a photo of a flower (JPG or PNG).").weak());
            }
        }
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui.button("Choose photo...").clicked() {
                actions.push(UiAction::PickImage);
            }
            if ui
                .add_enabled(view.clear_enabled, egui::Button::new("Clear"))
                .clicked()
            {
                actions.push(UiAction::ClearImage);
            }
        });
        ui.add_space(10.0);

        ui.horizontal(|ui| {
            let label = if view.submit.busy {
                "Processing..."
            } else {
                "Identify species"
            };
            if ui
                .add_enabled(view.submit.enabled, egui::Button::new(label))
                .clicked()
            {
                actions.push(UiAction::Identify);
            }
            if view.submit.busy {
                ui.spinner();
            }
        });

        if let Some(notice) = &view.notice {
            ui.add_space(10.0);
            egui::Frame::new()
                .fill(egui::Color32::from_rgb(254, 242, 242))
                .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(254, 226, 226)))
                .inner_margin(egui::Margin::same(8))
                .corner_radius(egui::CornerRadius::same(6))
                .show(ui, |ui| {
                    ui.colored_label(ERROR_RED, format!("⚠ {notice}"));
                });
        }
    }
}

fn render_results(ui: &mut egui::Ui, view: &SessionView, actions: &mut Vec<UiAction>) {
    ui.heading("Analysis results");
    ui.separator();
    match &view.results {
        ResultsPanel::Placeholder => {
            ui.add_space(40.0);
            ui.vertical_centered(|ui| {
                ui.label(
                    egui::RichText::new("Results will appear here after the analysis.").weak(),
                );
            });
        }
        ResultsPanel::Predictions { rows, footer } => {
            for row in rows {
                render_prediction_row(ui, row);
                ui.add_space(10.0);
            }
            ui.separator();
            for line in footer {
                ui.label(egui::RichText::new(line).small().weak());
            }
            ui.add_space(6.0);
            if ui.button("Export CSV").clicked() {
                actions.push(UiAction::ExportCsv);
            }
        }
    }
}

fn render_prediction_row(ui: &mut egui::Ui, row: &PredictionRow) {
    ui.horizontal(|ui| {
        let species = if row.emphasized {
            egui::RichText::new(&row.species)
                .size(18.0)
                .strong()
                .color(EMERALD_DARK)
        } else {
            egui::RichText::new(&row.species)
        };
        ui.label(species);
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            ui.label(egui::RichText::new(&row.confidence_label).strong());
        });
    });
    let fill = if row.emphasized {
        EMERALD
    } else {
        egui::Color32::GRAY
    };
    ui.add(
        egui::ProgressBar::new(row.bar_fraction)
            .desired_height(8.0)
            .fill(fill),
    );
}

fn build_classifier(service: &ServiceConfig) -> Result<Arc<HttpClassifier>, String> {
    HttpClassifier::new(service).map(Arc::new).map_err(|e| {
        tracing::error!("Classifier unavailable: {e:#}");
        format!("Classification service misconfigured: {e:#}")
    })
}

fn config_path() -> Option<PathBuf> {
    directories_next::ProjectDirs::from("org", "Flora", "FloraId")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

impl App for UiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.drain_jobs();

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Flora ID");
                ui.separator();
                ui.selectable_value(&mut self.panel, Panel::Identify, "Identify");
                ui.selectable_value(&mut self.panel, Panel::Settings, "Settings");
                if !self.status.is_empty() {
                    ui.separator();
                    ui.label(&self.status);
                }
            });
        });

        let mut actions = Vec::new();
        egui::CentralPanel::default().show(ctx, |ui| match self.panel {
            Panel::Identify => self.render_identify_panel(ui, &mut actions),
            Panel::Settings => self.render_settings_panel(ui),
        });
        for action in actions {
            self.apply(ctx, action);
        }
    }
}

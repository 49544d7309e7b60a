//! View model of a session. Pure: the GUI draws whatever [`present`] returns.

use crate::config::DisplayConfig;
use crate::session::{PreviewFactory, Session, SubmissionState};
use crate::{Prediction, PredictionList};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub preview_visible: bool,
    pub clear_enabled: bool,
    pub submit: SubmitAction,
    /// Error notice, shown apart from the results.
    pub notice: Option<String>,
    pub results: ResultsPanel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitAction {
    pub enabled: bool,
    /// Show the loading indicator.
    pub busy: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultsPanel {
    Placeholder,
    Predictions {
        rows: Vec<PredictionRow>,
        footer: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub species: String,
    pub confidence: f64,
    pub confidence_label: String,
    /// Width of the confidence bar relative to a full bar.
    pub bar_fraction: f32,
    /// Only the top answer is emphasized.
    pub emphasized: bool,
}

pub fn present<F: PreviewFactory>(session: &Session<F>, display: &DisplayConfig) -> SessionView {
    let state = session.state();
    let submit = SubmitAction {
        enabled: session.can_identify(),
        busy: matches!(state, SubmissionState::InFlight { .. }),
    };
    let (notice, results) = match state {
        SubmissionState::Succeeded { predictions, .. } => (
            None,
            ResultsPanel::Predictions {
                rows: prediction_rows(predictions),
                footer: display.footer.clone(),
            },
        ),
        SubmissionState::Failed { message, .. } => {
            (Some(message.clone()), ResultsPanel::Placeholder)
        }
        _ => (None, ResultsPanel::Placeholder),
    };
    SessionView {
        preview_visible: state.image().is_some(),
        clear_enabled: state.image().is_some(),
        submit,
        notice,
        results,
    }
}

fn prediction_rows(predictions: &PredictionList) -> Vec<PredictionRow> {
    predictions
        .iter()
        .enumerate()
        .map(|(index, prediction)| row(index, prediction))
        .collect()
}

fn row(index: usize, prediction: &Prediction) -> PredictionRow {
    PredictionRow {
        species: prediction.species.clone(),
        confidence: prediction.confidence,
        confidence_label: format!("{}%", prediction.confidence),
        bar_fraction: bar_fraction(prediction.confidence),
        emphasized: index == 0,
    }
}

fn bar_fraction(confidence: f64) -> f32 {
    if confidence.is_nan() {
        return 0.0;
    }
    (confidence / 100.0).clamp(0.0, 1.0) as f32
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub mod client;
pub mod config;
pub mod export;
pub mod presenter;
pub mod session;

pub use client::{Classifier, ClassifyError, GENERIC_FAILURE_MESSAGE, HttpClassifier};
pub use config::{AppConfig, DisplayConfig, ServiceConfig};
pub use export::export_csv;
pub use presenter::{PredictionRow, ResultsPanel, SessionView, SubmitAction, present};
pub use session::{
    PreviewFactory, SelectedImage, Session, Submission, SubmissionPhase, SubmissionState,
};

/// One (species, confidence) pair returned by the classification service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub species: String,
    /// Percentage, nominally in [0,100]. Kept exactly as the service sent it.
    pub confidence: f64,
}

/// Predictions in the order the service returned them; index 0 is the top answer.
pub type PredictionList = Vec<Prediction>;

/// File extensions offered by the image picker.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Raw image bytes as picked by the user, plus what the upload needs to name them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl ImagePayload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let file_name = file_name.into();
        let mime = mime_for(&file_name).to_string();
        Self {
            file_name,
            mime,
            bytes: bytes.into(),
        }
    }

    /// Read a picked file into memory. The content is not validated.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read image: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

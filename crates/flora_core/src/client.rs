//! Client for the remote species classification service.

use crate::config::ServiceConfig;
use crate::{ImagePayload, PredictionList};
use anyhow::{Context, Result};
use reqwest::blocking::{Client, multipart};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Shown for every failure the service did not explain itself.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Could not identify the image. Is the classification service running?";

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("request to classification service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("classification service answered with HTTP {0}")]
    Status(StatusCode),
    #[error("classification service reported: {0}")]
    Service(String),
    #[error("unexpected response from classification service: {0}")]
    Malformed(String),
}

impl ClassifyError {
    /// Text for the error notice. Only messages sent by the service itself are
    /// passed through; everything else collapses into the generic message.
    pub fn user_message(&self) -> String {
        match self {
            ClassifyError::Service(message) => message.clone(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Sends one image and resolves to the service's ranked predictions.
pub trait Classifier {
    fn classify(&self, image: &ImagePayload) -> Result<PredictionList, ClassifyError>;
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Option<PredictionList>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    message: String,
}

/// Parse a success body. A non-empty `error` wins over `predictions`.
pub(crate) fn parse_predict_response(body: &[u8]) -> Result<PredictionList, ClassifyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ClassifyError::Malformed("empty body".into()));
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ClassifyError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(ClassifyError::Malformed("expected a JSON object".into()));
    }
    if let Some(message) = value
        .get("error")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
    {
        return Err(ClassifyError::Service(message.to_string()));
    }
    let response =
        PredictResponse::deserialize(value).map_err(|e| ClassifyError::Malformed(e.to_string()))?;
    match response {
        PredictResponse {
            predictions: Some(predictions),
            ..
        } => Ok(predictions),
        _ => Err(ClassifyError::Malformed("no predictions field".into())),
    }
}

/// Blocking multipart client for the prediction endpoint.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    endpoint: Url,
    upload_field: String,
}

impl HttpClassifier {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .with_context(|| format!("invalid classification endpoint: {}", config.endpoint))?;
        // Requests are never timed out; a hung service keeps the session in flight.
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            upload_field: config.upload_field.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Query the service root, which answers with a short status message.
    pub fn ping(&self) -> Result<String, ClassifyError> {
        let mut root = self.endpoint.clone();
        root.set_path("/");
        root.set_query(None);
        tracing::debug!("checking classification service at {root}");
        let response = self.client.get(root).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::Status(status));
        }
        let body = response.bytes()?;
        let status: StatusResponse =
            serde_json::from_slice(&body).map_err(|e| ClassifyError::Malformed(e.to_string()))?;
        Ok(status.message)
    }
}

impl Classifier for HttpClassifier {
    fn classify(&self, image: &ImagePayload) -> Result<PredictionList, ClassifyError> {
        let part = multipart::Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime)?;
        let form = multipart::Form::new().part(self.upload_field.clone(), part);
        tracing::debug!(
            "POST {} with {} ({} bytes)",
            self.endpoint,
            image.file_name,
            image.len()
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::Status(status));
        }
        let body = response.bytes()?;
        parse_predict_response(&body)
    }
}

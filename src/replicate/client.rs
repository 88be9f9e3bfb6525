//! ReplicateClient - handles communication with the Replicate API.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::error::{PipelineError, Result};

/// The environment variable name for the Replicate API token.
pub const REPLICATE_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

/// Default base URL for the Replicate API.
pub const REPLICATE_API_BASE_URL: &str = "https://api.replicate.com";

/// Default model for first-frame image generation (version-pinned).
pub const DEFAULT_IMAGE_MODEL: &str =
    "stability-ai/sdxl:2b017d9b67edd2ee1401238df49d75da53c523f36e363881e057f5dc3ed3c5b2";

/// Default model for video generation.
pub const DEFAULT_VIDEO_MODEL: &str = "minimax/video-01-live";

/// Default timeout for HTTP requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default overall timeout for a single generation (120 seconds).
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Default polling interval for prediction status checks (2 seconds).
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A prediction record as returned by the Replicate API.
///
/// Only the fields the pipeline consumes are deserialized; everything else in
/// the response body is ignored.
#[derive(Debug, Deserialize)]
pub struct Prediction {
    /// The unique prediction ID for polling.
    pub id: String,
    /// Raw status string ("starting", "processing", "succeeded", ...).
    pub status: String,
    /// Model output when succeeded. A single URL string or a list of URLs
    /// depending on the model.
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// Error message if the prediction failed.
    #[serde(default)]
    pub error: Option<String>,
}

/// State of a prediction, decoded from the raw status string.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionState {
    /// Prediction is queued for processing.
    Pending,
    /// Model is running.
    InProgress,
    /// Prediction finished; output URLs extracted.
    Succeeded { urls: Vec<String> },
    /// Prediction failed or was canceled on the server.
    Failed { error: String },
}

impl Prediction {
    /// Decode the raw status string into a `PredictionState`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Upstream` for a status string this client does
    /// not recognize.
    pub fn state(&self) -> Result<PredictionState> {
        match self.status.as_str() {
            "starting" | "queued" => Ok(PredictionState::Pending),
            "processing" => Ok(PredictionState::InProgress),
            "succeeded" => Ok(PredictionState::Succeeded {
                urls: self.output_urls(),
            }),
            "failed" | "canceled" => Ok(PredictionState::Failed {
                error: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "prediction failed with no error message".to_string()),
            }),
            unknown => Err(PipelineError::Upstream(format!(
                "unknown prediction status: {}",
                unknown
            ))),
        }
    }

    /// Normalize the output field to a sequence of URL strings.
    ///
    /// Models return either a bare string or a list of strings; both shapes
    /// collapse to a `Vec<String>`. Non-string list elements are skipped.
    pub fn output_urls(&self) -> Vec<String> {
        match &self.output {
            Some(serde_json::Value::String(url)) => vec![url.clone()],
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Client for communicating with the Replicate API.
pub struct ReplicateClient {
    token: String,
    base_url: String,
    image_model: String,
    video_model: String,
    generation_timeout: Duration,
    http_client: reqwest::Client,
}

impl ReplicateClient {
    /// Create a new ReplicateClient by reading the token from the environment.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NotConfigured` if the `REPLICATE_API_TOKEN`
    /// environment variable is not set.
    pub fn new() -> Result<Self> {
        let token =
            std::env::var(REPLICATE_TOKEN_ENV).map_err(|_| PipelineError::NotConfigured)?;
        Self::with_token(token)
    }

    /// Create a new ReplicateClient with an explicit token.
    ///
    /// Leading and trailing whitespace is trimmed from the token. An empty
    /// token is rejected with `NotConfigured`.
    pub fn with_token(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(PipelineError::NotConfigured);
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            token,
            base_url: REPLICATE_API_BASE_URL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            http_client,
        })
    }

    /// Create a new ReplicateClient with a custom base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let mut client = Self::with_token(token)?;
        client.base_url = base_url.into();
        Ok(client)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the image model identifier.
    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    /// Get the video model identifier.
    pub fn video_model(&self) -> &str {
        &self.video_model
    }

    /// Get the overall generation timeout.
    pub fn generation_timeout(&self) -> Duration {
        self.generation_timeout
    }

    /// Override the image model identifier.
    pub fn set_image_model(&mut self, model: impl Into<String>) {
        self.image_model = model.into();
    }

    /// Override the video model identifier.
    pub fn set_video_model(&mut self, model: impl Into<String>) {
        self.video_model = model.into();
    }

    /// Override the overall generation timeout.
    pub fn set_generation_timeout(&mut self, timeout: Duration) {
        self.generation_timeout = timeout;
    }

    /// Check the stored token against the provider's account endpoint.
    ///
    /// A 2xx response means the token is valid; 401/403 means it was rejected.
    /// Neither outcome is an error - the caller decides how to react.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Upstream` for transport failures or unexpected
    /// status codes.
    pub async fn verify_token(&self) -> Result<bool> {
        let url = format!("{}/v1/account", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            log::warn!("API token rejected by provider (status {})", status);
            return Ok(false);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(PipelineError::Upstream(format!(
            "account check failed with status {}: {}",
            status, error_text
        )))
    }

    /// Create a prediction for the given model and input.
    ///
    /// A model identifier of the form `owner/name:version` is submitted to the
    /// version-based predictions endpoint; a bare `owner/name` goes to the
    /// model-scoped endpoint. The input object is passed through unchanged.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Upstream` if the API rejects the request or the
    /// transport fails.
    pub async fn create_prediction(
        &self,
        model: &str,
        input: serde_json::Value,
    ) -> Result<Prediction> {
        let (url, body) = match model.split_once(':') {
            Some((_, version)) => (
                format!("{}/v1/predictions", self.base_url),
                json!({ "version": version, "input": input }),
            ),
            None => (
                format!("{}/v1/models/{}/predictions", self.base_url, model),
                json!({ "input": input }),
            ),
        };

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::Upstream(format!(
                "prediction request failed with status {}: {}",
                status, error_text
            )));
        }

        let prediction: Prediction = response.json().await?;
        Ok(prediction)
    }

    /// Fetch the current state of a prediction by ID.
    pub async fn get_prediction(&self, id: &str) -> Result<Prediction> {
        let url = format!("{}/v1/predictions/{}", self.base_url, id);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::Upstream(format!(
                "status check failed with status {}: {}",
                status, error_text
            )));
        }

        let prediction: Prediction = response.json().await?;
        Ok(prediction)
    }

    /// Poll a prediction until it finishes, bounded by the generation timeout.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Upstream` if the timeout expires before the
    /// prediction finishes, and `PipelineError::GenerationFailed` if the
    /// provider reports a failed or canceled prediction.
    pub async fn wait_for_output(&self, id: &str) -> Result<Vec<String>> {
        use tokio::time::Instant;

        let start = Instant::now();
        loop {
            if start.elapsed() > self.generation_timeout {
                log::error!(
                    "generation timed out after {:?} (prediction {})",
                    self.generation_timeout,
                    id
                );
                return Err(PipelineError::Upstream(format!(
                    "generation timed out after {:?}",
                    self.generation_timeout
                )));
            }

            let prediction = self.get_prediction(id).await?;
            match prediction.state()? {
                PredictionState::Pending => {
                    log::debug!("prediction {} pending", id);
                }
                PredictionState::InProgress => {
                    log::debug!("prediction {} processing", id);
                }
                PredictionState::Succeeded { urls } => {
                    log::info!("prediction {} succeeded ({} output urls)", id, urls.len());
                    return Ok(urls);
                }
                PredictionState::Failed { error } => {
                    log::error!("prediction {} failed: {}", id, error);
                    return Err(PipelineError::GenerationFailed(error));
                }
            }

            tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
        }
    }

    /// Create a prediction and wait for its output URLs.
    ///
    /// This is the end-to-end call the stages build on: submit, poll to
    /// completion under the generation timeout, return the output sequence.
    pub async fn run(&self, model: &str, input: serde_json::Value) -> Result<Vec<String>> {
        let prediction = self.create_prediction(model, input).await?;
        log::info!("submitted prediction {} for model {}", prediction.id, model);

        // A prediction can complete synchronously; avoid one pointless poll.
        match prediction.state()? {
            PredictionState::Succeeded { urls } => Ok(urls),
            PredictionState::Failed { error } => Err(PipelineError::GenerationFailed(error)),
            _ => self.wait_for_output(&prediction.id).await,
        }
    }
}

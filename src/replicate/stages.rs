//! Image and video generation stages.
//!
//! Each stage wraps one hosted model call: validate the inputs, build the
//! input object, run the prediction, and check the output before it is
//! trusted by the rest of the pipeline.

use serde::Serialize;
use serde_json::json;

use super::client::ReplicateClient;
use crate::error::{PipelineError, Result};

/// Smallest accepted image dimension.
pub const MIN_DIMENSION: u32 = 384;

/// Largest accepted image dimension.
pub const MAX_DIMENSION: u32 = 1024;

/// Dimensions must be a multiple of this step.
pub const DIMENSION_STEP: u32 = 128;

/// Validate a single image dimension against the allowed discrete set.
pub fn validate_dimension(value: u32) -> Result<()> {
    if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
        return Err(PipelineError::Validation(format!(
            "dimension {} out of range ({}-{})",
            value, MIN_DIMENSION, MAX_DIMENSION
        )));
    }
    if value % DIMENSION_STEP != 0 {
        return Err(PipelineError::Validation(format!(
            "dimension {} is not a multiple of {}",
            value, DIMENSION_STEP
        )));
    }
    Ok(())
}

/// Input to the image stage: a prompt plus target dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            prompt: prompt.into(),
            width,
            height,
        }
    }

    /// Check the request before it is sent to the model.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(PipelineError::Validation("prompt is empty".to_string()));
        }
        validate_dimension(self.width)?;
        validate_dimension(self.height)?;
        Ok(())
    }
}

/// URL of a generated first-frame image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResult {
    pub url: String,
}

/// URL of a generated video clip.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoResult {
    pub url: String,
}

/// Optional video model parameters, passed through unchanged.
///
/// These are opaque to the pipeline: no defaults are inferred and no
/// validation is applied. Fields are only serialized when set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoTunables {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_optimizer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_frames: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpolation: Option<bool>,
}

/// Run the image stage: prompt + dimensions in, first output URL out.
///
/// # Errors
///
/// Returns `PipelineError::Validation` for an empty prompt or out-of-range
/// dimensions, `PipelineError::GenerationFailed` when the model returns no
/// output, and `PipelineError::Upstream` for transport or API failures.
pub async fn generate_image(
    client: &ReplicateClient,
    request: &GenerationRequest,
) -> Result<ImageResult> {
    request.validate()?;

    let input = json!({
        "prompt": request.prompt,
        "width": request.width,
        "height": request.height,
    });

    let output = client.run(client.image_model(), input).await?;
    let url = output.into_iter().next().ok_or_else(|| {
        PipelineError::GenerationFailed("image model returned no output".to_string())
    })?;

    log::info!("first frame ready: {}", url);
    Ok(ImageResult { url })
}

/// Run the video stage: prompt + first-frame URL in, checked video URL out.
///
/// The first output element must be an absolute http/https URL; anything else
/// is rejected before it reaches the download layer.
///
/// # Errors
///
/// Returns `PipelineError::Validation` for an empty prompt or missing image
/// URL, `PipelineError::GenerationFailed` when the model returns no output,
/// `PipelineError::InvalidUpstreamResult` for a malformed URL, and
/// `PipelineError::Upstream` for transport or API failures.
pub async fn generate_video(
    client: &ReplicateClient,
    prompt: &str,
    image_url: &str,
    tunables: &VideoTunables,
) -> Result<VideoResult> {
    if prompt.trim().is_empty() {
        return Err(PipelineError::Validation("prompt is empty".to_string()));
    }
    if image_url.is_empty() {
        return Err(PipelineError::Validation(
            "no first-frame image; run the image stage first".to_string(),
        ));
    }

    let mut input = json!({
        "prompt": prompt,
        "first_frame_image": image_url,
    });
    if let (Some(fields), Ok(serde_json::Value::Object(extra))) =
        (input.as_object_mut(), serde_json::to_value(tunables))
    {
        fields.extend(extra);
    }

    let output = client.run(client.video_model(), input).await?;
    let url = output.into_iter().next().ok_or_else(|| {
        PipelineError::GenerationFailed("video model returned no output".to_string())
    })?;

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(PipelineError::InvalidUpstreamResult(format!(
            "expected an absolute http(s) URL, got {:?}",
            url
        )));
    }

    log::info!("video ready: {}", url);
    Ok(VideoResult { url })
}

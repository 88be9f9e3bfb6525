//! Replicate API integration module.
//!
//! Everything that talks to the hosted models lives here: the prediction
//! client (submit, poll, decode output), the image and video stages built on
//! top of it, and the artifact download layer with its transient preview
//! file.

mod artifact;
mod client;
mod stages;

pub use artifact::{ArtifactFetcher, PreviewFile, ARTIFACT_FILE_NAME, ARTIFACT_MEDIA_TYPE};
pub use client::{
    Prediction, PredictionState, ReplicateClient, DEFAULT_GENERATION_TIMEOUT, DEFAULT_IMAGE_MODEL,
    DEFAULT_VIDEO_MODEL, REPLICATE_API_BASE_URL, REPLICATE_TOKEN_ENV,
};
pub use stages::{
    generate_image, generate_video, validate_dimension, GenerationRequest, ImageResult,
    VideoResult, VideoTunables, DIMENSION_STEP, MAX_DIMENSION, MIN_DIMENSION,
};

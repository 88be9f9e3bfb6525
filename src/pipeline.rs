//! Session driver: credential holding plus the two-stage generation pipeline.
//!
//! One `Session` owns the API client, the state machine, and the artifact
//! fetcher for a single user visit. Stage methods take `&mut self`, so a
//! second invocation cannot start while one is outstanding, and every failure
//! leaves the previous state value in place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::replicate::{
    generate_image, generate_video, ArtifactFetcher, GenerationRequest, ImageResult, PreviewFile,
    ReplicateClient, VideoResult, VideoTunables,
};
use crate::session::SessionState;

/// Interaction state for one user visit.
pub struct Session {
    client: Option<ReplicateClient>,
    credential_valid: Option<bool>,
    state: SessionState,
    fetcher: ArtifactFetcher,
    tunables: VideoTunables,
    verify_links: bool,
    generation_timeout: Duration,
    image_model: Option<String>,
    video_model: Option<String>,
}

impl Session {
    /// Create a session with default settings and no credential.
    pub fn new() -> Result<Self> {
        Self::from_config(&Config::default())
    }

    /// Create a session configured from a loaded config file.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            client: None,
            credential_valid: None,
            state: SessionState::Empty,
            fetcher: ArtifactFetcher::new()?,
            tunables: config.video.tunables(),
            verify_links: config.video.verify_links,
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
            image_model: config.generation.image_model.clone(),
            video_model: config.generation.video_model.clone(),
        })
    }

    /// Override the pass-through video parameters.
    pub fn set_tunables(&mut self, tunables: VideoTunables) {
        self.tunables = tunables;
    }

    pub fn tunables(&self) -> &VideoTunables {
        &self.tunables
    }

    /// Supply the API credential for this session.
    ///
    /// The token is trimmed, stored in memory only, and checked against the
    /// provider. Returns the validity result; an invalid credential is not an
    /// error, just an observable status.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` for an empty token and
    /// `PipelineError::Upstream` when the validation call cannot complete.
    pub async fn set_credential(&mut self, token: &str) -> Result<bool> {
        let token = token.trim();
        if token.is_empty() {
            return Err(PipelineError::Validation("API token is empty".to_string()));
        }
        let client = ReplicateClient::with_token(token)?;
        self.attach_client(client).await
    }

    /// Install a pre-built client (custom base URL in tests) and validate its
    /// credential. Session-level model and timeout overrides are applied here.
    pub async fn attach_client(&mut self, mut client: ReplicateClient) -> Result<bool> {
        if let Some(model) = &self.image_model {
            client.set_image_model(model.clone());
        }
        if let Some(model) = &self.video_model {
            client.set_video_model(model.clone());
        }
        client.set_generation_timeout(self.generation_timeout);

        let valid = client.verify_token().await?;
        self.credential_valid = Some(valid);
        self.client = Some(client);
        Ok(valid)
    }

    /// Validity of the stored credential: None until one is supplied.
    pub fn credential_status(&self) -> Option<bool> {
        self.credential_valid
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn client(&self) -> Result<&ReplicateClient> {
        self.client.as_ref().ok_or(PipelineError::NotConfigured)
    }

    /// Run the image stage and advance the session to `ImageReady`.
    ///
    /// A previously attached video is cleared: a clip is only valid for the
    /// frame it was derived from. On failure the state is left untouched.
    pub async fn generate_image(&mut self, request: &GenerationRequest) -> Result<ImageResult> {
        let client = self.client()?;
        let image = generate_image(client, request).await?;
        self.state = self.state.with_image(image.clone());
        Ok(image)
    }

    /// Run the video stage and advance the session to `VideoReady`.
    ///
    /// Requires a first frame; rejected with `Validation` otherwise. When
    /// link verification is enabled the returned URL is probed with a HEAD
    /// request, but a failed probe only logs - some providers reject HEAD.
    pub async fn generate_video(&mut self, prompt: &str) -> Result<VideoResult> {
        let client = self.client()?;
        let image_url = self
            .state
            .image_url()
            .ok_or_else(|| {
                PipelineError::Validation(
                    "no first-frame image; run the image stage first".to_string(),
                )
            })?
            .to_string();

        let video = generate_video(client, prompt, &image_url, &self.tunables).await?;

        if self.verify_links && !self.fetcher.probe(&video.url).await {
            log::warn!("result URL {} did not answer HEAD; accepting anyway", video.url);
        }

        self.state = self.state.with_video(video.clone())?;
        Ok(video)
    }

    /// Download the generated video into memory.
    ///
    /// The bytes pass through the per-process preview file, which is removed
    /// again before this method returns - on the error paths too, since the
    /// guard deletes it on drop. No persistent cache: calling twice downloads
    /// twice.
    pub async fn fetch_video(&self) -> Result<Vec<u8>> {
        let url = self
            .state
            .video_url()
            .ok_or_else(|| PipelineError::Validation("no video to download".to_string()))?
            .to_string();

        let bytes = self.fetcher.fetch(&url).await?;
        let preview = PreviewFile::write(&bytes)?;
        log::debug!("preview staged at {}", preview.path().display());
        Ok(bytes)
    }

    /// Download the generated video and save it to `dest`.
    pub async fn save_video(&self, dest: &Path) -> Result<PathBuf> {
        let bytes = self.fetch_video().await?;
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(dest, &bytes)?;
        log::info!("saved {} bytes to {}", bytes.len(), dest.display());
        Ok(dest.to_path_buf())
    }

    /// Clear both results, returning the session to `Empty`.
    ///
    /// The credential is kept: reset clears results, not authentication.
    pub fn reset(&mut self) {
        self.state = self.state.reset();
    }
}

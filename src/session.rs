//! Session state machine for the two-stage pipeline.
//!
//! `Empty -> ImageReady -> VideoReady`, with an explicit reset back to
//! `Empty`. Transitions return a new state value instead of mutating fields
//! in place, so a failed stage call can never leave the state half-updated.
//! A new image always drops any attached video: a clip is only valid for the
//! frame it was derived from.

use crate::error::{PipelineError, Result};
use crate::replicate::{ImageResult, VideoResult};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// No results yet.
    #[default]
    Empty,
    /// A first frame has been generated.
    ImageReady { image: ImageResult },
    /// Both the first frame and the animated clip are available.
    VideoReady {
        image: ImageResult,
        video: VideoResult,
    },
}

impl SessionState {
    /// Attach a freshly generated first frame.
    ///
    /// Valid from every state. Any previously attached video is dropped.
    pub fn with_image(&self, image: ImageResult) -> SessionState {
        SessionState::ImageReady { image }
    }

    /// Attach a freshly generated video.
    ///
    /// Requires a first frame to be present; regenerating the video while one
    /// is already attached replaces it.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` when no image exists.
    pub fn with_video(&self, video: VideoResult) -> Result<SessionState> {
        match self {
            SessionState::Empty => Err(PipelineError::Validation(
                "no first-frame image; run the image stage first".to_string(),
            )),
            SessionState::ImageReady { image } | SessionState::VideoReady { image, .. } => {
                Ok(SessionState::VideoReady {
                    image: image.clone(),
                    video,
                })
            }
        }
    }

    /// Clear both results. Valid from every state.
    pub fn reset(&self) -> SessionState {
        SessionState::Empty
    }

    pub fn image(&self) -> Option<&ImageResult> {
        match self {
            SessionState::Empty => None,
            SessionState::ImageReady { image } | SessionState::VideoReady { image, .. } => {
                Some(image)
            }
        }
    }

    pub fn video(&self) -> Option<&VideoResult> {
        match self {
            SessionState::VideoReady { video, .. } => Some(video),
            _ => None,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image().map(|image| image.url.as_str())
    }

    pub fn video_url(&self) -> Option<&str> {
        self.video().map(|video| video.url.as_str())
    }

    /// True once the full pipeline has produced a video.
    pub fn is_complete(&self) -> bool {
        matches!(self, SessionState::VideoReady { .. })
    }

    /// Short state name for status output.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::ImageReady { .. } => "image-ready",
            SessionState::VideoReady { .. } => "video-ready",
        }
    }
}

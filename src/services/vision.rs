//! Capture-and-ask vision operations

use std::sync::Arc;

use super::{FrameSource, VisionModel};
use crate::Error;

const SCENE_PROMPT: &str =
    "Describe the scene in detail, focusing on objects, colors, and overall environment.";
const TEXT_PROMPT: &str = "Read all the text in this image. If there is no text, say 'No text found'.";
const OBJECTS_PROMPT: &str = "List all prominent objects you see in this image. Be concise.";
const FACE_PROMPT: &str = "Is there a human face in this image? If so, describe any identifiable features. Do not attempt to identify individuals.";

/// Why a vision operation produced no answer
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// No model configured
    #[error("vision model unavailable")]
    Unavailable,
    /// No camera, or the capture failed
    #[error("no image available")]
    NoImage,
    /// The model call failed
    #[error(transparent)]
    Failed(#[from] Error),
}

/// Camera plus model, exposing the four vision operations
#[derive(Clone, Default)]
pub struct Vision {
    frames: Option<Arc<dyn FrameSource>>,
    model: Option<Arc<dyn VisionModel>>,
}

impl Vision {
    #[must_use]
    pub fn new(frames: Option<Arc<dyn FrameSource>>, model: Option<Arc<dyn VisionModel>>) -> Self {
        Self { frames, model }
    }

    /// # Errors
    ///
    /// Returns error if no model, no image, or the model call fails
    pub fn describe_scene(&self, prompt_suffix: &str) -> Result<String, VisionError> {
        self.ask(&with_suffix(SCENE_PROMPT, prompt_suffix))
    }

    /// # Errors
    ///
    /// Returns error if no image, no model, or the model call fails
    pub fn read_text(&self) -> Result<String, VisionError> {
        if self.frames.is_none() {
            return Err(VisionError::NoImage);
        }
        self.ask(TEXT_PROMPT)
    }

    /// # Errors
    ///
    /// Returns error if no model, no image, or the model call fails
    pub fn detect_objects(&self, prompt_suffix: &str) -> Result<String, VisionError> {
        self.ask(&with_suffix(OBJECTS_PROMPT, prompt_suffix))
    }

    /// # Errors
    ///
    /// Returns error if no model, no image, or the model call fails
    pub fn recognize_face(&self) -> Result<String, VisionError> {
        self.ask(FACE_PROMPT)
    }

    fn ask(&self, prompt: &str) -> Result<String, VisionError> {
        let model = self.model.as_ref().ok_or(VisionError::Unavailable)?;
        let frames = self.frames.as_ref().ok_or(VisionError::NoImage)?;
        let jpeg = frames.capture_jpeg().map_err(|e| {
            tracing::warn!(error = %e, "frame capture failed");
            VisionError::NoImage
        })?;
        let answer = model.analyze(prompt, &jpeg).inspect_err(|e| {
            tracing::error!(error = %e, "vision request failed");
        })?;
        Ok(answer)
    }
}

fn with_suffix(base: &str, suffix: &str) -> String {
    format!("{base} {suffix}").trim().to_string()
}

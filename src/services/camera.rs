//! Camera frame sources

use std::path::PathBuf;

use super::FrameSource;
use crate::{Error, Result};

/// Serves a JPEG file from disk as the current frame
///
/// Stands in for a camera on development hosts; the file is re-read on every
/// capture so it can be swapped while running.
#[derive(Debug, Clone)]
pub struct StillImageSource {
    path: PathBuf,
}

impl StillImageSource {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl FrameSource for StillImageSource {
    fn capture_jpeg(&self) -> Result<Vec<u8>> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            Error::Vision(format!("failed to read frame {}: {e}", self.path.display()))
        })?;
        if bytes.is_empty() {
            return Err(Error::Vision(format!("frame {} is empty", self.path.display())));
        }
        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "frame captured");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();

        let source = StillImageSource::new(path);
        assert_eq!(source.capture_jpeg().unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_missing_file_errors() {
        let source = StillImageSource::new(PathBuf::from("/nonexistent/frame.jpg"));
        assert!(source.capture_jpeg().is_err());
    }
}

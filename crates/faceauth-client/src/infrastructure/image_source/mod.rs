//! Image sources: where the captured face image comes from.
//!
//! Camera acquisition and JPEG encoding happen outside this crate.  The client
//! only needs "give me the current encoded frame", expressed by the
//! [`ImageSource`] trait.  The blob is opaque; nothing here decodes it.
//!
//! Shipped implementations:
//! - [`FileImageSource`] reads a pre-encoded image from disk on every capture.
//! - [`StaticImageSource`] hands out in-memory bytes (tests, kiosk demos).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Errors produced while capturing a face image.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The source produced zero bytes.
    #[error("captured image is empty")]
    Empty,

    /// The image file could not be read.
    #[error("failed to read image from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Supplies an encoded face image on demand.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Returns the current encoded image.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Empty`] when no usable image is available.
    async fn capture(&self) -> Result<Vec<u8>, CaptureError>;
}

/// Reads the image from a file on each capture.
#[derive(Debug, Clone)]
pub struct FileImageSource {
    path: PathBuf,
}

impl FileImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ImageSource for FileImageSource {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| CaptureError::Io {
                path: self.path.clone(),
                source,
            })?;
        if bytes.is_empty() {
            return Err(CaptureError::Empty);
        }
        debug!("read {} image bytes from {:?}", bytes.len(), self.path);
        Ok(bytes)
    }
}

/// Returns a fixed in-memory image; the bytes can be swapped at runtime.
#[derive(Debug, Default)]
pub struct StaticImageSource {
    bytes: Mutex<Vec<u8>>,
}

impl StaticImageSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(bytes),
        }
    }

    /// Replaces the image returned by later captures.
    pub fn replace(&self, bytes: Vec<u8>) {
        if let Ok(mut current) = self.bytes.lock() {
            *current = bytes;
        }
    }
}

#[async_trait]
impl ImageSource for StaticImageSource {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        let bytes = self
            .bytes
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default();
        if bytes.is_empty() {
            return Err(CaptureError::Empty);
        }
        Ok(bytes)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Pipeline configuration.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};

/// Default permission bits for attachment files.
pub const DEFAULT_FILE_MODE: u32 = 0o600;

/// Default permission bits for per-message attachment directories.
pub const DEFAULT_DIR_MODE: u32 = 0o700;

/// Where and how attachments are persisted and published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Base directory; each message gets a subdirectory named after its id.
    pub attachments_dir: PathBuf,
    /// Public URL under which `attachments_dir` is served.
    pub attachments_url: Url,
    /// Permission bits for created files (Unix only).
    pub file_mode: u32,
    /// Permission bits for created directories (Unix only).
    pub dir_mode: u32,
}

impl PipelineConfig {
    /// Creates a configuration with default permission bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `attachments_url` is not an absolute URL
    /// that can carry path segments.
    pub fn new(attachments_dir: impl Into<PathBuf>, attachments_url: &str) -> Result<Self> {
        let url = Url::parse(attachments_url)
            .map_err(|e| Error::Config(format!("invalid attachments URL {attachments_url:?}: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "attachments URL {attachments_url:?} cannot hold path segments"
            )));
        }

        Ok(Self {
            attachments_dir: attachments_dir.into(),
            attachments_url: url,
            file_mode: DEFAULT_FILE_MODE,
            dir_mode: DEFAULT_DIR_MODE,
        })
    }

    /// Sets the file permission bits.
    #[must_use]
    pub const fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Sets the directory permission bits.
    #[must_use]
    pub const fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Returns the storage directory for one message.
    #[must_use]
    pub fn message_dir(&self, message_key: &str) -> PathBuf {
        self.attachments_dir.join(message_key)
    }

    /// Returns the base directory.
    #[must_use]
    pub fn attachments_dir(&self) -> &Path {
        &self.attachments_dir
    }

    /// Returns the public location of a file stored for a message.
    ///
    /// Both segments are percent-escaped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL cannot hold path segments.
    pub fn location_for(&self, message_key: &str, filename: &str) -> Result<String> {
        let mut url = self.attachments_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config("attachments URL cannot hold path segments".to_string()))?
            .pop_if_empty()
            .push(message_key)
            .push(filename);
        Ok(url.into())
    }
}

/// Parses an octal permission string such as `0600` or `0o700`.
///
/// # Errors
///
/// Returns [`Error::Config`] if the value is not octal or exceeds `0o7777`.
pub fn parse_mode(value: &str) -> Result<u32> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);

    let mode = u32::from_str_radix(digits, 8)
        .map_err(|e| Error::Config(format!("mode {value:?} must be an octal value: {e}")))?;
    if mode > 0o7777 {
        return Err(Error::Config(format!("mode {value:?} is out of range")));
    }
    Ok(mode)
}

//! Settings file and its merge with command line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Values read from the JSON settings file.
///
/// Every field is optional; flags and environment variables take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    /// Maildir holding incoming mail.
    pub maildir: Option<PathBuf>,
    /// Base directory for attachments.
    pub attachments_dir: Option<PathBuf>,
    /// Public URL of the attachments directory.
    pub attachments_dir_url: Option<String>,
    /// Address that receives task mail.
    pub incoming_email: Option<String>,
    /// Address task documents are sent to.
    pub outgoing_email: Option<String>,
    /// Octal permission bits for attachment files.
    pub file_create_mode: Option<String>,
    /// Octal permission bits for attachment directories.
    pub dir_create_mode: Option<String>,
    /// Run OCR on image attachments.
    pub ocr: Option<bool>,
    /// Tesseract executable.
    pub tesseract: Option<PathBuf>,
    /// Tesseract languages, e.g. `eng+deu`.
    pub ocr_languages: Option<String>,
    /// Minimum spell-check score for recognized lines.
    pub ocr_min_line_score: Option<f64>,
    /// Ispell-compatible executable used for line scoring.
    pub ispell: Option<PathBuf>,
    /// Spool outgoing mail here instead of using sendmail.
    pub spool_dir: Option<PathBuf>,
    /// Sendmail executable.
    pub sendmail: Option<PathBuf>,
    /// Mark handled mail read instead of trashing it.
    pub keep: Option<bool>,
}

impl FileSettings {
    /// Default settings location: `<config dir>/mailtask/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mailtask").join("config.json"))
    }

    /// Loads settings.
    ///
    /// An explicitly given file must exist. The default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings = serde_json::from_str(&contents)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }
}

/// Picks the flag value, then the file value, or reports both ways to set it.
pub fn required<T>(flag: Option<T>, file: Option<T>, name: &str, env: &str) -> Result<T> {
    flag.or(file).ok_or_else(|| {
        anyhow!("--{name} is required (or set {env}, or \"{}\" in the settings file)", name.replace('-', "_"))
    })
}

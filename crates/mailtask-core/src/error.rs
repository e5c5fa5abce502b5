//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while turning a message into a task document.
#[derive(Debug, Error)]
pub enum Error {
    /// No extraction strategy is registered for a structured node's content type.
    #[error("Unsupported content kind: {content_type}")]
    UnsupportedContentKind {
        /// The unrecognized content type tag.
        content_type: String,
    },

    /// A registered strategy could not process its input.
    #[error("Extraction failed for {content_type}: {reason}")]
    ExtractionFailed {
        /// Content type of the failing node.
        content_type: String,
        /// Why the strategy failed.
        reason: String,
    },

    /// An attachment could not be persisted.
    #[error("Failed to materialize attachment at {}: {source}", path.display())]
    MaterializationFailed {
        /// Path of the directory or file that could not be written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The recognition service failed for one image.
    #[error("Enrichment failed: {0}")]
    EnrichmentFailed(String),

    /// MIME parsing failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailtask_mime::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Mail source operation failed.
    #[error("Mailbox error: {0}")]
    Mailbox(String),

    /// Handing a message to the outbox failed.
    #[error("Send failed: {0}")]
    Send(String),
}

impl Error {
    /// Returns `true` if the error must abort the whole message.
    ///
    /// Unsupported content kinds and enrichment failures only affect a single
    /// node and never escape the walker.
    #[must_use]
    pub const fn is_message_fatal(&self) -> bool {
        !matches!(
            self,
            Self::UnsupportedContentKind { .. } | Self::EnrichmentFailed(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

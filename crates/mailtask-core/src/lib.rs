//! # mailtask-core
//!
//! Turns email messages into flattened task documents.
//!
//! This crate provides:
//! - Content trees built from parsed MIME messages
//! - Text extraction strategies keyed by content type
//! - Collision-safe attachment materialization with public locations
//! - Optional OCR enrichment of image attachments
//! - Deferred resolution of inline `cid:` references
//! - Maildir source, sendmail/spool outboxes and a batch runner

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod enrich;
mod error;
pub mod extract;
pub mod mailbox;
pub mod materialize;
pub mod node;
pub mod pipeline;
pub mod resolve;
pub mod runner;
pub mod walker;

pub use config::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, PipelineConfig, parse_mode};
pub use enrich::{Enricher, IspellScorer, LineScorer, Recognizer, TesseractRecognizer};
pub use error::{Error, Result};
pub use extract::{ExtractorRegistry, HtmlToText, PlainText, TextExtractor};
pub use mailbox::{IncomingMessage, MailSource, Maildir, Outbox, SendmailOutbox, SpoolOutbox};
pub use materialize::{MaterializedAttachment, Materializer};
pub use node::{BinaryLeaf, ContentNode};
pub use pipeline::{Pipeline, ProcessedDocument};
pub use resolve::resolve;
pub use runner::{FailedMessage, ProcessedMessage, RunSummary, Runner};
pub use walker::{IdentifierMap, WalkOutput, Walker};

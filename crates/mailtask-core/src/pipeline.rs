//! Entry point: walk a message's content tree, then resolve its references.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::enrich::{Enricher, LineScorer, Recognizer};
use crate::error::Result;
use crate::extract::ExtractorRegistry;
use crate::materialize::{MaterializedAttachment, Materializer};
use crate::node::ContentNode;
use crate::resolve::resolve;
use crate::walker::Walker;

/// The outcome of processing one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedDocument {
    /// Final document text with references resolved.
    pub text: String,
    /// Attachments written for the message.
    pub attachments: Vec<MaterializedAttachment>,
    /// Structured nodes skipped for lack of an extraction strategy.
    pub skipped: usize,
}

/// Turns content trees into task documents.
///
/// # Example
///
/// ```no_run
/// use mailtask_core::{ContentNode, Pipeline, PipelineConfig};
///
/// let config = PipelineConfig::new("/srv/attachments", "https://files.example.com/a")?;
/// let pipeline = Pipeline::new(config);
/// let text = pipeline.process("msg-1", &ContentNode::text("Buy milk"))?;
/// assert_eq!(text, "Buy milk");
/// # Ok::<(), mailtask_core::Error>(())
/// ```
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    registry: ExtractorRegistry,
    enricher: Enricher,
}

impl Pipeline {
    /// Creates a pipeline with the default extraction strategies and no
    /// enrichment.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            registry: ExtractorRegistry::with_defaults(),
            enricher: Enricher::disabled(),
        }
    }

    /// Replaces the extraction registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Enables image enrichment through `recognizer`.
    #[must_use]
    pub fn with_recognizer(mut self, recognizer: impl Recognizer + 'static) -> Self {
        self.enricher = self.enricher.with_recognizer(recognizer);
        self
    }

    /// Filters recognized lines through `scorer`.
    ///
    /// May be set before or after the recognizer; without one it does nothing.
    #[must_use]
    pub fn with_line_filter(mut self, scorer: impl LineScorer + 'static, min_score: f64) -> Self {
        self.enricher = self.enricher.with_line_filter(scorer, min_score);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes one message and returns its resolved document text.
    ///
    /// # Errors
    ///
    /// Returns the first message-fatal error; see [`crate::Error::is_message_fatal`].
    pub fn process(&self, message_id: &str, root: &ContentNode) -> Result<String> {
        self.process_detailed(message_id, root).map(|doc| doc.text)
    }

    /// Like [`Pipeline::process`], but also reports what was written.
    ///
    /// # Errors
    ///
    /// Returns the first message-fatal error.
    pub fn process_detailed(&self, message_id: &str, root: &ContentNode) -> Result<ProcessedDocument> {
        let walker = Walker::new(&self.registry, Materializer::new(&self.config), &self.enricher);
        let walked = walker.walk(message_id, root)?;
        debug!(
            message_id,
            identifiers = walked.ids.len(),
            attachments = walked.attachments.len(),
            "Walk complete"
        );

        // References may precede their leaf, so substitution waits for the whole walk.
        let text = resolve(&walked.text, &walked.ids);

        info!(
            message_id,
            attachments = walked.attachments.len(),
            skipped = walked.skipped,
            "Processed message content"
        );

        Ok(ProcessedDocument {
            text,
            attachments: walked.attachments,
            skipped: walked.skipped,
        })
    }
}

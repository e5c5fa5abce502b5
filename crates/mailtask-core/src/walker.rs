//! Pre-order traversal of a content tree into document text.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::enrich::{Enricher, enrichment_block};
use crate::error::{Error, Result};
use crate::extract::ExtractorRegistry;
use crate::materialize::{MaterializedAttachment, Materializer};
use crate::node::{BinaryLeaf, ContentNode};

/// Appended after the text extracted from a structured node.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Content identifier to public location.
pub type IdentifierMap = HashMap<String, String>;

/// Everything a walk produced for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkOutput {
    /// Document text in traversal order, references not yet resolved.
    pub text: String,
    /// Locations of materialized leaves that carried a content identifier.
    pub ids: IdentifierMap,
    /// Every materialized leaf, in traversal order.
    pub attachments: Vec<MaterializedAttachment>,
    /// Structured nodes skipped for lack of an extraction strategy.
    pub skipped: usize,
}

/// Walks content trees, dispatching on node kind.
#[derive(Debug, Clone, Copy)]
pub struct Walker<'a> {
    registry: &'a ExtractorRegistry,
    materializer: Materializer<'a>,
    enricher: &'a Enricher,
}

impl<'a> Walker<'a> {
    /// Creates a walker.
    #[must_use]
    pub const fn new(
        registry: &'a ExtractorRegistry,
        materializer: Materializer<'a>,
        enricher: &'a Enricher,
    ) -> Self {
        Self {
            registry,
            materializer,
            enricher,
        }
    }

    /// Walks `node`, materializing binary leaves under `message_id`.
    ///
    /// # Errors
    ///
    /// Returns the first message-fatal error; unsupported structured nodes
    /// and enrichment failures are logged and skipped.
    pub fn walk(&self, message_id: &str, node: &ContentNode) -> Result<WalkOutput> {
        let mut out = WalkOutput::default();
        self.visit(message_id, node, &mut out)?;
        Ok(out)
    }

    fn visit(&self, message_id: &str, node: &ContentNode, out: &mut WalkOutput) -> Result<()> {
        match node {
            ContentNode::Text(text) => out.text.push_str(text),
            ContentNode::StructuredMarkup { content_type, body } => {
                match self.registry.extract(content_type, body) {
                    Ok(text) => {
                        out.text.push_str(&text);
                        out.text.push_str(PARAGRAPH_SEPARATOR);
                    }
                    Err(Error::UnsupportedContentKind { content_type }) => {
                        warn!(message_id, %content_type, "Skipping content with no extraction strategy");
                        out.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            ContentNode::Composite(children) => {
                for child in children {
                    self.visit(message_id, child, out)?;
                }
            }
            ContentNode::BinaryLeaf(leaf) => self.visit_leaf(message_id, leaf, out)?,
        }
        Ok(())
    }

    fn visit_leaf(&self, message_id: &str, leaf: &BinaryLeaf, out: &mut WalkOutput) -> Result<()> {
        let attachment = self.materializer.materialize(message_id, leaf)?;
        out.text.push_str(&attachment.location);

        if leaf.is_image()
            && let Some(text) = self.enricher.enrich(&attachment.path, &leaf.content_type)
        {
            let filename = attachment
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.text.push_str(&enrichment_block(&filename, &text));
        }

        if let Some(id) = &attachment.content_id
            && let Some(previous) = out.ids.insert(id.clone(), attachment.location.clone())
        {
            debug!(message_id, content_id = %id, %previous, "Content identifier reused, keeping the later leaf");
        }
        out.attachments.push(attachment);
        Ok(())
    }
}

//! Batch processing: fetch, process, send, mark.

use mailtask_mime::{Message, OutgoingMessage};
use serde::Serialize;
use tracing::{error, info};

use crate::error::Result;
use crate::mailbox::{IncomingMessage, MailSource, Outbox};
use crate::node::ContentNode;
use crate::pipeline::Pipeline;

/// A message that made it all the way through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedMessage {
    /// Message identifier.
    pub id: String,
    /// Decoded subject.
    pub subject: String,
    /// Number of attachments written.
    pub attachments: usize,
}

/// A message left unhandled for a later run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedMessage {
    /// Message identifier.
    pub id: String,
    /// Why processing stopped.
    pub error: String,
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Messages processed, sent and marked handled.
    pub processed: Vec<ProcessedMessage>,
    /// Messages that failed and were left in place.
    pub failed: Vec<FailedMessage>,
}

impl RunSummary {
    /// Returns `true` if every pending message was handled.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives messages from a [`MailSource`] through a [`Pipeline`] into an
/// [`Outbox`].
pub struct Runner<S, O> {
    pipeline: Pipeline,
    source: S,
    outbox: O,
    from: String,
    to: String,
}

impl<S, O> std::fmt::Debug for Runner<S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("pipeline", &self.pipeline)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

impl<S: MailSource, O: Outbox> Runner<S, O> {
    /// Creates a runner sending documents from `from` to `to`.
    #[must_use]
    pub fn new(
        pipeline: Pipeline,
        source: S,
        outbox: O,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            source,
            outbox,
            from: from.into(),
            to: to.into(),
        }
    }

    /// Processes every pending message.
    ///
    /// A failing message is logged and left unhandled; the run continues
    /// with the next one.
    ///
    /// # Errors
    ///
    /// Returns an error only if the pending list cannot be fetched.
    pub fn run(&self) -> Result<RunSummary> {
        let pending = self.source.pending()?;
        if pending.is_empty() {
            info!("No messages found that require processing");
            return Ok(RunSummary::default());
        }
        info!(count = pending.len(), "Found messages to process");

        let mut summary = RunSummary::default();
        for message in &pending {
            match self.handle(message) {
                Ok(processed) => {
                    info!(
                        message_id = %processed.id,
                        subject = %processed.subject,
                        attachments = processed.attachments,
                        "Processed message"
                    );
                    summary.processed.push(processed);
                }
                Err(e) => {
                    error!(message_id = %message.id, error = %e, "Failed to process message");
                    summary.failed.push(FailedMessage {
                        id: message.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(summary)
    }

    fn handle(&self, message: &IncomingMessage) -> Result<ProcessedMessage> {
        let parsed = Message::parse(&message.raw)?;
        let subject = parsed.subject().unwrap_or_default();
        let root = ContentNode::from_message(&parsed)?;
        let document = self.pipeline.process_detailed(&message.id, &root)?;

        let outgoing = OutgoingMessage::new(&self.from, &subject, document.text).to(&self.to);
        self.outbox.send(&outgoing)?;
        self.source.mark_handled(message)?;

        Ok(ProcessedMessage {
            id: message.id.clone(),
            subject,
            attachments: document.attachments.len(),
        })
    }
}

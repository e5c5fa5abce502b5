//! Mail collaborators: where messages come from and where documents go.
//!
//! The pipeline itself never touches a mailbox. The [`crate::Runner`]
//! pulls raw messages from a [`MailSource`], hands the resulting document
//! to an [`Outbox`], and only then marks the source message as handled.

pub mod maildir;
pub mod outbox;

use std::path::PathBuf;

use mailtask_mime::OutgoingMessage;

use crate::error::Result;

pub use maildir::Maildir;
pub use outbox::{SendmailOutbox, SpoolOutbox};

/// A raw message waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Stable identifier, also used to name the attachment directory.
    pub id: String,
    /// The full RFC 5322 message.
    pub raw: Vec<u8>,
    /// Where the message currently lives.
    pub location: PathBuf,
}

/// A source of unprocessed messages.
pub trait MailSource {
    /// Lists messages that still need processing, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Mailbox`] if the source cannot be read.
    fn pending(&self) -> Result<Vec<IncomingMessage>>;

    /// Marks a message as processed so it is not returned again.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Mailbox`] if the message cannot be moved.
    fn mark_handled(&self, message: &IncomingMessage) -> Result<()>;
}

/// A sink for outgoing task documents.
pub trait Outbox {
    /// Hands a message over for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Send`] if delivery cannot be started.
    fn send(&self, message: &OutgoingMessage) -> Result<()>;
}

//! Maildir-backed mail source.

use std::path::{Path, PathBuf};

use mailtask_mime::Headers;
use tracing::{debug, warn};

use super::{IncomingMessage, MailSource};
use crate::error::{Error, Result};

/// Name of the trash folder, Maildir++ style.
const TRASH_FOLDER: &str = ".Trash";

/// Reads unread messages addressed to one recipient from a Maildir.
#[derive(Debug)]
pub struct Maildir {
    inner: maildir::Maildir,
    incoming_address: String,
    trash: bool,
}

impl Maildir {
    /// Opens the Maildir at `root`, selecting mail sent to `incoming_address`.
    ///
    /// Handled messages are moved to the trash folder.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, incoming_address: &str) -> Self {
        Self {
            inner: maildir::Maildir::from(root.into()),
            incoming_address: incoming_address.trim().to_lowercase(),
            trash: true,
        }
    }

    /// Keeps handled messages in place, only marking them seen.
    #[must_use]
    pub const fn keep_handled(mut self, keep: bool) -> Self {
        self.trash = !keep;
        self
    }

    /// Returns the Maildir root.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    fn trash_folder(&self) -> maildir::Maildir {
        maildir::Maildir::from(self.inner.path().join(TRASH_FOLDER))
    }

    fn is_addressed_to_us(&self, raw: &[u8]) -> bool {
        let headers = Headers::parse(&String::from_utf8_lossy(raw));
        headers
            .recipients()
            .iter()
            .any(|address| *address == self.incoming_address)
    }
}

impl MailSource for Maildir {
    fn pending(&self) -> Result<Vec<IncomingMessage>> {
        let new_dir = self.inner.path().join("new");
        if !new_dir.is_dir() {
            return Err(Error::Mailbox(format!(
                "{} is not a maildir",
                self.inner.path().display()
            )));
        }

        let mut messages = Vec::new();
        for entry in self.inner.list_new() {
            let entry = entry.map_err(|e| Error::Mailbox(format!("failed to list new mail: {e}")))?;
            let location = entry.path().to_path_buf();
            let raw = std::fs::read(&location).map_err(|e| {
                Error::Mailbox(format!("failed to read {}: {e}", location.display()))
            })?;

            if !self.is_addressed_to_us(&raw) {
                debug!(id = entry.id(), "Skipping message for another recipient");
                continue;
            }

            messages.push(IncomingMessage {
                id: entry.id().to_string(),
                raw,
                location,
            });
        }

        messages.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(messages)
    }

    fn mark_handled(&self, message: &IncomingMessage) -> Result<()> {
        if !self.trash {
            return self
                .inner
                .move_new_to_cur_with_flags(&message.id, "S")
                .map_err(|e| Error::Mailbox(format!("failed to mark {} as read: {e}", message.id)));
        }

        let trash = self.trash_folder();
        trash
            .create_dirs()
            .map_err(|e| Error::Mailbox(format!("failed to create trash folder: {e}")))?;
        let trashed_id = trash
            .store_cur_with_flags(&message.raw, "ST")
            .map_err(|e| Error::Mailbox(format!("failed to trash {}: {e}", message.id)))?;

        if let Err(e) = self.inner.delete(&message.id) {
            warn!(id = %message.id, trashed_id, error = %e, "Trashed copy written but original not removed");
            return Err(Error::Mailbox(format!("failed to remove {}: {e}", message.id)));
        }

        debug!(id = %message.id, trashed_id, "Moved message to trash");
        Ok(())
    }
}

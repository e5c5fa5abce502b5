//! Outgoing delivery through sendmail or a spool directory.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::Utc;
use mailtask_mime::OutgoingMessage;
use tracing::debug;

use super::Outbox;
use crate::error::{Error, Result};

/// Pipes messages to a sendmail-compatible program.
#[derive(Debug, Clone)]
pub struct SendmailOutbox {
    program: PathBuf,
    args: Vec<String>,
}

impl SendmailOutbox {
    /// Uses `sendmail -i -t` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program("sendmail")
    }

    /// Uses a specific sendmail executable with `-i -t`.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec!["-i".to_string(), "-t".to_string()],
        }
    }
}

impl Default for SendmailOutbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Outbox for SendmailOutbox {
    fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Send(format!("failed to run {}: {e}", self.program.display())))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(message.to_rfc5322().as_bytes())
                .map_err(|e| Error::Send(format!("failed to write message: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Send(format!("failed to wait for {}: {e}", self.program.display())))?;
        if !output.status.success() {
            return Err(Error::Send(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!(to = ?message.to, "Handed message to sendmail");
        Ok(())
    }
}

/// Writes each message to its own `.eml` file in a directory.
#[derive(Debug, Clone)]
pub struct SpoolOutbox {
    dir: PathBuf,
}

impl SpoolOutbox {
    /// Spools into `dir`, which is created on first send.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the spool directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Outbox for SpoolOutbox {
    fn send(&self, message: &OutgoingMessage) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Send(format!("failed to create {}: {e}", self.dir.display())))?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        let rendered = message.to_rfc5322();

        let mut n = 0u32;
        loop {
            let path = self.dir.join(format!("{stamp}-{n}.eml"));
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    n += 1;
                    continue;
                }
                Err(e) => {
                    return Err(Error::Send(format!("failed to create {}: {e}", path.display())));
                }
            };

            file.write_all(rendered.as_bytes())
                .map_err(|e| Error::Send(format!("failed to write {}: {e}", path.display())))?;
            debug!(path = %path.display(), "Spooled outgoing message");
            return Ok(());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spooled(dir: &Path) -> Vec<String> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| std::fs::read_to_string(e.unwrap().path()).unwrap())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_spool_writes_each_message() {
        let tmp = TempDir::new().unwrap();
        let outbox = SpoolOutbox::new(tmp.path().join("out"));
        let first = OutgoingMessage::new("in@example.com", "One", "first").to("things@example.com");
        let second = OutgoingMessage::new("in@example.com", "Two", "second").to("things@example.com");

        outbox.send(&first).unwrap();
        outbox.send(&second).unwrap();

        let files = spooled(outbox.dir());
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.contains("Subject: One\r\n") && f.ends_with("first")));
        assert!(files.iter().all(|f| f.contains("To: things@example.com\r\n")));
    }

    #[test]
    fn test_missing_sendmail_is_send_error() {
        let outbox = SendmailOutbox::with_program("/nonexistent/sendmail");
        let message = OutgoingMessage::new("a@example.com", "s", "b").to("c@example.com");
        assert!(matches!(outbox.send(&message), Err(Error::Send(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_sendmail_is_send_error() {
        let outbox = SendmailOutbox::with_program("false");
        let message = OutgoingMessage::new("a@example.com", "s", "b").to("c@example.com");
        let err = outbox.send(&message).unwrap_err();
        assert!(matches!(err, Error::Send(_)));
    }
}

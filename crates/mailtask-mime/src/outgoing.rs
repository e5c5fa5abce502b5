//! Plain-text outgoing messages.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use crate::encoding::encode_rfc2047;

/// A plain-text email message to send.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// Sender address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
    /// Date header value.
    pub date: DateTime<Utc>,
}

impl OutgoingMessage {
    /// Creates a new outgoing message dated now.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: Vec::new(),
            subject: subject.into(),
            body: body.into(),
            date: Utc::now(),
        }
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Overrides the Date header.
    #[must_use]
    pub const fn dated(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Renders the RFC 5322 formatted message with CRLF line endings.
    #[must_use]
    pub fn to_rfc5322(&self) -> String {
        let mut message = String::new();

        let _ = write!(message, "From: {}\r\n", self.from);
        if !self.to.is_empty() {
            let _ = write!(message, "To: {}\r\n", self.to.join(", "));
        }
        let _ = write!(
            message,
            "Subject: {}\r\n",
            encode_rfc2047(&self.subject, "utf-8")
        );
        let _ = write!(message, "Date: {}\r\n", self.date.to_rfc2822());
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        message.push_str("Content-Transfer-Encoding: 8bit\r\n");

        // Empty line between headers and body
        message.push_str("\r\n");

        for line in self.body.split_inclusive('\n') {
            let content = line.strip_suffix('\n').unwrap_or(line);
            let content = content.strip_suffix('\r').unwrap_or(content);
            message.push_str(content);
            if line.ends_with('\n') {
                message.push_str("\r\n");
            }
        }

        message
    }
}

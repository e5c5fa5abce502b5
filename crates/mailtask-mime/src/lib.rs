//! # mailtask-mime
//!
//! MIME message parsing and plain-text message rendering for mailtask.
//!
//! ## Features
//!
//! - **Message parsing**: Parse MIME messages into a tree of parts with
//!   arbitrarily nested multipart support
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 headers, RFC 2231
//!   filenames and common body charsets
//! - **Content types**: Content type and disposition parsing with parameters
//! - **Outgoing messages**: Render plain-text RFC 5322 messages
//!
//! ## Quick Start
//!
//! ```
//! use mailtask_mime::Message;
//!
//! let raw = "From: sender@example.com\r\n\
//!            To: recipient@example.com\r\n\
//!            Subject: Test\r\n\
//!            Content-Type: text/plain\r\n\
//!            \r\n\
//!            Hello, World!";
//!
//! let message = Message::parse(raw.as_bytes()).unwrap();
//! assert_eq!(message.subject().as_deref(), Some("Test"));
//! assert_eq!(message.root.body_text().unwrap(), "Hello, World!");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;
mod outgoing;

pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Disposition, DispositionKind, MAX_DEPTH, Message, Part, TransferEncoding};
pub use outgoing::OutgoingMessage;

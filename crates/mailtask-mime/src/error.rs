//! Error types for MIME parsing and decoding.

use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing or decoding a message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `Content-Type` value without a usable `type/subtype`.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Malformed quoted-printable data.
    #[error("Invalid quoted-printable data: {0}")]
    InvalidEncoding(String),

    /// Malformed base64 data.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// A body declared as UTF-8 or ASCII that is not.
    #[error("Body is not valid for its charset: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// A multipart entity without a `boundary` parameter.
    #[error("Multipart entity has no boundary")]
    MissingBoundary,

    /// A multipart body whose delimiters cannot be found, or that nests too deeply.
    #[error("Invalid multipart structure: {0}")]
    InvalidMultipart(String),
}

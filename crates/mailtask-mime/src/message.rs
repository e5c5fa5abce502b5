//! MIME message structure and parsing.
//!
//! A message is parsed into a tree of [`Part`]s. Multipart entities keep
//! their sub-entities in `children`; every other entity keeps its raw,
//! still transfer-encoded body in `body`.

use crate::content_type::{ContentType, parse_parameters, split_parameters};
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable, decode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;

/// Maximum multipart nesting accepted by [`Message::parse`].
pub const MAX_DEPTH: usize = 32;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

/// Content disposition kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispositionKind {
    /// Displayed as part of the message body.
    Inline,
    /// Offered as a separate file.
    Attachment,
}

/// Parsed `Content-Disposition` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    /// Disposition kind.
    pub kind: DispositionKind,
    /// The `filename` parameter, if present.
    pub filename: Option<String>,
}

impl Disposition {
    /// Parses a `Content-Disposition` value.
    ///
    /// Unknown disposition types are treated as attachments (RFC 2183).
    /// Supports RFC 2231 extended `filename*` parameters.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let mut parts = split_parameters(value).into_iter();
        let kind = match parts.next().map(|k| k.trim().to_lowercase()).as_deref() {
            Some("inline") => DispositionKind::Inline,
            _ => DispositionKind::Attachment,
        };
        let params = parse_parameters(parts);
        let filename = params
            .get("filename*")
            .map(String::as_str)
            .and_then(decode_rfc2231)
            .or_else(|| params.get("filename").cloned())
            .filter(|f| !f.trim().is_empty());

        Self { kind, filename }
    }
}

/// Decodes an RFC 2231 extended value: `charset'language'percent-encoded`.
fn decode_rfc2231(value: &str) -> Option<String> {
    let mut fields = value.splitn(3, '\'');
    let charset = fields.next()?;
    let _language = fields.next()?;
    let encoded = fields.next()?.as_bytes();

    let mut bytes = Vec::with_capacity(encoded.len());
    let mut i = 0;
    while i < encoded.len() {
        if encoded[i] == b'%' && i + 2 < encoded.len() {
            let hex = std::str::from_utf8(&encoded[i + 1..i + 3]).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            bytes.push(encoded[i]);
            i += 1;
        }
    }

    let charset = (!charset.is_empty()).then_some(charset);
    decode_charset(&bytes, charset).ok()
}

/// MIME message part.
#[derive(Debug, Clone, Default)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body (raw, transfer-encoded bytes). Empty for multipart entities.
    pub body: Vec<u8>,
    /// Sub-entities of a multipart entity, in declaration order.
    pub children: Vec<Part>,
}

impl Part {
    /// Creates a new leaf part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            body,
            children: Vec::new(),
        }
    }

    /// Creates a new multipart part.
    #[must_use]
    pub const fn multipart(headers: Headers, children: Vec<Self>) -> Self {
        Self {
            headers,
            body: Vec::new(),
            children,
        }
    }

    /// Gets the content type.
    ///
    /// A missing or unparsable header yields `text/plain; charset=us-ascii`
    /// as RFC 2045 prescribes.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("content-type")
            .and_then(|v| ContentType::parse(v).ok())
            .unwrap_or_else(ContentType::text_plain)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Gets the content disposition, if declared.
    #[must_use]
    pub fn disposition(&self) -> Option<Disposition> {
        self.headers
            .get("content-disposition")
            .map(Disposition::parse)
    }

    /// Checks whether the part is declared as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition()
            .is_some_and(|d| d.kind == DispositionKind::Attachment)
    }

    /// Gets the declared filename.
    ///
    /// Prefers the disposition `filename` parameter and falls back to the
    /// content type `name` parameter. RFC 2047 encoded words are decoded.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let raw = self
            .disposition()
            .and_then(|d| d.filename)
            .or_else(|| self.content_type().name().map(ToString::to_string))?;
        let decoded = decode_rfc2047(&raw).unwrap_or(raw);
        let trimmed = decoded.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Gets the Content-ID without its surrounding angle brackets.
    #[must_use]
    pub fn content_id(&self) -> Option<String> {
        let id = self
            .headers
            .get("content-id")?
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim();
        (!id.is_empty()).then(|| id.to_string())
    }

    /// Checks if this is a multipart entity.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.content_type().is_multipart()
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&String::from_utf8_lossy(&self.body)),
            TransferEncoding::QuotedPrintable => {
                decode_quoted_printable(&String::from_utf8_lossy(&self.body))
            }
            _ => Ok(self.body.clone()),
        }
    }

    /// Gets the decoded body as a string in the part's declared charset.
    ///
    /// # Errors
    ///
    /// Returns an error if transfer decoding or charset conversion fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        decode_charset(&decoded, self.content_type().charset())
    }

    /// Parses a single MIME entity (headers, blank line, body).
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart entity has no usable boundary or
    /// nesting exceeds [`MAX_DEPTH`].
    pub fn parse(raw: &[u8]) -> Result<Self> {
        parse_entity(raw, 0)
    }
}

fn parse_entity(raw: &[u8], depth: usize) -> Result<Part> {
    let (header_bytes, body) = split_header_body(raw);
    let headers = Headers::parse(&String::from_utf8_lossy(header_bytes));
    let part = Part::new(headers, Vec::new());
    let content_type = part.content_type();

    if !content_type.is_multipart() {
        return Ok(Part::new(part.headers, body.to_vec()));
    }

    if depth >= MAX_DEPTH {
        return Err(Error::InvalidMultipart(format!(
            "nesting deeper than {MAX_DEPTH} levels"
        )));
    }

    let boundary = content_type
        .boundary()
        .filter(|b| !b.is_empty())
        .ok_or(Error::MissingBoundary)?;

    let children = split_multipart(body, boundary)?
        .into_iter()
        .map(|segment| parse_entity(segment, depth + 1))
        .collect::<Result<Vec<_>>>()?;

    Ok(Part::multipart(part.headers, children))
}

/// Splits an entity at the first empty line.
fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if raw.starts_with(b"\r\n") {
        return (&[], &raw[2..]);
    }
    if raw.starts_with(b"\n") {
        return (&[], &raw[1..]);
    }

    let crlf = find(raw, b"\r\n\r\n").map(|i| (i, 4));
    let lf = find(raw, b"\n\n").map(|i| (i, 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((i, len)) => (&raw[..i], &raw[i + len..]),
        None => (raw, &[]),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b'\n' | b' ' | b'\t'))
        .map_or(0, |p| p + 1);
    &line[..end]
}

fn strip_trailing_newline(segment: &[u8]) -> &[u8] {
    segment
        .strip_suffix(b"\r\n")
        .or_else(|| segment.strip_suffix(b"\n"))
        .unwrap_or(segment)
}

/// Splits a multipart body into its encapsulated entities.
///
/// The preamble and epilogue are discarded. A missing close delimiter is
/// tolerated and the last entity runs to the end of the body.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let open = format!("--{boundary}");
    let close = format!("--{boundary}--");

    let mut parts = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut found = false;
    let mut offset = 0;

    while offset < body.len() {
        let line_end = body[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |p| offset + p + 1);
        let line = trim_line_end(&body[offset..line_end]);
        let is_close = line == close.as_bytes();

        if is_close || line == open.as_bytes() {
            found = true;
            if let Some(start) = current_start.take() {
                parts.push(strip_trailing_newline(&body[start..offset]));
            }
            if is_close {
                return Ok(parts);
            }
            current_start = Some(line_end);
        }

        offset = line_end;
    }

    if !found {
        return Err(Error::InvalidMultipart(format!(
            "boundary {boundary:?} not found"
        )));
    }

    if let Some(start) = current_start {
        parts.push(strip_trailing_newline(&body[start..]));
    }

    Ok(parts)
}

/// MIME message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Root entity. Its headers are the message headers.
    pub root: Part,
}

impl Message {
    /// Parses a raw RFC 5322 message.
    ///
    /// # Errors
    ///
    /// Returns an error if the multipart structure is invalid.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Ok(Self {
            root: Part::parse(raw)?,
        })
    }

    /// Gets the message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Gets the decoded Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.root.headers.get_decoded("subject")
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.root.headers.get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.root.headers.get("to")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.root.headers.get("date")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.root.headers.get("message-id")
    }

    /// Collects lowercased recipient addresses.
    ///
    /// See [`Headers::recipients`].
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        self.root.headers.recipients()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;

    const MIXED: &str = concat!(
        "From: Alice <alice@example.com>\r\n",
        "To: \"Tasks, Inbox\" <Tasks@Example.com>, bob@example.com\r\n",
        "Subject: =?utf-8?Q?Caf=C3=A9?= order\r\n",
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "This is the preamble.\r\n",
        "--outer\r\n",
        "Content-Type: multipart/alternative; boundary=inner\r\n",
        "\r\n",
        "--inner\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "Content-Transfer-Encoding: quoted-printable\r\n",
        "\r\n",
        "Caf=C3=A9 please\r\n",
        "--inner\r\n",
        "Content-Type: text/html\r\n",
        "\r\n",
        "<p>Caf\u{e9} please</p>\r\n",
        "--inner--\r\n",
        "--outer\r\n",
        "Content-Type: image/png; name=\"dot.png\"\r\n",
        "Content-Disposition: attachment; filename=\"dot.png\"\r\n",
        "Content-ID: <img1@example.com>\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "iVBORw0K\r\n",
        "GgoA\r\n",
        "--outer--\r\n",
        "epilogue\r\n",
    );

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_parse_nested_multipart() {
        let message = Message::parse(MIXED.as_bytes()).unwrap();
        let root = &message.root;
        assert!(root.is_multipart());
        assert!(root.body.is_empty());
        assert_eq!(root.children.len(), 2);

        let alternative = &root.children[0];
        assert_eq!(alternative.children.len(), 2);
        assert_eq!(alternative.children[0].body_text().unwrap(), "Café please");
        assert_eq!(
            alternative.children[1].content_type().essence(),
            "text/html"
        );

        let image = &root.children[1];
        assert!(image.is_attachment());
        assert_eq!(image.filename().as_deref(), Some("dot.png"));
        assert_eq!(image.content_id().as_deref(), Some("img1@example.com"));
        assert_eq!(
            image.decode_body().unwrap(),
            vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00]
        );
    }

    #[test]
    fn test_message_headers() {
        let message = Message::parse(MIXED.as_bytes()).unwrap();
        assert_eq!(message.subject().as_deref(), Some("Café order"));
        assert_eq!(message.from(), Some("Alice <alice@example.com>"));
        assert_eq!(
            message.recipients(),
            vec!["tasks@example.com".to_string(), "bob@example.com".to_string()]
        );
    }

    #[test]
    fn test_parse_single_part_lf() {
        let raw = b"Subject: hi\nContent-Type: text/plain\n\nline one\nline two\n";
        let message = Message::parse(raw).unwrap();
        assert!(message.root.children.is_empty());
        assert_eq!(message.root.body_text().unwrap(), "line one\nline two\n");
    }

    #[test]
    fn test_parse_missing_content_type_defaults_to_text() {
        let message = Message::parse(b"Subject: hi\r\n\r\nbody").unwrap();
        assert!(message.root.content_type().is_plain_text());
    }

    #[test]
    fn test_parse_missing_boundary() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\n--x\r\n\r\nbody\r\n--x--\r\n";
        assert!(matches!(Message::parse(raw), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_parse_boundary_not_found() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\nno delimiters here\r\n";
        assert!(matches!(
            Message::parse(raw),
            Err(Error::InvalidMultipart(_))
        ));
    }

    #[test]
    fn test_parse_unterminated_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n--x\r\n\r\nfirst\r\n--x\r\n\r\nsecond\r\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.root.children.len(), 2);
        assert_eq!(message.root.children[1].body, b"second");
    }

    #[test]
    fn test_disposition_parse() {
        let d = Disposition::parse("inline; filename=\"a;b.png\"");
        assert_eq!(d.kind, DispositionKind::Inline);
        assert_eq!(d.filename.as_deref(), Some("a;b.png"));

        let d = Disposition::parse("attachment; filename*=utf-8''r%C3%A9sum%C3%A9.pdf");
        assert_eq!(d.kind, DispositionKind::Attachment);
        assert_eq!(d.filename.as_deref(), Some("résumé.pdf"));
    }

    #[test]
    fn test_filename_falls_back_to_name() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "application/pdf; name=\"=?utf-8?B?SMOpbGxvLnBkZg==?=\"");
        let part = Part::new(headers, Vec::new());
        assert_eq!(part.filename().as_deref(), Some("Héllo.pdf"));
    }

    proptest::proptest! {
        #[test]
        fn prop_multipart_children_survive(bodies in proptest::collection::vec("[a-zA-Z0-9 .,]{0,40}", 1..6)) {
            let mut raw = String::from("Content-Type: multipart/mixed; boundary=\"b0und\"\r\n\r\n");
            for body in &bodies {
                raw.push_str("--b0und\r\nContent-Type: text/plain\r\n\r\n");
                raw.push_str(body);
                raw.push_str("\r\n");
            }
            raw.push_str("--b0und--\r\n");

            let message = Message::parse(raw.as_bytes()).unwrap();
            let texts: Vec<String> = message
                .root
                .children
                .iter()
                .map(|part| part.body_text().unwrap())
                .collect();
            proptest::prop_assert_eq!(texts, bodies);
        }
    }
}

//! Content nodes: the typed view of a message body that the walker consumes.

use mailtask_mime::{Message, Part};

use crate::error::{Error, Result};

/// One unit of a message's structured body.
///
/// Only [`ContentNode::Composite`] has children, and it never carries
/// payload bytes of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    /// Already-decoded plain text, emitted unchanged.
    Text(String),
    /// Textual payload that needs an extraction strategy (HTML, etc.).
    StructuredMarkup {
        /// Content type tag, `type/subtype` without parameters.
        content_type: String,
        /// UTF-8 payload.
        body: Vec<u8>,
    },
    /// Ordered container of child nodes.
    Composite(Vec<ContentNode>),
    /// Opaque payload to be materialized to storage.
    BinaryLeaf(BinaryLeaf),
}

/// An attachment or inline image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLeaf {
    /// Content type tag, `type/subtype` without parameters.
    pub content_type: String,
    /// Decoded payload.
    pub bytes: Vec<u8>,
    /// Filename declared by the sender.
    pub filename: Option<String>,
    /// Content-ID, without angle brackets.
    pub content_id: Option<String>,
}

impl BinaryLeaf {
    /// Creates a leaf without filename or content identifier.
    #[must_use]
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
            filename: None,
            content_id: None,
        }
    }

    /// Sets the declared filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the content identifier.
    #[must_use]
    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// Checks whether the leaf is an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        is_image_type(&self.content_type)
    }
}

/// `true` for any `image/*` tag, ignoring case.
pub(crate) fn is_image_type(content_type: &str) -> bool {
    content_type
        .get(..6)
        .is_some_and(|main| main.eq_ignore_ascii_case("image/"))
}

impl ContentNode {
    /// Creates a text node.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a structured markup node.
    #[must_use]
    pub fn markup(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::StructuredMarkup {
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Converts a parsed message into its content tree.
    ///
    /// # Errors
    ///
    /// See [`ContentNode::from_part`].
    pub fn from_message(message: &Message) -> Result<Self> {
        Self::from_part(&message.root)
    }

    /// Converts a MIME entity into a content node.
    ///
    /// - `multipart/*` becomes a [`ContentNode::Composite`] of its children
    /// - declared attachments and named parts become binary leaves
    /// - `text/plain` becomes [`ContentNode::Text`]
    /// - other `text/*` becomes [`ContentNode::StructuredMarkup`]
    /// - everything else becomes a binary leaf
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExtractionFailed`] if a text body cannot be decoded
    /// and [`Error::Mime`] if a binary body cannot be transfer-decoded.
    pub fn from_part(part: &Part) -> Result<Self> {
        let content_type = part.content_type();
        if content_type.is_multipart() {
            return part
                .children
                .iter()
                .map(Self::from_part)
                .collect::<Result<Vec<_>>>()
                .map(Self::Composite);
        }

        let mime_type = content_type.essence().to_owned();
        let filename = part.filename();

        if content_type.is_text() && filename.is_none() && !part.is_attachment() {
            let text = part.body_text().map_err(|e| Error::ExtractionFailed {
                content_type: mime_type.clone(),
                reason: e.to_string(),
            })?;
            return Ok(if content_type.is_plain_text() {
                Self::Text(text)
            } else {
                Self::markup(mime_type, text)
            });
        }

        Ok(Self::BinaryLeaf(BinaryLeaf {
            content_type: mime_type,
            bytes: part.decode_body()?,
            filename,
            content_id: part.content_id(),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ContentNode {
        ContentNode::from_message(&Message::parse(raw.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn test_single_plain_text() {
        let node = parse("Content-Type: text/plain; charset=utf-8\r\n\r\nhello");
        assert_eq!(node, ContentNode::text("hello"));
    }

    #[test]
    fn test_multipart_tree() {
        let node = parse(concat!(
            "Content-Type: multipart/related; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/html; charset=iso-8859-1\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "<p>caf=E9</p><img src=3D\"cid:logo\">\r\n",
            "--b\r\n",
            "Content-Type: image/gif\r\n",
            "Content-ID: <logo>\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "R0lGODk=\r\n",
            "--b--\r\n",
        ));

        let ContentNode::Composite(children) = node else {
            panic!("expected composite");
        };
        assert_eq!(
            children[0],
            ContentNode::markup("text/html", "<p>café</p><img src=\"cid:logo\">")
        );
        assert_eq!(
            children[1],
            ContentNode::BinaryLeaf(BinaryLeaf::new("image/gif", b"GIF89".to_vec()).with_content_id("logo"))
        );
    }

    #[test]
    fn test_text_attachment_is_binary() {
        let node = parse(concat!(
            "Content-Type: text/csv\r\n",
            "Content-Disposition: attachment; filename=\"data.csv\"\r\n",
            "\r\n",
            "a,b\r\n",
        ));
        let ContentNode::BinaryLeaf(leaf) = node else {
            panic!("expected leaf");
        };
        assert_eq!(leaf.filename.as_deref(), Some("data.csv"));
        assert_eq!(leaf.bytes, b"a,b\r\n");
        assert!(!leaf.is_image());
    }

    #[test]
    fn test_invalid_text_is_extraction_failure() {
        let message = Message::parse(b"Content-Type: text/plain; charset=utf-8\r\n\r\n\xff\xfe").unwrap();
        let err = ContentNode::from_message(&message).unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }

    #[test]
    fn test_is_image() {
        assert!(BinaryLeaf::new("IMAGE/PNG", Vec::new()).is_image());
        assert!(!BinaryLeaf::new("img", Vec::new()).is_image());
        assert!(is_image_type("image/jpeg; name=x.jpg"));
        assert!(!is_image_type("application/pdf"));
    }
}

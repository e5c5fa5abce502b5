//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 header encoding and the
//! handful of body charsets seen in practice.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decodes Quoted-Printable data (RFC 2045) into raw bytes.
///
/// Soft line breaks (`=` at end of line) are removed. A lone `=` at the end
/// of the input is treated as a soft break.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        match (bytes.get(i + 1), bytes.get(i + 2)) {
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            (None, _) => i += 1,
            (Some(&hi), Some(&lo)) => match (hex_value(hi), hex_value(lo)) {
                (Some(hi), Some(lo)) => {
                    result.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    return Err(Error::InvalidEncoding(format!(
                        "Invalid hex escape at offset {i}"
                    )));
                }
            },
            (Some(_), None) => {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        }
    }

    Ok(result)
}

/// Decodes body bytes in the given charset.
///
/// UTF-8 and US-ASCII are decoded strictly, ISO-8859-1 maps each byte to
/// the code point of the same value, and any other charset is decoded as
/// UTF-8 with replacement characters.
///
/// # Errors
///
/// Returns an error if a UTF-8 or US-ASCII body is not valid UTF-8.
pub fn decode_charset(bytes: &[u8], charset: Option<&str>) -> Result<String> {
    let charset = charset.map(|c| c.trim().trim_matches('"').to_ascii_lowercase());
    match charset.as_deref() {
        None | Some("utf-8" | "utf8" | "us-ascii" | "ascii") => {
            String::from_utf8(bytes.to_vec()).map_err(Into::into)
        }
        Some("iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1") => {
            Ok(bytes.iter().copied().map(char::from).collect())
        }
        Some(_) => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?B?encoded-text?=`. Plain ASCII values are returned as-is.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) && !text.contains("=?") {
        return text.to_string();
    }

    let encoded = encode_base64(text.as_bytes());
    format!("=?{charset}?B?{encoded}?=")
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Whitespace between two adjacent encoded words is dropped. Sequences that
/// look like encoded words but are malformed are kept verbatim.
///
/// # Errors
///
/// Returns an error if an encoded word's payload cannot be decoded.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut last_was_encoded = false;

    while let Some(start) = rest.find("=?") {
        let (before, tail) = rest.split_at(start);
        if let Some((decoded, consumed)) = parse_encoded_word(tail)? {
            if !(last_was_encoded && before.trim().is_empty()) {
                out.push_str(before);
            }
            out.push_str(&decoded);
            rest = &tail[consumed..];
            last_was_encoded = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &tail[2..];
            last_was_encoded = false;
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Parses one encoded word at the start of `tail`, returning the decoded
/// text and the number of bytes consumed.
fn parse_encoded_word(tail: &str) -> Result<Option<(String, usize)>> {
    let inner = &tail[2..];
    let Some(q1) = inner.find('?') else {
        return Ok(None);
    };
    let charset = &inner[..q1];
    let after_charset = &inner[q1 + 1..];
    let Some(q2) = after_charset.find('?') else {
        return Ok(None);
    };
    let encoding = &after_charset[..q2];
    let payload_and_rest = &after_charset[q2 + 1..];
    let Some(end) = payload_and_rest.find("?=") else {
        return Ok(None);
    };
    let payload = &payload_and_rest[..end];

    if charset.is_empty() || payload.contains(char::is_whitespace) {
        return Ok(None);
    }

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_base64(payload)?,
        "Q" => decode_quoted_printable(&payload.replace('_', " "))?,
        _ => return Ok(None),
    };

    // RFC 2231 allows a language suffix: `utf-8*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    let decoded = decode_charset(&bytes, Some(charset))?;
    let consumed = 2 + q1 + 1 + q2 + 1 + end + 2;
    Ok(Some((decoded, consumed)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64("SGVsbG8s\r\nIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable("Hello, World!").unwrap(), b"Hello, World!");
        assert_eq!(
            decode_quoted_printable("H=C3=A9llo").unwrap(),
            "Héllo".as_bytes()
        );
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable("Hello=\r\nWorld").unwrap(), b"HelloWorld");
        assert_eq!(decode_quoted_printable("Hello=\nWorld=").unwrap(), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_binary_bytes() {
        assert_eq!(decode_quoted_printable("=FF=00").unwrap(), vec![0xFF, 0x00]);
    }

    #[test]
    fn test_quoted_printable_invalid() {
        assert!(decode_quoted_printable("bad=ZZ").is_err());
        assert!(decode_quoted_printable("bad=A").is_err());
    }

    #[test]
    fn test_decode_charset() {
        assert_eq!(decode_charset(b"plain", None).unwrap(), "plain");
        assert_eq!(decode_charset(&[0x63, 0x61, 0x66, 0xE9], Some("ISO-8859-1")).unwrap(), "café");
        assert!(decode_charset(&[0xFF], Some("utf-8")).is_err());
        assert_eq!(decode_charset(&[0x61, 0xFF], Some("x-unknown")).unwrap(), "a\u{FFFD}");
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello", "utf-8"), "Hello");

        let encoded = encode_rfc2047("Héllo", "utf-8");
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
        assert_eq!(decode_rfc2047(&encoded).unwrap(), "Héllo");
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_there?=").unwrap(), "Héllo there");
    }

    #[test]
    fn test_rfc2047_adjacent_words() {
        let decoded = decode_rfc2047("Re: =?utf-8?Q?caf=C3=A9?= =?utf-8?Q?_au_lait?= now").unwrap();
        assert_eq!(decoded, "Re: café au lait now");
    }

    #[test]
    fn test_rfc2047_malformed_kept() {
        assert_eq!(decode_rfc2047("=?broken").unwrap(), "=?broken");
        assert_eq!(decode_rfc2047("a =?utf-8?X?abc?= b").unwrap(), "a =?utf-8?X?abc?= b");
    }
}

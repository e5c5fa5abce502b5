//! Header fields of a message or MIME entity.

use crate::encoding::decode_rfc2047;

/// Header fields in the order they appeared.
///
/// Names keep their original spelling; lookups ignore ASCII case.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// An empty field list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field. Repeated names are kept.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value of the named field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named(name).next()
    }

    /// First value with RFC 2047 encoded words decoded.
    ///
    /// Values that fail to decode are returned verbatim.
    #[must_use]
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|v| decode_rfc2047(v).unwrap_or_else(|_| v.to_string()))
    }

    /// Every value of the named field, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.named(name).collect()
    }

    fn named<'a, 'b>(&'a self, name: &'b str) -> impl Iterator<Item = &'a str> + use<'a, 'b> {
        self.fields
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Number of fields, counting repeats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` when there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Lowercased addresses from To, Cc, Delivered-To and X-Original-To.
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        ["to", "cc", "delivered-to", "x-original-to"]
            .into_iter()
            .flat_map(|name| self.named(name))
            .flat_map(split_addresses)
            .collect()
    }

    /// Parses the header block of `text`.
    ///
    /// Reading stops at the first empty line. Continuation lines (leading
    /// space or tab) are unfolded into the previous field with one space.
    /// Lines without a colon that do not continue a field are ignored.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut open = false;

        for line in text.lines().take_while(|line| !line.is_empty()) {
            if line.starts_with([' ', '\t']) {
                if open && let Some((_, value)) = headers.fields.last_mut() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(line.trim());
                }
                continue;
            }

            open = match line.split_once(':') {
                Some((name, value)) => {
                    headers.add(name.trim(), value.trim());
                    true
                }
                None => false,
            };
        }

        headers
    }
}

/// Extracts bare addresses from an address-list header value.
fn split_addresses(value: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;

    for c in value.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                entries.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    entries.push(current);

    entries
        .iter()
        .filter_map(|entry| {
            let entry = entry.trim();
            let address = match (entry.rfind('<'), entry.rfind('>')) {
                (Some(start), Some(end)) if start < end => &entry[start + 1..end],
                _ => entry,
            };
            let address = address.trim().to_lowercase();
            address.contains('@').then_some(address)
        })
        .collect()
}

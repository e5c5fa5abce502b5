//! Substitution of inline content-identifier references.

use crate::walker::IdentifierMap;

/// Prefix of an inline reference token.
pub const REFERENCE_PREFIX: &str = "cid:";

/// Returns the inline reference token for a content identifier.
#[must_use]
pub fn reference_token(content_id: &str) -> String {
    format!("{REFERENCE_PREFIX}{content_id}")
}

/// Replaces every `cid:<id>` token whose id is in `ids` with its location.
///
/// A token runs from the prefix to the next whitespace, bracket or quote,
/// and only a whole id is substituted: with just `img1` mapped, `cid:img10`
/// stays as it is. Trailing sentence punctuation is not part of the id
/// unless the map says so. Tokens with no entry are left untouched.
#[must_use]
pub fn resolve(text: &str, ids: &IdentifierMap) -> String {
    if ids.is_empty() || !text.contains(REFERENCE_PREFIX) {
        return text.to_string();
    }

    let mut resolved = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(REFERENCE_PREFIX) {
        resolved.push_str(&rest[..start]);
        let after = &rest[start + REFERENCE_PREFIX.len()..];
        let run = after.find(ends_token).unwrap_or(after.len());

        match lookup(&after[..run], ids) {
            Some((consumed, location)) => {
                resolved.push_str(location);
                rest = &after[consumed..];
            }
            None => {
                resolved.push_str(REFERENCE_PREFIX);
                rest = after;
            }
        }
    }
    resolved.push_str(rest);
    resolved
}

fn ends_token(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>' | '[' | ']' | '"' | '\'')
}

/// Finds the id a token run names, returning its length and location.
fn lookup<'m>(run: &str, ids: &'m IdentifierMap) -> Option<(usize, &'m str)> {
    let trimmed = run.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    [run, trimmed]
        .into_iter()
        .filter(|id| !id.is_empty())
        .find_map(|id| ids.get(id).map(|location| (id.len(), location.as_str())))
}

//! Object key layout: `<folder>/<ownerId>-<uuid>-<sanitized filename>`.
//!
//! The owner id is embedded in the second path segment so that deletes can
//! be authorized without a database round-trip. Keys are only ever minted
//! here; keys echoed back by clients are re-parsed and re-checked.
//!
//! The owner prefix ends at the first `-` that is followed by a hyphenated
//! UUID and another `-`. Owner ids may themselves contain `-` (UUID user ids
//! included) as long as that boundary stays unambiguous.

use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const MAX_PRINCIPAL_LEN: usize = 64;
const MAX_KEY_FILENAME_LEN: usize = 200;
const HYPHENATED_UUID_LEN: usize = 36;

/// Principal ids are `[A-Za-z0-9_-]{1,64}`, do not start or end with `-`,
/// and must parse back as the owner of a key minted for them.
pub fn is_valid_principal(principal: &str) -> bool {
    !principal.is_empty()
        && principal.len() <= MAX_PRINCIPAL_LEN
        && !principal.starts_with('-')
        && !principal.ends_with('-')
        && principal
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        && owner_end(&format!("{}-{}-x", principal, Uuid::nil())) == Some(principal.len())
}

/// Byte offset of the `-` that closes the owner prefix of an object segment.
fn owner_end(object: &str) -> Option<usize> {
    object.match_indices('-').map(|(i, _)| i).find(|&i| {
        let start = i + 1;
        let end = start + HYPHENATED_UUID_LEN;
        object
            .get(start..end)
            .is_some_and(|candidate| Uuid::try_parse(candidate).is_ok())
            && object.as_bytes().get(end) == Some(&b'-')
            && end + 1 < object.len()
    })
}

/// Mint a fresh key for `owner` under `folder`.
pub fn generate(folder: &str, owner: &str, filename: &str) -> String {
    format!(
        "{}/{}-{}-{}",
        folder.trim_matches('/'),
        owner,
        Uuid::new_v4(),
        sanitize_filename(filename)
    )
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_` and cap the length.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    let mut out: String = trimmed.chars().take(MAX_KEY_FILENAME_LEN).collect();
    if out.is_empty() {
        out.push_str("file");
    }
    out
}

/// Basic key validation to avoid trivial path traversal vectors.
fn ensure_key_safe(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_OBJECT_KEY_LEN
        && !key.starts_with('/')
        && !key.contains("..")
        && !key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
}

/// Extract the embedded owner id from a key.
///
/// Returns `None` when the key is unsafe, does not have exactly two segments,
/// or its second segment is not `<owner>-<uuid>-<name>`.
pub fn owner_of(key: &str) -> Option<&str> {
    if !ensure_key_safe(key) {
        return None;
    }
    let mut segments = key.split('/');
    let folder = segments.next()?;
    let object = segments.next()?;
    if folder.is_empty() || segments.next().is_some() {
        return None;
    }
    let owner = &object[..owner_end(object)?];
    is_valid_principal(owner).then_some(owner)
}

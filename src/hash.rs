//! Content hashing for stable identifiers
//!
//! Every identifier that escapes a single compilation run (`id_hint`,
//! `group_id`) is derived from a truncated SHA-256 of normalized UTF-8
//! bytes, so re-compiling unchanged input reproduces identical ids.

use sha2::{Digest, Sha256};

/// Compute 8-character hex hash of content (first 32 bits of SHA-256).
///
/// # Arguments
/// * `content` - Byte slice to hash
///
/// # Returns
/// 8-character lowercase hex string (e.g., "a1b2c3d4")
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    // First 4 bytes = 8 hex characters
    hex::encode(&result[..4])
}

/// Compute a 10-character stable identifier hint from labeled parts.
///
/// Empty parts are skipped; the remainder is joined with `::` before
/// hashing. An all-empty input hashes the literal "unk" so the hint is
/// never empty itself.
///
/// # Examples
/// ```
/// use catgraph::hash::stable_id_hint;
///
/// let a = stable_id_hint(&["Required 1A", "CS137,SE101"]);
/// let b = stable_id_hint(&["Required 1A", "CS137,SE101"]);
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 10);
/// ```
pub fn stable_id_hint(parts: &[&str]) -> String {
    let base: Vec<&str> = parts.iter().filter(|p| !p.is_empty()).copied().collect();
    let joined = if base.is_empty() {
        "unk".to_string()
    } else {
        base.join("::")
    };
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    let result = hasher.finalize();
    // First 5 bytes = 10 hex characters
    hex::encode(&result[..5])
}

/// Hash a clause of relation text for group-id derivation.
///
/// Whitespace runs are collapsed and the text lowercased first, so
/// cosmetic differences between scrapes of the same sentence do not
/// split a logic group.
pub fn clause_hash(clause: &str) -> String {
    let normalized = clause
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    content_hash(normalized.as_bytes())
}

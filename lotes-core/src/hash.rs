//! Content hashing used as the only change-detection primitive.

use sha2::{Digest, Sha256};

/// Hex SHA-256 of `text`.
///
/// The empty string is reserved for "no content / unknown" and is never
/// produced for a real digest.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash of optional content; absent or empty content hashes to `""`.
pub fn optional_hash(text: Option<&str>) -> String {
    match text {
        Some(t) if !t.is_empty() => content_hash(t),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_deterministic_and_content_sensitive() {
        let a = "ID,Branch\nL1-FSM,FSM\n";
        let b = "ID,Branch\nL1-FSM,FSM \n";
        assert_eq!(content_hash(a), content_hash(a));
        assert_ne!(content_hash(a), content_hash(b));
        assert_eq!(content_hash(a).len(), 64);
    }

    #[test]
    fn test_optional_hash_empty_for_missing_content() {
        assert_eq!(optional_hash(None), "");
        assert_eq!(optional_hash(Some("")), "");
        assert_eq!(optional_hash(Some("x")), content_hash("x"));
    }
}

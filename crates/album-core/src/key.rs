//! Shareable key generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Random bytes per key; 8 bytes encode to 11 URL-safe characters.
pub const KEY_BYTES: usize = 8;

/// Generate a fresh, unguessable, URL-safe key.
///
/// Albums and collections share this token space.
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether `candidate` has the shape of a generated key.
pub fn looks_like_key(candidate: &str) -> bool {
    candidate.len() >= 6
        && candidate.len() <= 64
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_shape() {
        let key = generate_key();
        assert_eq!(key.len(), 11);
        assert!(looks_like_key(&key));
    }

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<String> = (0..1000).map(|_| generate_key()).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn test_looks_like_key() {
        assert!(looks_like_key("aB3-_x9Q"));
        assert!(!looks_like_key("short"));
        assert!(!looks_like_key("has space in it"));
        assert!(!looks_like_key("https://t.me/bot?start=abc"));
    }
}

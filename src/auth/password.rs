use sha2::{Digest, Sha256};

use super::PasswordVerifier;

/// Salted SHA-256 hashes encoded as `sha256:<salt>:<hex digest>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256PasswordVerifier;

impl Sha256PasswordVerifier {
    pub fn encode(&self, raw: &str, salt: &str) -> String {
        format!("sha256:{}:{}", salt, digest(salt, raw))
    }
}

impl PasswordVerifier for Sha256PasswordVerifier {
    fn matches(&self, raw: &str, encoded: &str) -> bool {
        let mut parts = encoded.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("sha256"), Some(salt), Some(expected)) => digest(salt, raw) == expected,
            _ => false,
        }
    }
}

fn digest(salt: &str, raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Chat session tokens are opaque; only this hash is ever persisted.
pub(super) fn hash_token(value: &str) -> Vec<u8> {
    Sha256::digest(value.as_bytes()).to_vec()
}

pub(super) fn new_session_token() -> String {
    format!(
        "cs_{}_{}",
        Uuid::new_v4().as_simple(),
        Uuid::new_v4().as_simple()
    )
}

use sha2::{Digest, Sha256};

// Anonymous session id for a client that sent none: anon_ + sha256(client) prefix
pub fn anonymous_session(client: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(client.as_bytes()));
    format!("anon_{}", &digest[..16])
}

use sha2::{Digest, Sha256};

/// Hash a client IP address before storage.
///
/// Formula: sha256(ip)[0..8] encoded as 16 hex chars. The raw address is
/// never written to the `visits` table.
pub fn hash_ip(ip: &str) -> String {
    let hash = Sha256::digest(ip.as_bytes());
    hex::encode(&hash[..8])
}

/// First eight characters of a session id, for log lines.
pub fn short_session(session_id: &str) -> &str {
    match session_id.char_indices().nth(8) {
        Some((idx, _)) => &session_id[..idx],
        None => session_id,
    }
}

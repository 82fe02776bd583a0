//! Token-based session management
//!
//! A session binds a bearer token to a subject and its claim strings, so
//! authorization after the one session lookup is a pure function of the
//! token's embedded claims. Tokens are stored only as SHA-256 hashes.

use sha2::{Digest, Sha256};

use crate::claims::Identity;
use crate::db::{read, write};
use crate::error::{Error, Result};

/// Generate a cryptographically secure token (32 bytes, base64url encoded)
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|e| Error::Storage(e.to_string()))?;
    Ok(base64url_encode(&bytes))
}

/// Hash token with SHA-256 for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Base64url encode without padding
fn base64url_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
    let mut result = String::with_capacity((data.len() * 4 + 2) / 3);
    for chunk in data.chunks(3) {
        let n = match chunk.len() {
            3 => ((chunk[0] as u32) << 16) | ((chunk[1] as u32) << 8) | (chunk[2] as u32),
            2 => ((chunk[0] as u32) << 16) | ((chunk[1] as u32) << 8),
            1 => (chunk[0] as u32) << 16,
            _ => unreachable!(),
        };
        result.push(ALPHABET[((n >> 18) & 0x3F) as usize] as char);
        result.push(ALPHABET[((n >> 12) & 0x3F) as usize] as char);
        if chunk.len() > 1 {
            result.push(ALPHABET[((n >> 6) & 0x3F) as usize] as char);
        }
        if chunk.len() > 2 {
            result.push(ALPHABET[(n & 0x3F) as usize] as char);
        }
    }
    result
}

/// Hex encode
mod hex {
    pub fn encode(data: impl AsRef<[u8]>) -> String {
        data.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Stored as `subject|created_at|expires_at|claim;claim;...` (expires 0 =
/// never). Subjects and claim paths never contain `|`.
fn encode_record(subject: &str, created: u64, expires: u64, claims: &[String]) -> String {
    format!("{subject}|{created}|{expires}|{}", claims.join(";"))
}

fn decode_record(value: &str) -> Option<(String, u64, u64, Vec<String>)> {
    let mut parts = value.splitn(4, '|');
    let subject = parts.next()?.to_string();
    let created = parts.next()?.parse().ok()?;
    let expires = parts.next()?.parse().ok()?;
    let claims = match parts.next()? {
        "" => Vec::new(),
        raw => raw.split(';').map(|s| s.to_string()).collect(),
    };
    Some((subject, created, expires, claims))
}

/// Create a session carrying the claim set; returns the bearer token
pub fn create_session(subject: &str, claims: &[String], ttl_secs: Option<u64>) -> Result<String> {
    let token = generate_token()?;
    let hash = hash_token(&token);
    let now = now_millis();
    let expires = ttl_secs.map(|t| now + t * 1000).unwrap_or(0);
    write(|d, tx| {
        d.sessions
            .put(tx, &hash, &encode_record(subject, now, expires, claims))?;
        Ok(())
    })?;
    tracing::info!(subject = %subject, "session created");
    Ok(token)
}

/// Validate a token and build the identity from its embedded claims.
/// Unknown and expired tokens both fail the same way.
pub fn validate_session(token: &str) -> Result<Identity> {
    let hash = hash_token(token);
    let record = read(|d, tx| Ok(d.sessions.get(tx, &hash)?.map(|s| s.to_string())))?;
    let (subject, _, expires, claims) = record
        .as_deref()
        .and_then(decode_record)
        .ok_or_else(|| Error::not_found("session", &hash[..8]))?;
    if expires != 0 && expires < now_millis() {
        write(|d, tx| Ok(d.sessions.delete(tx, &hash)?))?;
        return Err(Error::not_found("session", &hash[..8]));
    }
    Ok(Identity::new(subject, &claims))
}

/// Revoke one session by its token
pub fn revoke_session(token: &str) -> Result<bool> {
    let hash = hash_token(token);
    write(|d, tx| Ok(d.sessions.delete(tx, &hash)?))
}

/// Revoke every session of a subject. Returns the number revoked.
pub fn revoke_sessions_for(subject: &str) -> Result<usize> {
    write(|d, tx| {
        let mut hashes = Vec::new();
        for item in d.sessions.iter(tx)? {
            let (hash, value) = item?;
            if decode_record(value).is_some_and(|(s, ..)| s == subject) {
                hashes.push(hash.to_string());
            }
        }
        for hash in &hashes {
            d.sessions.delete(tx, hash)?;
        }
        Ok(hashes.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trip() {
        let claims = vec!["Project=V,A".to_string(), "Project/X=M".to_string()];
        let encoded = encode_record("user:alice", 10, 0, &claims);
        let (subject, created, expires, decoded) = decode_record(&encoded).unwrap();
        assert_eq!(subject, "user:alice");
        assert_eq!(created, 10);
        assert_eq!(expires, 0);
        assert_eq!(decoded, claims);
    }

    #[test]
    fn empty_claim_set_round_trips() {
        let encoded = encode_record("user:bob", 1, 2, &[]);
        let (_, _, _, decoded) = decode_record(&encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn tokens_are_url_safe_and_distinct() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(a.len(), 43);
    }
}

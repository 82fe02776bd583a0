//! Claim-string parsing and the identity context
//!
//! Claims arrive as opaque strings of the form `"<Path>=<Cap>[,<Cap>...]"`,
//! e.g. `"Project/INTERNAL=V,A,M"`. Parsing is lenient: a malformed claim is
//! skipped so one bad claim never fails an unrelated request.

use crate::caps::letters_to_caps;

/// One parsed permission grant: a resource path and a capability mask.
/// Constructed fresh per request from the identity's claim set, never
/// persisted, immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    pub path: String,
    pub mask: u64,
}

/// Authenticated actor for a single request: the subject plus its parsed
/// access entries. Passed explicitly into every pipeline call; there is no
/// ambient principal.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: String,
    pub entries: Vec<AccessEntry>,
}

impl Identity {
    /// Parse the raw claim set once; entry order follows claim order and is
    /// the tie-break when two entries name the same path.
    pub fn new(subject: impl Into<String>, claims: &[String]) -> Self {
        Identity {
            subject: subject.into(),
            entries: parse_claims(claims),
        }
    }

    /// An identity with no grants; the resolver denies it everything.
    pub fn anonymous(subject: impl Into<String>) -> Self {
        Identity { subject: subject.into(), entries: Vec::new() }
    }
}

/// Parse claim strings into access entries, skipping malformed ones
pub fn parse_claims(claims: &[String]) -> Vec<AccessEntry> {
    claims.iter().filter_map(|c| parse_claim(c)).collect()
}

fn parse_claim(claim: &str) -> Option<AccessEntry> {
    let (path, letters) = claim.split_once('=')?;
    let path = path.trim().trim_end_matches('/');
    if path.is_empty() {
        return None;
    }
    Some(AccessEntry {
        path: path.to_string(),
        mask: letters_to_caps(letters.split(',')),
    })
}

//! Hierarchical permission resolution over claim-embedded access entries
//!
//! Paths are `/`-delimited and matched case-insensitively, most specific
//! prefix first. The first entry whose path equals a prefix is authoritative
//! for the whole check: a grant on `Project/X` with fewer capabilities than
//! its parent narrows access under that subtree, because resolution stops at
//! the deepest matching path instead of merging ancestors.

use crate::caps::cap_letter;
use crate::claims::Identity;
use crate::error::{Error, Result};

/// Check whether the identity holds `required` on `resource_path`.
/// Pure function of (claims, path, capability); never touches storage.
pub fn has_capability(identity: &Identity, resource_path: &str, required: u64) -> bool {
    let segments: Vec<&str> = resource_path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    for len in (1..=segments.len()).rev() {
        let prefix = segments[..len].join("/");
        // Claim order is the tie-break when two entries name the same path.
        if let Some(entry) = identity
            .entries
            .iter()
            .find(|e| e.path.eq_ignore_ascii_case(&prefix))
        {
            return entry.mask & required == required;
        }
    }
    false
}

/// Gate helper: deny with a Forbidden error carrying the resource path and
/// required capability letter. Never includes the requester's grant list.
pub fn require(identity: &Identity, resource_path: &str, required: u64) -> Result<()> {
    if has_capability(identity, resource_path, required) {
        Ok(())
    } else {
        tracing::warn!(
            subject = %identity.subject,
            path = %resource_path,
            required = %cap_letter(required),
            "capability denied"
        );
        Err(Error::Forbidden {
            path: resource_path.to_string(),
            required: cap_letter(required),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::{APPROVE, EDIT, VIEW};

    fn identity(claims: &[&str]) -> Identity {
        let claims: Vec<String> = claims.iter().map(|s| s.to_string()).collect();
        Identity::new("user:alice", &claims)
    }

    #[test]
    fn direct_grant_resolves() {
        let id = identity(&["Project/INTERNAL=V,A"]);
        assert!(has_capability(&id, "Project/INTERNAL", APPROVE));
        assert!(!has_capability(&id, "Project/INTERNAL", EDIT));
    }

    #[test]
    fn child_paths_inherit_ancestor_grants() {
        let id = identity(&["Project/INTERNAL=A"]);
        assert!(has_capability(&id, "Project/INTERNAL/Task/17", APPROVE));
    }

    #[test]
    fn root_grant_covers_all_children() {
        let id = identity(&["Project=A"]);
        assert!(has_capability(&id, "Project/CLIENT-A", APPROVE));
    }

    #[test]
    fn most_specific_match_narrows() {
        // Parent grants Approve, child entry does not: resolution stops at
        // the child and denies, it never merges the ancestor's mask.
        let id = identity(&["Project=A", "Project/SANDBOX=V"]);
        assert!(!has_capability(&id, "Project/SANDBOX", APPROVE));
        assert!(has_capability(&id, "Project/SANDBOX", VIEW));
        assert!(has_capability(&id, "Project/OTHER", APPROVE));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let id = identity(&["project/internal=v"]);
        assert!(has_capability(&id, "Project/INTERNAL", VIEW));
    }

    #[test]
    fn no_partial_segment_matching() {
        let id = identity(&["Project/INT=V"]);
        assert!(!has_capability(&id, "Project/INTERNAL", VIEW));
    }

    #[test]
    fn empty_claim_set_denies_everything() {
        let id = Identity::anonymous("user:nobody");
        assert!(!has_capability(&id, "Project/INTERNAL", VIEW));
    }

    #[test]
    fn require_reports_path_and_letter() {
        let id = identity(&["Project/INTERNAL=V"]);
        let err = require(&id, "Project/INTERNAL", APPROVE).unwrap_err();
        match err {
            Error::Forbidden { path, required } => {
                assert_eq!(path, "Project/INTERNAL");
                assert_eq!(required, 'A');
            }
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }
}

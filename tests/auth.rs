//! Session and bootstrap tests
//!
//! Token lifecycle: bootstrap issues the root session, sessions embed claim
//! sets, expiry and revocation invalidate tokens.

use std::sync::OnceLock;

use tempfile::TempDir;
use timecap::auth::{create_session, revoke_session, revoke_sessions_for, validate_session};
use timecap::{bootstrap, caps, clear_all, has_capability, init, is_bootstrapped, test_lock};

static TEST_DIR: OnceLock<TempDir> = OnceLock::new();

fn setup() {
    let dir = TEST_DIR.get_or_init(|| TempDir::new().unwrap());
    init(dir.path().to_str().unwrap()).unwrap();
}

fn setup_clean() -> std::sync::MutexGuard<'static, ()> {
    let lock = test_lock();
    setup();
    clear_all().unwrap();
    lock
}

/// Bootstrap is one-shot and issues a token whose identity holds every
/// capability across the project tree
#[test]
fn bootstrap_issues_full_access_root_session() {
    let _lock = setup_clean();
    assert!(!is_bootstrapped().unwrap());

    let result = bootstrap("user:root").unwrap();
    assert!(is_bootstrapped().unwrap());
    assert_eq!(result.root_subject, "user:root");

    let identity = validate_session(&result.token).unwrap();
    assert_eq!(identity.subject, "user:root");
    for cap in [caps::VIEW, caps::EDIT, caps::APPROVE, caps::MANAGE, caps::TRACK] {
        assert!(has_capability(&identity, "Project/ANY", cap));
    }

    let err = bootstrap("user:other").unwrap_err();
    assert_eq!(err.code(), "CONFLICT");
}

/// Sessions carry exactly the claims they were minted with
#[test]
fn session_embeds_claim_set() {
    let _lock = setup_clean();
    let claims = vec!["Project/INTERNAL=V,T".to_string()];
    let token = create_session("user:alice", &claims, None).unwrap();

    let identity = validate_session(&token).unwrap();
    assert_eq!(identity.subject, "user:alice");
    assert!(has_capability(&identity, "Project/INTERNAL", caps::TRACK));
    assert!(!has_capability(&identity, "Project/INTERNAL", caps::APPROVE));
    assert!(!has_capability(&identity, "Project/OTHER", caps::VIEW));
}

/// Unknown tokens are rejected without revealing anything
#[test]
fn unknown_token_rejected() {
    let _lock = setup_clean();
    let err = validate_session("not-a-real-token").unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

/// An expired session stops validating
#[test]
fn expired_session_rejected() {
    let _lock = setup_clean();
    let token = create_session("user:alice", &[], Some(0)).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(10));
    assert_eq!(validate_session(&token).unwrap_err().code(), "NOT_FOUND");
}

/// Revocation invalidates a single token; bulk revocation clears a subject
#[test]
fn revocation_invalidates_tokens() {
    let _lock = setup_clean();
    let a = create_session("user:alice", &[], None).unwrap();
    let b = create_session("user:alice", &[], None).unwrap();
    let c = create_session("user:bob", &[], None).unwrap();

    assert!(revoke_session(&a).unwrap());
    assert!(validate_session(&a).is_err());
    assert!(validate_session(&b).is_ok());
    assert!(!revoke_session(&a).unwrap());

    assert_eq!(revoke_sessions_for("user:alice").unwrap(), 1);
    assert!(validate_session(&b).is_err());
    assert!(validate_session(&c).is_ok());
}

//! Bootstrap and system initialization

use crate::auth::create_session;
use crate::db::{read, write};
use crate::error::{Error, Result};

/// Claim set issued to the root session: every capability on the whole
/// project tree.
pub const ROOT_CLAIMS: &[&str] = &["Project=V,E,A,M,T"];

/// Result from bootstrap
#[derive(Debug, Clone)]
pub struct BootstrapResult {
    pub root_subject: String,
    pub token: String,
}

/// Check whether the system was bootstrapped
pub fn is_bootstrapped() -> Result<bool> {
    read(|d, tx| Ok(d.meta.get(tx, "boot")?.is_some()))
}

/// Get the root subject recorded at bootstrap time
pub fn get_root() -> Result<Option<String>> {
    read(|d, tx| Ok(d.meta.get(tx, "root")?.map(|s| s.to_string())))
}

/// One-shot bootstrap: records the root subject and issues its full-access
/// session. Further sessions are minted by Manage holders.
pub fn bootstrap(root_subject: &str) -> Result<BootstrapResult> {
    if is_bootstrapped()? {
        return Err(Error::Conflict {
            current: "bootstrapped".into(),
            expected: "fresh database".into(),
        });
    }
    write(|d, tx| {
        d.meta.put(tx, "boot", "1")?;
        d.meta.put(tx, "root", root_subject)?;
        Ok(())
    })?;
    let claims: Vec<String> = ROOT_CLAIMS.iter().map(|s| s.to_string()).collect();
    let token = create_session(root_subject, &claims, None)?;
    tracing::info!(root = %root_subject, "system bootstrapped");
    Ok(BootstrapResult { root_subject: root_subject.to_string(), token })
}

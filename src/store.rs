//! Entity persistence over the raw databases
//!
//! Every helper takes the transaction it runs in, so the pipeline can compose
//! fetch, check, and write into one atomic commit. Secondary indexes are
//! maintained here and nowhere else.

use heed::{RoTxn, RwTxn};

use crate::db::{owner_key, project_key, Dbs};
use crate::error::{Error, Result};
use crate::model::{Project, TimeEntry};

// Meta counters
pub(crate) const NEXT_ENTRY_ID: &str = "next_entry_id";
pub(crate) const NEXT_TASK_ID: &str = "next_task_id";
pub(crate) const NEXT_TAG_ID: &str = "next_tag_id";

/// Allocate the next id from a meta counter
pub(crate) fn next_id(d: &Dbs, tx: &mut RwTxn, counter: &str) -> Result<u64> {
    let id = d
        .meta
        .get(tx, counter)?
        .and_then(|s| s.parse().ok())
        .unwrap_or(1u64);
    d.meta.put(tx, counter, &(id + 1).to_string())?;
    Ok(id)
}

// Projects

pub(crate) fn get_project(d: &Dbs, tx: &RoTxn, code: &str) -> Result<Option<Project>> {
    Ok(d.projects.get(tx, code)?)
}

/// Fetch a project or fail with NotFound
pub(crate) fn require_project(d: &Dbs, tx: &RoTxn, code: &str) -> Result<Project> {
    get_project(d, tx, code)?.ok_or_else(|| Error::not_found("project", code))
}

pub(crate) fn put_project(d: &Dbs, tx: &mut RwTxn, project: &Project) -> Result<()> {
    Ok(d.projects.put(tx, &project.code, project)?)
}

pub(crate) fn delete_project(d: &Dbs, tx: &mut RwTxn, code: &str) -> Result<bool> {
    Ok(d.projects.delete(tx, code)?)
}

pub(crate) fn list_projects(d: &Dbs, tx: &RoTxn) -> Result<Vec<Project>> {
    let mut r = Vec::new();
    for item in d.projects.iter(tx)? {
        let (_, p) = item?;
        r.push(p);
    }
    Ok(r)
}

// Entries

pub(crate) fn get_entry(d: &Dbs, tx: &RoTxn, id: u64) -> Result<Option<TimeEntry>> {
    Ok(d.entries.get(tx, &id)?)
}

/// Fetch an entry or fail with NotFound
pub(crate) fn require_entry(d: &Dbs, tx: &RoTxn, id: u64) -> Result<TimeEntry> {
    get_entry(d, tx, id)?.ok_or_else(|| Error::not_found("entry", id.to_string()))
}

/// Write an entry and keep both indexes in sync. `prev_project` is the code
/// the entry was stored under before a move, if any.
pub(crate) fn put_entry(
    d: &Dbs,
    tx: &mut RwTxn,
    entry: &TimeEntry,
    prev_project: Option<&str>,
) -> Result<()> {
    d.entries.put(tx, &entry.id, entry)?;
    d.entries_by_owner
        .put(tx, &owner_key(&entry.owner_id, entry.id), &entry.id)?;
    if let Some(prev) = prev_project {
        if prev != entry.project_code {
            d.entries_by_project.delete(tx, &project_key(prev, entry.id))?;
        }
    }
    d.entries_by_project
        .put(tx, &project_key(&entry.project_code, entry.id), &entry.id)?;
    Ok(())
}

pub(crate) fn delete_entry(d: &Dbs, tx: &mut RwTxn, entry: &TimeEntry) -> Result<bool> {
    let r = d.entries.delete(tx, &entry.id)?;
    d.entries_by_owner
        .delete(tx, &owner_key(&entry.owner_id, entry.id))?;
    d.entries_by_project
        .delete(tx, &project_key(&entry.project_code, entry.id))?;
    Ok(r)
}

fn collect_index(d: &Dbs, tx: &RoTxn, index: &crate::db::IndexDb, prefix: &str) -> Result<Vec<TimeEntry>> {
    let mut r = Vec::new();
    for item in index.prefix_iter(tx, prefix)? {
        let (_, id) = item?;
        if let Some(entry) = get_entry(d, tx, id)? {
            r.push(entry);
        }
    }
    Ok(r)
}

pub(crate) fn list_entries_for_owner(d: &Dbs, tx: &RoTxn, owner: &str) -> Result<Vec<TimeEntry>> {
    collect_index(d, tx, &d.entries_by_owner, &format!("{owner}/"))
}

pub(crate) fn list_entries_for_project(d: &Dbs, tx: &RoTxn, code: &str) -> Result<Vec<TimeEntry>> {
    collect_index(d, tx, &d.entries_by_project, &format!("{code}/"))
}

/// Whether any entry still references the project code
pub(crate) fn project_has_entries(d: &Dbs, tx: &RoTxn, code: &str) -> Result<bool> {
    Ok(d.entries_by_project
        .prefix_iter(tx, &format!("{code}/"))?
        .next()
        .transpose()?
        .is_some())
}

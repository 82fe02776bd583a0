//! Database types and global state
//!
//! LMDB via heed: one process-global environment, named sub-databases,
//! big-endian u64 keys for entries and composite string keys for the
//! secondary indexes. A single write transaction per mutation is what
//! serializes concurrent writers and keeps failed pipelines invisible.

use std::path::Path;
use std::sync::{Mutex, OnceLock};

use heed::types::{SerdeJson, Str, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use crate::error::{Error, Result};
use crate::model::{Project, TimeEntry};

pub type ProjectDb = Database<Str, SerdeJson<Project>>;
pub type EntryDb = Database<U64<byteorder::BigEndian>, SerdeJson<TimeEntry>>;
pub type IndexDb = Database<Str, U64<byteorder::BigEndian>>;
pub type StrDb = Database<Str, Str>;

/// All database handles
pub struct Dbs {
    pub projects: ProjectDb,
    pub entries: EntryDb,
    /// `{owner}/{id:016x}` -> id
    pub entries_by_owner: IndexDb,
    /// `{code}/{id:016x}` -> id
    pub entries_by_project: IndexDb,
    /// token hash -> session record
    pub sessions: StrDb,
    /// counters and bootstrap markers
    pub meta: StrDb,
}

// Global state
static ENV: OnceLock<Env> = OnceLock::new();
static DBS: OnceLock<Dbs> = OnceLock::new();
static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Composite key for the owner index
#[inline]
pub fn owner_key(owner: &str, id: u64) -> String {
    format!("{owner}/{id:016x}")
}

/// Composite key for the project index
#[inline]
pub fn project_key(code: &str, id: u64) -> String {
    format!("{code}/{id:016x}")
}

/// Get the database handles, or error if not initialized
#[inline]
pub fn dbs() -> Result<&'static Dbs> {
    DBS.get().ok_or_else(|| Error::Storage("not initialized".into()))
}

/// Get the environment, or error if not initialized
#[inline]
pub fn env() -> Result<&'static Env> {
    ENV.get().ok_or_else(|| Error::Storage("not initialized".into()))
}

/// Run a closure inside a read transaction
pub fn read<T, F: FnOnce(&Dbs, &RoTxn) -> Result<T>>(f: F) -> Result<T> {
    f(dbs()?, &env()?.read_txn()?)
}

/// Run a closure inside a write transaction; commits only on Ok
pub fn write<T, F: FnOnce(&Dbs, &mut RwTxn) -> Result<T>>(f: F) -> Result<T> {
    let mut txn = env()?.write_txn()?;
    let r = f(dbs()?, &mut txn)?;
    txn.commit()?;
    Ok(r)
}

/// Initialize the LMDB environment. Idempotent: returns Ok if already open.
pub fn init(db_path: &str) -> Result<()> {
    if ENV.get().is_some() {
        return Ok(());
    }
    let path = Path::new(db_path);
    std::fs::create_dir_all(path).map_err(|e| Error::Storage(e.to_string()))?;
    let env = unsafe {
        EnvOpenOptions::new()
            .map_size(1 << 30)
            .max_dbs(6)
            .open(path)?
    };
    let mut txn = env.write_txn()?;
    let dbs = Dbs {
        projects: env.create_database(&mut txn, Some("projects"))?,
        entries: env.create_database(&mut txn, Some("entries"))?,
        entries_by_owner: env.create_database(&mut txn, Some("entries_by_owner"))?,
        entries_by_project: env.create_database(&mut txn, Some("entries_by_project"))?,
        sessions: env.create_database(&mut txn, Some("sessions"))?,
        meta: env.create_database(&mut txn, Some("meta"))?,
    };
    txn.commit()?;
    let _ = (ENV.set(env), DBS.set(dbs));
    Ok(())
}

/// Wipe every database. Test support.
pub fn clear_all() -> Result<()> {
    write(|d, tx| {
        d.projects.clear(tx)?;
        d.entries.clear(tx)?;
        d.entries_by_owner.clear(tx)?;
        d.entries_by_project.clear(tx)?;
        d.sessions.clear(tx)?;
        d.meta.clear(tx)?;
        Ok(())
    })
}

/// Serialize tests sharing the global environment
pub fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(|p| p.into_inner())
}

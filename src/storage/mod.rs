//! Session document store
//!
//! Persists [`Session`] documents as JSON values in an embedded `sled`
//! key-value database, one document per session id. Every mutation is a
//! compare-and-swap of the whole document, so concurrent proposals and
//! finalizations on the same session never overwrite each other, while
//! different sessions are mutated independently.

use crate::error::{Result, StudySyncError};
use crate::slot::Slot;
use chrono::Utc;
use directories::ProjectDirs;
use sled::{Db, IVec, Tree};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use ulid::Generator;

pub mod types;
pub use types::{NewSession, Proposal, Resource, Session, SessionId};

const SESSIONS_TREE: &str = "sessions";

/// Environment variable overriding the database location
pub const DB_PATH_ENV: &str = "STUDYSYNC_DB";

/// Resolve the database path: `STUDYSYNC_DB` if set, otherwise the
/// platform data directory.
pub fn default_database_path() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(DB_PATH_ENV) {
        return Ok(PathBuf::from(override_path));
    }

    let proj_dirs = ProjectDirs::from("org", "studysync", "studysync").ok_or_else(|| {
        StudySyncError::StorageUnavailable("Could not determine data directory".into())
    })?;

    Ok(proj_dirs.data_dir().join("studysync.db"))
}

/// Open (or create) the embedded database at `path`
///
/// The returned handle is cheap to clone and is shared by every store in
/// the process; sled only allows one open handle per path.
pub fn open_database(path: impl AsRef<Path>) -> Result<Db> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StudySyncError::StorageUnavailable(format!(
                    "Failed to create parent directory for database: {}",
                    e
                ))
            })?;
        }
    }

    let db = sled::open(path)
        .map_err(|e| StudySyncError::StorageUnavailable(format!("Failed to open database: {}", e)))?;
    Ok(db)
}

/// Store for session documents
///
/// # Examples
///
/// ```
/// use studysync::storage::{NewSession, SessionStore};
/// use chrono::NaiveDate;
///
/// # fn main() -> studysync::error::Result<()> {
/// let dir = tempfile::tempdir()?;
/// let store = SessionStore::new(dir.path().join("db"))?;
/// let id = store.create_session(NewSession {
///     host_email: "host@x.com".to_string(),
///     title: "Calculus review".to_string(),
///     description: String::new(),
///     participants: vec!["a@x.com".to_string()],
///     propose_deadline: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
/// })?;
/// assert_eq!(store.get_session_by_id(&id)?.title, "Calculus review");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionStore {
    db: Db,
    sessions: Tree,
    ids: Arc<Mutex<Generator>>,
}

impl SessionStore {
    /// Open a store backed by a database at `path`
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = open_database(path)?;
        Self::from_db(&db)
    }

    /// Open a store on an already opened database
    pub fn from_db(db: &Db) -> Result<Self> {
        let sessions = db.open_tree(SESSIONS_TREE).map_err(|e| {
            StudySyncError::StorageUnavailable(format!("Failed to open sessions tree: {}", e))
        })?;
        Ok(Self {
            db: db.clone(),
            sessions,
            ids: Arc::new(Mutex::new(Generator::new())),
        })
    }

    /// The underlying database handle
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Insert a new, open session and return its id
    ///
    /// The new document has no final slot, no proposals, no resources and
    /// version 0. No uniqueness constraint applies to the title.
    pub fn create_session(&self, data: NewSession) -> Result<SessionId> {
        let session = Session {
            id: self.next_id()?,
            host_email: data.host_email,
            title: data.title,
            description: data.description,
            participants: data.participants,
            propose_deadline: data.propose_deadline,
            created_at: Utc::now(),
            proposed_slots: Vec::new(),
            final_slot: None,
            finalized_at: None,
            resources: Vec::new(),
            version: 0,
        };

        let value = encode(&session)?;
        let swapped = self
            .sessions
            .compare_and_swap(session.id.as_bytes(), None as Option<&[u8]>, Some(value))
            .map_err(|e| StudySyncError::StorageUnavailable(format!("Insert failed: {}", e)))?;
        if swapped.is_err() {
            return Err(StudySyncError::StorageUnavailable(format!(
                "Session id collision: {}",
                session.id
            ))
            .into());
        }
        self.flush()?;

        crate::metrics::record_session_created();
        tracing::info!(session_id = %session.id, host = %session.host_email, "Session created");
        Ok(session.id)
    }

    /// Fetch one session
    ///
    /// # Errors
    ///
    /// Returns `StudySyncError::SessionNotFound` for an unknown id and
    /// `StudySyncError::StorageUnavailable` when the store cannot be read.
    pub fn get_session_by_id(&self, id: &str) -> Result<Session> {
        match self.load_raw(id)? {
            Some(bytes) => decode(&bytes),
            None => Err(StudySyncError::SessionNotFound(id.to_string()).into()),
        }
    }

    /// All sessions `email` was invited to, oldest first
    pub fn get_sessions_for_user(&self, email: &str) -> Result<Vec<Session>> {
        self.filter_sessions(|s| s.is_participant(email))
    }

    /// All sessions hosted by `email`, oldest first
    pub fn get_sessions_hosted_by(&self, email: &str) -> Result<Vec<Session>> {
        self.filter_sessions(|s| s.is_host(email))
    }

    /// Every stored session, oldest first
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        self.filter_sessions(|_| true)
    }

    /// Commit a confirmed slot, overwriting any previous one
    ///
    /// Sets `final_slot` and `finalized_at = now` unconditionally. Whether
    /// the slot was ever proposed is not checked here.
    pub fn finalize_slot(&self, id: &str, confirmed_slot: Slot) -> Result<Session> {
        self.update(id, |session| {
            session.final_slot = Some(confirmed_slot);
            session.finalized_at = Some(Utc::now());
            Ok(())
        })
    }

    /// Atomically mutate one session document
    ///
    /// Loads the current document, applies `mutate`, bumps `version` and
    /// writes it back with compare-and-swap. When another writer committed
    /// in between, the document is reloaded and `mutate` runs again on the
    /// fresh copy. An error from `mutate` aborts without writing.
    pub fn update<F>(&self, id: &str, mut mutate: F) -> Result<Session>
    where
        F: FnMut(&mut Session) -> Result<()>,
    {
        loop {
            let current = self
                .load_raw(id)?
                .ok_or_else(|| StudySyncError::SessionNotFound(id.to_string()))?;

            let mut session: Session = decode(&current)?;
            mutate(&mut session)?;
            session.version += 1;

            let value = encode(&session)?;
            let swapped = self
                .sessions
                .compare_and_swap(id.as_bytes(), Some(&current), Some(value))
                .map_err(|e| StudySyncError::StorageUnavailable(format!("Update failed: {}", e)))?;

            match swapped {
                Ok(()) => {
                    self.flush()?;
                    return Ok(session);
                }
                Err(_) => {
                    tracing::debug!(session_id = %id, "Concurrent update detected, retrying");
                }
            }
        }
    }

    // Monotonic within the process so key order matches creation order
    fn next_id(&self) -> Result<SessionId> {
        let mut ids = self
            .ids
            .lock()
            .map_err(|_| StudySyncError::StorageUnavailable("id generator poisoned".into()))?;
        let id = ids
            .generate()
            .map_err(|e| StudySyncError::StorageUnavailable(format!("id generation failed: {}", e)))?;
        Ok(id.to_string())
    }

    fn load_raw(&self, id: &str) -> Result<Option<IVec>> {
        let value = self
            .sessions
            .get(id.as_bytes())
            .map_err(|e| StudySyncError::StorageUnavailable(format!("Get failed: {}", e)))?;
        Ok(value)
    }

    fn filter_sessions<P>(&self, predicate: P) -> Result<Vec<Session>>
    where
        P: Fn(&Session) -> bool,
    {
        let mut sessions = Vec::new();
        for item in self.sessions.iter() {
            let (_, bytes) = item
                .map_err(|e| StudySyncError::StorageUnavailable(format!("Iteration failed: {}", e)))?;
            let session = decode(&bytes)?;
            if predicate(&session) {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    fn flush(&self) -> Result<()> {
        self.sessions
            .flush()
            .map_err(|e| StudySyncError::StorageUnavailable(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

fn encode(session: &Session) -> Result<Vec<u8>> {
    let value = serde_json::to_vec(session)
        .map_err(|e| StudySyncError::StorageUnavailable(format!("Serialization failed: {}", e)))?;
    Ok(value)
}

fn decode(bytes: &[u8]) -> Result<Session> {
    let session = serde_json::from_slice(bytes)
        .map_err(|e| StudySyncError::StorageUnavailable(format!("Deserialization failed: {}", e)))?;
    Ok(session)
}

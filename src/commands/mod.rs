/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `user`: account registration and login
- `session`: session creation, listing and display
- `schedule`: slot proposals, tally and finalization
- `resource`: shared files and links
- `feedback`: ratings and analytics

Handlers are small: they build the library services from [`Config`],
call one operation and render the result as a table or JSON.
*/

use crate::auth::CredentialStore;
use crate::config::Config;
use crate::error::Result;
use crate::feedback::FeedbackStore;
use crate::finalize::FinalizationEngine;
use crate::ledger::SlotLedger;
use crate::notify::{build_notifier, NotificationDispatcher};
use crate::resources::{LocalObjectStorage, ResourceService};
use crate::storage::{open_database, SessionStore};
use serde::Serialize;

pub mod feedback;
pub mod resource;
pub mod schedule;
pub mod session;
pub mod user;

/// Services shared by every command
///
/// Opens the database once; sled allows a single handle per path.
#[derive(Clone)]
pub struct AppContext {
    /// Effective configuration
    pub config: Config,
    /// Session documents
    pub sessions: SessionStore,
}

impl AppContext {
    /// Open the database named by `config`
    pub fn open(config: Config) -> Result<Self> {
        let path = config.database_path()?;
        tracing::debug!(path = %path.display(), "Opening session database");
        let db = open_database(&path)?;
        let sessions = SessionStore::from_db(&db)?;
        Ok(Self { config, sessions })
    }

    /// Credential store on the same database
    pub fn credentials(&self) -> Result<CredentialStore> {
        CredentialStore::from_db(self.sessions.db())
    }

    /// Proposal ledger with the configured policy
    pub fn ledger(&self) -> SlotLedger {
        SlotLedger::new(self.sessions.clone(), self.config.scheduling.clone())
    }

    /// Finalization engine with the configured notifier
    pub fn finalization(&self) -> Result<FinalizationEngine> {
        let notifier = build_notifier(&self.config.notifications)?;
        Ok(FinalizationEngine::new(
            self.sessions.clone(),
            NotificationDispatcher::new(notifier),
            self.config.scheduling.clone(),
        ))
    }

    /// Resource sharing backed by the local upload directory
    pub fn resources(&self) -> Result<ResourceService<LocalObjectStorage>> {
        let upload_dir = self.config.upload_dir()?;
        Ok(ResourceService::new(
            self.sessions.clone(),
            LocalObjectStorage::new(upload_dir),
            self.config.resources.allowed_extensions.clone(),
        ))
    }

    /// Feedback store on the same database
    pub fn feedback(&self) -> Result<FeedbackStore> {
        FeedbackStore::new(self.sessions.clone())
    }
}

/// Print `value` as pretty JSON on STDOUT
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

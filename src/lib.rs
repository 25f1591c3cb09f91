//! StudySync - study session scheduler library
//!
//! This library provides the core functionality for StudySync: hosts create
//! study sessions, participants propose candidate time slots, the host
//! confirms the most popular slot and every participant is notified.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `storage`: Session document store (embedded `sled` database)
//! - `slot`: Canonical candidate time values
//! - `ledger`: Append-only slot proposals
//! - `finalize`: Tally, majority detection and host finalization
//! - `notify`: Confirmation message delivery
//! - `auth`, `resources`, `feedback`: Accounts, shared files, ratings
//! - `config`, `logging`, `metrics`: Ambient configuration and telemetry
//! - `error`: Error types and result aliases
//! - `cli`, `commands`: Command-line interface and handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use studysync::finalize::{FinalizationEngine, FinalizeChoice};
//! use studysync::notify::{LogNotifier, NotificationDispatcher};
//! use studysync::{Config, SessionStore, SlotLedger};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let store = SessionStore::new("studysync.db")?;
//!     let ledger = SlotLedger::new(store.clone(), config.scheduling.clone());
//!     let engine = FinalizationEngine::new(
//!         store.clone(),
//!         NotificationDispatcher::new(Arc::new(LogNotifier)),
//!         config.scheduling.clone(),
//!     );
//!
//!     let session_id = "01HZX3YV6C0000000000000000";
//!     ledger.propose_slots(session_id, "a@x.com", vec!["2025-05-01T18:00".parse()?])?;
//!     let outcome = engine
//!         .finalize(session_id, "host@x.com", FinalizeChoice::AutoCandidate)
//!         .await?;
//!     println!("{:?}", outcome.session.final_slot);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod feedback;
pub mod finalize;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod resources;
pub mod slot;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, StudySyncError};
pub use finalize::{FinalizationEngine, FinalizeChoice, Tally};
pub use ledger::SlotLedger;
pub use notify::{NotificationDispatcher, Notifier};
pub use slot::Slot;
pub use storage::{Session, SessionStore};

#[cfg(test)]
pub mod test_utils;

//! Test utilities for StudySync
//!
//! This module provides common test utilities: temporary stores, session
//! fixtures and a notifier that records what it was asked to send.

use crate::error::Result;
use crate::notify::Notifier;
use crate::slot::Slot;
use crate::storage::{NewSession, SessionStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Mutex;
use tempfile::TempDir;

/// Create a session store in a fresh temporary directory
///
/// Keep the returned `TempDir` alive for as long as the store is used.
pub fn temp_store() -> (SessionStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let store = SessionStore::new(dir.path().join("studysync.db")).expect("Failed to open store");
    (store, dir)
}

/// Creation input hosted by `host@x.com` with the given participants
pub fn new_session(participants: &[&str]) -> NewSession {
    NewSession {
        host_email: "host@x.com".to_string(),
        title: "Study Group".to_string(),
        description: String::new(),
        participants: participants.iter().map(|p| p.to_string()).collect(),
        propose_deadline: NaiveDate::from_ymd_opt(2030, 1, 1).expect("valid date"),
    }
}

/// Parse a slot literal
///
/// # Panics
///
/// Panics if the literal is malformed
pub fn slot(raw: &str) -> Slot {
    raw.parse().expect("valid slot literal")
}

/// One recorded send call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Notifier that records messages and optionally fails for some recipients
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    failing: Vec<String>,
}

impl RecordingNotifier {
    /// Notifier failing for every address in `failing`
    pub fn failing_for(failing: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: failing.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Messages attempted so far, in order
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    /// Recipients attempted so far, in order
    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.to).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        self.sent.lock().expect("lock poisoned").push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        if self.failing.iter().any(|f| f == to) {
            anyhow::bail!("simulated failure for {}", to);
        }
        Ok(())
    }
}

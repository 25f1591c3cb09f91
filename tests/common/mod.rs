use async_trait::async_trait;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use studysync::notify::Notifier;
use studysync::storage::{NewSession, SessionStore};
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_temp_store() -> (SessionStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("studysync.db");
    let store = SessionStore::new(db_path).expect("failed to open session store");
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

#[allow(dead_code)]
pub fn session_input(host: &str, participants: &[&str]) -> NewSession {
    NewSession {
        host_email: host.to_string(),
        title: "Data Structures".to_string(),
        description: "Trees and heaps".to_string(),
        participants: participants.iter().map(|p| p.to_string()).collect(),
        propose_deadline: NaiveDate::from_ymd_opt(2030, 12, 31).expect("valid date"),
    }
}

/// Notifier recording every recipient, failing for the configured ones
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingNotifier {
    pub recipients: Mutex<Vec<String>>,
    pub failing: Vec<String>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &str, _subject: &str, _html: &str) -> studysync::Result<()> {
        self.recipients
            .lock()
            .expect("lock poisoned")
            .push(to.to_string());
        if self.failing.iter().any(|f| f == to) {
            anyhow::bail!("simulated outage for {}", to);
        }
        Ok(())
    }
}

//! Post-session feedback and analytics
//!
//! Feedback entries live in the `feedback` tree of the shared database,
//! keyed by a monotonic database id so iteration follows submission order.

use crate::error::{Result, StudySyncError};
use crate::metrics;
use crate::storage::{SessionId, SessionStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Tree;
use std::collections::HashMap;

const FEEDBACK_TREE: &str = "feedback";

/// Session length assumed when none is given
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// One rating of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Rated session
    pub session_id: SessionId,
    /// Session title at submission time
    pub title: String,
    /// Session host
    pub host_email: String,
    /// Who rated
    pub submitted_by: String,
    /// Session length in minutes
    pub duration_minutes: u32,
    /// 1 to 5
    pub rating: u8,
    /// Free text
    #[serde(default)]
    pub comment: String,
    /// Submission time
    pub timestamp: DateTime<Utc>,
}

/// Feedback input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedback {
    /// Session being rated
    pub session_id: SessionId,
    /// Member submitting the rating
    pub submitted_by: String,
    /// 1 to 5
    pub rating: u8,
    /// Free text
    pub comment: String,
    /// Session length in minutes; 60 when absent
    pub duration_minutes: Option<u32>,
}

/// Average rating of one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRating {
    /// Rated session
    pub session_id: SessionId,
    /// Title recorded with the first entry
    pub title: String,
    /// Mean of all ratings for the session
    pub average_rating: f64,
    /// Number of entries
    pub responses: usize,
}

/// How often a title was rated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    /// Session title
    pub title: String,
    /// Entries rating a session with this title
    pub count: usize,
}

/// Aggregate view over all feedback
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FeedbackReport {
    /// Per session, in order of first feedback
    pub session_ratings: Vec<SessionRating>,
    /// Most rated titles first; ties by first appearance
    pub topic_counts: Vec<TopicCount>,
    /// Mean duration in minutes
    pub average_duration: Option<f64>,
    /// Most frequent rating; the smallest wins ties
    pub most_common_rating: Option<u8>,
    /// Number of entries
    pub total_responses: usize,
}

impl FeedbackReport {
    /// True when no feedback has been submitted
    pub fn is_empty(&self) -> bool {
        self.total_responses == 0
    }
}

/// Stores feedback and computes the report
#[derive(Clone)]
pub struct FeedbackStore {
    sessions: SessionStore,
    db: sled::Db,
    entries: Tree,
}

impl FeedbackStore {
    /// Open the feedback tree on the database behind `sessions`
    pub fn new(sessions: SessionStore) -> Result<Self> {
        let entries = sessions.db().open_tree(FEEDBACK_TREE).map_err(|e| {
            StudySyncError::StorageUnavailable(format!("Failed to open feedback tree: {}", e))
        })?;
        let db = sessions.db().clone();
        Ok(Self {
            sessions,
            db,
            entries,
        })
    }

    /// Record feedback for a session
    ///
    /// # Errors
    ///
    /// - `InvalidFeedback` for a rating outside 1..=5 or a zero duration.
    /// - `SessionNotFound` for an unknown session.
    /// - `Forbidden` when the submitter is not a member of the session.
    pub fn submit(&self, input: NewFeedback) -> Result<FeedbackEntry> {
        if !(1..=5).contains(&input.rating) {
            return Err(StudySyncError::InvalidFeedback(format!(
                "rating must be between 1 and 5, got {}",
                input.rating
            ))
            .into());
        }
        let duration_minutes = input.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        if duration_minutes == 0 {
            return Err(
                StudySyncError::InvalidFeedback("duration must be positive".to_string()).into(),
            );
        }

        let session = self.sessions.get_session_by_id(&input.session_id)?;
        if !session.is_member(&input.submitted_by) {
            return Err(StudySyncError::Forbidden(format!(
                "{} is not a member of session {}",
                input.submitted_by, session.id
            ))
            .into());
        }

        let entry = FeedbackEntry {
            session_id: session.id,
            title: session.title,
            host_email: session.host_email,
            submitted_by: input.submitted_by,
            duration_minutes,
            rating: input.rating,
            comment: input.comment,
            timestamp: Utc::now(),
        };

        let value = serde_json::to_vec(&entry)?;
        let key = self
            .db
            .generate_id()
            .map_err(|e| StudySyncError::StorageUnavailable(format!("Id generation failed: {}", e)))?;
        self.entries
            .insert(key.to_be_bytes(), value)
            .map_err(|e| StudySyncError::StorageUnavailable(format!("Insert failed: {}", e)))?;
        self.entries
            .flush()
            .map_err(|e| StudySyncError::StorageUnavailable(format!("Flush failed: {}", e)))?;

        metrics::record_feedback_submitted();
        tracing::info!(session_id = %entry.session_id, rating = entry.rating, "Feedback submitted");
        Ok(entry)
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Result<Vec<FeedbackEntry>> {
        let mut entries = Vec::new();
        for item in self.entries.iter() {
            let (_, bytes) = item.map_err(|e| {
                StudySyncError::StorageUnavailable(format!("Iteration failed: {}", e))
            })?;
            entries.push(serde_json::from_slice(&bytes)?);
        }
        Ok(entries)
    }

    /// Aggregate all feedback
    pub fn report(&self) -> Result<FeedbackReport> {
        Ok(build_report(&self.entries()?))
    }
}

/// Compute the analytics over `entries`
pub fn build_report(entries: &[FeedbackEntry]) -> FeedbackReport {
    if entries.is_empty() {
        return FeedbackReport::default();
    }

    let mut session_ratings: Vec<SessionRating> = Vec::new();
    let mut session_index: HashMap<&str, usize> = HashMap::new();
    let mut topic_counts: Vec<TopicCount> = Vec::new();
    let mut topic_index: HashMap<&str, usize> = HashMap::new();
    let mut rating_counts = [0usize; 6];
    let mut duration_sum = 0u64;

    for entry in entries {
        let i = *session_index
            .entry(entry.session_id.as_str())
            .or_insert_with(|| {
                session_ratings.push(SessionRating {
                    session_id: entry.session_id.clone(),
                    title: entry.title.clone(),
                    average_rating: 0.0,
                    responses: 0,
                });
                session_ratings.len() - 1
            });
        let rating = &mut session_ratings[i];
        rating.average_rating += f64::from(entry.rating);
        rating.responses += 1;

        let t = *topic_index.entry(entry.title.as_str()).or_insert_with(|| {
            topic_counts.push(TopicCount {
                title: entry.title.clone(),
                count: 0,
            });
            topic_counts.len() - 1
        });
        topic_counts[t].count += 1;

        if let Some(slot) = rating_counts.get_mut(usize::from(entry.rating)) {
            *slot += 1;
        }
        duration_sum += u64::from(entry.duration_minutes);
    }

    for rating in &mut session_ratings {
        rating.average_rating /= rating.responses as f64;
    }
    // Stable sort keeps first-appearance order among equal counts
    topic_counts.sort_by(|a, b| b.count.cmp(&a.count));

    let most_common_rating = (1..=5u8)
        .filter(|r| rating_counts[usize::from(*r)] > 0)
        .fold(None::<u8>, |best, r| match best {
            Some(b) if rating_counts[usize::from(b)] >= rating_counts[usize::from(r)] => Some(b),
            _ => Some(r),
        });

    FeedbackReport {
        session_ratings,
        topic_counts,
        average_duration: Some(duration_sum as f64 / entries.len() as f64),
        most_common_rating,
        total_responses: entries.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_kind;
    use crate::storage::NewSession;
    use chrono::NaiveDate;

    fn entry(session: &str, title: &str, rating: u8, duration: u32) -> FeedbackEntry {
        FeedbackEntry {
            session_id: session.to_string(),
            title: title.to_string(),
            host_email: "host@x.com".to_string(),
            submitted_by: "a@x.com".to_string(),
            duration_minutes: duration,
            rating,
            comment: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_empty_report() {
        let report = build_report(&[]);
        assert!(report.is_empty());
        assert!(report.average_duration.is_none());
        assert!(report.most_common_rating.is_none());
    }

    #[test]
    fn test_report_aggregates() {
        let report = build_report(&[
            entry("s1", "Calculus", 4, 60),
            entry("s2", "Biology", 5, 90),
            entry("s1", "Calculus", 2, 60),
            entry("s3", "Biology", 4, 30),
            entry("s4", "History", 5, 60),
        ]);

        assert_eq!(report.total_responses, 5);
        assert_eq!(report.session_ratings.len(), 4);
        assert_eq!(report.session_ratings[0].session_id, "s1");
        assert!((report.session_ratings[0].average_rating - 3.0).abs() < f64::EPSILON);
        assert_eq!(report.session_ratings[0].responses, 2);

        assert_eq!(
            report.topic_counts,
            vec![
                TopicCount { title: "Calculus".to_string(), count: 2 },
                TopicCount { title: "Biology".to_string(), count: 2 },
                TopicCount { title: "History".to_string(), count: 1 },
            ]
        );
        assert_eq!(report.average_duration, Some(60.0));
        // 4 and 5 both appear twice; the smaller wins
        assert_eq!(report.most_common_rating, Some(4));
    }

    fn store_with_session() -> (FeedbackStore, String, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionStore::new(dir.path().join("db")).unwrap();
        let id = sessions
            .create_session(NewSession {
                host_email: "host@x.com".to_string(),
                title: "Calculus".to_string(),
                description: String::new(),
                participants: vec!["a@x.com".to_string()],
                propose_deadline: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            })
            .unwrap();
        (FeedbackStore::new(sessions).unwrap(), id, dir)
    }

    fn input(id: &str, who: &str, rating: u8) -> NewFeedback {
        NewFeedback {
            session_id: id.to_string(),
            submitted_by: who.to_string(),
            rating,
            comment: "helpful".to_string(),
            duration_minutes: None,
        }
    }

    #[test]
    fn test_submit_fills_session_details() {
        let (store, id, _dir) = store_with_session();
        let entry = store.submit(input(&id, "a@x.com", 5)).unwrap();
        assert_eq!(entry.title, "Calculus");
        assert_eq!(entry.host_email, "host@x.com");
        assert_eq!(entry.duration_minutes, DEFAULT_DURATION_MINUTES);

        let report = store.report().unwrap();
        assert_eq!(report.total_responses, 1);
        assert_eq!(report.most_common_rating, Some(5));
    }

    #[test]
    fn test_submit_rejects_bad_rating() {
        let (store, id, _dir) = store_with_session();
        for rating in [0, 6] {
            let err = store.submit(input(&id, "a@x.com", rating)).unwrap_err();
            assert!(matches!(
                error_kind(&err),
                Some(StudySyncError::InvalidFeedback(_))
            ));
        }
        assert!(store.entries().unwrap().is_empty());
    }

    #[test]
    fn test_submit_requires_membership() {
        let (store, id, _dir) = store_with_session();
        let err = store.submit(input(&id, "eve@x.com", 3)).unwrap_err();
        assert!(matches!(error_kind(&err), Some(StudySyncError::Forbidden(_))));

        let err = store.submit(input("missing", "a@x.com", 3)).unwrap_err();
        assert!(matches!(
            error_kind(&err),
            Some(StudySyncError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_entries_in_submission_order() {
        let (store, id, _dir) = store_with_session();
        store.submit(input(&id, "a@x.com", 1)).unwrap();
        store.submit(input(&id, "host@x.com", 2)).unwrap();
        let ratings: Vec<u8> = store.entries().unwrap().iter().map(|e| e.rating).collect();
        assert_eq!(ratings, vec![1, 2]);
    }
}

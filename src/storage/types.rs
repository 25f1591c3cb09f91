use crate::slot::Slot;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a stored session (ULID string)
pub type SessionId = String;

/// A proposed study meeting with a host, participants and a slot-selection process
///
/// This is the persisted document shape; one document per session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier assigned at creation
    pub id: SessionId,
    /// Identity of the creating/owning user
    pub host_email: String,
    /// Session topic
    pub title: String,
    /// Free-text details
    #[serde(default)]
    pub description: String,
    /// Invited user identities, in invitation order
    pub participants: Vec<String>,
    /// Date after which proposals are late
    pub propose_deadline: NaiveDate,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Append-only proposal ledger
    #[serde(default)]
    pub proposed_slots: Vec<Proposal>,
    /// Confirmed meeting time, absent until finalized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_slot: Option<Slot>,
    /// Set together with `final_slot`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
    /// Shared files and links
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Committed mutation count, used for compare-and-swap
    #[serde(default)]
    pub version: u64,
}

impl Session {
    /// Whether `email` was invited to this session
    pub fn is_participant(&self, email: &str) -> bool {
        self.participants.iter().any(|p| p == email)
    }

    /// Whether `email` owns this session
    pub fn is_host(&self, email: &str) -> bool {
        self.host_email == email
    }

    /// Participants plus the host
    pub fn is_member(&self, email: &str) -> bool {
        self.is_host(email) || self.is_participant(email)
    }

    /// Whether a final slot has been committed
    pub fn is_finalized(&self) -> bool {
        self.final_slot.is_some()
    }

    /// Flattened slot sequence across all proposals, in submission order
    pub fn flattened_slots(&self) -> impl Iterator<Item = &Slot> {
        self.proposed_slots.iter().flat_map(|p| p.slots.iter())
    }
}

/// One participant's batch submission of 1 to 5 candidate slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposer identity
    pub user: String,
    /// Candidate slots, in the order submitted
    pub slots: Vec<Slot>,
    /// When the batch was recorded
    pub submitted_at: DateTime<Utc>,
}

/// A shared file or link attached to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Who shared it
    pub uploader: String,
    /// When it was shared
    pub timestamp: DateTime<Utc>,
    /// Public URL of an uploaded file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Original name of an uploaded file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Shared link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Resource {
    /// True when the record describes an uploaded file
    pub fn is_file(&self) -> bool {
        self.file_url.is_some() && self.filename.is_some()
    }
}

/// Input for session creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    /// Creating user
    pub host_email: String,
    /// Session topic
    pub title: String,
    /// Free-text details
    pub description: String,
    /// Invited users
    pub participants: Vec<String>,
    /// Proposal deadline
    pub propose_deadline: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> Session {
        Session {
            id: "01J0000000000000000000000A".to_string(),
            host_email: "host@x.com".to_string(),
            title: "Linear Algebra".to_string(),
            description: String::new(),
            participants: vec!["a@x.com".to_string(), "b@x.com".to_string()],
            propose_deadline: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            created_at: Utc::now(),
            proposed_slots: vec![],
            final_slot: None,
            finalized_at: None,
            resources: vec![],
            version: 0,
        }
    }

    #[test]
    fn test_membership_helpers() {
        let session = sample_session();
        assert!(session.is_participant("a@x.com"));
        assert!(!session.is_participant("host@x.com"));
        assert!(session.is_host("host@x.com"));
        assert!(session.is_member("host@x.com"));
        assert!(session.is_member("b@x.com"));
        assert!(!session.is_member("c@x.com"));
    }

    #[test]
    fn test_flattened_slots_preserve_submission_order() {
        let mut session = sample_session();
        let t1: Slot = "2025-05-01T10:00".parse().unwrap();
        let t2: Slot = "2025-05-02T10:00".parse().unwrap();
        session.proposed_slots.push(Proposal {
            user: "a@x.com".to_string(),
            slots: vec![t2, t1],
            submitted_at: Utc::now(),
        });
        session.proposed_slots.push(Proposal {
            user: "b@x.com".to_string(),
            slots: vec![t1],
            submitted_at: Utc::now(),
        });

        let flat: Vec<Slot> = session.flattened_slots().copied().collect();
        assert_eq!(flat, vec![t2, t1, t1]);
    }

    #[test]
    fn test_unfinalized_session_omits_final_fields() {
        let session = sample_session();
        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("final_slot").is_none());
        assert!(json.get("finalized_at").is_none());
        assert_eq!(json["propose_deadline"], "2025-05-01");
    }

    #[test]
    fn test_document_without_version_defaults_to_zero() {
        let json = serde_json::json!({
            "id": "s1",
            "host_email": "host@x.com",
            "title": "T",
            "participants": ["a@x.com"],
            "propose_deadline": "2025-05-01",
            "created_at": "2025-04-01T00:00:00Z"
        });
        let session: Session = serde_json::from_value(json).unwrap();
        assert_eq!(session.version, 0);
        assert!(session.proposed_slots.is_empty());
        assert!(session.resources.is_empty());
    }

    #[test]
    fn test_resource_kind() {
        let file = Resource {
            uploader: "a@x.com".to_string(),
            timestamp: Utc::now(),
            file_url: Some("file:///tmp/notes.pdf".to_string()),
            filename: Some("notes.pdf".to_string()),
            link: None,
        };
        assert!(file.is_file());

        let link = Resource {
            file_url: None,
            filename: None,
            link: Some("https://example.com".to_string()),
            ..file
        };
        assert!(!link.is_file());
    }
}

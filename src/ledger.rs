//! Slot proposal ledger
//!
//! Records each participant's batch of candidate slots against a session.
//! Submissions are append-only: a second batch from the same user is kept
//! next to the first one, never merged or replaced.

use crate::config::{DeadlinePolicy, SchedulingConfig};
use crate::error::{Result, StudySyncError};
use crate::metrics;
use crate::slot::Slot;
use crate::storage::{Proposal, SessionStore};
use chrono::{DateTime, Utc};

/// Smallest accepted batch
pub const MIN_SLOTS_PER_PROPOSAL: usize = 1;
/// Largest accepted batch
pub const MAX_SLOTS_PER_PROPOSAL: usize = 5;

/// Appends and reads slot proposals
#[derive(Clone)]
pub struct SlotLedger {
    store: SessionStore,
    policy: SchedulingConfig,
}

impl SlotLedger {
    /// Create a ledger over `store` using the given scheduling policy
    pub fn new(store: SessionStore, policy: SchedulingConfig) -> Self {
        Self { store, policy }
    }

    /// Record a batch of candidate slots from `user_email`
    ///
    /// # Errors
    ///
    /// - `InvalidProposal` when `slots` holds fewer than 1 or more than 5
    ///   entries; nothing is written.
    /// - `SessionNotFound` for an unknown session.
    /// - `Forbidden` when proposals are restricted to members and
    ///   `user_email` is neither invited nor the host.
    /// - `DeadlinePassed` when the deadline policy is `enforce` and today is
    ///   after the session's proposal deadline.
    pub fn propose_slots(
        &self,
        session_id: &str,
        user_email: &str,
        slots: Vec<Slot>,
    ) -> Result<Proposal> {
        self.propose_slots_at(session_id, user_email, slots, Utc::now())
    }

    /// Same as [`SlotLedger::propose_slots`] with an explicit submission time
    pub fn propose_slots_at(
        &self,
        session_id: &str,
        user_email: &str,
        slots: Vec<Slot>,
        now: DateTime<Utc>,
    ) -> Result<Proposal> {
        if !(MIN_SLOTS_PER_PROPOSAL..=MAX_SLOTS_PER_PROPOSAL).contains(&slots.len()) {
            metrics::record_proposal_rejected("slot_count");
            return Err(StudySyncError::InvalidProposal(format!(
                "expected {} to {} slots, got {}",
                MIN_SLOTS_PER_PROPOSAL,
                MAX_SLOTS_PER_PROPOSAL,
                slots.len()
            ))
            .into());
        }

        let proposal = Proposal {
            user: user_email.to_string(),
            slots,
            submitted_at: now,
        };

        let result = self.store.update(session_id, |session| {
            if self.policy.restrict_proposals_to_participants && !session.is_member(user_email) {
                return Err(StudySyncError::Forbidden(format!(
                    "{} is not invited to session {}",
                    user_email, session.id
                ))
                .into());
            }

            let submitted_on = now.date_naive();
            if submitted_on > session.propose_deadline {
                match self.policy.deadline_policy {
                    DeadlinePolicy::Enforce => {
                        return Err(StudySyncError::DeadlinePassed {
                            deadline: session.propose_deadline.to_string(),
                            message: format!("proposal submitted on {}", submitted_on),
                        }
                        .into());
                    }
                    DeadlinePolicy::Advisory => {
                        tracing::warn!(
                            session_id = %session.id,
                            user = %user_email,
                            deadline = %session.propose_deadline,
                            "Accepting proposal submitted after the deadline"
                        );
                    }
                }
            }

            session.proposed_slots.push(proposal.clone());
            Ok(())
        });

        match result {
            Ok(_) => {
                metrics::record_proposal_submitted(proposal.slots.len());
                tracing::info!(
                    session_id = %session_id,
                    user = %user_email,
                    slot_count = proposal.slots.len(),
                    "Slots proposed"
                );
                Ok(proposal)
            }
            Err(err) => {
                match crate::error::error_kind(&err) {
                    Some(StudySyncError::Forbidden(_)) => {
                        metrics::record_proposal_rejected("forbidden")
                    }
                    Some(StudySyncError::DeadlinePassed { .. }) => {
                        metrics::record_proposal_rejected("deadline")
                    }
                    _ => {}
                }
                Err(err)
            }
        }
    }

    /// Every proposal recorded for the session, in submission order
    pub fn get_proposed_slots(&self, session_id: &str) -> Result<Vec<Proposal>> {
        Ok(self.store.get_session_by_id(session_id)?.proposed_slots)
    }
}

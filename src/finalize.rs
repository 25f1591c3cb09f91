//! Slot tally and session finalization
//!
//! The tally flattens every proposal into one slot sequence, counts exact
//! matches and offers the most frequent slot as the auto-candidate when it
//! was proposed more than once. Finalization is always an explicit host
//! action: either accepting the auto-candidate or picking a slot manually.

use crate::config::{RefinalizePolicy, SchedulingConfig};
use crate::error::{Result, StudySyncError};
use crate::metrics;
use crate::notify::{DispatchReport, NotificationDispatcher};
use crate::slot::Slot;
use crate::storage::{Proposal, Session, SessionStore};
use serde::Serialize;
use std::collections::HashMap;

/// Number of times one slot was proposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotCount {
    /// The slot
    pub slot: Slot,
    /// Occurrences across all proposals
    pub count: usize,
}

/// Result of counting a session's proposals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    /// One slot was proposed more than once and leads the count
    MajorityFound {
        /// The slot the host can accept
        candidate: Slot,
    },
    /// No slot was proposed more than once; the host must pick one
    NoMajority {
        /// Distinct slots, in first-seen order (empty without proposals)
        candidates: Vec<Slot>,
    },
}

/// Vote counts plus the resulting decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Per-slot counts, in first-seen order
    pub counts: Vec<SlotCount>,
    /// What the host may do next
    pub decision: Decision,
}

impl Tally {
    /// The auto-candidate, if a majority exists
    pub fn candidate(&self) -> Option<Slot> {
        match &self.decision {
            Decision::MajorityFound { candidate } => Some(*candidate),
            Decision::NoMajority { .. } => None,
        }
    }

    /// Every distinct proposed slot, in first-seen order
    pub fn distinct_slots(&self) -> Vec<Slot> {
        self.counts.iter().map(|c| c.slot).collect()
    }

    /// Whether `slot` was proposed at least once
    pub fn contains(&self, slot: &Slot) -> bool {
        self.counts.iter().any(|c| &c.slot == slot)
    }
}

/// Count proposals and decide whether a majority slot exists
///
/// Ties on the top count go to the slot that appears first in the flattened
/// sequence.
///
/// # Examples
///
/// ```
/// use studysync::finalize::tally;
///
/// let tally = tally(&[]);
/// assert!(tally.candidate().is_none());
/// assert!(tally.distinct_slots().is_empty());
/// ```
pub fn tally(proposals: &[Proposal]) -> Tally {
    let mut counts: Vec<SlotCount> = Vec::new();
    let mut index: HashMap<Slot, usize> = HashMap::new();

    for slot in proposals.iter().flat_map(|p| p.slots.iter()) {
        match index.get(slot) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(*slot, counts.len());
                counts.push(SlotCount {
                    slot: *slot,
                    count: 1,
                });
            }
        }
    }

    // First strict maximum in first-seen order wins ties
    let top = counts.iter().fold(None::<&SlotCount>, |best, c| match best {
        Some(b) if b.count >= c.count => Some(b),
        _ => Some(c),
    });

    let decision = match top {
        Some(top) if top.count > 1 => Decision::MajorityFound {
            candidate: top.slot,
        },
        _ => Decision::NoMajority {
            candidates: counts.iter().map(|c| c.slot).collect(),
        },
    };

    Tally { counts, decision }
}

/// How the host picks the final slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeChoice {
    /// Accept the tally's auto-candidate
    AutoCandidate,
    /// Use the given slot
    Manual(Slot),
}

impl FinalizeChoice {
    fn mode(&self) -> &'static str {
        match self {
            FinalizeChoice::AutoCandidate => "auto",
            FinalizeChoice::Manual(_) => "manual",
        }
    }
}

/// Committed session plus the notification outcome
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    /// Session as stored after the commit
    pub session: Session,
    /// Final slot that this commit replaced, if any
    pub replaced: Option<Slot>,
    /// Per-recipient delivery results
    pub report: DispatchReport,
}

/// Tallies proposals and commits the host's final choice
#[derive(Clone)]
pub struct FinalizationEngine {
    store: SessionStore,
    dispatcher: NotificationDispatcher,
    policy: SchedulingConfig,
}

impl FinalizationEngine {
    /// Create an engine
    pub fn new(
        store: SessionStore,
        dispatcher: NotificationDispatcher,
        policy: SchedulingConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            policy,
        }
    }

    /// Tally the current proposals of a session
    ///
    /// Reads one consistent snapshot; never finalizes.
    pub fn tally_and_decide(&self, session_id: &str) -> Result<Tally> {
        let session = self.store.get_session_by_id(session_id)?;
        Ok(tally(&session.proposed_slots))
    }

    /// Commit the host's choice and notify participants
    ///
    /// The choice is validated against the proposals in the same
    /// compare-and-swap that writes the final slot, so a proposal landing
    /// concurrently is either counted or not, never half-seen. Notification
    /// failures are reported in the outcome and do not undo the commit.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown session.
    /// - `Forbidden` when `host_email` does not own the session.
    /// - `InvalidProposal` when nothing was proposed, when the auto-candidate
    ///   is requested without a majority, or when a manual slot was never
    ///   proposed and proposed slots are required.
    /// - `AlreadyFinalized` under the reject re-finalization policy.
    pub async fn finalize(
        &self,
        session_id: &str,
        host_email: &str,
        choice: FinalizeChoice,
    ) -> Result<FinalizeOutcome> {
        let mut confirmed: Option<Slot> = None;
        let mut replaced: Option<Slot> = None;

        let session = self.store.update(session_id, |session| {
            if !session.is_host(host_email) {
                return Err(StudySyncError::Forbidden(format!(
                    "only the host can finalize session {}",
                    session.id
                ))
                .into());
            }

            if let (Some(existing), RefinalizePolicy::Reject) =
                (session.final_slot, self.policy.refinalize)
            {
                return Err(StudySyncError::AlreadyFinalized(format!(
                    "session {} is confirmed for {}",
                    session.id, existing
                ))
                .into());
            }

            let tally = tally(&session.proposed_slots);
            if tally.counts.is_empty() {
                return Err(StudySyncError::InvalidProposal(
                    "no slots have been proposed yet".to_string(),
                )
                .into());
            }

            let slot = match choice {
                FinalizeChoice::AutoCandidate => tally.candidate().ok_or_else(|| {
                    StudySyncError::InvalidProposal(
                        "no slot was proposed more than once; pick one manually".to_string(),
                    )
                })?,
                FinalizeChoice::Manual(slot) => {
                    if self.policy.require_proposed_final_slot && !tally.contains(&slot) {
                        return Err(StudySyncError::InvalidProposal(format!(
                            "slot {} was not proposed",
                            slot
                        ))
                        .into());
                    }
                    slot
                }
            };

            // Reset on every attempt; only the committed one is reported
            replaced = session.final_slot;
            session.final_slot = Some(slot);
            session.finalized_at = Some(chrono::Utc::now());
            confirmed = Some(slot);
            Ok(())
        })?;

        let slot = confirmed.ok_or_else(|| {
            StudySyncError::StorageUnavailable("finalization committed without a slot".to_string())
        })?;

        if let Some(previous) = replaced {
            tracing::warn!(
                session_id = %session.id,
                previous = %previous,
                new = %slot,
                "Overwrote existing final slot"
            );
        }

        metrics::record_session_finalized(choice.mode());
        tracing::info!(
            session_id = %session.id,
            slot = %slot,
            mode = choice.mode(),
            "Session finalized"
        );

        let report = self.dispatcher.dispatch_confirmation(&session, &slot).await;
        Ok(FinalizeOutcome {
            session,
            replaced,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_kind;
    use crate::notify::MockNotifier;
    use crate::storage::NewSession;
    use chrono::{NaiveDate, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn slot(s: &str) -> Slot {
        s.parse().unwrap()
    }

    fn proposal(user: &str, slots: &[&str]) -> Proposal {
        Proposal {
            user: user.to_string(),
            slots: slots.iter().map(|s| slot(s)).collect(),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_proposals_means_no_candidates() {
        let t = tally(&[]);
        assert!(t.counts.is_empty());
        assert_eq!(t.decision, Decision::NoMajority { candidates: vec![] });
        assert!(t.candidate().is_none());
    }

    #[test]
    fn test_unique_most_frequent_slot_is_candidate() {
        let t = tally(&[
            proposal("a", &["2025-05-01T10:00", "2025-05-02T10:00"]),
            proposal("b", &["2025-05-02T10:00", "2025-05-03T10:00"]),
            proposal("c", &["2025-05-02T10:00"]),
        ]);
        assert_eq!(t.candidate(), Some(slot("2025-05-02T10:00")));
        assert_eq!(t.counts[1].count, 3);
    }

    #[test]
    fn test_all_single_counts_mean_no_majority() {
        let t = tally(&[
            proposal("a", &["2025-05-01T10:00"]),
            proposal("b", &["2025-05-02T10:00"]),
            proposal("c", &["2025-05-03T10:00"]),
        ]);
        assert_eq!(
            t.decision,
            Decision::NoMajority {
                candidates: vec![
                    slot("2025-05-01T10:00"),
                    slot("2025-05-02T10:00"),
                    slot("2025-05-03T10:00"),
                ]
            }
        );
    }

    #[test]
    fn test_tie_broken_by_first_occurrence() {
        let t = tally(&[
            proposal("a", &["2025-05-02T10:00", "2025-05-01T10:00"]),
            proposal("b", &["2025-05-01T10:00", "2025-05-02T10:00"]),
        ]);
        assert_eq!(t.candidate(), Some(slot("2025-05-02T10:00")));
    }

    #[test]
    fn test_same_user_repeating_a_slot_counts_twice() {
        let t = tally(&[
            proposal("a", &["2025-05-01T10:00"]),
            proposal("a", &["2025-05-01T10:00"]),
        ]);
        assert_eq!(t.candidate(), Some(slot("2025-05-01T10:00")));
    }

    #[test]
    fn test_equal_slots_in_different_spellings_are_counted_together() {
        let t = tally(&[
            proposal("a", &["2025-05-01T10:00"]),
            proposal("b", &["2025-05-01 10:00:00"]),
        ]);
        assert_eq!(t.counts.len(), 1);
        assert_eq!(t.candidate(), Some(slot("2025-05-01T10:00:00")));
    }

    #[test]
    fn test_tally_serializes_with_outcome_tag() {
        let t = tally(&[proposal("a", &["2025-05-01T10:00"])]);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["decision"]["outcome"], "no_majority");
        assert_eq!(json["counts"][0]["slot"], "2025-05-01T10:00:00");
    }

    fn engine_with(
        policy: SchedulingConfig,
        notifier: MockNotifier,
    ) -> (FinalizationEngine, SessionStore, String, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("db")).unwrap();
        let id = store
            .create_session(NewSession {
                host_email: "host@x.com".to_string(),
                title: "Statistics".to_string(),
                description: String::new(),
                participants: vec!["a@x.com".to_string(), "b@x.com".to_string()],
                propose_deadline: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            })
            .unwrap();
        let dispatcher = NotificationDispatcher::new(Arc::new(notifier));
        (
            FinalizationEngine::new(store.clone(), dispatcher, policy),
            store,
            id,
            dir,
        )
    }

    fn accepting_notifier() -> MockNotifier {
        let mut mock = MockNotifier::new();
        mock.expect_send().returning(|_, _, _| Ok(()));
        mock
    }

    fn silent_notifier() -> MockNotifier {
        let mut mock = MockNotifier::new();
        mock.expect_send().times(0);
        mock
    }

    fn add_proposal(store: &SessionStore, id: &str, user: &str, slots: &[&str]) {
        let p = proposal(user, slots);
        store
            .update(id, |s| {
                s.proposed_slots.push(p.clone());
                Ok(())
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_host_is_forbidden() {
        let (engine, store, id, _dir) =
            engine_with(SchedulingConfig::default(), silent_notifier());
        add_proposal(&store, &id, "a@x.com", &["2030-01-05T10:00"]);

        let err = engine
            .finalize(&id, "a@x.com", FinalizeChoice::Manual(slot("2030-01-05T10:00")))
            .await
            .unwrap_err();
        assert!(matches!(error_kind(&err), Some(StudySyncError::Forbidden(_))));
        assert!(store.get_session_by_id(&id).unwrap().final_slot.is_none());
    }

    #[tokio::test]
    async fn test_finalize_unknown_session() {
        let (engine, _store, _id, _dir) =
            engine_with(SchedulingConfig::default(), silent_notifier());
        let err = engine
            .finalize("missing", "host@x.com", FinalizeChoice::AutoCandidate)
            .await
            .unwrap_err();
        assert!(matches!(
            error_kind(&err),
            Some(StudySyncError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_auto_candidate_without_majority_is_rejected() {
        let (engine, store, id, _dir) =
            engine_with(SchedulingConfig::default(), silent_notifier());
        add_proposal(&store, &id, "a@x.com", &["2030-01-05T10:00"]);
        add_proposal(&store, &id, "b@x.com", &["2030-01-06T10:00"]);

        let err = engine
            .finalize(&id, "host@x.com", FinalizeChoice::AutoCandidate)
            .await
            .unwrap_err();
        assert!(matches!(
            error_kind(&err),
            Some(StudySyncError::InvalidProposal(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_slot_must_have_been_proposed() {
        let (engine, store, id, _dir) =
            engine_with(SchedulingConfig::default(), silent_notifier());
        add_proposal(&store, &id, "a@x.com", &["2030-01-05T10:00"]);

        let err = engine
            .finalize(&id, "host@x.com", FinalizeChoice::Manual(slot("2030-01-09T10:00")))
            .await
            .unwrap_err();
        assert!(matches!(
            error_kind(&err),
            Some(StudySyncError::InvalidProposal(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_unproposed_slot_allowed_when_not_required() {
        let policy = SchedulingConfig {
            require_proposed_final_slot: false,
            ..SchedulingConfig::default()
        };
        let (engine, store, id, _dir) = engine_with(policy, accepting_notifier());
        add_proposal(&store, &id, "a@x.com", &["2030-01-05T10:00"]);

        let outcome = engine
            .finalize(&id, "host@x.com", FinalizeChoice::Manual(slot("2030-01-09T10:00")))
            .await
            .unwrap();
        assert_eq!(outcome.session.final_slot, Some(slot("2030-01-09T10:00")));
    }

    #[tokio::test]
    async fn test_refinalize_overwrites_by_default() {
        let (engine, store, id, _dir) =
            engine_with(SchedulingConfig::default(), accepting_notifier());
        add_proposal(&store, &id, "a@x.com", &["2030-01-05T10:00", "2030-01-06T10:00"]);

        let first = engine
            .finalize(&id, "host@x.com", FinalizeChoice::Manual(slot("2030-01-05T10:00")))
            .await
            .unwrap();
        assert!(first.replaced.is_none());
        let second = engine
            .finalize(&id, "host@x.com", FinalizeChoice::Manual(slot("2030-01-06T10:00")))
            .await
            .unwrap();

        assert_eq!(second.session.final_slot, Some(slot("2030-01-06T10:00")));
        assert_eq!(second.replaced, Some(slot("2030-01-05T10:00")));
        assert_eq!(
            store.get_session_by_id(&id).unwrap().final_slot,
            Some(slot("2030-01-06T10:00"))
        );
    }

    #[tokio::test]
    async fn test_refinalize_rejected_under_reject_policy() {
        let policy = SchedulingConfig {
            refinalize: RefinalizePolicy::Reject,
            ..SchedulingConfig::default()
        };
        let (engine, store, id, _dir) = engine_with(policy, accepting_notifier());
        add_proposal(&store, &id, "a@x.com", &["2030-01-05T10:00", "2030-01-06T10:00"]);

        engine
            .finalize(&id, "host@x.com", FinalizeChoice::Manual(slot("2030-01-05T10:00")))
            .await
            .unwrap();
        let err = engine
            .finalize(&id, "host@x.com", FinalizeChoice::Manual(slot("2030-01-06T10:00")))
            .await
            .unwrap_err();

        assert!(matches!(
            error_kind(&err),
            Some(StudySyncError::AlreadyFinalized(_))
        ));
        assert_eq!(
            store.get_session_by_id(&id).unwrap().final_slot,
            Some(slot("2030-01-05T10:00"))
        );
    }

    #[tokio::test]
    async fn test_delivery_failures_do_not_roll_back() {
        let mut mock = MockNotifier::new();
        mock.expect_send()
            .times(2)
            .returning(|_, _, _| Err(anyhow::anyhow!("smtp down")));
        let (engine, store, id, _dir) = engine_with(SchedulingConfig::default(), mock);
        add_proposal(&store, &id, "a@x.com", &["2030-01-05T10:00"]);
        add_proposal(&store, &id, "b@x.com", &["2030-01-05T10:00"]);

        let outcome = engine
            .finalize(&id, "host@x.com", FinalizeChoice::AutoCandidate)
            .await
            .unwrap();

        assert_eq!(outcome.report.failed.len(), 2);
        assert!(outcome.report.delivered.is_empty());
        let stored = store.get_session_by_id(&id).unwrap();
        assert_eq!(stored.final_slot, Some(slot("2030-01-05T10:00")));
        assert!(stored.finalized_at.is_some());
    }

    mod scenarios {
        use super::super::*;
        use crate::error::error_kind;
        use crate::ledger::SlotLedger;
        use crate::test_utils::{new_session, slot, temp_store, RecordingNotifier};
        use std::sync::Arc;

        fn services(
            notifier: Arc<RecordingNotifier>,
        ) -> (SlotLedger, FinalizationEngine, SessionStore, tempfile::TempDir) {
            let (store, dir) = temp_store();
            let policy = SchedulingConfig::default();
            let ledger = SlotLedger::new(store.clone(), policy.clone());
            let engine = FinalizationEngine::new(
                store.clone(),
                NotificationDispatcher::new(notifier),
                policy,
            );
            (ledger, engine, store, dir)
        }

        #[tokio::test]
        async fn test_majority_slot_is_confirmed_and_everyone_notified() {
            let notifier = Arc::new(RecordingNotifier::default());
            let (ledger, engine, store, _dir) = services(notifier.clone());
            let id = store.create_session(new_session(&["a@x.com", "b@x.com"])).unwrap();

            let t1 = slot("2029-06-01T18:00");
            let t2 = slot("2029-06-02T18:00");
            let t3 = slot("2029-06-03T18:00");
            ledger.propose_slots(&id, "a@x.com", vec![t1, t2]).unwrap();
            ledger.propose_slots(&id, "b@x.com", vec![t1, t3]).unwrap();

            let tally = engine.tally_and_decide(&id).unwrap();
            assert_eq!(tally.candidate(), Some(t1));
            // Tallying alone never finalizes
            assert!(store.get_session_by_id(&id).unwrap().final_slot.is_none());

            let outcome = engine
                .finalize(&id, "host@x.com", FinalizeChoice::AutoCandidate)
                .await
                .unwrap();
            assert_eq!(outcome.session.final_slot, Some(t1));
            assert_eq!(outcome.report.delivered, vec!["a@x.com", "b@x.com"]);

            assert_eq!(notifier.recipients(), vec!["a@x.com", "b@x.com"]);
            let first = &notifier.sent()[0];
            assert_eq!(first.subject, crate::notify::CONFIRMATION_SUBJECT);
            assert!(first.html.contains("Hi A,"));
            assert!(first.html.contains("<strong>Study Group</strong>"));
            assert!(first.html.contains("2029-06-01T18:00:00"));
        }

        #[tokio::test]
        async fn test_no_proposals_cannot_be_finalized() {
            let notifier = Arc::new(RecordingNotifier::default());
            let (_ledger, engine, store, _dir) = services(notifier.clone());
            let id = store.create_session(new_session(&["a@x.com"])).unwrap();

            let tally = engine.tally_and_decide(&id).unwrap();
            assert!(tally.distinct_slots().is_empty());
            assert!(tally.candidate().is_none());

            let err = engine
                .finalize(&id, "host@x.com", FinalizeChoice::Manual(slot("2029-06-01T18:00")))
                .await
                .unwrap_err();
            assert!(matches!(
                error_kind(&err),
                Some(StudySyncError::InvalidProposal(_))
            ));
            assert!(store.get_session_by_id(&id).unwrap().final_slot.is_none());
            assert!(notifier.sent().is_empty());
        }

        #[tokio::test]
        async fn test_host_picks_manually_without_majority() {
            let notifier = Arc::new(RecordingNotifier::failing_for(&["b@x.com"]));
            let (ledger, engine, store, _dir) = services(notifier.clone());
            let id = store
                .create_session(new_session(&["a@x.com", "b@x.com", "c@x.com"]))
                .unwrap();

            let picks = [
                ("a@x.com", "2029-06-01T09:00"),
                ("b@x.com", "2029-06-02T09:00"),
                ("c@x.com", "2029-06-03T09:00"),
            ];
            for (user, raw) in picks {
                ledger.propose_slots(&id, user, vec![slot(raw)]).unwrap();
            }

            let tally = engine.tally_and_decide(&id).unwrap();
            assert!(tally.candidate().is_none());
            let second = tally.distinct_slots()[1];
            assert_eq!(second, slot("2029-06-02T09:00"));

            let outcome = engine
                .finalize(&id, "host@x.com", FinalizeChoice::Manual(second))
                .await
                .unwrap();
            assert_eq!(outcome.session.final_slot, Some(second));
            assert_eq!(notifier.recipients().len(), 3);
            assert_eq!(outcome.report.failed.len(), 1);
            assert_eq!(outcome.report.failed[0].recipient, "b@x.com");
        }
    }
}

//! Tracking of one open DKG session.
use std::collections::BTreeSet;

use llmq_roles::{
    masternode::ProTxHash,
    quorum::{DkgEvent, DkgPhase, Membership, QuorumType, Session, SessionNumber, SporkSnapshot},
};
use zksync_concurrency::sync;

/// Errors returned when recording an observed event into a session.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// The session is sealed; its recorded facts are immutable.
    #[error("session {number} is already sealed")]
    Sealed {
        /// Height of the sealed session.
        number: SessionNumber,
    },
    /// The event references a masternode outside the session's expected
    /// member set. Accepting it would credit or debit a phantom member.
    #[error("masternode {member:?} is not an expected member of session {number}")]
    UnknownMember {
        /// The unexpected masternode.
        member: ProTxHash,
        /// Height of the session.
        number: SessionNumber,
    },
}

/// Accumulated state of one DKG session. Observable through
/// [`SessionTracker::subscribe`], so the orchestrator can wait on phase
/// counts while events keep arriving.
#[derive(Debug, Clone)]
pub struct SessionState {
    quorum: QuorumType,
    number: SessionNumber,
    sporks: SporkSnapshot,
    expected: Membership,
    connections: BTreeSet<ProTxHash>,
    contributions: BTreeSet<ProTxHash>,
    complaints: BTreeSet<ProTxHash>,
    commitments: BTreeSet<ProTxHash>,
    sealed: Option<Session>,
}

impl SessionState {
    /// Number of distinct members observed in the given phase.
    pub fn phase_count(&self, phase: DkgPhase) -> usize {
        self.observed(phase).len()
    }

    /// Whether the session has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed.is_some()
    }

    fn observed(&self, phase: DkgPhase) -> &BTreeSet<ProTxHash> {
        match phase {
            DkgPhase::Connect => &self.connections,
            DkgPhase::Contribute => &self.contributions,
            DkgPhase::Complain => &self.complaints,
            DkgPhase::Commit => &self.commitments,
        }
    }

    fn observed_mut(&mut self, phase: DkgPhase) -> &mut BTreeSet<ProTxHash> {
        match phase {
            DkgPhase::Connect => &mut self.connections,
            DkgPhase::Contribute => &mut self.contributions,
            DkgPhase::Complain => &mut self.complaints,
            DkgPhase::Commit => &mut self.commitments,
        }
    }
}

/// Records, for one DKG round, which expected members were observed
/// connecting, contributing, complaining and committing. Mutated only by
/// the flow driving the round; recording is serialized through the watch
/// cell, so observers always read a consistent snapshot.
#[derive(Debug)]
pub struct SessionTracker(sync::watch::Sender<SessionState>);

impl SessionTracker {
    /// Begins a session for one DKG round.
    pub fn new(
        quorum: QuorumType,
        number: SessionNumber,
        sporks: SporkSnapshot,
        expected: Membership,
    ) -> Self {
        Self(
            sync::watch::channel(SessionState {
                quorum,
                number,
                sporks,
                expected,
                connections: BTreeSet::new(),
                contributions: BTreeSet::new(),
                complaints: BTreeSet::new(),
                commitments: BTreeSet::new(),
                sealed: None,
            })
            .0,
        )
    }

    /// Subscribes to the session state.
    pub fn subscribe(&self) -> sync::watch::Receiver<SessionState> {
        self.0.subscribe()
    }

    /// Number of distinct members observed in the given phase so far.
    pub fn phase_count(&self, phase: DkgPhase) -> usize {
        self.0.borrow().phase_count(phase)
    }

    /// Records one observed member action.
    pub fn record(&self, event: &DkgEvent) -> Result<(), SessionError> {
        sync::try_send_modify(&self.0, |state| {
            if state.sealed.is_some() {
                return Err(SessionError::Sealed {
                    number: state.number,
                });
            }
            if !state.expected.contains(&event.member) {
                return Err(SessionError::UnknownMember {
                    member: event.member,
                    number: state.number,
                });
            }
            state.observed_mut(event.phase).insert(event.member);
            Ok(())
        })
    }

    /// Records that a member established its intra-quorum connections.
    pub fn record_connection(&self, member: &ProTxHash) -> Result<(), SessionError> {
        self.record(&DkgEvent {
            member: *member,
            phase: DkgPhase::Connect,
        })
    }

    /// Records that a member broadcast its contribution.
    pub fn record_contribution(&self, member: &ProTxHash) -> Result<(), SessionError> {
        self.record(&DkgEvent {
            member: *member,
            phase: DkgPhase::Contribute,
        })
    }

    /// Records that a member lodged a complaint.
    pub fn record_complaint(&self, member: &ProTxHash) -> Result<(), SessionError> {
        self.record(&DkgEvent {
            member: *member,
            phase: DkgPhase::Complain,
        })
    }

    /// Records that a member's share was included in the final commitment.
    pub fn record_commitment(&self, member: &ProTxHash) -> Result<(), SessionError> {
        self.record(&DkgEvent {
            member: *member,
            phase: DkgPhase::Commit,
        })
    }

    /// Seals the session, freezing the four membership subsets computed
    /// from the recorded events. Idempotent: repeated calls return the
    /// same immutable record.
    pub fn seal(&self) -> Session {
        let mut sealed = None;
        self.0.send_if_modified(|state| {
            if let Some(session) = &state.sealed {
                sealed = Some(session.clone());
                return false;
            }
            let session = Session {
                quorum: state.quorum.clone(),
                number: state.number,
                sporks: state.sporks,
                expected: state.expected.clone(),
                connections: state.connections.clone(),
                contributions: state.contributions.clone(),
                complaints: state.complaints.clone(),
                commitments: state.commitments.clone(),
            };
            state.sealed = Some(session.clone());
            sealed = Some(session);
            true
        });
        // safe, since `sealed` is set by `send_if_modified`.
        sealed.unwrap()
    }
}

//! The PoSe score ledger: a strict fold over the ordered log of sealed
//! sessions.
use std::collections::{BTreeMap, BTreeSet};

use llmq_roles::{
    masternode::{ProTxHash, ProTxState, POSE_BAN_HEIGHT_NONE},
    quorum::{Participation, Session, SessionNumber},
};
use zksync_concurrency::{ctx, sync};

use crate::{
    ban::{evaluate, BanVerdict},
    config::PoseParams,
    metrics,
};

/// Errors returned when applying a sealed session to the ledger. Both are
/// contract violations: the ledger state is left untouched and the caller
/// must not retry with the same input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The session has already been applied. The ledger is a strict fold
    /// over the session log, so every session enters it exactly once.
    #[error("session {number} has already been applied")]
    DuplicateSession {
        /// Height of the rejected session.
        number: SessionNumber,
    },
    /// Applying the session would break the per-member ordering of
    /// penalty events. Score deltas do not commute, so each member's
    /// sessions must be applied in sealing order.
    #[error("session {number} is not newer than session {last} already applied for {member:?}")]
    OutOfOrder {
        /// The member whose ordering would break.
        member: ProTxHash,
        /// Height of the rejected session.
        number: SessionNumber,
        /// Height of the member's last applied session.
        last: SessionNumber,
    },
}

/// Accounting entry of one masternode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberEntry {
    /// Current penalty score.
    pub score: u64,
    /// Height of the last session applied for this member.
    pub last_applied: Option<SessionNumber>,
    /// Height at which the member was banned. Set at most once and never
    /// cleared by the engine; lifting a ban is an administrative action
    /// outside its authority.
    pub banned_at: Option<SessionNumber>,
}

/// Scores and ban marks of every masternode that ever appeared in an
/// applied session. Entries are never deleted, so the history stays
/// auditable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    applied: BTreeSet<SessionNumber>,
    members: BTreeMap<ProTxHash, MemberEntry>,
}

impl LedgerState {
    /// Accounting entry of the given masternode, if it ever appeared in an
    /// applied session.
    pub fn member(&self, member: &ProTxHash) -> Option<&MemberEntry> {
        self.members.get(member)
    }

    /// Iterates over all known members and their entries.
    pub fn members(&self) -> impl Iterator<Item = (&ProTxHash, &MemberEntry)> {
        self.members.iter()
    }

    /// Whether the session with the given height has been applied.
    pub fn is_applied(&self, number: SessionNumber) -> bool {
        self.applied.contains(&number)
    }
}

/// Change of one member's score produced by applying a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenaltyDelta {
    /// Score before the session was applied.
    pub prev: u64,
    /// Score after the session was applied.
    pub next: u64,
}

/// The score ledger. [`Ledger::apply`] is the single mutation point:
/// applications are serialized through the watch cell, and readers
/// ([`Ledger::evaluate`], [`Ledger::member_state`], subscribers) always
/// see a consistent snapshot of score and ban height together.
#[derive(Debug)]
pub struct Ledger {
    params: PoseParams,
    state: sync::watch::Sender<LedgerState>,
}

impl Ledger {
    /// New empty ledger with the given penalty policy.
    pub fn new(params: PoseParams) -> Self {
        Self {
            params,
            state: sync::watch::channel(LedgerState::default()).0,
        }
    }

    /// Rebuilds a ledger by folding the given sessions in order. Produces
    /// a state identical to the ledger that originally applied them; this
    /// is what makes ban decisions replayable and auditable.
    pub fn replay<'a>(
        params: PoseParams,
        sessions: impl IntoIterator<Item = &'a Session>,
    ) -> Result<Self, LedgerError> {
        let ledger = Self::new(params);
        for session in sessions {
            ledger.apply(session)?;
        }
        Ok(ledger)
    }

    /// The penalty policy of this ledger.
    pub fn params(&self) -> &PoseParams {
        &self.params
    }

    /// Subscribes to the ledger state.
    pub fn subscribe(&self) -> sync::watch::Receiver<LedgerState> {
        self.state.subscribe()
    }

    /// Consistent snapshot of the current ledger state.
    pub fn snapshot(&self) -> LedgerState {
        self.state.borrow().clone()
    }

    /// Folds a sealed session into the ledger: every expected member that
    /// made it into the commitment is forgiven `recovery_step` (bounded at
    /// zero), members that connected without committing pay
    /// `partial_penalty`, members that never connected pay `full_penalty`.
    /// A member whose score first reaches `ban_threshold` here gets its
    /// ban height set to the session's height.
    ///
    /// Validation happens before any mutation: on error the ledger state
    /// is exactly as it was.
    pub fn apply(
        &self,
        session: &Session,
    ) -> Result<BTreeMap<ProTxHash, PenaltyDelta>, LedgerError> {
        let params = self.params;
        sync::try_send_modify(&self.state, |state| {
            if state.applied.contains(&session.number) {
                return Err(LedgerError::DuplicateSession {
                    number: session.number,
                });
            }
            for member in session.expected.iter() {
                let last = state.members.get(member).and_then(|entry| entry.last_applied);
                if let Some(last) = last {
                    if last >= session.number {
                        return Err(LedgerError::OutOfOrder {
                            member: *member,
                            number: session.number,
                            last,
                        });
                    }
                }
            }

            let mut deltas = BTreeMap::new();
            for member in session.expected.iter() {
                let entry = state.members.entry(*member).or_default();
                let prev = entry.score;
                entry.score = match session.participation(member) {
                    Participation::Committed => entry.score.saturating_sub(params.recovery_step),
                    Participation::ConnectedOnly => {
                        entry.score.saturating_add(params.partial_penalty)
                    }
                    Participation::Absent => entry.score.saturating_add(params.full_penalty),
                };
                entry.last_applied = Some(session.number);
                if entry.banned_at.is_none() && entry.score >= params.ban_threshold {
                    entry.banned_at = Some(session.number);
                    tracing::info!(
                        "masternode {member:?} banned at session {} (score {})",
                        session.number,
                        entry.score,
                    );
                    metrics::METRICS.bans.inc();
                }
                deltas.insert(*member, PenaltyDelta {
                    prev,
                    next: entry.score,
                });
            }
            state.applied.insert(session.number);
            Ok(deltas)
        })
    }

    /// Ban verdict for the given masternode, evaluated over the current
    /// snapshot.
    pub fn evaluate(&self, member: &ProTxHash) -> BanVerdict {
        evaluate(&self.state.borrow(), member)
    }

    /// Externally visible PoSe state of the given masternode, in the shape
    /// reported by the node's `protx info` query.
    pub fn member_state(&self, member: &ProTxHash) -> ProTxState {
        let state = self.state.borrow();
        let Some(entry) = state.member(member) else {
            return ProTxState::healthy();
        };
        ProTxState {
            pose_penalty: entry.score,
            pose_ban_height: entry
                .banned_at
                .map_or(POSE_BAN_HEIGHT_NONE, |number| {
                    i64::try_from(number.0).unwrap()
                }),
        }
    }

    /// Waits until the ban decision engine reports the given member as
    /// banned.
    pub async fn wait_until_banned(
        &self,
        ctx: &ctx::Ctx,
        member: &ProTxHash,
    ) -> ctx::OrCanceled<BanVerdict> {
        let mut recv = self.subscribe();
        let state = sync::wait_for(ctx, &mut recv, |state| evaluate(state, member).banned).await?;
        Ok(evaluate(&state, member))
    }
}

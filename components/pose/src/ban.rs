//! The ban decision engine.
use llmq_roles::{masternode::ProTxHash, quorum::SessionNumber};

use crate::ledger::LedgerState;

/// Verdict of the ban decision engine for one masternode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanVerdict {
    /// Whether the member currently carries a non-zero penalty score.
    pub punished: bool,
    /// Whether the member is banned. Sticky: once the score has reached
    /// the ban threshold the verdict stays banned, regardless of later
    /// score decreases. Clearing a ban is an administrative action outside
    /// the engine.
    pub banned: bool,
    /// Height of the session whose penalties first pushed the score to the
    /// ban threshold. Set exactly once; later evaluations return the same
    /// height.
    pub effective: Option<SessionNumber>,
}

/// Evaluates the ban policy for a member against one consistent ledger
/// snapshot. Pure: no storage of its own, so the verdict is recomputable
/// from the session log at any time.
pub fn evaluate(state: &LedgerState, member: &ProTxHash) -> BanVerdict {
    let Some(entry) = state.member(member) else {
        return BanVerdict {
            punished: false,
            banned: false,
            effective: None,
        };
    };
    BanVerdict {
        punished: entry.score > 0,
        banned: entry.banned_at.is_some(),
        effective: entry.banned_at,
    }
}

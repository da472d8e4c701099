use std::{collections::BTreeSet, fmt};

use crate::masternode::ProTxHash;

use super::{Membership, QuorumType, SporkSnapshot};

/// Height of a DKG session in the ordered session log. Assigned
/// monotonically when a round begins; doubles as the ban-effective height
/// once a session's penalties push a member over the ban threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionNumber(pub u64);

impl SessionNumber {
    /// Returns the next session number.
    pub fn next(self) -> Self {
        Self(self.0.checked_add(1).unwrap())
    }
}

impl fmt::Display for SessionNumber {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, fmt)
    }
}

/// Observable phases of one DKG round, in protocol order. A member that is
/// healthy walks through all four; PoSe accounting only distinguishes
/// "connected" and "committed" (see [`Participation`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DkgPhase {
    /// The member established its intra-quorum connections.
    Connect,
    /// The member broadcast its DKG contribution.
    Contribute,
    /// The member lodged a complaint against a misbehaving peer.
    Complain,
    /// The member's share was included in the final commitment.
    Commit,
}

impl DkgPhase {
    /// All phases, in protocol order.
    pub const ALL: [Self; 4] = [Self::Connect, Self::Contribute, Self::Complain, Self::Commit];
}

impl fmt::Display for DkgPhase {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Self::Connect => "connect",
            Self::Contribute => "contribute",
            Self::Complain => "complain",
            Self::Commit => "commit",
        })
    }
}

/// One observed member action during a DKG round, as reported by the DKG
/// driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DkgEvent {
    /// The acting member.
    pub member: ProTxHash,
    /// The phase the action belongs to.
    pub phase: DkgPhase,
}

/// How a member participated in a sealed session, as judged for PoSe
/// accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    /// The member's share made it into the final commitment.
    Committed,
    /// The member connected but its share is missing from the commitment.
    ConnectedOnly,
    /// The member never connected.
    Absent,
}

/// Sealed, immutable record of one DKG attempt. Records what actually
/// happened, not an idealized outcome: a round that fell short of its
/// threshold still seals, and the score ledger judges each member's
/// individual fault. All four subsets are subsets of `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Quorum configuration the round ran under.
    pub quorum: QuorumType,
    /// Height of this session in the session log.
    pub number: SessionNumber,
    /// Feature gates the round ran under.
    pub sporks: SporkSnapshot,
    /// Members expected to participate.
    pub expected: Membership,
    /// Members that established their intra-quorum connections.
    pub connections: BTreeSet<ProTxHash>,
    /// Members that broadcast a contribution.
    pub contributions: BTreeSet<ProTxHash>,
    /// Members that lodged a complaint.
    pub complaints: BTreeSet<ProTxHash>,
    /// Members whose share was included in the final commitment.
    pub commitments: BTreeSet<ProTxHash>,
}

impl Session {
    /// The members observed in the given phase.
    pub fn observed(&self, phase: DkgPhase) -> &BTreeSet<ProTxHash> {
        match phase {
            DkgPhase::Connect => &self.connections,
            DkgPhase::Contribute => &self.contributions,
            DkgPhase::Complain => &self.complaints,
            DkgPhase::Commit => &self.commitments,
        }
    }

    /// How the given member participated in this session.
    pub fn participation(&self, member: &ProTxHash) -> Participation {
        if self.commitments.contains(member) {
            Participation::Committed
        } else if self.connections.contains(member) {
            Participation::ConnectedOnly
        } else {
            Participation::Absent
        }
    }

    /// Whether enough members committed for the round to reach the quorum
    /// signing threshold.
    pub fn reached_threshold(&self) -> bool {
        self.commitments.len() >= self.quorum.threshold
    }
}

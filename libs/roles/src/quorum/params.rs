use std::fmt;

use zksync_concurrency::time;

/// Named LLMQ types, as defined by the chain parameters. Each kind maps to
/// a fixed size/threshold pair which never changes once the chain is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QuorumKind {
    /// Small quorum used on regtest setups.
    Test,
    /// Small quorum used on devnets.
    Devnet,
    /// 50 members, 60% threshold.
    Type50_60,
    /// 400 members, 60% threshold.
    Type400_60,
    /// 400 members, 85% threshold.
    Type400_85,
}

impl fmt::Display for QuorumKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Self::Test => "llmq_test",
            Self::Devnet => "llmq_devnet",
            Self::Type50_60 => "llmq_50_60",
            Self::Type400_60 => "llmq_400_60",
            Self::Type400_85 => "llmq_400_85",
        })
    }
}

/// Configuration of one quorum type: how many members get selected for a
/// DKG round, how many of them have to participate for the round to
/// produce a usable commitment, and how long a single round may take.
/// Immutable once a session begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumType {
    /// The LLMQ type this configuration belongs to.
    pub kind: QuorumKind,
    /// Number of members selected for a DKG round.
    pub size: usize,
    /// Minimal number of members that have to produce a commitment for the
    /// round to reach its signing threshold.
    pub threshold: usize,
    /// Upper bound on the duration of a full DKG round.
    pub round_timeout: time::Duration,
}

impl QuorumType {
    /// Validated constructor for custom parameters.
    pub fn new(
        kind: QuorumKind,
        size: usize,
        threshold: usize,
        round_timeout: time::Duration,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(threshold > 0, "quorum threshold has to be positive");
        anyhow::ensure!(
            threshold <= size,
            "quorum threshold cannot exceed quorum size"
        );
        Ok(Self {
            kind,
            size,
            threshold,
            round_timeout,
        })
    }

    /// The 3-of-5 quorum used by regtest setups.
    pub fn test() -> Self {
        Self {
            kind: QuorumKind::Test,
            size: 5,
            threshold: 3,
            round_timeout: time::Duration::seconds(60),
        }
    }

    /// The 50-member mainnet quorum with a 60% threshold.
    pub fn type_50_60() -> Self {
        Self {
            kind: QuorumKind::Type50_60,
            size: 50,
            threshold: 30,
            round_timeout: time::Duration::minutes(10),
        }
    }

    /// The 400-member mainnet quorum with a 60% threshold.
    pub fn type_400_60() -> Self {
        Self {
            kind: QuorumKind::Type400_60,
            size: 400,
            threshold: 240,
            round_timeout: time::Duration::minutes(30),
        }
    }

    /// The 400-member mainnet quorum with an 85% threshold.
    pub fn type_400_85() -> Self {
        Self {
            kind: QuorumKind::Type400_85,
            size: 400,
            threshold: 340,
            round_timeout: time::Duration::minutes(30),
        }
    }
}

/// Snapshot of the consensus-agreed feature gates under which a session
/// runs. Queried from the node boundary when a round begins and frozen
/// into the session, so replaying the session log never depends on ambient
/// mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SporkSnapshot {
    /// Whether DKG rounds are enabled network-wide
    /// (`SPORK_17_QUORUM_DKG_ENABLED`).
    pub dkg_enabled: bool,
}

//! Test-only utilities.
use std::collections::BTreeSet;

use llmq_node::testonly::Cluster;
use llmq_roles::{
    masternode::ProTxHash,
    quorum::{Membership, QuorumType, Session, SessionNumber, SporkSnapshot},
};
use rand::Rng;
use zksync_concurrency::ctx;

use crate::{Orchestrator, RoundError, RoundSpec};

/// Test setup: a pool of masternodes and a quorum configuration.
#[derive(Debug, Clone)]
pub struct Setup {
    /// Masternode pool. May be larger than the quorum size.
    pub members: Vec<ProTxHash>,
    /// Quorum configuration under test.
    pub quorum: QuorumType,
}

impl Setup {
    /// New setup with `members` random masternodes and the regtest quorum.
    pub fn new(rng: &mut impl Rng, members: usize) -> Self {
        Self {
            members: (0..members).map(|_| rng.gen()).collect(),
            quorum: QuorumType::test(),
        }
    }

    /// Membership over the first `n` members of the pool.
    pub fn membership(&self, n: usize) -> Membership {
        Membership::new(self.members[..n].iter().copied()).unwrap()
    }

    /// In-memory cluster over the whole pool.
    pub fn cluster(&self) -> Cluster {
        Cluster::new(self.members.iter().copied())
    }
}

/// Builds a sealed session where `committed` members fully participated,
/// `connected` members connected without making it into the commitment,
/// and every other expected member stayed absent.
pub fn sealed_session(
    quorum: &QuorumType,
    number: SessionNumber,
    expected: &Membership,
    committed: &[ProTxHash],
    connected: &[ProTxHash],
) -> Session {
    let commitments: BTreeSet<_> = committed.iter().copied().collect();
    let connections: BTreeSet<_> = commitments.iter().chain(connected).copied().collect();
    Session {
        quorum: quorum.clone(),
        number,
        sporks: SporkSnapshot { dkg_enabled: true },
        expected: expected.clone(),
        connections,
        contributions: commitments.clone(),
        complaints: BTreeSet::new(),
        commitments,
    }
}

/// Drives one simulated DKG round end to end: asks the cluster to produce
/// the events of the round, then runs the orchestrator over them.
pub async fn run_simulated_round(
    ctx: &ctx::Ctx,
    orchestrator: &Orchestrator,
    cluster: &Cluster,
    spec: &RoundSpec,
) -> Result<Session, RoundError> {
    let (send, mut recv) = ctx::channel::unbounded();
    cluster.run_dkg(&spec.members, &send);
    orchestrator.run_round(ctx, spec, &mut recv).await
}

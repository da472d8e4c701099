//! In-memory simulation of a masternode cluster.
use std::{collections::BTreeMap, sync::Arc};

use llmq_roles::{
    masternode::ProTxHash,
    quorum::{DkgEvent, DkgPhase, Membership, SporkSnapshot},
};
use zksync_concurrency::{ctx, sync};

use crate::NodeInterface;

/// Simulated masternode cluster. Tracks which members have networking
/// enabled and the cluster-wide feature-gate state, and can generate the
/// DKG events one round of honest members would produce.
#[derive(Clone, Debug)]
pub struct Cluster(Arc<ClusterInner>);

#[derive(Debug)]
struct ClusterInner {
    members: Vec<ProTxHash>,
    online: sync::watch::Sender<BTreeMap<ProTxHash, bool>>,
    sporks: sync::watch::Sender<SporkSnapshot>,
}

impl Cluster {
    /// New cluster with all members online and DKG disabled.
    pub fn new(members: impl IntoIterator<Item = ProTxHash>) -> Self {
        let members: Vec<_> = members.into_iter().collect();
        let online = members.iter().map(|member| (*member, true)).collect();
        Self(Arc::new(ClusterInner {
            members,
            online: sync::watch::channel(online).0,
            sporks: sync::watch::channel(SporkSnapshot { dkg_enabled: false }).0,
        }))
    }

    /// All members of the cluster, online or not.
    pub fn members(&self) -> &[ProTxHash] {
        &self.0.members
    }

    /// Members that currently have networking enabled.
    pub fn online_members(&self) -> Vec<ProTxHash> {
        let online = self.0.online.borrow();
        self.0
            .members
            .iter()
            .filter(|member| online.get(member).copied().unwrap_or(false))
            .copied()
            .collect()
    }

    /// Sets the cluster-wide feature-gate state, as a spork broadcast
    /// observed by every node would.
    pub fn set_spork(&self, sporks: SporkSnapshot) {
        self.0.sporks.send_replace(sporks);
    }

    /// Generates the events of one DKG round: every online expected member
    /// connects, contributes and commits; if any expected member is
    /// offline, the online ones lodge complaints against it. Offline
    /// members produce nothing.
    pub fn run_dkg(
        &self,
        expected: &Membership,
        events: &ctx::channel::UnboundedSender<DkgEvent>,
    ) {
        let online = self.0.online.borrow();
        let is_online = |member: &ProTxHash| online.get(member).copied().unwrap_or(false);
        let live: Vec<_> = expected.iter().filter(|m| is_online(m)).copied().collect();
        let missing = expected.len() > live.len();
        for phase in DkgPhase::ALL {
            if phase == DkgPhase::Complain && !missing {
                continue;
            }
            for member in &live {
                events.send(DkgEvent {
                    member: *member,
                    phase,
                });
            }
        }
    }
}

#[async_trait::async_trait]
impl NodeInterface for Cluster {
    async fn set_network_active(
        &self,
        _ctx: &ctx::Ctx,
        member: &ProTxHash,
        active: bool,
    ) -> ctx::Result<()> {
        if !self.0.members.contains(member) {
            return Err(anyhow::format_err!("unknown masternode {member:?}").into());
        }
        self.0.online.send_modify(|online| {
            online.insert(*member, active);
        });
        tracing::info!("masternode {member:?} network active = {active}");
        Ok(())
    }

    async fn connection_count(&self, _ctx: &ctx::Ctx, member: &ProTxHash) -> ctx::Result<usize> {
        let online = self.0.online.borrow();
        let Some(active) = online.get(member) else {
            return Err(anyhow::format_err!("unknown masternode {member:?}").into());
        };
        if !active {
            return Ok(0);
        }
        Ok(online.values().filter(|active| **active).count() - 1)
    }

    async fn sporks(&self, _ctx: &ctx::Ctx) -> ctx::Result<SporkSnapshot> {
        Ok(*self.0.sporks.borrow())
    }
}

use std::fmt;

use llmq_roles::{masternode::ProTxHash, quorum::SporkSnapshot};
use zksync_concurrency::{ctx, time};

/// Defines the interface between the PoSe engine and the node process it
/// runs inside.
///
/// Implementations **must** propagate context cancellation.
#[async_trait::async_trait]
pub trait NodeInterface: 'static + fmt::Debug + Send + Sync {
    /// Enables or disables networking for the given masternode.
    /// Used by operators (and tests) to take a member offline.
    async fn set_network_active(
        &self,
        ctx: &ctx::Ctx,
        member: &ProTxHash,
        active: bool,
    ) -> ctx::Result<()>;

    /// Number of peer connections the given masternode currently has.
    /// Polled to confirm that isolation took effect before a round begins.
    async fn connection_count(&self, ctx: &ctx::Ctx, member: &ProTxHash) -> ctx::Result<usize>;

    /// Current feature-gate state as observed by this node.
    async fn sporks(&self, ctx: &ctx::Ctx) -> ctx::Result<SporkSnapshot>;
}

/// Interval between spork polls in [`wait_for_spork_sync`].
const SPORK_POLL_INTERVAL: time::Duration = time::Duration::milliseconds(50);

/// Waits until every node observes the given feature-gate state. Sporks
/// propagate through the network asynchronously, so a DKG round must not
/// begin until all participants agree that it is enabled.
pub async fn wait_for_spork_sync(
    ctx: &ctx::Ctx,
    nodes: &[&dyn NodeInterface],
    want: SporkSnapshot,
) -> ctx::Result<()> {
    loop {
        let mut synced = true;
        for node in nodes {
            if node.sporks(ctx).await? != want {
                synced = false;
                break;
            }
        }
        if synced {
            return Ok(());
        }
        ctx.sleep(SPORK_POLL_INTERVAL).await?;
    }
}

//! Configuration of the PoSe engine.
use llmq_node::NodeInterface;

/// Penalty policy of the PoSe engine. These are consensus parameters: all
/// nodes of a network must run the same values, or they will disagree on
/// who is banned. The defaults follow the reference chain's shape (scale
/// of 100, a failed DKG costs 66, healthy participation forgives 1 per
/// session); compatibility-sensitive deployments must take the exact
/// values from the target network's consensus rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseParams {
    /// Penalty for an expected member that never connected.
    pub full_penalty: u64,
    /// Penalty for a member that connected but did not make it into the
    /// final commitment.
    pub partial_penalty: u64,
    /// Score forgiven per session in which the member fully participated.
    pub recovery_step: u64,
    /// Score at which a member gets banned.
    pub ban_threshold: u64,
}

impl Default for PoseParams {
    fn default() -> Self {
        Self {
            full_penalty: 66,
            partial_penalty: 33,
            recovery_step: 1,
            ban_threshold: 100,
        }
    }
}

/// Configuration of the PoSe engine.
#[derive(Debug)]
pub struct Config {
    /// Penalty policy.
    pub params: PoseParams,
    /// Boundary to the node process hosting the engine.
    pub node: Box<dyn NodeInterface>,
}

/// Sentinel ban height reported while a masternode is not banned.
pub const POSE_BAN_HEIGHT_NONE: i64 = -1;

/// Externally visible PoSe state of a masternode, in the shape reported by
/// the node's `protx info` query: the accumulated penalty score and the
/// height at which the node was banned (or [`POSE_BAN_HEIGHT_NONE`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProTxState {
    /// Accumulated PoSe penalty score. Zero for a healthy masternode.
    pub pose_penalty: u64,
    /// Height of the session that banned this masternode,
    /// or [`POSE_BAN_HEIGHT_NONE`].
    pub pose_ban_height: i64,
}

impl ProTxState {
    /// State of a masternode that has never been penalized.
    pub fn healthy() -> Self {
        Self {
            pose_penalty: 0,
            pose_ban_height: POSE_BAN_HEIGHT_NONE,
        }
    }

    /// Whether the masternode is banned.
    pub fn is_banned(&self) -> bool {
        self.pose_ban_height != POSE_BAN_HEIGHT_NONE
    }
}

use std::collections::{BTreeMap, BTreeSet};

use crate::masternode::ProTxHash;

/// The set of masternodes expected to participate in one DKG session.
/// Members are deduplicated and kept in a deterministic order, so every
/// node deriving penalties from the same session iterates them
/// identically. Note that the order of the given members is NOT preserved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Membership {
    vec: Vec<ProTxHash>,
    indexes: BTreeMap<ProTxHash, usize>,
}

impl Membership {
    /// Creates a new Membership from a list of masternode identifiers.
    pub fn new(members: impl IntoIterator<Item = ProTxHash>) -> anyhow::Result<Self> {
        let mut set = BTreeSet::new();
        for member in members {
            anyhow::ensure!(
                set.insert(member),
                "duplicate masternode in quorum membership"
            );
        }
        anyhow::ensure!(
            !set.is_empty(),
            "quorum membership must contain at least one masternode"
        );
        let vec: Vec<_> = set.into_iter().collect();
        Ok(Self {
            indexes: vec.iter().enumerate().map(|(i, m)| (*m, i)).collect(),
            vec,
        })
    }

    /// Iterates over members.
    pub fn iter(&self) -> impl Iterator<Item = &ProTxHash> {
        self.vec.iter()
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.vec.len()
    }

    /// Returns true if the given masternode belongs to this membership.
    pub fn contains(&self, member: &ProTxHash) -> bool {
        self.indexes.contains_key(member)
    }

    /// Get a member by its index in the membership.
    pub fn get(&self, index: usize) -> Option<&ProTxHash> {
        self.vec.get(index)
    }

    /// Get the index of a member in the membership.
    pub fn index(&self, member: &ProTxHash) -> Option<usize> {
        self.indexes.get(member).copied()
    }
}

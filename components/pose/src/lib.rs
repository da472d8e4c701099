//! This crate contains the Proof-of-Service engine: the accounting that
//! decides, deterministically across all nodes, which quorum members get
//! penalized or banned for failing to participate in DKG rounds.
//!
//! The engine is a strict fold over an ordered log of sealed DKG sessions:
//! the [`SessionTracker`] records what each expected member was observed
//! doing during one round, the [`Ledger`] folds the sealed record into
//! per-member penalty scores, and the ban verdict is a pure function over
//! the ledger state. The [`Orchestrator`] wires the pieces together and
//! drives one round under a deadline.

mod ban;
mod config;
mod ledger;
mod metrics;
mod orchestrator;
mod session;
pub mod testonly;
#[cfg(test)]
mod tests;

pub use crate::{
    ban::{evaluate, BanVerdict},
    config::{Config, PoseParams},
    ledger::{Ledger, LedgerError, LedgerState, MemberEntry, PenaltyDelta},
    orchestrator::{Orchestrator, RoundError, RoundSpec},
    session::{SessionError, SessionState, SessionTracker},
};

//! This crate provides the domain vocabulary of the LLMQ Proof-of-Service
//! engine.
//!
//! The types are split by role:
//! - `masternode`: identity and externally visible PoSe state of a quorum
//!   participant.
//! - `quorum`: quorum configuration (LLMQ types), membership, DKG round
//!   events and the sealed record of one DKG session.

pub mod masternode;
pub mod quorum;

//! Test-only node boundary implementations.
mod in_memory;

pub use in_memory::*;

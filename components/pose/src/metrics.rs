//! Metrics for the PoSe engine.

use std::time::Duration;

use vise::{Buckets, Counter, Histogram, Metrics, Unit};

/// Metrics defined by the PoSe engine.
#[derive(Debug, Metrics)]
#[metrics(prefix = "llmq_pose")]
pub(crate) struct PoseMetrics {
    /// Number of DKG sessions sealed and applied to the ledger.
    pub(crate) sessions_sealed: Counter,
    /// Number of sessions sealed below their quorum signing threshold.
    pub(crate) sessions_below_threshold: Counter,
    /// Number of masternodes banned.
    pub(crate) bans: Counter,
    /// Latency of a full DKG round as driven by the orchestrator.
    #[metrics(buckets = Buckets::exponential(0.125..=64.0, 2.0), unit = Unit::Seconds)]
    pub(crate) round_latency: Histogram<Duration>,
}

/// Global instance of [`PoseMetrics`].
#[vise::register]
pub(crate) static METRICS: vise::Global<PoseMetrics> = vise::Global::new();

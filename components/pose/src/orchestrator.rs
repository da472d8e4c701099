//! Drives DKG rounds and feeds their outcomes into the score ledger.
use std::sync::atomic::{AtomicU64, Ordering};

use llmq_roles::quorum::{DkgEvent, DkgPhase, Membership, QuorumType, Session, SessionNumber};
use zksync_concurrency::{ctx, metrics::LatencyHistogramExt as _, time};

use crate::{
    config::Config,
    ledger::{Ledger, LedgerError},
    metrics,
    session::{SessionError, SessionTracker},
};

/// Specification of one DKG round: the expected member selection and the
/// phase counts the orchestrator waits for before sealing. The counts
/// reflect how many members are believed reachable; members in the
/// selection that never show up are the ones the ledger will penalize.
#[derive(Debug, Clone)]
pub struct RoundSpec {
    /// Quorum configuration to run under.
    pub quorum: QuorumType,
    /// Members expected to participate: the deterministic selection,
    /// including members that may be offline.
    pub members: Membership,
    /// Number of members expected to establish connections.
    pub expected_connections: usize,
    /// Number of members expected to broadcast a contribution.
    pub expected_contributions: usize,
    /// Number of members expected to lodge a complaint.
    pub expected_complaints: usize,
    /// Number of members expected to appear in the final commitment.
    pub expected_commitments: usize,
}

impl RoundSpec {
    /// Round expecting full participation and no complaints.
    pub fn full(quorum: QuorumType, members: Membership) -> Self {
        let n = members.len();
        Self {
            quorum,
            members,
            expected_connections: n,
            expected_contributions: n,
            expected_complaints: 0,
            expected_commitments: n,
        }
    }

    /// Round where only `live` of the expected members are reachable: they
    /// are the only ones that can connect, contribute and commit, and each
    /// of them is expected to complain about the unreachable rest.
    pub fn degraded(quorum: QuorumType, members: Membership, live: usize) -> Self {
        Self {
            quorum,
            members,
            expected_connections: live,
            expected_contributions: live,
            expected_complaints: live,
            expected_commitments: live,
        }
    }

    fn expected_count(&self, phase: DkgPhase) -> usize {
        match phase {
            DkgPhase::Connect => self.expected_connections,
            DkgPhase::Contribute => self.expected_contributions,
            DkgPhase::Complain => self.expected_complaints,
            DkgPhase::Commit => self.expected_commitments,
        }
    }
}

/// Errors that can occur when running a DKG round.
#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    /// DKG rounds are disabled by spork; the round never started.
    #[error("DKG is disabled by spork")]
    DkgDisabled,
    /// The round deadline elapsed before the expected phase counts were
    /// observed. Everything recorded so far is kept; the caller decides
    /// whether to retry.
    #[error("session {number} timed out after {timeout} waiting for the {phase} phase")]
    Timeout {
        /// Height of the timed-out session.
        number: SessionNumber,
        /// The phase whose expected count was not reached.
        phase: DkgPhase,
        /// The deadline that elapsed.
        timeout: time::Duration,
    },
    /// Recording an observed event into the session failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Applying the sealed session to the ledger failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Internal error. Unlike other error types, this one isn't supposed
    /// to be easily recoverable.
    #[error(transparent)]
    Internal(#[from] ctx::Error),
}

impl From<ctx::Canceled> for RoundError {
    fn from(err: ctx::Canceled) -> Self {
        Self::Internal(err.into())
    }
}

/// Orchestrates DKG rounds: begins a session, ingests the events observed
/// by the DKG driver, waits for the expected phase counts under the round
/// deadline, then seals the session and applies it to the ledger.
#[derive(Debug)]
pub struct Orchestrator {
    cfg: Config,
    ledger: Ledger,
    next_session: AtomicU64,
}

impl Orchestrator {
    /// Constructs an orchestrator with an empty ledger.
    pub fn new(cfg: Config) -> anyhow::Result<Self> {
        anyhow::ensure!(
            cfg.params.ban_threshold > 0,
            "ban threshold has to be positive"
        );
        anyhow::ensure!(
            cfg.params.full_penalty >= cfg.params.partial_penalty,
            "full non-participation cannot be cheaper than partial participation"
        );
        Ok(Self {
            ledger: Ledger::new(cfg.params),
            cfg,
            next_session: AtomicU64::new(0),
        })
    }

    /// The score ledger fed by this orchestrator.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Runs one DKG round: checks the spork gate, begins a session over
    /// `spec.members`, records events from `inbound` until every phase
    /// reached its expected count (bounded by the quorum's round timeout),
    /// seals the session and applies it to the ledger.
    ///
    /// A round that falls short of the signing threshold still seals: the
    /// session records reality and the ledger judges each member's
    /// individual fault.
    pub async fn run_round(
        &self,
        ctx: &ctx::Ctx,
        spec: &RoundSpec,
        inbound: &mut ctx::channel::UnboundedReceiver<DkgEvent>,
    ) -> Result<Session, RoundError> {
        let sporks = self.cfg.node.sporks(ctx).await?;
        if !sporks.dkg_enabled {
            return Err(RoundError::DkgDisabled);
        }

        let number = SessionNumber(self.next_session.fetch_add(1, Ordering::SeqCst));
        let tracker = SessionTracker::new(
            spec.quorum.clone(),
            number,
            sporks,
            spec.members.clone(),
        );
        tracing::info!(
            "starting DKG session {number} for quorum {} ({} members)",
            spec.quorum.kind,
            spec.members.len(),
        );

        let started = ctx.now();
        let round_ctx = &ctx.with_timeout(spec.quorum.round_timeout);
        for phase in DkgPhase::ALL {
            let want = spec.expected_count(phase);
            while tracker.phase_count(phase) < want {
                let event = match inbound.recv(round_ctx).await {
                    Ok(event) => event,
                    Err(ctx::Canceled) if ctx.is_active() => {
                        return Err(RoundError::Timeout {
                            number,
                            phase,
                            timeout: spec.quorum.round_timeout,
                        });
                    }
                    Err(err) => return Err(err.into()),
                };
                tracker.record(&event)?;
            }
            tracing::debug!("session {number}: {phase} phase complete");
        }

        let session = tracker.seal();
        if !session.reached_threshold() {
            tracing::warn!(
                "session {number} sealed below threshold ({} of {} commitments)",
                session.commitments.len(),
                spec.quorum.threshold,
            );
            metrics::METRICS.sessions_below_threshold.inc();
        }
        self.ledger.apply(&session)?;
        metrics::METRICS.sessions_sealed.inc();
        metrics::METRICS.round_latency.observe_latency(ctx.now() - started);
        Ok(session)
    }
}

use assert_matches::assert_matches;
use llmq_node::{testonly::Cluster, wait_for_spork_sync, NodeInterface as _};
use llmq_roles::{
    masternode::{ProTxHash, POSE_BAN_HEIGHT_NONE},
    quorum::{DkgEvent, DkgPhase, QuorumKind, QuorumType, SessionNumber, SporkSnapshot},
};
use rand::Rng as _;
use test_casing::test_casing;
use zksync_concurrency::{
    ctx,
    testonly::{abort_on_panic, set_timeout},
    time,
};

use crate::{
    testonly::{run_simulated_round, sealed_session, Setup},
    Config, Ledger, LedgerError, LedgerState, Orchestrator, PoseParams, RoundError, RoundSpec,
    SessionError, SessionTracker,
};

const ENABLED: SporkSnapshot = SporkSnapshot { dkg_enabled: true };

fn new_orchestrator(cluster: &Cluster, params: PoseParams) -> Orchestrator {
    Orchestrator::new(Config {
        params,
        node: Box::new(cluster.clone()),
    })
    .unwrap()
}

#[test]
fn test_tracker_contract() {
    let ctx = ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 5);
    let expected = setup.membership(4);
    let tracker = SessionTracker::new(
        setup.quorum.clone(),
        SessionNumber(0),
        ENABLED,
        expected.clone(),
    );

    let outsider = setup.members[4];
    assert_matches!(
        tracker.record_connection(&outsider),
        Err(SessionError::UnknownMember { member, .. }) => assert_eq!(member, outsider)
    );
    // A random event references a member outside the expected set too.
    let event: DkgEvent = rng.gen();
    assert_matches!(tracker.record(&event), Err(SessionError::UnknownMember { .. }));

    for member in expected.iter() {
        tracker.record_connection(member).unwrap();
        // Recording the same event twice is harmless: subsets, not tallies.
        tracker.record_connection(member).unwrap();
        tracker.record_commitment(member).unwrap();
    }
    tracker.record_complaint(expected.get(0).unwrap()).unwrap();
    assert_eq!(tracker.phase_count(DkgPhase::Connect), 4);
    assert_eq!(tracker.phase_count(DkgPhase::Complain), 1);

    let mut sub = tracker.subscribe();
    assert_eq!(sub.borrow_and_update().phase_count(DkgPhase::Commit), 4);
    assert!(!sub.borrow().is_sealed());

    let session = tracker.seal();
    assert_eq!(session, tracker.seal());
    assert_matches!(
        tracker.record_contribution(expected.get(0).unwrap()),
        Err(SessionError::Sealed { .. })
    );
    assert!(sub.borrow().is_sealed());
    assert_eq!(session.commitments.len(), 4);
    assert!(session.reached_threshold());
}

#[test]
fn test_ledger_penalties_and_recovery() {
    let ctx = ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 3);
    let expected = setup.membership(3);
    let params = PoseParams {
        full_penalty: 66,
        partial_penalty: 33,
        recovery_step: 10,
        ban_threshold: 1000,
    };
    let ledger = Ledger::new(params);
    let committed = setup.members[0];
    let connected = setup.members[1];
    let absent = setup.members[2];

    let session = sealed_session(
        &setup.quorum,
        SessionNumber(0),
        &expected,
        &[committed],
        &[connected],
    );
    let deltas = ledger.apply(&session).unwrap();
    assert_eq!(deltas[&committed].next, 0);
    assert_eq!(deltas[&connected].next, 33);
    assert_eq!(deltas[&absent].next, 66);

    // Full participation forgives `recovery_step`, bounded at zero.
    let session = sealed_session(
        &setup.quorum,
        SessionNumber(1),
        &expected,
        &setup.members,
        &[],
    );
    let deltas = ledger.apply(&session).unwrap();
    assert_eq!(deltas[&committed].next, 0);
    assert_eq!(deltas[&connected].prev, 33);
    assert_eq!(deltas[&connected].next, 23);
    assert_eq!(deltas[&absent].next, 56);

    assert!(!ledger.evaluate(&committed).punished);
    assert!(ledger.evaluate(&connected).punished);
    assert_eq!(ledger.member_state(&absent).pose_penalty, 56);
    assert_eq!(
        ledger.member_state(&absent).pose_ban_height,
        POSE_BAN_HEIGHT_NONE
    );
}

#[test]
fn test_duplicate_application_rejected() {
    let ctx = ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 3);
    let expected = setup.membership(3);
    let ledger = Ledger::new(PoseParams::default());
    let session = sealed_session(
        &setup.quorum,
        SessionNumber(0),
        &expected,
        &setup.members[..2],
        &[],
    );

    ledger.apply(&session).unwrap();
    let before = ledger.snapshot();
    assert_matches!(
        ledger.apply(&session),
        Err(LedgerError::DuplicateSession { number }) => assert_eq!(number, session.number)
    );
    assert_eq!(ledger.snapshot(), before);
}

#[test]
fn test_out_of_order_application_rejected() {
    let ctx = ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 3);
    let expected = setup.membership(3);
    let ledger = Ledger::new(PoseParams::default());

    let newer = sealed_session(&setup.quorum, SessionNumber(5), &expected, &setup.members, &[]);
    let older = sealed_session(&setup.quorum, SessionNumber(3), &expected, &setup.members, &[]);
    ledger.apply(&newer).unwrap();
    let before = ledger.snapshot();
    assert_matches!(
        ledger.apply(&older),
        Err(LedgerError::OutOfOrder { number, last, .. }) => {
            assert_eq!(number, SessionNumber(3));
            assert_eq!(last, SessionNumber(5));
        }
    );
    assert_eq!(ledger.snapshot(), before);
}

#[test]
fn test_score_never_decreases_for_absent_member() {
    let ctx = ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 4);
    let expected = setup.membership(4);
    let ledger = Ledger::new(PoseParams::default());
    let victim = setup.members[3];

    let mut prev = 0;
    for i in 0..10u64 {
        // The victim sometimes connects but never commits.
        let connected: &[ProTxHash] = if i % 2 == 0 { &[victim] } else { &[] };
        let session = sealed_session(
            &setup.quorum,
            SessionNumber(i),
            &expected,
            &setup.members[..3],
            connected,
        );
        ledger.apply(&session).unwrap();
        let score = ledger.member_state(&victim).pose_penalty;
        assert!(score >= prev);
        prev = score;
    }
    assert!(ledger.evaluate(&victim).punished);
}

#[test]
fn test_replay_reproduces_ledger() {
    let ctx = ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 5);
    let expected = setup.membership(5);
    let params = PoseParams::default();
    let ledger = Ledger::new(params);

    let mut sessions = Vec::new();
    for i in 0..8u64 {
        let committed: Vec<_> = setup
            .members
            .iter()
            .copied()
            .filter(|_| rng.gen_bool(0.7))
            .collect();
        sessions.push(sealed_session(
            &setup.quorum,
            SessionNumber(i),
            &expected,
            &committed,
            &[],
        ));
    }
    for session in &sessions {
        ledger.apply(session).unwrap();
    }

    let replayed = Ledger::replay(params, &sessions).unwrap();
    assert_eq!(ledger.snapshot(), replayed.snapshot());
    assert_eq!(ledger.params(), replayed.params());
    for member in &setup.members {
        assert_eq!(ledger.evaluate(member), replayed.evaluate(member));
        // No intervening apply: evaluation is idempotent.
        assert_eq!(ledger.evaluate(member), ledger.evaluate(member));
    }

    let state = ledger.snapshot();
    for i in 0..8u64 {
        assert!(state.is_applied(SessionNumber(i)));
    }
    assert!(!state.is_applied(SessionNumber(8)));
    assert_eq!(state.members().count(), setup.members.len());
}

#[test]
fn test_ban_threshold_boundary() {
    let ctx = ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 2);
    let expected = setup.membership(2);
    let params = PoseParams {
        full_penalty: 1,
        partial_penalty: 1,
        recovery_step: 1,
        ban_threshold: 3,
    };
    let ledger = Ledger::new(params);
    let victim = setup.members[1];

    for i in 0..2u64 {
        let session = sealed_session(
            &setup.quorum,
            SessionNumber(i),
            &expected,
            &setup.members[..1],
            &[],
        );
        ledger.apply(&session).unwrap();
    }
    // One below the threshold: punished, not banned.
    let verdict = ledger.evaluate(&victim);
    assert!(verdict.punished);
    assert!(!verdict.banned);
    assert_eq!(verdict.effective, None);

    // Exactly at the threshold: banned, effective height is this session.
    let session = sealed_session(
        &setup.quorum,
        SessionNumber(2),
        &expected,
        &setup.members[..1],
        &[],
    );
    ledger.apply(&session).unwrap();
    let verdict = ledger.evaluate(&victim);
    assert!(verdict.punished);
    assert!(verdict.banned);
    assert_eq!(verdict.effective, Some(SessionNumber(2)));

    // The ban is sticky: recovering the score down to zero keeps the ban
    // and its original height.
    for i in 3..7u64 {
        let session = sealed_session(
            &setup.quorum,
            SessionNumber(i),
            &expected,
            &setup.members,
            &[],
        );
        ledger.apply(&session).unwrap();
    }
    let verdict = ledger.evaluate(&victim);
    assert!(!verdict.punished);
    assert!(verdict.banned);
    assert_eq!(verdict.effective, Some(SessionNumber(2)));
    assert_eq!(ledger.member_state(&victim).pose_ban_height, 2);
}

#[tokio::test]
async fn test_clean_rounds_leave_members_unpunished() {
    abort_on_panic();
    let _guard = set_timeout(time::Duration::seconds(30));
    let ctx = &ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 6);
    let cluster = setup.cluster();
    let orchestrator = new_orchestrator(&cluster, PoseParams::default());

    cluster.set_spork(ENABLED);
    wait_for_spork_sync(ctx, &[&cluster], ENABLED).await.unwrap();

    let members = setup.membership(5);
    for _ in 0..3 {
        let session = run_simulated_round(
            ctx,
            &orchestrator,
            &cluster,
            &RoundSpec::full(setup.quorum.clone(), members.clone()),
        )
        .await
        .unwrap();
        assert!(session.reached_threshold());
        assert_eq!(session.complaints.len(), 0);
    }
    for member in members.iter() {
        let verdict = orchestrator.ledger().evaluate(member);
        assert!(!verdict.punished);
        assert!(!verdict.banned);
        assert_eq!(orchestrator.ledger().member_state(member).pose_penalty, 0);
    }
}

#[tokio::test]
async fn test_isolated_member_gets_punished_and_banned() {
    abort_on_panic();
    let _guard = set_timeout(time::Duration::seconds(60));
    let ctx = &ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 6);
    let cluster = setup.cluster();
    let orchestrator = new_orchestrator(&cluster, PoseParams::default());

    cluster.set_spork(ENABLED);
    wait_for_spork_sync(ctx, &[&cluster], ENABLED).await.unwrap();

    let members = setup.membership(5);
    let isolated = *members.iter().last().unwrap();
    cluster
        .set_network_active(ctx, &isolated, false)
        .await
        .unwrap();
    while cluster.connection_count(ctx, &isolated).await.unwrap() != 0 {
        ctx.sleep(time::Duration::milliseconds(10)).await.unwrap();
    }

    // The reference scenario bounds the whole escalation by 120 time
    // units; blowing the deadline fails the test.
    let deadline = &ctx.with_timeout(time::Duration::seconds(120));
    let spec = RoundSpec::degraded(setup.quorum.clone(), members.clone(), 4);
    loop {
        let verdict = orchestrator.ledger().evaluate(&isolated);
        if verdict.punished && verdict.banned {
            break;
        }
        run_simulated_round(deadline, &orchestrator, &cluster, &spec)
            .await
            .unwrap();
    }

    let verdict = orchestrator
        .ledger()
        .wait_until_banned(ctx, &isolated)
        .await
        .unwrap();
    assert!(verdict.punished);
    assert!(verdict.banned);
    let effective = verdict.effective.unwrap();
    let state = orchestrator.ledger().member_state(&isolated);
    assert!(state.pose_penalty > 0);
    assert_ne!(state.pose_ban_height, POSE_BAN_HEIGHT_NONE);
    assert!(state.is_banned());

    // The ban is sticky: further rounds cannot move the effective height.
    run_simulated_round(deadline, &orchestrator, &cluster, &spec)
        .await
        .unwrap();
    let verdict = orchestrator.ledger().evaluate(&isolated);
    assert!(verdict.banned);
    assert_eq!(verdict.effective, Some(effective));

    // The members that kept participating stay clean.
    for member in members.iter().filter(|member| **member != isolated) {
        let verdict = orchestrator.ledger().evaluate(member);
        assert!(!verdict.punished);
        assert!(!verdict.banned);
    }
}

#[test_casing(3, [1, 2, 4])]
#[tokio::test]
async fn test_degraded_round_seals_below_expectations(live: usize) {
    abort_on_panic();
    let _guard = set_timeout(time::Duration::seconds(30));
    let ctx = &ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 5);
    let cluster = setup.cluster();
    let orchestrator = new_orchestrator(&cluster, PoseParams::default());

    cluster.set_spork(ENABLED);
    wait_for_spork_sync(ctx, &[&cluster], ENABLED).await.unwrap();

    let members = setup.membership(5);
    let sorted: Vec<_> = members.iter().copied().collect();
    for member in &sorted[live..] {
        cluster.set_network_active(ctx, member, false).await.unwrap();
    }

    let spec = RoundSpec::degraded(setup.quorum.clone(), members, live);
    let session = run_simulated_round(ctx, &orchestrator, &cluster, &spec)
        .await
        .unwrap();
    // A round short of its threshold still seals and still gets judged.
    assert_eq!(session.commitments.len(), live);
    assert_eq!(session.observed(DkgPhase::Complain).len(), live);
    assert_eq!(
        session.reached_threshold(),
        live >= setup.quorum.threshold
    );
    for member in &sorted[live..] {
        let state = orchestrator.ledger().member_state(member);
        assert_eq!(state.pose_penalty, PoseParams::default().full_penalty);
    }
    for member in &sorted[..live] {
        assert_eq!(orchestrator.ledger().member_state(member).pose_penalty, 0);
    }
}

#[tokio::test]
async fn test_round_times_out_when_members_never_show_up() {
    abort_on_panic();
    let _guard = set_timeout(time::Duration::seconds(30));
    let ctx = &ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 5);
    let cluster = setup.cluster();
    let orchestrator = new_orchestrator(&cluster, PoseParams::default());

    cluster.set_spork(ENABLED);
    wait_for_spork_sync(ctx, &[&cluster], ENABLED).await.unwrap();

    let quorum = QuorumType::new(
        QuorumKind::Test,
        5,
        3,
        time::Duration::milliseconds(100),
    )
    .unwrap();
    let spec = RoundSpec::full(quorum, setup.membership(5));

    // The DKG driver never reports anything.
    let (_send, mut recv) = ctx::channel::unbounded();
    let err = orchestrator
        .run_round(ctx, &spec, &mut recv)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        RoundError::Timeout {
            phase: DkgPhase::Connect,
            ..
        }
    );
    // Nothing made it into the ledger.
    assert_eq!(orchestrator.ledger().snapshot(), LedgerState::default());
}

#[tokio::test]
async fn test_round_refuses_when_dkg_disabled() {
    abort_on_panic();
    let ctx = &ctx::test_root(&ctx::RealClock);
    let rng = &mut ctx.rng();
    let setup = Setup::new(rng, 5);
    let cluster = setup.cluster();
    let orchestrator = new_orchestrator(&cluster, PoseParams::default());

    let spec = RoundSpec::full(setup.quorum.clone(), setup.membership(5));
    let (_send, mut recv) = ctx::channel::unbounded();
    let err = orchestrator
        .run_round(ctx, &spec, &mut recv)
        .await
        .unwrap_err();
    assert_matches!(err, RoundError::DkgDisabled);
}

use finova_common::{
    ActivityPayload, ActivityType, CardKind, CloseReason, EventId, EvidenceKind, FinovaError,
    ManualClock, Platform, RewardPolicy, SessionId, TrustEvidence, UserId,
};
use finova_engine::{EngineSettings, LedgerEvent, RateLimitSettings, RewardEngine};
use finova_ledger::{EventLedger, FileStore, LedgerStore, MemoryStore};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3_600);

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn event(id: &str) -> EventId {
    EventId::new(id).unwrap()
}

/// Flat network factor: a fresh user mines 0.05 × 0.8 = 0.04 FIN/s
fn flat_policy() -> RewardPolicy {
    let mut policy = RewardPolicy::default();
    policy.rate.finizen_max = 1.0;
    policy
}

async fn engine_on(
    store: Arc<dyn LedgerStore<LedgerEvent>>,
    settings: EngineSettings,
) -> (RewardEngine, Arc<ManualClock>) {
    let ledger = Arc::new(EventLedger::open(store).await.unwrap());
    let clock = Arc::new(ManualClock::new(0));
    let engine = RewardEngine::new(settings, clock.clone(), ledger).unwrap();
    (engine, clock)
}

async fn engine() -> (RewardEngine, Arc<ManualClock>) {
    engine_on(
        Arc::new(MemoryStore::<LedgerEvent>::new()),
        EngineSettings::new(flat_policy()),
    )
    .await
}

fn biometric(signal: f64) -> TrustEvidence {
    TrustEvidence::new(EvidenceKind::Biometric, signal, 0).with("liveness", 0.9)
}

fn behavioral(signal: f64) -> TrustEvidence {
    TrustEvidence::new(EvidenceKind::Behavioral, signal, 0).with("session_pattern", "human")
}

fn captcha(passed: bool) -> TrustEvidence {
    let signal = if passed { 1.0 } else { -1.0 };
    TrustEvidence::new(EvidenceKind::Captcha, signal, 0)
        .with("challenge_id", "c-1")
        .with("passed", passed)
}

fn assert_rate(engine: &RewardEngine, user_id: &UserId, expected: f64) {
    let rate = engine.get_mining_rate(user_id).unwrap().rate;
    assert!((rate - expected).abs() < 1e-9, "rate {} != {}", rate, expected);
}

#[tokio::test]
async fn test_rate_change_mid_session_accrues_piecewise() {
    let (engine, clock) = engine().await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();

    let started = engine.start_mining(&alice, event("mine-1")).await.unwrap();
    assert!((started.rate - 0.04).abs() < 1e-12);

    clock.advance(HOUR);
    engine
        .submit_trust_evidence(&alice, biometric(1.0), event("bio-1"))
        .await
        .unwrap();
    let update = engine
        .submit_trust_evidence(&alice, behavioral(1.0), event("beh-1"))
        .await
        .unwrap();
    assert!((update.score.score - 0.842).abs() < 1e-3);
    assert_rate(&engine, &alice, 0.05);

    clock.advance(HOUR);
    let update = engine
        .submit_trust_evidence(&alice, biometric(-1.0), event("bio-2"))
        .await
        .unwrap();
    assert!((update.score.score - 0.7678).abs() < 1e-3);
    assert_rate(&engine, &alice, 0.04);

    let session = engine.user_profile(&alice).unwrap().session.unwrap();
    assert!(session.active);
    assert_eq!(session.checkpoints, 3);

    clock.advance(HOUR);
    let stopped = engine.stop_mining(started.session_id).await.unwrap();
    // 3600 × 0.04 + 3600 × 0.05 + 3600 × 0.04
    assert_eq!(stopped.total_mined, dec!(468));
    assert_eq!(stopped.duration_seconds, 10_800);
    assert_eq!(stopped.reason, CloseReason::Stopped);
    assert_eq!(engine.user_profile(&alice).unwrap().available, dec!(468));
}

#[tokio::test]
async fn test_flagged_user_keeps_session_at_zero_rate() {
    let (engine, clock) = engine().await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();
    let started = engine.start_mining(&alice, event("mine-1")).await.unwrap();

    clock.advance(HOUR);
    engine
        .submit_trust_evidence(&alice, biometric(-1.0), event("bio-1"))
        .await
        .unwrap();
    let update = engine
        .submit_trust_evidence(&alice, behavioral(-1.0), event("beh-1"))
        .await
        .unwrap();
    assert!(update.newly_flagged);
    assert!((update.score.score - 0.157).abs() < 1e-3);

    let profile = engine.user_profile(&alice).unwrap();
    assert!(profile.humanity_proof_required);
    assert!(profile.session.as_ref().unwrap().active);
    assert_rate(&engine, &alice, 0.0);

    // The open session is kept, so a second start still conflicts
    assert!(matches!(
        engine.start_mining(&alice, event("mine-2")).await,
        Err(FinovaError::SessionAlreadyActive)
    ));

    clock.advance(HOUR);
    let failed = engine
        .submit_humanity_proof(&alice, captcha(false), event("proof-1"))
        .await
        .unwrap();
    assert!(failed.score.humanity_proof_required);

    let passed = engine
        .submit_humanity_proof(&alice, captcha(true), event("proof-2"))
        .await
        .unwrap();
    assert!(!passed.score.humanity_proof_required);
    assert!((passed.score.score - 0.40).abs() < 1e-9);
    assert_rate(&engine, &alice, 0.04);

    clock.advance(HOUR);
    let stopped = engine.stop_mining(started.session_id).await.unwrap();
    // Nothing accrued during the flagged hour
    assert_eq!(stopped.total_mined, dec!(288));
}

#[tokio::test]
async fn test_flagged_user_cannot_start_mining() {
    let (engine, _clock) = engine().await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();
    engine
        .submit_trust_evidence(&alice, biometric(-1.0), event("bio-1"))
        .await
        .unwrap();
    engine
        .submit_trust_evidence(&alice, behavioral(-1.0), event("beh-1"))
        .await
        .unwrap();

    assert!(matches!(
        engine.start_mining(&alice, event("mine-1")).await,
        Err(FinovaError::HumanityProofRequired)
    ));
    assert!(engine.user_profile(&alice).unwrap().session.is_none());
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let (engine, _clock) = engine().await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();

    engine.start_mining(&alice, event("mine-1")).await.unwrap();
    assert!(matches!(
        engine.start_mining(&alice, event("mine-2")).await,
        Err(FinovaError::SessionAlreadyActive)
    ));
    assert_eq!(engine.network_snapshot().active_sessions, 1);
}

#[tokio::test]
async fn test_session_capped_at_timeout() {
    let mut policy = flat_policy();
    policy.session.timeout_secs = 3_600;
    let (engine, clock) = engine_on(
        Arc::new(MemoryStore::<LedgerEvent>::new()),
        EngineSettings::new(policy),
    )
    .await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();
    let started = engine.start_mining(&alice, event("mine-1")).await.unwrap();

    clock.advance(HOUR * 5);
    let stopped = engine.stop_mining(started.session_id).await.unwrap();
    assert_eq!(stopped.reason, CloseReason::Timeout);
    assert_eq!(stopped.duration_seconds, 3_600);
    assert_eq!(stopped.total_mined, dec!(144));

    let profile = engine.user_profile(&alice).unwrap();
    assert_eq!(profile.available, dec!(144));
    assert_eq!(engine.network_snapshot().active_sessions, 0);
}

#[tokio::test]
async fn test_sweep_closes_expired_sessions() {
    let mut policy = flat_policy();
    policy.session.timeout_secs = 3_600;
    let (engine, clock) = engine_on(
        Arc::new(MemoryStore::<LedgerEvent>::new()),
        EngineSettings::new(policy),
    )
    .await;
    for id in ["alice", "bob"] {
        engine.register_user(user(id), None).await.unwrap();
    }
    engine.start_mining(&user("alice"), event("mine-1")).await.unwrap();

    clock.advance(HOUR * 2);
    let report = engine.sweep().await;
    assert_eq!(report.sessions_closed, 1);
    assert_eq!(engine.network_snapshot().active_sessions, 0);
    assert_eq!(engine.user_profile(&user("alice")).unwrap().available, dec!(144));

    assert_eq!(engine.sweep().await.sessions_closed, 0);
}

#[tokio::test]
async fn test_storage_failure_leaves_state_untouched() {
    let store = Arc::new(MemoryStore::<LedgerEvent>::new());
    let (engine, _clock) = engine_on(store.clone(), EngineSettings::new(flat_policy())).await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();
    let version = engine.user_profile(&alice).unwrap().version;

    store.fail_next_appends(1);
    let result = engine
        .record_activity(
            &alice,
            Platform::App,
            ActivityType::DailyLogin,
            ActivityPayload::new(),
            event("login-1"),
        )
        .await;
    let err = result.unwrap_err();
    assert!(matches!(err, FinovaError::StorageUnavailable(_)));
    assert!(err.is_retryable());

    let profile = engine.user_profile(&alice).unwrap();
    assert_eq!(profile.total_xp, 0);
    assert_eq!(profile.version, version);

    // Retrying with the same event id applies it exactly once
    let outcome = engine
        .record_activity(
            &alice,
            Platform::App,
            ActivityType::DailyLogin,
            ActivityPayload::new(),
            event("login-1"),
        )
        .await
        .unwrap();
    assert!(!outcome.duplicate);
    assert!(outcome.xp_delta.awarded > 0);
    assert_eq!(engine.user_profile(&alice).unwrap().total_xp, outcome.xp_delta.awarded);
    assert_eq!(engine.ledger().len(), 2);
}

#[tokio::test]
async fn test_state_rebuilt_from_file_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");

    let before = {
        let store: Arc<dyn LedgerStore<LedgerEvent>> = Arc::new(FileStore::open(&path).await.unwrap());
        let (engine, clock) = engine_on(store, EngineSettings::new(flat_policy())).await;
        engine.register_user(user("alice"), None).await.unwrap();
        engine.register_user(user("bob"), None).await.unwrap();
        let code = engine.referral_code(&user("alice")).unwrap();
        engine.apply_referral_code(&user("bob"), &code).await.unwrap();

        let started = engine.start_mining(&user("bob"), event("mine-1")).await.unwrap();
        clock.advance(Duration::from_secs(2_500));
        engine.stop_mining(started.session_id).await.unwrap();
        engine
            .record_activity(
                &user("bob"),
                Platform::TikTok,
                ActivityType::OriginalPost,
                ActivityPayload::new().with("content_id", "c-1"),
                event("post-1"),
            )
            .await
            .unwrap();
        engine.start_mining(&user("alice"), event("mine-2")).await.unwrap();

        (
            engine.user_profile(&user("alice")).unwrap(),
            engine.user_profile(&user("bob")).unwrap(),
            engine.network_snapshot().active_sessions,
        )
    };

    let store: Arc<dyn LedgerStore<LedgerEvent>> = Arc::new(FileStore::open(&path).await.unwrap());
    let (engine, clock) = engine_on(store, EngineSettings::new(flat_policy())).await;
    clock.set(2_500_000);

    let alice = engine.user_profile(&user("alice")).unwrap();
    let bob = engine.user_profile(&user("bob")).unwrap();
    assert_eq!(alice, before.0);
    assert_eq!(bob, before.1);
    assert_eq!(bob.available, dec!(100));
    assert_eq!(engine.network_snapshot().total_users, 2);
    assert_eq!(engine.network_snapshot().active_sessions, before.2);

    // Codes and sessions survive the restart
    assert_eq!(
        engine.referral_code(&user("alice")).unwrap(),
        alice.referral_code
    );
    let session = alice.session.unwrap();
    clock.advance(Duration::from_secs(100));
    let stopped = engine.stop_mining(session.session_id).await.unwrap();
    assert_eq!(stopped.total_mined, dec!(4));
}

#[tokio::test]
async fn test_mining_card_boosts_rate_once() {
    let (engine, clock) = engine().await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();

    engine
        .use_card(&alice, CardKind::MiningBoost10, event("card-1"))
        .await
        .unwrap();
    assert_rate(&engine, &alice, 0.044);

    let started = engine.start_mining(&alice, event("mine-1")).await.unwrap();
    clock.advance(Duration::from_secs(1_000));
    let stopped = engine.stop_mining(started.session_id).await.unwrap();
    assert_eq!(stopped.total_mined, dec!(44));

    // Single-use: gone after the session that used it
    assert!(engine.user_profile(&alice).unwrap().cards.is_empty());
}

#[tokio::test]
async fn test_writes_are_rate_limited_per_user() {
    let settings = EngineSettings::new(flat_policy()).with_rate_limit(RateLimitSettings {
        max_ops_per_window: 3,
        window_secs: 60,
    });
    let (engine, clock) = engine_on(Arc::new(MemoryStore::<LedgerEvent>::new()), settings).await;
    let alice = user("alice");
    let bob = user("bob");
    engine.register_user(alice.clone(), None).await.unwrap();
    engine.register_user(bob.clone(), None).await.unwrap();

    for i in 0..3 {
        engine
            .use_card(&alice, CardKind::DoubleMining, event(&format!("card-{}", i)))
            .await
            .unwrap();
    }
    let err = engine
        .use_card(&alice, CardKind::DoubleMining, event("card-3"))
        .await
        .unwrap_err();
    assert!(matches!(err, FinovaError::RateLimited { .. }));
    assert!(err.retry_after().is_some());

    // Replays are answered without spending the budget
    engine
        .use_card(&alice, CardKind::DoubleMining, event("card-0"))
        .await
        .unwrap();
    // Other users are unaffected
    engine
        .use_card(&bob, CardKind::DoubleMining, event("bob-card"))
        .await
        .unwrap();

    clock.advance(Duration::from_secs(60));
    engine
        .use_card(&alice, CardKind::DoubleMining, event("card-3"))
        .await
        .unwrap();
    assert_eq!(engine.user_profile(&alice).unwrap().cards.len(), 4);
}

#[tokio::test]
async fn test_mining_rp_flows_up_the_chain() {
    let (engine, clock) = engine().await;
    for id in ["alice", "bob", "carol"] {
        engine.register_user(user(id), None).await.unwrap();
    }
    let alice_code = engine.referral_code(&user("alice")).unwrap();
    let bob_code = engine.referral_code(&user("bob")).unwrap();
    engine.apply_referral_code(&user("bob"), &alice_code).await.unwrap();
    engine.apply_referral_code(&user("carol"), &bob_code).await.unwrap();

    // Chains may not loop back
    let carol_code = engine.referral_code(&user("carol")).unwrap();
    assert!(matches!(
        engine.apply_referral_code(&user("alice"), &carol_code).await,
        Err(FinovaError::CycleOrDuplicateParent { .. })
    ));

    let started = engine.start_mining(&user("carol"), event("mine-1")).await.unwrap();
    clock.advance(Duration::from_secs(2_500));
    let stopped = engine.stop_mining(started.session_id).await.unwrap();
    assert_eq!(stopped.total_mined, dec!(100));

    // Signup bonus 50, plus 10% of 100 FIN to bob and half that to alice
    let bob = engine.user_profile(&user("bob")).unwrap();
    let alice = engine.user_profile(&user("alice")).unwrap();
    assert!((bob.rp - 60.0).abs() < 1e-6);
    assert!((alice.rp - 55.0).abs() < 1e-6);
    assert_eq!(bob.active_referees, 1);
}

#[tokio::test]
async fn test_bonuses_cannot_lift_rate_past_ceiling() {
    let mut policy = flat_policy();
    policy.rate.max_rate = 0.05;
    let (engine, clock) = engine_on(
        Arc::new(MemoryStore::<LedgerEvent>::new()),
        EngineSettings::new(policy),
    )
    .await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();
    engine
        .use_card(&alice, CardKind::MiningFrenzy, event("card-1"))
        .await
        .unwrap();

    let rate = engine.get_mining_rate(&alice).unwrap();
    assert!(rate.clamped);
    assert!(rate.bonuses.final_value > 0.05);
    assert_rate(&engine, &alice, 0.05);

    let started = engine.start_mining(&alice, event("mine-1")).await.unwrap();
    assert!((started.rate - 0.05).abs() < 1e-12);
    clock.advance(Duration::from_secs(100));
    let stopped = engine.stop_mining(started.session_id).await.unwrap();
    assert_eq!(stopped.total_mined, dec!(5));
}

#[tokio::test]
async fn test_retried_start_opens_one_session() {
    let (engine, _clock) = engine().await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();

    let first = engine.start_mining(&alice, event("mine-1")).await.unwrap();
    let retry = engine.start_mining(&alice, event("mine-1")).await.unwrap();
    assert_eq!(first, retry);
    assert_eq!(engine.network_snapshot().active_sessions, 1);
    assert_eq!(engine.ledger().len(), 2);

    // A start id cannot be replayed by someone else
    let bob = user("bob");
    engine.register_user(bob.clone(), None).await.unwrap();
    assert!(matches!(
        engine.start_mining(&bob, event("mine-1")).await,
        Err(FinovaError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_stopping_a_closed_session_returns_its_result() {
    let (engine, clock) = engine().await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();

    let started = engine.start_mining(&alice, event("mine-1")).await.unwrap();
    clock.advance(Duration::from_secs(1_000));
    let stopped = engine.stop_mining(started.session_id).await.unwrap();
    assert_eq!(stopped.total_mined, dec!(40));

    clock.advance(HOUR);
    let again = engine.stop_mining(started.session_id).await.unwrap();
    assert_eq!(again, stopped);
    assert_eq!(engine.user_profile(&alice).unwrap().available, dec!(40));

    // Still answered after a newer session replaced it
    let next = engine.start_mining(&alice, event("mine-2")).await.unwrap();
    assert_ne!(next.session_id, started.session_id);
    assert_eq!(engine.stop_mining(started.session_id).await.unwrap(), stopped);

    assert!(matches!(
        engine.stop_mining(SessionId::generate()).await,
        Err(FinovaError::SessionNotActive)
    ));
}

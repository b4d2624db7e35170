use finova_common::{
    ActivityPayload, ActivityType, CardKind, EventId, ManualClock, Platform, RewardPolicy, UserId,
};
use finova_engine::{EngineSettings, LedgerEvent, RewardEngine};
use finova_ledger::{EventLedger, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;

const DEADLINE: Duration = Duration::from_secs(10);

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn event(id: &str) -> EventId {
    EventId::new(id).unwrap()
}

async fn engine() -> Arc<RewardEngine> {
    let ledger = Arc::new(
        EventLedger::open(Arc::new(MemoryStore::<LedgerEvent>::new()))
            .await
            .unwrap(),
    );
    let clock = Arc::new(ManualClock::new(0));
    Arc::new(RewardEngine::new(EngineSettings::new(RewardPolicy::default()), clock, ledger).unwrap())
}

async fn join_all<T: Send + 'static>(mut tasks: JoinSet<T>) -> Vec<T> {
    timeout(DEADLINE, async {
        let mut results = Vec::new();
        while let Some(result) = tasks.join_next().await {
            results.push(result.unwrap());
        }
        results
    })
    .await
    .expect("tasks did not finish")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_event_from_many_tasks_applies_once() {
    let engine = engine().await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let engine = engine.clone();
        let alice = alice.clone();
        tasks.spawn(async move {
            engine
                .record_activity(
                    &alice,
                    Platform::App,
                    ActivityType::DailyLogin,
                    ActivityPayload::new(),
                    event("login-1"),
                )
                .await
                .unwrap()
        });
    }
    let outcomes = join_all(tasks).await;

    assert_eq!(outcomes.iter().filter(|o| !o.duplicate).count(), 1);
    let awarded = outcomes[0].xp_delta.awarded;
    assert!(awarded > 0);
    assert!(outcomes.iter().all(|o| o.xp_delta.awarded == awarded));

    let profile = engine.user_profile(&alice).unwrap();
    assert_eq!(profile.total_xp, awarded);
    assert_eq!(engine.ledger().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_writes_for_one_user_are_serialized() {
    let engine = engine().await;
    let alice = user("alice");
    engine.register_user(alice.clone(), None).await.unwrap();
    let before = engine.user_profile(&alice).unwrap().version;

    let mut tasks = JoinSet::new();
    for i in 0..20 {
        let engine = engine.clone();
        let alice = alice.clone();
        tasks.spawn(async move {
            engine
                .use_card(&alice, CardKind::DoubleMining, event(&format!("card-{}", i)))
                .await
                .unwrap()
        });
    }
    let cards = join_all(tasks).await;

    // No activation overwrote another
    let profile = engine.user_profile(&alice).unwrap();
    assert_eq!(profile.cards.len(), 20);
    assert_eq!(profile.version, before + 20);
    for card in &cards {
        assert!(profile.cards.iter().any(|c| c.card_id == card.card_id));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_descendants_share_an_ancestor_chain() {
    let engine = engine().await;
    for id in ["alice", "bob"] {
        engine.register_user(user(id), None).await.unwrap();
    }
    let alice_code = engine.referral_code(&user("alice")).unwrap();
    engine.apply_referral_code(&user("bob"), &alice_code).await.unwrap();

    let bob_code = engine.referral_code(&user("bob")).unwrap();
    let children: Vec<UserId> = (0..12).map(|i| user(&format!("child-{}", i))).collect();
    for child in &children {
        engine.register_user(child.clone(), None).await.unwrap();
        engine.apply_referral_code(child, &bob_code).await.unwrap();
    }
    let bob_before = engine.user_profile(&user("bob")).unwrap().rp;
    let alice_before = engine.user_profile(&user("alice")).unwrap().rp;

    let mut tasks = JoinSet::new();
    for (i, child) in children.into_iter().enumerate() {
        let engine = engine.clone();
        tasks.spawn(async move {
            engine
                .record_activity(
                    &child,
                    Platform::TikTok,
                    ActivityType::OriginalPost,
                    ActivityPayload::new().with("content_id", format!("c-{}", i)),
                    event(&format!("post-{}", i)),
                )
                .await
                .unwrap()
        });
    }
    let outcomes = join_all(tasks).await;

    let credited = |ancestor: &str| -> f64 {
        outcomes
            .iter()
            .flat_map(|o| o.referral_points.iter())
            .filter(|d| d.ancestor.as_str() == ancestor)
            .map(|d| d.points)
            .sum()
    };
    let bob = engine.user_profile(&user("bob")).unwrap();
    let alice = engine.user_profile(&user("alice")).unwrap();
    assert!(credited("bob") > 0.0);
    assert!((bob.rp - bob_before - credited("bob")).abs() < 1e-9);
    assert!((alice.rp - alice_before - credited("alice")).abs() < 1e-9);
}

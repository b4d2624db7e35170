use finova_common::{EventId, UserId, UserState};
use finova_ledger::{EventLedger, FileStore, LedgerStore, UserDelta};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
enum AuditEvent {
    Mined { amount: String },
    Note(String),
}

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger").join("events.jsonl");

    {
        let store: Arc<dyn LedgerStore<AuditEvent>> = Arc::new(FileStore::open(&path).await.unwrap());
        let ledger = EventLedger::open(store).await.unwrap();

        let mut state = UserState::new(user("alice"), 10);
        state.wallet.credit(dec!(1.25)).unwrap();
        ledger
            .append(
                EventId::new("mine-1").unwrap(),
                user("alice"),
                10,
                AuditEvent::Mined {
                    amount: "1.25".to_string(),
                },
                vec![UserDelta::state(state).with_fin(dec!(1.25))],
            )
            .await
            .unwrap();
        ledger
            .append(
                EventId::new("note-1").unwrap(),
                user("bob"),
                20,
                AuditEvent::Note("hello".to_string()),
                vec![],
            )
            .await
            .unwrap();
    }

    let store: Arc<dyn LedgerStore<AuditEvent>> = Arc::new(FileStore::open(&path).await.unwrap());
    let ledger = EventLedger::open(store).await.unwrap();

    assert_eq!(ledger.len(), 2);
    ledger.verify_chain().unwrap();

    let entry = ledger.get(&EventId::new("mine-1").unwrap()).unwrap();
    assert_eq!(entry.sequence, 1);
    let delta = entry.delta_for(&user("alice")).unwrap();
    assert_eq!(delta.fin, dec!(1.25));
    assert_eq!(delta.after.wallet.available, dec!(1.25));

    // Sequence continues after reopen
    let outcome = ledger
        .append(
            EventId::new("note-2").unwrap(),
            user("bob"),
            30,
            AuditEvent::Note("again".to_string()),
            vec![],
        )
        .await
        .unwrap();
    assert_eq!(outcome.entry().sequence, 3);
}

#[tokio::test]
async fn test_tampered_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");

    {
        let store: Arc<dyn LedgerStore<AuditEvent>> = Arc::new(FileStore::open(&path).await.unwrap());
        let ledger = EventLedger::open(store).await.unwrap();
        ledger
            .append(
                EventId::new("note-1").unwrap(),
                user("bob"),
                20,
                AuditEvent::Note("original".to_string()),
                vec![],
            )
            .await
            .unwrap();
    }

    let raw = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, raw.replace("original", "tampered")).unwrap();

    let store: Arc<dyn LedgerStore<AuditEvent>> = Arc::new(FileStore::open(&path).await.unwrap());
    assert!(EventLedger::open(store).await.is_err());
}

// Task log persistence tests

use std::sync::Arc;

use eventline_core::{Event, EventContext, Item, Properties};
use eventline_storage::{
    task_log, FileKeyValueStore, InMemoryKeyValueStore, StoreError, TaskLog, TASK_LOG_KEY,
};

fn event(name: &str, ts: i64) -> Event {
    Event::new(
        name,
        ts,
        EventContext {
            user_id: Some("user-1".to_string()),
            session_id: Some("session-1".to_string()),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_round_trip_preserves_order_and_flags() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let log = TaskLog::new(store.clone());

    let mut props = Properties::new();
    props.insert("screen".to_string(), "home".to_string());

    let first = event("launch", 1);
    let mut second = event("click", 2).with_properties(Some(props));
    second.link_previous(&first);
    second.mark_sent();
    let third = event("purchase", 3).with_items(vec![Item::new("sku", "Shoes", 10.0, 1)]);

    let events = vec![first, second, third];
    log.store(&events).await.unwrap();

    let loaded = log.load().await;
    assert_eq!(loaded, events);
    assert!(store.snapshot(TASK_LOG_KEY).is_some());
}

#[tokio::test]
async fn test_empty_and_single_lists() {
    let log = TaskLog::new(Arc::new(InMemoryKeyValueStore::new()));

    log.store(&[]).await.unwrap();
    assert!(log.load().await.is_empty());

    let single = vec![event("click", 10)];
    log.store(&single).await.unwrap();
    assert_eq!(log.load().await, single);
}

#[tokio::test]
async fn test_non_finite_number_keeps_previous_log() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let log = TaskLog::new(store.clone());

    let before = vec![event("click", 1)];
    log.store(&before).await.unwrap();

    let poisoned = event("purchase", 2).with_items(vec![Item::new("sku", "Shoes", f64::NAN, 1)]);
    let err = log
        .store(&[event("click", 1), poisoned, event("open", 3)])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Serialization(_)));

    let context = EventContext {
        session_duration_secs: Some(f64::INFINITY),
        ..Default::default()
    };
    let err = log
        .store(&[Event::new("session_end", 4, context)])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Serialization(_)));

    assert_eq!(log.load().await, before);
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn test_floats_round_trip_exactly() {
    let log = TaskLog::new(Arc::new(InMemoryKeyValueStore::new()));

    let prices = [1.0715660391465826e-75, 0.1 + 0.2, 19.99, 5e-324, f64::MAX];
    let items = prices
        .iter()
        .enumerate()
        .map(|(i, price)| Item::new(format!("sku-{i}"), "Item", *price, 1));
    let context = EventContext {
        session_duration_secs: Some(2.0f64.sqrt()),
        ..Default::default()
    };
    let events = vec![Event::new("purchase", 1, context).with_items(items)];

    log.store(&events).await.unwrap();
    let loaded = log.load().await;
    assert_eq!(loaded, events);

    let stored: Vec<f64> = loaded[0]
        .purchased_items()
        .unwrap()
        .iter()
        .map(|item| item.price)
        .collect();
    assert_eq!(stored, prices);
}

#[tokio::test]
async fn test_corrupt_log_loads_empty() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let log = TaskLog::new(store.clone());

    store.seed(TASK_LOG_KEY, "not base64 at all!");
    assert!(log.load().await.is_empty());

    // Valid base64 wrapping something that is not an event list
    store.seed(TASK_LOG_KEY, "eyJmb28iOiAxfQ==");
    assert!(log.load().await.is_empty());
}

#[tokio::test]
async fn test_unknown_fields_are_ignored() {
    use base64::Engine;

    let raw = serde_json::json!([
        {"event_name": "click", "timestamp_millis": 5, "sent": false, "future_field": {"x": 1}},
    ]);
    let encoded = base64::engine::general_purpose::STANDARD.encode(raw.to_string());

    let events = task_log::decode(&encoded).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_name(), "click");
    assert_eq!(events[0].timestamp_millis(), 5);
}

#[tokio::test]
async fn test_file_backed_log_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let events = vec![event("launch", 1), event("click", 2)];

    {
        let store = Arc::new(FileKeyValueStore::open(dir.path()).await.unwrap());
        TaskLog::new(store).store(&events).await.unwrap();
    }

    let store = Arc::new(FileKeyValueStore::open(dir.path()).await.unwrap());
    assert_eq!(TaskLog::new(store).load().await, events);
}

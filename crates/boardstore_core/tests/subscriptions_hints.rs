use boardstore_core::{
    BlockType, NotificationHint, SqliteStore, Store, SubscriberType, Subscription,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn setup() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

fn subscribe(store: &SqliteStore, block_id: &str, subscriber_id: &str) -> Subscription {
    store
        .create_subscription(&Subscription::new(
            BlockType::Card,
            block_id,
            SubscriberType::User,
            subscriber_id,
        ))
        .unwrap()
}

#[test]
fn create_get_and_list_subscriptions() {
    let store = setup();
    let created = subscribe(&store, "card-1", "user-1");
    assert!(created.create_at > 0);
    assert_eq!(created.notified_at, created.create_at);
    assert_eq!(created.delete_at, 0);

    subscribe(&store, "card-1", "user-2");
    subscribe(&store, "card-2", "user-1");

    assert_eq!(
        store.get_subscription("card-1", "user-1").unwrap(),
        created
    );
    assert_eq!(store.get_subscriptions("user-1").unwrap().len(), 2);

    let subscribers = store.get_subscribers_for_block("card-1").unwrap();
    let ids: Vec<&str> = subscribers
        .iter()
        .map(|s| s.subscriber_id.as_str())
        .collect();
    assert_eq!(ids, vec!["user-1", "user-2"]);
    assert_eq!(store.get_subscribers_count_for_block("card-1").unwrap(), 2);

    assert!(store
        .get_subscription("card-9", "user-1")
        .unwrap_err()
        .is_not_found());
}

#[test]
fn delete_is_soft_and_create_revives() {
    let store = setup();
    subscribe(&store, "card-1", "user-1");

    store.delete_subscription("card-1", "user-1").unwrap();
    store.delete_subscription("card-1", "user-1").unwrap();
    store.delete_subscription("card-9", "nobody").unwrap();
    assert!(store
        .get_subscription("card-1", "user-1")
        .unwrap_err()
        .is_not_found());
    assert_eq!(store.get_subscribers_count_for_block("card-1").unwrap(), 0);

    let revived = subscribe(&store, "card-1", "user-1");
    assert_eq!(revived.delete_at, 0);
    assert_eq!(store.get_subscribers_count_for_block("card-1").unwrap(), 1);
}

#[test]
fn update_notified_at_touches_live_subscribers() {
    let store = setup();
    subscribe(&store, "card-1", "user-1");
    subscribe(&store, "card-1", "user-2");

    store.update_subscribers_notified_at("card-1", 42).unwrap();
    let subscribers = store.get_subscribers_for_block("card-1").unwrap();
    assert!(subscribers.iter().all(|s| s.notified_at == 42));
}

#[test]
fn upsert_hint_schedules_and_postpones() {
    let store = setup();
    let hint = NotificationHint::new(BlockType::Card, "card-1", "user-1");

    let first = store
        .upsert_notification_hint(&hint, Duration::from_secs(60))
        .unwrap();
    assert!(first.notify_at >= first.create_at + 60_000);

    let second = store
        .upsert_notification_hint(&hint, Duration::from_secs(120))
        .unwrap();
    assert_eq!(second.create_at, first.create_at);
    assert!(second.notify_at > first.notify_at);
    assert_eq!(store.get_notification_hint("card-1").unwrap(), second);

    store.delete_notification_hint("card-1").unwrap();
    store.delete_notification_hint("card-1").unwrap();
    assert!(store
        .get_notification_hint("card-1")
        .unwrap_err()
        .is_not_found());
}

#[test]
fn next_hint_is_earliest_and_remove_dequeues() {
    let store = setup();
    assert!(store
        .get_next_notification_hint(false)
        .unwrap_err()
        .is_not_found());

    store
        .upsert_notification_hint(
            &NotificationHint::new(BlockType::Card, "late", "user-1"),
            Duration::from_secs(600),
        )
        .unwrap();
    store
        .upsert_notification_hint(
            &NotificationHint::new(BlockType::Card, "early", "user-1"),
            Duration::from_secs(1),
        )
        .unwrap();

    assert_eq!(
        store.get_next_notification_hint(false).unwrap().block_id,
        "early"
    );
    assert_eq!(
        store.get_next_notification_hint(true).unwrap().block_id,
        "early"
    );
    assert_eq!(
        store.get_next_notification_hint(true).unwrap().block_id,
        "late"
    );
    assert!(store
        .get_next_notification_hint(true)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn concurrent_dequeue_returns_each_hint_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("hints.db")).unwrap());
    let total = 40;
    for index in 0..total {
        store
            .upsert_notification_hint(
                &NotificationHint::new(BlockType::Card, format!("card-{index:02}"), "user-1"),
                Duration::from_millis(index),
            )
            .unwrap();
    }

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut claimed = Vec::new();
                loop {
                    match store.get_next_notification_hint(true) {
                        Ok(hint) => claimed.push(hint.block_id),
                        Err(err) if err.is_not_found() => break,
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }
                claimed
            })
        })
        .collect();

    let mut seen = HashSet::new();
    let mut count = 0;
    for worker in workers {
        for block_id in worker.join().unwrap() {
            assert!(seen.insert(block_id), "hint dequeued twice");
            count += 1;
        }
    }
    assert_eq!(count, total);
}

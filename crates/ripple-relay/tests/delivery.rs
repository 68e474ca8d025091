/// Integration tests for the persist -> publish -> fan-out path: a message is
/// written once, expanded, and pushed to every live channel the recipient
/// holds, while the store keeps exactly one row.
use std::sync::Arc;

use uuid::Uuid;

use ripple_db::Database;
use ripple_relay::{Publisher, Registry};
use ripple_types::events::PushEvent;
use ripple_types::models::MessageContent;

fn seed_user(db: &Database, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.create_user(&id.to_string(), name, "hash").unwrap();
    id
}

#[tokio::test]
async fn one_send_reaches_every_device_and_stores_once() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let registry = Registry::new();
    let publisher = Publisher::new(db.clone(), registry.clone());

    let ana = seed_user(&db, "ana");
    let bo = seed_user(&db, "bo");

    // Bo has two sessions open
    let (_c1, mut device1) = registry.register(bo);
    let (_c2, mut device2) = registry.register(bo);

    let stored = db
        .insert_message(
            Uuid::new_v4(),
            ana,
            bo,
            &MessageContent::Text { text: "hi".into() },
        )
        .unwrap();
    publisher.publish_created(stored.id).await;

    for rx in [&mut device1, &mut device2] {
        match rx.recv().await {
            Some(PushEvent::Message(envelope)) => {
                assert_eq!(envelope.id, stored.id);
                assert_eq!(envelope.from.username, "ana");
                assert_eq!(envelope.to.id, bo);
            }
            other => panic!("expected message event, got {:?}", other),
        }
    }

    // The store side never duplicated anything
    let pulled = db.messages_between(bo, ana).unwrap();
    assert_eq!(pulled.len(), 1);
    assert_eq!(pulled[0].id, stored.id);
}

#[tokio::test]
async fn offline_recipient_loses_nothing_durable() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let registry = Registry::new();
    let publisher = Publisher::new(db.clone(), registry.clone());

    let ana = seed_user(&db, "ana");
    let bo = seed_user(&db, "bo");

    let stored = db
        .insert_message(
            Uuid::new_v4(),
            ana,
            bo,
            &MessageContent::Text { text: "hello?".into() },
        )
        .unwrap();

    // No channels registered: broadcast is a silent no-op
    publisher.publish_created(stored.id).await;

    let pulled = db.messages_between(bo, ana).unwrap();
    assert_eq!(pulled.len(), 1);
}

#[tokio::test]
async fn missing_sender_record_drops_broadcast_not_message() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let registry = Registry::new();
    let publisher = Publisher::new(db.clone(), registry.clone());

    let ana = seed_user(&db, "ana");
    let bo = seed_user(&db, "bo");
    let (_c, mut device) = registry.register(bo);

    let stored = db
        .insert_message(
            Uuid::new_v4(),
            ana,
            bo,
            &MessageContent::Text { text: "hi".into() },
        )
        .unwrap();

    // Sender account removed between persist and publish
    db.with_conn(|conn| {
        conn.execute("DELETE FROM users WHERE id = ?1", [ana.to_string()])?;
        Ok(())
    })
    .unwrap();

    publisher.publish_created(stored.id).await;

    // No push arrived, but the row is still there
    assert!(device.try_recv().is_err());
    let rows = db.messages_between(bo, ana).unwrap();
    assert_eq!(rows.len(), 1);
}

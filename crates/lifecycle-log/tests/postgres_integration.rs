//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p lifecycle-log --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use lifecycle_log::{
    Actor, AppendOptions, ItemId, LifecycleEvent, LifecycleEventType, LifecycleLogError,
    LifecycleQuery, LifecycleStore, LifecycleStoreExt, NotificationChannel, NotificationOutcome,
    OrderId, PostgresLifecycleStore, Sequence,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_lifecycle_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh pool per test. Tables are emptied with TRUNCATE, which the
/// append-only trigger (row-level UPDATE/DELETE) does not block.
async fn get_test_store() -> PostgresLifecycleStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE notification_attempts, lifecycle_events")
        .execute(&pool)
        .await
        .unwrap();

    PostgresLifecycleStore::new(pool)
}

fn event(
    order_id: OrderId,
    item_id: Option<ItemId>,
    seq: i64,
    event_type: LifecycleEventType,
    actor: Actor,
) -> LifecycleEvent {
    LifecycleEvent::builder()
        .order_id(order_id)
        .item_id(item_id)
        .sequence(Sequence::new(seq))
        .event_type(event_type)
        .triggered_by(actor)
        .payload_raw(serde_json::json!({"seq": seq}))
        .metadata("source", serde_json::json!("test"))
        .try_build()
        .unwrap()
}

fn placed(order_id: OrderId) -> LifecycleEvent {
    event(
        order_id,
        None,
        1,
        LifecycleEventType::OrderPlaced,
        Actor::customer("cust-1"),
    )
}

#[tokio::test]
async fn append_and_read_back() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    let seq = store
        .append_event(placed(order_id), AppendOptions::expect_new())
        .await
        .unwrap();
    assert_eq!(seq, Sequence::first());

    let events = store.events_for_order(order_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, LifecycleEventType::OrderPlaced);
    assert_eq!(events[0].triggered_by, Actor::customer("cust-1"));
    assert_eq!(events[0].payload, serde_json::json!({"seq": 1}));
    assert_eq!(
        events[0].metadata.get("source"),
        Some(&serde_json::json!("test"))
    );
    assert!(events[0].notifications.is_empty());
}

#[tokio::test]
async fn batch_append_is_atomic() {
    let store = get_test_store().await;
    let order_id = OrderId::new();
    let item_id = ItemId::new();

    let batch = vec![
        placed(order_id),
        event(
            order_id,
            Some(item_id),
            2,
            LifecycleEventType::ItemClaimed,
            Actor::merchant(&"m-1".into()),
        ),
        event(
            order_id,
            None,
            3,
            LifecycleEventType::OrderStatusChanged,
            Actor::merchant(&"m-1".into()),
        ),
    ];
    let seq = store.append(batch, AppendOptions::expect_new()).await.unwrap();
    assert_eq!(seq, Sequence::new(3));

    let stored = store.events_for_order(order_id).await.unwrap();
    let sequences: Vec<i64> = stored.iter().map(|e| e.sequence.as_i64()).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert_eq!(stored[1].item_id, Some(item_id));
}

#[tokio::test]
async fn stale_expected_sequence_conflicts() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    store
        .append_event(placed(order_id), AppendOptions::expect_new())
        .await
        .unwrap();

    let late = event(
        order_id,
        None,
        2,
        LifecycleEventType::OrderStatusChanged,
        Actor::system(),
    );
    let err = store
        .append_event(late, AppendOptions::expect_new())
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleLogError::ConcurrencyConflict { .. }));
    assert_eq!(
        store.current_sequence(order_id).await.unwrap(),
        Some(Sequence::first())
    );
}

#[tokio::test]
async fn concurrent_appends_at_same_sequence_admit_one() {
    let store = Arc::new(get_test_store().await);
    let order_id = OrderId::new();
    let item_id = ItemId::new();

    store
        .append_event(placed(order_id), AppendOptions::expect_new())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..6 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let claim = event(
                order_id,
                Some(item_id),
                2,
                LifecycleEventType::ItemClaimed,
                Actor::merchant(&format!("m-{i}").into()),
            );
            store
                .append_event(claim, AppendOptions::expect_sequence(Sequence::first()))
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LifecycleLogError::ConcurrencyConflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.events_for_order(order_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn events_from_sequence() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    let batch = (1..=3)
        .map(|seq| {
            event(
                order_id,
                None,
                seq,
                LifecycleEventType::OrderStatusChanged,
                Actor::system(),
            )
        })
        .collect();
    store.append(batch, AppendOptions::new()).await.unwrap();

    let tail = store
        .events_for_order_from(order_id, Sequence::new(2))
        .await
        .unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].sequence, Sequence::new(2));
}

#[tokio::test]
async fn query_by_item_type_and_actor() {
    let store = get_test_store().await;
    let order_id = OrderId::new();
    let item_a = ItemId::new();
    let item_b = ItemId::new();

    let batch = vec![
        placed(order_id),
        event(
            order_id,
            Some(item_a),
            2,
            LifecycleEventType::ItemClaimed,
            Actor::merchant(&"m-1".into()),
        ),
        event(
            order_id,
            Some(item_b),
            3,
            LifecycleEventType::ItemRejected,
            Actor::merchant(&"m-2".into()),
        ),
        event(
            order_id,
            Some(item_a),
            4,
            LifecycleEventType::ItemStatusChanged,
            Actor::merchant(&"m-1".into()),
        ),
    ];
    store.append(batch, AppendOptions::expect_new()).await.unwrap();

    let for_item = store
        .query_events(LifecycleQuery::for_order(order_id).item_id(item_a))
        .await
        .unwrap();
    assert_eq!(for_item.len(), 2);

    let rejections = store
        .query_events(LifecycleQuery::new().event_type(LifecycleEventType::ItemRejected))
        .await
        .unwrap();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].item_id, Some(item_b));

    let by_actor = store
        .query_events(LifecycleQuery::new().actor_id("m-1").limit(1))
        .await
        .unwrap();
    assert_eq!(by_actor.len(), 1);
    assert_eq!(by_actor[0].event_type, LifecycleEventType::ItemClaimed);
}

#[tokio::test]
async fn notifications_attach_latest_attempt_per_channel() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    store
        .append_event(placed(order_id), AppendOptions::expect_new())
        .await
        .unwrap();
    let event_id = store.events_for_order(order_id).await.unwrap()[0].event_id;

    store
        .record_notification(
            event_id,
            NotificationChannel::Email,
            NotificationOutcome::failed("smtp down"),
        )
        .await
        .unwrap();
    store
        .record_notification(
            event_id,
            NotificationChannel::Email,
            NotificationOutcome::delivered(),
        )
        .await
        .unwrap();

    let events = store.events_for_order(order_id).await.unwrap();
    let email = events[0]
        .notifications
        .get(&NotificationChannel::Email)
        .unwrap();
    assert!(email.attempted);
    assert!(email.succeeded);
    assert!(!events[0].notifications.contains_key(&NotificationChannel::Sms));
}

#[tokio::test]
async fn notification_for_unknown_event_fails() {
    let store = get_test_store().await;

    let err = store
        .record_notification(
            lifecycle_log::EventId::new(),
            NotificationChannel::Push,
            NotificationOutcome::delivered(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleLogError::EventNotFound(_)));
}

#[tokio::test]
async fn log_rejects_updates() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    store
        .append_event(placed(order_id), AppendOptions::expect_new())
        .await
        .unwrap();

    let result = sqlx::query("UPDATE lifecycle_events SET event_type = 'order_cancelled'")
        .execute(store.pool())
        .await;
    assert!(result.is_err());

    let result = sqlx::query("DELETE FROM lifecycle_events")
        .execute(store.pool())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn stream_all_in_insertion_order() {
    use futures_util::StreamExt;

    let store = get_test_store().await;
    let first = OrderId::new();
    let second = OrderId::new();

    store
        .append_event(placed(first), AppendOptions::expect_new())
        .await
        .unwrap();
    store
        .append_event(placed(second), AppendOptions::expect_new())
        .await
        .unwrap();

    let stream = store.stream_all_events().await.unwrap();
    let events: Vec<_> = stream.collect().await;
    let order_ids: Vec<OrderId> = events.into_iter().map(|e| e.unwrap().order_id).collect();
    assert_eq!(order_ids, vec![first, second]);
}

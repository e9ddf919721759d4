use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Actor, ActorRole, EventId, ItemId, LifecycleEvent, LifecycleEventType, LifecycleLogError,
    LifecycleQuery, NotificationChannel, NotificationOutcome, NotificationRecord, OrderId, Result,
    Sequence,
    store::{AppendOptions, EventStream, LifecycleStore, validate_events_for_append},
};

const EVENT_COLUMNS: &str = "id, order_id, item_id, sequence, event_type, actor_id, actor_role, timestamp, payload, metadata";

/// PostgreSQL-backed lifecycle store.
///
/// `UNIQUE (order_id, sequence)` is the final arbiter between concurrent
/// appends; a trigger installed by the migration rejects UPDATE and DELETE.
#[derive(Clone)]
pub struct PostgresLifecycleStore {
    pool: PgPool,
}

impl PostgresLifecycleStore {
    /// Creates a new PostgreSQL lifecycle store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_event(row: PgRow) -> Result<LifecycleEvent> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        let event_type: String = row.try_get("event_type")?;
        let event_type = LifecycleEventType::parse(&event_type)
            .ok_or_else(|| LifecycleLogError::CorruptRecord(format!("event_type {event_type}")))?;

        let actor_role: String = row.try_get("actor_role")?;
        let actor_role = ActorRole::parse(&actor_role)
            .ok_or_else(|| LifecycleLogError::CorruptRecord(format!("actor_role {actor_role}")))?;

        Ok(LifecycleEvent {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            item_id: row
                .try_get::<Option<Uuid>, _>("item_id")?
                .map(ItemId::from_uuid),
            sequence: Sequence::new(row.try_get("sequence")?),
            event_type,
            timestamp: row.try_get("timestamp")?,
            triggered_by: Actor::new(row.try_get::<String, _>("actor_id")?, actor_role),
            payload: row.try_get("payload")?,
            metadata,
            notifications: BTreeMap::new(),
        })
    }

    /// Attaches the latest attempt per channel to each event.
    async fn attach_notifications(&self, events: &mut [LifecycleEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = events.iter().map(|e| e.event_id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (event_id, channel) event_id, channel, succeeded, attempted_at
            FROM notification_attempts
            WHERE event_id = ANY($1)
            ORDER BY event_id, channel, id DESC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_event: HashMap<Uuid, BTreeMap<NotificationChannel, NotificationRecord>> =
            HashMap::new();
        for row in rows {
            let channel: String = row.try_get("channel")?;
            let channel = NotificationChannel::parse(&channel)
                .ok_or_else(|| LifecycleLogError::CorruptRecord(format!("channel {channel}")))?;
            by_event.entry(row.try_get("event_id")?).or_default().insert(
                channel,
                NotificationRecord {
                    attempted: true,
                    succeeded: row.try_get("succeeded")?,
                    attempted_at: Some(row.try_get("attempted_at")?),
                },
            );
        }

        for event in events.iter_mut() {
            if let Some(records) = by_event.remove(&event.event_id.as_uuid()) {
                event.notifications = records;
            }
        }
        Ok(())
    }

    async fn fetch_events(&self, rows: Vec<PgRow>) -> Result<Vec<LifecycleEvent>> {
        let mut events = rows
            .into_iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>>>()?;
        self.attach_notifications(&mut events).await?;
        Ok(events)
    }
}

#[async_trait]
impl LifecycleStore for PostgresLifecycleStore {
    async fn append(
        &self,
        events: Vec<LifecycleEvent>,
        options: AppendOptions,
    ) -> Result<Sequence> {
        validate_events_for_append(&events)?;

        let order_id = events[0].order_id;

        let mut tx = self.pool.begin().await?;

        if let Some(expected) = options.expected_sequence {
            let current: Option<i64> = sqlx::query_scalar(
                "SELECT MAX(sequence) FROM lifecycle_events WHERE order_id = $1",
            )
            .bind(order_id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;

            let actual = Sequence::new(current.unwrap_or(0));
            if actual != expected {
                return Err(LifecycleLogError::ConcurrencyConflict {
                    order_id,
                    expected,
                    actual,
                });
            }
        }

        let mut last_sequence = Sequence::initial();
        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO lifecycle_events
                    (id, order_id, item_id, sequence, event_type, actor_id, actor_role, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(event.order_id.as_uuid())
            .bind(event.item_id.map(|id| id.as_uuid()))
            .bind(event.sequence.as_i64())
            .bind(event.event_type.as_str())
            .bind(&event.triggered_by.actor_id)
            .bind(event.triggered_by.actor_role.as_str())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_order_sequence")
                {
                    return LifecycleLogError::ConcurrencyConflict {
                        order_id,
                        expected: options.expected_sequence.unwrap_or(Sequence::initial()),
                        actual: event.sequence,
                    };
                }
                LifecycleLogError::Database(e)
            })?;

            last_sequence = event.sequence;
        }

        tx.commit().await?;
        Ok(last_sequence)
    }

    async fn events_for_order(&self, order_id: OrderId) -> Result<Vec<LifecycleEvent>> {
        self.events_for_order_from(order_id, Sequence::first()).await
    }

    async fn events_for_order_from(
        &self,
        order_id: OrderId,
        from_sequence: Sequence,
    ) -> Result<Vec<LifecycleEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM lifecycle_events WHERE order_id = $1 AND sequence >= $2 ORDER BY sequence ASC"
        ))
        .bind(order_id.as_uuid())
        .bind(from_sequence.as_i64())
        .fetch_all(&self.pool)
        .await?;

        self.fetch_events(rows).await
    }

    async fn query_events(&self, query: LifecycleQuery) -> Result<Vec<LifecycleEvent>> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM lifecycle_events WHERE 1=1");
        let mut param_count = 0;

        if query.order_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND order_id = ${param_count}"));
        }
        if query.item_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND item_id = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.actor_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND actor_id = ${param_count}"));
        }
        if query.from_sequence.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND sequence >= ${param_count}"));
        }
        if query.to_sequence.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND sequence <= ${param_count}"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp <= ${param_count}"));
        }

        sql.push_str(" ORDER BY timestamp ASC, sequence ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.order_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(id) = query.item_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(event_types) = query.event_types {
            let names: Vec<String> = event_types.iter().map(|t| t.as_str().to_string()).collect();
            sqlx_query = sqlx_query.bind(names);
        }
        if let Some(actor_id) = query.actor_id {
            sqlx_query = sqlx_query.bind(actor_id);
        }
        if let Some(from) = query.from_sequence {
            sqlx_query = sqlx_query.bind(from.as_i64());
        }
        if let Some(to) = query.to_sequence {
            sqlx_query = sqlx_query.bind(to.as_i64());
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        self.fetch_events(rows).await
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM lifecycle_events ORDER BY position ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let events = self.fetch_events(rows).await?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn current_sequence(&self, order_id: OrderId) -> Result<Option<Sequence>> {
        let sequence: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence) FROM lifecycle_events WHERE order_id = $1")
                .bind(order_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(sequence.map(Sequence::new))
    }

    async fn record_notification(
        &self,
        event_id: EventId,
        channel: NotificationChannel,
        outcome: NotificationOutcome,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_attempts (event_id, channel, succeeded, attempted_at, error)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(channel.as_str())
        .bind(outcome.succeeded)
        .bind(outcome.attempted_at)
        .bind(outcome.error)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return LifecycleLogError::EventNotFound(event_id);
            }
            LifecycleLogError::Database(e)
        })?;

        Ok(())
    }
}

//! Command handling infrastructure.
//!
//! A command is evaluated against the aggregate rebuilt from the lifecycle
//! log, and the resulting events are appended on the condition that the
//! order is still at the sequence it was loaded at. When another writer got
//! there first the command is re-evaluated against the fresh state, which is
//! how a lost claim race becomes `AlreadyAssigned` instead of a double
//! assignment.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use common::{Actor, OrderId};
use lifecycle_log::{AppendOptions, LifecycleEvent, LifecycleLogError, LifecycleStore, Sequence};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;
use crate::notification::{LoggingNotifier, Notifier, dispatch_notifications};

/// Default number of attempts before a conflicting command gives up.
pub const DEFAULT_RETRY_LIMIT: u32 = 10;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The persisted lifecycle records of `events`.
    pub records: Vec<LifecycleEvent>,

    /// The order's sequence after the command.
    pub new_sequence: Sequence,
}

/// Trait for commands that target one order.
pub trait Command: Send + Sync {
    type Aggregate: Aggregate;

    fn order_id(&self) -> OrderId;
}

/// Who is executing a command, plus metadata recorded on every event it
/// produces.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub actor: Actor,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ExecutionContext {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Loading the aggregate from the lifecycle log
/// 2. Executing the command to produce events
/// 3. Appending the events with an expected-sequence check, retrying on
///    conflict
/// 4. Dispatching notifications for the committed events
pub struct CommandHandler<S, A>
where
    S: LifecycleStore,
    A: Aggregate,
{
    store: S,
    notifier: Arc<dyn Notifier>,
    retry_limit: u32,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: LifecycleStore,
    A: Aggregate,
{
    /// Creates a handler that logs notifications.
    pub fn new(store: S) -> Self {
        Self::with_notifier(store, Arc::new(LoggingNotifier))
    }

    pub fn with_notifier(store: S, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            retry_limit: DEFAULT_RETRY_LIMIT,
            _phantom: PhantomData,
        }
    }

    /// Sets the attempt budget for conflicting commands (at least 1).
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the lifecycle log.
    ///
    /// If the order has no events, returns a default instance.
    pub async fn load(&self, order_id: OrderId) -> Result<A, DomainError> {
        let records = self.store.events_for_order(order_id).await?;

        let mut aggregate = A::default();
        for record in records {
            let event: A::Event = serde_json::from_value(record.payload)?;
            aggregate.apply(event);
            aggregate.set_sequence(record.sequence);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, order_id: OrderId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(order_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Executes a command that may create the order.
    pub async fn execute<F>(
        &self,
        order_id: OrderId,
        ctx: &ExecutionContext,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.run(order_id, ctx, false, command_fn).await
    }

    /// Executes a command against an order that must already exist.
    pub async fn execute_existing<F>(
        &self,
        order_id: OrderId,
        ctx: &ExecutionContext,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.run(order_id, ctx, true, command_fn).await
    }

    async fn run<F>(
        &self,
        order_id: OrderId,
        ctx: &ExecutionContext,
        require_existing: bool,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        for attempt in 1..=self.retry_limit {
            let mut aggregate = self.load(order_id).await?;
            if require_existing && aggregate.id().is_none() {
                return Err(DomainError::OrderNotFound(order_id));
            }
            let current_sequence = aggregate.sequence();

            let events = command_fn(&aggregate)?;

            if events.is_empty() {
                return Ok(CommandResult {
                    aggregate,
                    events: vec![],
                    records: vec![],
                    new_sequence: current_sequence,
                });
            }

            let records = self.build_records(order_id, current_sequence, &events, ctx)?;

            match self
                .store
                .append(
                    records.clone(),
                    AppendOptions::expect_sequence(current_sequence),
                )
                .await
            {
                Ok(new_sequence) => {
                    metrics::counter!("lifecycle_events_appended_total")
                        .increment(records.len() as u64);

                    for event in &events {
                        aggregate.apply(event.clone());
                    }
                    aggregate.set_sequence(new_sequence);

                    dispatch_notifications(&self.store, self.notifier.as_ref(), &records).await;

                    return Ok(CommandResult {
                        aggregate,
                        events,
                        records,
                        new_sequence,
                    });
                }
                Err(LifecycleLogError::ConcurrencyConflict { actual, .. }) => {
                    metrics::counter!("command_conflict_retries_total").increment(1);
                    tracing::debug!(
                        %order_id,
                        attempt,
                        expected = %current_sequence,
                        %actual,
                        "append conflicted, re-evaluating command"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(%order_id, attempts = self.retry_limit, "command gave up after repeated conflicts");
        Err(DomainError::ConcurrentModification {
            order_id,
            attempts: self.retry_limit,
        })
    }

    /// Builds lifecycle records from domain events.
    fn build_records(
        &self,
        order_id: OrderId,
        current_sequence: Sequence,
        events: &[A::Event],
        ctx: &ExecutionContext,
    ) -> Result<Vec<LifecycleEvent>, DomainError> {
        let mut records = Vec::with_capacity(events.len());
        let mut sequence = current_sequence;

        for event in events {
            sequence = sequence.next();
            let record = LifecycleEvent::builder()
                .order_id(order_id)
                .item_id(event.item_id())
                .sequence(sequence)
                .event_type(event.event_type())
                .timestamp(event.occurred_at())
                .triggered_by(ctx.actor.clone())
                .payload(event)?
                .extend_metadata(ctx.metadata.clone())
                .try_build()
                .ok_or_else(|| {
                    LifecycleLogError::InvalidAppend("incomplete lifecycle event".to_string())
                })?;
            records.push(record);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use common::ItemId;
    use lifecycle_log::{InMemoryLifecycleStore, LifecycleEventType};
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::notification::InMemoryNotifier;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestEvent {
        Created { id: OrderId, at: DateTime<Utc> },
        Updated { value: i32, at: DateTime<Utc> },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> LifecycleEventType {
            match self {
                TestEvent::Created { .. } => LifecycleEventType::OrderPlaced,
                TestEvent::Updated { .. } => LifecycleEventType::OrderStatusChanged,
            }
        }

        fn item_id(&self) -> Option<ItemId> {
            None
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            match self {
                TestEvent::Created { at, .. } | TestEvent::Updated { at, .. } => *at,
            }
        }
    }

    #[derive(Debug, Default, Clone)]
    struct TestAggregate {
        id: Option<OrderId>,
        value: i32,
        sequence: Sequence,
    }

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("invalid value: {0}")]
        InvalidValue(i32),
    }

    impl Aggregate for TestAggregate {
        type Event = TestEvent;
        type Error = TestError;

        fn id(&self) -> Option<OrderId> {
            self.id
        }

        fn sequence(&self) -> Sequence {
            self.sequence
        }

        fn set_sequence(&mut self, sequence: Sequence) {
            self.sequence = sequence;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TestEvent::Created { id, .. } => self.id = Some(id),
                TestEvent::Updated { value, .. } => self.value = value,
            }
        }
    }

    impl From<TestError> for DomainError {
        fn from(e: TestError) -> Self {
            DomainError::Order(crate::order::OrderError::Forbidden(e.to_string()))
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Actor::system())
    }

    fn created(id: OrderId) -> Vec<TestEvent> {
        vec![TestEvent::Created { id, at: Utc::now() }]
    }

    #[tokio::test]
    async fn execute_creates_aggregate() {
        let store = InMemoryLifecycleStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store);
        let order_id = OrderId::new();

        let result = handler
            .execute(order_id, &ctx(), |_| Ok(created(order_id)))
            .await
            .unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.new_sequence, Sequence::first());
        assert_eq!(result.aggregate.id(), Some(order_id));
        assert_eq!(result.records[0].event_type, LifecycleEventType::OrderPlaced);
        assert_eq!(result.records[0].triggered_by, Actor::system());
    }

    #[tokio::test]
    async fn execute_updates_aggregate() {
        let store = InMemoryLifecycleStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store);
        let order_id = OrderId::new();

        handler
            .execute(order_id, &ctx(), |_| Ok(created(order_id)))
            .await
            .unwrap();

        let result = handler
            .execute_existing(order_id, &ctx(), |_| {
                Ok(vec![TestEvent::Updated {
                    value: 42,
                    at: Utc::now(),
                }])
            })
            .await
            .unwrap();

        assert_eq!(result.new_sequence, Sequence::new(2));
        assert_eq!(result.aggregate.value, 42);
    }

    #[tokio::test]
    async fn execute_existing_requires_order() {
        let handler: CommandHandler<_, TestAggregate> =
            CommandHandler::new(InMemoryLifecycleStore::new());

        let result = handler
            .execute_existing(OrderId::new(), &ctx(), |_| Ok(vec![]))
            .await;

        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn command_error_writes_nothing() {
        let store = InMemoryLifecycleStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());

        let result = handler
            .execute(OrderId::new(), &ctx(), |_| Err(TestError::InvalidValue(-1)))
            .await;

        assert!(result.is_err());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn empty_events_returns_without_persisting() {
        let store = InMemoryLifecycleStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());

        let result = handler
            .execute(OrderId::new(), &ctx(), |_| Ok(vec![]))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_sequence, Sequence::initial());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn metadata_is_recorded() {
        let handler: CommandHandler<_, TestAggregate> =
            CommandHandler::new(InMemoryLifecycleStore::new());
        let order_id = OrderId::new();
        let ctx = ctx().with_metadata("mode", serde_json::json!("manual"));

        let result = handler
            .execute(order_id, &ctx, |_| Ok(created(order_id)))
            .await
            .unwrap();

        assert_eq!(
            result.records[0].metadata.get("mode"),
            Some(&serde_json::json!("manual"))
        );
    }

    #[tokio::test]
    async fn conflicting_writers_are_serialized() {
        let store = InMemoryLifecycleStore::new();
        let handler = Arc::new(
            CommandHandler::<_, TestAggregate>::new(store.clone()).with_retry_limit(50),
        );
        let order_id = OrderId::new();
        handler
            .execute(order_id, &ctx(), |_| Ok(created(order_id)))
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for value in 0..8 {
            let handler = handler.clone();
            tasks.push(tokio::spawn(async move {
                handler
                    .execute_existing(order_id, &ctx(), |_| {
                        Ok(vec![TestEvent::Updated {
                            value,
                            at: Utc::now(),
                        }])
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // Every update landed at its own sequence.
        assert_eq!(store.event_count().await, 9);
        let sequences: Vec<i64> = store
            .events_for_order(order_id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.sequence.as_i64())
            .collect();
        assert_eq!(sequences, (1..=9).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn notifications_follow_commit() {
        let store = InMemoryLifecycleStore::new();
        let notifier = InMemoryNotifier::new();
        let handler: CommandHandler<_, TestAggregate> =
            CommandHandler::with_notifier(store.clone(), Arc::new(notifier.clone()));
        let order_id = OrderId::new();

        handler
            .execute(order_id, &ctx(), |_| Ok(created(order_id)))
            .await
            .unwrap();

        assert_eq!(notifier.sent().await.len(), 1);
        assert_eq!(store.notification_attempt_count().await, 1);
    }
}

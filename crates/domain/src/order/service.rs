//! Order service providing a simplified API for order operations.

use std::sync::Arc;

use chrono::Utc;
use common::{Actor, ItemId, OrderId};
use lifecycle_log::{
    LifecycleEvent, LifecycleEventType, LifecycleQuery, LifecycleStore, LifecycleStoreExt,
};
use serde::Deserialize;

use crate::command::{CommandHandler, CommandResult, ExecutionContext};
use crate::error::DomainError;
use crate::pricing::{PriceBreakdown, PricingConfig, PricingLine, SettingsProvider, compute_pricing};

use super::{CancelOrder, Order, PlaceOrder, UpdateItemStatus};

/// Optional narrowing of an order's lifecycle.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LifecycleFilter {
    pub item_id: Option<ItemId>,
    pub event_type: Option<LifecycleEventType>,
}

impl LifecycleFilter {
    fn is_empty(&self) -> bool {
        self.item_id.is_none() && self.event_type.is_none()
    }
}

/// Service for managing orders.
///
/// Wraps the command handler for checkout, status updates and cancellation,
/// and prices carts with the same function checkout uses.
pub struct OrderService<S: LifecycleStore> {
    handler: CommandHandler<S, Order>,
    settings: Arc<dyn SettingsProvider>,
}

impl<S: LifecycleStore> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S, settings: Arc<dyn SettingsProvider>) -> Self {
        Self::from_handler(CommandHandler::new(store), settings)
    }

    pub fn from_handler(handler: CommandHandler<S, Order>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self { handler, settings }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    /// The pricing configuration currently in effect.
    pub async fn pricing_config(&self) -> Result<PricingConfig, DomainError> {
        Ok(self.settings.pricing_config().await?)
    }

    /// Prices a cart without side effects.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn quote(&self, lines: &[PricingLine]) -> Result<PriceBreakdown, DomainError> {
        let config = self.settings.pricing_config().await?;
        let breakdown = compute_pricing(lines, &config)?;
        metrics::counter!("pricing_calculations_total").increment(1);
        Ok(breakdown)
    }

    /// Checkout: validates the lines, prices them and places the order.
    #[tracing::instrument(skip(self, cmd, actor), fields(order_id = %cmd.order_id, actor = %actor))]
    pub async fn place_order(
        &self,
        cmd: PlaceOrder,
        actor: &Actor,
    ) -> Result<CommandResult<Order>, DomainError> {
        let items = Order::build_items(&cmd)?;

        // One read so the breakdown and the minimum gate see the same config.
        let config = self.settings.pricing_config().await?;
        let pricing = compute_pricing(&Order::pricing_lines(&items), &config)?;
        metrics::counter!("pricing_calculations_total").increment(1);

        let ctx = ExecutionContext::new(actor.clone());
        let result = self
            .handler
            .execute(cmd.order_id, &ctx, |order| {
                order.place(&cmd, &items, &pricing, config.minimum_order_value, Utc::now())
            })
            .await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(
            order_number = ?result.aggregate.order_number(),
            total = %result.aggregate.total_amount(),
            "order placed"
        );
        Ok(result)
    }

    /// Gets an order by ID.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.handler
            .load_existing(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))
    }

    /// Moves an item along its lifecycle on behalf of `actor`.
    #[tracing::instrument(
        skip(self, cmd, actor),
        fields(order_id = %cmd.order_id, item_id = %cmd.item_id, to = %cmd.status.as_str(), actor = %actor)
    )]
    pub async fn update_item_status(
        &self,
        cmd: UpdateItemStatus,
        actor: &Actor,
    ) -> Result<CommandResult<Order>, DomainError> {
        let ctx = ExecutionContext::new(actor.clone());
        let result = self
            .handler
            .execute_existing(cmd.order_id, &ctx, |order| {
                order.update_item_status(cmd.item_id, cmd.status, actor, Utc::now())
            })
            .await?;

        metrics::counter!("item_transitions_total", "to" => cmd.status.as_str()).increment(1);
        Ok(result)
    }

    /// Administrative cancellation of every open item.
    #[tracing::instrument(skip(self, cmd, actor), fields(order_id = %cmd.order_id, actor = %actor))]
    pub async fn cancel_order(
        &self,
        cmd: CancelOrder,
        actor: &Actor,
    ) -> Result<CommandResult<Order>, DomainError> {
        let mut ctx = ExecutionContext::new(actor.clone());
        if let Some(reason) = &cmd.reason {
            ctx = ctx.with_metadata("reason", serde_json::json!(reason));
        }

        self.handler
            .execute_existing(cmd.order_id, &ctx, |order| {
                order.cancel(cmd.reason.clone(), actor, Utc::now())
            })
            .await
    }

    /// An order's lifecycle events, oldest first.
    pub async fn lifecycle(
        &self,
        order_id: OrderId,
        filter: LifecycleFilter,
    ) -> Result<Vec<LifecycleEvent>, DomainError> {
        let store = self.handler.store();
        if !store.order_exists(order_id).await? {
            return Err(DomainError::OrderNotFound(order_id));
        }

        if filter.is_empty() {
            return Ok(store.events_for_order(order_id).await?);
        }

        let mut query = LifecycleQuery::for_order(order_id);
        if let Some(item_id) = filter.item_id {
            query = query.item_id(item_id);
        }
        if let Some(event_type) = filter.event_type {
            query = query.event_type(event_type);
        }
        Ok(store.query_events(query).await?)
    }
}

#[cfg(test)]
mod tests {
    use lifecycle_log::InMemoryLifecycleStore;

    use super::*;
    use crate::aggregate::Aggregate;
    use crate::error::ErrorCode;
    use crate::item::ItemStatus;
    use crate::money::Money;
    use crate::order::{
        ClaimMode, CustomerId, DeliveryAddress, NewOrderItem, OrderError, OrderStatus,
        PaymentMethod, PaymentStatus,
    };
    use crate::pricing::{DeliveryConfig, InMemorySettings};

    fn service() -> OrderService<InMemoryLifecycleStore> {
        OrderService::new(
            InMemoryLifecycleStore::new(),
            Arc::new(InMemorySettings::default()),
        )
    }

    fn checkout(lines: Vec<NewOrderItem>) -> PlaceOrder {
        PlaceOrder::new(
            CustomerId::new(),
            lines,
            PaymentMethod::CashOnDelivery,
            DeliveryAddress::default(),
        )
    }

    fn owner() -> Actor {
        Actor::new("owner-1", common::ActorRole::Owner)
    }

    #[tokio::test]
    async fn replayed_checkout_conflicts() {
        let service = service();
        let cmd = checkout(vec![NewOrderItem::new("p-1", "Tea", Money::from_major(300), 2)]);

        service
            .place_order(cmd.clone(), &Actor::customer("c-1"))
            .await
            .unwrap();
        let err = service
            .place_order(cmd.clone(), &Actor::customer("c-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Order(OrderError::AlreadyPlaced)));
        assert_eq!(err.code(), ErrorCode::ConcurrentModification);
        let order = service.get_order(cmd.order_id).await.unwrap();
        assert_eq!(order.items().len(), 1);
    }

    #[tokio::test]
    async fn place_order_prices_and_persists() {
        let service = service();
        let cmd = checkout(vec![
            NewOrderItem::new("p-1", "Tea", Money::from_major(300), 2),
            NewOrderItem::new("p-2", "Rice", Money::from_major(200), 1),
        ]);
        let order_id = cmd.order_id;

        let result = service
            .place_order(cmd, &Actor::customer("c-1"))
            .await
            .unwrap();

        let order = result.aggregate;
        assert_eq!(order.id(), Some(order_id));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.items().len(), 2);
        // 800.00 subtotal, 18% tax, 100.00 delivery below the threshold.
        assert_eq!(order.total_amount(), Money::from_major(1044));
        assert!(
            order
                .order_number()
                .unwrap()
                .as_str()
                .starts_with("ORD-")
        );

        let reloaded = service.get_order(order_id).await.unwrap();
        assert_eq!(reloaded.total_amount(), Money::from_major(1044));
    }

    #[tokio::test]
    async fn place_order_enforces_the_minimum() {
        let settings = InMemorySettings::new(PricingConfig {
            minimum_order_value: Money::from_major(500),
            ..PricingConfig::default()
        });
        let service = OrderService::new(InMemoryLifecycleStore::new(), Arc::new(settings));

        let err = service
            .place_order(
                checkout(vec![NewOrderItem::new("p-1", "Tea", Money::from_major(100), 1)]),
                &Actor::customer("c-1"),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn quote_matches_checkout() {
        let service = service();
        let cmd = checkout(vec![NewOrderItem::new("p-1", "Tea", Money::from_minor(33_333), 3)]);
        let items = Order::build_items(&cmd).unwrap();

        let quoted = service.quote(&Order::pricing_lines(&items)).await.unwrap();
        let placed = service
            .place_order(cmd, &Actor::customer("c-1"))
            .await
            .unwrap();

        assert_eq!(placed.aggregate.pricing(), Some(&quoted));
    }

    #[tokio::test]
    async fn quote_rejects_reserved_delivery_modes() {
        let settings = InMemorySettings::new(PricingConfig {
            delivery: DeliveryConfig::Weight(Default::default()),
            ..PricingConfig::default()
        });
        let service = OrderService::new(InMemoryLifecycleStore::new(), Arc::new(settings));

        let err = service
            .quote(&[PricingLine {
                total_price: Money::from_major(10),
                quantity: 1,
                weight_kg: None,
            }])
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::UnsupportedDeliveryMode);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let service = service();
        let missing = OrderId::new();

        assert!(matches!(
            service.get_order(missing).await,
            Err(DomainError::OrderNotFound(_))
        ));
        assert!(matches!(
            service.lifecycle(missing, LifecycleFilter::default()).await,
            Err(DomainError::OrderNotFound(_))
        ));
        let err = service
            .update_item_status(
                UpdateItemStatus::new(missing, ItemId::new(), ItemStatus::Processing),
                &owner(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn cancel_is_administrative() {
        let service = service();
        let cmd = checkout(vec![NewOrderItem::new("p-1", "Tea", Money::from_major(10), 1)]);
        let order_id = cmd.order_id;
        service
            .place_order(cmd, &Actor::customer("c-1"))
            .await
            .unwrap();

        let err = service
            .cancel_order(CancelOrder::new(order_id, None), &Actor::customer("c-1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let result = service
            .cancel_order(
                CancelOrder::new(order_id, Some("out of stock".into())),
                &owner(),
            )
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::Cancelled);
        assert_eq!(
            result.records[0].metadata.get("reason"),
            Some(&serde_json::json!("out of stock"))
        );

        let again = service
            .cancel_order(CancelOrder::new(order_id, None), &owner())
            .await
            .unwrap_err();
        assert_eq!(again.code(), ErrorCode::InvalidTransition);
    }

    #[tokio::test]
    async fn lifecycle_filters_by_item_and_type() {
        let service = service();
        let cmd = checkout(vec![
            NewOrderItem::new("p-1", "Tea", Money::from_major(10), 1),
            NewOrderItem::new("p-2", "Rice", Money::from_major(10), 1),
        ]);
        let order_id = cmd.order_id;
        let placed = service
            .place_order(cmd, &Actor::customer("c-1"))
            .await
            .unwrap();
        let first = placed.aggregate.items()[0].id;

        let merchant = common::MerchantId::new("m-1");
        service
            .handler()
            .execute_existing(
                order_id,
                &ExecutionContext::new(Actor::merchant(&merchant)),
                |order| {
                    order.claim_item(
                        first,
                        &merchant,
                        ClaimMode::Manual,
                        &Actor::merchant(&merchant),
                        Utc::now(),
                    )
                },
            )
            .await
            .unwrap();

        let all = service
            .lifecycle(order_id, LifecycleFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].event_type, LifecycleEventType::OrderPlaced);

        let for_item = service
            .lifecycle(
                order_id,
                LifecycleFilter {
                    item_id: Some(first),
                    event_type: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(for_item.len(), 1);
        assert_eq!(for_item[0].event_type, LifecycleEventType::ItemClaimed);

        let placed_only = service
            .lifecycle(
                order_id,
                LifecycleFilter {
                    item_id: None,
                    event_type: Some(LifecycleEventType::OrderPlaced),
                },
            )
            .await
            .unwrap();
        assert_eq!(placed_only.len(), 1);
    }
}

use std::sync::Arc;

use common::{Actor, MerchantId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    AssignmentEngine, CustomerId, DeliveryAddress, InMemoryMerchantDirectory, InMemorySettings,
    Money, NewOrderItem, OrderService, PaymentMethod, PlaceOrder,
};
use lifecycle_log::InMemoryLifecycleStore;
use projections::{MerchantAssignmentsView, OpenItemsView, ProjectionProcessor};

/// Places `n` two-line orders and claims the first line of each.
async fn populate(store: &InMemoryLifecycleStore, n: usize) {
    let orders = OrderService::new(store.clone(), Arc::new(InMemorySettings::default()));
    let engine = AssignmentEngine::new(store.clone(), Arc::new(InMemoryMerchantDirectory::new()));
    let merchant = MerchantId::new("m-bench");

    for _ in 0..n {
        let cmd = PlaceOrder::new(
            CustomerId::new(),
            vec![
                NewOrderItem::new("p-1", "Tea", Money::from_minor(1_000), 1),
                NewOrderItem::new("p-2", "Rice", Money::from_minor(2_000), 1),
            ],
            PaymentMethod::CashOnDelivery,
            DeliveryAddress::default(),
        );
        let order_id = cmd.order_id;
        let placed = orders
            .place_order(cmd, &Actor::customer("bench"))
            .await
            .unwrap();
        let item_id = placed.aggregate.items()[0].id;
        engine
            .claim(order_id, item_id, merchant.clone(), &Actor::merchant(&merchant))
            .await
            .unwrap();
    }
}

fn bench_catch_up(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryLifecycleStore::new();
    rt.block_on(populate(&store, 100));

    c.bench_function("projections/rebuild_100_orders", |b| {
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(OpenItemsView::new()));
        processor.register(Box::new(MerchantAssignmentsView::new()));

        b.iter(|| rt.block_on(processor.rebuild_all()).unwrap());
    });
}

fn bench_open_items_query(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryLifecycleStore::new();
    rt.block_on(populate(&store, 500));

    let view = OpenItemsView::new();
    let mut processor = ProjectionProcessor::new(store);
    processor.register(Box::new(view.clone()));
    rt.block_on(processor.run_catch_up()).unwrap();

    let merchant = MerchantId::new("m-other");
    c.bench_function("projections/open_items_500_orders", |b| {
        b.iter(|| rt.block_on(view.open_items_for(&merchant)));
    });
}

criterion_group!(benches, bench_catch_up, bench_open_items_query);
criterion_main!(benches);

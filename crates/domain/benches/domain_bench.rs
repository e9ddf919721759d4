use std::sync::Arc;

use common::{Actor, MerchantId};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, AssignmentEngine, CustomerId, DeliveryAddress, InMemoryMerchantDirectory,
    InMemorySettings, ItemStatus, Money, NewOrderItem, OrderService, PaymentMethod, PlaceOrder,
    PricingConfig, PricingLine, aggregate_status, compute_pricing,
};
use lifecycle_log::InMemoryLifecycleStore;

fn checkout(lines: usize) -> PlaceOrder {
    let items = (0..lines)
        .map(|i| NewOrderItem::new(format!("p-{i}"), "Bench item", Money::from_minor(1_999), 2))
        .collect();
    PlaceOrder::new(
        CustomerId::new(),
        items,
        PaymentMethod::CashOnDelivery,
        DeliveryAddress::default(),
    )
}

fn bench_pricing(c: &mut Criterion) {
    let config = PricingConfig::default();
    let mut group = c.benchmark_group("domain/compute_pricing");

    for size in [1usize, 10, 100] {
        let lines: Vec<PricingLine> = (0..size)
            .map(|i| PricingLine {
                total_price: Money::from_minor(1_000 + i as i64),
                quantity: 1,
                weight_kg: None,
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
            b.iter(|| compute_pricing(lines, &config).unwrap());
        });
    }

    group.finish();
}

fn bench_aggregate_status(c: &mut Criterion) {
    let statuses: Vec<ItemStatus> = ItemStatus::ALL.iter().copied().cycle().take(60).collect();

    c.bench_function("domain/aggregate_status_60_items", |b| {
        b.iter(|| aggregate_status(statuses.iter().copied()));
    });
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(
        InMemoryLifecycleStore::new(),
        Arc::new(InMemorySettings::default()),
    );
    let actor = Actor::customer("bench");

    c.bench_function("domain/place_order_5_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.place_order(checkout(5), &actor).await.unwrap();
            });
        });
    });
}

fn bench_claim(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryLifecycleStore::new();
    let orders = OrderService::new(store.clone(), Arc::new(InMemorySettings::default()));
    let engine = AssignmentEngine::new(store, Arc::new(InMemoryMerchantDirectory::new()));
    let merchant = MerchantId::new("m-bench");
    let actor = Actor::merchant(&merchant);

    c.bench_function("domain/place_and_claim", |b| {
        b.iter(|| {
            rt.block_on(async {
                let placed = orders
                    .place_order(checkout(1), &Actor::customer("bench"))
                    .await
                    .unwrap();
                let order = placed.aggregate;
                let order_id = order.id().unwrap();
                let item_id = order.items()[0].id;
                engine
                    .claim(order_id, item_id, merchant.clone(), &actor)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_pricing,
    bench_aggregate_status,
    bench_place_order,
    bench_claim
);
criterion_main!(benches);

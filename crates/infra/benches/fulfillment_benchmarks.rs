use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::collections::BTreeMap;
use std::sync::Arc;

use reqflow_core::PartNumber;
use reqflow_events::{EventEnvelope, InMemoryEventBus};
use reqflow_infra::command_dispatcher::CommandDispatcher;
use reqflow_infra::roster::InMemoryRoster;
use reqflow_infra::service::{NewOrder, RequisitionService};
use reqflow_infra::store::InMemoryRequisitionStore;
use reqflow_inventory::{Catalog, CatalogEntry, SnapshotRow, StockLedger, compute_reorder_list};
use reqflow_requisitions::{CartLine, OrderFilter, UserDetails};

type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;
type Service = RequisitionService<InMemoryRequisitionStore, Bus>;

fn part(i: usize) -> PartNumber {
    PartNumber::parse(&format!("P-{i:05}")).unwrap()
}

fn catalog(parts: usize) -> Catalog {
    Catalog::from_entries((0..parts).map(|i| {
        let mut entry = CatalogEntry::new(part(i), format!("Part {i}"));
        entry.rol = Some(10);
        entry.max = Some(50);
        entry
    }))
    .unwrap()
}

fn service(parts: usize) -> Service {
    let svc = RequisitionService::new(
        CommandDispatcher::new(InMemoryRequisitionStore::new(), Arc::new(InMemoryEventBus::new())),
        Arc::new(catalog(parts)),
        Arc::new(InMemoryRoster::new()),
    );
    svc.load_stock_snapshot(
        (0..parts)
            .map(|i| SnapshotRow {
                part_number: part(i),
                description: format!("Part {i}"),
                quantity: 1_000_000,
            })
            .collect(),
    )
    .unwrap();
    svc
}

fn new_order(lines: usize) -> NewOrder {
    NewOrder {
        user_details: UserDetails {
            name: "Bench".into(),
            emp_id: "E0".into(),
            dept: "Stores".into(),
            zone: "Z1".into(),
            group: None,
            requested_date: None,
        },
        cart: (0..lines)
            .map(|i| CartLine {
                part_number: part(i),
                description: String::new(),
                quantity: 1_000,
            })
            .collect(),
        category: None,
    }
}

fn bench_delivery_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("delivery_latency");

    for lines in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::new("cumulative_submission", lines), &lines, |b, &lines| {
            let svc = service(lines);
            let order = svc.create_order(new_order(lines)).unwrap();
            let id = order.id_typed();
            svc.approve(id, None).unwrap();
            let line_ids: Vec<_> = order.line_items().iter().map(|l| l.id).collect();

            // Each iteration raises every line by one unit; stays Partial.
            let mut total = 0i64;
            b.iter(|| {
                total = (total + 1).min(999);
                let submission: BTreeMap<_, _> = line_ids.iter().map(|id| (*id, total)).collect();
                black_box(svc.record_delivery(id, submission, None).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_order_rehydration(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_rehydration");

    for deliveries in [10usize, 100, 500] {
        group.throughput(Throughput::Elements(deliveries as u64));
        group.bench_with_input(BenchmarkId::new("get_order", deliveries), &deliveries, |b, &n| {
            let svc = service(1);
            let order = svc.create_order(new_order(1)).unwrap();
            let id = order.id_typed();
            svc.approve(id, None).unwrap();
            let line = order.line_items()[0].id;
            for qty in 1..=n as i64 {
                svc.record_delivery(id, BTreeMap::from([(line, qty)]), None).unwrap();
            }

            b.iter(|| black_box(svc.get_order(id).unwrap()));
        });
    }

    group.finish();
}

fn bench_dashboard_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("dashboard_listing");
    group.sample_size(20);

    for orders in [100usize, 1_000] {
        group.throughput(Throughput::Elements(orders as u64));
        group.bench_with_input(BenchmarkId::new("list_all", orders), &orders, |b, &n| {
            let svc = service(3);
            for _ in 0..n {
                svc.create_order(new_order(3)).unwrap();
            }
            b.iter(|| black_box(svc.list_orders(&OrderFilter::default()).unwrap()));
        });
    }

    group.finish();
}

fn bench_reorder_computation(c: &mut Criterion) {
    let mut group = c.benchmark_group("reorder_computation");

    for parts in [100usize, 10_000] {
        group.throughput(Throughput::Elements(parts as u64));
        group.bench_with_input(BenchmarkId::new("compute", parts), &parts, |b, &n| {
            let catalog = catalog(n);
            let mut ledger = StockLedger::new();
            ledger
                .load_snapshot((0..n).map(|i| SnapshotRow {
                    part_number: part(i),
                    description: String::new(),
                    quantity: (i % 20) as i64,
                }))
                .unwrap();

            b.iter(|| black_box(compute_reorder_list(&ledger, &catalog)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_delivery_latency,
    bench_order_rehydration,
    bench_dashboard_listing,
    bench_reorder_computation
);
criterion_main!(benches);

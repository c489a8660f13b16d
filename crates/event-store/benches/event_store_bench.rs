use cache::{Cache, InMemoryCache};
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{
    AggregateKey, CachedEventStore, Event, EventLog, InMemoryEventStore, Version,
    event_stream_key,
};

fn make_event(key: &AggregateKey, version: i64) -> Event {
    Event::builder()
        .aggregate(key)
        .event_type("OrderCreated")
        .version(Version::new(version))
        .data(
            serde_json::to_vec(&serde_json::json!({
                "order_id": key.aggregate_id.as_str(),
                "customer_id": "00000000-0000-0000-0000-000000000001"
            }))
            .unwrap(),
        )
        .build()
        .unwrap()
}

fn bench_append_single_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_single_event", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let key = AggregateKey::new("Order", "A1");
                store.append(vec![make_event(&key, 1)]).await.unwrap();
            });
        });
    });
}

fn bench_append_batch_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_batch_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let key = AggregateKey::new("Order", "A1");
                let events: Vec<Event> = (1..=10).map(|v| make_event(&key, v)).collect();
                store.append(events).await.unwrap();
            });
        });
    });
}

fn bench_cached_append(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("cached_store/append_with_invalidation", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store =
                    CachedEventStore::new(InMemoryEventStore::new(), InMemoryCache::default());
                let key = AggregateKey::new("Order", "A1");
                store.append(vec![make_event(&key, 1)]).await.unwrap();
            });
        });
    });
}

fn bench_cached_read(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let key = AggregateKey::new("Order", "A1");
    let store = rt.block_on(async {
        let store = CachedEventStore::new(InMemoryEventStore::new(), InMemoryCache::default());
        let events: Vec<Event> = (1..=100).map(|v| make_event(&key, v)).collect();
        store.append(events).await.unwrap();
        store
    });

    let mut group = c.benchmark_group("cached_store/get_by_aggregate_100");

    group.bench_function("hot", |b| {
        rt.block_on(store.get_by_aggregate(&key)).unwrap();
        b.iter(|| {
            rt.block_on(async {
                let events = store.get_by_aggregate(&key).await.unwrap();
                assert_eq!(events.len(), 100);
            });
        });
    });

    group.bench_function("cold", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.cache().delete(&event_stream_key(&key)).await.unwrap();
                let events = store.get_by_aggregate(&key).await.unwrap();
                assert_eq!(events.len(), 100);
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_append_single_event,
    bench_append_batch_10,
    bench_cached_append,
    bench_cached_read,
);
criterion_main!(benches);

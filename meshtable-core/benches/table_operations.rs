use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use meshtable_core::adapters::GroupCipher;
use meshtable_core::core_table::{
    Content, ContentType, Event, Key, NamespaceId, PeerId, Publisher, ReplicatedTable, Target,
    MAX_SIZE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use uuid::Uuid;

const SEED: u64 = 42;

/// Publisher that discards everything
struct NullPublisher;

impl Publisher for NullPublisher {
    fn publish(&self, _target: Target, event: Event) {
        black_box(event);
    }
}

fn build_table(runtime: &Runtime, namespace: NamespaceId) -> ReplicatedTable {
    let cipher = GroupCipher::new().with_secret(namespace, GroupCipher::generate_secret());
    runtime
        .block_on(
            ReplicatedTable::builder(PeerId::generate(), Arc::new(NullPublisher), Arc::new(cipher))
                .rng_seed(SEED)
                .build(),
        )
        .unwrap()
}

fn payload(rng: &mut StdRng, len: usize) -> Content {
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    Content::from_bytes(bytes, ContentType::BINARY).unwrap()
}

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_put");
    group.measurement_time(Duration::from_secs(10));

    for size in [64usize, 512, MAX_SIZE] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let runtime = Runtime::new().unwrap();
            let namespace = Uuid::new_v4();
            let table = build_table(&runtime, namespace);
            let mut rng = StdRng::seed_from_u64(SEED);
            let content = payload(&mut rng, size);

            b.iter(|| {
                let key = Key::generate(namespace);
                let stored = table.put(key, content.clone()).unwrap();
                // Keep the table under its ceiling
                if table.len() > 30_000 {
                    table.remove_all();
                }
                black_box(stored)
            });
        });
    }

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_get");

    let runtime = Runtime::new().unwrap();
    let namespace = Uuid::new_v4();
    let table = build_table(&runtime, namespace);
    let mut rng = StdRng::seed_from_u64(SEED);
    let keys: Vec<Key> = (0..10_000)
        .map(|_| {
            let key = Key::generate(namespace);
            table.put(key, payload(&mut rng, 256)).unwrap();
            key
        })
        .collect();

    group.bench_function("hit", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % keys.len();
            black_box(table.get(&keys[i]))
        });
    });

    group.bench_function("miss", |b| {
        let missing = Key::generate(namespace);
        b.iter(|| black_box(table.get(&missing)));
    });

    group.finish();
}

fn bench_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_records");

    for count in [100usize, 1_000, 10_000] {
        let runtime = Runtime::new().unwrap();
        let namespace = Uuid::new_v4();
        let table = build_table(&runtime, namespace);
        let mut rng = StdRng::seed_from_u64(SEED);
        for _ in 0..count {
            table.put(Key::generate(namespace), payload(&mut rng, 64)).unwrap();
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(table.records_in(&namespace)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_put, bench_get, bench_records);
criterion_main!(benches);

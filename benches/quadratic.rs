use criterion::{criterion_group, criterion_main, Bencher, Criterion, Throughput};
use hashtables_core::QuadraticMap;
use once_cell::sync::Lazy;
use rand::Rng;

const OP_COUNT: u64 = 10_000;

static RANDOM_KEYS: Lazy<Vec<u64>> = Lazy::new(|| {
    let mut rng = rand::thread_rng();
    let mut keys = Vec::with_capacity(OP_COUNT as usize);
    for _ in 0..OP_COUNT {
        keys.push(rng.gen_range(0, OP_COUNT));
    }
    keys
});

fn insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("quadratic_insert");
    group.throughput(Throughput::Elements(OP_COUNT));
    group.bench_function("ordered insert", ordered_insert);
    group.bench_function("random range insert", random_range_insert);
    group.finish();
}

fn ordered_insert(b: &mut Bencher) {
    b.iter(|| {
        let mut map: QuadraticMap<u64, u64> = QuadraticMap::new();
        for i in 0..OP_COUNT {
            map.emplace(i, i);
        }
    });
}

fn random_range_insert(b: &mut Bencher) {
    b.iter(|| {
        let mut map: QuadraticMap<u64, u64> = QuadraticMap::new();
        for key in RANDOM_KEYS.iter() {
            map.emplace(*key, *key);
        }
    });
}

fn get_hit(c: &mut Criterion) {
    let mut map: QuadraticMap<u64, u64> = QuadraticMap::new();
    for i in 0..OP_COUNT {
        map.emplace(i, i);
    }
    let mut group = c.benchmark_group("quadratic_get");
    group.throughput(Throughput::Elements(OP_COUNT));
    group.bench_function("ordered get (hit)", |b| {
        b.iter(|| {
            for i in 0..OP_COUNT {
                assert!(map.get(&i).is_some());
            }
        });
    });
    group.finish();
}

fn remove_and_reinsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("quadratic_tombstone_churn");
    group.throughput(Throughput::Elements(OP_COUNT));
    group.bench_function("remove half, reinsert", |b| {
        b.iter(|| {
            let mut map: QuadraticMap<u64, u64> = QuadraticMap::new();
            for i in 0..OP_COUNT {
                map.emplace(i, i);
            }
            for i in 0..OP_COUNT / 2 {
                map.remove(&i);
            }
            for i in 0..OP_COUNT / 2 {
                map.emplace(i + OP_COUNT, i);
            }
        });
    });
    group.finish();
}

criterion_group!(benches, insert, get_hit, remove_and_reinsert);
criterion_main!(benches);

// Copyright 2025 the Orthovol Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use orthovol::{Bvh, Orthotope};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_range(&mut self, lo: i64, hi: i64) -> i64 {
        lo + (self.next_u64() % (hi - lo) as u64) as i64
    }
}

fn gen_random_boxes(count: usize, world: i64, max_side: i64, seed: u64) -> Vec<Orthotope<3>> {
    let mut out = Vec::with_capacity(count);
    let mut rng = Rng::new(seed);
    for _ in 0..count {
        let mut point = [0_i64; 3];
        let mut delta = [0_i64; 3];
        for d in 0..3 {
            point[d] = rng.next_range(-world, world);
            delta[d] = rng.next_range(1, max_side);
        }
        out.push(Orthotope::new(point, delta));
    }
    out
}

fn gen_clustered_boxes(n_clusters: usize, per_cluster: usize, spread: i64) -> Vec<Orthotope<3>> {
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let mut centers = Vec::with_capacity(n_clusters);
    for _ in 0..n_clusters {
        let mut c = [0_i64; 3];
        for v in &mut c {
            *v = rng.next_range(-2000, 2000);
        }
        centers.push(c);
    }
    for c in centers {
        for _ in 0..per_cluster {
            let mut point = [0_i64; 3];
            for d in 0..3 {
                point[d] = c[d] + rng.next_range(-spread, spread);
            }
            out.push(Orthotope::new(point, [12, 12, 12]));
        }
    }
    out
}

fn build_incremental(boxes: &[Orthotope<3>]) -> Bvh<3, u32> {
    let mut tree = Bvh::new();
    for (i, b) in boxes.iter().enumerate() {
        let _ = tree.insert(i as u32, *b);
    }
    tree
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for &n in &[256usize, 1024, 4096] {
        let boxes = gen_random_boxes(n, 2000, 24, 0xCAFE_F00D_DEAD_BEEF);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("incremental_n{}", n), |b| {
            b.iter_batched(
                || boxes.clone(),
                |boxes| {
                    let tree = build_incremental(&boxes);
                    black_box(tree.depth());
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("bulk_build_n{}", n), |b| {
            b.iter_batched(
                || {
                    boxes
                        .iter()
                        .copied()
                        .enumerate()
                        .map(|(i, o)| (i as u32, o))
                        .collect::<Vec<_>>()
                },
                |items| {
                    let tree = Bvh::bulk_build(items);
                    black_box(tree.depth());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let boxes = gen_random_boxes(4096, 2000, 24, 0xFACE_FEED_CAFE_BABE);
    let tree = build_incremental(&boxes);
    group.bench_function("many_probes", |b| {
        b.iter(|| {
            let mut rng = Rng::new(0xBADC_F00D_1234_5678);
            let mut total = 0usize;
            for _ in 0..256 {
                let mut point = [0_i64; 3];
                for v in &mut point {
                    *v = rng.next_range(-2000, 2000);
                }
                let probe = Orthotope::new(point, [200, 200, 200]);
                let mut walk = tree.cursor();
                while walk.query(&probe).is_some() {
                    total += 1;
                }
            }
            black_box(total);
        })
    });
    group.finish();
}

fn bench_trace(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace");
    let boxes = gen_clustered_boxes(16, 256, 128);
    let tree = build_incremental(&boxes);
    group.bench_function("many_rays", |b| {
        b.iter(|| {
            let mut rng = Rng::new(0x9E37_79B9_7F4A_7C15);
            let mut total = 0usize;
            for _ in 0..256 {
                let mut point = [0_i64; 3];
                let mut delta = [0_i64; 3];
                for d in 0..3 {
                    point[d] = rng.next_range(-2500, 2500);
                    delta[d] = rng.next_range(-8, 9);
                }
                let ray = Orthotope::new(point, delta);
                let mut walk = tree.cursor();
                while walk.trace(&ray).is_some() {
                    total += 1;
                }
            }
            black_box(total);
        })
    });
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");
    let boxes = gen_random_boxes(4096, 2000, 24, 0xCAFE_F00D_DEAD_BEEF);
    let fresh = gen_random_boxes(1024, 2000, 24, 0x1234_5678_9ABC_DEF0);
    group.throughput(Throughput::Elements(2 * fresh.len() as u64));
    group.bench_function("remove_reinsert_quarter", |b| {
        b.iter_batched(
            || build_incremental(&boxes),
            |mut tree| {
                for (i, b) in fresh.iter().enumerate() {
                    let _ = tree.remove(i as u32, &boxes[i]);
                    let _ = tree.insert((boxes.len() + i) as u32, *b);
                }
                black_box(tree.depth());
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_query, bench_trace, bench_churn);
criterion_main!(benches);

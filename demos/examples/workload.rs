// Copyright 2025 the Orthovol Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Randomized workload harness: times Add/Remove/Query sequences against a
//! growing tree and reports one CSV line per operation on stdout
//! (`op, live entries, tree depth, nanos[, hits]`).
//!
//! Run with: `cargo run --release -p orthovol_demos --example workload -- demos/examples/workload.json`

use std::time::Instant;
use std::{env, fs, process};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use thiserror::Error;

use orthovol::{Bvh, Orthotope};

const DIMENSIONS: usize = 3;

#[derive(Debug, Deserialize)]
struct Bounds {
    point: [i64; DIMENSIONS],
    delta: [i64; DIMENSIONS],
}

/// JSON-configured workload description.
#[derive(Debug, Deserialize)]
struct Workload {
    /// World region boxes are placed in.
    max_bounds: Bounds,
    /// Per-axis lower bound (inclusive) on generated extents.
    min_vol: [i64; DIMENSIONS],
    /// Per-axis upper bound (exclusive) on generated extents.
    max_vol: [i64; DIMENSIONS],
    additions: usize,
    removals: usize,
    queries: usize,
    rand_seed: u64,
}

#[derive(Debug, Error)]
enum WorkloadError {
    #[error("unable to read the workload file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed workload file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("removals ({removals}) exceed additions ({additions})")]
    TooManyRemovals { removals: usize, additions: usize },
    #[error("axis {axis}: min_vol must be below max_vol")]
    EmptyVolumeRange { axis: usize },
    #[error("axis {axis}: max_bounds.delta must exceed max_vol")]
    BoundsTooSmall { axis: usize },
}

impl Workload {
    fn validate(&self) -> Result<(), WorkloadError> {
        if self.removals > self.additions {
            return Err(WorkloadError::TooManyRemovals {
                removals: self.removals,
                additions: self.additions,
            });
        }
        for axis in 0..DIMENSIONS {
            if self.min_vol[axis] >= self.max_vol[axis] {
                return Err(WorkloadError::EmptyVolumeRange { axis });
            }
            if self.max_bounds.delta[axis] <= self.max_vol[axis] {
                return Err(WorkloadError::BoundsTooSmall { axis });
            }
        }
        Ok(())
    }

    /// A random box with extents in `[min_vol, max_vol)`, placed inside
    /// `max_bounds`.
    fn make_orth(&self, rng: &mut StdRng) -> Orthotope<DIMENSIONS> {
        let mut point = [0_i64; DIMENSIONS];
        let mut delta = [0_i64; DIMENSIONS];
        for d in 0..DIMENSIONS {
            delta[d] = rng.gen_range(self.min_vol[d]..self.max_vol[d]);
            let lo = self.max_bounds.point[d];
            point[d] = rng.gen_range(lo..lo + self.max_bounds.delta[d] - delta[d]);
        }
        Orthotope::new(point, delta)
    }

    fn run(&self) {
        let mut rng = StdRng::seed_from_u64(self.rand_seed);
        let mut boxes: Vec<Orthotope<DIMENSIONS>> = Vec::with_capacity(self.additions);
        let mut removed = vec![false; self.additions];
        let mut tree: Bvh<DIMENSIONS, usize> = Bvh::new();

        let mut removals = distribute(&mut rng, self.removals, self.additions);
        let queries = distribute(&mut rng, self.queries, self.additions);
        let mut total = 0_usize;

        for a in 0..self.additions {
            let orth = self.make_orth(&mut rng);
            boxes.push(orth);

            let start = Instant::now();
            let _ = tree.insert(a, orth);
            let nanos = start.elapsed().as_nanos();
            total += 1;
            println!("add, {total}, {}, {nanos}", tree.depth());

            for _ in 0..removals[a] {
                // Scan forward from a random slot for a live entry.
                let mut target = rng.gen_range(0..=a);
                while target <= a && removed[target] {
                    target += 1;
                }
                if target <= a {
                    removed[target] = true;
                    let start = Instant::now();
                    let _ = tree.remove(target, &boxes[target]);
                    let nanos = start.elapsed().as_nanos();
                    total -= 1;
                    println!("sub, {total}, {}, {nanos}", tree.depth());
                } else if a + 1 < removals.len() {
                    // Nothing left to remove at this step; defer.
                    removals[a + 1] += 1;
                }
            }

            for _ in 0..queries[a] {
                let probe = self.make_orth(&mut rng);
                let mut walk = tree.cursor();
                let mut hits = 0_usize;
                let start = Instant::now();
                while walk.query(&probe).is_some() {
                    hits += 1;
                }
                let nanos = start.elapsed().as_nanos();
                println!("que, {total}, {}, {nanos}, {hits}", tree.depth());
            }
        }
    }
}

/// Spread `total_events` over `steps` slots uniformly at random.
fn distribute(rng: &mut StdRng, total_events: usize, steps: usize) -> Vec<usize> {
    if steps == 0 {
        return Vec::new();
    }
    let mut events = vec![0_usize; steps];
    for _ in 0..total_events {
        events[rng.gen_range(0..steps)] += 1;
    }
    events
}

fn load_and_run(path: &str) -> Result<(), WorkloadError> {
    let text = fs::read_to_string(path)?;
    let workload: Workload = serde_json::from_str(&text)?;
    workload.validate()?;
    workload.run();
    Ok(())
}

fn main() {
    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "workload.json".to_owned());
    if let Err(err) = load_and_run(&path) {
        eprintln!("{err}");
        process::exit(1);
    }
}

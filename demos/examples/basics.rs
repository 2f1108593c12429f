// Copyright 2025 the Orthovol Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Walkthrough of the core API: insert, remove, overlap query, ray trace.
//!
//! Run with: `cargo run -p orthovol_demos --example basics`

use orthovol::{Bvh, Orthotope};

fn main() {
    // The dimension count is a const generic on the tree; identities here
    // are plain u32 ids.
    let first = Orthotope::new([10, -20, 10], [30, 30, 30]);
    let mut tree: Bvh<3, u32> = Bvh::new();

    assert!(tree.insert(1, first));
    assert!(tree.remove(1, &first));
    assert!(tree.insert(1, first));

    // Value-equal boxes coexist under distinct identities.
    assert!(tree.insert(2, first));

    let probe = Orthotope::new([0, -10, 10], [20, 20, 20]);
    let mut walk = tree.cursor();
    while let Some((id, bounds)) = walk.query(&probe) {
        println!("overlap: id {id} at {bounds}");
    }

    // Move the second box: remove it and reinsert at the new position.
    assert!(tree.remove(2, &first));
    let moved = Orthotope::new([15, -20, 10], [30, 30, 30]);
    assert!(tree.insert(2, moved));

    // Rays reuse the orthotope shape: origin plus direction. Distances are
    // relative; farther hits report larger values.
    let mut walk = tree.cursor();
    while let Some((id, dist)) = walk.trace(&probe) {
        println!("hit: id {id} at scaled distance {dist}");
    }

    println!("depth {}, score {}", tree.depth(), tree.score());
}

// Copyright 2025 the Orthovol Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Orthovol: a dynamic bounding-volume hierarchy over integer orthotopes.
//!
//! Orthovol indexes axis-aligned hyperrectangles ([`Orthotope`]) in a fixed
//! number of dimensions `D`, chosen at compile time.
//!
//! - Insert and remove boxes incrementally; the tree stays height-balanced
//!   with tight branch bounds after every update.
//! - Run resumable traversals with a [`Cursor`]: overlap queries, ray traces,
//!   membership tests, and plain pre-order iteration, one result per call.
//! - Build a well-packed tree from a batch in one shot with
//!   [`Bvh::bulk_build`].
//!
//! Entries are identified by a caller-supplied value `P` (an id, an arena
//! key, an index into caller-owned storage), not by box value: value-equal
//! boxes under distinct identities coexist. The crate is `no_std` (with
//! `alloc`) and does not depend on any geometry crate.
//!
//! # Example
//!
//! ```rust
//! use orthovol::{Bvh, Orthotope};
//!
//! // Index two 2D boxes under ids 1 and 2.
//! let mut tree: Bvh<2, u32> = Bvh::new();
//! assert!(tree.insert(1, Orthotope::new([0, 0], [10, 10])));
//! assert!(tree.insert(2, Orthotope::new([20, 0], [10, 10])));
//!
//! // Resumable overlap query: one hit per call, then `None`.
//! let mut walk = tree.cursor();
//! let probe = Orthotope::new([5, 5], [2, 2]);
//! assert_eq!(walk.query(&probe).map(|(id, _)| id), Some(1));
//! assert!(walk.query(&probe).is_none());
//!
//! // Rays are orthotopes too: origin plus direction.
//! let ray = Orthotope::new([-5, 5], [1, 0]);
//! let mut walk = tree.cursor();
//! let (id, dist) = walk.trace(&ray).expect("ray hits the first box");
//! assert_eq!(id, 1);
//! assert!(dist > 0);
//! ```
//!
//! Mutation invalidates traversals: a [`Cursor`] borrows the tree, so the
//! borrow checker requires cursors to be dropped (or re-created) across
//! [`Bvh::insert`]/[`Bvh::remove`] calls.

#![no_std]

extern crate alloc;

pub mod cursor;
pub mod orthotope;
pub mod tree;

pub use cursor::{Cursor, Visit};
pub use orthotope::{ACCURACY, Orthotope};
pub use tree::Bvh;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_round_trip_restores_score() {
        let mut tree: Bvh<2, u8> = Bvh::new();
        assert!(tree.insert(0, Orthotope::new([0, 0], [4, 4])));
        assert!(tree.insert(1, Orthotope::new([10, 0], [4, 4])));
        assert_eq!(tree.score(), 34);

        let third = Orthotope::new([0, 10], [4, 4]);
        assert!(tree.insert(2, third));
        assert_eq!(tree.score(), 70);
        assert!(tree.remove(2, &third));
        assert_eq!(tree.score(), 34);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn insert_query_remove_in_three_dimensions() {
        let mut tree: Bvh<3, u32> = Bvh::new();
        for i in 0..8_u32 {
            let at = i64::from(i) * 10;
            assert!(tree.insert(i, Orthotope::new([at, 0, 0], [5, 5, 5])));
        }
        assert_eq!(tree.len(), 8);
        assert_eq!(tree.depth(), 3);

        let mut walk = tree.cursor();
        let probe = Orthotope::new([12, 1, 1], [20, 1, 1]);
        let mut hits = [false; 8];
        while let Some((id, _)) = walk.query(&probe) {
            hits[id as usize] = true;
        }
        // Boxes 1, 2, and 3 span x in [10, 35].
        assert_eq!(hits, [false, true, true, true, false, false, false, false]);

        for i in 0..8_u32 {
            let at = i64::from(i) * 10;
            assert!(tree.remove(i, &Orthotope::new([at, 0, 0], [5, 5, 5])));
        }
        assert!(tree.is_empty());
    }
}

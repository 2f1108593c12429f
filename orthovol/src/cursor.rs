// Copyright 2025 the Orthovol Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resumable explicit-stack traversal over a [`Bvh`]: pre-order iteration,
//! overlap query, ray trace, membership, and the tree-quality metrics.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::orthotope::Orthotope;
use crate::tree::{Bvh, Kind, NodeIdx};

/// One node yielded by the pre-order iteration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Visit<const D: usize, P> {
    /// The node's box: the caller's entry box for a leaf, the synthesized
    /// enclosing box for a branch.
    pub bounds: Orthotope<D>,
    /// Height above the node's deepest descendant leaf; 0 for leaves.
    pub depth: u16,
    /// The entry identity for a leaf, `None` for a branch.
    pub item: Option<P>,
}

/// A traversal handle over a [`Bvh`], holding its own explicit stack.
///
/// All operations are resumable: each call advances the stack by one result
/// and the next call picks up where the previous one left off, so results can
/// be consumed lazily and traversals abandoned early. Several cursors over the
/// same tree are independent.
///
/// The cursor borrows the tree, so mutating the tree while a cursor exists is
/// rejected at compile time; take a fresh cursor after each mutation. Within
/// one cursor, switching between traversal kinds (or probe arguments)
/// mid-walk requires [`Cursor::reset`] first.
#[derive(Debug)]
pub struct Cursor<'a, const D: usize, P: Copy + Eq + Debug> {
    tree: &'a Bvh<D, P>,
    stack: Vec<(NodeIdx, u8)>,
}

impl<'a, const D: usize, P: Copy + Eq + Debug> Cursor<'a, D, P> {
    pub(crate) fn new(tree: &'a Bvh<D, P>) -> Self {
        let mut cursor = Self {
            tree,
            stack: Vec::new(),
        };
        cursor.reset();
        cursor
    }

    /// Rewind to the root, ready to begin a new traversal. Cheap; never
    /// touches the tree.
    pub fn reset(&mut self) {
        self.stack.clear();
        if let Some(root) = self.tree.root() {
            self.stack.push((root, 0));
        }
    }

    /// Whether the current traversal has nodes left to visit.
    pub fn has_next(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Resumable overlap search: each call returns one more entry whose box
    /// overlaps `probe`, then `None` once the tree is exhausted. No entry is
    /// reported twice within one traversal.
    pub fn query(&mut self, probe: &Orthotope<D>) -> Option<(P, &'a Orthotope<D>)> {
        let tree = self.tree;
        while let Some(&(node, index)) = self.stack.last() {
            match tree.node(node).kind {
                Kind::Leaf(p) => {
                    // Reached only when the leaf overlaps, except for a
                    // lone root leaf, which arrives untested.
                    let hit = tree.node(node).bounds.overlaps(probe);
                    tree.step_up(&mut self.stack);
                    if hit {
                        return Some((p, &tree.node(node).bounds));
                    }
                }
                Kind::Branch(ch) => {
                    if index >= 2 {
                        if !tree.step_up(&mut self.stack) {
                            break;
                        }
                    } else {
                        let child = ch[usize::from(index)];
                        if tree.node(child).bounds.overlaps(probe) {
                            self.stack.push((child, 0));
                        } else if let Some(top) = self.stack.last_mut() {
                            top.1 += 1;
                        }
                    }
                }
            }
        }
        None
    }

    /// Resumable ray walk: each call returns one more hit entry together with
    /// its scaled entry distance (see [`Orthotope::intersects`]), then `None`.
    ///
    /// The nearer child of each branch is explored first (ties prefer the
    /// first child), so distances are non-decreasing along each descent;
    /// results popped from deferred siblings can interleave, so the global
    /// sequence is only locally ordered.
    pub fn trace(&mut self, ray: &Orthotope<D>) -> Option<(P, i64)> {
        let tree = self.tree;
        let (mut node, _) = self.stack.pop()?;
        loop {
            match tree.node(node).kind {
                Kind::Leaf(p) => {
                    if let Some(dist) = ray.intersects(&tree.node(node).bounds) {
                        return Some((p, dist));
                    }
                    // Only a lone root leaf can miss here; deferred leaves
                    // were intersection-tested before being pushed.
                    (node, _) = self.stack.pop()?;
                }
                Kind::Branch([c0, c1]) => {
                    let d0 = ray.intersects(&tree.node(c0).bounds);
                    let d1 = ray.intersects(&tree.node(c1).bounds);
                    match (d0, d1) {
                        (Some(near), Some(far)) => {
                            if far < near {
                                self.stack.push((c0, 0));
                                node = c1;
                            } else {
                                self.stack.push((c1, 0));
                                node = c0;
                            }
                        }
                        (Some(_), None) => node = c0,
                        (None, Some(_)) => node = c1,
                        (None, None) => (node, _) = self.stack.pop()?,
                    }
                }
            }
        }
    }

    /// Whether the tree holds an entry with this identity, searching only
    /// subtrees whose boxes contain `bounds` (the box the entry was inserted
    /// with). Restarts from the root; the previous traversal is discarded.
    pub fn contains(&mut self, item: P, bounds: &Orthotope<D>) -> bool {
        self.reset();
        self.tree.locate(&mut self.stack, item, bounds)
    }

    /// Total box score over every node, leaf and branch, via a full
    /// traversal. Restarts from the root.
    pub fn score(&mut self) -> i64 {
        self.reset();
        let mut total = 0_i64;
        while let Some(visit) = self.next() {
            total += visit.bounds.score();
        }
        total
    }

    /// Surface-area-heuristic cost of the tree: per-class surface areas
    /// weighted by the caller's branch, leaf, and overlap-test costs, over
    /// the root's surface area. 0 for an empty tree. Restarts from the root.
    pub fn sah(&mut self, c_internal: f64, c_leaves: f64, c_overlap: f64) -> f64 {
        let Some(root) = self.tree.root() else {
            return 0.0;
        };
        self.reset();
        let (mut internal, mut leaves, mut overlap) = (0.0, 0.0, 0.0);
        while let Some(visit) = self.next() {
            let area = visit.bounds.surface_area() as f64;
            if visit.depth == 0 {
                // A leaf holds a single box, so it feeds the overlap term too.
                leaves += area;
                overlap += area;
            } else {
                internal += area;
            }
        }
        (c_internal * internal + c_leaves * leaves + c_overlap * overlap)
            / self.tree.node(root).bounds.surface_area() as f64
    }
}

impl<const D: usize, P: Copy + Eq + Debug> Iterator for Cursor<'_, D, P> {
    type Item = Visit<D, P>;

    /// Pre-order step: yields every node, branches included, one per call.
    fn next(&mut self) -> Option<Visit<D, P>> {
        let &(node, _) = self.stack.last()?;
        let n = self.tree.node(node);
        let visit = Visit {
            bounds: n.bounds,
            depth: n.depth,
            item: n.item(),
        };
        // Leave the next unvisited node on top for the following call.
        if self.tree.step_up(&mut self.stack)
            && let Some(&(top, index)) = self.stack.last()
            && let Kind::Branch(ch) = self.tree.node(top).kind
        {
            self.stack.push((ch[usize::from(index)], 0));
        }
        Some(visit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orthotope::ACCURACY;
    use crate::tree::testutil::{LEAVES, ideal_tree};

    #[test]
    fn preorder_iteration() {
        let mut tree: Bvh<2, usize> = Bvh::new();
        assert!(tree.insert(0, LEAVES[0]));
        assert!(tree.insert(1, LEAVES[1]));

        let mut walk = tree.cursor();
        assert!(walk.has_next());
        let root = walk.next().expect("missing root visit");
        assert_eq!(root.bounds, Orthotope::new([2, 2], [8, 8]));
        assert_eq!(root.depth, 1);
        assert_eq!(root.item, None);
        // The leaf split places the newest entry in the first slot.
        assert_eq!(walk.next().and_then(|v| v.item), Some(1));
        assert_eq!(walk.next().and_then(|v| v.item), Some(0));
        assert!(!walk.has_next());
        assert_eq!(walk.next(), None);
    }

    #[test]
    fn full_walk_visits_every_node_once() {
        let tree = ideal_tree();
        let mut walk = tree.cursor();
        // Ten leaves and nine branches.
        assert_eq!(walk.by_ref().count(), 19);
        assert!(!walk.has_next());
        walk.reset();
        assert_eq!(walk.filter(|v| v.item.is_some()).count(), 10);
    }

    #[test]
    fn query_returns_each_overlap_once() {
        let tree = ideal_tree();
        let probes = [
            Orthotope::new([11, 12], [0, 0]),
            Orthotope::new([14, 15], [0, 0]),
            Orthotope::new([-2, -2], [30, 30]),
            Orthotope::new([30, 30], [30, 30]),
            Orthotope::new([17, 9], [5, 5]),
        ];
        let expected: [&[usize]; 5] = [
            &[4],
            &[],
            &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
            &[],
            &[3, 5, 6],
        ];
        for (probe, want) in probes.iter().zip(expected) {
            let mut remaining: Vec<usize> = want.to_vec();
            let mut walk = tree.cursor();
            while let Some((item, bounds)) = walk.query(probe) {
                let at = remaining
                    .iter()
                    .position(|&i| i == item)
                    .unwrap_or_else(|| panic!("query {probe} returned unexpected {item}"));
                assert_eq!(*bounds, LEAVES[item], "box mismatch for entry {item}");
                remaining.swap_remove(at);
            }
            assert!(remaining.is_empty(), "query {probe} missed {remaining:?}");
        }
    }

    #[test]
    fn query_sentinels() {
        let mut tree = Bvh::<2, usize>::new();
        assert_eq!(tree.cursor().query(&LEAVES[0]), None);
        assert!(tree.insert(0, LEAVES[0]));

        // A lone root leaf is overlap-checked like any other.
        let mut walk = tree.cursor();
        assert_eq!(walk.query(&Orthotope::new([100, 100], [1, 1])), None);
        walk.reset();
        assert_eq!(walk.query(&LEAVES[0]).map(|(p, _)| p), Some(0));
        assert_eq!(walk.query(&LEAVES[0]), None);
    }

    #[test]
    fn trace_orders_hits_by_distance() {
        let tree = ideal_tree();
        let rays = [
            Orthotope::new([-2, 0], [4, 2]),
            Orthotope::new([14, 11], [-1, 0]),
            Orthotope::new([7, 20], [4, -5]),
            Orthotope::new([30, 30], [-1, -1]),
            Orthotope::new([0, 40], [5, -1]),
        ];
        let expected: [&[usize]; 5] = [&[0, 3], &[4], &[7, 3, 2], &[9, 4, 1, 0], &[]];
        for (ray, want) in rays.iter().zip(expected) {
            let mut walk = tree.cursor();
            let mut got: Vec<usize> = Vec::new();
            let mut prev = 0_i64;
            while let Some((item, dist)) = walk.trace(ray) {
                assert!(dist >= prev, "distance went backwards tracing {ray}");
                prev = dist;
                got.push(item);
            }
            assert_eq!(got, want, "hit order tracing {ray}");
        }
    }

    #[test]
    fn trace_sentinels() {
        let mut tree = Bvh::<2, usize>::new();
        assert_eq!(tree.cursor().trace(&LEAVES[0]), None);
        assert!(tree.insert(0, LEAVES[0]));

        // A lone root leaf is intersection-checked like any other.
        let mut walk = tree.cursor();
        assert_eq!(walk.trace(&Orthotope::new([0, 30], [1, 0])), None);
        walk.reset();
        let hit = walk.trace(&Orthotope::new([0, 0], [1, 1]));
        assert_eq!(hit, Some((0, 2 << ACCURACY)));
        assert_eq!(walk.trace(&Orthotope::new([0, 0], [1, 1])), None);
    }

    #[test]
    fn contains_matches_identity_and_box() {
        let tree = ideal_tree();
        let mut walk = tree.cursor();
        assert!(walk.contains(2, &LEAVES[2]));
        assert!(walk.contains(7, &LEAVES[7]));
        assert!(!walk.contains(2, &Orthotope::new([100, 20], [8, 9])));
        // Value twin of entry 2 under a foreign identity.
        assert!(!walk.contains(99, &LEAVES[2]));
        assert!(!Bvh::<2, usize>::new().cursor().contains(0, &LEAVES[0]));
    }

    #[test]
    fn score_counts_every_node() {
        assert_eq!(ideal_tree().cursor().score(), 247);
        assert_eq!(Bvh::<2, usize>::new().cursor().score(), 0);
    }

    #[test]
    fn sah_weighs_surface_areas() {
        // Fixture areas: internal 376, leaves 118, root 88.
        let tree = ideal_tree();
        let got = tree.cursor().sah(1.0, 1.0, 1.0);
        let want = (376.0 + 118.0 + 118.0) / 88.0;
        let diff = got - want;
        assert!(diff > -1e-9 && diff < 1e-9, "sah {got} differs from {want}");
        assert_eq!(Bvh::<2, usize>::new().cursor().sah(1.0, 1.0, 1.0), 0.0);
    }
}

// Copyright 2025 the Orthovol Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The bounding-volume tree: arena storage, incremental insert/remove with
//! local greedy rebalancing, and the one-shot top-down builder.

use alloc::vec::Vec;
use core::fmt;
use core::fmt::Debug;

use crate::cursor::Cursor;
use crate::orthotope::Orthotope;

/// Arena handle for a tree node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct NodeIdx(usize);

impl NodeIdx {
    const fn new(i: usize) -> Self {
        Self(i)
    }

    pub(crate) const fn get(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone)]
pub(crate) enum Kind<P> {
    Leaf(P),
    Branch([NodeIdx; 2]),
}

pub(crate) struct Node<const D: usize, P> {
    pub(crate) bounds: Orthotope<D>,
    pub(crate) depth: u16,
    pub(crate) kind: Kind<P>,
}

impl<const D: usize, P: Copy> Node<D, P> {
    pub(crate) fn item(&self) -> Option<P> {
        match self.kind {
            Kind::Leaf(p) => Some(p),
            Kind::Branch(_) => None,
        }
    }
}

/// A height-balanced binary bounding-volume hierarchy over [`Orthotope`]s.
///
/// Entries are distinguished by a caller-supplied identity value `P`, never by
/// box value: two value-equal boxes inserted under distinct identities are
/// distinct entries, and inserting the same identity twice is rejected.
/// Leaves hold a copy of the caller's box; branches hold synthesized bounding
/// boxes that always tightly enclose their two children.
///
/// Every branch keeps its children within one level of depth of each other.
/// Rebalancing is local and greedy, steered by [`Orthotope::score`]; tree
/// quality can drift below what [`Bvh::bulk_build`] produces over many
/// incremental updates, which is the intended trade for bounded per-update
/// cost. [`Bvh::score`] and [`Cursor::sah`] expose the quality for
/// diagnostics.
pub struct Bvh<const D: usize, P: Copy + Eq + Debug> {
    nodes: Vec<Node<D, P>>,
    free_list: Vec<usize>,
    root: Option<NodeIdx>,
    // Scratch path stack reused by insert/remove; bottom entry is the root.
    path: Vec<(NodeIdx, u8)>,
    len: usize,
}

impl<const D: usize, P: Copy + Eq + Debug> Default for Bvh<D, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize, P: Copy + Eq + Debug> Bvh<D, P> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: None,
            path: Vec::new(),
            len: 0,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Depth of the root; 0 for an empty or single-entry tree.
    pub fn depth(&self) -> u16 {
        self.root.map_or(0, |r| self.nodes[r.get()].depth)
    }

    /// Obtain a traversal handle positioned at the root.
    pub fn cursor(&self) -> Cursor<'_, D, P> {
        Cursor::new(self)
    }

    /// Total box score over every node, via a full traversal.
    pub fn score(&self) -> i64 {
        let mut walk = self.cursor();
        walk.score()
    }

    /// Insert an entry. Returns `false`, leaving the tree untouched, when an
    /// entry with the same identity is found along the descent path.
    pub fn insert(&mut self, item: P, bounds: Orthotope<D>) -> bool {
        let Some(root) = self.root else {
            let leaf = self.alloc(Node {
                bounds,
                depth: 0,
                kind: Kind::Leaf(item),
            });
            self.root = Some(leaf);
            self.len = 1;
            return true;
        };
        self.path.clear();
        let mut next = root;
        loop {
            match self.nodes[next.get()].kind {
                Kind::Leaf(existing) => {
                    if existing == item {
                        return false;
                    }
                    // Split: the leaf becomes a branch over the new entry and
                    // its former contents.
                    let old_bounds = self.nodes[next.get()].bounds;
                    let new_leaf = self.alloc(Node {
                        bounds,
                        depth: 0,
                        kind: Kind::Leaf(item),
                    });
                    let old_leaf = self.alloc(Node {
                        bounds: old_bounds,
                        depth: 0,
                        kind: Kind::Leaf(existing),
                    });
                    let split = &mut self.nodes[next.get()];
                    split.kind = Kind::Branch([new_leaf, old_leaf]);
                    split.depth = 1;
                    split.bounds = bounds.union(&old_bounds);
                    self.path.push((next, 0));
                    break;
                }
                Kind::Branch(ch) => {
                    // Greedy descent: the child whose box grows least.
                    let mut low = 0_u8;
                    let mut low_score = i64::MAX;
                    for index in 0..2_u8 {
                        let child = &self.nodes[ch[usize::from(index)].get()];
                        if let Kind::Leaf(p) = child.kind
                            && p == item
                        {
                            return false;
                        }
                        let score = bounds.union(&child.bounds).score();
                        if score < low_score {
                            low = index;
                            low_score = score;
                        }
                    }
                    self.path.push((next, low));
                    next = ch[usize::from(low)];
                }
            }
        }
        self.rebalance_insert();
        self.len += 1;
        true
    }

    /// Remove the entry with identity `item`, using `bounds` (the box it was
    /// inserted with) to guide the descent. Returns `false` when absent.
    ///
    /// The descent backtracks over every branch whose box contains `bounds`,
    /// so entries with ambiguous containment are still found.
    pub fn remove(&mut self, item: P, bounds: &Orthotope<D>) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        let mut path = core::mem::take(&mut self.path);
        path.clear();
        path.push((root, 0));
        if !self.locate(&mut path, item, bounds) {
            self.path = path;
            return false;
        }
        if let Some((leaf, _)) = path.pop() {
            if let Some((parent, pi)) = path.pop() {
                let sibling = self.children(parent)[usize::from(pi) ^ 1];
                if let Some(&(grand, gi)) = path.last() {
                    // Collapse one level: the grandparent adopts the sibling.
                    self.set_child(grand, usize::from(gi), sibling);
                    self.release(parent);
                    self.release(leaf);
                    self.rebalance_remove(&mut path);
                } else {
                    // The parent is the root: it absorbs the surviving child.
                    let s = sibling.get();
                    let (bounds, depth, kind) =
                        (self.nodes[s].bounds, self.nodes[s].depth, self.nodes[s].kind);
                    let p = &mut self.nodes[parent.get()];
                    p.bounds = bounds;
                    p.depth = depth;
                    p.kind = kind;
                    self.release(sibling);
                    self.release(leaf);
                }
            } else {
                // Root leaf: the tree becomes empty.
                self.release(leaf);
                self.root = None;
            }
            self.len -= 1;
        }
        self.path = path;
        true
    }

    /// Build a balanced tree from a batch in one shot, by recursive
    /// axis-choice median partitioning. The result has depth `⌈log2 n⌉` and
    /// is typically better packed than the same entries inserted one by one.
    ///
    /// Identities need not be unique here; duplicate boxes are fine either
    /// way.
    pub fn bulk_build(mut items: Vec<(P, Orthotope<D>)>) -> Self {
        let mut tree = Self::new();
        if items.is_empty() {
            return tree;
        }
        tree.len = items.len();
        let root = tree.build_range(&mut items);
        tree.root = Some(root);
        tree
    }

    /// Structural equality up to sibling-order swaps at every branch.
    pub fn same_shape(&self, other: &Self) -> bool {
        match (self.root, other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => self.shape_eq(a, other, b),
            _ => false,
        }
    }

    fn shape_eq(&self, a: NodeIdx, other: &Self, b: NodeIdx) -> bool {
        let na = &self.nodes[a.get()];
        let nb = &other.nodes[b.get()];
        match (na.kind, nb.kind) {
            (Kind::Leaf(pa), Kind::Leaf(pb)) => pa == pb && na.bounds == nb.bounds,
            (Kind::Branch([a0, a1]), Kind::Branch([b0, b1])) => {
                na.bounds == nb.bounds
                    && ((self.shape_eq(a0, other, b0) && self.shape_eq(a1, other, b1))
                        || (self.shape_eq(a0, other, b1) && self.shape_eq(a1, other, b0)))
            }
            _ => false,
        }
    }

    fn build_range(&mut self, items: &mut [(P, Orthotope<D>)]) -> NodeIdx {
        if let [(item, bounds)] = items {
            let (item, bounds) = (*item, *bounds);
            return self.alloc(Node {
                bounds,
                depth: 0,
                kind: Kind::Leaf(item),
            });
        }
        let mid = items.len() / 2;
        let mut low_dim = 0;
        let mut low_score = i64::MAX;
        for dim in 0..D {
            items.sort_by_key(|(_, o)| o.point[dim] + o.delta[dim]);
            let head = Orthotope::enclosing(items[..mid].iter().map(|(_, o)| o));
            let tail = Orthotope::enclosing(items[mid..].iter().map(|(_, o)| o));
            if let (Some(h), Some(t)) = (head, tail) {
                let score = h.score() + t.score();
                if score < low_score {
                    low_score = score;
                    low_dim = dim;
                }
            }
        }
        if low_dim < D - 1 {
            items.sort_by_key(|(_, o)| o.point[low_dim] + o.delta[low_dim]);
        }
        let (head, tail) = items.split_at_mut(mid);
        let c0 = self.build_range(head);
        let c1 = self.build_range(tail);
        let bounds = self.nodes[c0.get()].bounds.union(&self.nodes[c1.get()].bounds);
        let depth = self.depth_of(c0).max(self.depth_of(c1)) + 1;
        self.alloc(Node {
            bounds,
            depth,
            kind: Kind::Branch([c0, c1]),
        })
    }

    // ---- arena plumbing ----

    fn alloc(&mut self, node: Node<D, P>) -> NodeIdx {
        if let Some(i) = self.free_list.pop() {
            self.nodes[i] = node;
            NodeIdx::new(i)
        } else {
            self.nodes.push(node);
            NodeIdx::new(self.nodes.len() - 1)
        }
    }

    fn release(&mut self, n: NodeIdx) {
        self.free_list.push(n.get());
    }

    pub(crate) fn node(&self, n: NodeIdx) -> &Node<D, P> {
        &self.nodes[n.get()]
    }

    pub(crate) fn root(&self) -> Option<NodeIdx> {
        self.root
    }

    fn children(&self, n: NodeIdx) -> [NodeIdx; 2] {
        match self.nodes[n.get()].kind {
            Kind::Branch(ch) => ch,
            Kind::Leaf(_) => unreachable!("leaf node has no children"),
        }
    }

    fn set_child(&mut self, n: NodeIdx, slot: usize, child: NodeIdx) {
        match &mut self.nodes[n.get()].kind {
            Kind::Branch(ch) => ch[slot] = child,
            Kind::Leaf(_) => unreachable!("leaf node has no children"),
        }
    }

    fn depth_of(&self, n: NodeIdx) -> u16 {
        self.nodes[n.get()].depth
    }

    // Recompute a branch's bounds from its children.
    fn refit(&mut self, n: NodeIdx) {
        if let Kind::Branch([a, b]) = self.nodes[n.get()].kind {
            self.nodes[n.get()].bounds =
                self.nodes[a.get()].bounds.union(&self.nodes[b.get()].bounds);
        }
    }

    // Recompute a branch's depth from its children.
    fn redepth(&mut self, n: NodeIdx) {
        let [a, b] = self.children(n);
        self.nodes[n.get()].depth = self.depth_of(a).max(self.depth_of(b)) + 1;
    }

    fn swap_links(&mut self, first: NodeIdx, slot: usize, second: NodeIdx, sec_slot: usize) {
        let a = self.children(first)[slot];
        let b = self.children(second)[sec_slot];
        self.set_child(first, slot, b);
        self.set_child(second, sec_slot, a);
    }

    // ---- rebalancing ----

    /// Walk the recorded insertion path back to the root, restoring balance
    /// and tight bounds at each level.
    fn rebalance_insert(&mut self) {
        let mut path = core::mem::take(&mut self.path);
        let Some((mut grand, mut gi)) = path.pop() else {
            self.path = path;
            return;
        };
        while let Some((up, ui)) = path.pop() {
            let (parent, pi) = (grand, gi);
            (grand, gi) = (up, ui);

            let ai = gi ^ 1;
            let aunt = self.children(grand)[usize::from(ai)];
            let deep = self.children(parent)[usize::from(pi)];
            if self.depth_of(aunt) < self.depth_of(deep) {
                // Rotate the deeper grandchild up to restore balance.
                self.set_child(parent, usize::from(pi), aunt);
                self.set_child(grand, usize::from(ai), deep);
                self.redepth(parent);
            }
            self.redistribute(grand);
            self.refit(grand);
        }
        self.refit(grand);
        self.path = path;
    }

    /// Walk the recorded removal path back to the root. A removal can leave
    /// the untouched sibling two levels deeper; rotate one of its
    /// grandchildren up, preferring the one giving the cheaper union.
    fn rebalance_remove(&mut self, path: &mut Vec<(NodeIdx, u8)>) {
        while let Some((parent, pi)) = path.pop() {
            let pi = usize::from(pi);
            let kept = self.children(parent)[pi];
            let cousin = self.children(parent)[pi ^ 1];
            let depth = self.depth_of(kept);

            if self.depth_of(cousin) > depth + 1 {
                let [cc0, cc1] = self.children(cousin);
                let mut swap = 0;
                if self.depth_of(cc1) == depth + 1 {
                    if self.depth_of(cc0) == depth + 1 {
                        // Both grandchildren qualify; take the cheaper union.
                        let kept_bounds = self.nodes[kept.get()].bounds;
                        let s1 = self.nodes[cc1.get()].bounds.union(&kept_bounds).score();
                        let s0 = self.nodes[cc0.get()].bounds.union(&kept_bounds).score();
                        if s1 < s0 {
                            swap = 1;
                        }
                    } else {
                        swap = 1;
                    }
                }
                self.swap_links(parent, pi, cousin, swap);
                self.redepth(cousin);
                self.refit(cousin);
            }
            self.refit(parent);
            self.redistribute(parent);
        }
    }

    /// Rebalance the two children of `v`, trying one grandchild swap that
    /// lowers the combined box score without breaking balance.
    fn redistribute(&mut self, v: NodeIdx) {
        let [c0, c1] = self.children(v);
        let (d0, d1) = (self.depth_of(c0), self.depth_of(c1));
        if d1 > d0 {
            self.swap_check(c1, v, 0);
        } else if d1 < d0 {
            self.swap_check(c0, v, 1);
        } else if d1 > 0 {
            self.swap_check(c0, c1, 1);
        }
        self.redepth(v);
    }

    /// Trial-swap each child of `first` against `second`'s child in
    /// `sec_slot`, keeping whichever configuration minimizes the combined
    /// score of the two boxes. A trial that unbalances the receiving side is
    /// discarded. `first` may itself be a child of `second`.
    fn swap_check(&mut self, first: NodeIdx, second: NodeIdx, sec_slot: usize) {
        self.refit(first);
        self.refit(second);
        let mut min_score =
            self.nodes[first.get()].bounds.score() + self.nodes[second.get()].bounds.score();
        let mut best = None;

        for slot in 0..2 {
            self.swap_links(first, slot, second, sec_slot);

            let [s0, s1] = self.children(second);
            if self.depth_of(s0).abs_diff(self.depth_of(s1)) < 2 {
                // Score first then second, since first may sit under second.
                self.refit(first);
                self.refit(second);
                let score = self.nodes[first.get()].bounds.score()
                    + self.nodes[second.get()].bounds.score();
                if score < min_score {
                    min_score = score;
                    best = Some(slot);
                }
            }
        }

        // Both trial swaps are still applied at this point; step back to the
        // winning configuration (or all the way back when nothing improved).
        match best {
            Some(1) => {}
            Some(_) => {
                self.swap_links(first, 1, second, sec_slot);
                self.refit(first);
                self.refit(second);
            }
            None => {
                self.swap_links(first, 0, second, sec_slot);
                self.refit(first);
                self.refit(second);
            }
        }
        self.redepth(first);
        self.redepth(second);
    }

    // ---- containment-guided search ----

    /// Backtracking containment-guided descent. Explores every branch whose
    /// box contains `bounds`; on success the top of `stack` is the matching
    /// leaf. The caller seeds the stack with the root.
    pub(crate) fn locate(
        &self,
        stack: &mut Vec<(NodeIdx, u8)>,
        item: P,
        bounds: &Orthotope<D>,
    ) -> bool {
        while let Some(&(node, index)) = stack.last() {
            match self.nodes[node.get()].kind {
                Kind::Leaf(p) => {
                    if p == item {
                        return true;
                    }
                    if !self.step_up(stack) {
                        return false;
                    }
                }
                Kind::Branch(ch) => {
                    if index >= 2 {
                        if !self.step_up(stack) {
                            return false;
                        }
                    } else {
                        let child = ch[usize::from(index)];
                        if self.nodes[child.get()].bounds.contains(bounds) {
                            stack.push((child, 0));
                        } else if let Some(top) = stack.last_mut() {
                            top.1 += 1;
                        }
                    }
                }
            }
        }
        false
    }

    /// Climb until the stack's top has an unvisited child slot. Returns
    /// `false` when the walk is exhausted.
    pub(crate) fn step_up(&self, stack: &mut Vec<(NodeIdx, u8)>) -> bool {
        while let Some(&(node, index)) = stack.last() {
            let at_leaf = matches!(self.nodes[node.get()].kind, Kind::Leaf(_));
            if !at_leaf && index < 2 {
                return true;
            }
            stack.pop();
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            } else {
                return false;
            }
        }
        false
    }
}

impl<const D: usize, P: Copy + Eq + Debug> Debug for Bvh<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bvh")
            .field("len", &self.len)
            .field("depth", &self.depth())
            .field("nodes_total", &self.nodes.len())
            .field("free", &self.free_list.len())
            .finish_non_exhaustive()
    }
}

impl<const D: usize, P: Copy + Eq + Debug> fmt::Display for Bvh<D, P> {
    /// Indented multi-line dump: one line per node in pre-order, indented by
    /// how far below the root's depth it sits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let max_depth = self.depth();
        let mut walk = self.cursor();
        while let Some(visit) = walk.next() {
            for _ in 0..(max_depth - visit.depth) {
                write!(f, " ")?;
            }
            writeln!(f, "{}", visit.bounds)?;
        }
        Ok(())
    }
}

// Copyright 2025 the Orthovol Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The geometry primitive: axis-aligned integer hyperrectangles.

use core::fmt;

/// Fixed-point scale shift applied by [`Orthotope::intersects`] before the
/// parametric division, so integer ray distances keep sub-unit resolution.
pub const ACCURACY: u32 = 13;

/// An axis-aligned hyperrectangle in `D` dimensions: a minimum corner plus a
/// per-axis extent.
///
/// Extents are normally non-negative. When an `Orthotope` stands in for a ray,
/// `delta` is the direction instead: zero on an axis pins that coordinate,
/// negative reverses it. Zero-extent boxes (points) are valid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Orthotope<const D: usize> {
    /// Minimum corner.
    pub point: [i64; D],
    /// Per-axis extent (or direction, for rays).
    pub delta: [i64; D],
}

impl<const D: usize> Orthotope<D> {
    /// Create an orthotope from its minimum corner and per-axis extents.
    pub const fn new(point: [i64; D], delta: [i64; D]) -> Self {
        Self { point, delta }
    }

    /// Whether the two boxes intersect on every axis (closed intervals).
    pub fn overlaps(&self, other: &Self) -> bool {
        for i in 0..D {
            if self.point[i] > other.point[i] + other.delta[i]
                || other.point[i] > self.point[i] + self.delta[i]
            {
                return false;
            }
        }
        true
    }

    /// Whether `self`'s interval contains `other`'s interval on every axis.
    pub fn contains(&self, other: &Self) -> bool {
        for i in 0..D {
            if other.point[i] < self.point[i]
                || other.point[i] + other.delta[i] > self.point[i] + self.delta[i]
            {
                return false;
            }
        }
        true
    }

    /// The tightest box containing both `self` and `other`. Pure; neither
    /// argument is modified.
    pub fn union(&self, other: &Self) -> Self {
        let mut out = *self;
        for i in 0..D {
            let hi = (self.point[i] + self.delta[i]).max(other.point[i] + other.delta[i]);
            out.point[i] = self.point[i].min(other.point[i]);
            out.delta[i] = hi - out.point[i];
        }
        out
    }

    /// The tightest box containing every orthotope yielded by `items`, or
    /// `None` for an empty iterator.
    pub fn enclosing<'a, I>(items: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut it = items.into_iter();
        let mut acc = *it.next()?;
        for o in it {
            acc = acc.union(o);
        }
        Some(acc)
    }

    /// Slab-method ray/box test, with `self` as the ray.
    ///
    /// Returns the entry distance scaled by `1 << ACCURACY`, or `None` on a
    /// miss. A ray starting inside the box reports distance 0. Distances are
    /// only meaningful relative to other distances from the same ray.
    /// Coordinates must stay below `2^(62 - ACCURACY)` in magnitude to keep
    /// the scaled arithmetic exact.
    pub fn intersects(&self, target: &Self) -> Option<i64> {
        let mut in_t = 0_i64;
        let mut out_t = i64::MAX;
        for i in 0..D {
            let mut p0 = target.point[i];
            let mut p1 = p0 + target.delta[i];
            if self.delta[i] == 0 {
                // Pinned axis: the ray's coordinate must sit inside the slab.
                if self.point[i] < p0 || p1 < self.point[i] {
                    return None;
                }
            } else {
                if self.delta[i] < 0 {
                    core::mem::swap(&mut p0, &mut p1);
                }
                in_t = in_t.max(((p0 - self.point[i]) << ACCURACY) / self.delta[i]);
                out_t = out_t.min(((p1 - self.point[i]) << ACCURACY) / self.delta[i]);
            }
        }
        (in_t < out_t).then_some(in_t)
    }

    /// Sum of per-axis extents: the cheap cost proxy driving the insertion
    /// and rebalancing heuristics.
    pub fn score(&self) -> i64 {
        self.delta.iter().sum()
    }

    /// Product of per-axis extents.
    pub fn volume(&self) -> i64 {
        self.delta.iter().product()
    }

    /// Total surface area; 0 when `D == 1`. Safe for zero extents.
    pub fn surface_area(&self) -> i64 {
        if D == 1 {
            return 0;
        }
        let mut sa = 0_i64;
        for skip in 0..D {
            let mut face = 1_i64;
            for (i, d) in self.delta.iter().enumerate() {
                if i != skip {
                    face *= d;
                }
            }
            sa += face;
        }
        2 * sa
    }
}

impl<const D: usize> fmt::Display for Orthotope<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point {:?}, Delta {:?}", self.point, self.delta)
    }
}

//! Bounded top-k selection over a stream of `(rowid, distance)` candidates.
//!
//! Candidates are ranked by `(ranked distance, rowid)`. The ranked distance
//! is the exact distance rounded to a resolution relative to its own
//! magnitude, so rows whose distances differ only by float rounding fall
//! back to ascending rowid while distinct small distances keep their order.
//! Reported distances are never rounded.
//!
//! - Push: O(log k)
//! - Memory: O(k)

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One KNN result row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub rowid: i64,
    /// Exact distance from the query
    pub distance: f64,
}

impl Neighbor {
    pub fn new(rowid: i64, distance: f64) -> Self {
        Self { rowid, distance }
    }
}

/// Distance as used for ordering
///
/// Rounded to `resolution` times the distance's decimal magnitude, so
/// `resolution = 1e-6` keeps about six significant digits at every scale.
/// The result is monotone in `distance`. `resolution <= 0` keeps it exact.
#[inline]
pub fn rank_key(distance: f64, resolution: f64) -> f64 {
    if resolution <= 0.0 || distance == 0.0 || !distance.is_finite() {
        return distance;
    }
    let magnitude = 10f64.powi(distance.abs().log10().floor() as i32);
    let step = magnitude * resolution;
    (distance / step).round() * step
}

#[derive(Debug, Clone, Copy)]
struct Ranked {
    key: f64,
    neighbor: Neighbor,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then(self.neighbor.rowid.cmp(&other.neighbor.rowid))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Max-heap of the best `k` candidates seen so far
#[derive(Debug)]
pub struct TopK {
    k: Option<usize>,
    resolution: f64,
    heap: BinaryHeap<Ranked>,
}

impl TopK {
    /// Keep the `k` closest candidates
    pub fn new(k: usize, resolution: f64) -> Self {
        Self {
            k: Some(k),
            resolution,
            heap: BinaryHeap::with_capacity(k.min(1024)),
        }
    }

    /// Keep every candidate (a full sort)
    pub fn unbounded(resolution: f64) -> Self {
        Self {
            k: None,
            resolution,
            heap: BinaryHeap::new(),
        }
    }

    /// Offer a candidate; returns whether it is currently kept
    pub fn push(&mut self, rowid: i64, distance: f64) -> bool {
        let candidate = Ranked {
            key: rank_key(distance, self.resolution),
            neighbor: Neighbor::new(rowid, distance),
        };
        match self.k {
            Some(0) => false,
            Some(k) if self.heap.len() >= k => match self.heap.peek() {
                Some(worst) if candidate < *worst => {
                    self.heap.pop();
                    self.heap.push(candidate);
                    true
                }
                _ => false,
            },
            _ => {
                self.heap.push(candidate);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Closest first, ties by ascending rowid
    pub fn into_sorted_vec(self) -> Vec<Neighbor> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| ranked.neighbor)
            .collect()
    }
}

//! Range statistics over per-segment traffic values.
//!
//! The tree is stored as an array with the children of node `i` at `2i + 1`
//! and `2i + 2`. Every node caches the max, min and sum of its range.

use serde::{Deserialize, Serialize};

use crate::{DispatchError, Result};

/// Aggregates over an inclusive range of segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeStats {
    pub max: i64,
    pub min: i64,
    /// Saturates at the `i64` bounds.
    pub sum: i64,
    pub count: usize,
}

impl RangeStats {
    fn leaf(value: i64) -> Self {
        Self {
            max: value,
            min: value,
            sum: value,
            count: 1,
        }
    }

    fn merge(self, other: RangeStats) -> Self {
        Self {
            max: self.max.max(other.max),
            min: self.min.min(other.min),
            sum: self.sum.saturating_add(other.sum),
            count: self.count + other.count,
        }
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SegmentTree {
    nodes: Vec<RangeStats>,
    values: Vec<i64>,
}

impl SegmentTree {
    pub fn new(values: Vec<i64>) -> Self {
        let mut tree = Self {
            nodes: vec![RangeStats::leaf(0); 4 * values.len().max(1)],
            values,
        };
        if !tree.values.is_empty() {
            tree.build(0, 0, tree.values.len() - 1);
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<i64> {
        self.values.get(index).copied()
    }

    pub fn contains_range(&self, left: usize, right: usize) -> bool {
        left <= right && right < self.values.len()
    }

    fn build(&mut self, node: usize, start: usize, end: usize) {
        if start == end {
            self.nodes[node] = RangeStats::leaf(self.values[start]);
            return;
        }
        let mid = start + (end - start) / 2;
        self.build(2 * node + 1, start, mid);
        self.build(2 * node + 2, mid + 1, end);
        self.nodes[node] = self.nodes[2 * node + 1].merge(self.nodes[2 * node + 2]);
    }

    /// Max, min, sum and count over `[left, right]`.
    pub fn stats(&self, left: usize, right: usize) -> Result<RangeStats> {
        if !self.contains_range(left, right) {
            return Err(DispatchError::InvalidRange {
                left,
                right,
                len: self.values.len(),
            });
        }
        Ok(self.query(0, 0, self.values.len() - 1, left, right))
    }

    fn query(&self, node: usize, start: usize, end: usize, left: usize, right: usize) -> RangeStats {
        if left <= start && end <= right {
            return self.nodes[node];
        }
        let mid = start + (end - start) / 2;
        if right <= mid {
            self.query(2 * node + 1, start, mid, left, right)
        } else if left > mid {
            self.query(2 * node + 2, mid + 1, end, left, right)
        } else {
            self.query(2 * node + 1, start, mid, left, right)
                .merge(self.query(2 * node + 2, mid + 1, end, left, right))
        }
    }

    /// Highest value in `[left, right]`; 0 for an invalid range.
    pub fn query_max(&self, left: usize, right: usize) -> i64 {
        self.stats(left, right).map(|s| s.max).unwrap_or(0)
    }

    /// Lowest value in `[left, right]`; 0 for an invalid range.
    pub fn query_min(&self, left: usize, right: usize) -> i64 {
        self.stats(left, right).map(|s| s.min).unwrap_or(0)
    }

    /// Mean value over `[left, right]`; 0.0 for an invalid range.
    pub fn query_average(&self, left: usize, right: usize) -> f64 {
        self.stats(left, right).map(|s| s.average()).unwrap_or(0.0)
    }

    /// Overwrites one segment's value.
    pub fn update(&mut self, index: usize, value: i64) -> Result<()> {
        if index >= self.values.len() {
            return Err(DispatchError::InvalidRange {
                left: index,
                right: index,
                len: self.values.len(),
            });
        }
        self.values[index] = value;
        self.update_node(0, 0, self.values.len() - 1, index, value);
        Ok(())
    }

    fn update_node(&mut self, node: usize, start: usize, end: usize, index: usize, value: i64) {
        if start == end {
            self.nodes[node] = RangeStats::leaf(value);
            return;
        }
        let mid = start + (end - start) / 2;
        if index <= mid {
            self.update_node(2 * node + 1, start, mid, index, value);
        } else {
            self.update_node(2 * node + 2, mid + 1, end, index, value);
        }
        self.nodes[node] = self.nodes[2 * node + 1].merge(self.nodes[2 * node + 2]);
    }
}

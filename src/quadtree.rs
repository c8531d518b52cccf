//! Quadtree proximity index over location coordinates
//!
//! Each leaf holds up to `leaf_capacity` entries. Inserting into a full leaf
//! splits it into four quadrants and pushes its entries down. The tree stores
//! lightweight copies (id and point) rather than the registry's locations.

use serde::{Deserialize, Serialize};

use crate::model::{LocationId, Point};
use crate::{DispatchError, Result};

/// Stop splitting below this depth. Leaves at the limit grow past capacity,
/// which only happens when many points share (nearly) the same coordinate.
const MAX_DEPTH: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadEntry {
    pub id: LocationId,
    pub point: Point,
}

/// Axis-aligned region given by its center and half extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub center: Point,
    pub half_width: f64,
    pub half_height: f64,
}

impl Bounds {
    pub const fn new(center: Point, half_width: f64, half_height: f64) -> Self {
        Self {
            center,
            half_width,
            half_height,
        }
    }

    /// Edges are inclusive.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.center.x - self.half_width
            && point.x <= self.center.x + self.half_width
            && point.y >= self.center.y - self.half_height
            && point.y <= self.center.y + self.half_height
    }

    /// Distance from `point` to the nearest point of the region (0 inside).
    fn distance_to(&self, point: Point) -> f64 {
        let closest = Point::new(
            point.x.clamp(self.center.x - self.half_width, self.center.x + self.half_width),
            point.y.clamp(self.center.y - self.half_height, self.center.y + self.half_height),
        );
        point.distance_to(closest)
    }

    /// Quadrant index of `point` in [NW, NE, SW, SE] order. Points on a
    /// split line belong to the east/north side.
    fn quadrant(&self, point: Point) -> usize {
        let east = point.x >= self.center.x;
        let north = point.y >= self.center.y;
        match (north, east) {
            (true, false) => 0,
            (true, true) => 1,
            (false, false) => 2,
            (false, true) => 3,
        }
    }

    fn split(&self) -> [Bounds; 4] {
        let hw = self.half_width / 2.0;
        let hh = self.half_height / 2.0;
        let Point { x, y } = self.center;
        [
            Bounds::new(Point::new(x - hw, y + hh), hw, hh),
            Bounds::new(Point::new(x + hw, y + hh), hw, hh),
            Bounds::new(Point::new(x - hw, y - hh), hw, hh),
            Bounds::new(Point::new(x + hw, y - hh), hw, hh),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct QuadtreeConfig {
    pub bounds: Bounds,
    pub leaf_capacity: usize,
}

impl Default for QuadtreeConfig {
    /// Whole-globe bounds in (longitude, latitude) with the leaf size of 4.
    fn default() -> Self {
        Self {
            bounds: Bounds::new(Point::new(0.0, 0.0), 180.0, 90.0),
            leaf_capacity: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Quadtree {
    root: QuadNode,
    leaf_capacity: usize,
    len: usize,
}

#[derive(Debug, Clone)]
struct QuadNode {
    bounds: Bounds,
    depth: u32,
    entries: Vec<QuadEntry>,
    /// NW, NE, SW, SE once subdivided. Entries live only in leaves.
    children: Option<Box<[QuadNode; 4]>>,
}

impl Quadtree {
    pub fn new(config: QuadtreeConfig) -> Self {
        Self {
            root: QuadNode::new(config.bounds, 0),
            leaf_capacity: config.leaf_capacity.max(1),
            len: 0,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.root.bounds
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a point. Points outside the root bounds are rejected rather
    /// than dropped.
    pub fn insert(&mut self, id: LocationId, point: Point) -> Result<()> {
        if !self.root.bounds.contains(point) {
            return Err(DispatchError::OutOfBounds {
                x: point.x,
                y: point.y,
            });
        }
        self.root.insert(QuadEntry { id, point }, self.leaf_capacity);
        self.len += 1;
        Ok(())
    }

    /// All entries within `radius` of `center`, edge inclusive.
    pub fn radius_search(&self, center: Point, radius: f64) -> Vec<QuadEntry> {
        let mut results = Vec::new();
        self.root.radius_search(center, radius, &mut results);
        results
    }

    /// The entry closest to `point`. The first one found wins ties.
    pub fn find_nearest(&self, point: Point) -> Option<QuadEntry> {
        let mut best = None;
        let mut best_distance = f64::INFINITY;
        self.root.find_nearest(point, &mut best, &mut best_distance);
        best
    }

    /// Total number of nodes, leaves included.
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Depth of the deepest leaf (0 for an unsplit root).
    pub fn depth(&self) -> u32 {
        self.root.max_depth()
    }
}

impl QuadNode {
    fn new(bounds: Bounds, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, entry: QuadEntry, capacity: usize) {
        if let Some(children) = &mut self.children {
            children[self.bounds.quadrant(entry.point)].insert(entry, capacity);
            return;
        }

        if self.entries.len() < capacity || self.depth >= MAX_DEPTH {
            self.entries.push(entry);
            return;
        }

        self.subdivide(capacity);
        if let Some(children) = &mut self.children {
            children[self.bounds.quadrant(entry.point)].insert(entry, capacity);
        }
    }

    fn subdivide(&mut self, capacity: usize) {
        let [nw, ne, sw, se] = self.bounds.split();
        let depth = self.depth + 1;
        let mut children = Box::new([
            QuadNode::new(nw, depth),
            QuadNode::new(ne, depth),
            QuadNode::new(sw, depth),
            QuadNode::new(se, depth),
        ]);

        for entry in self.entries.drain(..) {
            children[self.bounds.quadrant(entry.point)].insert(entry, capacity);
        }
        self.children = Some(children);
    }

    fn radius_search(&self, center: Point, radius: f64, results: &mut Vec<QuadEntry>) {
        if self.bounds.distance_to(center) > radius {
            return;
        }

        match &self.children {
            Some(children) => {
                for child in children.iter() {
                    child.radius_search(center, radius, results);
                }
            }
            None => results.extend(
                self.entries
                    .iter()
                    .filter(|entry| entry.point.distance_to(center) <= radius),
            ),
        }
    }

    fn find_nearest(&self, point: Point, best: &mut Option<QuadEntry>, best_distance: &mut f64) {
        if self.bounds.distance_to(point) > *best_distance {
            return;
        }

        match &self.children {
            Some(children) => {
                for child in children.iter() {
                    child.find_nearest(point, best, best_distance);
                }
            }
            None => {
                for entry in &self.entries {
                    let distance = entry.point.distance_to(point);
                    if distance < *best_distance {
                        *best_distance = distance;
                        *best = Some(*entry);
                    }
                }
            }
        }
    }

    fn node_count(&self) -> usize {
        1 + self
            .children
            .as_ref()
            .map(|children| children.iter().map(QuadNode::node_count).sum())
            .unwrap_or(0)
    }

    fn max_depth(&self) -> u32 {
        self.children
            .as_ref()
            .map(|children| children.iter().map(QuadNode::max_depth).max().unwrap_or(self.depth))
            .unwrap_or(self.depth)
    }

    #[cfg(test)]
    fn leaf_entries(&self) -> Vec<QuadEntry> {
        match &self.children {
            Some(children) => children.iter().flat_map(QuadNode::leaf_entries).collect(),
            None => self.entries.clone(),
        }
    }
}

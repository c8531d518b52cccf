//! Route optimization helpers (stateless).
//!
//! These take caller-owned collections and return orderings, selections and
//! groupings that the scheduler and the dispatch pass consume.

use std::cmp::Ordering;

use crate::model::{Delivery, Location, LocationId, Priority};
use crate::network::RoadNetwork;

// ============================================================================
// Ordering and selection
// ============================================================================

/// Canonical delivery order: deadline ascending, then priority descending.
pub fn canonical_order(a: &Delivery, b: &Delivery) -> Ordering {
    a.deadline
        .cmp(&b.deadline)
        .then_with(|| b.priority.cmp(&a.priority))
}

/// Stable sort by [`canonical_order`]. Deliveries that compare equal keep
/// their input order, so sorting a sorted list returns it unchanged.
pub fn sort_deliveries(deliveries: &[Delivery]) -> Vec<Delivery> {
    let mut sorted = deliveries.to_vec();
    sorted.sort_by(canonical_order);
    sorted
}

/// Greedy selection of deliveries with distinct deadlines.
///
/// Deliveries are ordered by deadline (stable), the first is taken, and each
/// later one is taken when its deadline differs from the last one taken.
/// Two deliveries conflict only when their deadlines are equal; real time
/// windows are not modelled.
pub fn select_non_overlapping(deliveries: &[Delivery]) -> Vec<&Delivery> {
    let mut by_deadline: Vec<&Delivery> = deliveries.iter().collect();
    by_deadline.sort_by(|a, b| a.deadline.cmp(&b.deadline));

    let mut selected: Vec<&Delivery> = Vec::new();
    for delivery in by_deadline {
        let conflicts = selected
            .last()
            .is_some_and(|last| last.deadline == delivery.deadline);
        if !conflicts {
            selected.push(delivery);
        }
    }
    selected
}

/// Index of `id` in a slice sorted by id.
pub fn position_by_id(sorted_by_id: &[Delivery], id: &str) -> Option<usize> {
    sorted_by_id
        .binary_search_by(|delivery| delivery.id.as_str().cmp(id))
        .ok()
}

// ============================================================================
// Load planning
// ============================================================================

/// A candidate load for [`fractional_knapsack`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadItem {
    pub id: String,
    pub weight: f64,
    pub value: f64,
}

impl LoadItem {
    /// Values a delivery by its priority (High 3, Medium 2, Low 1).
    pub fn for_delivery(delivery: &Delivery) -> Self {
        let value = match delivery.priority {
            Priority::High => 3.0,
            Priority::Medium => 2.0,
            Priority::Low => 1.0,
        };
        Self {
            id: delivery.id.clone(),
            weight: delivery.weight,
            value,
        }
    }

    /// Value per unit weight. Weightless items are rated by value alone.
    pub fn ratio(&self) -> f64 {
        let weight = if self.weight > 0.0 { self.weight } else { 1.0 };
        self.value / weight
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadPlan {
    pub total_value: f64,
    /// Amount of each item taken, aligned with the input slice.
    pub amounts: Vec<f64>,
}

/// Fills `capacity` in descending value/weight order, taking a fraction of
/// the first item that does not fit whole and stopping there.
pub fn fractional_knapsack(items: &[LoadItem], capacity: f64) -> LoadPlan {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| items[b].ratio().total_cmp(&items[a].ratio()));

    let mut amounts = vec![0.0; items.len()];
    let mut remaining = capacity.max(0.0);
    let mut total_value = 0.0;

    for index in order {
        let item = &items[index];
        if remaining >= item.weight {
            amounts[index] = item.weight;
            total_value += item.value;
            remaining -= item.weight;
        } else {
            let fraction = remaining / item.weight;
            amounts[index] = remaining;
            total_value += item.value * fraction;
            break;
        }
    }

    LoadPlan {
        total_value,
        amounts,
    }
}

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPair<'a> {
    pub first: &'a Location,
    pub second: &'a Location,
    pub distance: f64,
}

/// The two locations nearest each other. `None` with fewer than two.
///
/// Divide and conquer over x-sorted points; the merge step scans a strip
/// around the split line, sorted by y, no wider than the best distance so far.
pub fn closest_pair(locations: &[Location]) -> Option<ClosestPair<'_>> {
    if locations.len() < 2 {
        return None;
    }

    let mut by_x: Vec<usize> = (0..locations.len()).collect();
    by_x.sort_by(|&a, &b| locations[a].point.x.total_cmp(&locations[b].point.x));

    let (first, second, distance) = closest_in(locations, &by_x);
    Some(ClosestPair {
        first: &locations[first],
        second: &locations[second],
        distance,
    })
}

fn distance(locations: &[Location], a: usize, b: usize) -> f64 {
    locations[a].point.distance_to(locations[b].point)
}

fn closest_brute_force(locations: &[Location], indices: &[usize]) -> (usize, usize, f64) {
    let mut best = (indices[0], indices[1], f64::INFINITY);
    for (k, &a) in indices.iter().enumerate() {
        for &b in &indices[k + 1..] {
            let d = distance(locations, a, b);
            if d < best.2 {
                best = (a, b, d);
            }
        }
    }
    best
}

fn closest_in(locations: &[Location], by_x: &[usize]) -> (usize, usize, f64) {
    if by_x.len() <= 3 {
        return closest_brute_force(locations, by_x);
    }

    let mid = by_x.len() / 2;
    let mid_x = locations[by_x[mid]].point.x;
    let left = closest_in(locations, &by_x[..mid]);
    let right = closest_in(locations, &by_x[mid..]);
    let mut best = if right.2 < left.2 { right } else { left };

    let mut strip: Vec<usize> = by_x
        .iter()
        .copied()
        .filter(|&i| (locations[i].point.x - mid_x).abs() < best.2)
        .collect();
    strip.sort_by(|&a, &b| locations[a].point.y.total_cmp(&locations[b].point.y));

    for (k, &a) in strip.iter().enumerate() {
        for &b in &strip[k + 1..] {
            if locations[b].point.y - locations[a].point.y >= best.2 {
                break;
            }
            let d = distance(locations, a, b);
            if d < best.2 {
                best = (a, b, d);
            }
        }
    }
    best
}

/// Groups locations into `num_zones` buckets by a grid over their bounding box.
///
/// The grid has `ceil(sqrt(num_zones))` cells per side; a cell's row-major
/// index is clamped into the last bucket. With no more locations than zones
/// each location gets a zone of its own.
pub fn partition_zones(locations: &[Location], num_zones: usize) -> Vec<Vec<&Location>> {
    if num_zones == 0 {
        return Vec::new();
    }
    let mut zones: Vec<Vec<&Location>> = vec![Vec::new(); num_zones];
    if locations.is_empty() {
        return zones;
    }
    if locations.len() <= num_zones {
        for (zone, location) in zones.iter_mut().zip(locations) {
            zone.push(location);
        }
        return zones;
    }

    let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);
    for location in locations {
        min_lat = min_lat.min(location.latitude());
        max_lat = max_lat.max(location.latitude());
        min_lon = min_lon.min(location.longitude());
        max_lon = max_lon.max(location.longitude());
    }

    let grid = (num_zones as f64).sqrt().ceil() as usize;
    let lat_step = (max_lat - min_lat) / grid as f64;
    let lon_step = (max_lon - min_lon) / grid as f64;

    for location in locations {
        let lat_cell = (((location.latitude() - min_lat) / (lat_step + 1e-9)) as usize).min(grid - 1);
        let lon_cell = (((location.longitude() - min_lon) / (lon_step + 1e-9)) as usize).min(grid - 1);
        let zone = (lat_cell * grid + lon_cell).min(num_zones - 1);
        zones[zone].push(location);
    }

    zones
}

/// Picks the unvisited node reachable from `current` over the cheapest direct
/// edge, falling back to the first unvisited node when none is adjacent.
pub fn greedy_next_destination(
    current: LocationId,
    unvisited: &[LocationId],
    network: &RoadNetwork,
) -> Option<LocationId> {
    let fallback = *unvisited.first()?;
    let nearest = network
        .edges_from(current)
        .iter()
        .filter(|edge| unvisited.contains(&edge.to))
        .min_by(|a, b| a.weight.total_cmp(&b.weight));
    Some(nearest.map(|edge| edge.to).unwrap_or(fallback))
}

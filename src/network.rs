//! Directed, weighted road graph.
//!
//! Nodes are location ids. A node exists once it has been added explicitly
//! with [`RoadNetwork::add_node`] or referenced by [`RoadNetwork::add_edge`],
//! which creates both endpoints. Removing a node's edges only drops the
//! outgoing ones: incoming edges and the node itself stay, so other nodes can
//! still route *to* it.
//!
//! Edge weights are not validated. Dijkstra assumes they are non-negative;
//! paths computed over negative weights are unspecified.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::model::LocationId;
use crate::traits::PathFinder;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadEdge {
    pub to: LocationId,
    pub weight: f64,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkOptions {
    /// Upper bound on nodes settled by a single shortest-path search.
    /// `None` searches the whole reachable component.
    pub max_settled_nodes: Option<usize>,
}

/// A shortest path and its total weight.
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    pub nodes: Vec<LocationId>,
    pub cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    adjacency: HashMap<LocationId, Vec<RoadEdge>>,
    options: NetworkOptions,
}

/// Frontier entry. Ordered so the max-heap pops the smallest cost first and,
/// among equal costs, the entry discovered first.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    seq: u64,
    node: LocationId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: NetworkOptions) -> Self {
        Self {
            adjacency: HashMap::new(),
            options,
        }
    }

    pub fn options(&self) -> &NetworkOptions {
        &self.options
    }

    /// Adds `node` with no edges. No-op if it already exists.
    pub fn add_node(&mut self, node: LocationId) {
        self.adjacency.entry(node).or_default();
    }

    /// Adds a directed edge, creating either endpoint if needed. Parallel
    /// edges between the same pair are kept.
    pub fn add_edge(&mut self, source: LocationId, destination: LocationId, weight: f64) {
        self.add_node(destination);
        self.adjacency.entry(source).or_default().push(RoadEdge {
            to: destination,
            weight,
        });
    }

    /// Drops every outgoing edge of `node`. Returns how many were removed.
    pub fn remove_edges_from(&mut self, node: LocationId) -> usize {
        self.adjacency
            .get_mut(&node)
            .map(|edges| edges.drain(..).count())
            .unwrap_or(0)
    }

    /// Sets the weight of the first `source -> destination` edge. Returns
    /// false if there is no such edge.
    pub fn update_edge_weight(
        &mut self,
        source: LocationId,
        destination: LocationId,
        weight: f64,
    ) -> bool {
        let edge = self
            .adjacency
            .get_mut(&source)
            .and_then(|edges| edges.iter_mut().find(|edge| edge.to == destination));

        match edge {
            Some(edge) => {
                edge.weight = weight;
                true
            }
            None => false,
        }
    }

    pub fn contains_node(&self, node: LocationId) -> bool {
        self.adjacency.contains_key(&node)
    }

    /// Outgoing edges of `node` in insertion order.
    pub fn edges_from(&self, node: LocationId) -> &[RoadEdge] {
        self.adjacency
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    /// Node ids on the cheapest path, or empty if there is none.
    pub fn shortest_path(&self, source: LocationId, destination: LocationId) -> Vec<LocationId> {
        self.shortest_route(source, destination)
            .map(|route| route.nodes)
            .unwrap_or_default()
    }

    /// Dijkstra from `source`, stopping once `destination` is settled.
    ///
    /// Among equally cheap frontier entries the one discovered first is
    /// expanded first, and a node's predecessor only changes on a strictly
    /// cheaper path, so equal-cost alternatives resolve to the earliest
    /// discovered one.
    pub fn shortest_route(&self, source: LocationId, destination: LocationId) -> Option<PathResult> {
        if !self.contains_node(source) || !self.contains_node(destination) {
            return None;
        }
        if source == destination {
            return Some(PathResult {
                nodes: vec![source],
                cost: 0.0,
            });
        }

        let mut dist: HashMap<LocationId, f64> = HashMap::new();
        let mut prev: HashMap<LocationId, LocationId> = HashMap::new();
        let mut settled: HashSet<LocationId> = HashSet::new();
        let mut frontier = BinaryHeap::new();
        let mut seq = 0u64;

        dist.insert(source, 0.0);
        frontier.push(Frontier {
            cost: 0.0,
            seq,
            node: source,
        });

        while let Some(Frontier { cost, node, .. }) = frontier.pop() {
            if !settled.insert(node) {
                continue;
            }
            if node == destination {
                return Some(PathResult {
                    nodes: reconstruct(&prev, source, destination),
                    cost,
                });
            }
            if let Some(limit) = self.options.max_settled_nodes {
                if settled.len() >= limit {
                    tracing::debug!(source, destination, limit, "shortest path search limit reached");
                    return None;
                }
            }

            for edge in self.edges_from(node) {
                if settled.contains(&edge.to) {
                    continue;
                }
                let candidate = cost + edge.weight;
                let improved = dist
                    .get(&edge.to)
                    .is_none_or(|&known| candidate < known);
                if improved {
                    dist.insert(edge.to, candidate);
                    prev.insert(edge.to, node);
                    seq += 1;
                    frontier.push(Frontier {
                        cost: candidate,
                        seq,
                        node: edge.to,
                    });
                }
            }
        }

        None
    }

    /// Shortest paths for many pairs, computed in parallel. Results are in
    /// input order.
    pub fn shortest_paths(&self, pairs: &[(LocationId, LocationId)]) -> Vec<Vec<LocationId>> {
        pairs
            .par_iter()
            .map(|&(source, destination)| self.shortest_path(source, destination))
            .collect()
    }

    /// Breadth-first visitation order from `start`. Empty if `start` is not
    /// a node.
    pub fn bfs(&self, start: LocationId) -> Vec<LocationId> {
        if !self.contains_node(start) {
            return Vec::new();
        }

        let mut order = Vec::new();
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for edge in self.edges_from(node) {
                if visited.insert(edge.to) {
                    queue.push_back(edge.to);
                }
            }
        }

        order
    }

    /// Depth-first pre-order from `start`, taking neighbours in edge
    /// insertion order. Empty if `start` is not a node.
    pub fn dfs(&self, start: LocationId) -> Vec<LocationId> {
        if !self.contains_node(start) {
            return Vec::new();
        }

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            order.push(node);
            for edge in self.edges_from(node).iter().rev() {
                if !visited.contains(&edge.to) {
                    stack.push(edge.to);
                }
            }
        }

        order
    }
}

fn reconstruct(
    prev: &HashMap<LocationId, LocationId>,
    source: LocationId,
    destination: LocationId,
) -> Vec<LocationId> {
    let mut nodes = vec![destination];
    let mut current = destination;
    while current != source {
        match prev.get(&current) {
            Some(&parent) => {
                nodes.push(parent);
                current = parent;
            }
            None => break,
        }
    }
    nodes.reverse();
    nodes
}

impl PathFinder for RoadNetwork {
    fn find_path(&self, source: LocationId, destination: LocationId) -> Vec<LocationId> {
        self.shortest_path(source, destination)
    }
}

//! city-dispatch core
//!
//! Assigns time-sensitive deliveries to vehicles travelling on a weighted
//! road graph, with spatial and temporal indexes backing the assignment
//! decisions.
//!
//! # Components
//!
//! - **[`network::RoadNetwork`]**: directed road graph with Dijkstra, BFS and DFS
//! - **[`quadtree::Quadtree`]**: proximity index over location coordinates
//! - **[`deadline_index::DeadlineIndex`]**: deliveries ordered by deadline
//! - **[`segment_tree::SegmentTree`]**: range statistics over road traffic
//! - **[`optimizer`]**: sorting, selection, load and zone planning helpers
//! - **[`scheduler::DeliveryScheduler`]**: pending queue and assignment protocol
//! - **[`system::DispatchSystem`]**: composition of all of the above

pub mod deadline_index;
pub mod loader;
pub mod model;
pub mod network;
pub mod optimizer;
pub mod quadtree;
pub mod registry;
pub mod scheduler;
pub mod segment_tree;
pub mod system;
pub mod traits;

/// Errors raised by the dispatch core. None of them is fatal; every variant
/// leaves the structures it came from in a consistent state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("vehicle {vehicle_id} (capacity {capacity}) cannot carry delivery {delivery_id} ({weight})")]
    CapacityExceeded {
        delivery_id: String,
        vehicle_id: String,
        capacity: f64,
        weight: f64,
    },

    #[error("no route from {origin} to {destination}")]
    RouteUnavailable { origin: String, destination: String },

    #[error("expected delivery {requested}, found {found}")]
    IdentityMismatch { requested: String, found: String },

    #[error("no pending deliveries")]
    EmptyQueue,

    #[error("delivery {0} is already pending or in transit")]
    AlreadyScheduled(String),

    #[error("point ({x}, {y}) lies outside the index bounds")]
    OutOfBounds { x: f64, y: f64 },

    #[error("segment range [{left}, {right}] is invalid for {len} segments")]
    InvalidRange { left: usize, right: usize, len: usize },
}

impl DispatchError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        DispatchError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors raised while reading entity tables.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DispatchError::not_found("vehicle", "V009");
        assert_eq!(err.to_string(), "vehicle not found: V009");

        let err = DispatchError::IdentityMismatch {
            requested: "D2".into(),
            found: "D1".into(),
        };
        assert_eq!(err.to_string(), "expected delivery D2, found D1");
    }
}

//! Seams between the dispatch core and its collaborators.
//!
//! The scheduler only needs a way to find paths, and the system only needs a
//! way to obtain typed records. Both are traits so callers can substitute
//! their own graph or storage.

use std::hash::Hash;

use crate::LoadError;
use crate::model::{Delivery, Location, LocationId, Road, TrafficEvent, Vehicle};

/// Unique identifier for registry entities.
pub trait Id: Clone + Eq + Hash {}

impl<T> Id for T where T: Clone + Eq + Hash {}

/// An entity stored in a [`Registry`](crate::registry::Registry).
pub trait Keyed {
    type Key: Id;

    fn key(&self) -> &Self::Key;

    /// Secondary lookup name, if the entity has one.
    fn alias(&self) -> Option<&str> {
        None
    }
}

/// Computes routes between graph nodes.
pub trait PathFinder {
    /// Ordered node ids from `source` to `destination`, or empty if there is
    /// no path.
    fn find_path(&self, source: LocationId, destination: LocationId) -> Vec<LocationId>;
}

/// Records produced by a [`DataSource`], with the number of rows that were
/// rejected while reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

impl<T> Loaded<T> {
    pub fn new(records: Vec<T>, skipped: usize) -> Self {
        Self { records, skipped }
    }
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }
}

/// Supplies the entity tables the dispatch system is built from.
pub trait DataSource {
    fn locations(&self) -> Result<Loaded<Location>, LoadError>;

    fn vehicles(&self) -> Result<Loaded<Vehicle>, LoadError>;

    fn deliveries(&self) -> Result<Loaded<Delivery>, LoadError>;

    fn traffic_events(&self) -> Result<Loaded<TrafficEvent>, LoadError>;

    /// Road records in segment-index order.
    fn roads(&self) -> Result<Loaded<Road>, LoadError>;
}

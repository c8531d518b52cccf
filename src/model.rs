//! Entity types shared by the registries, indexes, and scheduler.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::traits::Keyed;

/// Location identifier as loaded from the locations table.
pub type LocationId = u32;

/// Vehicle identifier (e.g. `V001`).
pub type VehicleId = String;

/// Delivery identifier.
pub type DeliveryId = String;

/// Planar coordinate. `x` carries longitude and `y` latitude.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub point: Point,
    pub details: String,
}

impl Location {
    pub fn new(id: LocationId, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            name: name.into(),
            point: Point::new(longitude, latitude),
            details: String::new(),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.point.y
    }

    pub fn longitude(&self) -> f64 {
        self.point.x
    }
}

impl Keyed for Location {
    type Key = LocationId;

    fn key(&self) -> &Self::Key {
        &self.id
    }

    fn alias(&self) -> Option<&str> {
        Some(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VehicleStatus {
    #[default]
    Active,
    Maintenance,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    /// Maximum load in kilograms. Never negative.
    pub capacity: f64,
    pub status: VehicleStatus,
    pub speed_kmh: Option<f64>,
    /// Name of the location the vehicle starts from.
    pub start_location: Option<String>,
}

impl Vehicle {
    pub fn new(id: impl Into<VehicleId>, capacity: f64) -> Self {
        Self {
            id: id.into(),
            capacity,
            status: VehicleStatus::Active,
            speed_kmh: None,
            start_location: None,
        }
    }

    pub fn can_carry(&self, delivery: &Delivery) -> bool {
        self.capacity >= delivery.weight
    }
}

impl Keyed for Vehicle {
    type Key = VehicleId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

/// Delivery urgency. Declaration order gives `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority {0:?}")]
pub struct ParsePriorityError(pub String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    /// Name of the pickup location.
    pub source: String,
    /// Name of the drop-off location.
    pub destination: String,
    pub weight: f64,
    /// Compared lexicographically, so ISO-8601 strings order by time.
    pub deadline: String,
    pub priority: Priority,
}

impl Delivery {
    pub fn new(
        id: impl Into<DeliveryId>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            destination: destination.into(),
            weight: 0.0,
            deadline: String::new(),
            priority: Priority::Low,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_deadline(mut self, deadline: impl Into<String>) -> Self {
        self.deadline = deadline.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

impl Keyed for Delivery {
    type Key = DeliveryId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    InTransit,
    Completed,
    Reassigned,
}

impl AssignmentStatus {
    /// Only in-transit assignments count against the one-active-per-delivery rule.
    pub fn is_active(&self) -> bool {
        matches!(self, AssignmentStatus::InTransit)
    }
}

/// Binding of one delivery to one vehicle along a concrete route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub delivery_id: DeliveryId,
    pub vehicle_id: VehicleId,
    pub route: Vec<LocationId>,
    pub estimated_minutes: f64,
    /// Set when the route is the direct-edge fallback rather than a graph path.
    pub degraded: bool,
    pub status: AssignmentStatus,
}

/// A road as loaded from the city map. Its position in load order is its
/// segment index in the traffic index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub source: String,
    pub destination: String,
    pub distance: f64,
    pub congestion: f64,
    pub traffic_time: f64,
}

impl Road {
    /// Graph weight: mean of distance and traffic time.
    pub fn weight(&self) -> f64 {
        (self.distance + self.traffic_time) / 2.0
    }
}

/// Point-in-time override of one road segment's weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficEvent {
    pub road_id: usize,
    pub new_weight: i64,
    pub timestamp: String,
}

impl Keyed for TrafficEvent {
    type Key = usize;

    fn key(&self) -> &Self::Key {
        &self.road_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("High".parse::<Priority>(), Ok(Priority::High));
        assert_eq!(" medium ".parse::<Priority>(), Ok(Priority::Medium));
        assert_eq!("LOW".parse::<Priority>(), Ok(Priority::Low));
        assert!("Urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_location_axes() {
        let loc = Location::new(1, "Depot", 36.1, -115.2);
        assert_eq!(loc.point.x, -115.2);
        assert_eq!(loc.point.y, 36.1);
        assert_eq!(loc.latitude(), 36.1);
    }

    #[test]
    fn test_road_weight() {
        let road = Road {
            source: "A".into(),
            destination: "B".into(),
            distance: 4.0,
            congestion: 2.0,
            traffic_time: 10.0,
        };
        assert_eq!(road.weight(), 7.0);
    }

    #[test]
    fn test_vehicle_can_carry() {
        let van = Vehicle::new("V001", 10.0);
        assert!(van.can_carry(&Delivery::new("D1", "A", "B").with_weight(10.0)));
        assert!(!van.can_carry(&Delivery::new("D2", "A", "B").with_weight(15.0)));
    }
}

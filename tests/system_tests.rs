//! End-to-end tests over the Las Vegas fixture network
//!
//! Loads the CSV tables through `CsvDataSource`, builds the dispatch system
//! and checks routing, spatial and deadline queries, traffic overrides and
//! the dispatch pass.

mod fixtures;

use city_dispatch::DispatchError;
use city_dispatch::loader::CsvDataSource;
use city_dispatch::model::{AssignmentStatus, Delivery, Point, Priority};
use city_dispatch::system::{DispatchSystem, SystemConfig, SystemData};
use city_dispatch::traits::DataSource;
use fixtures::{site, write_dataset};

// ============================================================================
// Helpers
// ============================================================================

fn load_system() -> DispatchSystem {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path()).unwrap();
    DispatchSystem::from_source(&CsvDataSource::new(dir.path()), SystemConfig::default()).unwrap()
}

fn point_of(name: &str) -> Point {
    let site = site(name);
    Point::new(site.lng, site.lat)
}

fn sorted<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut names: Vec<&str> = names.into_iter().collect();
    names.sort_unstable();
    names
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_loader_skips_bad_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path()).unwrap();
    let source = CsvDataSource::new(dir.path());

    let locations = source.locations().unwrap();
    assert_eq!(locations.records.len(), 9);
    assert_eq!(locations.skipped, 1);

    let deliveries = source.deliveries().unwrap();
    assert_eq!(deliveries.records.len(), 5);
    assert_eq!(deliveries.skipped, 1);

    let data = SystemData::load(&source).unwrap();
    assert_eq!(data.roads.len(), 12);
    assert_eq!(data.traffic_events.len(), 3);
}

#[test]
fn test_missing_directory_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = DispatchSystem::from_source(&CsvDataSource::new(dir.path().join("absent")), SystemConfig::default());
    assert!(result.is_err());
}

#[test]
fn test_build_registers_everything() {
    let system = load_system();

    assert_eq!(system.location(4).map(|l| l.name.as_str()), Some("Caesars Palace"));
    assert_eq!(system.location_by_name("Sunset Station").map(|l| l.id), Some(7));
    assert_eq!(system.vehicle("V003").map(|v| v.capacity), Some(250.0));
    assert_eq!(system.vehicle("V003").and_then(|v| v.start_location.clone()), None);
    assert_eq!(system.pending_count(), 5);

    // The road into "Unknown Plaza" keeps its segment but adds no edge.
    assert_eq!(system.roads().len(), 12);
    assert_eq!(system.network().edge_count(), 11);
}

// ============================================================================
// Routing and traffic
// ============================================================================

#[test]
fn test_traffic_overrides_reroute() {
    let system = load_system();

    // Without the override on road 0 the path through Caesars Palace and
    // Bellagio (cost 10) beats the direct road (cost 11).
    let route = system.shortest_path("Central Depot", "MGM Grand").unwrap();
    assert_eq!(route.nodes, vec![1, 2]);
    assert_eq!(route.cost, 11.0);

    assert_eq!(system.traffic_event(0).map(|e| e.new_weight), Some(12));
    assert!(system.traffic_event(42).is_none());
}

#[test]
fn test_traffic_stats_reflect_overrides() {
    let system = load_system();

    let stats = system.traffic_stats(0, 3).unwrap();
    assert_eq!((stats.max, stats.min, stats.sum), (12, 2, 30));
    assert_eq!(stats.average(), 7.5);

    assert!(matches!(
        system.traffic_stats(5, 12),
        Err(DispatchError::InvalidRange { len: 12, .. })
    ));
}

#[test]
fn test_batch_paths_match_single_queries() {
    let system = load_system();
    let pairs = [(1, 2), (7, 9), (9, 8), (5, 1)];
    let batch = system.network().shortest_paths(&pairs);

    for (&(from, to), path) in pairs.iter().zip(&batch) {
        assert_eq!(path, &system.network().shortest_path(from, to));
    }
    assert_eq!(batch[1], vec![7, 8, 9]);
    assert!(batch[3].is_empty());
}

// ============================================================================
// Spatial and deadline queries
// ============================================================================

#[test]
fn test_strip_radius_search() {
    let system = load_system();
    let found = system.locations_within(point_of("Central Depot"), 0.03);
    assert_eq!(
        sorted(found.iter().map(|l| l.name.as_str())),
        vec!["Bellagio", "Brooklyn Bowl", "Caesars Palace", "Central Depot", "Hard Rock Cafe", "MGM Grand"]
    );
}

#[test]
fn test_nearest_and_closest_pair() {
    let system = load_system();
    let nearest = system.nearest_location(Point::new(-115.17, 36.117)).unwrap();
    assert_eq!(nearest.name, "Brooklyn Bowl");

    let (first, second, distance) = system.closest_locations().unwrap();
    assert_eq!(sorted([first.name.as_str(), second.name.as_str()]), vec!["Hard Rock Cafe", "MGM Grand"]);
    assert!((distance - 0.003795).abs() < 1e-5);
}

#[test]
fn test_deadline_queries() {
    let system = load_system();
    assert_eq!(system.earliest_deadline().map(|d| d.id.as_str()), Some("D003"));

    let due: Vec<&str> = system
        .deliveries_due_between("2024-03-01 00:00", "2024-03-01 23:59")
        .iter()
        .map(|d| d.id.as_str())
        .collect();
    assert_eq!(due, vec!["D003", "D001", "D005", "D002"]);
}

// ============================================================================
// Planning and dispatch
// ============================================================================

#[test]
fn test_plan_orders_and_zones() {
    let system = load_system();
    let plan = system.plan();

    assert_eq!(plan.order, vec!["D003", "D001", "D005", "D002", "D004"]);
    // D001 and D005 share a deadline, so only the first of them is kept.
    assert_eq!(plan.selected, vec!["D003", "D001", "D002", "D004"]);
    assert_eq!(plan.zones.len(), 3);
    assert_eq!(plan.zones.iter().map(Vec::len).sum::<usize>(), 9);
}

#[test]
fn test_dispatch_pass() {
    let mut system = load_system();
    let report = system.dispatch();

    let assigned: Vec<&str> = report.assigned.iter().map(|a| a.delivery_id.as_str()).collect();
    assert_eq!(assigned, vec!["D001", "D005", "D002", "D003"]);

    assert_eq!(report.unassigned.len(), 1);
    assert_eq!(report.unassigned[0].delivery_id, "D004");
    assert!(matches!(report.unassigned[0].reason, DispatchError::CapacityExceeded { .. }));

    // Too heavy for every vehicle, so it stays queued.
    assert_eq!(system.pending_count(), 1);

    for assignment in &report.assigned {
        let vehicle = system.vehicle(&assignment.vehicle_id).unwrap();
        let delivery = system.delivery(&assignment.delivery_id).unwrap();
        assert!(vehicle.capacity >= delivery.weight);
        assert!(!assignment.degraded);
        assert!(system.vehicle_deliveries(&assignment.vehicle_id).contains(&assignment.delivery_id));
    }

    assert_eq!(system.assignment("D003").map(|a| a.route.clone()), Some(vec![7, 8, 9]));
    assert_eq!(system.assignment("D002").map(|a| a.estimated_minutes), Some(30.0));
}

#[test]
fn test_delivery_lifecycle_through_system() {
    let mut system = load_system();
    system.dispatch();

    system.complete("D001").unwrap();
    assert_eq!(system.assignment("D001").map(|a| a.status), Some(AssignmentStatus::Completed));

    let updated = Delivery::new("D003", "Sunset Station", "Longhorn Casino")
        .with_deadline("2024-02-29 18:00")
        .with_priority(Priority::High)
        .with_weight(10.0);
    system.reassign("D003", updated).unwrap();
    assert_eq!(system.pending_count(), 2);
    assert_eq!(system.earliest_deadline().map(|d| d.deadline.as_str()), Some("2024-02-29 18:00"));

    let cancelled = system.cancel("D004").unwrap();
    assert_eq!(cancelled.weight, 600.0);
    assert!(system.delivery("D004").is_none());

    let summary = system.fleet_summary();
    assert_eq!(summary.vehicles, 3);
    assert_eq!(summary.total_capacity, 390.0);
    assert_eq!(summary.average_capacity, 130.0);
    assert_eq!(summary.deliveries, 4);
    assert_eq!(summary.total_weight, 80.0);
    assert_eq!(summary.high_priority, 2);
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.in_transit, 2);
    assert_eq!(summary.completed, 1);
}

#[test]
fn test_zone_count_override() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path()).unwrap();
    let config = SystemConfig {
        zones: Some(4),
        ..SystemConfig::default()
    };
    let system = DispatchSystem::from_source(&CsvDataSource::new(dir.path()), config).unwrap();
    assert_eq!(system.plan().zones.len(), 4);
}

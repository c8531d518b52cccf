//! The dispatch system: registries, indexes, road network and scheduler
//! built from one set of records.

use std::collections::HashMap;

use crate::deadline_index::DeadlineIndex;
use crate::model::{
    Assignment, AssignmentStatus, Delivery, DeliveryId, Location, LocationId, Point, Priority,
    Road, TrafficEvent, Vehicle, VehicleId, VehicleStatus,
};
use crate::network::{NetworkOptions, PathResult, RoadNetwork};
use crate::optimizer;
use crate::quadtree::{Quadtree, QuadtreeConfig};
use crate::registry::Registry;
use crate::scheduler::{DeliveryScheduler, SchedulerOptions};
use crate::segment_tree::{RangeStats, SegmentTree};
use crate::traits::DataSource;
use crate::{DispatchError, LoadError, Result};

#[derive(Debug, Clone, Default)]
pub struct SystemConfig {
    pub quadtree: QuadtreeConfig,
    pub scheduler: SchedulerOptions,
    pub network: NetworkOptions,
    /// Zone count for planning. `None` uses one zone per active vehicle.
    pub zones: Option<usize>,
}

/// Everything a system is built from.
#[derive(Debug, Clone, Default)]
pub struct SystemData {
    pub locations: Vec<Location>,
    pub vehicles: Vec<Vehicle>,
    pub deliveries: Vec<Delivery>,
    /// In segment-index order.
    pub roads: Vec<Road>,
    pub traffic_events: Vec<TrafficEvent>,
}

impl SystemData {
    pub fn load(source: &impl DataSource) -> std::result::Result<Self, LoadError> {
        let locations = source.locations()?;
        let vehicles = source.vehicles()?;
        let deliveries = source.deliveries()?;
        let roads = source.roads()?;
        let traffic_events = source.traffic_events()?;

        tracing::info!(
            locations = locations.records.len(),
            vehicles = vehicles.records.len(),
            deliveries = deliveries.records.len(),
            roads = roads.records.len(),
            traffic_events = traffic_events.records.len(),
            skipped = locations.skipped
                + vehicles.skipped
                + deliveries.skipped
                + roads.skipped
                + traffic_events.skipped,
            "records loaded"
        );

        Ok(Self {
            locations: locations.records,
            vehicles: vehicles.records,
            deliveries: deliveries.records,
            roads: roads.records,
            traffic_events: traffic_events.records,
        })
    }
}

/// Candidate processing order for the pending deliveries.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    /// Pending deliveries by deadline, then priority.
    pub order: Vec<DeliveryId>,
    /// Pending deliveries with pairwise distinct deadlines.
    pub selected: Vec<DeliveryId>,
    /// Location ids per zone.
    pub zones: Vec<Vec<LocationId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unassigned {
    pub delivery_id: DeliveryId,
    /// Why the last candidate vehicle was refused.
    pub reason: DispatchError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub assigned: Vec<Assignment>,
    pub unassigned: Vec<Unassigned>,
}

/// Fleet and workload totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetSummary {
    pub vehicles: usize,
    pub total_capacity: f64,
    pub average_capacity: f64,
    pub deliveries: usize,
    pub total_weight: f64,
    pub average_weight: f64,
    pub high_priority: usize,
    pub pending: usize,
    pub in_transit: usize,
    pub completed: usize,
}

#[derive(Debug, Clone)]
pub struct DispatchSystem {
    locations: Registry<Location>,
    vehicles: Registry<Vehicle>,
    /// Vehicle ids in load order.
    vehicle_order: Vec<VehicleId>,
    deliveries: Registry<Delivery>,
    traffic: Registry<TrafficEvent>,
    roads: Vec<Road>,
    quadtree: Quadtree,
    deadlines: DeadlineIndex,
    traffic_index: SegmentTree,
    network: RoadNetwork,
    scheduler: DeliveryScheduler,
    zones: Option<usize>,
}

impl DispatchSystem {
    pub fn from_source(
        source: &impl DataSource,
        config: SystemConfig,
    ) -> std::result::Result<Self, LoadError> {
        Ok(Self::build(SystemData::load(source)?, config))
    }

    /// Builds every index from `data`.
    ///
    /// Locations outside the quadtree bounds stay resolvable by id and name
    /// but are left out of proximity queries. Roads whose endpoints do not
    /// resolve keep their segment index without adding a graph edge.
    pub fn build(data: SystemData, config: SystemConfig) -> Self {
        let mut quadtree = Quadtree::new(config.quadtree);
        for location in &data.locations {
            if let Err(err) = quadtree.insert(location.id, location.point) {
                tracing::warn!(location_id = location.id, %err, "location not indexed");
            }
        }
        let locations: Registry<Location> = data.locations.into_iter().collect();

        let mut vehicle_order = Vec::with_capacity(data.vehicles.len());
        let mut vehicles = Registry::new();
        for vehicle in data.vehicles {
            if !vehicle_order.contains(&vehicle.id) {
                vehicle_order.push(vehicle.id.clone());
            }
            vehicles.insert(vehicle);
        }

        let mut network = RoadNetwork::with_options(config.network);
        for location in locations.values() {
            network.add_node(location.id);
        }
        for road in &data.roads {
            let endpoints = locations
                .find_by_alias(&road.source)
                .zip(locations.find_by_alias(&road.destination));
            match endpoints {
                Some((from, to)) => network.add_edge(from.id, to.id, road.weight()),
                None => tracing::warn!(
                    source = %road.source,
                    destination = %road.destination,
                    "road endpoint not found"
                ),
            }
        }
        let traffic_index = SegmentTree::new(data.roads.iter().map(congestion_value).collect());

        let mut system = Self {
            locations,
            vehicles,
            vehicle_order,
            deliveries: Registry::new(),
            traffic: Registry::new(),
            roads: data.roads,
            quadtree,
            deadlines: DeadlineIndex::new(),
            traffic_index,
            network,
            scheduler: DeliveryScheduler::with_options(config.scheduler),
            zones: config.zones,
        };

        for delivery in data.deliveries {
            if let Err(err) = system.add_delivery(delivery) {
                tracing::warn!(%err, "delivery not queued");
            }
        }
        for event in data.traffic_events {
            if let Err(err) = system.apply_traffic_event(event) {
                tracing::warn!(%err, "traffic event ignored");
            }
        }

        system
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.locations.get(&id)
    }

    pub fn location_by_name(&self, name: &str) -> Option<&Location> {
        self.locations.find_by_alias(name)
    }

    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub fn delivery(&self, id: &str) -> Option<&Delivery> {
        self.deliveries.get(id)
    }

    pub fn traffic_event(&self, road_id: usize) -> Option<&TrafficEvent> {
        self.traffic.get(&road_id)
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn scheduler(&self) -> &DeliveryScheduler {
        &self.scheduler
    }

    /// Locations ordered by id.
    fn sorted_locations(&self) -> Vec<Location> {
        let mut locations: Vec<Location> = self.locations.values().cloned().collect();
        locations.sort_by_key(|location| location.id);
        locations
    }

    fn active_vehicles(&self) -> Vec<&Vehicle> {
        self.vehicle_order
            .iter()
            .filter_map(|id| self.vehicles.get(id))
            .filter(|vehicle| vehicle.status == VehicleStatus::Active)
            .collect()
    }

    // ------------------------------------------------------------------
    // Deliveries
    // ------------------------------------------------------------------

    /// Registers a delivery and queues it.
    pub fn add_delivery(&mut self, delivery: Delivery) -> Result<()> {
        self.scheduler.add_delivery(delivery.clone())?;
        self.deadlines.insert(delivery.clone());
        self.deliveries.insert(delivery);
        Ok(())
    }

    pub fn assign(&mut self, delivery_id: &str, vehicle_id: &str) -> Result<&Assignment> {
        self.scheduler.assign_delivery_to_vehicle(
            delivery_id,
            vehicle_id,
            &self.vehicles,
            &self.locations,
            &self.network,
        )
    }

    /// Pulls an in-transit delivery off its vehicle and queues `updated`.
    pub fn reassign(&mut self, delivery_id: &str, updated: Delivery) -> Result<()> {
        self.scheduler.reassign_delivery(delivery_id, updated.clone())?;
        self.deadlines.insert(updated.clone());
        self.deliveries.insert(updated);
        Ok(())
    }

    pub fn complete(&mut self, delivery_id: &str) -> Result<()> {
        self.scheduler.complete_delivery(delivery_id)
    }

    /// Drops a pending delivery from the queue and the indexes.
    pub fn cancel(&mut self, delivery_id: &str) -> Result<Delivery> {
        let delivery = self.scheduler.cancel_pending(delivery_id)?;
        self.deadlines.remove(delivery_id);
        self.deliveries.remove(delivery_id);
        Ok(delivery)
    }

    pub fn pending_count(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub fn assignment(&self, delivery_id: &str) -> Option<&Assignment> {
        self.scheduler.assignment(delivery_id)
    }

    pub fn vehicle_deliveries(&self, vehicle_id: &str) -> &[DeliveryId] {
        self.scheduler.vehicle_deliveries(vehicle_id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Shortest path between two named locations.
    pub fn shortest_path(&self, source: &str, destination: &str) -> Option<PathResult> {
        let from = self.location_by_name(source)?.id;
        let to = self.location_by_name(destination)?.id;
        self.network.shortest_route(from, to)
    }

    pub fn locations_within(&self, center: Point, radius: f64) -> Vec<&Location> {
        self.quadtree
            .radius_search(center, radius)
            .into_iter()
            .filter_map(|entry| self.locations.get(&entry.id))
            .collect()
    }

    pub fn nearest_location(&self, point: Point) -> Option<&Location> {
        let entry = self.quadtree.find_nearest(point)?;
        self.locations.get(&entry.id)
    }

    /// Known deliveries with a deadline in `[start, end]`.
    pub fn deliveries_due_between(&self, start: &str, end: &str) -> Vec<&Delivery> {
        self.deadlines.range_search(start, end)
    }

    pub fn earliest_deadline(&self) -> Option<&Delivery> {
        self.deadlines.earliest()
    }

    /// Congestion statistics over road segments `[first, last]`.
    pub fn traffic_stats(&self, first: usize, last: usize) -> Result<RangeStats> {
        self.traffic_index.stats(first, last)
    }

    /// Overrides one road segment's congestion and its graph edge weight.
    pub fn apply_traffic_event(&mut self, event: TrafficEvent) -> Result<()> {
        self.traffic_index.update(event.road_id, event.new_weight)?;

        let road = &self.roads[event.road_id];
        let endpoints = self
            .locations
            .find_by_alias(&road.source)
            .zip(self.locations.find_by_alias(&road.destination));
        let updated = endpoints.is_some_and(|(from, to)| {
            self.network
                .update_edge_weight(from.id, to.id, event.new_weight as f64)
        });

        tracing::info!(
            road_id = event.road_id,
            new_weight = event.new_weight,
            timestamp = %event.timestamp,
            edge_updated = updated,
            "traffic override applied"
        );
        self.traffic.insert(event);
        Ok(())
    }

    /// The two closest locations and their distance.
    pub fn closest_locations(&self) -> Option<(&Location, &Location, f64)> {
        let locations = self.sorted_locations();
        let pair = optimizer::closest_pair(&locations)?;
        let first = self.locations.get(&pair.first.id)?;
        let second = self.locations.get(&pair.second.id)?;
        Some((first, second, pair.distance))
    }

    /// Location ids grouped into `num_zones` geographic zones.
    pub fn zones(&self, num_zones: usize) -> Vec<Vec<LocationId>> {
        let locations = self.sorted_locations();
        optimizer::partition_zones(&locations, num_zones)
            .into_iter()
            .map(|zone| zone.into_iter().map(|location| location.id).collect())
            .collect()
    }

    fn zone_count(&self) -> usize {
        self.zones
            .unwrap_or_else(|| self.active_vehicles().len())
            .max(1)
    }

    pub fn fleet_summary(&self) -> FleetSummary {
        let vehicles = self.vehicles.len();
        let total_capacity: f64 = self.vehicles.values().map(|v| v.capacity).sum();
        let deliveries = self.deliveries.len();
        let total_weight: f64 = self.deliveries.values().map(|d| d.weight).sum();

        let mut in_transit = 0;
        let mut completed = 0;
        for assignment in self.scheduler.assignments() {
            match assignment.status {
                AssignmentStatus::InTransit => in_transit += 1,
                AssignmentStatus::Completed => completed += 1,
                AssignmentStatus::Reassigned => {}
            }
        }

        FleetSummary {
            vehicles,
            total_capacity,
            average_capacity: mean(total_capacity, vehicles),
            deliveries,
            total_weight,
            average_weight: mean(total_weight, deliveries),
            high_priority: self
                .deliveries
                .values()
                .filter(|d| d.priority == Priority::High)
                .count(),
            pending: self.scheduler.pending_count(),
            in_transit,
            completed,
        }
    }

    // ------------------------------------------------------------------
    // Planning
    // ------------------------------------------------------------------

    /// Orders, selects and zones the pending work without changing it.
    pub fn plan(&self) -> DispatchPlan {
        let pending: Vec<Delivery> = self
            .scheduler
            .pending_in_order()
            .into_iter()
            .cloned()
            .collect();

        DispatchPlan {
            order: optimizer::sort_deliveries(&pending)
                .into_iter()
                .map(|d| d.id)
                .collect(),
            selected: optimizer::select_non_overlapping(&pending)
                .into_iter()
                .map(|d| d.id.clone())
                .collect(),
            zones: self.zones(self.zone_count()),
        }
    }

    /// Assigns pending deliveries in queue order until the queue is empty.
    ///
    /// Each delivery is offered first to the vehicle serving the zone of its
    /// pickup location, then to the other active vehicles, least loaded
    /// first. Deliveries no vehicle accepts stay pending.
    pub fn dispatch(&mut self) -> DispatchReport {
        let active: Vec<VehicleId> = self
            .active_vehicles()
            .into_iter()
            .map(|vehicle| vehicle.id.clone())
            .collect();

        let mut zone_of: HashMap<LocationId, usize> = HashMap::new();
        if !active.is_empty() {
            for (zone, ids) in self.zones(self.zone_count()).into_iter().enumerate() {
                for id in ids {
                    zone_of.insert(id, zone);
                }
            }
        }

        let mut report = DispatchReport::default();
        let mut deferred = Vec::new();

        while let Ok(head) = self.scheduler.next_delivery() {
            let delivery = head.clone();
            let home = self
                .locations
                .find_by_alias(&delivery.source)
                .and_then(|location| zone_of.get(&location.id))
                .and_then(|&zone| active.get(zone % active.len().max(1)));

            let mut candidates: Vec<&VehicleId> =
                active.iter().filter(|id| Some(*id) != home).collect();
            candidates.sort_by_key(|id| self.scheduler.active_load(id));
            if let Some(home) = home {
                candidates.insert(0, home);
            }

            let mut outcome = Err(DispatchError::not_found("vehicle", "any active"));
            for vehicle_id in candidates {
                outcome = self
                    .scheduler
                    .assign_delivery_to_vehicle(
                        &delivery.id,
                        vehicle_id,
                        &self.vehicles,
                        &self.locations,
                        &self.network,
                    )
                    .cloned();
                if outcome.is_ok() {
                    break;
                }
            }

            match outcome {
                Ok(assignment) => report.assigned.push(assignment),
                Err(reason) => {
                    tracing::warn!(delivery_id = %delivery.id, %reason, "delivery left pending");
                    report.unassigned.push(Unassigned {
                        delivery_id: delivery.id.clone(),
                        reason,
                    });
                    match self.scheduler.set_aside(&delivery.id) {
                        Ok(entry) => deferred.push(entry),
                        Err(_) => break,
                    }
                }
            }
        }

        for entry in deferred {
            if let Err(err) = self.scheduler.restore_pending(entry) {
                tracing::warn!(%err, "deferred delivery not requeued");
            }
        }

        tracing::info!(
            assigned = report.assigned.len(),
            unassigned = report.unassigned.len(),
            "dispatch pass finished"
        );
        report
    }
}

fn congestion_value(road: &Road) -> i64 {
    road.congestion.round() as i64
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { total / count as f64 }
}

//! Pending queue and vehicle assignment protocol.
//!
//! A delivery is either pending (queued, not yet bound to a vehicle) or has
//! an active in-transit assignment, never both. Assignment pops the queue
//! head and binds it only after every check passes; a failed check puts the
//! delivery back where it was.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::{
    Assignment, AssignmentStatus, Delivery, DeliveryId, Location, LocationId, Priority, Vehicle,
    VehicleId,
};
use crate::registry::Registry;
use crate::traits::PathFinder;
use crate::{DispatchError, Result};

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Travel estimate per route leg, in minutes.
    pub minutes_per_leg: f64,
    /// Route over a direct `[source, destination]` stub when the graph has
    /// no path. Such assignments are flagged as degraded.
    pub direct_fallback: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            minutes_per_leg: 15.0,
            direct_fallback: true,
        }
    }
}

/// A route between two named locations.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRoute {
    pub stops: Vec<LocationId>,
    pub degraded: bool,
}

impl PlannedRoute {
    pub fn legs(&self) -> usize {
        self.stops.len().saturating_sub(1)
    }
}

/// A queued delivery with the sequence number it was first given.
#[derive(Debug, Clone)]
pub(crate) struct PendingEntry {
    delivery: Delivery,
    seq: u64,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    /// Greatest first: higher priority, then earlier deadline, then earlier
    /// enqueue.
    fn cmp(&self, other: &Self) -> Ordering {
        self.delivery
            .priority
            .cmp(&other.delivery.priority)
            .then_with(|| other.delivery.deadline.cmp(&self.delivery.deadline))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Default)]
struct PendingQueue {
    heap: BinaryHeap<PendingEntry>,
    ids: HashSet<DeliveryId>,
    next_seq: u64,
}

impl PendingQueue {
    fn push(&mut self, delivery: Delivery) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.restore(PendingEntry { delivery, seq });
    }

    /// Re-queues an entry with the sequence number it was first given.
    fn restore(&mut self, entry: PendingEntry) {
        self.ids.insert(entry.delivery.id.clone());
        self.heap.push(entry);
    }

    fn pop(&mut self) -> Option<PendingEntry> {
        let entry = self.heap.pop()?;
        self.ids.remove(&entry.delivery.id);
        Some(entry)
    }

    fn peek(&self) -> Option<&PendingEntry> {
        self.heap.peek()
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn remove(&mut self, id: &str) -> Option<PendingEntry> {
        if !self.ids.remove(id) {
            return None;
        }
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        let removed = entries
            .iter()
            .position(|entry| entry.delivery.id == id)
            .map(|index| entries.swap_remove(index));
        self.heap = BinaryHeap::from(entries);
        removed
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn in_order(&self) -> Vec<&Delivery> {
        let mut entries: Vec<&PendingEntry> = self.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|entry| &entry.delivery).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryScheduler {
    pending: PendingQueue,
    assignments: HashMap<DeliveryId, Assignment>,
    vehicle_deliveries: HashMap<VehicleId, Vec<DeliveryId>>,
    options: SchedulerOptions,
}

impl DeliveryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SchedulerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    fn is_in_transit(&self, id: &str) -> bool {
        self.assignments
            .get(id)
            .is_some_and(|assignment| assignment.status.is_active())
    }

    /// Queues a delivery. Fails if the id is already pending or in transit.
    pub fn add_delivery(&mut self, delivery: Delivery) -> Result<()> {
        if self.pending.contains(&delivery.id) || self.is_in_transit(&delivery.id) {
            return Err(DispatchError::AlreadyScheduled(delivery.id));
        }
        tracing::info!(
            delivery_id = %delivery.id,
            priority = %delivery.priority,
            deadline = %delivery.deadline,
            "delivery queued"
        );
        self.pending.push(delivery);
        Ok(())
    }

    /// The delivery that would be assigned next.
    pub fn next_delivery(&self) -> Result<&Delivery> {
        self.pending
            .peek()
            .map(|entry| &entry.delivery)
            .ok_or(DispatchError::EmptyQueue)
    }

    pub fn pop_next(&mut self) -> Result<Delivery> {
        self.pending
            .pop()
            .map(|entry| entry.delivery)
            .ok_or(DispatchError::EmptyQueue)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    /// Pending deliveries in the order they would be popped.
    pub fn pending_in_order(&self) -> Vec<&Delivery> {
        self.pending.in_order()
    }

    /// Resolves location names and finds a route between them.
    ///
    /// Returns `None` when a name is unknown, or when the graph has no path
    /// and the direct fallback is disabled.
    pub fn calculate_route<P: PathFinder>(
        &self,
        source: &str,
        destination: &str,
        locations: &Registry<Location>,
        paths: &P,
    ) -> Option<PlannedRoute> {
        let from = locations.find_by_alias(source)?.id;
        let to = locations.find_by_alias(destination)?.id;

        let stops = paths.find_path(from, to);
        if !stops.is_empty() {
            return Some(PlannedRoute {
                stops,
                degraded: false,
            });
        }

        if !self.options.direct_fallback {
            return None;
        }
        tracing::warn!(source, destination, "no path in road network, using direct route");
        Some(PlannedRoute {
            stops: vec![from, to],
            degraded: true,
        })
    }

    /// Binds the head of the pending queue to `vehicle_id`.
    ///
    /// `delivery_id` must be the current head. The head is put back, with
    /// its original queue position, when it does not match, the vehicle is
    /// unknown, the load exceeds the vehicle's capacity, or no route exists.
    pub fn assign_delivery_to_vehicle<P: PathFinder>(
        &mut self,
        delivery_id: &str,
        vehicle_id: &str,
        vehicles: &Registry<Vehicle>,
        locations: &Registry<Location>,
        paths: &P,
    ) -> Result<&Assignment> {
        let entry = self.pending.pop().ok_or(DispatchError::EmptyQueue)?;

        if let Err(err) = self.check_assignable(&entry.delivery, delivery_id, vehicle_id, vehicles) {
            self.pending.restore(entry);
            return Err(err);
        }

        let delivery = &entry.delivery;
        let Some(route) = self.calculate_route(&delivery.source, &delivery.destination, locations, paths)
        else {
            let err = DispatchError::RouteUnavailable {
                origin: delivery.source.clone(),
                destination: delivery.destination.clone(),
            };
            self.pending.restore(entry);
            return Err(err);
        };

        let assignment = Assignment {
            delivery_id: delivery.id.clone(),
            vehicle_id: vehicle_id.to_string(),
            estimated_minutes: route.legs() as f64 * self.options.minutes_per_leg,
            route: route.stops,
            degraded: route.degraded,
            status: AssignmentStatus::InTransit,
        };
        tracing::info!(
            delivery_id = %assignment.delivery_id,
            vehicle_id = %assignment.vehicle_id,
            stops = assignment.route.len(),
            degraded = assignment.degraded,
            "delivery assigned"
        );

        // A completed delivery booked again moves off its previous vehicle.
        if let Some(previous) = self.assignments.get(&assignment.delivery_id) {
            if let Some(list) = self.vehicle_deliveries.get_mut(&previous.vehicle_id) {
                list.retain(|id| *id != assignment.delivery_id);
            }
        }
        self.vehicle_deliveries
            .entry(assignment.vehicle_id.clone())
            .or_default()
            .push(assignment.delivery_id.clone());
        let slot = self
            .assignments
            .entry(assignment.delivery_id.clone())
            .insert_entry(assignment);
        Ok(slot.into_mut())
    }

    fn check_assignable(
        &self,
        head: &Delivery,
        delivery_id: &str,
        vehicle_id: &str,
        vehicles: &Registry<Vehicle>,
    ) -> Result<()> {
        if head.id != delivery_id {
            return Err(DispatchError::IdentityMismatch {
                requested: delivery_id.to_string(),
                found: head.id.clone(),
            });
        }
        let vehicle = vehicles
            .get(vehicle_id)
            .ok_or_else(|| DispatchError::not_found("vehicle", vehicle_id))?;
        if !vehicle.can_carry(head) {
            return Err(DispatchError::CapacityExceeded {
                delivery_id: head.id.clone(),
                vehicle_id: vehicle.id.clone(),
                capacity: vehicle.capacity,
                weight: head.weight,
            });
        }
        Ok(())
    }

    fn active_assignment_mut(&mut self, id: &str) -> Result<&mut Assignment> {
        self.assignments
            .get_mut(id)
            .filter(|assignment| assignment.status.is_active())
            .ok_or_else(|| DispatchError::not_found("active assignment", id))
    }

    /// Takes an in-transit delivery off its vehicle and queues `updated` in
    /// its place.
    pub fn reassign_delivery(&mut self, id: &str, updated: Delivery) -> Result<()> {
        if !self.is_in_transit(id) {
            return Err(DispatchError::not_found("active assignment", id));
        }
        if updated.id != id {
            return Err(DispatchError::IdentityMismatch {
                requested: id.to_string(),
                found: updated.id,
            });
        }

        let assignment = self.active_assignment_mut(id)?;
        assignment.status = AssignmentStatus::Reassigned;
        let vehicle_id = assignment.vehicle_id.clone();
        if let Some(list) = self.vehicle_deliveries.get_mut(&vehicle_id) {
            list.retain(|delivery_id| delivery_id != id);
        }

        tracing::info!(delivery_id = id, vehicle_id = %vehicle_id, "delivery reassigned");
        self.pending.push(updated);
        Ok(())
    }

    pub fn complete_delivery(&mut self, id: &str) -> Result<()> {
        let assignment = self.active_assignment_mut(id)?;
        assignment.status = AssignmentStatus::Completed;
        tracing::info!(delivery_id = id, vehicle_id = %assignment.vehicle_id, "delivery completed");
        Ok(())
    }

    /// Withdraws a pending delivery from the queue.
    pub fn cancel_pending(&mut self, id: &str) -> Result<Delivery> {
        let entry = self
            .pending
            .remove(id)
            .ok_or_else(|| DispatchError::not_found("pending delivery", id))?;
        tracing::debug!(delivery_id = id, "pending delivery withdrawn");
        Ok(entry.delivery)
    }

    /// Takes a pending delivery out of the queue, keeping its sequence
    /// number for [`DeliveryScheduler::restore_pending`].
    pub(crate) fn set_aside(&mut self, id: &str) -> Result<PendingEntry> {
        let entry = self
            .pending
            .remove(id)
            .ok_or_else(|| DispatchError::not_found("pending delivery", id))?;
        tracing::debug!(delivery_id = id, "pending delivery set aside");
        Ok(entry)
    }

    /// Puts a set-aside delivery back at its original queue position.
    pub(crate) fn restore_pending(&mut self, entry: PendingEntry) -> Result<()> {
        let id = &entry.delivery.id;
        if self.pending.contains(id) || self.is_in_transit(id) {
            return Err(DispatchError::AlreadyScheduled(entry.delivery.id));
        }
        self.pending.restore(entry);
        Ok(())
    }

    /// Changes the priority and deadline of a pending delivery. Its place
    /// among otherwise equal deliveries is kept.
    pub fn reprioritize(
        &mut self,
        id: &str,
        priority: Priority,
        deadline: impl Into<String>,
    ) -> Result<()> {
        let mut entry = self
            .pending
            .remove(id)
            .ok_or_else(|| DispatchError::not_found("pending delivery", id))?;
        entry.delivery.priority = priority;
        entry.delivery.deadline = deadline.into();
        tracing::info!(
            delivery_id = id,
            priority = %entry.delivery.priority,
            deadline = %entry.delivery.deadline,
            "delivery reprioritized"
        );
        self.pending.restore(entry);
        Ok(())
    }

    /// The latest assignment recorded for `id`, whatever its status.
    pub fn assignment(&self, id: &str) -> Option<&Assignment> {
        self.assignments.get(id)
    }

    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.values()
    }

    /// Delivery ids assigned to `vehicle_id` in assignment order. Completed
    /// deliveries stay listed; reassigned ones are removed.
    pub fn vehicle_deliveries(&self, vehicle_id: &str) -> &[DeliveryId] {
        self.vehicle_deliveries
            .get(vehicle_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of in-transit deliveries on `vehicle_id`.
    pub fn active_load(&self, vehicle_id: &str) -> usize {
        self.vehicle_deliveries(vehicle_id)
            .iter()
            .filter(|id| self.is_in_transit(id))
            .count()
    }
}

/// A scheduler shared between threads.
///
/// Every operation runs under one lock, so the pop, check and bind steps of
/// an assignment are never interleaved with another caller's.
#[derive(Debug, Clone, Default)]
pub struct SharedScheduler {
    inner: Arc<Mutex<DeliveryScheduler>>,
}

impl SharedScheduler {
    pub fn new(scheduler: DeliveryScheduler) -> Self {
        Self {
            inner: Arc::new(Mutex::new(scheduler)),
        }
    }

    /// Locks the scheduler. A panic in another holder does not leave it
    /// half-updated, so a poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, DeliveryScheduler> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_delivery(&self, delivery: Delivery) -> Result<()> {
        self.lock().add_delivery(delivery)
    }

    pub fn assign_delivery_to_vehicle<P: PathFinder>(
        &self,
        delivery_id: &str,
        vehicle_id: &str,
        vehicles: &Registry<Vehicle>,
        locations: &Registry<Location>,
        paths: &P,
    ) -> Result<Assignment> {
        self.lock()
            .assign_delivery_to_vehicle(delivery_id, vehicle_id, vehicles, locations, paths)
            .cloned()
    }

    pub fn reassign_delivery(&self, id: &str, updated: Delivery) -> Result<()> {
        self.lock().reassign_delivery(id, updated)
    }

    pub fn complete_delivery(&self, id: &str) -> Result<()> {
        self.lock().complete_delivery(id)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending_count()
    }

    pub fn assignment(&self, id: &str) -> Option<Assignment> {
        self.lock().assignment(id).cloned()
    }
}

//! Deliveries ordered by deadline.
//!
//! An unbalanced binary search tree whose nodes live in an arena and refer to
//! each other by slot index. Nodes are ordered by `(deadline, id)`, so equal
//! deadlines are ordered by id instead of by insertion history, and a
//! side map from id to deadline lets [`DeadlineIndex::remove`] locate a node
//! by id while walking the deadline ordering.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{Delivery, DeliveryId};

type Slot = usize;

#[derive(Debug, Clone)]
struct Node {
    delivery: Delivery,
    left: Option<Slot>,
    right: Option<Slot>,
}

#[derive(Debug, Clone, Default)]
pub struct DeadlineIndex {
    slots: Vec<Option<Node>>,
    free: Vec<Slot>,
    root: Option<Slot>,
    deadlines: HashMap<DeliveryId, String>,
}

fn compare_key(deadline: &str, id: &str, node: &Delivery) -> Ordering {
    deadline
        .cmp(node.deadline.as_str())
        .then_with(|| id.cmp(node.id.as_str()))
}

impl DeadlineIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.deadlines.contains_key(id)
    }

    fn node(&self, slot: Slot) -> &Node {
        self.slots[slot]
            .as_ref()
            .expect("tree links only point at occupied slots")
    }

    fn node_mut(&mut self, slot: Slot) -> &mut Node {
        self.slots[slot]
            .as_mut()
            .expect("tree links only point at occupied slots")
    }

    fn allocate(&mut self, delivery: Delivery) -> Slot {
        let node = Node {
            delivery,
            left: None,
            right: None,
        };
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    /// Adds a delivery. A delivery with the same id is replaced.
    pub fn insert(&mut self, delivery: Delivery) {
        if self.contains(&delivery.id) {
            self.remove(&delivery.id);
        }
        self.deadlines
            .insert(delivery.id.clone(), delivery.deadline.clone());

        let Some(mut current) = self.root else {
            self.root = Some(self.allocate(delivery));
            return;
        };

        loop {
            let ordering = compare_key(&delivery.deadline, &delivery.id, &self.node(current).delivery);
            let next = match ordering {
                Ordering::Less => self.node(current).left,
                _ => self.node(current).right,
            };
            match next {
                Some(child) => current = child,
                None => {
                    let slot = self.allocate(delivery);
                    let parent = self.node_mut(current);
                    if ordering == Ordering::Less {
                        parent.left = Some(slot);
                    } else {
                        parent.right = Some(slot);
                    }
                    return;
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Delivery> {
        let deadline = self.deadlines.get(id)?;
        let mut current = self.root;
        while let Some(slot) = current {
            let node = self.node(slot);
            current = match compare_key(deadline, id, &node.delivery) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(&node.delivery),
            };
        }
        None
    }

    /// The delivery with the smallest `(deadline, id)` key.
    pub fn earliest(&self) -> Option<&Delivery> {
        let mut slot = self.root?;
        while let Some(left) = self.node(slot).left {
            slot = left;
        }
        Some(&self.node(slot).delivery)
    }

    /// Deliveries whose deadline lies in `[start, end]`, in key order.
    pub fn range_search(&self, start: &str, end: &str) -> Vec<&Delivery> {
        let mut results = Vec::new();
        if start > end {
            return results;
        }

        // In-order walk that skips subtrees entirely outside the range.
        let mut stack = Vec::new();
        let mut current = self.root;
        loop {
            while let Some(slot) = current {
                stack.push(slot);
                let node = self.node(slot);
                current = if node.delivery.deadline.as_str() >= start {
                    node.left
                } else {
                    None
                };
            }
            let Some(slot) = stack.pop() else {
                break;
            };
            let node = self.node(slot);
            let deadline = node.delivery.deadline.as_str();
            if deadline > end {
                break;
            }
            if deadline >= start {
                results.push(&node.delivery);
            }
            current = node.right;
        }
        results
    }

    /// Removes the delivery with `id`. A node with two children takes over
    /// its in-order successor's delivery and the successor node is unlinked.
    pub fn remove(&mut self, id: &str) -> Option<Delivery> {
        let deadline = self.deadlines.get(id)?.clone();

        let mut parent = None;
        let mut current = self.root;
        let target = loop {
            let slot = current?;
            let node = self.node(slot);
            match compare_key(&deadline, id, &node.delivery) {
                Ordering::Less => {
                    parent = Some(slot);
                    current = node.left;
                }
                Ordering::Greater => {
                    parent = Some(slot);
                    current = node.right;
                }
                Ordering::Equal => break slot,
            }
        };
        self.deadlines.remove(id);

        let (left, right) = {
            let node = self.node(target);
            (node.left, node.right)
        };

        let removed = match (left, right) {
            (Some(_), Some(right)) => {
                let mut successor_parent = target;
                let mut successor = right;
                while let Some(next) = self.node(successor).left {
                    successor_parent = successor;
                    successor = next;
                }
                let successor_right = self.node(successor).right;
                self.relink(Some(successor_parent), successor, successor_right);

                let successor_node = self.release(successor);
                std::mem::replace(&mut self.node_mut(target).delivery, successor_node.delivery)
            }
            (child, None) | (None, child) => {
                self.relink(parent, target, child);
                self.release(target).delivery
            }
        };
        Some(removed)
    }

    /// Points whichever link of `parent` referred to `old` at `new`.
    fn relink(&mut self, parent: Option<Slot>, old: Slot, new: Option<Slot>) {
        match parent {
            None => self.root = new,
            Some(parent) => {
                let node = self.node_mut(parent);
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    node.right = new;
                }
            }
        }
    }

    fn release(&mut self, slot: Slot) -> Node {
        self.free.push(slot);
        self.slots[slot]
            .take()
            .expect("released slot was occupied")
    }

    /// All deliveries in `(deadline, id)` order.
    pub fn iter(&self) -> impl Iterator<Item = &Delivery> {
        let mut ordered = Vec::with_capacity(self.len());
        let mut stack = Vec::new();
        let mut current = self.root;
        while current.is_some() || !stack.is_empty() {
            while let Some(slot) = current {
                stack.push(slot);
                current = self.node(slot).left;
            }
            if let Some(slot) = stack.pop() {
                let node = self.node(slot);
                ordered.push(&node.delivery);
                current = node.right;
            }
        }
        ordered.into_iter()
    }
}

impl FromIterator<Delivery> for DeadlineIndex {
    fn from_iter<I: IntoIterator<Item = Delivery>>(iter: I) -> Self {
        let mut index = DeadlineIndex::new();
        for delivery in iter {
            index.insert(delivery);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn delivery(id: &str, deadline: &str) -> Delivery {
        Delivery::new(id, "A", "B").with_deadline(deadline)
    }

    fn ids<'a>(deliveries: impl IntoIterator<Item = &'a Delivery>) -> Vec<&'a str> {
        deliveries.into_iter().map(|d| d.id.as_str()).collect()
    }

    fn sample() -> DeadlineIndex {
        [
            delivery("D5", "2024-01-05"),
            delivery("D2", "2024-01-02"),
            delivery("D8", "2024-01-08"),
            delivery("D1", "2024-01-01"),
            delivery("D3", "2024-01-03"),
            delivery("D7", "2024-01-07"),
            delivery("D9", "2024-01-09"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_earliest() {
        let index = sample();
        assert_eq!(index.earliest().map(|d| d.id.as_str()), Some("D1"));
        assert!(DeadlineIndex::new().earliest().is_none());
    }

    #[test]
    fn test_range_search_inclusive() {
        let index = sample();
        assert_eq!(ids(index.range_search("2024-01-02", "2024-01-07")), vec!["D2", "D3", "D5", "D7"]);
        assert!(index.range_search("2024-02-01", "2024-03-01").is_empty());
        assert!(index.range_search("2024-01-09", "2024-01-01").is_empty());
    }

    #[test]
    fn test_equal_deadlines_order_by_id() {
        let index: DeadlineIndex = [
            delivery("D3", "2024-01-01"),
            delivery("D1", "2024-01-01"),
            delivery("D2", "2024-01-01"),
        ]
        .into_iter()
        .collect();
        assert_eq!(ids(index.iter()), vec!["D1", "D2", "D3"]);
        assert_eq!(ids(index.range_search("2024-01-01", "2024-01-01")), vec!["D1", "D2", "D3"]);
    }

    #[test]
    fn test_remove_leaf_single_child_and_two_children() {
        let mut index = sample();

        // leaf
        assert_eq!(index.remove("D1").map(|d| d.id), Some("D1".to_string()));
        // D2 now has only the D3 child
        assert_eq!(index.remove("D2").map(|d| d.id), Some("D2".to_string()));
        // D8 has two children
        assert_eq!(index.remove("D8").map(|d| d.id), Some("D8".to_string()));
        // root with two children
        assert_eq!(index.remove("D5").map(|d| d.id), Some("D5".to_string()));

        assert_eq!(ids(index.iter()), vec!["D3", "D7", "D9"]);
        assert_eq!(index.len(), 3);
        assert!(index.remove("D5").is_none());
    }

    #[test]
    fn test_remove_ids_out_of_deadline_order() {
        // Ids sort opposite to deadlines, which a tree searched by id alone
        // would get wrong.
        let mut index: DeadlineIndex = [
            delivery("A", "2024-03-01"),
            delivery("B", "2024-02-01"),
            delivery("C", "2024-01-01"),
        ]
        .into_iter()
        .collect();
        assert!(index.remove("C").is_some());
        assert_eq!(index.earliest().map(|d| d.id.as_str()), Some("B"));
    }

    #[test]
    fn test_reinsert_replaces_same_id() {
        let mut index = sample();
        index.insert(delivery("D9", "2023-12-31"));
        assert_eq!(index.len(), 7);
        assert_eq!(index.earliest().map(|d| d.id.as_str()), Some("D9"));
        assert_eq!(index.get("D9").map(|d| d.deadline.as_str()), Some("2023-12-31"));
    }

    #[test]
    fn test_slots_are_reused() {
        let mut index = sample();
        index.remove("D1");
        index.remove("D9");
        index.insert(delivery("D4", "2024-01-04"));
        index.insert(delivery("D6", "2024-01-06"));
        assert_eq!(index.slots.len(), 7);
    }

    proptest! {
        #[test]
        fn prop_in_order_stays_sorted(
            ops in prop::collection::vec((0u8..20, 0u8..10, any::<bool>()), 1..80)
        ) {
            let mut index = DeadlineIndex::new();
            let mut model: HashMap<String, String> = HashMap::new();

            for (id, day, insert) in ops {
                let id = format!("D{id:02}");
                if insert {
                    let deadline = format!("2024-01-{day:02}");
                    index.insert(delivery(&id, &deadline));
                    model.insert(id, deadline);
                } else {
                    prop_assert_eq!(index.remove(&id).is_some(), model.remove(&id).is_some());
                }
            }

            let keys: Vec<(String, String)> = index
                .iter()
                .map(|d| (d.deadline.clone(), d.id.clone()))
                .collect();
            let mut expected: Vec<(String, String)> =
                model.into_iter().map(|(id, deadline)| (deadline, id)).collect();
            expected.sort();
            prop_assert_eq!(keys, expected);
        }
    }
}

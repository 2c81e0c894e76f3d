//! Single-slot "latest value" cells shared between producer loops and the
//! render consumer.
//!
//! Producers overwrite; consumers take one [`Arc`] snapshot at the top of a
//! frame and use it for the whole frame, so a publish that lands mid-frame
//! never tears the frame's view of the value.

use std::sync::{Arc, RwLock};

#[derive(Debug)]
struct Slot<T> {
    value: Option<Arc<T>>,
    generation: u64,
}

/// A shared, overwrite-on-publish cell.
///
/// Cloning the cell shares the slot.
#[derive(Debug)]
pub struct LatestValue<T> {
    slot: Arc<RwLock<Slot<T>>>,
}

impl<T> Clone for LatestValue<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for LatestValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestValue<T> {
    /// Create an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(Slot {
                value: None,
                generation: 0,
            })),
        }
    }

    /// Replace the current value. Returns the new generation.
    pub fn publish(&self, value: T) -> u64 {
        self.publish_arc(Arc::new(value))
    }

    /// Replace the current value with an already shared one.
    pub fn publish_arc(&self, value: Arc<T>) -> u64 {
        let mut slot = self
            .slot
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.value = Some(value);
        slot.generation += 1;
        slot.generation
    }

    /// Drop the current value. Subsequent snapshots are `None`.
    pub fn clear(&self) {
        let mut slot = self
            .slot
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.value.take().is_some() {
            slot.generation += 1;
        }
    }

    /// The current value, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<T>> {
        let slot = self
            .slot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.value.clone()
    }

    /// Number of publishes and clears seen so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.slot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .generation
    }

    /// Whether the cell holds no value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cell_is_empty() {
        let cell: LatestValue<u32> = LatestValue::new();
        assert!(cell.is_empty());
        assert_eq!(cell.generation(), 0);
    }

    #[test]
    fn test_publish_overwrites() {
        let cell = LatestValue::new();
        assert_eq!(cell.publish(1), 1);
        assert_eq!(cell.publish(2), 2);
        assert_eq!(*cell.snapshot().expect("value"), 2);
    }

    #[test]
    fn test_snapshot_survives_later_publish() {
        let cell = LatestValue::new();
        cell.publish(String::from("first"));
        let held = cell.snapshot().expect("value");
        cell.publish(String::from("second"));
        assert_eq!(held.as_str(), "first");
        assert_eq!(cell.snapshot().expect("value").as_str(), "second");
    }

    #[test]
    fn test_clones_share_slot() {
        let producer = LatestValue::new();
        let consumer = producer.clone();
        producer.publish(7_u8);
        assert_eq!(*consumer.snapshot().expect("value"), 7);
        consumer.clear();
        assert!(producer.is_empty());
    }

    #[test]
    fn test_clear_on_empty_keeps_generation() {
        let cell: LatestValue<u8> = LatestValue::new();
        cell.clear();
        assert_eq!(cell.generation(), 0);
        cell.publish(1);
        cell.clear();
        assert_eq!(cell.generation(), 2);
    }
}

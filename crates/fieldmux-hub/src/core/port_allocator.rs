//! Port Allocator (C1).
//!
//! Assigns contiguous port ranges per streamer. Thread-safe under
//! concurrent allocate/release; all returned ranges are pairwise disjoint
//! at any instant (§4.1 invariant).

use std::collections::BTreeSet;
use std::sync::Mutex;

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
pub struct PortAllocatorConfig {
    pub base_port: u16,
    pub ports_per_streamer: u16,
}

impl Default for PortAllocatorConfig {
    fn default() -> Self {
        Self {
            base_port: 9000,
            ports_per_streamer: 4,
        }
    }
}

pub struct PortAllocator {
    config: PortAllocatorConfig,
    assignments: DashMap<String, u16>,
    /// Slots currently in use, guarded separately so allocate/release can
    /// scan for the lowest free slot without racing each other.
    used_slots: Mutex<BTreeSet<u32>>,
}

impl PortAllocator {
    pub fn new(config: PortAllocatorConfig) -> Self {
        Self {
            config,
            assignments: DashMap::new(),
            used_slots: Mutex::new(BTreeSet::new()),
        }
    }

    /// Return the existing assignment for `streamer_id`, if any.
    pub fn get(&self, streamer_id: &str) -> Option<u16> {
        self.assignments.get(streamer_id).map(|p| *p)
    }

    /// Allocate (or return the existing) base port for `streamer_id`.
    /// Idempotent under identity.
    pub fn allocate(&self, streamer_id: &str) -> u16 {
        if let Some(existing) = self.get(streamer_id) {
            return existing;
        }

        let mut used = self.used_slots.lock().unwrap();
        let slot = (0u32..).find(|s| !used.contains(s)).unwrap();
        used.insert(slot);
        drop(used);

        let port = self.config.base_port + (slot as u16) * self.config.ports_per_streamer;
        self.assignments.insert(streamer_id.to_string(), port);
        port
    }

    /// Release the assignment for `streamer_id`; its slot becomes reusable.
    pub fn release(&self, streamer_id: &str) {
        if let Some((_, port)) = self.assignments.remove(streamer_id) {
            let slot = ((port - self.config.base_port) / self.config.ports_per_streamer) as u32;
            self.used_slots.lock().unwrap().remove(&slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator() -> PortAllocator {
        PortAllocator::new(PortAllocatorConfig {
            base_port: 9000,
            ports_per_streamer: 4,
        })
    }

    #[test]
    fn allocate_is_idempotent() {
        let a = allocator();
        let p1 = a.allocate("s1");
        let p2 = a.allocate("s1");
        assert_eq!(p1, p2);
    }

    #[test]
    fn distinct_streamers_get_disjoint_ranges() {
        let a = allocator();
        let p1 = a.allocate("s1");
        let p2 = a.allocate("s2");
        assert_ne!(p1, p2);
        let r1 = p1..(p1 + 4);
        let r2 = p2..(p2 + 4);
        assert!(r1.end <= r2.start || r2.end <= r1.start);
    }

    #[test]
    fn release_frees_the_slot_for_reuse() {
        let a = allocator();
        let p1 = a.allocate("s1");
        a.release("s1");
        assert_eq!(a.get("s1"), None);
        let p2 = a.allocate("s2");
        assert_eq!(p1, p2, "freed slot should be reused by the lowest-slot search");
    }

    #[test]
    fn lowest_free_slot_is_chosen() {
        let a = allocator();
        let p1 = a.allocate("s1"); // slot 0 -> 9000
        let p2 = a.allocate("s2"); // slot 1 -> 9004
        a.release("s1");
        let p3 = a.allocate("s3"); // should reuse slot 0
        assert_eq!(p1, p3);
        assert_eq!(p2, 9004);
    }

    #[test]
    fn release_of_unknown_streamer_is_a_no_op() {
        let a = allocator();
        a.release("never-allocated");
        assert_eq!(a.get("never-allocated"), None);
    }
}

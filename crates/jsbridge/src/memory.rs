//! Heap statistics and the memory ceiling.
//!
//! JavaScriptCore has no hard heap limit, so the ceiling is a collection
//! trigger: when the reported heap size is above it at the end of an
//! operation, the engine runs a full collection.

use jsbridge_sys::*;

use crate::value::property_number;

/// Heap usage as reported by the engine, in bytes where applicable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub heap_size: u64,
    pub heap_capacity: u64,
    pub extra_memory: u64,
    pub object_count: u64,
    pub protected_object_count: u64,
}

impl HeapStats {
    /// Heap size plus memory held outside the heap by engine objects.
    pub fn total(&self) -> u64 {
        self.heap_size.saturating_add(self.extra_memory)
    }
}

/// # Safety
/// Lock held on the engine owning `ctx`.
pub(crate) unsafe fn read_heap_stats(ctx: JSContextRef) -> Option<HeapStats> {
    // SAFETY: per caller contract
    unsafe {
        let stats = JSGetMemoryUsageStatistics(ctx);
        if stats.is_null() {
            return None;
        }
        let read = |name: &str| {
            property_number(ctx, stats, name)
                .filter(|n| *n >= 0.0)
                .map(|n| n as u64)
                .unwrap_or(0)
        };
        Some(HeapStats {
            heap_size: read("heapSize"),
            heap_capacity: read("heapCapacity"),
            extra_memory: read("extraMemorySize"),
            object_count: read("objectCount"),
            protected_object_count: read("protectedObjectCount"),
        })
    }
}

/// Whether `stats` is above `ceiling`. A zero ceiling is unlimited.
pub(crate) fn exceeds_ceiling(stats: &HeapStats, ceiling: usize) -> bool {
    ceiling != 0 && stats.heap_size > ceiling as u64
}

//! Collection policy, statistics and reports.
//!
//! The collector itself lives in [`crate::Heap::collect`]; this module holds
//! the knobs that decide when it runs and the records it produces.

use core_types::HandleId;

/// Default number of allocations between automatic collections
pub const DEFAULT_THRESHOLD: usize = 4096;

/// Garbage collector configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcConfig {
    /// Allocations since the last collection before
    /// [`crate::Heap::should_collect`] reports true
    pub threshold: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Cumulative collector statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Handles allocated over the heap's lifetime
    pub allocations: usize,
    /// Collections performed
    pub collections: usize,
    /// Handles freed over the heap's lifetime
    pub total_freed: usize,
    /// Handles freed by the most recent collection
    pub last_freed: usize,
    /// Live handles after the most recent collection
    pub last_live: usize,
}

/// A weak edge whose target died during a collection.
///
/// The holder survived; whatever side table it keeps for `target` must drop
/// the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeakEviction {
    /// Surviving handle that observed the target
    pub holder: HandleId,
    /// Handle that was freed
    pub target: HandleId,
}

/// Outcome of one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Handles freed
    pub freed: usize,
    /// Handles that survived
    pub live: usize,
    /// Weak edges broken by the collection
    pub weak_evictions: Vec<WeakEviction>,
}

/// Payloads that can enumerate the handles they reference.
///
/// The heap tracks edges explicitly, so tracing is not needed to collect.
/// It is used to decide whether an edge may be removed when one reference
/// to a target is replaced, and by the debug check that every reference a
/// payload holds is backed by an edge.
pub trait Trace {
    /// Push every strongly referenced handle
    fn trace(&self, out: &mut Vec<HandleId>);

    /// Push every weakly referenced handle
    fn trace_weak(&self, _out: &mut Vec<HandleId>) {}
}

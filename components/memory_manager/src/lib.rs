//! Memory Manager - handle arena and reachability garbage collector
//!
//! This component provides:
//! - A generation-checked handle arena ([`Heap`]) generic over its payload
//! - Explicit strong and weak reference edges kept consistent in both
//!   directions
//! - Reachability queries and stop-the-world collection from root handles
//! - Weak-edge eviction reports for ephemeron side tables
//!
//! The heap never looks inside payloads to find references. Owners record
//! edges when they store a reference and remove them when the reference is
//! dropped; [`Trace`] is only consulted to decide whether a replaced
//! reference is still held through another slot.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod gc;
pub mod heap;

pub use gc::{CollectReport, GcConfig, GcStats, Trace, WeakEviction, DEFAULT_THRESHOLD};
pub use heap::Heap;

//! Contract tests pinning down the public memory_manager API.
//! These tests ensure all exported types and functions exist with correct signatures.

use memory_manager::{CollectReport, GcConfig, GcStats, Heap, DEFAULT_THRESHOLD};

/// Contract: Heap::new(GcConfig) -> Heap<T>
#[test]
fn contract_heap_new() {
    let heap: Heap<()> = Heap::new(GcConfig { threshold: 16 });
    assert_eq!(heap.config().threshold, 16);
    assert_eq!(heap.live_count(), 0);
}

/// Contract: Heap::default() uses DEFAULT_THRESHOLD
#[test]
fn contract_heap_default() {
    let heap: Heap<()> = Heap::default();
    assert_eq!(heap.config().threshold, DEFAULT_THRESHOLD);
}

/// Contract: add_parent(child, parent) mirrors link(parent, child)
#[test]
fn contract_add_parent_argument_order() {
    let mut heap = Heap::default();
    let parent = heap.alloc(1);
    let child = heap.alloc(2);
    assert!(heap.add_parent(child, parent));
    assert!(heap.has_edge(parent, child));
    assert_eq!(heap.children(parent), vec![child]);
    assert!(heap.remove_parent(child, parent));
    assert!(!heap.has_edge(parent, child));
}

/// Contract: collect(extra_roots) -> CollectReport
#[test]
fn contract_collect_report() {
    let mut heap = Heap::default();
    heap.alloc(1);
    let report: CollectReport = heap.collect(&[]);
    assert_eq!(report.freed, 1);
    assert_eq!(report.live, 0);
}

/// Contract: stats() -> GcStats
#[test]
fn contract_stats() {
    let heap: Heap<u8> = Heap::default();
    assert_eq!(heap.stats(), GcStats::default());
}

/// Contract: handles on a dead slot report nothing
#[test]
fn contract_dead_handle_queries() {
    let mut heap = Heap::default();
    let h = heap.alloc(5u8);
    heap.collect(&[]);
    assert!(!heap.contains(h));
    assert!(!heap.is_root(h));
    assert!(!heap.is_reachable(h));
    assert!(heap.parents(h).is_empty());
    assert_eq!(heap.get(h), None);
}

//! Handle arena with explicit reference edges.
//!
//! Every allocation gets a slot in the arena and a generation-checked
//! [`HandleId`]. Ownership is not inferred by scanning payloads: whoever
//! stores a reference also records an edge with [`Heap::link`], and the heap
//! keeps both directions of every edge in step:
//!
//! - `B ∈ A.children ⇔ A ∈ B.parents` for strong edges
//! - `B ∈ A.weak_children ⇔ A ∈ B.weak_parents` for weak edges
//!
//! A handle is alive while it is a root or reachable from a root over strong
//! edges. Weak edges never keep anything alive; when their target dies the
//! collector reports the broken edge so the holder can drop its side-table
//! entry.

use std::collections::VecDeque;

use core_types::HandleId;
use rustc_hash::FxHashSet;

use crate::gc::{CollectReport, GcConfig, GcStats, Trace, WeakEviction};

#[derive(Debug)]
struct Node<T> {
    value: T,
    parents: FxHashSet<HandleId>,
    children: FxHashSet<HandleId>,
    weak_parents: FxHashSet<HandleId>,
    weak_children: FxHashSet<HandleId>,
    is_root: bool,
}

impl<T> Node<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            parents: FxHashSet::default(),
            children: FxHashSet::default(),
            weak_parents: FxHashSet::default(),
            weak_children: FxHashSet::default(),
            is_root: false,
        }
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

/// Arena of GC-managed payloads.
///
/// # Examples
///
/// ```
/// use memory_manager::{GcConfig, Heap};
///
/// let mut heap: Heap<&str> = Heap::new(GcConfig::default());
/// let root = heap.alloc("root");
/// let child = heap.alloc("child");
/// let orphan = heap.alloc("orphan");
/// heap.set_root(root, true);
/// heap.link(root, child);
///
/// let report = heap.collect(&[]);
/// assert_eq!(report.freed, 1);
/// assert!(heap.contains(child));
/// assert!(!heap.contains(orphan));
/// ```
#[derive(Debug)]
pub struct Heap<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
    since_collect: usize,
    config: GcConfig,
    stats: GcStats,
}

impl<T> Default for Heap<T> {
    fn default() -> Self {
        Self::new(GcConfig::default())
    }
}

impl<T> Heap<T> {
    /// Creates an empty heap.
    pub fn new(config: GcConfig) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            since_collect: 0,
            config,
            stats: GcStats::default(),
        }
    }

    /// Collector configuration
    pub fn config(&self) -> GcConfig {
        self.config
    }

    /// Cumulative statistics
    pub fn stats(&self) -> GcStats {
        self.stats
    }

    /// Number of live handles
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Whether enough allocations happened since the last collection
    pub fn should_collect(&self) -> bool {
        self.since_collect >= self.config.threshold
    }

    /// Allocates a new handle owning `value`.
    ///
    /// The handle starts with no edges; unless it is linked under a live
    /// handle or made a root it is freed by the next collection.
    pub fn alloc(&mut self, value: T) -> HandleId {
        self.live += 1;
        self.since_collect += 1;
        self.stats.allocations += 1;
        let node = Some(Node::new(value));
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = node;
                HandleId::new(index, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node,
                });
                HandleId::new((self.slots.len() - 1) as u32, 0)
            }
        }
    }

    fn node(&self, handle: HandleId) -> Option<&Node<T>> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, handle: HandleId) -> Option<&mut Node<T>> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    /// Whether `handle` refers to a live slot
    pub fn contains(&self, handle: HandleId) -> bool {
        self.node(handle).is_some()
    }

    /// Payload of a live handle
    pub fn get(&self, handle: HandleId) -> Option<&T> {
        self.node(handle).map(|n| &n.value)
    }

    /// Mutable payload of a live handle
    pub fn get_mut(&mut self, handle: HandleId) -> Option<&mut T> {
        self.node_mut(handle).map(|n| &mut n.value)
    }

    /// Marks or unmarks a handle as a root
    pub fn set_root(&mut self, handle: HandleId, is_root: bool) {
        if let Some(node) = self.node_mut(handle) {
            node.is_root = is_root;
        }
    }

    /// Whether the handle is a root
    pub fn is_root(&self, handle: HandleId) -> bool {
        self.node(handle).is_some_and(|n| n.is_root)
    }

    /// Records a strong edge `parent → child`.
    ///
    /// Returns false when the edge already existed, when either handle is
    /// dead, or for a self edge.
    pub fn link(&mut self, parent: HandleId, child: HandleId) -> bool {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return false;
        }
        let added = match self.node_mut(parent) {
            Some(node) => node.children.insert(child),
            None => false,
        };
        if added {
            if let Some(node) = self.node_mut(child) {
                node.parents.insert(parent);
            }
        }
        added
    }

    /// Removes the strong edge `parent → child`; missing edges are ignored
    pub fn unlink(&mut self, parent: HandleId, child: HandleId) -> bool {
        let removed = match self.node_mut(parent) {
            Some(node) => node.children.remove(&child),
            None => false,
        };
        if removed {
            if let Some(node) = self.node_mut(child) {
                node.parents.remove(&parent);
            }
        }
        removed
    }

    /// Same as [`Heap::link`] with the arguments in child-first order
    pub fn add_parent(&mut self, child: HandleId, parent: HandleId) -> bool {
        self.link(parent, child)
    }

    /// Same as [`Heap::unlink`] with the arguments in child-first order
    pub fn remove_parent(&mut self, child: HandleId, parent: HandleId) -> bool {
        self.unlink(parent, child)
    }

    /// Records a weak edge `holder → target`
    pub fn link_weak(&mut self, holder: HandleId, target: HandleId) -> bool {
        if holder == target || !self.contains(holder) || !self.contains(target) {
            return false;
        }
        let added = match self.node_mut(holder) {
            Some(node) => node.weak_children.insert(target),
            None => false,
        };
        if added {
            if let Some(node) = self.node_mut(target) {
                node.weak_parents.insert(holder);
            }
        }
        added
    }

    /// Removes the weak edge `holder → target`
    pub fn unlink_weak(&mut self, holder: HandleId, target: HandleId) -> bool {
        let removed = match self.node_mut(holder) {
            Some(node) => node.weak_children.remove(&target),
            None => false,
        };
        if removed {
            if let Some(node) = self.node_mut(target) {
                node.weak_parents.remove(&holder);
            }
        }
        removed
    }

    /// Same as [`Heap::link_weak`] with the arguments in target-first order
    pub fn add_weak_parent(&mut self, target: HandleId, holder: HandleId) -> bool {
        self.link_weak(holder, target)
    }

    /// Same as [`Heap::unlink_weak`] with the arguments in target-first order
    pub fn remove_weak_parent(&mut self, target: HandleId, holder: HandleId) -> bool {
        self.unlink_weak(holder, target)
    }

    /// Whether the strong edge `parent → child` exists
    pub fn has_edge(&self, parent: HandleId, child: HandleId) -> bool {
        self.node(parent).is_some_and(|n| n.children.contains(&child))
    }

    /// Whether the weak edge `holder → target` exists
    pub fn has_weak_edge(&self, holder: HandleId, target: HandleId) -> bool {
        self.node(holder)
            .is_some_and(|n| n.weak_children.contains(&target))
    }

    /// Strong parents of a handle
    pub fn parents(&self, handle: HandleId) -> Vec<HandleId> {
        self.node(handle)
            .map(|n| n.parents.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Strong children of a handle
    pub fn children(&self, handle: HandleId) -> Vec<HandleId> {
        self.node(handle)
            .map(|n| n.children.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether a root can reach `handle` over strong edges.
    ///
    /// Walks parent edges backwards and stops at the first root found.
    pub fn is_reachable(&self, handle: HandleId) -> bool {
        let mut seen = FxHashSet::default();
        let mut queue = VecDeque::new();
        queue.push_back(handle);
        seen.insert(handle);
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.node(current) else {
                continue;
            };
            if node.is_root {
                return true;
            }
            for &parent in &node.parents {
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        false
    }

    /// Live handles in slot order
    pub fn handles(&self) -> impl Iterator<Item = HandleId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node
                .as_ref()
                .map(|_| HandleId::new(index as u32, slot.generation))
        })
    }

    /// Frees every handle not reachable from a root or from `extra_roots`.
    ///
    /// Edges touching freed handles are removed from the survivors. Weak
    /// edges from a surviving holder to a freed target are reported in the
    /// returned [`CollectReport`].
    pub fn collect(&mut self, extra_roots: &[HandleId]) -> CollectReport {
        let before = self.live;
        tracing::debug!(live = before, extra_roots = extra_roots.len(), "gc cycle starting");

        let mut marked = FxHashSet::default();
        let mut queue: VecDeque<HandleId> = self
            .handles()
            .filter(|&h| self.is_root(h))
            .chain(extra_roots.iter().copied().filter(|&h| self.contains(h)))
            .collect();
        marked.extend(queue.iter().copied());
        while let Some(current) = queue.pop_front() {
            if let Some(node) = self.node(current) {
                for &child in &node.children {
                    if marked.insert(child) {
                        queue.push_back(child);
                    }
                }
            }
        }

        let dead: Vec<HandleId> = self.handles().filter(|h| !marked.contains(h)).collect();
        let mut report = CollectReport::default();
        for &handle in &dead {
            let index = handle.index();
            let Some(node) = self.slots[index].node.take() else {
                continue;
            };
            self.slots[index].generation = self.slots[index].generation.wrapping_add(1);
            self.free.push(index as u32);
            self.live -= 1;

            for child in node.children {
                if let Some(survivor) = self.node_mut(child) {
                    survivor.parents.remove(&handle);
                }
            }
            for target in node.weak_children {
                if let Some(survivor) = self.node_mut(target) {
                    survivor.weak_parents.remove(&handle);
                }
            }
            for holder in node.weak_parents {
                if let Some(survivor) = self.node_mut(holder) {
                    survivor.weak_children.remove(&handle);
                    report.weak_evictions.push(WeakEviction {
                        holder,
                        target: handle,
                    });
                }
            }
        }

        report.freed = dead.len();
        report.live = self.live;
        self.since_collect = 0;
        self.stats.collections += 1;
        self.stats.total_freed += report.freed;
        self.stats.last_freed = report.freed;
        self.stats.last_live = report.live;

        for eviction in &report.weak_evictions {
            tracing::trace!(holder = %eviction.holder, target = %eviction.target, "weak edge evicted");
        }
        tracing::debug!(
            freed = report.freed,
            live = report.live,
            weak_evictions = report.weak_evictions.len(),
            "gc cycle complete"
        );
        debug_assert!(self.check_invariants().is_ok(), "{:?}", self.check_invariants());
        report
    }

    /// Verifies that both directions of every edge agree and that no edge
    /// points at a freed slot.
    pub fn check_invariants(&self) -> Result<(), String> {
        for handle in self.handles() {
            let Some(node) = self.node(handle) else {
                continue;
            };
            for &child in &node.children {
                if !self.node(child).is_some_and(|c| c.parents.contains(&handle)) {
                    return Err(format!("{} → {} has no matching parent edge", handle, child));
                }
            }
            for &parent in &node.parents {
                if !self.node(parent).is_some_and(|p| p.children.contains(&handle)) {
                    return Err(format!("{} ← {} has no matching child edge", handle, parent));
                }
            }
            for &target in &node.weak_children {
                if !self
                    .node(target)
                    .is_some_and(|t| t.weak_parents.contains(&handle))
                {
                    return Err(format!("{} ⇢ {} has no matching weak parent", handle, target));
                }
            }
            for &holder in &node.weak_parents {
                if !self
                    .node(holder)
                    .is_some_and(|h| h.weak_children.contains(&handle))
                {
                    return Err(format!("{} ⇠ {} has no matching weak child", handle, holder));
                }
            }
        }
        Ok(())
    }
}

impl<T: Trace> Heap<T> {
    /// Replaces one reference held by `owner`.
    ///
    /// Call after the payload has been updated. `new` is linked; `old` is
    /// unlinked only if the payload no longer references it through another
    /// slot.
    pub fn replace_edge(&mut self, owner: HandleId, old: Option<HandleId>, new: Option<HandleId>) {
        if let Some(new) = new {
            self.link(owner, new);
        }
        let Some(old) = old else {
            return;
        };
        if Some(old) == new {
            return;
        }
        let mut refs = Vec::new();
        if let Some(value) = self.get(owner) {
            value.trace(&mut refs);
        }
        if !refs.contains(&old) {
            self.unlink(owner, old);
        }
    }

    /// Verifies that every handle a payload references is backed by an edge.
    ///
    /// References to the payload's own handle never get an edge and are
    /// skipped.
    pub fn check_payload_edges(&self) -> Result<(), String> {
        let mut refs = Vec::new();
        for handle in self.handles() {
            let Some(node) = self.node(handle) else {
                continue;
            };
            refs.clear();
            node.value.trace(&mut refs);
            if let Some(missing) = refs
                .iter()
                .find(|r| **r != handle && !node.children.contains(*r))
            {
                return Err(format!("{} references {} without an edge", handle, missing));
            }
            refs.clear();
            node.value.trace_weak(&mut refs);
            if let Some(missing) = refs
                .iter()
                .find(|r| **r != handle && !node.weak_children.contains(*r))
            {
                return Err(format!("{} weakly references {} without an edge", handle, missing));
            }
        }
        Ok(())
    }
}

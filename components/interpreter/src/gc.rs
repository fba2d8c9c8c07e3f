//! Collection entry points of the runtime.
//!
//! The heap decides liveness from its edges; the runtime adds the handles
//! host frames are holding (pinned) and cleans weak tables afterwards.

use core_types::HandleId;
use memory_manager::CollectReport;

use crate::runtime::Runtime;

impl Runtime {
    /// Run a full collection now
    pub fn collect_garbage(&mut self) -> CollectReport {
        let report = self.heap.collect(&self.pinned);
        for eviction in &report.weak_evictions {
            let removed = self
                .value_mut(eviction.holder)
                .and_then(|value| value.as_object_mut())
                .and_then(|data| data.weak.as_mut())
                .and_then(|table| table.remove(eviction.target));
            if removed.is_some() {
                self.heap.replace_edge(eviction.holder, removed, None);
            }
        }
        tracing::debug!(
            freed = report.freed,
            live = report.live,
            evicted = report.weak_evictions.len(),
            "runtime collection"
        );
        report
    }

    /// Collect when the configuration allows it and the threshold is reached
    pub(crate) fn maybe_collect(&mut self) {
        if self.config.collect_on_scope_pop && self.heap.should_collect() {
            self.collect_garbage();
        }
    }

    /// Keep `handles` alive until [`Runtime::unpin`] is called with the
    /// returned mark
    pub(crate) fn pin(&mut self, handles: &[HandleId]) -> usize {
        let mark = self.pinned.len();
        self.pinned.extend_from_slice(handles);
        mark
    }

    pub(crate) fn unpin(&mut self, mark: usize) {
        self.pinned.truncate(mark);
    }
}

//! Runtime configuration

use memory_manager::{GcConfig, DEFAULT_THRESHOLD};

/// Default maximum nesting of calls before a RangeError is raised
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Tunables of a [`crate::Runtime`].
///
/// # Examples
///
/// ```
/// use interpreter::RuntimeConfig;
///
/// let config = RuntimeConfig::new()
///     .with_gc_threshold(128)
///     .with_max_call_depth(64);
/// assert_eq!(config.gc_threshold, 128);
/// assert!(config.collect_on_scope_pop);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Allocations between automatic collections
    pub gc_threshold: usize,
    /// Run the collector when a scope is popped and the threshold is reached
    pub collect_on_scope_pop: bool,
    /// Maximum call depth
    pub max_call_depth: usize,
}

impl RuntimeConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self {
            gc_threshold: DEFAULT_THRESHOLD,
            collect_on_scope_pop: true,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Set the allocation threshold
    pub fn with_gc_threshold(mut self, threshold: usize) -> Self {
        self.gc_threshold = threshold;
        self
    }

    /// Enable or disable collection at scope pop
    pub fn with_collect_on_scope_pop(mut self, enabled: bool) -> Self {
        self.collect_on_scope_pop = enabled;
        self
    }

    /// Set the maximum call depth
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Collector settings derived from this configuration
    pub fn gc_config(&self) -> GcConfig {
        GcConfig {
            threshold: self.gc_threshold,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

//! Object payload: property table, prototype, internal slots.
//!
//! Properties are kept in insertion order. Keys compare by content for
//! strings and by identity for symbols.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::HandleId;

/// Identity of a symbol, shared by all copies of the same symbol value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u64);

/// Symbol used as a property key.
///
/// Equality and hashing only look at `id`; `handle` keeps the symbol value
/// reachable while it is used as a key.
#[derive(Debug, Clone, Copy)]
pub struct SymbolKey {
    /// Identity of the symbol
    pub id: SymbolId,
    /// Handle of the symbol value
    pub handle: HandleId,
}

impl PartialEq for SymbolKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SymbolKey {}

impl Hash for SymbolKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Property key: a string or a symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// String key, compared by content
    String(String),
    /// Symbol key, compared by identity
    Symbol(SymbolKey),
}

impl PropertyKey {
    /// Whether this is a symbol key
    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }

    /// The string content of a string key
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyKey::String(s) => Some(s),
            PropertyKey::Symbol(_) => None,
        }
    }

    /// Parse a canonical array index ("0", "17", not "01")
    pub fn array_index(&self) -> Option<u32> {
        let s = self.as_str()?;
        if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
            return None;
        }
        s.parse::<u32>().ok().filter(|&i| i != u32::MAX)
    }
}

impl From<&str> for PropertyKey {
    fn from(value: &str) -> Self {
        PropertyKey::String(value.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(value: String) -> Self {
        PropertyKey::String(value)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => f.write_str(s),
            PropertyKey::Symbol(key) => write!(f, "Symbol({})", key.id.0),
        }
    }
}

/// Storage part of a property descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertySlot {
    /// Data property
    Data {
        /// Stored value
        value: HandleId,
        /// Whether assignment may replace the value
        writable: bool,
    },
    /// Accessor property
    Accessor {
        /// Getter function, if any
        get: Option<HandleId>,
        /// Setter function, if any
        set: Option<HandleId>,
    },
}

/// Value or accessor plus attribute flags of one property
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyDescriptor {
    /// Value or accessor pair
    pub slot: PropertySlot,
    /// Visible to key enumeration
    pub enumerable: bool,
    /// May be deleted or redefined
    pub configurable: bool,
}

impl PropertyDescriptor {
    /// Writable, enumerable, configurable data property
    pub fn data(value: HandleId) -> Self {
        Self::data_with(value, true, true, true)
    }

    /// Data property with explicit attributes
    pub fn data_with(value: HandleId, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            slot: PropertySlot::Data { value, writable },
            enumerable,
            configurable,
        }
    }

    /// Writable, configurable, non-enumerable data property
    pub fn hidden(value: HandleId) -> Self {
        Self::data_with(value, true, false, true)
    }

    /// Accessor property
    pub fn accessor(
        get: Option<HandleId>,
        set: Option<HandleId>,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Self {
            slot: PropertySlot::Accessor { get, set },
            enumerable,
            configurable,
        }
    }

    /// Whether this is a data property
    pub fn is_data(&self) -> bool {
        matches!(self.slot, PropertySlot::Data { .. })
    }

    /// Stored value of a data property
    pub fn value(&self) -> Option<HandleId> {
        match self.slot {
            PropertySlot::Data { value, .. } => Some(value),
            PropertySlot::Accessor { .. } => None,
        }
    }

    /// Writable flag; accessors report false
    pub fn writable(&self) -> bool {
        matches!(self.slot, PropertySlot::Data { writable: true, .. })
    }

    /// Handles referenced by the descriptor
    pub fn references(&self, out: &mut Vec<HandleId>) {
        match self.slot {
            PropertySlot::Data { value, .. } => out.push(value),
            PropertySlot::Accessor { get, set } => {
                out.extend(get);
                out.extend(set);
            }
        }
    }
}

/// Ordered property table
pub type PropertyMap = IndexMap<PropertyKey, PropertyDescriptor, FxBuildHasher>;

/// Host-side attachments keyed by name.
///
/// Builtins stash per-instance native state here (a compiled regular
/// expression, a collection backing store). Script code never sees it.
#[derive(Clone, Default)]
pub struct Attachments(FxHashMap<String, Rc<dyn Any>>);

impl Attachments {
    /// Store an attachment, replacing any previous one under the same name
    pub fn insert<T: Any>(&mut self, name: impl Into<String>, value: T) {
        self.0.insert(name.into(), Rc::new(value));
    }

    /// Fetch an attachment of a known type
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.0.get(name).and_then(|v| v.downcast_ref::<T>())
    }

    /// Remove an attachment
    pub fn remove(&mut self, name: &str) -> bool {
        self.0.remove(name).is_some()
    }

    /// Whether an attachment exists under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

impl fmt::Debug for Attachments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Ephemeron table: keys held weakly, values held strongly
#[derive(Debug, Clone, Default)]
pub struct WeakTable {
    entries: IndexMap<HandleId, HandleId, FxBuildHasher>,
}

impl WeakTable {
    /// Value stored for `key`
    pub fn get(&self, key: HandleId) -> Option<HandleId> {
        self.entries.get(&key).copied()
    }

    /// Store a value, returning the previous one
    pub fn insert(&mut self, key: HandleId, value: HandleId) -> Option<HandleId> {
        self.entries.insert(key, value)
    }

    /// Remove an entry, returning its value
    pub fn remove(&mut self, key: HandleId) -> Option<HandleId> {
        self.entries.shift_remove(&key)
    }

    /// Whether `key` has an entry
    pub fn contains(&self, key: HandleId) -> bool {
        self.entries.contains_key(&key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over (key, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (HandleId, HandleId)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }
}

/// Payload shared by every object-like value kind
#[derive(Debug, Clone)]
pub struct ObjectData {
    /// Own properties in insertion order
    pub properties: PropertyMap,
    /// Prototype, or None for a null prototype
    pub prototype: Option<HandleId>,
    /// Internal slots, invisible to scripts
    pub internal: FxHashMap<String, HandleId>,
    /// New properties may be added
    pub extensible: bool,
    /// Properties may not be deleted
    pub sealed: bool,
    /// Properties may not be deleted or changed
    pub frozen: bool,
    /// Host-side attachments
    pub attachments: Attachments,
    /// Ephemeron entries of weak collections
    pub weak: Option<WeakTable>,
}

impl ObjectData {
    /// Empty, extensible object with the given prototype
    pub fn new(prototype: Option<HandleId>) -> Self {
        Self {
            properties: PropertyMap::default(),
            prototype,
            internal: FxHashMap::default(),
            extensible: true,
            sealed: false,
            frozen: false,
            attachments: Attachments::default(),
            weak: None,
        }
    }

    /// Own property lookup
    pub fn get_own(&self, key: &PropertyKey) -> Option<&PropertyDescriptor> {
        self.properties.get(key)
    }

    /// Own keys: strings in insertion order, then symbols in insertion order
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let strings = self.properties.keys().filter(|k| !k.is_symbol());
        let symbols = self.properties.keys().filter(|k| k.is_symbol());
        strings.chain(symbols).cloned().collect()
    }

    /// Strong references held by this object
    pub fn references(&self, out: &mut Vec<HandleId>) {
        out.extend(self.prototype);
        for (key, desc) in &self.properties {
            if let PropertyKey::Symbol(sym) = key {
                out.push(sym.handle);
            }
            desc.references(out);
        }
        out.extend(self.internal.values().copied());
        if let Some(weak) = &self.weak {
            out.extend(weak.iter().map(|(_, v)| v));
        }
    }

    /// Weak references held by this object
    pub fn weak_references(&self, out: &mut Vec<HandleId>) {
        if let Some(weak) = &self.weak {
            out.extend(weak.iter().map(|(k, _)| k));
        }
    }
}

impl Default for ObjectData {
    fn default() -> Self {
        Self::new(None)
    }
}

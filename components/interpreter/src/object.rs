//! Property access, definition and deletion on object-like values.
//!
//! Every mutation of a property table goes through [`Runtime::put_own`] or
//! [`Runtime::remove_own`], which keep the heap edges of the owning handle
//! in step with the handles its descriptors reference.

use core_types::{
    to_uint32, HandleId, ObjectData, PropertyDescriptor, PropertyKey, PropertySlot, SymbolKey,
    Value, ValueKind, WeakTable,
};

use crate::runtime::{JsResult, Runtime};

const MAX_PROTOTYPE_DEPTH: usize = 10_000;

impl Runtime {
    /// Plain object inheriting from `Object.prototype`
    pub fn create_object(&mut self) -> HandleId {
        let proto = self.intrinsics.object_prototype;
        self.create_object_with_proto(Some(proto))
    }

    /// Plain object with an explicit prototype
    pub fn create_object_with_proto(&mut self, prototype: Option<HandleId>) -> HandleId {
        self.alloc(Value::object(prototype))
    }

    /// Array holding `items` in order
    pub fn create_array(&mut self, items: &[HandleId]) -> HandleId {
        let proto = self.intrinsics.array_prototype;
        let length = self.number(items.len() as f64);
        let mut data = ObjectData::new(Some(proto));
        for (index, &item) in items.iter().enumerate() {
            data.properties
                .insert(PropertyKey::from(index.to_string()), PropertyDescriptor::data(item));
        }
        data.properties.insert(
            PropertyKey::from("length"),
            PropertyDescriptor::data_with(length, true, false, false),
        );
        self.alloc(Value::Array(Box::new(data)))
    }

    fn object_data(&self, handle: HandleId) -> Option<&ObjectData> {
        self.value(handle).and_then(Value::as_object)
    }

    fn object_data_mut(&mut self, handle: HandleId) -> Option<&mut ObjectData> {
        self.value_mut(handle).and_then(Value::as_object_mut)
    }

    fn is_array(&self, handle: HandleId) -> bool {
        self.kind(handle) == ValueKind::Array
    }

    /// Property key naming a symbol handle
    pub fn symbol_key(&self, symbol: HandleId) -> Option<PropertyKey> {
        let data = self.value(symbol).and_then(Value::as_symbol)?;
        Some(PropertyKey::Symbol(SymbolKey {
            id: data.id,
            handle: symbol,
        }))
    }

    /// Convert a value to a property key: symbols by identity, anything else
    /// by its string form
    pub fn to_property_key(&mut self, key: HandleId) -> JsResult<PropertyKey> {
        if let Some(symbol) = self.symbol_key(key) {
            return Ok(symbol);
        }
        let key = if self.is_object_like(key) {
            self.to_primitive(key, crate::PreferredType::String)?
        } else {
            key
        };
        match self.symbol_key(key) {
            Some(symbol) => Ok(symbol),
            None => Ok(PropertyKey::from(self.to_string(key)?)),
        }
    }

    /// Insert or replace an own property without any checks
    pub(crate) fn put_own(&mut self, object: HandleId, key: PropertyKey, desc: PropertyDescriptor) {
        let mut added = Vec::new();
        desc.references(&mut added);
        if let PropertyKey::Symbol(symbol) = &key {
            added.push(symbol.handle);
        }
        let Some(data) = self.object_data_mut(object) else {
            return;
        };
        let previous = data.properties.insert(key, desc);
        for child in added {
            self.heap.link(object, child);
        }
        if let Some(previous) = previous {
            let mut dropped = Vec::new();
            previous.references(&mut dropped);
            for old in dropped {
                self.heap.replace_edge(object, Some(old), None);
            }
        }
    }

    /// Remove an own property without any checks
    pub(crate) fn remove_own(&mut self, object: HandleId, key: &PropertyKey) -> Option<PropertyDescriptor> {
        let removed = self.object_data_mut(object)?.properties.shift_remove(key)?;
        let mut dropped = Vec::new();
        removed.references(&mut dropped);
        if let PropertyKey::Symbol(symbol) = key {
            dropped.push(symbol.handle);
        }
        for old in dropped {
            self.heap.replace_edge(object, Some(old), None);
        }
        Some(removed)
    }

    /// Internal slot of an object
    pub fn get_internal(&self, object: HandleId, name: &str) -> Option<HandleId> {
        self.object_data(object)?.internal.get(name).copied()
    }

    /// Set or clear an internal slot
    pub fn set_internal(&mut self, object: HandleId, name: &str, value: Option<HandleId>) {
        let Some(data) = self.object_data_mut(object) else {
            return;
        };
        let previous = match value {
            Some(value) => data.internal.insert(name.to_string(), value),
            None => data.internal.remove(name),
        };
        self.heap.replace_edge(object, previous, value);
    }

    /// Own property descriptor
    pub fn get_own_property(&self, object: HandleId, key: &PropertyKey) -> Option<PropertyDescriptor> {
        self.object_data(object)?.get_own(key).copied()
    }

    /// Walk the prototype chain for `key`; returns the holder and descriptor
    pub fn get_property(
        &self,
        object: HandleId,
        key: &PropertyKey,
    ) -> Option<(HandleId, PropertyDescriptor)> {
        let mut current = Some(object);
        for _ in 0..MAX_PROTOTYPE_DEPTH {
            let holder = current?;
            let data = self.object_data(holder)?;
            if let Some(desc) = data.get_own(key) {
                return Some((holder, *desc));
            }
            current = data.prototype;
        }
        None
    }

    /// Prototype of an object-like value
    pub fn get_prototype(&self, object: HandleId) -> Option<HandleId> {
        self.object_data(object)?.prototype
    }

    /// Replace the prototype of an object
    pub fn set_prototype(&mut self, object: HandleId, prototype: Option<HandleId>) -> JsResult<()> {
        let Some((current, extensible)) = self
            .object_data(object)
            .map(|data| (data.prototype, data.extensible))
        else {
            return Err(self.type_error("Object.setPrototypeOf called on non-object"));
        };
        if current == prototype {
            return Ok(());
        }
        if !extensible {
            return Err(self.type_error("#<Object> is not extensible"));
        }
        let mut cursor = prototype;
        while let Some(p) = cursor {
            if p == object {
                return Err(self.type_error("Cyclic __proto__ value"));
            }
            cursor = self.get_prototype(p);
        }
        let previous = match self.object_data_mut(object) {
            Some(data) => std::mem::replace(&mut data.prototype, prototype),
            None => None,
        };
        self.heap.replace_edge(object, previous, prototype);
        Ok(())
    }

    fn same_value(&self, a: HandleId, b: HandleId) -> bool {
        if a == b {
            return true;
        }
        match (self.value(a), self.value(b)) {
            (Some(Value::Number(x)), Some(Value::Number(y))) => {
                (x.is_nan() && y.is_nan()) || (x == y && x.is_sign_negative() == y.is_sign_negative())
            }
            _ => self.strict_equals(a, b),
        }
    }

    /// Define an own property.
    ///
    /// Fails with a `TypeError` when the object is not extensible and the
    /// property is new, or when a non-configurable property would change in
    /// a way other than a value update of a writable data property or a
    /// writable → read-only transition.
    pub fn define_property(
        &mut self,
        object: HandleId,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> JsResult<()> {
        let Some((existing, extensible)) = self
            .object_data(object)
            .map(|data| (data.get_own(&key).copied(), data.extensible))
        else {
            return Err(self.type_error("Object.defineProperty called on non-object"));
        };
        match existing {
            None if !extensible => {
                return Err(self.type_error(format!(
                    "Cannot define property {}, object is not extensible",
                    key
                )));
            }
            Some(current) if !current.configurable => {
                let compatible = !desc.configurable
                    && desc.enumerable == current.enumerable
                    && match (current.slot, desc.slot) {
                        (
                            PropertySlot::Data {
                                value: old,
                                writable: old_writable,
                            },
                            PropertySlot::Data {
                                value: new,
                                writable: new_writable,
                            },
                        ) => old_writable || (!new_writable && self.same_value(old, new)),
                        (
                            PropertySlot::Accessor { get: g1, set: s1 },
                            PropertySlot::Accessor { get: g2, set: s2 },
                        ) => g1 == g2 && s1 == s2,
                        _ => false,
                    };
                if !compatible {
                    return Err(self.type_error(format!("Cannot redefine property: {}", key)));
                }
            }
            _ => {}
        }

        if self.is_array(object) {
            if key.as_str() == Some("length") {
                if let Some(value) = desc.value() {
                    self.truncate_array(object, value)?;
                }
            } else if let Some(index) = key.array_index() {
                self.grow_array(object, index)?;
            }
        }
        self.put_own(object, key, desc);
        Ok(())
    }

    /// Read `object[key]`.
    ///
    /// Primitives other than `null`/`undefined` read through
    /// `Object.prototype`; strings also expose `length` and indices, both
    /// counted in UTF-16 code units.
    pub fn get(&mut self, object: HandleId, key: &PropertyKey) -> JsResult {
        let start = match self.value(object) {
            None | Some(Value::Undefined) | Some(Value::Uninitialized) | Some(Value::Null) => {
                let what = if self.kind(object) == ValueKind::Null {
                    "null"
                } else {
                    "undefined"
                };
                return Err(self.type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    what, key
                )));
            }
            Some(Value::String(s)) => {
                if key.as_str() == Some("length") {
                    let length = s.encode_utf16().count() as f64;
                    return Ok(self.number(length));
                }
                // Indexing yields one UTF-16 code unit. A lone surrogate half
                // has no `String` form and reads as U+FFFD.
                if let Some(index) = key.array_index() {
                    let unit = s.encode_utf16().nth(index as usize);
                    return Ok(match unit {
                        Some(unit) => {
                            let text = String::from_utf16_lossy(&[unit]);
                            self.string(text)
                        }
                        None => self.undefined(),
                    });
                }
                self.intrinsics.object_prototype
            }
            Some(Value::Symbol(symbol)) if key.as_str() == Some("description") => {
                return Ok(match symbol.description.clone() {
                    Some(text) => self.string(text),
                    None => self.undefined(),
                });
            }
            Some(v) if v.is_object_like() => object,
            Some(_) => self.intrinsics.object_prototype,
        };
        match self.get_property(start, key) {
            None => Ok(self.undefined()),
            Some((_, desc)) => match desc.slot {
                PropertySlot::Data { value, .. } => Ok(value),
                PropertySlot::Accessor { get: Some(getter), .. } => self.call(getter, object, &[]),
                PropertySlot::Accessor { get: None, .. } => Ok(self.undefined()),
            },
        }
    }

    /// `GET_FIELD`: read `object[key]` with a key value
    pub fn get_field(&mut self, object: HandleId, key: HandleId) -> JsResult {
        let key = self.to_property_key(key)?;
        self.get(object, &key)
    }

    /// Assign `object[key] = value`.
    ///
    /// Writable data properties are updated in place, setters are called,
    /// read-only properties and getter-only accessors raise a `TypeError`,
    /// and a missing property becomes a new own enumerable property when
    /// the object is extensible. Assignments to primitives are ignored.
    pub fn set(&mut self, object: HandleId, key: PropertyKey, value: HandleId) -> JsResult<()> {
        match self.value(object) {
            None | Some(Value::Undefined) | Some(Value::Uninitialized) | Some(Value::Null) => {
                let what = if self.kind(object) == ValueKind::Null {
                    "null"
                } else {
                    "undefined"
                };
                return Err(self.type_error(format!(
                    "Cannot set properties of {} (setting '{}')",
                    what, key
                )));
            }
            Some(v) if !v.is_object_like() => return Ok(()),
            _ => {}
        }

        if let Some(own) = self.get_own_property(object, &key) {
            return match own.slot {
                PropertySlot::Data { writable: true, .. } => {
                    if self.is_array(object) && key.as_str() == Some("length") {
                        return self.truncate_array(object, value);
                    }
                    let desc = PropertyDescriptor {
                        slot: PropertySlot::Data {
                            value,
                            writable: true,
                        },
                        ..own
                    };
                    self.put_own(object, key, desc);
                    Ok(())
                }
                PropertySlot::Data { writable: false, .. } => Err(self.type_error(format!(
                    "Cannot assign to read only property '{}' of object",
                    key
                ))),
                PropertySlot::Accessor { set: Some(setter), .. } => {
                    self.call(setter, object, &[value])?;
                    Ok(())
                }
                PropertySlot::Accessor { set: None, .. } => Err(self.type_error(format!(
                    "Cannot set property {} of object which has only a getter",
                    key
                ))),
            };
        }

        if let Some((_, inherited)) = self
            .get_prototype(object)
            .and_then(|proto| self.get_property(proto, &key))
        {
            match inherited.slot {
                PropertySlot::Accessor { set: Some(setter), .. } => {
                    self.call(setter, object, &[value])?;
                    return Ok(());
                }
                PropertySlot::Accessor { set: None, .. } => {
                    return Err(self.type_error(format!(
                        "Cannot set property {} of object which has only a getter",
                        key
                    )));
                }
                PropertySlot::Data {
                    writable: false, ..
                } => {
                    return Err(self.type_error(format!(
                        "Cannot assign to read only property '{}' of object",
                        key
                    )));
                }
                PropertySlot::Data { .. } => {}
            }
        }

        if !self.object_data(object).is_some_and(|d| d.extensible) {
            return Err(self.type_error(format!(
                "Cannot add property {}, object is not extensible",
                key
            )));
        }
        if self.is_array(object) {
            if let Some(index) = key.array_index() {
                self.grow_array(object, index)?;
            }
        }
        self.put_own(object, key, PropertyDescriptor::data(value));
        Ok(())
    }

    /// `SET_FIELD`: assign with a key value
    pub fn set_field(&mut self, object: HandleId, key: HandleId, value: HandleId) -> JsResult<()> {
        let key = self.to_property_key(key)?;
        self.set(object, key, value)
    }

    /// Delete an own property.
    ///
    /// Missing properties delete successfully; non-configurable ones raise a
    /// `TypeError` and stay in place.
    pub fn delete(&mut self, object: HandleId, key: &PropertyKey) -> JsResult<bool> {
        match self.value(object) {
            None | Some(Value::Undefined) | Some(Value::Uninitialized) | Some(Value::Null) => {
                return Err(self.type_error("Cannot convert undefined or null to object"));
            }
            Some(v) if !v.is_object_like() => return Ok(true),
            _ => {}
        }
        match self.get_own_property(object, key) {
            None => Ok(true),
            Some(desc) if !desc.configurable => Err(self.type_error(format!(
                "Cannot delete property '{}' of object",
                key
            ))),
            Some(_) => {
                self.remove_own(object, key);
                Ok(true)
            }
        }
    }

    /// `DEL_FIELD`: delete with a key value
    pub fn delete_field(&mut self, object: HandleId, key: HandleId) -> JsResult<bool> {
        let key = self.to_property_key(key)?;
        self.delete(object, &key)
    }

    /// Own keys: strings in insertion order, then symbols
    pub fn own_keys(&self, object: HandleId) -> Vec<PropertyKey> {
        self.object_data(object)
            .map(ObjectData::own_keys)
            .unwrap_or_default()
    }

    /// Whether `key` is found on the object or its prototype chain
    pub fn has_property(&self, object: HandleId, key: &PropertyKey) -> bool {
        self.get_property(object, key).is_some()
    }

    /// Whether `key` is an own property
    pub fn has_own_property(&self, object: HandleId, key: &PropertyKey) -> bool {
        self.get_own_property(object, key).is_some()
    }

    /// `KEYS`: array of the enumerable string keys reachable from a value,
    /// own keys first, then inherited ones not shadowed
    pub fn keys(&mut self, object: HandleId) -> JsResult {
        let mut names: Vec<String> = Vec::new();
        if let Some(Value::String(s)) = self.value(object) {
            names.extend((0..s.encode_utf16().count()).map(|i| i.to_string()));
        }
        let mut seen: Vec<PropertyKey> = Vec::new();
        let mut current = self.object_data(object).map(|_| object);
        let mut depth = 0;
        while let Some(holder) = current {
            let Some(data) = self.object_data(holder) else {
                break;
            };
            for (key, desc) in &data.properties {
                let PropertyKey::String(name) = key else {
                    continue;
                };
                if seen.contains(key) {
                    continue;
                }
                seen.push(key.clone());
                if desc.enumerable {
                    names.push(name.clone());
                }
            }
            current = data.prototype;
            depth += 1;
            if depth >= MAX_PROTOTYPE_DEPTH {
                break;
            }
        }
        let items: Vec<HandleId> = names.into_iter().map(|name| self.string(name)).collect();
        Ok(self.create_array(&items))
    }

    /// Forbid new properties
    pub fn prevent_extensions(&mut self, object: HandleId) -> JsResult<()> {
        match self.object_data_mut(object) {
            Some(data) => {
                data.extensible = false;
                Ok(())
            }
            None => Err(self.type_error("Object.preventExtensions called on non-object")),
        }
    }

    /// Forbid new properties and make every property non-configurable
    pub fn seal(&mut self, object: HandleId) -> JsResult<()> {
        match self.object_data_mut(object) {
            Some(data) => {
                data.extensible = false;
                data.sealed = true;
                for desc in data.properties.values_mut() {
                    desc.configurable = false;
                }
                Ok(())
            }
            None => Err(self.type_error("Object.seal called on non-object")),
        }
    }

    /// Seal and additionally make every data property read-only
    pub fn freeze(&mut self, object: HandleId) -> JsResult<()> {
        match self.object_data_mut(object) {
            Some(data) => {
                data.extensible = false;
                data.sealed = true;
                data.frozen = true;
                for desc in data.properties.values_mut() {
                    desc.configurable = false;
                    if let PropertySlot::Data { writable, .. } = &mut desc.slot {
                        *writable = false;
                    }
                }
                Ok(())
            }
            None => Err(self.type_error("Object.freeze called on non-object")),
        }
    }

    /// Whether new properties may be added
    pub fn is_extensible(&self, object: HandleId) -> bool {
        self.object_data(object).is_some_and(|d| d.extensible)
    }

    /// Whether the object was sealed
    pub fn is_sealed(&self, object: HandleId) -> bool {
        self.object_data(object).is_some_and(|d| d.sealed)
    }

    /// Whether the object was frozen
    pub fn is_frozen(&self, object: HandleId) -> bool {
        self.object_data(object).is_some_and(|d| d.frozen)
    }

    /// Value of an own numeric `length` property, zero when absent
    pub fn array_length(&self, object: HandleId) -> usize {
        self.get_own_property(object, &PropertyKey::from("length"))
            .and_then(|desc| desc.value())
            .and_then(|h| self.value(h))
            .and_then(Value::as_number)
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as usize)
            .unwrap_or(0)
    }

    /// Elements `0..length` of an array; holes and accessors read as
    /// `undefined`
    pub fn array_elements(&self, array: HandleId) -> Vec<HandleId> {
        let undefined = self.undefined();
        (0..self.array_length(array))
            .map(|i| {
                self.get_own_property(array, &PropertyKey::from(i.to_string()))
                    .and_then(|desc| desc.value())
                    .unwrap_or(undefined)
            })
            .collect()
    }

    fn write_length(&mut self, array: HandleId, length: u32) -> JsResult<()> {
        let key = PropertyKey::from("length");
        let current = self.get_own_property(array, &key);
        if current.is_some_and(|desc| !desc.writable()) {
            return Err(self.type_error("Cannot assign to read only property 'length' of object"));
        }
        let handle = self.number(length as f64);
        let desc = match current {
            Some(desc) => PropertyDescriptor {
                slot: PropertySlot::Data {
                    value: handle,
                    writable: true,
                },
                ..desc
            },
            None => PropertyDescriptor::data_with(handle, true, false, false),
        };
        self.put_own(array, key, desc);
        Ok(())
    }

    fn grow_array(&mut self, array: HandleId, index: u32) -> JsResult<()> {
        if (index as usize) < self.array_length(array) {
            return Ok(());
        }
        self.write_length(array, index + 1)
    }

    fn truncate_array(&mut self, array: HandleId, length: HandleId) -> JsResult<()> {
        let requested = self.to_number(length)?;
        let new_length = to_uint32(requested);
        if new_length as f64 != requested {
            return Err(self.range_error("Invalid array length"));
        }
        let doomed: Vec<PropertyKey> = self
            .own_keys(array)
            .into_iter()
            .filter(|key| key.array_index().is_some_and(|i| i >= new_length))
            .collect();
        for key in doomed {
            self.remove_own(array, &key);
        }
        self.write_length(array, new_length)
    }

    /// Object whose entries hold their keys weakly
    pub fn create_weak_map(&mut self) -> HandleId {
        let mut data = ObjectData::new(Some(self.intrinsics.object_prototype));
        data.weak = Some(WeakTable::default());
        self.alloc(Value::Object(Box::new(data)))
    }

    fn weak_table(&self, map: HandleId) -> Option<&WeakTable> {
        self.object_data(map)?.weak.as_ref()
    }

    /// Add or replace an entry; the key must be object-like
    pub fn weak_map_set(&mut self, map: HandleId, key: HandleId, value: HandleId) -> JsResult<()> {
        if !self.is_object_like(key) {
            return Err(self.type_error("Invalid value used as weak map key"));
        }
        let previous = match self
            .object_data_mut(map)
            .and_then(|data| data.weak.as_mut())
        {
            Some(table) => table.insert(key, value),
            None => return Err(self.type_error("receiver is not a weak map")),
        };
        self.heap.link_weak(map, key);
        self.heap.replace_edge(map, previous, Some(value));
        Ok(())
    }

    /// Value stored for `key`
    pub fn weak_map_get(&self, map: HandleId, key: HandleId) -> Option<HandleId> {
        self.weak_table(map)?.get(key)
    }

    /// Whether an entry exists for `key`
    pub fn weak_map_has(&self, map: HandleId, key: HandleId) -> bool {
        self.weak_table(map).is_some_and(|table| table.contains(key))
    }

    /// Remove the entry for `key`
    pub fn weak_map_delete(&mut self, map: HandleId, key: HandleId) -> bool {
        let removed = self
            .object_data_mut(map)
            .and_then(|data| data.weak.as_mut())
            .and_then(|table| table.remove(key));
        match removed {
            Some(value) => {
                self.heap.unlink_weak(map, key);
                self.heap.replace_edge(map, Some(value), None);
                true
            }
            None => false,
        }
    }
}

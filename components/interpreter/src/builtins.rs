//! Intrinsic objects and the minimal native surface of the object model.
//!
//! Only what the core itself relies on lives here: the root prototypes,
//! the error hierarchy, the generator protocol, the well-known symbols and
//! the global object. Everything else is left to embedders, which register
//! their own natives through [`Runtime::register_native`].

use core_types::{
    ErrorKind, HandleId, PropertyDescriptor, PropertyKey, SymbolData, SymbolId, SymbolKey, Value,
    ValueKind,
};
use memory_manager::{Heap, Trace};

use crate::heap_data::HeapData;
use crate::runtime::{JsResult, NativeFn, Runtime};

/// First symbol id handed out to user symbols; lower ids are well-known
pub(crate) const FIRST_USER_SYMBOL: u64 = 16;

const ERROR_KINDS: [ErrorKind; 8] = [
    ErrorKind::Error,
    ErrorKind::SyntaxError,
    ErrorKind::TypeError,
    ErrorKind::ReferenceError,
    ErrorKind::RangeError,
    ErrorKind::EvalError,
    ErrorKind::URIError,
    ErrorKind::InternalError,
];

/// Handles of the well-known symbols
#[derive(Debug, Clone, Copy)]
pub struct WellKnownSymbols {
    /// `Symbol.toPrimitive`
    pub to_primitive: HandleId,
    /// `Symbol.dispose`
    pub dispose: HandleId,
    /// `Symbol.asyncDispose`
    pub async_dispose: HandleId,
    /// `Symbol.iterator`
    pub iterator: HandleId,
}

/// Objects and constants every runtime starts with.
///
/// All of them are linked under the global scope; the shared primitive
/// constants are roots as well.
#[derive(Debug, Clone)]
pub struct Intrinsics {
    /// Shared `undefined`
    pub undefined: HandleId,
    /// Shared `null`
    pub null: HandleId,
    /// Shared `true`
    pub true_value: HandleId,
    /// Shared `false`
    pub false_value: HandleId,
    /// Binding marker for declared but uninitialized variables
    pub uninitialized: HandleId,
    /// `Object.prototype`
    pub object_prototype: HandleId,
    /// `Function.prototype`
    pub function_prototype: HandleId,
    /// `Array.prototype`
    pub array_prototype: HandleId,
    /// `Error.prototype`
    pub error_prototype: HandleId,
    /// Prototype shared by generator objects
    pub generator_prototype: HandleId,
    /// The global object (`globalThis`)
    pub global_object: HandleId,
    /// Well-known symbols
    pub symbols: WellKnownSymbols,
    error_prototypes: Vec<(ErrorKind, HandleId)>,
}

impl Intrinsics {
    /// Allocate the intrinsic objects under `global`.
    ///
    /// Methods are installed afterwards by [`install`], which needs a
    /// complete runtime.
    pub fn allocate(heap: &mut Heap<HeapData>, global: HandleId) -> Self {
        let root = |heap: &mut Heap<HeapData>, value: Value| {
            let handle = alloc_under(heap, global, value);
            heap.set_root(handle, true);
            handle
        };
        let undefined = root(heap, Value::Undefined);
        let null = root(heap, Value::Null);
        let true_value = root(heap, Value::Boolean(true));
        let false_value = root(heap, Value::Boolean(false));
        let uninitialized = root(heap, Value::Uninitialized);

        let object_prototype = alloc_under(heap, global, Value::object(None));
        let proto = Some(object_prototype);
        let function_prototype = alloc_under(heap, global, Value::object(proto));
        let array_prototype = alloc_under(heap, global, Value::object(proto));
        let error_prototype = alloc_under(heap, global, Value::object(proto));
        let generator_prototype = alloc_under(heap, global, Value::object(proto));
        let global_object = alloc_under(heap, global, Value::object(proto));

        let error_prototypes = ERROR_KINDS
            .iter()
            .map(|&kind| {
                let handle = match kind {
                    ErrorKind::Error => error_prototype,
                    _ => alloc_under(heap, global, Value::object(Some(error_prototype))),
                };
                (kind, handle)
            })
            .collect();

        let mut symbol = |id: u64, description: &str| {
            alloc_under(
                heap,
                global,
                Value::Symbol(SymbolData {
                    id: SymbolId(id),
                    description: Some(description.to_string()),
                }),
            )
        };
        let symbols = WellKnownSymbols {
            to_primitive: symbol(1, "Symbol.toPrimitive"),
            dispose: symbol(2, "Symbol.dispose"),
            async_dispose: symbol(3, "Symbol.asyncDispose"),
            iterator: symbol(4, "Symbol.iterator"),
        };

        Self {
            undefined,
            null,
            true_value,
            false_value,
            uninitialized,
            object_prototype,
            function_prototype,
            array_prototype,
            error_prototype,
            generator_prototype,
            global_object,
            symbols,
            error_prototypes,
        }
    }

    /// Prototype of errors created with `kind`
    pub fn error_prototype_for(&self, kind: ErrorKind) -> HandleId {
        self.error_prototypes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, handle)| *handle)
            .unwrap_or(self.error_prototype)
    }
}

fn alloc_under(heap: &mut Heap<HeapData>, global: HandleId, value: Value) -> HandleId {
    let handle = heap.alloc(HeapData::Value(value));
    let mut refs = Vec::new();
    if let Some(data) = heap.get(handle) {
        data.trace(&mut refs);
    }
    for child in refs {
        heap.link(handle, child);
    }
    heap.link(global, handle);
    handle
}

/// Install methods, constructors and globals.
pub fn install(rt: &mut Runtime) {
    let intrinsics = rt.intrinsics.clone();

    method(rt, intrinsics.object_prototype, "toString", object_to_string);
    method(rt, intrinsics.object_prototype, "valueOf", object_value_of);
    method(rt, intrinsics.function_prototype, "toString", function_to_string);
    method(rt, intrinsics.array_prototype, "toString", array_to_string);
    method(rt, intrinsics.error_prototype, "toString", error_to_string);
    method(rt, intrinsics.generator_prototype, "next", generator_next);

    let iterator = symbol_key(rt, intrinsics.symbols.iterator);
    let iter_fn = rt.create_native_function("[Symbol.iterator]", return_this);
    hidden(rt, intrinsics.generator_prototype, iterator, iter_fn);

    let empty = rt.string("");
    hidden(rt, intrinsics.error_prototype, "message".into(), empty);
    for &kind in &ERROR_KINDS {
        let proto = intrinsics.error_prototype_for(kind);
        let name = rt.string(kind.name());
        hidden(rt, proto, "name".into(), name);
    }

    let global = intrinsics.global_object;
    let constructors: [(ErrorKind, NativeFn); 7] = [
        (ErrorKind::Error, error_constructor),
        (ErrorKind::SyntaxError, syntax_error_constructor),
        (ErrorKind::TypeError, type_error_constructor),
        (ErrorKind::ReferenceError, reference_error_constructor),
        (ErrorKind::RangeError, range_error_constructor),
        (ErrorKind::EvalError, eval_error_constructor),
        (ErrorKind::URIError, uri_error_constructor),
    ];
    for (kind, func) in constructors {
        let ctor = rt.create_native_function(kind.name(), func);
        let proto = intrinsics.error_prototype_for(kind);
        hidden(rt, ctor, "prototype".into(), proto);
        hidden(rt, proto, "constructor".into(), ctor);
        hidden(rt, global, kind.name().into(), ctor);
    }

    let symbol_ctor = rt.create_native_function("Symbol", symbol_constructor);
    let well_known = [
        ("toPrimitive", intrinsics.symbols.to_primitive),
        ("dispose", intrinsics.symbols.dispose),
        ("asyncDispose", intrinsics.symbols.async_dispose),
        ("iterator", intrinsics.symbols.iterator),
    ];
    for (name, handle) in well_known {
        let desc = PropertyDescriptor::data_with(handle, false, false, false);
        force_define(rt, symbol_ctor, name.into(), desc);
    }
    hidden(rt, global, "Symbol".into(), symbol_ctor);

    let nan = rt.number(f64::NAN);
    let infinity = rt.number(f64::INFINITY);
    let undefined = rt.undefined();
    for (name, value) in [("NaN", nan), ("Infinity", infinity), ("undefined", undefined)] {
        let desc = PropertyDescriptor::data_with(value, false, false, false);
        force_define(rt, global, name.into(), desc);
    }
    hidden(rt, global, "globalThis".into(), global);
}

fn symbol_key(rt: &Runtime, handle: HandleId) -> PropertyKey {
    let id = rt
        .value(handle)
        .and_then(Value::as_symbol)
        .map(|s| s.id)
        .unwrap_or(SymbolId(0));
    PropertyKey::Symbol(SymbolKey { id, handle })
}

fn method(rt: &mut Runtime, target: HandleId, name: &str, func: NativeFn) {
    let function = rt.create_native_function(name, func);
    hidden(rt, target, name.into(), function);
}

fn hidden(rt: &mut Runtime, target: HandleId, key: PropertyKey, value: HandleId) {
    force_define(rt, target, key, PropertyDescriptor::hidden(value));
}

fn force_define(rt: &mut Runtime, target: HandleId, key: PropertyKey, desc: PropertyDescriptor) {
    if let Err(exc) = rt.define_property(target, key, desc) {
        tracing::warn!(exception = %exc, "failed to install intrinsic property");
    }
}

fn arg(rt: &Runtime, args: &[HandleId], index: usize) -> HandleId {
    args.get(index).copied().unwrap_or_else(|| rt.undefined())
}

fn tag_of(value: Option<&Value>) -> &'static str {
    match value {
        None | Some(Value::Undefined) | Some(Value::Uninitialized) => "Undefined",
        Some(Value::Null) => "Null",
        Some(Value::Array(_)) => "Array",
        Some(Value::Function(_)) => "Function",
        Some(Value::Error(_)) => "Error",
        Some(Value::Number(_)) => "Number",
        Some(Value::String(_)) => "String",
        Some(Value::Boolean(_)) => "Boolean",
        Some(Value::Symbol(_)) => "Symbol",
        Some(Value::BigInt(_)) => "BigInt",
        Some(_) => "Object",
    }
}

fn object_to_string(rt: &mut Runtime, this: HandleId, _args: &[HandleId]) -> JsResult {
    let tag = tag_of(rt.value(this));
    Ok(rt.string(format!("[object {}]", tag)))
}

fn object_value_of(rt: &mut Runtime, this: HandleId, _args: &[HandleId]) -> JsResult {
    let boxed = rt
        .value(this)
        .and_then(Value::as_object)
        .and_then(|obj| obj.internal.get(crate::coerce::PRIMITIVE_VALUE_SLOT).copied());
    Ok(boxed.unwrap_or(this))
}

fn function_to_string(rt: &mut Runtime, this: HandleId, _args: &[HandleId]) -> JsResult {
    let text = match rt.value(this).and_then(Value::as_callable) {
        Some(callable) => match &callable.source {
            Some(source) => source.clone(),
            None => format!("function {}() {{ [native code] }}", callable.name),
        },
        None => return Err(rt.type_error("Function.prototype.toString requires a function")),
    };
    Ok(rt.string(text))
}

fn array_to_string(rt: &mut Runtime, this: HandleId, _args: &[HandleId]) -> JsResult {
    let length = rt.array_length(this);
    let mut parts = Vec::with_capacity(length);
    for index in 0..length {
        let item = rt.get(this, &PropertyKey::from(index.to_string()))?;
        if rt.kind(item) <= ValueKind::Null {
            parts.push(String::new());
        } else {
            parts.push(rt.to_string(item)?);
        }
    }
    Ok(rt.string(parts.join(",")))
}

fn error_to_string(rt: &mut Runtime, this: HandleId, _args: &[HandleId]) -> JsResult {
    if !rt.value(this).is_some_and(Value::is_object_like) {
        return Err(rt.type_error("Error.prototype.toString called on non-object"));
    }
    let name = rt.get(this, &PropertyKey::from("name"))?;
    let name = if rt.kind(name) == ValueKind::Undefined {
        "Error".to_string()
    } else {
        rt.to_string(name)?
    };
    let message = rt.get(this, &PropertyKey::from("message"))?;
    let message = if rt.kind(message) == ValueKind::Undefined {
        String::new()
    } else {
        rt.to_string(message)?
    };
    let text = match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{}: {}", name, message),
    };
    Ok(rt.string(text))
}

fn generator_next(rt: &mut Runtime, this: HandleId, args: &[HandleId]) -> JsResult {
    let input = arg(rt, args, 0);
    rt.generator_next(this, input)
}

fn return_this(_rt: &mut Runtime, this: HandleId, _args: &[HandleId]) -> JsResult {
    Ok(this)
}

fn symbol_constructor(rt: &mut Runtime, _this: HandleId, args: &[HandleId]) -> JsResult {
    let description = arg(rt, args, 0);
    let description = match rt.kind(description) {
        ValueKind::Undefined => None,
        _ => Some(rt.to_string(description)?),
    };
    Ok(rt.symbol(description))
}

fn construct_error(rt: &mut Runtime, kind: ErrorKind, args: &[HandleId]) -> JsResult {
    let message = arg(rt, args, 0);
    let message = match rt.kind(message) {
        ValueKind::Undefined => String::new(),
        _ => rt.to_string(message)?,
    };
    Ok(rt.create_error(kind, message))
}

macro_rules! error_constructors {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            fn $name(rt: &mut Runtime, _this: HandleId, args: &[HandleId]) -> JsResult {
                construct_error(rt, ErrorKind::$kind, args)
            }
        )*
    };
}

error_constructors! {
    error_constructor => Error,
    syntax_error_constructor => SyntaxError,
    type_error_constructor => TypeError,
    reference_error_constructor => ReferenceError,
    range_error_constructor => RangeError,
    eval_error_constructor => EvalError,
    uri_error_constructor => URIError,
}

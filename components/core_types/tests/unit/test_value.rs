//! Unit tests for Value kinds and dispatch helpers

use core_types::{
    CallableData, ErrorKind, HandleId, NativeFunctionId, SymbolData, SymbolId, Value, ValueKind,
};
use num_bigint::BigInt;

#[cfg(test)]
mod value_kind_tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Value::Undefined.kind(), ValueKind::Undefined);
        assert_eq!(Value::Uninitialized.kind(), ValueKind::Uninitialized);
        assert_eq!(Value::Number(1.0).kind(), ValueKind::Number);
        assert_eq!(Value::BigInt(BigInt::from(3)).kind(), ValueKind::BigInt);
        assert_eq!(Value::array(None).kind(), ValueKind::Array);
        assert_eq!(Value::Exception(HandleId::new(0, 0)).kind(), ValueKind::Exception);
    }

    #[test]
    fn test_object_like_threshold() {
        let function = Value::function(None, CallableData::native("f", NativeFunctionId(0)));
        assert!(function.is_object_like());
        assert!(function.is_callable());
        assert!(!Value::object(None).is_callable());
        let symbol = Value::Symbol(SymbolData {
            id: SymbolId(1),
            description: None,
        });
        assert!(!symbol.is_object_like());
    }

    #[test]
    fn test_default_is_undefined() {
        assert!(matches!(Value::default(), Value::Undefined));
    }
}

#[cfg(test)]
mod value_conversion_tests {
    use super::*;

    #[test]
    fn test_from_primitives() {
        assert_eq!(Value::from(2.5).as_number(), Some(2.5));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert!(Value::from(true).to_boolean());
    }

    #[test]
    fn test_nullish() {
        assert!(Value::Undefined.is_nullish());
        assert!(Value::Null.is_nullish());
        assert!(!Value::Number(0.0).is_nullish());
        assert!(!Value::Uninitialized.is_nullish());
    }

    #[test]
    fn test_error_payload() {
        let proto = HandleId::new(3, 0);
        let value = Value::error(Some(proto), ErrorKind::RangeError, "bad length");
        match &value {
            Value::Error(err) => {
                assert_eq!(err.kind, ErrorKind::RangeError);
                assert_eq!(err.message, "bad length");
                assert_eq!(err.object.prototype, Some(proto));
            }
            other => panic!("expected error, got {:?}", other.kind()),
        }
        let mut refs = Vec::new();
        value.references(&mut refs);
        assert_eq!(refs, vec![proto]);
    }
}

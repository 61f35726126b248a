//! JValue: a value in a managed-runtime call slot
//!
//! Primitive slots carry their value inline; reference slots carry a
//! (nullable) handle. No conversion happens here: the caller picks the variant
//! matching the method descriptor.

use crate::error::{AbiError, AbiResult};
use crate::refs::ObjectRef;

/// A value passed to or returned from a managed method
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JValue {
    /// Result of a `V` method
    Void,
    /// `Z`
    Boolean(bool),
    /// `B`
    Byte(i8),
    /// `C` (UTF-16 code unit)
    Char(u16),
    /// `S`
    Short(i16),
    /// `I`
    Int(i32),
    /// `J`
    Long(i64),
    /// `F`
    Float(f32),
    /// `D`
    Double(f64),
    /// Any reference type; `None` is null
    Object(Option<ObjectRef>),
}

impl JValue {
    /// The null reference
    #[inline]
    pub const fn null() -> Self {
        JValue::Object(None)
    }

    /// A non-null reference
    #[inline]
    pub const fn object(obj: ObjectRef) -> Self {
        JValue::Object(Some(obj))
    }

    /// Descriptor-style name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            JValue::Void => "V",
            JValue::Boolean(_) => "Z",
            JValue::Byte(_) => "B",
            JValue::Char(_) => "C",
            JValue::Short(_) => "S",
            JValue::Int(_) => "I",
            JValue::Long(_) => "J",
            JValue::Float(_) => "F",
            JValue::Double(_) => "D",
            JValue::Object(_) => "L",
        }
    }

    /// Reference payload, or a type mismatch for primitives
    pub fn as_object(&self) -> AbiResult<Option<ObjectRef>> {
        match self {
            JValue::Object(obj) => Ok(*obj),
            other => Err(AbiError::TypeMismatch {
                expected: "object".to_string(),
                got: other.type_name().to_string(),
            }),
        }
    }

    /// Get as bool if this is a `Z`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i32 if this is an `I`
    pub fn as_int(&self) -> Option<i32> {
        match self {
            JValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as i64 if this is a `J`
    pub fn as_long(&self) -> Option<i64> {
        match self {
            JValue::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Get as f64 if this is a `D`
    pub fn as_double(&self) -> Option<f64> {
        match self {
            JValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Check if this is a null reference
    pub fn is_null(&self) -> bool {
        matches!(self, JValue::Object(None))
    }
}

impl Default for JValue {
    fn default() -> Self {
        JValue::Void
    }
}

impl From<bool> for JValue {
    fn from(b: bool) -> Self {
        JValue::Boolean(b)
    }
}

impl From<i8> for JValue {
    fn from(b: i8) -> Self {
        JValue::Byte(b)
    }
}

impl From<i16> for JValue {
    fn from(s: i16) -> Self {
        JValue::Short(s)
    }
}

impl From<i32> for JValue {
    fn from(i: i32) -> Self {
        JValue::Int(i)
    }
}

impl From<i64> for JValue {
    fn from(l: i64) -> Self {
        JValue::Long(l)
    }
}

impl From<f32> for JValue {
    fn from(f: f32) -> Self {
        JValue::Float(f)
    }
}

impl From<f64> for JValue {
    fn from(d: f64) -> Self {
        JValue::Double(d)
    }
}

impl From<Option<ObjectRef>> for JValue {
    fn from(obj: Option<ObjectRef>) -> Self {
        JValue::Object(obj)
    }
}

impl From<ObjectRef> for JValue {
    fn from(obj: ObjectRef) -> Self {
        JValue::Object(Some(obj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(JValue::from(5).as_int(), Some(5));
        assert_eq!(JValue::from(5i64).as_int(), None);
        assert_eq!(JValue::from(true).as_bool(), Some(true));
        assert!(JValue::null().is_null());
        assert_eq!(JValue::null().as_object().unwrap(), None);
        assert!(JValue::Int(1).as_object().is_err());
    }
}

//! Native call-slot values

use std::fmt;
use std::sync::Arc;

use crate::encoding::TypeEncoding;
use crate::error::MarshalError;
use crate::object::Id;
use crate::selector::Selector;

/// Value held in an invocation argument or return slot
#[derive(Clone, Default)]
pub enum NativeValue {
    /// `v`
    #[default]
    Void,
    /// `c`
    Char(i8),
    /// `i`
    Int(i32),
    /// `s`
    Short(i16),
    /// `l`
    Long(i32),
    /// `q`
    LongLong(i64),
    /// `C`
    UChar(u8),
    /// `I`
    UInt(u32),
    /// `S`
    UShort(u16),
    /// `L`
    ULong(u32),
    /// `Q`
    ULongLong(u64),
    /// `f`
    Float(f32),
    /// `d`
    Double(f64),
    /// `B`
    Bool(bool),
    /// `*`, `None` is NULL
    CString(Option<String>),
    /// `@`, `None` is nil
    Object(Option<Id>),
    /// `:`
    Selector(Selector),
    /// `^T`, `#` or `?`: a raw address, 0 is NULL
    Pointer(u64),
}

impl NativeValue {
    /// nil
    pub const fn nil() -> Self {
        NativeValue::Object(None)
    }

    /// Wrap an object
    pub fn object(id: Id) -> Self {
        NativeValue::Object(Some(id))
    }

    /// C string from text
    pub fn string(s: impl Into<String>) -> Self {
        NativeValue::CString(Some(s.into()))
    }

    /// Zero value of a slot type: 0 for scalars, nil for pointers
    pub fn zero_for(ty: &TypeEncoding) -> Self {
        match ty {
            TypeEncoding::Object => NativeValue::nil(),
            TypeEncoding::CString => NativeValue::CString(None),
            address if address.is_address() => NativeValue::Pointer(0),
            scalar if scalar.is_scalar() => NativeValue::Int(0).coerce_to(scalar).unwrap_or_default(),
            _ => NativeValue::Void,
        }
    }

    /// Kind name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            NativeValue::Void => "void",
            NativeValue::Char(_) => "char",
            NativeValue::Int(_) => "int",
            NativeValue::Short(_) => "short",
            NativeValue::Long(_) => "long",
            NativeValue::LongLong(_) => "long long",
            NativeValue::UChar(_) => "unsigned char",
            NativeValue::UInt(_) => "unsigned int",
            NativeValue::UShort(_) => "unsigned short",
            NativeValue::ULong(_) => "unsigned long",
            NativeValue::ULongLong(_) => "unsigned long long",
            NativeValue::Float(_) => "float",
            NativeValue::Double(_) => "double",
            NativeValue::Bool(_) => "BOOL",
            NativeValue::CString(_) => "char *",
            NativeValue::Object(_) => "id",
            NativeValue::Selector(_) => "SEL",
            NativeValue::Pointer(_) => "void *",
        }
    }

    /// Integer view of a scalar (floats truncate toward zero)
    pub fn as_i64(&self) -> Option<i64> {
        Some(match *self {
            NativeValue::Char(v) => v as i64,
            NativeValue::Int(v) => v as i64,
            NativeValue::Short(v) => v as i64,
            NativeValue::Long(v) => v as i64,
            NativeValue::LongLong(v) => v,
            NativeValue::UChar(v) => v as i64,
            NativeValue::UInt(v) => v as i64,
            NativeValue::UShort(v) => v as i64,
            NativeValue::ULong(v) => v as i64,
            NativeValue::ULongLong(v) => v as i64,
            NativeValue::Float(v) => v as i64,
            NativeValue::Double(v) => v as i64,
            NativeValue::Bool(v) => v as i64,
            _ => return None,
        })
    }

    /// Floating view of a scalar
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            NativeValue::Float(v) => Some(v as f64),
            NativeValue::Double(v) => Some(v),
            NativeValue::ULongLong(v) => Some(v as f64),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    fn is_float(&self) -> bool {
        matches!(self, NativeValue::Float(_) | NativeValue::Double(_))
    }

    /// Truth value of a scalar
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            NativeValue::Bool(b) => Some(b),
            NativeValue::Float(_) | NativeValue::Double(_) => self.as_f64().map(|v| v != 0.0),
            _ => self.as_i64().map(|v| v != 0),
        }
    }

    /// Text of a C string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::CString(Some(s)) => Some(s),
            _ => None,
        }
    }

    /// Object in an `@` slot
    pub fn as_object(&self) -> Option<&Id> {
        match self {
            NativeValue::Object(Some(id)) => Some(id),
            _ => None,
        }
    }

    /// Raw address of a `^T`, `#` or `?` slot
    pub fn as_pointer(&self) -> Option<u64> {
        match *self {
            NativeValue::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// Whether this is nil or NULL
    pub fn is_nil(&self) -> bool {
        matches!(
            self,
            NativeValue::Object(None) | NativeValue::CString(None) | NativeValue::Pointer(0)
        )
    }

    /// Convert to the representation `ty` requires.
    ///
    /// Scalars convert among themselves with C cast semantics (`B` is true
    /// for any non-zero value); nil fits `@`, `*` and addresses. Addresses
    /// also accept integers, taken as the address bits. Everything else must
    /// already match.
    pub fn coerce_to(&self, ty: &TypeEncoding) -> Result<NativeValue, MarshalError> {
        let mismatch = || MarshalError::Mismatch {
            expected: ty.to_string(),
            got: self.kind().to_string(),
        };

        if ty.is_scalar() {
            let is_float = self.is_float();
            let int = self.as_i64().ok_or_else(mismatch)?;
            return Ok(match ty {
                TypeEncoding::Char => NativeValue::Char(int as i8),
                TypeEncoding::Int => NativeValue::Int(int as i32),
                TypeEncoding::Short => NativeValue::Short(int as i16),
                TypeEncoding::Long => NativeValue::Long(int as i32),
                TypeEncoding::LongLong => NativeValue::LongLong(int),
                TypeEncoding::UChar => NativeValue::UChar(int as u8),
                TypeEncoding::UInt => NativeValue::UInt(int as u32),
                TypeEncoding::UShort => NativeValue::UShort(int as u16),
                TypeEncoding::ULong => NativeValue::ULong(int as u32),
                TypeEncoding::ULongLong => match *self {
                    NativeValue::ULongLong(v) => NativeValue::ULongLong(v),
                    _ => NativeValue::ULongLong(int as u64),
                },
                TypeEncoding::Float => NativeValue::Float(self.as_f64().ok_or_else(mismatch)? as f32),
                TypeEncoding::Double => NativeValue::Double(self.as_f64().ok_or_else(mismatch)?),
                TypeEncoding::Bool if is_float => NativeValue::Bool(self.as_bool().unwrap_or(false)),
                TypeEncoding::Bool => NativeValue::Bool(int != 0),
                _ => return Err(mismatch()),
            });
        }

        if ty.is_address() {
            return match *self {
                NativeValue::Pointer(p) => Ok(NativeValue::Pointer(p)),
                NativeValue::Object(None) | NativeValue::CString(None) => Ok(NativeValue::Pointer(0)),
                NativeValue::ULongLong(v) => Ok(NativeValue::Pointer(v)),
                _ if !self.is_float() => self
                    .as_i64()
                    .map(|v| NativeValue::Pointer(v as u64))
                    .ok_or_else(mismatch),
                _ => Err(mismatch()),
            };
        }

        match (ty, self) {
            (TypeEncoding::Void, NativeValue::Void) => Ok(NativeValue::Void),
            (TypeEncoding::Object, NativeValue::Object(_)) => Ok(self.clone()),
            (TypeEncoding::Object, NativeValue::CString(None)) => Ok(NativeValue::nil()),
            (TypeEncoding::CString, NativeValue::CString(_)) => Ok(self.clone()),
            (TypeEncoding::CString, NativeValue::Object(None)) => Ok(NativeValue::CString(None)),
            (TypeEncoding::Object, NativeValue::Pointer(0)) => Ok(NativeValue::nil()),
            (TypeEncoding::CString, NativeValue::Pointer(0)) => Ok(NativeValue::CString(None)),
            (TypeEncoding::Selector, NativeValue::Selector(_)) => Ok(self.clone()),
            _ => Err(mismatch()),
        }
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        use NativeValue::*;
        match (self, other) {
            (Void, Void) => true,
            (Char(a), Char(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (LongLong(a), LongLong(b)) => a == b,
            (UChar(a), UChar(b)) => a == b,
            (UInt(a), UInt(b)) => a == b,
            (UShort(a), UShort(b)) => a == b,
            (ULong(a), ULong(b)) => a == b,
            (ULongLong(a), ULongLong(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (CString(a), CString(b)) => a == b,
            (Selector(a), Selector(b)) => a == b,
            (Pointer(a), Pointer(b)) => a == b,
            // Objects compare by identity
            (Object(Some(a)), Object(Some(b))) => Arc::ptr_eq(a, b),
            (Object(None), Object(None)) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Void => f.write_str("Void"),
            NativeValue::Char(v) => write!(f, "Char({})", v),
            NativeValue::Int(v) => write!(f, "Int({})", v),
            NativeValue::Short(v) => write!(f, "Short({})", v),
            NativeValue::Long(v) => write!(f, "Long({})", v),
            NativeValue::LongLong(v) => write!(f, "LongLong({})", v),
            NativeValue::UChar(v) => write!(f, "UChar({})", v),
            NativeValue::UInt(v) => write!(f, "UInt({})", v),
            NativeValue::UShort(v) => write!(f, "UShort({})", v),
            NativeValue::ULong(v) => write!(f, "ULong({})", v),
            NativeValue::ULongLong(v) => write!(f, "ULongLong({})", v),
            NativeValue::Float(v) => write!(f, "Float({})", v),
            NativeValue::Double(v) => write!(f, "Double({})", v),
            NativeValue::Bool(v) => write!(f, "Bool({})", v),
            NativeValue::CString(v) => write!(f, "CString({:?})", v),
            NativeValue::Object(None) => f.write_str("nil"),
            NativeValue::Object(Some(id)) => write!(f, "<{} {:p}>", id.class_name(), Arc::as_ptr(id)),
            NativeValue::Selector(s) => write!(f, "{:?}", s),
            NativeValue::Pointer(p) => write!(f, "Pointer({:#x})", p),
        }
    }
}

impl From<bool> for NativeValue {
    fn from(b: bool) -> Self {
        NativeValue::Bool(b)
    }
}

impl From<i32> for NativeValue {
    fn from(v: i32) -> Self {
        NativeValue::Int(v)
    }
}

impl From<i64> for NativeValue {
    fn from(v: i64) -> Self {
        NativeValue::LongLong(v)
    }
}

impl From<f64> for NativeValue {
    fn from(v: f64) -> Self {
        NativeValue::Double(v)
    }
}

impl From<&str> for NativeValue {
    fn from(s: &str) -> Self {
        NativeValue::string(s)
    }
}

impl From<Selector> for NativeValue {
    fn from(s: Selector) -> Self {
        NativeValue::Selector(s)
    }
}

impl From<Id> for NativeValue {
    fn from(id: Id) -> Self {
        NativeValue::object(id)
    }
}

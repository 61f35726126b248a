//! Method signatures
//!
//! A signature lists the return type followed by every argument. Arguments 0
//! and 1 are always the receiver (`@`) and the selector (`:`); explicit
//! arguments start at index 2.

use std::fmt;

use crate::encoding::TypeEncoding;
use crate::error::EncodingError;

/// Index of the first explicit argument
pub const FIRST_EXPLICIT_ARGUMENT: usize = 2;

/// Return and argument types of one method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    ret: TypeEncoding,
    args: Vec<TypeEncoding>,
}

impl MethodSignature {
    /// Parse a full signature such as `i@:ii` or `v24@0:8@16`
    pub fn parse(types: &str) -> Result<Self, EncodingError> {
        let mut all = TypeEncoding::parse_all(types)?;
        let ret = all.remove(0);
        match all.as_slice() {
            [TypeEncoding::Object, TypeEncoding::Selector, ..] => Ok(Self { ret, args: all }),
            _ => Err(EncodingError::MissingImplicitArguments(types.to_string())),
        }
    }

    /// Build from a return type and the explicit argument types
    pub fn new(ret: TypeEncoding, explicit: impl IntoIterator<Item = TypeEncoding>) -> Self {
        let mut args = vec![TypeEncoding::Object, TypeEncoding::Selector];
        args.extend(explicit);
        Self { ret, args }
    }

    /// Argument count including self and _cmd
    pub fn number_of_arguments(&self) -> usize {
        self.args.len()
    }

    /// Type of argument `index` (0 = self, 1 = _cmd)
    pub fn argument_type_at(&self, index: usize) -> Option<&TypeEncoding> {
        self.args.get(index)
    }

    /// Arguments after self and _cmd
    pub fn explicit_arguments(&self) -> &[TypeEncoding] {
        &self.args[FIRST_EXPLICIT_ARGUMENT..]
    }

    /// Return type
    pub fn method_return_type(&self) -> &TypeEncoding {
        &self.ret
    }

    /// Whether the method returns `v`
    pub fn is_void(&self) -> bool {
        self.ret == TypeEncoding::Void
    }

    /// Canonical encoding, without frame offsets
    pub fn types(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ret)?;
        for arg in &self.args {
            write!(f, "{}", arg)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for MethodSignature {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let sig = MethodSignature::parse("i@:ii").unwrap();
        assert_eq!(sig.number_of_arguments(), 4);
        assert_eq!(sig.method_return_type(), &TypeEncoding::Int);
        assert_eq!(sig.argument_type_at(0), Some(&TypeEncoding::Object));
        assert_eq!(sig.argument_type_at(1), Some(&TypeEncoding::Selector));
        assert_eq!(sig.explicit_arguments(), &[TypeEncoding::Int, TypeEncoding::Int]);
        assert_eq!(sig.argument_type_at(4), None);
    }

    #[test]
    fn test_offsets_are_dropped_from_types() {
        let sig: MethodSignature = "v24@0:8@16".parse().unwrap();
        assert_eq!(sig.types(), "v@:@");
        assert!(sig.is_void());
    }

    #[test]
    fn test_implicit_arguments_required() {
        assert!(matches!(
            MethodSignature::parse("ii"),
            Err(EncodingError::MissingImplicitArguments(_))
        ));
        assert!(matches!(
            MethodSignature::parse("v"),
            Err(EncodingError::MissingImplicitArguments(_))
        ));
    }

    #[test]
    fn test_new_prepends_self_and_cmd() {
        let sig = MethodSignature::new(TypeEncoding::Object, [TypeEncoding::CString]);
        assert_eq!(sig.types(), "@@:*");
        assert_eq!(sig, MethodSignature::parse("@@:*").unwrap());
    }
}

//! JNI type and method descriptors
//!
//! ```text
//! (Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/Object;
//!  ^ params                              ^ return
//! ```

use std::fmt;

use crate::error::{AbiError, AbiResult};
use crate::value::JValue;

/// A single field/parameter/return type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JavaType {
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `V` (return position only)
    Void,
    /// `Lpkg/Name;` with the internal class name
    Object(String),
    /// `[T`
    Array(Box<JavaType>),
}

impl JavaType {
    /// Whether values of this type are references
    pub fn is_reference(&self) -> bool {
        matches!(self, JavaType::Object(_) | JavaType::Array(_))
    }

    /// Whether `value` can be passed in a slot of this type.
    ///
    /// Reference slots accept any reference (the runtime checks the class).
    pub fn accepts(&self, value: &JValue) -> bool {
        match (self, value) {
            (JavaType::Boolean, JValue::Boolean(_))
            | (JavaType::Byte, JValue::Byte(_))
            | (JavaType::Char, JValue::Char(_))
            | (JavaType::Short, JValue::Short(_))
            | (JavaType::Int, JValue::Int(_))
            | (JavaType::Long, JValue::Long(_))
            | (JavaType::Float, JValue::Float(_))
            | (JavaType::Double, JValue::Double(_))
            | (JavaType::Void, JValue::Void) => true,
            (JavaType::Object(_) | JavaType::Array(_), JValue::Object(_)) => true,
            _ => false,
        }
    }

    fn parse_one(chars: &[u8], pos: &mut usize, src: &str) -> AbiResult<Self> {
        let invalid = |reason: &str| AbiError::InvalidDescriptor {
            descriptor: src.to_string(),
            reason: reason.to_string(),
        };
        let c = *chars.get(*pos).ok_or_else(|| invalid("unexpected end"))?;
        *pos += 1;
        Ok(match c {
            b'Z' => JavaType::Boolean,
            b'B' => JavaType::Byte,
            b'C' => JavaType::Char,
            b'S' => JavaType::Short,
            b'I' => JavaType::Int,
            b'J' => JavaType::Long,
            b'F' => JavaType::Float,
            b'D' => JavaType::Double,
            b'V' => JavaType::Void,
            b'L' => {
                let start = *pos;
                while chars.get(*pos).is_some_and(|&b| b != b';') {
                    *pos += 1;
                }
                if *pos >= chars.len() {
                    return Err(invalid("unterminated class name"));
                }
                let name = &src[start..*pos];
                *pos += 1;
                if name.is_empty() {
                    return Err(invalid("empty class name"));
                }
                JavaType::Object(name.to_string())
            }
            b'[' => {
                let elem = Self::parse_one(chars, pos, src)?;
                if elem == JavaType::Void {
                    return Err(invalid("array of void"));
                }
                JavaType::Array(Box::new(elem))
            }
            other => return Err(invalid(&format!("unknown type '{}'", other as char))),
        })
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Boolean => f.write_str("Z"),
            JavaType::Byte => f.write_str("B"),
            JavaType::Char => f.write_str("C"),
            JavaType::Short => f.write_str("S"),
            JavaType::Int => f.write_str("I"),
            JavaType::Long => f.write_str("J"),
            JavaType::Float => f.write_str("F"),
            JavaType::Double => f.write_str("D"),
            JavaType::Void => f.write_str("V"),
            JavaType::Object(name) => write!(f, "L{};", name),
            JavaType::Array(elem) => write!(f, "[{}", elem),
        }
    }
}

/// Parsed method descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Parameter types in order
    pub params: Vec<JavaType>,
    /// Return type
    pub ret: JavaType,
}

impl MethodDescriptor {
    /// Parse a descriptor such as `(II)I`
    pub fn parse(descriptor: &str) -> AbiResult<Self> {
        let bytes = descriptor.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(AbiError::InvalidDescriptor {
                descriptor: descriptor.to_string(),
                reason: "missing '('".to_string(),
            });
        }
        let mut pos = 1;
        let mut params = Vec::new();
        while bytes.get(pos).is_some_and(|&b| b != b')') {
            let ty = JavaType::parse_one(bytes, &mut pos, descriptor)?;
            if ty == JavaType::Void {
                return Err(AbiError::InvalidDescriptor {
                    descriptor: descriptor.to_string(),
                    reason: "void parameter".to_string(),
                });
            }
            params.push(ty);
        }
        if pos >= bytes.len() {
            return Err(AbiError::InvalidDescriptor {
                descriptor: descriptor.to_string(),
                reason: "missing ')'".to_string(),
            });
        }
        pos += 1;
        let ret = JavaType::parse_one(bytes, &mut pos, descriptor)?;
        if pos != bytes.len() {
            return Err(AbiError::InvalidDescriptor {
                descriptor: descriptor.to_string(),
                reason: "trailing characters".to_string(),
            });
        }
        Ok(Self { params, ret })
    }

    /// Check `args` against the parameter list
    pub fn check_args(&self, method: &str, args: &[JValue]) -> AbiResult<()> {
        if args.len() != self.params.len() {
            return Err(AbiError::ArgumentMismatch {
                method: method.to_string(),
                reason: format!("expected {} arguments, got {}", self.params.len(), args.len()),
            });
        }
        for (i, (ty, arg)) in self.params.iter().zip(args).enumerate() {
            if !ty.accepts(arg) {
                return Err(AbiError::ArgumentMismatch {
                    method: method.to_string(),
                    reason: format!("argument {} expected {}, got {}", i, ty, arg.type_name()),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for p in &self.params {
            write!(f, "{}", p)?;
        }
        write!(f, "){}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forwarding_descriptor() {
        let d = MethodDescriptor::parse("(Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/Object;")
            .unwrap();
        assert_eq!(
            d.params,
            vec![
                JavaType::Object("java/lang/String".into()),
                JavaType::Array(Box::new(JavaType::Object("java/lang/Object".into()))),
            ]
        );
        assert_eq!(d.ret, JavaType::Object("java/lang/Object".into()));
        assert_eq!(
            d.to_string(),
            "(Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/Object;"
        );
    }

    #[test]
    fn test_parse_primitives() {
        let d = MethodDescriptor::parse("(IJZ)V").unwrap();
        assert_eq!(d.params, vec![JavaType::Int, JavaType::Long, JavaType::Boolean]);
        assert_eq!(d.ret, JavaType::Void);
    }

    #[test]
    fn test_parse_errors() {
        assert!(MethodDescriptor::parse("II)I").is_err());
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("(Ljava/lang/String)V").is_err());
        assert!(MethodDescriptor::parse("(V)V").is_err());
        assert!(MethodDescriptor::parse("()II").is_err());
        assert!(MethodDescriptor::parse("(Q)V").is_err());
    }

    #[test]
    fn test_check_args() {
        let d = MethodDescriptor::parse("(II)I").unwrap();
        assert!(d.check_args("add", &[JValue::Int(1), JValue::Int(2)]).is_ok());
        assert!(matches!(
            d.check_args("add", &[JValue::Int(1)]),
            Err(AbiError::ArgumentMismatch { .. })
        ));
        assert!(matches!(
            d.check_args("add", &[JValue::Int(1), JValue::Long(2)]),
            Err(AbiError::ArgumentMismatch { .. })
        ));
    }
}

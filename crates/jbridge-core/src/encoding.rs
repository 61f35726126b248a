//! Native type encodings
//!
//! The native object runtime describes every argument and return type with a
//! compact string code (`i` int, `@` object, `:` selector, `^v` pointer,
//! `{NSRange=QQ}` struct, ...). Method signatures are a concatenation of such
//! codes, optionally interleaved with frame offsets (`i16@0:8`).
//!
//! Method qualifiers (`r` const, `n` in, `N` inout, `o` out, `O` bycopy,
//! `R` byref, `V` oneway) carry no type information and are stripped.

use std::fmt;

use crate::error::EncodingError;

/// Method qualifier prefixes
const QUALIFIERS: &[char] = &['r', 'n', 'N', 'o', 'O', 'R', 'V'];

/// One decoded type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeEncoding {
    /// `c` signed char
    Char,
    /// `i` int
    Int,
    /// `s` short
    Short,
    /// `l` long (32-bit in encodings)
    Long,
    /// `q` long long
    LongLong,
    /// `C` unsigned char
    UChar,
    /// `I` unsigned int
    UInt,
    /// `S` unsigned short
    UShort,
    /// `L` unsigned long
    ULong,
    /// `Q` unsigned long long
    ULongLong,
    /// `f` float
    Float,
    /// `d` double
    Double,
    /// `B` C++ bool / C99 _Bool
    Bool,
    /// `v` void
    Void,
    /// `*` C string
    CString,
    /// `@` object (`@"Class"` and block `@?` included)
    Object,
    /// `#` class object
    Class,
    /// `:` selector
    Selector,
    /// `^T` pointer
    Pointer(Box<TypeEncoding>),
    /// `{name=fields}` struct
    Struct {
        /// Struct tag
        name: String,
        /// Field types, empty when the layout is not given
        fields: Vec<TypeEncoding>,
    },
    /// `(name=fields)` union
    Union {
        /// Union tag
        name: String,
        /// Member types
        fields: Vec<TypeEncoding>,
    },
    /// `[NT]` fixed-size array
    Array {
        /// Element count
        len: usize,
        /// Element type
        element: Box<TypeEncoding>,
    },
    /// `bN` bitfield
    Bitfield(u32),
    /// `?` unknown (function pointers and the like)
    Unknown,
}

impl TypeEncoding {
    /// Decode a single type; trailing frame offsets are allowed
    pub fn parse(encoding: &str) -> Result<Self, EncodingError> {
        let mut parser = Parser::new(encoding);
        let ty = parser.next_type()?;
        parser.skip_offset();
        if !parser.at_end() {
            return Err(parser.unknown());
        }
        Ok(ty)
    }

    /// Decode a whole sequence of types (`i@:ii`)
    pub fn parse_all(encoding: &str) -> Result<Vec<Self>, EncodingError> {
        let mut parser = Parser::new(encoding);
        let mut types = Vec::new();
        while !parser.at_end() {
            types.push(parser.next_type()?);
            parser.skip_offset();
        }
        if types.is_empty() {
            return Err(EncodingError::Empty);
        }
        Ok(types)
    }

    /// Signed or unsigned integer of any width, `B` included
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Char
                | Self::Int
                | Self::Short
                | Self::Long
                | Self::LongLong
                | Self::UChar
                | Self::UInt
                | Self::UShort
                | Self::ULong
                | Self::ULongLong
                | Self::Bool
        )
    }

    /// `f` or `d`
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Integers and floats
    pub fn is_scalar(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// `^T`, `#` and `?`: values that cross as raw addresses
    pub fn is_address(&self) -> bool {
        matches!(self, Self::Pointer(_) | Self::Class | Self::Unknown)
    }

    /// Size in bytes on a 64-bit target, if meaningful
    pub fn size(&self) -> Option<usize> {
        Some(match self {
            Self::Char | Self::UChar | Self::Bool => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Long | Self::ULong | Self::Float => 4,
            Self::LongLong | Self::ULongLong | Self::Double => 8,
            Self::CString | Self::Object | Self::Class | Self::Selector | Self::Pointer(_) => 8,
            Self::Array { len, element } => len.checked_mul(element.size()?)?,
            Self::Struct { fields, .. } if !fields.is_empty() => {
                fields
                    .iter()
                    .try_fold(0usize, |total, field| total.checked_add(field.size()?))?
            }
            _ => return None,
        })
    }
}

impl fmt::Display for TypeEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::Char => "c",
            Self::Int => "i",
            Self::Short => "s",
            Self::Long => "l",
            Self::LongLong => "q",
            Self::UChar => "C",
            Self::UInt => "I",
            Self::UShort => "S",
            Self::ULong => "L",
            Self::ULongLong => "Q",
            Self::Float => "f",
            Self::Double => "d",
            Self::Bool => "B",
            Self::Void => "v",
            Self::CString => "*",
            Self::Object => "@",
            Self::Class => "#",
            Self::Selector => ":",
            Self::Unknown => "?",
            Self::Pointer(inner) => return write!(f, "^{}", inner),
            Self::Bitfield(bits) => return write!(f, "b{}", bits),
            Self::Array { len, element } => return write!(f, "[{}{}]", len, element),
            Self::Struct { name, fields } | Self::Union { name, fields } => {
                let (open, close) = match self {
                    Self::Union { .. } => ('(', ')'),
                    _ => ('{', '}'),
                };
                write!(f, "{}{}", open, name)?;
                if !fields.is_empty() {
                    f.write_str("=")?;
                    for field in fields {
                        write!(f, "{}", field)?;
                    }
                }
                return write!(f, "{}", close);
            }
        };
        f.write_str(code)
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn unknown(&self) -> EncodingError {
        match self.peek() {
            Some(code) => EncodingError::UnknownCode {
                code,
                encoding: self.text.to_string(),
            },
            None => EncodingError::Unterminated(self.text.to_string()),
        }
    }

    fn number(&mut self) -> Option<usize> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.text[start..self.pos].parse().ok()
    }

    fn skip_offset(&mut self) {
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        self.number();
    }

    /// Skip a `"quoted"` class or field name
    fn skip_quoted(&mut self) -> Result<(), EncodingError> {
        if self.peek() != Some('"') {
            return Ok(());
        }
        self.pos += 1;
        match self.text[self.pos..].find('"') {
            Some(end) => {
                self.pos += end + 1;
                Ok(())
            }
            None => Err(EncodingError::Unterminated(self.text.to_string())),
        }
    }

    fn next_type(&mut self) -> Result<TypeEncoding, EncodingError> {
        while self.peek().is_some_and(|c| QUALIFIERS.contains(&c)) {
            self.pos += 1;
        }
        let code = self.bump().ok_or(EncodingError::Empty)?;
        Ok(match code {
            'c' => TypeEncoding::Char,
            'i' => TypeEncoding::Int,
            's' => TypeEncoding::Short,
            'l' => TypeEncoding::Long,
            'q' => TypeEncoding::LongLong,
            'C' => TypeEncoding::UChar,
            'I' => TypeEncoding::UInt,
            'S' => TypeEncoding::UShort,
            'L' => TypeEncoding::ULong,
            'Q' => TypeEncoding::ULongLong,
            'f' => TypeEncoding::Float,
            'd' => TypeEncoding::Double,
            'B' => TypeEncoding::Bool,
            'v' => TypeEncoding::Void,
            '*' => TypeEncoding::CString,
            '#' => TypeEncoding::Class,
            ':' => TypeEncoding::Selector,
            '?' => TypeEncoding::Unknown,
            '@' => {
                match self.peek() {
                    Some('?') => self.pos += 1,
                    Some('"') => self.skip_quoted()?,
                    _ => {}
                }
                TypeEncoding::Object
            }
            '^' => TypeEncoding::Pointer(Box::new(self.next_type()?)),
            'b' => TypeEncoding::Bitfield(self.number().ok_or_else(|| self.unknown())? as u32),
            '[' => {
                let len = self.number().unwrap_or(0);
                let element = Box::new(self.next_type()?);
                if self.bump() != Some(']') {
                    return Err(EncodingError::Unterminated(self.text.to_string()));
                }
                TypeEncoding::Array { len, element }
            }
            '{' => {
                let (name, fields) = self.aggregate('}')?;
                TypeEncoding::Struct { name, fields }
            }
            '(' => {
                let (name, fields) = self.aggregate(')')?;
                TypeEncoding::Union { name, fields }
            }
            other => {
                return Err(EncodingError::UnknownCode {
                    code: other,
                    encoding: self.text.to_string(),
                })
            }
        })
    }

    fn aggregate(&mut self, close: char) -> Result<(String, Vec<TypeEncoding>), EncodingError> {
        let rest = &self.text[self.pos..];
        let name_len = rest
            .find(|c| c == '=' || c == close)
            .ok_or_else(|| EncodingError::Unterminated(self.text.to_string()))?;
        let name = rest[..name_len].to_string();
        self.pos += name_len;

        let mut fields = Vec::new();
        if self.peek() == Some('=') {
            self.pos += 1;
            loop {
                self.skip_quoted()?;
                match self.peek() {
                    Some(c) if c == close => break,
                    Some(_) => fields.push(self.next_type()?),
                    None => return Err(EncodingError::Unterminated(self.text.to_string())),
                }
            }
        }
        self.pos += close.len_utf8();
        Ok((name, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_and_objects() {
        assert_eq!(
            TypeEncoding::parse_all("i@:ii").unwrap(),
            vec![
                TypeEncoding::Int,
                TypeEncoding::Object,
                TypeEncoding::Selector,
                TypeEncoding::Int,
                TypeEncoding::Int
            ]
        );
    }

    #[test]
    fn test_qualifiers_and_offsets_are_skipped() {
        assert_eq!(
            TypeEncoding::parse_all("Vv16@0:8").unwrap(),
            vec![TypeEncoding::Void, TypeEncoding::Object, TypeEncoding::Selector]
        );
        assert_eq!(
            TypeEncoding::parse("r*").unwrap(),
            TypeEncoding::CString
        );
        assert_eq!(
            TypeEncoding::parse("n^{NSRange=QQ}").unwrap().to_string(),
            "^{NSRange=QQ}"
        );
    }

    #[test]
    fn test_aggregates() {
        let range = TypeEncoding::parse("{_NSRange=QQ}").unwrap();
        assert_eq!(range.size(), Some(16));
        assert_eq!(
            TypeEncoding::parse("[4f]").unwrap(),
            TypeEncoding::Array {
                len: 4,
                element: Box::new(TypeEncoding::Float)
            }
        );
        assert_eq!(
            TypeEncoding::parse("{Named=\"x\"d\"y\"d}").unwrap().to_string(),
            "{Named=dd}"
        );
        assert_eq!(
            TypeEncoding::parse("(Value=iq)").unwrap().to_string(),
            "(Value=iq)"
        );
    }

    #[test]
    fn test_oversized_arrays_have_no_size() {
        let huge = TypeEncoding::parse(&format!("[{}q]", usize::MAX / 4)).unwrap();
        assert_eq!(huge.size(), None);
        let half = TypeEncoding::parse(&format!("[{}c]", usize::MAX / 2 + 1)).unwrap();
        assert!(half.size().is_some());
        let pair = TypeEncoding::Struct {
            name: "Pair".to_string(),
            fields: vec![half.clone(), half],
        };
        assert_eq!(pair.size(), None);
    }

    #[test]
    fn test_address_types() {
        for code in ["^v", "^@", "#", "?"] {
            assert!(TypeEncoding::parse(code).unwrap().is_address(), "{}", code);
        }
        assert!(!TypeEncoding::Object.is_address());
        assert!(!TypeEncoding::CString.is_address());
    }

    #[test]
    fn test_annotated_objects() {
        assert_eq!(TypeEncoding::parse("@\"NSString\"").unwrap(), TypeEncoding::Object);
        assert_eq!(TypeEncoding::parse("@?").unwrap(), TypeEncoding::Object);
    }

    #[test]
    fn test_errors() {
        assert_eq!(TypeEncoding::parse_all(""), Err(EncodingError::Empty));
        assert!(matches!(
            TypeEncoding::parse("x"),
            Err(EncodingError::UnknownCode { code: 'x', .. })
        ));
        assert!(matches!(
            TypeEncoding::parse("{Open=ii"),
            Err(EncodingError::Unterminated(_))
        ));
        assert!(TypeEncoding::parse("ii").is_err());
    }
}

//! `jbridge decode`: explain a type encoding.

use jbridge_core::marshal::managed_class;
use jbridge_core::{MethodSignature, TypeEncoding};

pub fn execute(encoding: &str) -> anyhow::Result<()> {
    // A full method signature gets slot names; anything else is a type list
    match MethodSignature::parse(encoding) {
        Ok(signature) => {
            println!("Signature:  {}", signature.types());
            println!("Arguments:  {}", signature.number_of_arguments());
            println!();
            print_row("return", signature.method_return_type());
            for index in 0..signature.number_of_arguments() {
                let slot = match index {
                    0 => "self".to_string(),
                    1 => "_cmd".to_string(),
                    n => format!("arg {}", n),
                };
                if let Some(ty) = signature.argument_type_at(index) {
                    print_row(&slot, ty);
                }
            }
        }
        Err(_) => {
            for (index, ty) in TypeEncoding::parse_all(encoding)?.iter().enumerate() {
                print_row(&format!("#{}", index), ty);
            }
        }
    }
    Ok(())
}

fn print_row(slot: &str, ty: &TypeEncoding) {
    let managed = managed_class(ty).unwrap_or("(not marshaled)");
    println!("{:<8} {:<14} {:<24} {}", slot, ty.to_string(), c_name(ty), managed);
}

/// C spelling of a type
fn c_name(ty: &TypeEncoding) -> String {
    match ty {
        TypeEncoding::Char => "char".to_string(),
        TypeEncoding::Int => "int".to_string(),
        TypeEncoding::Short => "short".to_string(),
        TypeEncoding::Long => "long".to_string(),
        TypeEncoding::LongLong => "long long".to_string(),
        TypeEncoding::UChar => "unsigned char".to_string(),
        TypeEncoding::UInt => "unsigned int".to_string(),
        TypeEncoding::UShort => "unsigned short".to_string(),
        TypeEncoding::ULong => "unsigned long".to_string(),
        TypeEncoding::ULongLong => "unsigned long long".to_string(),
        TypeEncoding::Float => "float".to_string(),
        TypeEncoding::Double => "double".to_string(),
        TypeEncoding::Bool => "BOOL".to_string(),
        TypeEncoding::Void => "void".to_string(),
        TypeEncoding::CString => "char *".to_string(),
        TypeEncoding::Object => "id".to_string(),
        TypeEncoding::Class => "Class".to_string(),
        TypeEncoding::Selector => "SEL".to_string(),
        TypeEncoding::Pointer(inner) => format!("{} *", c_name(inner)),
        TypeEncoding::Struct { name, .. } => format!("struct {}", name),
        TypeEncoding::Union { name, .. } => format!("union {}", name),
        TypeEncoding::Array { len, element } => format!("{}[{}]", c_name(element), len),
        TypeEncoding::Bitfield(bits) => format!("bitfield:{}", bits),
        TypeEncoding::Unknown => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_names() {
        let name = |code: &str| c_name(&TypeEncoding::parse(code).unwrap());
        assert_eq!(name("Q"), "unsigned long long");
        assert_eq!(name("^i"), "int *");
        assert_eq!(name("[4d]"), "double[4]");
        assert_eq!(name("{CGPoint=dd}"), "struct CGPoint");
    }

    #[test]
    fn test_execute_accepts_plain_type_lists() {
        assert!(execute("i@:ii").is_ok());
        assert!(execute("{CGPoint=dd}").is_ok());
        assert!(execute("").is_err());
    }
}

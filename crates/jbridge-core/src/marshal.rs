//! Value conversion across the boundary
//!
//! | encoding | managed side |
//! |---|---|
//! | `c` | `java/lang/Byte` |
//! | `s S i I` | `java/lang/Integer` |
//! | `C l L q Q` | `java/lang/Long` |
//! | `f` / `d` | `java/lang/Float` / `java/lang/Double` |
//! | `B` | `java/lang/Boolean` |
//! | `*` | `java/lang/String` |
//! | `:` | selector name as `java/lang/String` |
//! | `@` | proxy peer, `java/lang/String` for native strings |
//! | `^T # ?` | raw address as `java/lang/Long`, null for NULL on the way in |
//!
//! Scalars come back through `Number.longValue` / `floatValue` /
//! `doubleValue`, so any `Number` subclass is accepted for any scalar slot.
//! Structs, arrays, unions and bitfields are not marshaled.

use jbridge_sdk::{AbiError, ClassRef, JValue, JniEnv, ObjectRef};

use crate::encoding::TypeEncoding;
use crate::error::{MarshalError, ProxyResult};
use crate::exception::take_pending;
use crate::object::{downcast, NativeString};
use crate::proxy::JavaProxy;
use crate::runtime::RuntimeHandle;
use crate::selector::Selector;
use crate::signature::MethodSignature;
use crate::value::NativeValue;

const OBJECT: &str = "java/lang/Object";
const STRING: &str = "java/lang/String";
const NUMBER: &str = "java/lang/Number";
const BOOLEAN: &str = "java/lang/Boolean";
const CHARACTER: &str = "java/lang/Character";
const LONG: &str = "java/lang/Long";

/// Managed class a value of type `ty` crosses as, `None` if it does not cross.
///
/// `@` reports `java/lang/Object`: the concrete class depends on the value.
pub fn managed_class(ty: &TypeEncoding) -> Option<&'static str> {
    Some(match ty {
        TypeEncoding::Char => "java/lang/Byte",
        TypeEncoding::Short | TypeEncoding::UShort | TypeEncoding::Int | TypeEncoding::UInt => {
            "java/lang/Integer"
        }
        TypeEncoding::UChar
        | TypeEncoding::Long
        | TypeEncoding::ULong
        | TypeEncoding::LongLong
        | TypeEncoding::ULongLong => "java/lang/Long",
        TypeEncoding::Float => "java/lang/Float",
        TypeEncoding::Double => "java/lang/Double",
        TypeEncoding::Bool => BOOLEAN,
        TypeEncoding::CString | TypeEncoding::Selector => STRING,
        TypeEncoding::Object => OBJECT,
        address if address.is_address() => LONG,
        _ => return None,
    })
}

/// Convert a native value into a (possibly null) managed reference.
///
/// Scalars are boxed. The returned reference is a new local reference.
pub fn to_managed(
    env: &dyn JniEnv,
    runtime: &RuntimeHandle,
    value: &NativeValue,
    ty: &TypeEncoding,
) -> Result<Option<ObjectRef>, MarshalError> {
    if ty.is_scalar() {
        return box_scalar(env, &value.coerce_to(ty)?, ty).map(Some);
    }
    if ty.is_address() {
        let address = value.coerce_to(ty)?.as_pointer().unwrap_or(0);
        return value_of(env, LONG, "(J)Ljava/lang/Long;", JValue::Long(address as i64)).map(Some);
    }
    match (ty, value.coerce_to(ty)?) {
        (TypeEncoding::Void, _) => Ok(None),
        (TypeEncoding::CString, NativeValue::CString(text)) => match text {
            Some(text) => Ok(Some(env.new_string_utf(&text)?)),
            None => Ok(None),
        },
        (TypeEncoding::Selector, NativeValue::Selector(selector)) => {
            Ok(Some(env.new_string_utf(selector.name())?))
        }
        (TypeEncoding::Object, NativeValue::Object(None)) => Ok(None),
        (TypeEncoding::Object, NativeValue::Object(Some(id))) => {
            if let Some(proxy) = downcast::<JavaProxy>(&id) {
                if !proxy.runtime().same_runtime(runtime) {
                    return Err(MarshalError::ForeignProxy);
                }
                return Ok(Some(env.new_local_ref(proxy.java_peer())?));
            }
            if let Some(string) = downcast::<NativeString>(&id) {
                return Ok(Some(env.new_string_utf(string.as_str())?));
            }
            Err(MarshalError::Unsupported(format!("@ ({})", id.class_name())))
        }
        _ => Err(MarshalError::Unsupported(ty.to_string())),
    }
}

/// Convert a managed reference into a native value of type `ty`.
///
/// Managed objects in `@` slots become native strings or new proxies.
pub fn to_native(
    env: &dyn JniEnv,
    runtime: &RuntimeHandle,
    obj: Option<ObjectRef>,
    ty: &TypeEncoding,
) -> ProxyResult<NativeValue> {
    if ty.is_scalar() {
        let obj = obj.ok_or(MarshalError::Boundary(AbiError::NullReference("boxed scalar")))?;
        return Ok(unbox_scalar(env, obj, ty)?);
    }
    if ty.is_address() {
        return match obj {
            Some(obj) => Ok(unbox_address(env, obj)?),
            None => Ok(NativeValue::Pointer(0)),
        };
    }
    let obj = match (ty, obj) {
        (TypeEncoding::Void, _) => return Ok(NativeValue::Void),
        (TypeEncoding::CString, None) => return Ok(NativeValue::CString(None)),
        (TypeEncoding::Object, None) => return Ok(NativeValue::nil()),
        (TypeEncoding::CString | TypeEncoding::Selector | TypeEncoding::Object, Some(obj)) => obj,
        (TypeEncoding::Selector, None) => {
            return Err(MarshalError::Boundary(AbiError::NullReference("selector")).into())
        }
        _ => return Err(MarshalError::Unsupported(ty.to_string()).into()),
    };

    let string_class = env.find_class(STRING).map_err(MarshalError::from)?;
    let is_string = env.is_instance_of(obj, string_class).map_err(MarshalError::from)?;
    match ty {
        TypeEncoding::Object if is_string => {
            let text = env.get_string_utf_chars(obj).map_err(MarshalError::from)?;
            Ok(NativeValue::object(NativeString::new_id(text)))
        }
        TypeEncoding::Object => {
            let proxy = JavaProxy::with_env(runtime, env, obj)?;
            Ok(NativeValue::object(proxy.into_id()))
        }
        _ if !is_string => Err(MarshalError::NotBoxed {
            expected: STRING.to_string(),
            class: class_name_of(env, obj),
        }
        .into()),
        TypeEncoding::Selector => {
            let name = env.get_string_utf_chars(obj).map_err(MarshalError::from)?;
            Ok(NativeValue::Selector(Selector::new(&name)))
        }
        _ => {
            let text = env.get_string_utf_chars(obj).map_err(MarshalError::from)?;
            Ok(NativeValue::string(text))
        }
    }
}

/// Box explicit arguments into a new `Object[]`
pub fn arguments_to_managed(
    env: &dyn JniEnv,
    runtime: &RuntimeHandle,
    signature: &MethodSignature,
    args: &[NativeValue],
) -> Result<ObjectRef, MarshalError> {
    let types = signature.explicit_arguments();
    if args.len() != types.len() {
        return Err(MarshalError::Mismatch {
            expected: format!("{} arguments", types.len()),
            got: format!("{} arguments", args.len()),
        });
    }
    let object_class = env.find_class(OBJECT)?;
    let array = env.new_object_array(args.len(), object_class, None)?;
    for (index, (value, ty)) in args.iter().zip(types).enumerate() {
        let element = to_managed(env, runtime, value, ty)?;
        env.set_object_array_element(array, index, element)?;
        if let Some(element) = element {
            env.delete_local_ref(element);
        }
    }
    Ok(array)
}

/// Unbox an `Object[]` into explicit arguments for `signature`
pub fn arguments_to_native(
    env: &dyn JniEnv,
    runtime: &RuntimeHandle,
    signature: &MethodSignature,
    array: Option<ObjectRef>,
) -> ProxyResult<Vec<NativeValue>> {
    let types = signature.explicit_arguments();
    let len = match array {
        Some(array) => env.get_array_length(array)?,
        None => 0,
    };
    if len != types.len() {
        return Err(MarshalError::Mismatch {
            expected: format!("{} arguments", types.len()),
            got: format!("{} arguments", len),
        }
        .into());
    }
    let mut values = Vec::with_capacity(len);
    if let Some(array) = array {
        for (index, ty) in types.iter().enumerate() {
            let element = env.get_object_array_element(array, index)?;
            values.push(to_native(env, runtime, element, ty)?);
            if let Some(element) = element {
                env.delete_local_ref(element);
            }
        }
    }
    Ok(values)
}

fn box_scalar(env: &dyn JniEnv, value: &NativeValue, ty: &TypeEncoding) -> Result<ObjectRef, MarshalError> {
    let int = value.as_i64().unwrap_or(0);
    let (class, descriptor, arg) = match ty {
        TypeEncoding::Char => ("java/lang/Byte", "(B)Ljava/lang/Byte;", JValue::Byte(int as i8)),
        TypeEncoding::Short | TypeEncoding::UShort | TypeEncoding::Int | TypeEncoding::UInt => {
            ("java/lang/Integer", "(I)Ljava/lang/Integer;", JValue::Int(int as i32))
        }
        TypeEncoding::Bool => (
            BOOLEAN,
            "(Z)Ljava/lang/Boolean;",
            JValue::Boolean(value.as_bool().unwrap_or(false)),
        ),
        TypeEncoding::Float => (
            "java/lang/Float",
            "(F)Ljava/lang/Float;",
            JValue::Float(value.as_f64().unwrap_or(0.0) as f32),
        ),
        TypeEncoding::Double => (
            "java/lang/Double",
            "(D)Ljava/lang/Double;",
            JValue::Double(value.as_f64().unwrap_or(0.0)),
        ),
        // Unsigned 64-bit values keep their bit pattern
        TypeEncoding::ULongLong => match value {
            NativeValue::ULongLong(v) => (LONG, "(J)Ljava/lang/Long;", JValue::Long(*v as i64)),
            _ => (LONG, "(J)Ljava/lang/Long;", JValue::Long(int)),
        },
        _ => (LONG, "(J)Ljava/lang/Long;", JValue::Long(int)),
    };
    value_of(env, class, descriptor, arg)
}

fn value_of(env: &dyn JniEnv, class: &str, descriptor: &str, arg: JValue) -> Result<ObjectRef, MarshalError> {
    let class = env.find_class(class)?;
    let value_of = env.get_static_method_id(class, "valueOf", descriptor)?;
    let boxed = env.call_static_method(class, value_of, &[arg]);
    check_thrown(env)?;
    boxed?
        .as_object()?
        .ok_or(MarshalError::Boundary(AbiError::NullReference("boxed value")))
}

fn unbox_scalar(env: &dyn JniEnv, obj: ObjectRef, ty: &TypeEncoding) -> Result<NativeValue, MarshalError> {
    let boolean = env.find_class(BOOLEAN)?;
    if env.is_instance_of(obj, boolean)? {
        let value = call_unboxing(env, obj, boolean, "booleanValue", "()Z")?;
        return NativeValue::Bool(value.as_bool().unwrap_or(false)).coerce_to(ty);
    }
    let character = env.find_class(CHARACTER)?;
    if env.is_instance_of(obj, character)? {
        return match call_unboxing(env, obj, character, "charValue", "()C")? {
            JValue::Char(c) => NativeValue::UShort(c).coerce_to(ty),
            other => Err(unexpected(ty, other)),
        };
    }
    let number = env.find_class(NUMBER)?;
    if !env.is_instance_of(obj, number)? {
        return Err(MarshalError::NotBoxed {
            expected: NUMBER.to_string(),
            class: class_name_of(env, obj),
        });
    }
    let native = match ty {
        TypeEncoding::Float => match call_unboxing(env, obj, number, "floatValue", "()F")? {
            JValue::Float(f) => NativeValue::Float(f),
            other => return Err(unexpected(ty, other)),
        },
        TypeEncoding::Double => match call_unboxing(env, obj, number, "doubleValue", "()D")? {
            JValue::Double(d) => NativeValue::Double(d),
            other => return Err(unexpected(ty, other)),
        },
        TypeEncoding::ULongLong => match call_unboxing(env, obj, number, "longValue", "()J")? {
            JValue::Long(l) => NativeValue::ULongLong(l as u64),
            other => return Err(unexpected(ty, other)),
        },
        _ => match call_unboxing(env, obj, number, "longValue", "()J")? {
            JValue::Long(l) => NativeValue::LongLong(l),
            other => return Err(unexpected(ty, other)),
        },
    };
    native.coerce_to(ty)
}

fn unbox_address(env: &dyn JniEnv, obj: ObjectRef) -> Result<NativeValue, MarshalError> {
    let number = env.find_class(NUMBER)?;
    if !env.is_instance_of(obj, number)? {
        return Err(MarshalError::NotBoxed {
            expected: NUMBER.to_string(),
            class: class_name_of(env, obj),
        });
    }
    match call_unboxing(env, obj, number, "longValue", "()J")? {
        JValue::Long(l) => Ok(NativeValue::Pointer(l as u64)),
        other => Err(unexpected(&TypeEncoding::Pointer(Box::new(TypeEncoding::Void)), other)),
    }
}

fn call_unboxing(
    env: &dyn JniEnv,
    obj: ObjectRef,
    class: ClassRef,
    name: &str,
    descriptor: &str,
) -> Result<JValue, MarshalError> {
    let method = env.get_method_id(class, name, descriptor)?;
    let value = env.call_method(obj, method, &[]);
    check_thrown(env)?;
    Ok(value?)
}

fn check_thrown(env: &dyn JniEnv) -> Result<(), MarshalError> {
    match take_pending(env) {
        Some(thrown) => Err(MarshalError::Thrown(thrown.describe())),
        None => Ok(()),
    }
}

fn unexpected(ty: &TypeEncoding, got: JValue) -> MarshalError {
    MarshalError::Mismatch {
        expected: ty.to_string(),
        got: got.type_name().to_string(),
    }
}

fn class_name_of(env: &dyn JniEnv, obj: ObjectRef) -> String {
    env.get_object_class(obj)
        .and_then(|class| env.class_name(class))
        .unwrap_or_else(|_| OBJECT.to_string())
}

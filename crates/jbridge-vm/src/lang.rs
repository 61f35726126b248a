//! Core `java/lang` classes
//!
//! Just enough of the standard library for a bridge to work against:
//! the root object, strings, the primitive wrappers with their `valueOf` /
//! `xxxValue` conversions, and the throwable hierarchy.

use jbridge_sdk::{AbiResult, ClassRef, JValue, JniEnv, ObjectRef};

use crate::class::{Class, ClassTable, Method};
use crate::env::Env;
use crate::heap::ObjectData;

/// Well-known classes resolved at boot
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lang {
    pub object: ClassRef,
    pub string: ClassRef,
    pub object_array: ClassRef,
    pub boolean: ClassRef,
    pub byte: ClassRef,
    pub character: ClassRef,
    pub short: ClassRef,
    pub integer: ClassRef,
    pub long: ClassRef,
    pub float: ClassRef,
    pub double: ClassRef,
    pub throwable: ClassRef,
}

fn define(
    table: &mut ClassTable,
    name: &str,
    super_class: Option<ClassRef>,
    methods: Vec<Method>,
) -> AbiResult<ClassRef> {
    table.register(Class {
        name: name.to_string(),
        super_class,
        methods,
    })
}

/// Integer view of a boxed numeric primitive
fn as_i64(value: JValue) -> i64 {
    match value {
        JValue::Byte(b) => b as i64,
        JValue::Short(s) => s as i64,
        JValue::Int(i) => i as i64,
        JValue::Long(l) => l,
        JValue::Float(f) => f as i64,
        JValue::Double(d) => d as i64,
        JValue::Char(c) => c as i64,
        JValue::Boolean(b) => b as i64,
        JValue::Void | JValue::Object(_) => 0,
    }
}

/// Floating view of a boxed numeric primitive
fn as_f64(value: JValue) -> f64 {
    match value {
        JValue::Float(f) => f as f64,
        JValue::Double(d) => d,
        other => as_i64(other) as f64,
    }
}

/// `Number.xxxValue()`
fn number_value(name: &str, descriptor: &str, convert: fn(JValue) -> JValue) -> AbiResult<Method> {
    Method::instance(name, descriptor, move |env: &Env, this: ObjectRef, _args: &[JValue]| {
        match env.unbox(this) {
            Ok(value) => convert(value),
            Err(e) => env.throw_abi_error(&e),
        }
    })
}

/// `Box.valueOf(prim)`
fn value_of(descriptor: &str) -> AbiResult<Method> {
    Method::new_static("valueOf", descriptor, |env: &Env, args: &[JValue]| {
        match args.first().map(|v| env.box_value(*v)) {
            Some(Ok(boxed)) => JValue::Object(boxed),
            Some(Err(e)) => env.throw_abi_error(&e),
            None => env.throw_by_name("java/lang/IllegalArgumentException", "missing value"),
        }
    })
}

/// `Box.xxxValue()` returning the stored primitive unchanged
fn unboxed(name: &str, descriptor: &str) -> AbiResult<Method> {
    number_value(name, descriptor, |v| v)
}

pub(crate) fn bootstrap(table: &mut ClassTable) -> AbiResult<Lang> {
    let object = define(
        table,
        "java/lang/Object",
        None,
        vec![
            Method::instance("toString", "()Ljava/lang/String;", |env, this, _| {
                let text = env
                    .get_object_class(this)
                    .and_then(|class| env.class_name(class))
                    .map(|name| format!("{}@{:x}", name.replace('/', "."), this.as_raw()));
                match text.and_then(|t| env.new_string_utf(&t)) {
                    Ok(s) => JValue::object(s),
                    Err(e) => env.throw_abi_error(&e),
                }
            })?,
            Method::instance("equals", "(Ljava/lang/Object;)Z", |env, this, args| {
                let other = args.first().and_then(|a| a.as_object().ok()).flatten();
                JValue::Boolean(env.is_same_object(Some(this), other))
            })?,
        ],
    )?;

    let string = define(
        table,
        "java/lang/String",
        Some(object),
        vec![
            Method::instance("length", "()I", |env, this, _| {
                match env.get_string_utf_chars(this) {
                    Ok(s) => JValue::Int(s.encode_utf16().count() as i32),
                    Err(e) => env.throw_abi_error(&e),
                }
            })?,
            Method::instance("toString", "()Ljava/lang/String;", |_env, this, _| {
                JValue::object(this)
            })?,
        ],
    )?;

    let object_array = define(table, "[Ljava/lang/Object;", Some(object), Vec::new())?;

    let number = define(
        table,
        "java/lang/Number",
        Some(object),
        vec![
            number_value("byteValue", "()B", |v| JValue::Byte(as_i64(v) as i8))?,
            number_value("shortValue", "()S", |v| JValue::Short(as_i64(v) as i16))?,
            number_value("intValue", "()I", |v| JValue::Int(as_i64(v) as i32))?,
            number_value("longValue", "()J", |v| JValue::Long(as_i64(v)))?,
            number_value("floatValue", "()F", |v| JValue::Float(as_f64(v) as f32))?,
            number_value("doubleValue", "()D", |v| JValue::Double(as_f64(v)))?,
        ],
    )?;

    let byte = define(table, "java/lang/Byte", Some(number), vec![value_of("(B)Ljava/lang/Byte;")?])?;
    let short = define(table, "java/lang/Short", Some(number), vec![value_of("(S)Ljava/lang/Short;")?])?;
    let integer = define(
        table,
        "java/lang/Integer",
        Some(number),
        vec![value_of("(I)Ljava/lang/Integer;")?],
    )?;
    let long = define(table, "java/lang/Long", Some(number), vec![value_of("(J)Ljava/lang/Long;")?])?;
    let float = define(table, "java/lang/Float", Some(number), vec![value_of("(F)Ljava/lang/Float;")?])?;
    let double = define(
        table,
        "java/lang/Double",
        Some(number),
        vec![value_of("(D)Ljava/lang/Double;")?],
    )?;
    let boolean = define(
        table,
        "java/lang/Boolean",
        Some(object),
        vec![value_of("(Z)Ljava/lang/Boolean;")?, unboxed("booleanValue", "()Z")?],
    )?;
    let character = define(
        table,
        "java/lang/Character",
        Some(object),
        vec![value_of("(C)Ljava/lang/Character;")?, unboxed("charValue", "()C")?],
    )?;

    let throwable = define(
        table,
        "java/lang/Throwable",
        Some(object),
        vec![Method::instance("getMessage", "()Ljava/lang/String;", |env, this, _| {
            let message = env.read(this, |o| match &o.data {
                ObjectData::Throwable { message } => message.clone(),
                _ => None,
            });
            match message {
                Ok(Some(m)) => match env.new_string_utf(&m) {
                    Ok(s) => JValue::object(s),
                    Err(e) => env.throw_abi_error(&e),
                },
                Ok(None) => JValue::null(),
                Err(e) => env.throw_abi_error(&e),
            }
        })?],
    )?;
    let exception = define(table, "java/lang/Exception", Some(throwable), Vec::new())?;
    let runtime = define(table, "java/lang/RuntimeException", Some(exception), Vec::new())?;
    for name in [
        "java/lang/IllegalArgumentException",
        "java/lang/IllegalStateException",
        "java/lang/NullPointerException",
        "java/lang/ClassCastException",
        "java/lang/ArrayIndexOutOfBoundsException",
        "java/lang/UnsupportedOperationException",
    ] {
        define(table, name, Some(runtime), Vec::new())?;
    }

    Ok(Lang {
        object,
        string,
        object_array,
        boolean,
        byte,
        character,
        short,
        integer,
        long,
        float,
        double,
        throwable,
    })
}

//! Managed-facing entry points with the process-wide runtime installed

use std::sync::Arc;

use jbridge_core::{entry, runtime, take_pending, RuntimeError};
use jbridge_sdk::{JValue, JniEnv, ObjectRef};
use jbridge_vm::{required_arg, Env, PeerClassBuilder, Vm};
use once_cell::sync::Lazy;

static VM: Lazy<Vm> = Lazy::new(|| {
    let vm = Vm::new().unwrap();
    define_relay(&vm);
    runtime::set_java_vm(Arc::new(vm.clone())).unwrap();
    vm
});

fn define_relay(vm: &Vm) {
    PeerClassBuilder::new(vm, "test/Relay")
        .selector("add::", "i@:ii", |env, _this, args| {
            let a = env.unbox(required_arg(args, 0)?)?.as_int().unwrap_or(0);
            let b = env.unbox(required_arg(args, 1)?)?.as_int().unwrap_or(0);
            env.box_value(JValue::Int(a + b))
        })
        // Calls back into native dispatch: add:: on the proxy behind the handle
        .selector("double:via:", "i@:iq", |env, _this, args| {
            let n = env.unbox(required_arg(args, 0)?)?;
            let handle = env.unbox(required_arg(args, 1)?)?.as_long().unwrap_or(0);
            let pair = boxed_args(env, &[n, n]);
            Ok(entry::send_message(env, handle, "add::", Some(pair)))
        })
        .selector("fail", "v@:", |env, _this, _args| {
            env.throw_by_name("java/lang/IllegalArgumentException", "refused");
            Ok(None)
        })
        .build()
        .unwrap();
}

fn boxed_args(env: &Env, values: &[JValue]) -> ObjectRef {
    let object = env.find_class("java/lang/Object").unwrap();
    let array = env.new_object_array(values.len(), object, None).unwrap();
    for (i, value) in values.iter().enumerate() {
        let boxed = env.box_value(*value).unwrap();
        env.set_object_array_element(array, i, boxed).unwrap();
    }
    array
}

fn relay(env: &Env) -> i64 {
    let class = env.find_class("test/Relay").unwrap();
    let peer = env.new_object(class).unwrap();
    let handle = entry::create_proxy(env, Some(peer));
    assert_ne!(handle, 0);
    handle
}

#[test]
fn test_install_is_write_once() {
    Lazy::force(&VM);
    assert!(runtime::is_installed());
    assert_eq!(
        runtime::set_java_vm(Arc::new(Vm::new().unwrap())),
        Err(RuntimeError::AlreadyInstalled)
    );
}

#[test]
fn test_create_query_release() {
    let env = VM.attach().unwrap();
    let class = env.find_class("test/Relay").unwrap();
    let peer = env.new_object(class).unwrap();

    let handle = entry::create_proxy(&*env, Some(peer));
    assert_ne!(handle, 0);
    let back = entry::proxy_peer(&*env, handle).unwrap();
    assert!(env.is_same_object(Some(back), Some(peer)));
    assert!(entry::proxy_responds(&*env, handle, "add::"));
    assert!(!entry::proxy_responds(&*env, handle, "sub::"));

    entry::release_proxy(&*env, handle);
    assert!(!env.exception_check());
    assert!(entry::proxy_peer(&*env, handle).is_none());
    assert!(take_pending(&*env).is_some());
}

#[test]
fn test_create_rejects_null_and_non_peers() {
    let env = VM.attach().unwrap();
    assert_eq!(entry::create_proxy(&*env, None), 0);
    let thrown = take_pending(&*env).unwrap();
    assert_eq!(thrown.class_name, "java/lang/RuntimeException");

    let plain = env.new_string_utf("not a peer").unwrap();
    assert_eq!(entry::create_proxy(&*env, Some(plain)), 0);
    assert!(take_pending(&*env).unwrap().describe().contains("Cannot construct proxy"));
}

#[test]
fn test_send_message_boxes_result() {
    let env = VM.attach().unwrap();
    let handle = relay(&env);

    let args = boxed_args(&env, &[JValue::Int(2), JValue::Int(3)]);
    let result = entry::send_message(&*env, handle, "add::", Some(args)).unwrap();
    assert_eq!(env.unbox(result).unwrap(), JValue::Int(5));
    assert!(!env.exception_check());
    entry::release_proxy(&*env, handle);
}

#[test]
fn test_send_message_failures_raise() {
    let env = VM.attach().unwrap();
    let handle = relay(&env);

    assert!(entry::send_message(&*env, handle, "missing", None).is_none());
    let thrown = take_pending(&*env).unwrap();
    assert_eq!(thrown.class_name, "java/lang/RuntimeException");
    assert_eq!(
        thrown.message.as_deref(),
        Some("JavaProxy<test.Relay> does not recognize selector missing")
    );

    assert!(entry::send_message(&*env, handle, "fail", None).is_none());
    let thrown = take_pending(&*env).unwrap();
    assert_eq!(
        thrown.message.as_deref(),
        Some("Method invocation for selector fail caused exception: refused")
    );

    // Wrong argument count
    assert!(entry::send_message(&*env, handle, "add::", None).is_none());
    assert!(take_pending(&*env).is_some());
    entry::release_proxy(&*env, handle);
}

#[test]
fn test_peer_reenters_native_dispatch() {
    let env = VM.attach().unwrap();
    let handle = relay(&env);

    let args = boxed_args(&env, &[JValue::Int(21), JValue::Long(handle)]);
    let result = entry::send_message(&*env, handle, "double:via:", Some(args)).unwrap();
    assert_eq!(env.unbox(result).unwrap(), JValue::Int(42));
    assert!(!env.exception_check());
    entry::release_proxy(&*env, handle);
}

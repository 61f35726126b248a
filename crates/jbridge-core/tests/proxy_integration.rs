//! Proxy behavior against the reference runtime

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use jbridge_core::proxy::{FORWARD_DESCRIPTOR, RESPONDS_DESCRIPTOR, SIGNATURE_DESCRIPTOR};
use jbridge_core::{
    downcast, msg_send, responds, DispatchError, DynamicObject, Id, JavaProxy, MarshalError,
    NativeString, NativeValue, ProxyError, RuntimeHandle, Selector,
};
use jbridge_sdk::{JValue, JniEnv, ObjectRef};
use jbridge_vm::{required_arg, PeerClassBuilder, Vm};

struct Fixture {
    vm: Vm,
    runtime: RuntimeHandle,
    forwarded: Arc<AtomicUsize>,
}

impl Fixture {
    fn new() -> Self {
        let vm = Vm::new().unwrap();
        let runtime = RuntimeHandle::with_defaults(Arc::new(vm.clone()));
        let forwarded = Arc::new(AtomicUsize::new(0));
        define_person(&vm, forwarded.clone());
        Self { vm, runtime, forwarded }
    }

    fn person(&self) -> ObjectRef {
        let env = self.vm.attach().unwrap();
        let class = env.find_class("test/Person").unwrap();
        env.new_object(class).unwrap()
    }

    fn proxy(&self) -> Id {
        JavaProxy::new(&self.runtime, self.person()).unwrap().into_id()
    }
}

fn define_person(vm: &Vm, forwarded: Arc<AtomicUsize>) {
    let counted = move || {
        forwarded.fetch_add(1, Ordering::SeqCst);
    };
    let (c1, c2, c3, c4, c5) = (
        counted.clone(),
        counted.clone(),
        counted.clone(),
        counted.clone(),
        counted.clone(),
    );
    PeerClassBuilder::new(vm, "test/Person")
        .selector("add::", "i@:ii", move |env, _this, args| {
            c1();
            let a = env.unbox(required_arg(args, 0)?)?.as_int().unwrap_or(0);
            let b = env.unbox(required_arg(args, 1)?)?.as_int().unwrap_or(0);
            env.box_value(JValue::Int(a + b))
        })
        .selector("name", "@@:", move |env, _this, _args| {
            c2();
            env.new_string_utf("Ada").map(Some)
        })
        .selector("friend", "@@:", move |env, _this, _args| {
            c3();
            let class = env.find_class("test/Person")?;
            env.new_object(class).map(Some)
        })
        .selector("echo:", "@@:@", move |_env, _this, args| {
            c4();
            Ok(args.first().copied().flatten())
        })
        .selector("boom", "v@:", move |env, _this, _args| {
            c5();
            env.throw_by_name("java/lang/IllegalStateException", "bad state");
            Ok(None)
        })
        .selector("half:", "d@:d", |env, _this, args| {
            let d = env.unbox(required_arg(args, 0)?)?.as_double().unwrap_or(0.0);
            env.box_value(JValue::Double(d / 2.0))
        })
        .selector("isAdult", "B@:", |env, _this, _args| env.box_value(JValue::Boolean(true)))
        .selector("point", "{CGPoint=dd}@:", |_env, _this, _args| Ok(None))
        // Hands the context pointer back, one word further on
        .selector("next:", "^v@:^v", |env, _this, args| {
            let address = env.unbox(required_arg(args, 0)?)?.as_long().unwrap_or(0);
            env.box_value(JValue::Long(address + 8))
        })
        .selector("classOf:", "#@:@", |env, _this, _args| env.box_value(JValue::Long(0x2000)))
        .build()
        .unwrap();
}

#[test]
fn test_forwards_scalar_call() {
    let fx = Fixture::new();
    let proxy = fx.proxy();
    let sum = msg_send(&proxy, Selector::new("add::"), &[NativeValue::Int(2), NativeValue::Int(3)]).unwrap();
    assert_eq!(sum, NativeValue::Int(5));

    let half = msg_send(&proxy, Selector::new("half:"), &[NativeValue::Double(5.0)]).unwrap();
    assert_eq!(half, NativeValue::Double(2.5));
    assert_eq!(
        msg_send(&proxy, Selector::new("isAdult"), &[]).unwrap(),
        NativeValue::Bool(true)
    );
}

#[test]
fn test_string_result_becomes_native_string() {
    let fx = Fixture::new();
    let proxy = fx.proxy();
    let name = msg_send(&proxy, Selector::new("name"), &[]).unwrap();
    let text = name.as_object().and_then(downcast::<NativeString>).map(NativeString::as_str);
    assert_eq!(text, Some("Ada"));
}

#[test]
fn test_object_result_is_wrapped_in_new_proxy() {
    let fx = Fixture::new();
    let proxy = fx.proxy();
    let friend = msg_send(&proxy, Selector::new("friend"), &[]).unwrap();
    let friend = friend.as_object().unwrap().clone();

    let wrapped = downcast::<JavaProxy>(&friend).unwrap();
    assert_eq!(wrapped.peer_class_name(), "test/Person");
    assert!(!wrapped.is_same_peer(downcast::<JavaProxy>(&proxy).unwrap()).unwrap());

    let sum = msg_send(&friend, Selector::new("add::"), &[NativeValue::Int(1), NativeValue::Int(1)]).unwrap();
    assert_eq!(sum, NativeValue::Int(2));
}

#[test]
fn test_peer_identity_round_trip() {
    let fx = Fixture::new();
    let env = fx.vm.attach().unwrap();
    let peer = fx.person();
    let proxy = JavaProxy::new(&fx.runtime, peer).unwrap();
    assert!(env.is_same_object(Some(proxy.java_peer()), Some(peer)));

    // A proxy passed to its own peer comes back as the same managed object
    let id = proxy.into_id();
    let echoed = msg_send(&id, Selector::new("echo:"), &[NativeValue::object(id.clone())]).unwrap();
    let echoed = echoed.as_object().and_then(downcast::<JavaProxy>).unwrap();
    assert!(echoed.is_same_peer(downcast::<JavaProxy>(&id).unwrap()).unwrap());

    // Native strings travel as managed strings and back
    let echoed = msg_send(&id, Selector::new("echo:"), &[NativeValue::string("plain")]);
    assert!(matches!(echoed, Err(DispatchError::TypeMismatch { .. })));
    let echoed = msg_send(&id, Selector::new("echo:"), &[NativeValue::object(NativeString::new_id("hi"))]).unwrap();
    assert_eq!(
        echoed.as_object().and_then(downcast::<NativeString>).map(NativeString::as_str),
        Some("hi")
    );
    assert_eq!(msg_send(&id, Selector::new("echo:"), &[NativeValue::nil()]).unwrap(), NativeValue::nil());
}

#[test]
fn test_missing_selector_is_not_forwarded() {
    let fx = Fixture::new();
    let env = fx.vm.attach().unwrap();
    let proxy = fx.proxy();

    let err = msg_send(&proxy, Selector::new("missing"), &[]).unwrap_err();
    assert_eq!(
        err,
        DispatchError::UnrecognizedSelector {
            class: "JavaProxy<test.Person>".to_string(),
            selector: Selector::new("missing"),
        }
    );
    assert_eq!(fx.forwarded.load(Ordering::SeqCst), 0);
    assert!(!env.exception_check());
}

#[test]
fn test_peer_exception_is_surfaced_and_cleared() {
    let fx = Fixture::new();
    let env = fx.vm.attach().unwrap();
    let proxy = fx.proxy();

    let err = msg_send(&proxy, Selector::new("boom"), &[]).unwrap_err();
    match &err {
        DispatchError::Proxy(ProxyError::Forwarding {
            selector,
            exception_class,
            message,
        }) => {
            assert_eq!(*selector, Selector::new("boom"));
            assert_eq!(exception_class, "java/lang/IllegalStateException");
            assert_eq!(message, "bad state");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(
        err.to_string(),
        "Method invocation for selector boom caused exception: bad state"
    );
    assert!(!env.exception_check());

    // The next call is unaffected
    let sum = msg_send(&proxy, Selector::new("add::"), &[NativeValue::Int(4), NativeValue::Int(4)]).unwrap();
    assert_eq!(sum, NativeValue::Int(8));
}

#[test]
fn test_unsupported_return_type() {
    let fx = Fixture::new();
    let proxy = fx.proxy();
    assert!(matches!(
        msg_send(&proxy, Selector::new("point"), &[]),
        Err(DispatchError::Proxy(ProxyError::Marshal(MarshalError::Unsupported(_))))
    ));
}

#[test]
fn test_responds_agrees_with_resolution() {
    let fx = Fixture::new();
    let proxy = fx.proxy();
    for name in ["add::", "name", "friend", "echo:", "boom", "missing", "add:"] {
        let selector = Selector::new(name);
        assert_eq!(
            responds(Some(&proxy), selector),
            proxy.method_signature_for_selector(selector).is_ok(),
            "{}",
            name
        );
    }
}

#[test]
fn test_drop_releases_peer() {
    let fx = Fixture::new();
    let env = fx.vm.attach().unwrap();
    let pinned = fx.vm.stats().global_refs;

    env.push_local_frame(4).unwrap();
    let proxy = fx.proxy();
    env.pop_local_frame(None).unwrap();
    assert_eq!(fx.vm.stats().global_refs, pinned + 1);

    // Only the proxy keeps the peer alive now
    fx.vm.collect();
    assert_eq!(
        msg_send(&proxy, Selector::new("add::"), &[NativeValue::Int(1), NativeValue::Int(2)]).unwrap(),
        NativeValue::Int(3)
    );

    drop(proxy);
    assert_eq!(fx.vm.stats().global_refs, pinned);
    assert!(fx.vm.collect() >= 1);
}

#[test]
fn test_explicit_destroy() {
    let fx = Fixture::new();
    let pinned = fx.vm.stats().global_refs;
    let proxy = JavaProxy::new(&fx.runtime, fx.person()).unwrap();
    assert_eq!(fx.vm.stats().global_refs, pinned + 1);
    proxy.destroy();
    assert_eq!(fx.vm.stats().global_refs, pinned);
}

#[test]
fn test_shared_across_threads() {
    let fx = Fixture::new();
    let proxy = fx.proxy();

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let proxy = proxy.clone();
            thread::spawn(move || {
                for n in 0..25 {
                    let sum = msg_send(&proxy, Selector::new("add::"), &[NativeValue::Int(i), NativeValue::Int(n)]).unwrap();
                    assert_eq!(sum, NativeValue::Int(i + n));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Threads attached for a single call are detached again
    assert_eq!(fx.vm.attached_threads(), 1);
    assert_eq!(fx.forwarded.load(Ordering::SeqCst), 100);
}

#[test]
fn test_dropped_on_unattached_thread() {
    let fx = Fixture::new();
    let pinned = fx.vm.stats().global_refs;
    let proxy = fx.proxy();
    thread::spawn(move || drop(proxy)).join().unwrap();
    assert_eq!(fx.vm.stats().global_refs, pinned);
    assert_eq!(fx.vm.attached_threads(), 1);
}

#[test]
fn test_foreign_runtime_proxy_rejected() {
    let fx = Fixture::new();
    let other = Fixture::new();
    let proxy = fx.proxy();
    let foreign = other.proxy();

    let err = msg_send(&proxy, Selector::new("echo:"), &[NativeValue::object(foreign)]).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Proxy(ProxyError::Marshal(MarshalError::ForeignProxy))
    ));
}

#[test]
fn test_pointer_arguments_cross_as_addresses() {
    let fx = Fixture::new();
    let proxy = fx.proxy();
    assert_eq!(
        msg_send(&proxy, Selector::new("next:"), &[NativeValue::Pointer(0x1000)]).unwrap(),
        NativeValue::Pointer(0x1008)
    );
    // NULL goes out as address 0
    assert_eq!(
        msg_send(&proxy, Selector::new("next:"), &[NativeValue::nil()]).unwrap(),
        NativeValue::Pointer(8)
    );
    assert_eq!(
        msg_send(&proxy, Selector::new("classOf:"), &[NativeValue::object(proxy.clone())]).unwrap(),
        NativeValue::Pointer(0x2000)
    );
}

#[test]
fn test_throwing_protocol_methods() {
    let fx = Fixture::new();
    let env = fx.vm.attach().unwrap();
    let class = fx
        .vm
        .define_class("test/Hostile", None)
        .method("methodSignatureForSelector", SIGNATURE_DESCRIPTOR, |env, _this, _args| {
            env.throw_by_name("java/lang/IllegalStateException", "sig boom")
        })
        .method("forwardInvocation", FORWARD_DESCRIPTOR, |_env, _this, _args| JValue::null())
        .method("respondsToSelector", RESPONDS_DESCRIPTOR, |env, _this, _args| {
            env.throw_by_name("java/lang/IllegalStateException", "responds boom")
        })
        .build()
        .unwrap();
    let peer = env.new_object(class).unwrap();
    let proxy = JavaProxy::new(&fx.runtime, peer).unwrap().into_id();

    // A failing query answers false and leaves nothing pending
    assert!(!proxy.responds_to_selector(Selector::new("anything")));
    assert!(!responds(Some(&proxy), Selector::new("anything")));
    assert!(!env.exception_check());

    let err = msg_send(&proxy, Selector::new("anything"), &[]).unwrap_err();
    match err {
        DispatchError::Proxy(ProxyError::Forwarding {
            selector,
            exception_class,
            message,
        }) => {
            assert_eq!(selector, Selector::new("anything"));
            assert_eq!(exception_class, "java/lang/IllegalStateException");
            assert_eq!(message, "sig boom");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!env.exception_check());
}

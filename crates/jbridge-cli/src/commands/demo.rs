//! `jbridge demo`: forward selectors to a peer in the reference runtime.

use std::sync::Arc;

use anyhow::Context;
use jbridge_core::{
    downcast, msg_send, responds, BridgeConfig, JavaProxy, NativeString, NativeValue, RuntimeHandle,
    Selector,
};
use jbridge_sdk::{JValue, JniEnv};
use jbridge_vm::{required_arg, PeerClassBuilder, Vm};

const PEER_CLASS: &str = "demo/Calculator";

pub fn execute(config: BridgeConfig, repeat: usize) -> anyhow::Result<()> {
    let vm = Vm::new().context("starting reference runtime")?;
    define_calculator(&vm, &config)?;
    let runtime = RuntimeHandle::new(Arc::new(vm.clone()), config);

    let env = vm.attach()?;
    let class = env.find_class(PEER_CLASS)?;
    let peer = env.new_object(class)?;
    let proxy = JavaProxy::new(&runtime, peer)?;
    println!("Proxy:    {:?}", proxy);
    let proxy = proxy.into_id();

    for _ in 0..repeat {
        let sum = msg_send(&proxy, Selector::new("add::"), &[NativeValue::Int(2), NativeValue::Int(3)])?;
        println!("add::     {:?}", sum);
    }

    let name = msg_send(&proxy, Selector::new("name"), &[])?;
    let name = name.as_object().and_then(downcast::<NativeString>).map(NativeString::as_str);
    println!("name      {}", name.unwrap_or("<nil>"));

    for selector in ["add::", "name", "divide::"] {
        println!("responds  {} -> {}", selector, responds(Some(&proxy), Selector::new(selector)));
    }

    // Failures surface as errors, not crashes
    match msg_send(&proxy, Selector::new("divide::"), &[NativeValue::Int(1), NativeValue::Int(0)]) {
        Ok(value) => println!("divide::  {:?}", value),
        Err(e) => println!("divide::  error: {}", e),
    }
    match msg_send(&proxy, Selector::new("fail"), &[]) {
        Ok(_) => println!("fail      returned"),
        Err(e) => println!("fail      error: {}", e),
    }
    println!("pending   {}", env.exception_check());

    drop(proxy);
    let freed = vm.collect();
    let stats = vm.stats();
    println!(
        "Heap:     {} objects, {} global refs, {} freed",
        stats.objects, stats.global_refs, freed
    );
    Ok(())
}

fn define_calculator(vm: &Vm, config: &BridgeConfig) -> anyhow::Result<()> {
    PeerClassBuilder::new(vm, PEER_CLASS)
        .protocol(
            &config.peer.signature_method,
            &config.peer.forward_method,
            &config.peer.responds_method,
        )
        .selector("add::", "i@:ii", |env, _this, args| {
            let a = env.unbox(required_arg(args, 0)?)?.as_int().unwrap_or(0);
            let b = env.unbox(required_arg(args, 1)?)?.as_int().unwrap_or(0);
            env.box_value(JValue::Int(a.wrapping_add(b)))
        })
        .selector("name", "@@:", |env, _this, _args| env.new_string_utf("Calculator").map(Some))
        .selector("fail", "v@:", |env, _this, _args| {
            env.throw_by_name("java/lang/IllegalStateException", "calculator is broken");
            Ok(None)
        })
        .build()
        .with_context(|| format!("defining {}", PEER_CLASS))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_runs_with_defaults() {
        execute(BridgeConfig::default(), 2).unwrap();
    }

    #[test]
    fn test_demo_honors_protocol_names() {
        let mut config = BridgeConfig::default();
        config.peer.forward_method = "dispatch".to_string();
        execute(config, 1).unwrap();
    }
}

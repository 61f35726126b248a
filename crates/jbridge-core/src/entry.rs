//! Managed-facing entry points
//!
//! These functions have the shape of native methods bound by the managed
//! runtime: they receive the caller's execution context, work on opaque
//! `i64` handles, and report failure by leaving an exception pending instead
//! of returning an error.
//!
//! Handles map to native objects in a process-wide table. The table lock is
//! never held while dispatching, so a peer may call back into
//! [`send_message`] from inside a forwarded call on the same thread.

use jbridge_sdk::{JniEnv, ObjectRef};
use once_cell::sync::Lazy;

use crate::config::DEFAULT_EXCEPTION_CLASS;
use crate::dispatch;
use crate::error::{DispatchError, ProxyError};
use crate::exception::raise;
use crate::handles::HandleRegistry;
use crate::marshal;
use crate::object::{downcast, Id};
use crate::proxy::JavaProxy;
use crate::runtime::{self, RuntimeHandle};
use crate::selector::Selector;

static HANDLES: Lazy<HandleRegistry<Id>> = Lazy::new(HandleRegistry::new);

/// Store `object` and return its handle (never 0)
pub fn register(object: Id) -> i64 {
    HANDLES.insert(object)
}

/// Object behind `handle`
pub fn lookup(handle: i64) -> Option<Id> {
    HANDLES.get_cloned(handle)
}

/// Remove `handle` from the table, returning its object
pub fn unregister(handle: i64) -> Option<Id> {
    HANDLES.remove(handle)
}

/// Number of live handles
pub fn live_handles() -> usize {
    HANDLES.len()
}

/// Wrap `peer` in a new proxy. Returns 0 with an exception pending on failure.
pub fn create_proxy(env: &dyn JniEnv, peer: Option<ObjectRef>) -> i64 {
    let created = installed().and_then(|runtime| {
        let peer = peer.ok_or_else(|| ProxyError::Construction("peer is null".to_string()))?;
        JavaProxy::with_env(runtime, env, peer)
    });
    match created {
        Ok(proxy) => register(proxy.into_id()),
        Err(e) => {
            fail(env, &e.to_string());
            0
        }
    }
}

/// New local reference to the peer behind `handle`
pub fn proxy_peer(env: &dyn JniEnv, handle: i64) -> Option<ObjectRef> {
    let id = object_for(env, handle)?;
    let proxy = match downcast::<JavaProxy>(&id) {
        Some(proxy) => proxy,
        None => {
            fail(env, &format!("handle {} is a {}, not a proxy", handle, id.class_name()));
            return None;
        }
    };
    match env.new_local_ref(proxy.java_peer()) {
        Ok(peer) => Some(peer),
        Err(e) => {
            fail(env, &e.to_string());
            None
        }
    }
}

/// Whether the object behind `handle` answers `selector`
pub fn proxy_responds(env: &dyn JniEnv, handle: i64, selector: &str) -> bool {
    object_for(env, handle)
        .map(|id| dispatch::responds(Some(&id), Selector::new(selector)))
        .unwrap_or(false)
}

/// Send `selector` with boxed `args` to the object behind `handle`.
///
/// Returns the boxed result, `None` for void or nil. An unrecognized
/// selector, a marshaling failure or a peer exception leaves an exception
/// pending.
pub fn send_message(
    env: &dyn JniEnv,
    handle: i64,
    selector: &str,
    args: Option<ObjectRef>,
) -> Option<ObjectRef> {
    let id = object_for(env, handle)?;
    let runtime = match installed() {
        Ok(runtime) => runtime,
        Err(e) => {
            fail(env, &e.to_string());
            return None;
        }
    };
    match send(env, runtime, &id, Selector::new(selector), args) {
        Ok(result) => result,
        Err(e) => {
            fail(env, &e.to_string());
            None
        }
    }
}

/// Drop the table's reference to the object behind `handle`
pub fn release_proxy(env: &dyn JniEnv, handle: i64) {
    match unregister(handle) {
        Some(_) => log::debug!("released handle {}", handle),
        None => fail(env, &format!("invalid proxy handle {}", handle)),
    }
}

fn send(
    env: &dyn JniEnv,
    runtime: &RuntimeHandle,
    id: &Id,
    selector: Selector,
    args: Option<ObjectRef>,
) -> Result<Option<ObjectRef>, DispatchError> {
    let signature = dispatch::resolve(id, selector)?;
    let args = marshal::arguments_to_native(env, runtime, &signature, args)?;
    let ret = signature.method_return_type().clone();
    let result = dispatch::send_with_signature(id, selector, signature, &args)?;
    Ok(marshal::to_managed(env, runtime, &result, &ret).map_err(ProxyError::from)?)
}

fn installed() -> Result<&'static RuntimeHandle, ProxyError> {
    Ok(runtime::handle()?)
}

fn object_for(env: &dyn JniEnv, handle: i64) -> Option<Id> {
    let id = lookup(handle);
    if id.is_none() {
        fail(env, &format!("invalid proxy handle {}", handle));
    }
    id
}

fn fail(env: &dyn JniEnv, message: &str) {
    let class = runtime::handle()
        .map(|runtime| runtime.config().exception_class.as_str())
        .unwrap_or(DEFAULT_EXCEPTION_CLASS);
    raise(env, class, message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::take_pending;
    use crate::object::NativeString;
    use jbridge_vm::Vm;

    #[test]
    fn test_register_lookup_release() {
        let vm = Vm::new().unwrap();
        let env = vm.attach().unwrap();

        let handle = register(NativeString::new_id("kept"));
        assert_ne!(handle, 0);
        let id = lookup(handle).unwrap();
        assert_eq!(downcast::<NativeString>(&id).map(NativeString::as_str), Some("kept"));

        release_proxy(&*env, handle);
        assert!(!env.exception_check());
        assert!(lookup(handle).is_none());
    }

    #[test]
    fn test_stale_handle_raises() {
        let vm = Vm::new().unwrap();
        let env = vm.attach().unwrap();

        assert!(proxy_peer(&*env, -1).is_none());
        let thrown = take_pending(&*env).unwrap();
        assert_eq!(thrown.class_name, DEFAULT_EXCEPTION_CLASS);
        assert_eq!(thrown.message.as_deref(), Some("invalid proxy handle -1"));

        assert!(!proxy_responds(&*env, -1, "name"));
        assert!(take_pending(&*env).is_some());
    }

    #[test]
    fn test_peer_of_non_proxy_raises() {
        let vm = Vm::new().unwrap();
        let env = vm.attach().unwrap();
        let handle = register(NativeString::new_id("text"));
        assert!(proxy_peer(&*env, handle).is_none());
        assert!(take_pending(&*env).is_some());
        unregister(handle);
    }
}

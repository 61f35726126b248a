//! C FFI bindings for jbridge proxies
//!
//! This module exposes native proxies to C callers. The API follows these
//! principles:
//! - ABI-stable (uses only C-compatible types)
//! - Thread-safe (a proxy may be used from any thread)
//! - Error handling via out-parameters
//! - Opaque pointers for proxy objects
//! - Manual memory management
//!
//! The managed runtime must be installed first (see
//! `jbridge_core::runtime::install`). Managed references cross this API as
//! raw `uint64_t` handles; 0 is null.

use jbridge_core::dispatch::{resolve, send_with_signature};
use jbridge_core::{downcast, DynamicObject, Id, JavaProxy, NativeValue, Selector, TypeEncoding};
use jbridge_sdk::ObjectRef;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

// ============================================================================
// Opaque Types
// ============================================================================

/// Opaque handle to a native proxy
#[repr(C)]
pub struct JBridgeProxy {
    _private: [u8; 0],
}

/// Error information
#[repr(C)]
pub struct JBridgeError {
    message: *mut c_char,
}

// Internal representation of a proxy (not exposed to C)
struct ProxyHandle {
    object: Id,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert Rust string to C string (caller must free)
unsafe fn rust_to_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Set error out-parameter
unsafe fn set_error(error_out: *mut *mut JBridgeError, message: &str) {
    if !error_out.is_null() {
        let message = rust_to_c_string(message);
        *error_out = Box::into_raw(Box::new(JBridgeError { message }));
    }
}

/// Borrow the proxy behind an opaque pointer
unsafe fn handle<'a>(proxy: *const JBridgeProxy) -> Option<&'a ProxyHandle> {
    (proxy as *const ProxyHandle).as_ref()
}

/// Read a selector name from a C string
unsafe fn selector(name: *const c_char) -> Result<Selector, &'static str> {
    if name.is_null() {
        return Err("Invalid arguments (null selector)");
    }
    CStr::from_ptr(name)
        .to_str()
        .map(Selector::new)
        .map_err(|_| "Invalid UTF-8 in selector")
}

// ============================================================================
// Proxy Lifecycle Functions
// ============================================================================

/// Create a proxy for a managed peer
///
/// # Arguments
/// * `peer` - Managed reference valid on the calling thread (not 0)
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * Non-null pointer to JBridgeProxy on success
/// * NULL on failure (check error parameter)
///
/// # Safety
/// The returned proxy must be freed with `jbridge_proxy_destroy()`
///
/// # Example (C)
/// ```c
/// JBridgeError* error = NULL;
/// JBridgeProxy* proxy = jbridge_proxy_new(peer, &error);
/// if (proxy == NULL) {
///     fprintf(stderr, "Failed to create proxy: %s\n", jbridge_error_message(error));
///     jbridge_error_free(error);
///     return 1;
/// }
/// // Use proxy...
/// jbridge_proxy_destroy(proxy);
/// ```
#[no_mangle]
pub unsafe extern "C" fn jbridge_proxy_new(peer: u64, error: *mut *mut JBridgeError) -> *mut JBridgeProxy {
    let peer = match ObjectRef::from_raw(peer) {
        Some(peer) => peer,
        None => {
            set_error(error, "Invalid arguments (null peer)");
            return ptr::null_mut();
        }
    };

    match JavaProxy::from_installed(peer) {
        Ok(proxy) => {
            let handle = Box::new(ProxyHandle {
                object: proxy.into_id(),
            });
            Box::into_raw(handle) as *mut JBridgeProxy
        }
        Err(e) => {
            set_error(error, &e.to_string());
            ptr::null_mut()
        }
    }
}

/// Destroy a proxy and release its peer
///
/// # Arguments
/// * `proxy` - Pointer to JBridgeProxy (may be NULL)
///
/// # Safety
/// - Proxy pointer must be valid (created by `jbridge_proxy_new()`)
/// - Proxy must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn jbridge_proxy_destroy(proxy: *mut JBridgeProxy) {
    if proxy.is_null() {
        return;
    }

    let handle = Box::from_raw(proxy as *mut ProxyHandle);
    log::debug!("destroying {}", handle.object.class_name());
    drop(handle);
}

/// Get the proxy's peer
///
/// # Returns
/// * Managed reference valid on any thread while the proxy lives
/// * 0 if proxy is NULL
///
/// # Safety
/// - Proxy pointer must be valid
/// - Do not delete the returned reference
#[no_mangle]
pub unsafe extern "C" fn jbridge_proxy_peer(proxy: *const JBridgeProxy) -> u64 {
    handle(proxy)
        .and_then(|h| downcast::<JavaProxy>(&h.object))
        .map(|p| p.java_peer().as_raw())
        .unwrap_or(0)
}

// ============================================================================
// Dispatch Functions
// ============================================================================

/// Check whether the peer answers a selector
///
/// # Returns
/// * 1 if it does
/// * 0 if it does not, the query failed, or an argument is NULL
///
/// # Safety
/// - Proxy pointer must be valid
/// - Selector must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn jbridge_proxy_responds_to_selector(
    proxy: *const JBridgeProxy,
    selector_name: *const c_char,
) -> c_int {
    let (Some(handle), Ok(selector)) = (handle(proxy), selector(selector_name)) else {
        return 0;
    };
    c_int::from(handle.object.responds_to_selector(selector))
}

/// Resolve the type encoding of a selector
///
/// # Arguments
/// * `proxy` - Pointer to JBridgeProxy (must not be NULL)
/// * `selector_name` - Null-terminated selector name (`"add::"`)
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * Type encoding (`"i@:ii"`), to be freed with `jbridge_string_free()`
/// * NULL on failure (check error parameter)
///
/// # Safety
/// - Proxy pointer must be valid
/// - Selector must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn jbridge_proxy_method_signature(
    proxy: *const JBridgeProxy,
    selector_name: *const c_char,
    error: *mut *mut JBridgeError,
) -> *mut c_char {
    let Some(handle) = handle(proxy) else {
        set_error(error, "Invalid arguments (null pointer)");
        return ptr::null_mut();
    };
    let selector = match selector(selector_name) {
        Ok(selector) => selector,
        Err(message) => {
            set_error(error, message);
            return ptr::null_mut();
        }
    };

    match handle.object.method_signature_for_selector(selector) {
        Ok(signature) => rust_to_c_string(&signature.types()),
        Err(e) => {
            set_error(error, &e.to_string());
            ptr::null_mut()
        }
    }
}

/// Send a selector whose arguments and result are integers
///
/// Each argument is converted to the type the signature declares for its
/// slot; the result is widened to 64 bits (0 for void methods). Integer,
/// `BOOL` and address (`^T`, `#`, `?`) results are accepted. Any other return
/// type, floating point included, fails before the message is sent: floats
/// are never truncated.
///
/// # Arguments
/// * `proxy` - Pointer to JBridgeProxy (must not be NULL)
/// * `selector_name` - Null-terminated selector name
/// * `args` - Array of `argc` arguments (may be NULL if `argc` is 0)
/// * `result` - Optional pointer receiving the result
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * 0 on success
/// * -1 on failure (check error parameter)
///
/// # Safety
/// - Proxy pointer must be valid
/// - `args` must point to `argc` readable values
#[no_mangle]
pub unsafe extern "C" fn jbridge_proxy_send_i64(
    proxy: *const JBridgeProxy,
    selector_name: *const c_char,
    args: *const i64,
    argc: usize,
    result: *mut i64,
    error: *mut *mut JBridgeError,
) -> c_int {
    let Some(handle) = handle(proxy) else {
        set_error(error, "Invalid arguments (null pointer)");
        return -1;
    };
    let selector = match selector(selector_name) {
        Ok(selector) => selector,
        Err(message) => {
            set_error(error, message);
            return -1;
        }
    };
    if args.is_null() && argc > 0 {
        set_error(error, "Invalid arguments (null argument array)");
        return -1;
    }

    let values: Vec<NativeValue> = if argc == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(args, argc)
            .iter()
            .map(|&v| NativeValue::LongLong(v))
            .collect()
    };

    let signature = match resolve(&handle.object, selector) {
        Ok(signature) => signature,
        Err(e) => {
            set_error(error, &e.to_string());
            return -1;
        }
    };
    let returns = signature.method_return_type().clone();
    if !returns_integer(&returns) {
        set_error(
            error,
            &format!("Selector {} returns {}, not an integer", selector, returns),
        );
        return -1;
    }

    match send_with_signature(&handle.object, selector, signature, &values) {
        Ok(value) => match integer_result(&value) {
            Some(value) => {
                if !result.is_null() {
                    *result = value;
                }
                0
            }
            None => {
                set_error(error, &format!("Selector {} returned {}, not an integer", selector, value.kind()));
                -1
            }
        },
        Err(e) => {
            set_error(error, &e.to_string());
            -1
        }
    }
}

fn returns_integer(ty: &TypeEncoding) -> bool {
    ty.is_integer() || ty.is_address() || *ty == TypeEncoding::Void
}

fn integer_result(value: &NativeValue) -> Option<i64> {
    match *value {
        NativeValue::Void => Some(0),
        NativeValue::Pointer(address) => Some(address as i64),
        NativeValue::Float(_) | NativeValue::Double(_) => None,
        _ => value.as_i64(),
    }
}

// ============================================================================
// Error Handling Functions
// ============================================================================

/// Get the error message
///
/// # Returns
/// * Null-terminated error message string
/// * NULL if error is NULL
///
/// # Safety
/// - Error pointer must be valid
/// - Returned string is valid until `jbridge_error_free()` is called
/// - Do not free the returned string directly
#[no_mangle]
pub unsafe extern "C" fn jbridge_error_message(error: *const JBridgeError) -> *const c_char {
    if error.is_null() {
        return ptr::null();
    }

    (*error).message
}

/// Free an error
///
/// # Safety
/// - Error pointer must be valid (created by jbridge API) or NULL
/// - Error must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn jbridge_error_free(error: *mut JBridgeError) {
    if error.is_null() {
        return;
    }

    if !(*error).message.is_null() {
        let _ = CString::from_raw((*error).message);
    }

    let _ = Box::from_raw(error);
}

/// Free a string returned by the jbridge API
///
/// # Safety
/// - String must have been returned by a jbridge function, or be NULL
#[no_mangle]
pub unsafe extern "C" fn jbridge_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    let _ = CString::from_raw(s);
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the jbridge version string
///
/// # Safety
/// - The returned string is a static string and must not be freed
#[no_mangle]
pub unsafe extern "C" fn jbridge_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use jbridge_sdk::{JValue, JniEnv};
    use jbridge_vm::{required_arg, PeerClassBuilder, Vm};
    use once_cell::sync::Lazy;
    use std::sync::Arc;

    static VM: Lazy<Vm> = Lazy::new(|| {
        let vm = Vm::new().unwrap();
        PeerClassBuilder::new(&vm, "ffi/Counter")
            .selector("add::", "q@:qq", |env, _this, args| {
                let a = env.unbox(required_arg(args, 0)?)?.as_long().unwrap_or(0);
                let b = env.unbox(required_arg(args, 1)?)?.as_long().unwrap_or(0);
                env.box_value(JValue::Long(a + b))
            })
            .selector("reset", "v@:", |_env, _this, _args| Ok(None))
            .selector("name", "@@:", |env, _this, _args| env.new_string_utf("Ada").map(Some))
            .selector("half:", "d@:q", |env, _this, args| {
                let n = env.unbox(required_arg(args, 0)?)?.as_long().unwrap_or(0);
                env.box_value(JValue::Double(n as f64 / 2.0))
            })
            .selector("isZero:", "B@:q", |env, _this, args| {
                let n = env.unbox(required_arg(args, 0)?)?.as_long().unwrap_or(0);
                env.box_value(JValue::Boolean(n == 0))
            })
            .selector("context", "^v@:", |env, _this, _args| env.box_value(JValue::Long(0x1000)))
            .build()
            .unwrap();
        jbridge_core::runtime::set_java_vm(Arc::new(vm.clone())).unwrap();
        vm
    });

    fn new_proxy() -> *mut JBridgeProxy {
        let env = VM.attach().unwrap();
        let class = env.find_class("ffi/Counter").unwrap();
        let peer = env.new_object(class).unwrap();
        let mut error: *mut JBridgeError = ptr::null_mut();
        let proxy = unsafe { jbridge_proxy_new(peer.as_raw(), &mut error as *mut *mut JBridgeError) };
        assert!(!proxy.is_null());
        assert!(error.is_null());
        proxy
    }

    #[test]
    fn test_proxy_lifecycle() {
        unsafe {
            let proxy = new_proxy();
            assert_ne!(jbridge_proxy_peer(proxy), 0);
            assert_eq!(
                jbridge_proxy_responds_to_selector(proxy, b"add::\0".as_ptr() as *const c_char),
                1
            );
            assert_eq!(
                jbridge_proxy_responds_to_selector(proxy, b"sub::\0".as_ptr() as *const c_char),
                0
            );
            jbridge_proxy_destroy(proxy);
            jbridge_proxy_destroy(ptr::null_mut());
        }
    }

    #[test]
    fn test_method_signature() {
        unsafe {
            let proxy = new_proxy();
            let mut error: *mut JBridgeError = ptr::null_mut();

            let types = jbridge_proxy_method_signature(
                proxy,
                b"add::\0".as_ptr() as *const c_char,
                &mut error as *mut *mut JBridgeError,
            );
            assert!(!types.is_null());
            assert_eq!(CStr::from_ptr(types).to_str().unwrap(), "q@:qq");
            jbridge_string_free(types);

            let types = jbridge_proxy_method_signature(
                proxy,
                b"missing\0".as_ptr() as *const c_char,
                &mut error as *mut *mut JBridgeError,
            );
            assert!(types.is_null());
            assert!(!error.is_null());
            jbridge_error_free(error);
            jbridge_proxy_destroy(proxy);
        }
    }

    #[test]
    fn test_send_i64() {
        unsafe {
            let proxy = new_proxy();
            let mut error: *mut JBridgeError = ptr::null_mut();
            let mut result = 0i64;
            let args = [40i64, 2];

            let status = jbridge_proxy_send_i64(
                proxy,
                b"add::\0".as_ptr() as *const c_char,
                args.as_ptr(),
                args.len(),
                &mut result,
                &mut error as *mut *mut JBridgeError,
            );
            assert_eq!(status, 0);
            assert_eq!(result, 42);

            let status = jbridge_proxy_send_i64(
                proxy,
                b"reset\0".as_ptr() as *const c_char,
                ptr::null(),
                0,
                &mut result,
                &mut error as *mut *mut JBridgeError,
            );
            assert_eq!(status, 0);
            assert_eq!(result, 0);

            let status = jbridge_proxy_send_i64(
                proxy,
                b"add::\0".as_ptr() as *const c_char,
                args.as_ptr(),
                1,
                &mut result,
                &mut error as *mut *mut JBridgeError,
            );
            assert_eq!(status, -1);
            let message = CStr::from_ptr(jbridge_error_message(error)).to_str().unwrap();
            assert!(message.contains("takes 2 arguments"));
            jbridge_error_free(error);
            jbridge_proxy_destroy(proxy);
        }
    }

    #[test]
    fn test_send_i64_rejects_non_integer_results() {
        unsafe {
            let proxy = new_proxy();
            let mut result = 7i64;

            let args = [5i64];
            for (name, argc, returns) in [(&b"name\0"[..], 0, "@"), (&b"half:\0"[..], 1, "d")] {
                let mut error: *mut JBridgeError = ptr::null_mut();
                let status = jbridge_proxy_send_i64(
                    proxy,
                    name.as_ptr() as *const c_char,
                    args.as_ptr(),
                    argc,
                    &mut result,
                    &mut error as *mut *mut JBridgeError,
                );
                assert_eq!(status, -1);
                assert!(!error.is_null());
                let message = CStr::from_ptr(jbridge_error_message(error)).to_str().unwrap();
                assert!(message.contains(&format!("returns {}, not an integer", returns)), "{}", message);
                jbridge_error_free(error);
            }
            // Untouched on failure
            assert_eq!(result, 7);
            jbridge_proxy_destroy(proxy);
        }
    }

    #[test]
    fn test_send_i64_bool_and_address_results() {
        unsafe {
            let proxy = new_proxy();
            let mut error: *mut JBridgeError = ptr::null_mut();
            let mut result = 0i64;
            let args = [0i64];

            let status = jbridge_proxy_send_i64(
                proxy,
                b"isZero:\0".as_ptr() as *const c_char,
                args.as_ptr(),
                1,
                &mut result,
                &mut error as *mut *mut JBridgeError,
            );
            assert_eq!(status, 0);
            assert_eq!(result, 1);

            let status = jbridge_proxy_send_i64(
                proxy,
                b"context\0".as_ptr() as *const c_char,
                ptr::null(),
                0,
                &mut result,
                &mut error as *mut *mut JBridgeError,
            );
            assert_eq!(status, 0);
            assert_eq!(result, 0x1000);
            assert!(error.is_null());
            jbridge_proxy_destroy(proxy);
        }
    }

    #[test]
    fn test_error_handling() {
        unsafe {
            let mut error: *mut JBridgeError = ptr::null_mut();

            let proxy = jbridge_proxy_new(0, &mut error as *mut *mut JBridgeError);
            assert!(proxy.is_null());
            assert!(!error.is_null());
            assert!(!jbridge_error_message(error).is_null());
            jbridge_error_free(error);

            error = ptr::null_mut();
            let status = jbridge_proxy_send_i64(
                ptr::null(),
                b"add::\0".as_ptr() as *const c_char,
                ptr::null(),
                0,
                ptr::null_mut(),
                &mut error as *mut *mut JBridgeError,
            );
            assert_eq!(status, -1);
            assert!(!error.is_null());
            jbridge_error_free(error);
        }
    }

    #[test]
    fn test_version() {
        unsafe {
            let version = jbridge_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, jbridge_core::VERSION);
        }
    }
}

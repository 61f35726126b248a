//! Peer classes
//!
//! A peer is a managed object a native proxy forwards to. Its class carries
//! the three protocol methods the proxy resolves at construction:
//!
//! | method | descriptor |
//! |---|---|
//! | `methodSignatureForSelector` | `(Ljava/lang/String;)Ljava/lang/String;` |
//! | `forwardInvocation` | `(Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/Object;` |
//! | `respondsToSelector` | `(Ljava/lang/String;)Z` |
//!
//! [`PeerClassBuilder`] generates those methods from a table of selectors,
//! each with a type encoding and a handler working on boxed arguments.

use std::sync::Arc;

use jbridge_sdk::{AbiError, AbiResult, ClassRef, JValue, JniEnv, ObjectRef};
use rustc_hash::FxHashMap;

use crate::env::Env;
use crate::vm::Vm;

/// Descriptor of the selector-to-signature method
pub const SIGNATURE_DESCRIPTOR: &str = "(Ljava/lang/String;)Ljava/lang/String;";
/// Descriptor of the invocation forwarding method
pub const FORWARD_DESCRIPTOR: &str = "(Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/Object;";
/// Descriptor of the responds-to-selector method
pub const RESPONDS_DESCRIPTOR: &str = "(Ljava/lang/String;)Z";

/// Handler for one selector.
///
/// Receives the peer and the boxed arguments (self and `_cmd` excluded);
/// returns the boxed result, `None` for nil or void. An `Err` is thrown back
/// to the caller as `java/lang/RuntimeException`.
pub type SelectorHandler =
    Arc<dyn Fn(&Env, ObjectRef, &[Option<ObjectRef>]) -> AbiResult<Option<ObjectRef>> + Send + Sync>;

struct SelectorEntry {
    encoding: String,
    handler: SelectorHandler,
}

/// Names of the protocol methods
#[derive(Debug, Clone)]
struct Protocol {
    signature: String,
    forward: String,
    responds: String,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            signature: "methodSignatureForSelector".to_string(),
            forward: "forwardInvocation".to_string(),
            responds: "respondsToSelector".to_string(),
        }
    }
}

/// Builds a class whose instances can back a native proxy
pub struct PeerClassBuilder {
    vm: Vm,
    name: String,
    super_name: Option<String>,
    protocol: Protocol,
    selectors: FxHashMap<String, SelectorEntry>,
}

impl PeerClassBuilder {
    /// Start a peer class extending `java/lang/Object`
    pub fn new(vm: &Vm, name: &str) -> Self {
        Self {
            vm: vm.clone(),
            name: name.to_string(),
            super_name: None,
            protocol: Protocol::default(),
            selectors: FxHashMap::default(),
        }
    }

    /// Extend another class instead of `java/lang/Object`
    pub fn extends(mut self, super_name: &str) -> Self {
        self.super_name = Some(super_name.to_string());
        self
    }

    /// Rename the protocol methods
    pub fn protocol(mut self, signature: &str, forward: &str, responds: &str) -> Self {
        self.protocol = Protocol {
            signature: signature.to_string(),
            forward: forward.to_string(),
            responds: responds.to_string(),
        };
        self
    }

    /// Answer `selector` with the given type encoding (`"i@:ii"`)
    pub fn selector<F>(mut self, selector: &str, encoding: &str, handler: F) -> Self
    where
        F: Fn(&Env, ObjectRef, &[Option<ObjectRef>]) -> AbiResult<Option<ObjectRef>>
            + Send
            + Sync
            + 'static,
    {
        self.selectors.insert(
            selector.to_string(),
            SelectorEntry {
                encoding: encoding.to_string(),
                handler: Arc::new(handler),
            },
        );
        self
    }

    /// Register the class
    pub fn build(self) -> AbiResult<ClassRef> {
        let selectors = Arc::new(self.selectors);
        let count = selectors.len();
        let (for_signature, for_forward, for_responds) =
            (selectors.clone(), selectors.clone(), selectors);

        let class = self
            .vm
            .define_class(&self.name, self.super_name.as_deref())
            .method(&self.protocol.signature, SIGNATURE_DESCRIPTOR, move |env, _this, args| {
                let name = match selector_name(env, args) {
                    Ok(name) => name,
                    Err(e) => return env.throw_abi_error(&e),
                };
                match for_signature.get(&name) {
                    Some(entry) => match env.new_string_utf(&entry.encoding) {
                        Ok(s) => JValue::object(s),
                        Err(e) => env.throw_abi_error(&e),
                    },
                    None => JValue::null(),
                }
            })
            .method(&self.protocol.forward, FORWARD_DESCRIPTOR, move |env, this, args| {
                match forward(env, this, args, &for_forward) {
                    Ok(result) => JValue::Object(result),
                    Err(Thrown::Pending) => JValue::null(),
                    Err(Thrown::Error(e)) => {
                        env.throw_by_name("java/lang/RuntimeException", &e.to_string())
                    }
                }
            })
            .method(&self.protocol.responds, RESPONDS_DESCRIPTOR, move |env, _this, args| {
                match selector_name(env, args) {
                    Ok(name) => JValue::Boolean(for_responds.contains_key(&name)),
                    Err(e) => env.throw_abi_error(&e),
                }
            })
            .build()?;

        log::debug!("peer class {} answers {} selectors", self.name, count);
        Ok(class)
    }
}

/// Failure inside `forwardInvocation`
enum Thrown {
    /// The handler already threw
    Pending,
    Error(AbiError),
}

impl From<AbiError> for Thrown {
    fn from(e: AbiError) -> Self {
        Thrown::Error(e)
    }
}

fn forward(
    env: &Env,
    this: ObjectRef,
    args: &[JValue],
    selectors: &FxHashMap<String, SelectorEntry>,
) -> Result<Option<ObjectRef>, Thrown> {
    let name = selector_name(env, args)?;
    let entry = match selectors.get(&name) {
        Some(entry) => entry,
        None => {
            env.throw_by_name(
                "java/lang/UnsupportedOperationException",
                &format!("unrecognized selector {}", name),
            );
            return Err(Thrown::Pending);
        }
    };

    let boxed = match args.get(1).map(JValue::as_object).transpose()?.flatten() {
        Some(array) => {
            let len = env.get_array_length(array)?;
            (0..len)
                .map(|i| env.get_object_array_element(array, i))
                .collect::<AbiResult<Vec<_>>>()?
        }
        None => Vec::new(),
    };

    let result = (entry.handler)(env, this, &boxed);
    if env.exception_check() {
        return Err(Thrown::Pending);
    }
    Ok(result?)
}

fn selector_name(env: &Env, args: &[JValue]) -> AbiResult<String> {
    let selector = args
        .first()
        .map(JValue::as_object)
        .transpose()?
        .flatten()
        .ok_or(AbiError::NullReference("selector"))?;
    env.get_string_utf_chars(selector)
}

/// Non-null argument `index` of a selector handler
pub fn required_arg(args: &[Option<ObjectRef>], index: usize) -> AbiResult<ObjectRef> {
    match args.get(index) {
        Some(Some(obj)) => Ok(*obj),
        Some(None) => Err(AbiError::NullReference("selector argument")),
        None => Err(AbiError::IndexOutOfBounds {
            index,
            len: args.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator(vm: &Vm) -> ClassRef {
        PeerClassBuilder::new(vm, "test/Calculator")
            .selector("add::", "i@:ii", |env, _this, args| {
                let a = env.unbox(required_arg(args, 0)?)?.as_int().unwrap_or(0);
                let b = env.unbox(required_arg(args, 1)?)?.as_int().unwrap_or(0);
                env.box_value(JValue::Int(a + b))
            })
            .selector("fail", "v@:", |_env, _this, _args| Err(AbiError::Other("nope".into())))
            .build()
            .unwrap()
    }

    fn string(env: &Env, s: &str) -> JValue {
        JValue::object(env.new_string_utf(s).unwrap())
    }

    #[test]
    fn test_protocol_methods() {
        let vm = Vm::new().unwrap();
        let env = vm.attach().unwrap();
        let class = calculator(&vm);
        let peer = env.new_object(class).unwrap();

        let signature = env
            .get_method_id(class, "methodSignatureForSelector", SIGNATURE_DESCRIPTOR)
            .unwrap();
        let encoding = env
            .call_method(peer, signature, &[string(&env, "add::")])
            .unwrap()
            .as_object()
            .unwrap()
            .unwrap();
        assert_eq!(env.get_string_utf_chars(encoding).unwrap(), "i@:ii");
        assert!(env
            .call_method(peer, signature, &[string(&env, "missing")])
            .unwrap()
            .is_null());

        let responds = env
            .get_method_id(class, "respondsToSelector", RESPONDS_DESCRIPTOR)
            .unwrap();
        assert_eq!(
            env.call_method(peer, responds, &[string(&env, "add::")]).unwrap(),
            JValue::Boolean(true)
        );
        assert_eq!(
            env.call_method(peer, responds, &[string(&env, "sub::")]).unwrap(),
            JValue::Boolean(false)
        );
    }

    #[test]
    fn test_forward_boxes_through_array() {
        let vm = Vm::new().unwrap();
        let env = vm.attach().unwrap();
        let class = calculator(&vm);
        let peer = env.new_object(class).unwrap();

        let object = env.find_class("java/lang/Object").unwrap();
        let args = env.new_object_array(2, object, None).unwrap();
        let two = env.box_value(JValue::Int(2)).unwrap();
        let three = env.box_value(JValue::Int(3)).unwrap();
        env.set_object_array_element(args, 0, two).unwrap();
        env.set_object_array_element(args, 1, three).unwrap();

        let forward = env.get_method_id(class, "forwardInvocation", FORWARD_DESCRIPTOR).unwrap();
        let result = env
            .call_method(peer, forward, &[string(&env, "add::"), JValue::object(args)])
            .unwrap()
            .as_object()
            .unwrap()
            .unwrap();
        assert_eq!(env.unbox(result).unwrap(), JValue::Int(5));
    }

    #[test]
    fn test_forward_failures_are_thrown() {
        let vm = Vm::new().unwrap();
        let env = vm.attach().unwrap();
        let class = calculator(&vm);
        let peer = env.new_object(class).unwrap();
        let forward = env.get_method_id(class, "forwardInvocation", FORWARD_DESCRIPTOR).unwrap();

        for selector in ["fail", "missing"] {
            let result = env
                .call_method(peer, forward, &[string(&env, selector), JValue::null()])
                .unwrap();
            assert!(result.is_null());
            assert!(env.exception_check(), "{} should throw", selector);
            env.exception_clear();
        }
    }

    #[test]
    fn test_custom_protocol_names() {
        let vm = Vm::new().unwrap();
        let env = vm.attach().unwrap();
        let class = PeerClassBuilder::new(&vm, "test/Renamed")
            .protocol("signatureOf", "invoke", "answers")
            .selector("ping", "v@:", |_env, _this, _args| Ok(None))
            .build()
            .unwrap();
        assert!(env.get_method_id(class, "invoke", FORWARD_DESCRIPTOR).is_ok());
        assert!(env
            .get_method_id(class, "forwardInvocation", FORWARD_DESCRIPTOR)
            .is_err());
    }
}

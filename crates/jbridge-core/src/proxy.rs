//! Native proxies for managed peers
//!
//! A [`JavaProxy`] is a native object with no methods of its own. Every
//! selector sent to it is resolved by asking the peer for a type encoding,
//! then forwarded to the peer with boxed arguments; the boxed result is
//! converted back into the invocation's return slot.
//!
//! The peer's class must provide three methods (names configurable through
//! [`PeerProtocol`](crate::config::PeerProtocol)):
//!
//! ```text
//! String  methodSignatureForSelector(String selector)
//! Object  forwardInvocation(String selector, Object[] args)
//! boolean respondsToSelector(String selector)
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use jbridge_sdk::{AbiError, ClassRef, JValue, JniEnv, MethodId, ObjectRef};

use crate::attach::LocalFrame;
use crate::error::{ProxyError, ProxyResult};
use crate::exception::take_pending;
use crate::global_ref::GlobalRef;
use crate::invocation::Invocation;
use crate::marshal;
use crate::object::{DynamicObject, Id};
use crate::runtime::RuntimeHandle;
use crate::selector::Selector;
use crate::signature::MethodSignature;

/// Descriptor of the peer's signature method
pub const SIGNATURE_DESCRIPTOR: &str = "(Ljava/lang/String;)Ljava/lang/String;";
/// Descriptor of the peer's forwarding method
pub const FORWARD_DESCRIPTOR: &str = "(Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/Object;";
/// Descriptor of the peer's responds-to-selector method
pub const RESPONDS_DESCRIPTOR: &str = "(Ljava/lang/String;)Z";

/// Protocol methods resolved once at construction
#[derive(Debug, Clone, Copy)]
struct PeerMethods {
    signature: MethodId,
    forward: MethodId,
    responds: MethodId,
}

/// Native stand-in for a managed peer object
pub struct JavaProxy {
    runtime: RuntimeHandle,
    peer: GlobalRef,
    peer_class: ClassRef,
    peer_class_name: String,
    methods: PeerMethods,
}

impl JavaProxy {
    /// Bind a proxy to `peer`, attaching the calling thread if needed
    pub fn new(runtime: &RuntimeHandle, peer: ObjectRef) -> ProxyResult<Self> {
        let env = runtime.attach()?;
        Self::with_env(runtime, &*env, peer)
    }

    /// Bind a proxy to `peer` using an execution context the caller holds.
    ///
    /// Pins the peer, then resolves the protocol methods on its class. On
    /// failure nothing is retained; the pin is released before returning.
    pub fn with_env(runtime: &RuntimeHandle, env: &dyn JniEnv, peer: ObjectRef) -> ProxyResult<Self> {
        let construction = |what: String, e: AbiError| {
            take_pending(env);
            ProxyError::Construction(format!("{}: {}", what, e))
        };

        let pinned = GlobalRef::new(runtime.vm(), env, peer)
            .map_err(|e| construction(format!("invalid peer reference {:?}", peer), e))?;
        let peer_class = env
            .get_object_class(pinned.as_obj())
            .map_err(|e| construction("cannot get peer class".to_string(), e))?;
        let peer_class_name = env
            .class_name(peer_class)
            .map_err(|e| construction("cannot name peer class".to_string(), e))?;

        let protocol = &runtime.config().peer;
        let lookup = |name: &str, descriptor: &str| {
            env.get_method_id(peer_class, name, descriptor).map_err(|e| {
                construction(format!("{} has no method {}{}", peer_class_name, name, descriptor), e)
            })
        };
        let methods = PeerMethods {
            signature: lookup(&protocol.signature_method, SIGNATURE_DESCRIPTOR)?,
            forward: lookup(&protocol.forward_method, FORWARD_DESCRIPTOR)?,
            responds: lookup(&protocol.responds_method, RESPONDS_DESCRIPTOR)?,
        };

        log::debug!("proxy bound to {} peer {:?}", peer_class_name, pinned.as_obj());
        Ok(Self {
            runtime: runtime.clone(),
            peer: pinned,
            peer_class,
            peer_class_name,
            methods,
        })
    }

    /// Bind a proxy using the process-wide runtime handle
    pub fn from_installed(peer: ObjectRef) -> ProxyResult<Self> {
        Self::new(crate::runtime::handle()?, peer)
    }

    /// Wrap as a native object reference
    pub fn into_id(self) -> Id {
        Arc::new(self)
    }

    /// Pinned peer reference, valid on every thread while the proxy lives
    pub fn java_peer(&self) -> ObjectRef {
        self.peer.as_obj()
    }

    /// Class of the peer
    pub fn peer_class(&self) -> ClassRef {
        self.peer_class
    }

    /// Internal name of the peer's class
    pub fn peer_class_name(&self) -> &str {
        &self.peer_class_name
    }

    /// Runtime the peer lives in
    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    /// Whether both proxies stand for the same managed object
    pub fn is_same_peer(&self, other: &JavaProxy) -> ProxyResult<bool> {
        if !self.runtime.same_runtime(&other.runtime) {
            return Ok(false);
        }
        let env = self.runtime.attach()?;
        Ok(env.is_same_object(Some(self.java_peer()), Some(other.java_peer())))
    }

    /// Release the peer. Equivalent to dropping the proxy.
    pub fn destroy(self) {
        drop(self);
    }

    fn frame<'a>(&self, env: &'a dyn JniEnv) -> ProxyResult<LocalFrame<'a>> {
        Ok(LocalFrame::push(env, self.runtime.config().local_frame_capacity)?)
    }

    /// Fail with the peer's exception if the last call threw
    fn check_thrown(&self, env: &dyn JniEnv, selector: Selector) -> ProxyResult<()> {
        match take_pending(env) {
            Some(thrown) => Err(ProxyError::Forwarding {
                selector,
                message: thrown.describe(),
                exception_class: thrown.class_name,
            }),
            None => Ok(()),
        }
    }

    /// Ask the peer for the type encoding of `selector`
    fn resolve(&self, env: &dyn JniEnv, selector: Selector) -> ProxyResult<Option<MethodSignature>> {
        let _frame = self.frame(env)?;
        let name = env.new_string_utf(selector.name())?;
        let result = env.call_method(self.java_peer(), self.methods.signature, &[JValue::object(name)]);
        self.check_thrown(env, selector)?;

        let encoding = match result?.as_object()? {
            Some(encoding) => env.get_string_utf_chars(encoding)?,
            None => return Ok(None),
        };
        Ok(Some(MethodSignature::parse(&encoding)?))
    }

    fn forward(&self, env: &dyn JniEnv, invocation: &mut Invocation) -> ProxyResult<()> {
        let selector = invocation.selector();
        if self.runtime.config().debug {
            log::info!("forwarding {} to {}", selector, self.peer_class_name);
        } else {
            log::trace!("forwarding {} to {}", selector, self.peer_class_name);
        }

        let _frame = self.frame(env)?;
        let name = env.new_string_utf(selector.name())?;
        let args = marshal::arguments_to_managed(
            env,
            &self.runtime,
            invocation.method_signature(),
            invocation.arguments(),
        )?;
        let result = env.call_method(
            self.java_peer(),
            self.methods.forward,
            &[JValue::object(name), JValue::object(args)],
        );
        self.check_thrown(env, selector)?;

        let result = result?.as_object()?;
        let ret = invocation.method_signature().method_return_type().clone();
        let value = marshal::to_native(env, &self.runtime, result, &ret)?;
        invocation.set_return_value(value)?;
        Ok(())
    }

    fn responds(&self, env: &dyn JniEnv, selector: Selector) -> ProxyResult<bool> {
        let _frame = self.frame(env)?;
        let name = env.new_string_utf(selector.name())?;
        let result = env.call_method(self.java_peer(), self.methods.responds, &[JValue::object(name)]);
        self.check_thrown(env, selector)?;
        let result = result?;
        result.as_bool().ok_or_else(|| {
            ProxyError::Boundary(AbiError::TypeMismatch {
                expected: "boolean".to_string(),
                got: result.type_name().to_string(),
            })
        })
    }
}

impl DynamicObject for JavaProxy {
    fn class_name(&self) -> String {
        format!("JavaProxy<{}>", self.peer_class_name.replace('/', "."))
    }

    fn method_signature_for_selector(&self, selector: Selector) -> ProxyResult<MethodSignature> {
        let env = self.runtime.attach()?;
        self.resolve(&*env, selector)?
            .ok_or(ProxyError::Resolution(selector))
    }

    fn forward_invocation(&self, invocation: &mut Invocation) -> ProxyResult<()> {
        let env = self.runtime.attach()?;
        self.forward(&*env, invocation)
    }

    /// Failures of the query itself answer `false`
    fn responds_to_selector(&self, selector: Selector) -> bool {
        let answer = self
            .runtime
            .attach()
            .and_then(|env| self.responds(&*env, selector));
        match answer {
            Ok(responds) => responds,
            Err(e) => {
                log::warn!("respondsToSelector {} on {} failed: {}", selector, self.peer_class_name, e);
                false
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for JavaProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JavaProxy")
            .field("peer", &self.peer)
            .field("peer_class", &self.peer_class_name)
            .field("methods", &self.methods)
            .finish()
    }
}

impl Drop for JavaProxy {
    fn drop(&mut self) {
        log::debug!("releasing {} peer {:?}", self.peer_class_name, self.peer.as_obj());
    }
}

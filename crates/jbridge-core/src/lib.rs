//! jbridge core
//!
//! Native proxies for objects living in a garbage-collected managed runtime.
//! A [`JavaProxy`] has no methods of its own; the native dispatcher
//! ([`msg_send`]) asks it for a [`MethodSignature`], reifies the call as an
//! [`Invocation`] and hands it to the proxy, which forwards it to its peer:
//!
//! - signatures are resolved by asking the peer for an Objective-C type
//!   encoding
//! - arguments and results are boxed and unboxed through [`marshal`]
//! - managed exceptions thrown by the peer become [`ProxyError::Forwarding`]
//! - native failures are raised into the managed runtime by [`exception`]
//!
//! The managed runtime is reached only through the [`jbridge_sdk`] traits.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod attach;
pub mod config;
pub mod dispatch;
pub mod encoding;
pub mod entry;
pub mod error;
pub mod exception;
pub mod global_ref;
pub mod handles;
pub mod invocation;
pub mod marshal;
pub mod object;
pub mod proxy;
pub mod runtime;
pub mod selector;
pub mod signature;
pub mod value;

pub use attach::{AttachGuard, LocalFrame};
pub use config::{BridgeConfig, PeerProtocol};
pub use dispatch::{msg_send, responds};
pub use encoding::TypeEncoding;
pub use error::{
    ConfigError, DispatchError, EncodingError, MarshalError, ProxyError, ProxyResult, RuntimeError,
};
pub use exception::{raise, take_pending, ThrownException};
pub use global_ref::GlobalRef;
pub use invocation::Invocation;
pub use object::{downcast, DynamicObject, Id, NativeString};
pub use proxy::JavaProxy;
pub use runtime::RuntimeHandle;
pub use selector::Selector;
pub use signature::MethodSignature;
pub use value::NativeValue;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! jbridge SDK - embedding API contracts
//!
//! This crate defines the narrow surface a managed runtime exposes to native
//! code: a process-wide [`JavaVm`] handle, per-thread [`JniEnv`] execution
//! contexts, opaque reference handles, call-slot values and JNI descriptors.
//!
//! The bridge core depends on this crate only; concrete runtimes (a real JVM
//! binding, or the in-process reference runtime in `jbridge-vm`) implement
//! the traits.
//!
//! # Example
//!
//! ```ignore
//! use jbridge_sdk::{JavaVm, JValue};
//!
//! fn length_of(vm: &dyn JavaVm, s: &str) -> jbridge_sdk::AbiResult<i32> {
//!     let env = vm.attach_current_thread()?;
//!     let string = env.new_string_utf(s)?;
//!     let class = env.get_object_class(string)?;
//!     let length = env.get_method_id(class, "length", "()I")?;
//!     let len = env.call_method(string, length, &[])?;
//!     env.delete_local_ref(string);
//!     Ok(len.as_int().unwrap_or(0))
//! }
//! ```

#![warn(missing_docs)]

pub mod descriptor;
pub mod env;
pub mod error;
pub mod refs;
pub mod value;

pub use descriptor::{JavaType, MethodDescriptor};
pub use env::{JavaVm, JniEnv};
pub use error::{AbiError, AbiResult};
pub use refs::{raw_or_null, ClassRef, MethodId, ObjectRef};
pub use value::JValue;

//! jbridge reference runtime
//!
//! A small garbage-collected object runtime living in the same process,
//! implementing the [`jbridge_sdk`] embedding API. It models the parts of a
//! JVM a native bridge actually touches:
//!
//! - classes with single inheritance and virtual dispatch
//! - strings, object arrays, boxed primitives and throwables
//! - per-thread environments with local reference frames
//! - global references and mark-sweep collection
//! - pending exceptions with the usual "check after every call" rules
//!
//! # Example
//!
//! ```ignore
//! use jbridge_vm::{PeerClassBuilder, Vm};
//!
//! let vm = Vm::new()?;
//! let env = vm.attach()?;
//! let class = PeerClassBuilder::new(&vm, "demo/Greeter")
//!     .selector("hello", "v@:", |_env, _this, _args| Ok(None))
//!     .build()?;
//! let peer = env.new_object(class)?;
//! ```

#![warn(missing_docs)]

mod class;
mod env;
mod heap;
mod lang;
pub mod peer;
mod vm;

pub use class::{ClassBuilder, Method, MethodBody};
pub use env::Env;
pub use heap::HeapStats;
pub use peer::{required_arg, PeerClassBuilder, SelectorHandler};
pub use vm::Vm;

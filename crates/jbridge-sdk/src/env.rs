//! JavaVm / JniEnv traits: the embedding API
//!
//! A managed runtime exposes itself through these two traits. The bridge
//! programs against them only and never sees runtime internals.
//!
//! `JavaVm` is the process-wide entry point and is shared between threads.
//! `JniEnv` is a per-thread execution context: it is handed out as an
//! `Rc` and must not cross threads.

use std::rc::Rc;

use crate::error::AbiResult;
use crate::refs::{ClassRef, MethodId, ObjectRef};
use crate::value::JValue;

/// Process-wide handle to an embedded managed runtime.
///
/// Implementations must allow concurrent calls from any number of threads.
pub trait JavaVm: Send + Sync {
    /// The calling thread's context if it is already attached
    fn get_env(&self) -> Option<Rc<dyn JniEnv>>;

    /// Attach the calling thread, returning its context.
    ///
    /// Attaching an attached thread returns the existing context.
    fn attach_current_thread(&self) -> AbiResult<Rc<dyn JniEnv>>;

    /// Detach the calling thread, releasing every local reference it holds
    fn detach_current_thread(&self) -> AbiResult<()>;
}

/// Per-thread boundary execution context.
///
/// # Pending exceptions
///
/// When a called managed method throws, `call_method`/`call_static_method`
/// return normally and the exception becomes pending. While an exception is
/// pending, only the `exception_*` functions, `delete_local_ref`,
/// `delete_global_ref` and `pop_local_frame` may be called; anything else
/// fails with `AbiError::ExceptionPending`.
pub trait JniEnv {
    // ========================================================================
    // Classes
    // ========================================================================

    /// Find a loaded class by internal name (`java/lang/String`)
    fn find_class(&self, name: &str) -> AbiResult<ClassRef>;

    /// Class of an object
    fn get_object_class(&self, obj: ObjectRef) -> AbiResult<ClassRef>;

    /// Superclass, `None` for the root class
    fn get_superclass(&self, class: ClassRef) -> AbiResult<Option<ClassRef>>;

    /// Whether `obj` is an instance of `class` or one of its subclasses
    fn is_instance_of(&self, obj: ObjectRef, class: ClassRef) -> AbiResult<bool>;

    /// Internal name of a class
    fn class_name(&self, class: ClassRef) -> AbiResult<String>;

    // ========================================================================
    // Methods
    // ========================================================================

    /// Resolve an instance method, searching superclasses
    fn get_method_id(&self, class: ClassRef, name: &str, descriptor: &str)
        -> AbiResult<MethodId>;

    /// Resolve a static method declared on `class`
    fn get_static_method_id(
        &self,
        class: ClassRef,
        name: &str,
        descriptor: &str,
    ) -> AbiResult<MethodId>;

    /// Call an instance method (synchronous; may reenter native code)
    fn call_method(&self, obj: ObjectRef, method: MethodId, args: &[JValue]) -> AbiResult<JValue>;

    /// Call a static method
    fn call_static_method(
        &self,
        class: ClassRef,
        method: MethodId,
        args: &[JValue],
    ) -> AbiResult<JValue>;

    // ========================================================================
    // References
    // ========================================================================

    /// Create a global reference that keeps `obj` alive until deleted
    fn new_global_ref(&self, obj: ObjectRef) -> AbiResult<ObjectRef>;

    /// Delete a global reference
    fn delete_global_ref(&self, obj: ObjectRef);

    /// Create a local reference in the current frame
    fn new_local_ref(&self, obj: ObjectRef) -> AbiResult<ObjectRef>;

    /// Delete a local reference
    fn delete_local_ref(&self, obj: ObjectRef);

    /// Open a local reference frame
    fn push_local_frame(&self, capacity: usize) -> AbiResult<()>;

    /// Close the innermost frame, deleting its local references.
    ///
    /// `result` survives as a new local reference in the enclosing frame.
    fn pop_local_frame(&self, result: Option<ObjectRef>) -> AbiResult<Option<ObjectRef>>;

    /// Identity comparison, independent of reference kind
    fn is_same_object(&self, a: Option<ObjectRef>, b: Option<ObjectRef>) -> bool;

    // ========================================================================
    // Strings and arrays
    // ========================================================================

    /// Allocate a `java/lang/String`
    fn new_string_utf(&self, s: &str) -> AbiResult<ObjectRef>;

    /// Read a `java/lang/String`
    fn get_string_utf_chars(&self, s: ObjectRef) -> AbiResult<String>;

    /// Allocate an object array filled with `init`
    fn new_object_array(
        &self,
        len: usize,
        element_class: ClassRef,
        init: Option<ObjectRef>,
    ) -> AbiResult<ObjectRef>;

    /// Length of an array
    fn get_array_length(&self, array: ObjectRef) -> AbiResult<usize>;

    /// Read an element of an object array
    fn get_object_array_element(&self, array: ObjectRef, index: usize)
        -> AbiResult<Option<ObjectRef>>;

    /// Store an element of an object array
    fn set_object_array_element(
        &self,
        array: ObjectRef,
        index: usize,
        value: Option<ObjectRef>,
    ) -> AbiResult<()>;

    // ========================================================================
    // Exceptions
    // ========================================================================

    /// Make `throwable` the pending exception
    fn throw(&self, throwable: ObjectRef) -> AbiResult<()>;

    /// Construct an instance of `class` with `message` and make it pending
    fn throw_new(&self, class: ClassRef, message: &str) -> AbiResult<()>;

    /// Whether an exception is pending
    fn exception_check(&self) -> bool;

    /// The pending exception as a new local reference
    fn exception_occurred(&self) -> Option<ObjectRef>;

    /// Clear the pending exception
    fn exception_clear(&self);

    /// Report an unrecoverable embedding failure. Does not return.
    fn fatal_error(&self, message: &str) -> !;
}

//! Opaque handles handed out by the managed runtime
//!
//! Handles carry no ownership. Whether an `ObjectRef` is a local or a global
//! reference is decided by how it was created; releasing it is the holder's
//! job (see `JniEnv::delete_local_ref` / `JniEnv::delete_global_ref`).

use std::fmt;
use std::num::NonZeroU64;

/// Reference to one object in the managed heap.
///
/// The null jobject is `Option<ObjectRef>::None`, so the handle itself is
/// never zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectRef(NonZeroU64);

impl ObjectRef {
    /// Wrap raw handle bits. Returns `None` for the null handle.
    #[inline]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(bits) => Some(Self(bits)),
            None => None,
        }
    }

    /// Raw handle bits, suitable for passing through C or a `long` slot
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:#x})", self.0)
    }
}

/// Raw bits of a nullable reference (0 for null)
#[inline]
pub fn raw_or_null(obj: Option<ObjectRef>) -> u64 {
    obj.map_or(0, ObjectRef::as_raw)
}

/// Reference to a loaded class.
///
/// Class handles stay valid for the lifetime of the runtime that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ClassRef(u32);

impl ClassRef {
    /// Create from a class table index
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Class table index
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Resolved method identifier.
///
/// Like a class handle, a method id is valid as long as the runtime is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId {
    class: ClassRef,
    slot: u32,
}

impl MethodId {
    /// Create from the declaring class and its method slot
    #[inline]
    pub const fn new(class: ClassRef, slot: u32) -> Self {
        Self { class, slot }
    }

    /// Declaring class
    #[inline]
    pub const fn class(self) -> ClassRef {
        self.class
    }

    /// Slot within the declaring class's method table
    #[inline]
    pub const fn slot(self) -> u32 {
        self.slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle_is_none() {
        assert!(ObjectRef::from_raw(0).is_none());
        let obj = ObjectRef::from_raw(0x2a).unwrap();
        assert_eq!(obj.as_raw(), 0x2a);
        assert_eq!(raw_or_null(Some(obj)), 0x2a);
        assert_eq!(raw_or_null(None), 0);
    }

    #[test]
    fn test_option_object_ref_is_pointer_sized() {
        assert_eq!(
            std::mem::size_of::<Option<ObjectRef>>(),
            std::mem::size_of::<u64>()
        );
    }
}

//! Managed heap, reference tables and mark-sweep collection
//!
//! Objects are addressed internally by `ObjId`. Native code only ever sees
//! reference handles (`ObjectRef`), each mapping to one object and owned
//! either globally or by one thread's environment. Handles are never reused,
//! so a deleted handle stays invalid.

use jbridge_sdk::{AbiError, AbiResult, ClassRef, JValue, ObjectRef};
use rustc_hash::{FxHashMap, FxHashSet};

/// Internal object address
pub(crate) type ObjId = u64;

/// Identifier of one attached thread's environment
pub(crate) type EnvId = u64;

/// A field value as stored on the heap
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum HeapValue {
    /// Primitive (never `JValue::Object`)
    Prim(JValue),
    /// Reference to another heap object
    Ref(Option<ObjId>),
}

/// Object payload
#[derive(Debug, Clone)]
pub(crate) enum ObjectData {
    /// Instance of a user class with named fields
    Plain(FxHashMap<String, HeapValue>),
    /// `java/lang/String`
    Str(String),
    /// Boxed primitive (`java/lang/Integer`, ...)
    Boxed(JValue),
    /// Object array
    Array(Vec<Option<ObjId>>),
    /// `java/lang/Throwable` and subclasses
    Throwable { message: Option<String> },
}

#[derive(Debug, Clone)]
pub(crate) struct HeapObject {
    pub class: ClassRef,
    pub data: ObjectData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefKind {
    Global,
    Local(EnvId),
}

/// Heap statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Live objects
    pub objects: usize,
    /// Live global references
    pub global_refs: usize,
    /// Live local references across all threads
    pub local_refs: usize,
    /// Completed collections
    pub collections: usize,
    /// Objects freed by all collections
    pub objects_freed: usize,
}

#[derive(Default)]
pub(crate) struct Heap {
    objects: FxHashMap<ObjId, HeapObject>,
    refs: FxHashMap<u64, (ObjId, RefKind)>,
    pending: FxHashMap<EnvId, ObjId>,
    next_obj: ObjId,
    next_ref: u64,
    collections: usize,
    objects_freed: usize,
}

impl Heap {
    // Handles start well away from small integers so stray casts are caught
    const FIRST_HANDLE: u64 = 0x1000;

    pub(crate) fn new() -> Self {
        Self {
            next_obj: 1,
            next_ref: Self::FIRST_HANDLE,
            ..Default::default()
        }
    }

    pub(crate) fn alloc(&mut self, class: ClassRef, data: ObjectData) -> ObjId {
        let id = self.next_obj;
        self.next_obj += 1;
        self.objects.insert(id, HeapObject { class, data });
        id
    }

    pub(crate) fn new_ref(&mut self, obj: ObjId, kind: RefKind) -> ObjectRef {
        let raw = self.next_ref;
        self.next_ref += 1;
        self.refs.insert(raw, (obj, kind));
        // next_ref starts above zero and only grows
        ObjectRef::from_raw(raw).unwrap_or_else(|| unreachable!("handle counter wrapped"))
    }

    /// Resolve a handle as seen from `env`
    pub(crate) fn resolve(&self, handle: ObjectRef, env: EnvId) -> AbiResult<ObjId> {
        match self.refs.get(&handle.as_raw()) {
            Some((obj, RefKind::Global)) => Ok(*obj),
            Some((obj, RefKind::Local(owner))) if *owner == env => Ok(*obj),
            _ => Err(AbiError::InvalidReference(handle.as_raw())),
        }
    }

    pub(crate) fn resolve_opt(&self, handle: Option<ObjectRef>, env: EnvId) -> AbiResult<Option<ObjId>> {
        handle.map(|h| self.resolve(h, env)).transpose()
    }

    /// Remove a handle of the given kind; returns whether it existed
    pub(crate) fn delete_ref(&mut self, handle: ObjectRef, kind: RefKind) -> bool {
        match self.refs.get(&handle.as_raw()) {
            Some((_, k)) if *k == kind => {
                self.refs.remove(&handle.as_raw());
                true
            }
            _ => false,
        }
    }

    pub(crate) fn get(&self, obj: ObjId) -> AbiResult<&HeapObject> {
        self.objects
            .get(&obj)
            .ok_or_else(|| AbiError::Other(format!("dangling object #{}", obj)))
    }

    pub(crate) fn get_mut(&mut self, obj: ObjId) -> AbiResult<&mut HeapObject> {
        self.objects
            .get_mut(&obj)
            .ok_or_else(|| AbiError::Other(format!("dangling object #{}", obj)))
    }

    pub(crate) fn pending(&self, env: EnvId) -> Option<ObjId> {
        self.pending.get(&env).copied()
    }

    pub(crate) fn set_pending(&mut self, env: EnvId, obj: ObjId) {
        self.pending.insert(env, obj);
    }

    pub(crate) fn clear_pending(&mut self, env: EnvId) {
        self.pending.remove(&env);
    }

    /// Drop every local reference and pending exception owned by `env`
    pub(crate) fn release_env(&mut self, env: EnvId) -> usize {
        let before = self.refs.len();
        self.refs.retain(|_, (_, kind)| *kind != RefKind::Local(env));
        self.pending.remove(&env);
        before - self.refs.len()
    }

    /// Mark from all references and pending exceptions, sweep the rest
    pub(crate) fn collect(&mut self) -> usize {
        let mut marked: FxHashSet<ObjId> = FxHashSet::default();
        let mut stack: Vec<ObjId> = self
            .refs
            .values()
            .map(|(obj, _)| *obj)
            .chain(self.pending.values().copied())
            .collect();

        while let Some(obj) = stack.pop() {
            if !marked.insert(obj) {
                continue;
            }
            match self.objects.get(&obj).map(|o| &o.data) {
                Some(ObjectData::Plain(fields)) => {
                    stack.extend(fields.values().filter_map(|v| match v {
                        HeapValue::Ref(r) => *r,
                        HeapValue::Prim(_) => None,
                    }));
                }
                Some(ObjectData::Array(items)) => stack.extend(items.iter().flatten().copied()),
                _ => {}
            }
        }

        let before = self.objects.len();
        self.objects.retain(|id, _| marked.contains(id));
        let freed = before - self.objects.len();
        self.collections += 1;
        self.objects_freed += freed;
        freed
    }

    pub(crate) fn stats(&self) -> HeapStats {
        let global_refs = self
            .refs
            .values()
            .filter(|(_, kind)| *kind == RefKind::Global)
            .count();
        HeapStats {
            objects: self.objects.len(),
            global_refs,
            local_refs: self.refs.len() - global_refs,
            collections: self.collections,
            objects_freed: self.objects_freed,
        }
    }
}

//! Per-thread execution context
//!
//! An `Env` belongs to one attached thread. Local references it creates are
//! tracked in a stack of frames; every managed method call runs in its own
//! frame so callee locals never leak into the caller.

use std::cell::RefCell;

use jbridge_sdk::{
    AbiError, AbiResult, ClassRef, JValue, JavaType, JniEnv, MethodId, ObjectRef,
};
use rustc_hash::FxHashMap;

use crate::class::Method;
use crate::heap::{EnvId, HeapObject, HeapValue, ObjId, ObjectData, RefKind};
use crate::vm::Vm;

/// Execution context of one attached thread
pub struct Env {
    id: EnvId,
    vm: Vm,
    frames: RefCell<Vec<Vec<ObjectRef>>>,
}

impl Env {
    pub(crate) fn new(vm: Vm, id: EnvId) -> Self {
        Self {
            id,
            vm,
            frames: RefCell::new(vec![Vec::new()]),
        }
    }

    pub(crate) fn id(&self) -> EnvId {
        self.id
    }

    /// The runtime this context belongs to
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// Current local frame depth (1 = no frames pushed)
    pub fn frame_depth(&self) -> usize {
        self.frames.borrow().len()
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Fail if an exception is pending
    fn guard(&self) -> AbiResult<()> {
        if self.exception_check() {
            Err(AbiError::ExceptionPending)
        } else {
            Ok(())
        }
    }

    /// Register a new local reference for `obj` in the top frame
    fn local(&self, obj: ObjId) -> ObjectRef {
        let handle = self.vm.inner().heap.lock().new_ref(obj, RefKind::Local(self.id));
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            frame.push(handle);
        }
        handle
    }

    fn resolve(&self, handle: ObjectRef) -> AbiResult<ObjId> {
        self.vm.inner().heap.lock().resolve(handle, self.id)
    }

    /// Run `f` against the object behind `handle`
    pub(crate) fn read<R>(&self, handle: ObjectRef, f: impl FnOnce(&HeapObject) -> R) -> AbiResult<R> {
        let heap = self.vm.inner().heap.lock();
        let obj = heap.resolve(handle, self.id)?;
        Ok(f(heap.get(obj)?))
    }

    fn alloc(&self, class: ClassRef, data: ObjectData) -> ObjectRef {
        let obj = self.vm.inner().heap.lock().alloc(class, data);
        self.local(obj)
    }

    fn is_subclass(&self, class: ClassRef, ancestor: ClassRef) -> bool {
        self.vm.inner().classes.read().is_subclass(class, ancestor)
    }

    fn to_heap_value(&self, value: JValue) -> AbiResult<HeapValue> {
        Ok(match value {
            JValue::Object(handle) => {
                HeapValue::Ref(self.vm.inner().heap.lock().resolve_opt(handle, self.id)?)
            }
            prim => HeapValue::Prim(prim),
        })
    }

    fn from_heap_value(&self, value: HeapValue) -> JValue {
        match value {
            HeapValue::Prim(prim) => prim,
            HeapValue::Ref(obj) => JValue::Object(obj.map(|o| self.local(o))),
        }
    }

    /// Validate reference arguments before they reach a method body
    fn check_handles(&self, args: &[JValue]) -> AbiResult<()> {
        let heap = self.vm.inner().heap.lock();
        for arg in args {
            if let JValue::Object(handle) = arg {
                heap.resolve_opt(*handle, self.id)?;
            }
        }
        Ok(())
    }

    /// Call a method body inside its own local frame
    fn invoke(&self, method: &Method, this: Option<ObjectRef>, args: &[JValue]) -> AbiResult<JValue> {
        method.signature.check_args(&method.name, args)?;
        self.check_handles(args)?;
        self.push_local_frame(0)?;
        let ret = (method.body)(self, this, args);

        if self.exception_check() {
            self.pop_local_frame(None)?;
            return Ok(zero_value(&method.signature.ret));
        }
        if !method.signature.ret.accepts(&ret) {
            self.pop_local_frame(None)?;
            return Err(AbiError::TypeMismatch {
                expected: method.signature.ret.to_string(),
                got: format!("{} from {}", ret.type_name(), method.name),
            });
        }
        match ret {
            JValue::Object(handle) => Ok(JValue::Object(self.pop_local_frame(handle)?)),
            other => {
                self.pop_local_frame(None)?;
                Ok(other)
            }
        }
    }

    // ========================================================================
    // Host helpers (not part of the embedding API)
    // ========================================================================

    /// Allocate an instance of a plain class
    pub fn new_object(&self, class: ClassRef) -> AbiResult<ObjectRef> {
        self.guard()?;
        self.vm.inner().classes.read().get(class)?;
        Ok(self.alloc(class, ObjectData::Plain(FxHashMap::default())))
    }

    /// Store a named field on a plain object
    pub fn set_field(&self, obj: ObjectRef, name: &str, value: JValue) -> AbiResult<()> {
        let stored = self.to_heap_value(value)?;
        let mut heap = self.vm.inner().heap.lock();
        let id = heap.resolve(obj, self.id)?;
        match &mut heap.get_mut(id)?.data {
            ObjectData::Plain(fields) => {
                fields.insert(name.to_string(), stored);
                Ok(())
            }
            _ => Err(AbiError::TypeMismatch {
                expected: "plain object".to_string(),
                got: "built-in object".to_string(),
            }),
        }
    }

    /// Read a named field; unset fields read as null
    pub fn get_field(&self, obj: ObjectRef, name: &str) -> AbiResult<JValue> {
        let stored = self.read(obj, |o| match &o.data {
            ObjectData::Plain(fields) => Ok(fields.get(name).copied()),
            _ => Err(AbiError::TypeMismatch {
                expected: "plain object".to_string(),
                got: "built-in object".to_string(),
            }),
        })??;
        Ok(stored.map_or(JValue::null(), |v| self.from_heap_value(v)))
    }

    /// Box a primitive into its wrapper class; references pass through
    pub fn box_value(&self, value: JValue) -> AbiResult<Option<ObjectRef>> {
        self.guard()?;
        let lang = self.vm.lang();
        let class = match value {
            JValue::Object(obj) => return Ok(obj),
            JValue::Void => return Ok(None),
            JValue::Boolean(_) => lang.boolean,
            JValue::Byte(_) => lang.byte,
            JValue::Char(_) => lang.character,
            JValue::Short(_) => lang.short,
            JValue::Int(_) => lang.integer,
            JValue::Long(_) => lang.long,
            JValue::Float(_) => lang.float,
            JValue::Double(_) => lang.double,
        };
        Ok(Some(self.alloc(class, ObjectData::Boxed(value))))
    }

    /// Primitive inside a wrapper object
    pub fn unbox(&self, obj: ObjectRef) -> AbiResult<JValue> {
        self.read(obj, |o| match o.data {
            ObjectData::Boxed(v) => Ok(v),
            _ => Err(AbiError::TypeMismatch {
                expected: "boxed primitive".to_string(),
                got: "object".to_string(),
            }),
        })?
    }

    /// Throw a new instance of the named class and return `JValue::Void`.
    ///
    /// Convenience for method bodies: `return env.throw_by_name(..)`.
    pub fn throw_by_name(&self, class: &str, message: &str) -> JValue {
        // find_class refuses to run with an exception pending; this replaces it
        let found = self.vm.inner().classes.read().find(class);
        let thrown = found.and_then(|class| self.throw_new(class, message));
        if let Err(e) = thrown {
            self.fatal_error(&format!("cannot throw {}: {}", class, e));
        }
        JValue::Void
    }

    /// Throw the exception best matching a boundary error
    pub fn throw_abi_error(&self, error: &AbiError) -> JValue {
        let class = match error {
            AbiError::NullReference(_) => "java/lang/NullPointerException",
            AbiError::TypeMismatch { .. } => "java/lang/ClassCastException",
            AbiError::IndexOutOfBounds { .. } => "java/lang/ArrayIndexOutOfBoundsException",
            AbiError::ArgumentMismatch { .. } => "java/lang/IllegalArgumentException",
            _ => "java/lang/RuntimeException",
        };
        self.throw_by_name(class, &error.to_string())
    }
}

/// Value returned to the caller when the callee threw
fn zero_value(ty: &JavaType) -> JValue {
    match ty {
        JavaType::Boolean => JValue::Boolean(false),
        JavaType::Byte => JValue::Byte(0),
        JavaType::Char => JValue::Char(0),
        JavaType::Short => JValue::Short(0),
        JavaType::Int => JValue::Int(0),
        JavaType::Long => JValue::Long(0),
        JavaType::Float => JValue::Float(0.0),
        JavaType::Double => JValue::Double(0.0),
        JavaType::Void => JValue::Void,
        JavaType::Object(_) | JavaType::Array(_) => JValue::null(),
    }
}

impl JniEnv for Env {
    fn find_class(&self, name: &str) -> AbiResult<ClassRef> {
        self.guard()?;
        self.vm.inner().classes.read().find(name)
    }

    fn get_object_class(&self, obj: ObjectRef) -> AbiResult<ClassRef> {
        self.guard()?;
        self.read(obj, |o| o.class)
    }

    fn get_superclass(&self, class: ClassRef) -> AbiResult<Option<ClassRef>> {
        self.guard()?;
        Ok(self.vm.inner().classes.read().get(class)?.super_class)
    }

    fn is_instance_of(&self, obj: ObjectRef, class: ClassRef) -> AbiResult<bool> {
        self.guard()?;
        let obj_class = self.read(obj, |o| o.class)?;
        Ok(self.is_subclass(obj_class, class))
    }

    fn class_name(&self, class: ClassRef) -> AbiResult<String> {
        Ok(self.vm.inner().classes.read().get(class)?.name.clone())
    }

    fn get_method_id(&self, class: ClassRef, name: &str, descriptor: &str) -> AbiResult<MethodId> {
        self.guard()?;
        self.vm.inner().classes.read().lookup(class, name, descriptor, false)
    }

    fn get_static_method_id(
        &self,
        class: ClassRef,
        name: &str,
        descriptor: &str,
    ) -> AbiResult<MethodId> {
        self.guard()?;
        self.vm.inner().classes.read().lookup(class, name, descriptor, true)
    }

    fn call_method(&self, obj: ObjectRef, method: MethodId, args: &[JValue]) -> AbiResult<JValue> {
        self.guard()?;
        let receiver = self.read(obj, |o| o.class)?;
        let target = {
            let classes = self.vm.inner().classes.read();
            if !classes.is_subclass(receiver, method.class()) {
                return Err(AbiError::TypeMismatch {
                    expected: classes.get(method.class())?.name.clone(),
                    got: classes.get(receiver)?.name.clone(),
                });
            }
            let resolved = classes.dispatch(receiver, method)?;
            classes.method(resolved)?.clone()
        };
        if target.is_static {
            return Err(AbiError::ArgumentMismatch {
                method: target.name,
                reason: "static method called on an instance".to_string(),
            });
        }
        self.invoke(&target, Some(obj), args)
    }

    fn call_static_method(
        &self,
        class: ClassRef,
        method: MethodId,
        args: &[JValue],
    ) -> AbiResult<JValue> {
        self.guard()?;
        let target = {
            let classes = self.vm.inner().classes.read();
            if method.class() != class {
                return Err(AbiError::ArgumentMismatch {
                    method: classes.method(method)?.name.clone(),
                    reason: "method not declared on the given class".to_string(),
                });
            }
            classes.method(method)?.clone()
        };
        if !target.is_static {
            return Err(AbiError::ArgumentMismatch {
                method: target.name,
                reason: "instance method called statically".to_string(),
            });
        }
        self.invoke(&target, None, args)
    }

    fn new_global_ref(&self, obj: ObjectRef) -> AbiResult<ObjectRef> {
        self.guard()?;
        let mut heap = self.vm.inner().heap.lock();
        let id = heap.resolve(obj, self.id)?;
        Ok(heap.new_ref(id, RefKind::Global))
    }

    fn delete_global_ref(&self, obj: ObjectRef) {
        if !self.vm.inner().heap.lock().delete_ref(obj, RefKind::Global) {
            log::warn!("delete_global_ref on unknown handle {:?}", obj);
        }
    }

    fn new_local_ref(&self, obj: ObjectRef) -> AbiResult<ObjectRef> {
        self.guard()?;
        let id = self.resolve(obj)?;
        Ok(self.local(id))
    }

    fn delete_local_ref(&self, obj: ObjectRef) {
        self.vm.inner().heap.lock().delete_ref(obj, RefKind::Local(self.id));
    }

    fn push_local_frame(&self, capacity: usize) -> AbiResult<()> {
        self.guard()?;
        self.frames.borrow_mut().push(Vec::with_capacity(capacity));
        Ok(())
    }

    fn pop_local_frame(&self, result: Option<ObjectRef>) -> AbiResult<Option<ObjectRef>> {
        let kept = result.map(|h| self.resolve(h));
        let frame = {
            let mut frames = self.frames.borrow_mut();
            if frames.len() <= 1 {
                return Err(AbiError::NoLocalFrame);
            }
            frames.pop().unwrap_or_default()
        };
        {
            let mut heap = self.vm.inner().heap.lock();
            for handle in frame {
                heap.delete_ref(handle, RefKind::Local(self.id));
            }
        }
        match kept {
            Some(obj) => Ok(Some(self.local(obj?))),
            None => Ok(None),
        }
    }

    fn is_same_object(&self, a: Option<ObjectRef>, b: Option<ObjectRef>) -> bool {
        let heap = self.vm.inner().heap.lock();
        match (heap.resolve_opt(a, self.id), heap.resolve_opt(b, self.id)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn new_string_utf(&self, s: &str) -> AbiResult<ObjectRef> {
        self.guard()?;
        Ok(self.alloc(self.vm.lang().string, ObjectData::Str(s.to_string())))
    }

    fn get_string_utf_chars(&self, s: ObjectRef) -> AbiResult<String> {
        self.guard()?;
        self.read(s, |o| match &o.data {
            ObjectData::Str(text) => Ok(text.clone()),
            _ => Err(AbiError::TypeMismatch {
                expected: "java/lang/String".to_string(),
                got: "object".to_string(),
            }),
        })?
    }

    fn new_object_array(
        &self,
        len: usize,
        element_class: ClassRef,
        init: Option<ObjectRef>,
    ) -> AbiResult<ObjectRef> {
        self.guard()?;
        self.vm.inner().classes.read().get(element_class)?;
        let init = self.vm.inner().heap.lock().resolve_opt(init, self.id)?;
        Ok(self.alloc(self.vm.lang().object_array, ObjectData::Array(vec![init; len])))
    }

    fn get_array_length(&self, array: ObjectRef) -> AbiResult<usize> {
        self.guard()?;
        self.read(array, |o| match &o.data {
            ObjectData::Array(items) => Ok(items.len()),
            _ => Err(not_an_array()),
        })?
    }

    fn get_object_array_element(
        &self,
        array: ObjectRef,
        index: usize,
    ) -> AbiResult<Option<ObjectRef>> {
        self.guard()?;
        let element = self.read(array, |o| match &o.data {
            ObjectData::Array(items) => items
                .get(index)
                .copied()
                .ok_or(AbiError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                }),
            _ => Err(not_an_array()),
        })??;
        Ok(element.map(|obj| self.local(obj)))
    }

    fn set_object_array_element(
        &self,
        array: ObjectRef,
        index: usize,
        value: Option<ObjectRef>,
    ) -> AbiResult<()> {
        self.guard()?;
        let mut heap = self.vm.inner().heap.lock();
        let value = heap.resolve_opt(value, self.id)?;
        let id = heap.resolve(array, self.id)?;
        match &mut heap.get_mut(id)?.data {
            ObjectData::Array(items) => {
                let len = items.len();
                let slot = items
                    .get_mut(index)
                    .ok_or(AbiError::IndexOutOfBounds { index, len })?;
                *slot = value;
                Ok(())
            }
            _ => Err(not_an_array()),
        }
    }

    fn throw(&self, throwable: ObjectRef) -> AbiResult<()> {
        let class = self.read(throwable, |o| o.class)?;
        if !self.is_subclass(class, self.vm.lang().throwable) {
            return Err(AbiError::TypeMismatch {
                expected: "java/lang/Throwable".to_string(),
                got: self.class_name(class)?,
            });
        }
        let id = self.resolve(throwable)?;
        self.vm.inner().heap.lock().set_pending(self.id, id);
        Ok(())
    }

    fn throw_new(&self, class: ClassRef, message: &str) -> AbiResult<()> {
        if !self.is_subclass(class, self.vm.lang().throwable) {
            return Err(AbiError::TypeMismatch {
                expected: "java/lang/Throwable".to_string(),
                got: self.class_name(class)?,
            });
        }
        let mut heap = self.vm.inner().heap.lock();
        let id = heap.alloc(
            class,
            ObjectData::Throwable {
                message: Some(message.to_string()),
            },
        );
        heap.set_pending(self.id, id);
        Ok(())
    }

    fn exception_check(&self) -> bool {
        self.vm.inner().heap.lock().pending(self.id).is_some()
    }

    fn exception_occurred(&self) -> Option<ObjectRef> {
        let pending = self.vm.inner().heap.lock().pending(self.id);
        pending.map(|obj| self.local(obj))
    }

    fn exception_clear(&self) {
        self.vm.inner().heap.lock().clear_pending(self.id);
    }

    fn fatal_error(&self, message: &str) -> ! {
        log::error!("fatal error in managed runtime: {}", message);
        panic!("fatal error in managed runtime: {}", message);
    }
}

fn not_an_array() -> AbiError {
    AbiError::TypeMismatch {
        expected: "array".to_string(),
        got: "object".to_string(),
    }
}

//! Class table and method resolution
//!
//! Classes are registered once and never unloaded, so `ClassRef` and
//! `MethodId` handles stay valid for the life of the runtime.

use std::fmt;
use std::sync::Arc;

use jbridge_sdk::{AbiError, AbiResult, ClassRef, JValue, MethodDescriptor, MethodId, ObjectRef};
use rustc_hash::FxHashMap;

use crate::env::Env;

/// Implementation of a managed method.
///
/// Receives the calling thread's environment, the receiver (`None` for static
/// methods) and descriptor-checked arguments. To throw, call
/// `env.throw_new(..)` and return any value; the runtime discards the result
/// while an exception is pending.
pub type MethodBody = Arc<dyn Fn(&Env, Option<ObjectRef>, &[JValue]) -> JValue + Send + Sync>;

/// Method definition
#[derive(Clone)]
pub struct Method {
    /// Method name
    pub name: String,
    /// Descriptor text (`(II)I`)
    pub descriptor: String,
    /// Parsed descriptor
    pub signature: MethodDescriptor,
    /// Static methods have no receiver
    pub is_static: bool,
    /// Implementation
    pub body: MethodBody,
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("is_static", &self.is_static)
            .finish()
    }
}

impl Method {
    /// Instance method; the body always receives a receiver
    pub fn instance<F>(name: &str, descriptor: &str, body: F) -> AbiResult<Self>
    where
        F: Fn(&Env, ObjectRef, &[JValue]) -> JValue + Send + Sync + 'static,
    {
        Ok(Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: MethodDescriptor::parse(descriptor)?,
            is_static: false,
            body: Arc::new(move |env: &Env, this: Option<ObjectRef>, args: &[JValue]| match this {
                Some(this) => body(env, this, args),
                None => env.throw_by_name("java/lang/NullPointerException", "null receiver"),
            }),
        })
    }

    /// Static method
    pub fn new_static<F>(name: &str, descriptor: &str, body: F) -> AbiResult<Self>
    where
        F: Fn(&Env, &[JValue]) -> JValue + Send + Sync + 'static,
    {
        Ok(Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: MethodDescriptor::parse(descriptor)?,
            is_static: true,
            body: Arc::new(move |env: &Env, _this: Option<ObjectRef>, args: &[JValue]| body(env, args)),
        })
    }
}

/// Class definition
#[derive(Debug, Clone)]
pub struct Class {
    /// Internal name (`java/lang/String`)
    pub name: String,
    /// Superclass, `None` for `java/lang/Object`
    pub super_class: Option<ClassRef>,
    /// Declared methods, indexed by `MethodId::slot`
    pub methods: Vec<Method>,
}

/// All loaded classes
#[derive(Default)]
pub(crate) struct ClassTable {
    classes: Vec<Class>,
    by_name: FxHashMap<String, ClassRef>,
}

impl ClassTable {
    pub(crate) fn register(&mut self, class: Class) -> AbiResult<ClassRef> {
        if self.by_name.contains_key(&class.name) {
            return Err(AbiError::Other(format!("Class already defined: {}", class.name)));
        }
        let class_ref = ClassRef::new(self.classes.len() as u32);
        self.by_name.insert(class.name.clone(), class_ref);
        self.classes.push(class);
        Ok(class_ref)
    }

    pub(crate) fn find(&self, name: &str) -> AbiResult<ClassRef> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| AbiError::ClassNotFound(name.to_string()))
    }

    pub(crate) fn get(&self, class: ClassRef) -> AbiResult<&Class> {
        self.classes
            .get(class.index() as usize)
            .ok_or_else(|| AbiError::ClassNotFound(format!("#{}", class.index())))
    }

    pub(crate) fn method(&self, id: MethodId) -> AbiResult<&Method> {
        let class = self.get(id.class())?;
        class.methods.get(id.slot() as usize).ok_or_else(|| AbiError::MethodNotFound {
            class: class.name.clone(),
            name: format!("#{}", id.slot()),
            descriptor: String::new(),
        })
    }

    /// Whether `class` is `ancestor` or inherits from it
    pub(crate) fn is_subclass(&self, mut class: ClassRef, ancestor: ClassRef) -> bool {
        loop {
            if class == ancestor {
                return true;
            }
            match self.get(class).ok().and_then(|c| c.super_class) {
                Some(parent) => class = parent,
                None => return false,
            }
        }
    }

    /// Look up a method by name and descriptor, walking up the hierarchy
    pub(crate) fn lookup(
        &self,
        start: ClassRef,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> AbiResult<MethodId> {
        let mut current = Some(start);
        while let Some(class_ref) = current {
            let class = self.get(class_ref)?;
            let found = class.methods.iter().position(|m| {
                m.name == name && m.descriptor == descriptor && m.is_static == is_static
            });
            if let Some(slot) = found {
                return Ok(MethodId::new(class_ref, slot as u32));
            }
            // Static methods are not inherited
            if is_static {
                break;
            }
            current = class.super_class;
        }
        Err(AbiError::MethodNotFound {
            class: self.get(start)?.name.clone(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
    }

    /// Most-derived override of `method` for a receiver of class `receiver`
    pub(crate) fn dispatch(&self, receiver: ClassRef, method: MethodId) -> AbiResult<MethodId> {
        let declared = self.method(method)?;
        if declared.is_static {
            return Ok(method);
        }
        let (name, descriptor) = (declared.name.clone(), declared.descriptor.clone());
        self.lookup(receiver, &name, &descriptor, false)
    }

    pub(crate) fn len(&self) -> usize {
        self.classes.len()
    }
}

/// Builder returned by [`Vm::define_class`](crate::Vm::define_class)
pub struct ClassBuilder {
    vm: crate::Vm,
    name: String,
    super_name: Option<String>,
    methods: Vec<Method>,
    error: Option<AbiError>,
}

impl ClassBuilder {
    pub(crate) fn new(vm: crate::Vm, name: &str, super_name: Option<&str>) -> Self {
        Self {
            vm,
            name: name.to_string(),
            super_name: super_name.map(str::to_string),
            methods: Vec::new(),
            error: None,
        }
    }

    fn push(mut self, method: AbiResult<Method>) -> Self {
        match method {
            Ok(method) => self.methods.push(method),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Add an instance method
    pub fn method<F>(self, name: &str, descriptor: &str, body: F) -> Self
    where
        F: Fn(&Env, ObjectRef, &[JValue]) -> JValue + Send + Sync + 'static,
    {
        self.push(Method::instance(name, descriptor, body))
    }

    /// Add a static method
    pub fn static_method<F>(self, name: &str, descriptor: &str, body: F) -> Self
    where
        F: Fn(&Env, &[JValue]) -> JValue + Send + Sync + 'static,
    {
        self.push(Method::new_static(name, descriptor, body))
    }

    /// Register the class
    pub fn build(self) -> AbiResult<ClassRef> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut classes = self.vm.inner().classes.write();
        let super_class = match self.super_name.as_deref() {
            Some(name) => Some(classes.find(name)?),
            None => None,
        };
        let class_ref = classes.register(Class {
            name: self.name,
            super_class,
            methods: self.methods,
        })?;
        log::debug!("defined class #{}", class_ref.index());
        Ok(class_ref)
    }
}

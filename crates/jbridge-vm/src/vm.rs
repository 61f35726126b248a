//! Runtime handle and thread attachment
//!
//! A `Vm` is cheap to clone; all clones share one heap and class table.
//! Each thread attaches at most once per runtime and gets its own `Env`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use jbridge_sdk::{AbiError, AbiResult, JavaVm, JniEnv};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::class::{ClassBuilder, ClassTable};
use crate::env::Env;
use crate::heap::{Heap, HeapStats};
use crate::lang::{self, Lang};

thread_local! {
    /// Environments of the current thread, keyed by runtime id
    static ENVS: RefCell<FxHashMap<u64, Rc<Env>>> = RefCell::new(FxHashMap::default());
}

pub(crate) struct VmInner {
    pub(crate) id: u64,
    pub(crate) heap: Mutex<Heap>,
    pub(crate) classes: RwLock<ClassTable>,
    pub(crate) lang: Lang,
    attached: AtomicUsize,
    next_env: AtomicU64,
}

/// In-process managed runtime
#[derive(Clone)]
pub struct Vm {
    inner: Arc<VmInner>,
}

impl Vm {
    /// Create a runtime with the `java/lang` core classes loaded
    pub fn new() -> AbiResult<Self> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        let mut classes = ClassTable::default();
        let lang = lang::bootstrap(&mut classes)?;
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!("runtime {} booted with {} classes", id, classes.len());

        Ok(Self {
            inner: Arc::new(VmInner {
                id,
                heap: Mutex::new(Heap::new()),
                classes: RwLock::new(classes),
                lang,
                attached: AtomicUsize::new(0),
                next_env: AtomicU64::new(1),
            }),
        })
    }

    pub(crate) fn inner(&self) -> &VmInner {
        &self.inner
    }

    pub(crate) fn lang(&self) -> &Lang {
        &self.inner.lang
    }

    /// Unique id of this runtime within the process
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Start defining a class; `superclass` defaults to `java/lang/Object`
    pub fn define_class(&self, name: &str, superclass: Option<&str>) -> ClassBuilder {
        ClassBuilder::new(self.clone(), name, Some(superclass.unwrap_or("java/lang/Object")))
    }

    /// The calling thread's concrete environment, if attached
    pub fn env(&self) -> Option<Rc<Env>> {
        ENVS.try_with(|envs| envs.borrow().get(&self.inner.id).cloned())
            .ok()
            .flatten()
    }

    /// Attach the calling thread and return its concrete environment
    pub fn attach(&self) -> AbiResult<Rc<Env>> {
        if let Some(env) = self.env() {
            return Ok(env);
        }
        let env_id = self.inner.next_env.fetch_add(1, Ordering::Relaxed);
        let env = Rc::new(Env::new(self.clone(), env_id));
        ENVS.try_with(|envs| envs.borrow_mut().insert(self.inner.id, env.clone()))
            .map_err(|_| AbiError::Other("thread is shutting down".to_string()))?;
        let attached = self.inner.attached.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!(
            "runtime {}: attached env {} ({} threads attached)",
            self.inner.id,
            env_id,
            attached
        );
        Ok(env)
    }

    /// Run a full collection, returning the number of objects freed
    pub fn collect(&self) -> usize {
        let freed = self.inner.heap.lock().collect();
        log::debug!("runtime {}: collected {} objects", self.inner.id, freed);
        freed
    }

    /// Heap and reference counters
    pub fn stats(&self) -> HeapStats {
        self.inner.heap.lock().stats()
    }

    /// Number of currently attached threads
    pub fn attached_threads(&self) -> usize {
        self.inner.attached.load(Ordering::Acquire)
    }
}

impl JavaVm for Vm {
    fn get_env(&self) -> Option<Rc<dyn JniEnv>> {
        self.env().map(|env| env as Rc<dyn JniEnv>)
    }

    fn attach_current_thread(&self) -> AbiResult<Rc<dyn JniEnv>> {
        Ok(self.attach()? as Rc<dyn JniEnv>)
    }

    fn detach_current_thread(&self) -> AbiResult<()> {
        let env = ENVS
            .try_with(|envs| envs.borrow_mut().remove(&self.inner.id))
            .ok()
            .flatten()
            .ok_or(AbiError::NotAttached)?;
        let released = self.inner.heap.lock().release_env(env.id());
        self.inner.attached.fetch_sub(1, Ordering::AcqRel);
        log::debug!(
            "runtime {}: detached env {}, released {} local refs",
            self.inner.id,
            env.id(),
            released
        );
        Ok(())
    }
}

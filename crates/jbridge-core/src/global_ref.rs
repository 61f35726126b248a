//! Pinned peer references

use std::fmt;
use std::sync::Arc;

use jbridge_sdk::{AbiResult, JavaVm, JniEnv, ObjectRef};

/// Owning global reference.
///
/// Keeps the referenced object alive until dropped; the drop deletes the
/// global reference exactly once. Release is best effort: when no execution
/// context can be obtained (process teardown, thread-local storage already
/// gone) the failure is logged and the reference is leaked.
pub struct GlobalRef {
    obj: ObjectRef,
    vm: Arc<dyn JavaVm>,
}

impl GlobalRef {
    /// Pin the object behind `local`
    pub fn new(vm: &Arc<dyn JavaVm>, env: &dyn JniEnv, local: ObjectRef) -> AbiResult<Self> {
        let obj = env.new_global_ref(local)?;
        Ok(Self {
            obj,
            vm: vm.clone(),
        })
    }

    /// The global handle, valid on every thread
    pub fn as_obj(&self) -> ObjectRef {
        self.obj
    }
}

impl fmt::Debug for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobalRef").field(&self.obj).finish()
    }
}

impl Drop for GlobalRef {
    fn drop(&mut self) {
        if let Some(env) = self.vm.get_env() {
            env.delete_global_ref(self.obj);
            return;
        }
        match self.vm.attach_current_thread() {
            Ok(env) => {
                env.delete_global_ref(self.obj);
                drop(env);
                if let Err(e) = self.vm.detach_current_thread() {
                    log::warn!("failed to detach after releasing {:?}: {}", self.obj, e);
                }
            }
            Err(e) => log::warn!("leaking global reference {:?}: {}", self.obj, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbridge_vm::Vm;

    #[test]
    fn test_drop_releases_on_attached_thread() {
        let vm = Vm::new().unwrap();
        let shared: Arc<dyn JavaVm> = Arc::new(vm.clone());
        let env = vm.attach().unwrap();
        let local = env.new_string_utf("peer").unwrap();

        let pinned = GlobalRef::new(&shared, &*env, local).unwrap();
        env.delete_local_ref(local);
        assert_eq!(vm.stats().global_refs, 1);
        assert_eq!(vm.collect(), 0);

        drop(pinned);
        assert_eq!(vm.stats().global_refs, 0);
        assert_eq!(vm.collect(), 1);
    }

    #[test]
    fn test_drop_on_unattached_thread_attaches_temporarily() {
        let vm = Vm::new().unwrap();
        let shared: Arc<dyn JavaVm> = Arc::new(vm.clone());
        let env = vm.attach().unwrap();
        let local = env.new_string_utf("peer").unwrap();
        let pinned = GlobalRef::new(&shared, &*env, local).unwrap();

        std::thread::spawn(move || drop(pinned)).join().unwrap();
        assert_eq!(vm.stats().global_refs, 0);
        assert_eq!(vm.attached_threads(), 1);
    }
}

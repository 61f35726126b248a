//! Thread attachment and local reference frames

use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;

use jbridge_sdk::{AbiResult, JavaVm, JniEnv, ObjectRef};

use crate::error::ProxyResult;
use crate::runtime::RuntimeHandle;

/// Execution context of the calling thread for the duration of one operation.
///
/// If the thread was not attached, the guard attaches it and (depending on
/// `detach-attached-threads`) detaches it again on drop. A thread that was
/// already attached, for instance because the operation is a callback from
/// managed code, is left as it was.
pub struct AttachGuard {
    env: Rc<dyn JniEnv>,
    vm: Arc<dyn JavaVm>,
    detach: bool,
}

impl AttachGuard {
    pub(crate) fn new(runtime: &RuntimeHandle) -> ProxyResult<Self> {
        let vm = runtime.vm().clone();
        if let Some(env) = vm.get_env() {
            return Ok(Self {
                env,
                vm,
                detach: false,
            });
        }
        let env = vm.attach_current_thread()?;
        log::debug!("attached thread {:?}", std::thread::current().id());
        Ok(Self {
            env,
            vm,
            detach: runtime.config().detach_attached_threads,
        })
    }

    /// The execution context
    pub fn env(&self) -> &dyn JniEnv {
        &*self.env
    }

    /// Whether this guard attached the thread
    pub fn attached_here(&self) -> bool {
        self.detach
    }
}

impl Deref for AttachGuard {
    type Target = dyn JniEnv;

    fn deref(&self) -> &Self::Target {
        &*self.env
    }
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        if !self.detach {
            return;
        }
        match self.vm.detach_current_thread() {
            Ok(()) => log::debug!("detached thread {:?}", std::thread::current().id()),
            Err(e) => log::warn!("failed to detach thread: {}", e),
        }
    }
}

/// Local reference frame popped on every exit path
pub struct LocalFrame<'a> {
    env: &'a dyn JniEnv,
    active: bool,
}

impl<'a> LocalFrame<'a> {
    /// Push a frame with room for `capacity` references
    pub fn push(env: &'a dyn JniEnv, capacity: usize) -> AbiResult<Self> {
        env.push_local_frame(capacity)?;
        Ok(Self { env, active: true })
    }

    /// Pop the frame, carrying `result` over into the enclosing one
    pub fn pop(mut self, result: Option<ObjectRef>) -> AbiResult<Option<ObjectRef>> {
        self.active = false;
        self.env.pop_local_frame(result)
    }
}

impl Drop for LocalFrame<'_> {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.env.pop_local_frame(None) {
                log::warn!("failed to pop local frame: {}", e);
            }
        }
    }
}

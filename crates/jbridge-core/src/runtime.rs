//! Shared runtime handle
//!
//! The managed runtime's entry point is installed once during module
//! initialization and read by every proxy afterwards. Proxies receive the
//! handle explicitly; the process-wide slot only serves entry points that are
//! called from the managed side without one.

use std::fmt;
use std::sync::Arc;

use jbridge_sdk::JavaVm;
use once_cell::sync::OnceCell;

use crate::attach::AttachGuard;
use crate::config::BridgeConfig;
use crate::error::{ProxyResult, RuntimeError};

static RUNTIME: OnceCell<RuntimeHandle> = OnceCell::new();

/// Entry point of one managed runtime plus the bridge configuration
#[derive(Clone)]
pub struct RuntimeHandle {
    vm: Arc<dyn JavaVm>,
    config: Arc<BridgeConfig>,
}

impl RuntimeHandle {
    /// Bind a runtime with an explicit configuration
    pub fn new(vm: Arc<dyn JavaVm>, config: BridgeConfig) -> Self {
        Self {
            vm,
            config: Arc::new(config),
        }
    }

    /// Bind a runtime with the default configuration
    pub fn with_defaults(vm: Arc<dyn JavaVm>) -> Self {
        Self::new(vm, BridgeConfig::default())
    }

    /// The runtime entry point
    pub fn vm(&self) -> &Arc<dyn JavaVm> {
        &self.vm
    }

    /// Bridge configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Acquire the calling thread's execution context
    pub fn attach(&self) -> ProxyResult<AttachGuard> {
        AttachGuard::new(self)
    }

    /// Whether both handles talk to the same runtime instance
    pub fn same_runtime(&self, other: &RuntimeHandle) -> bool {
        Arc::ptr_eq(&self.vm, &other.vm)
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("vm", &Arc::as_ptr(&self.vm))
            .field("config", &self.config)
            .finish()
    }
}

/// Install the process-wide handle; only the first call succeeds
pub fn install(handle: RuntimeHandle) -> Result<(), RuntimeError> {
    RUNTIME.set(handle).map_err(|_| RuntimeError::AlreadyInstalled)?;
    log::debug!("managed runtime installed");
    Ok(())
}

/// Install `vm` with the default configuration
pub fn set_java_vm(vm: Arc<dyn JavaVm>) -> Result<(), RuntimeError> {
    install(RuntimeHandle::with_defaults(vm))
}

/// The installed handle
pub fn handle() -> Result<&'static RuntimeHandle, RuntimeError> {
    RUNTIME.get().ok_or(RuntimeError::NotInstalled)
}

/// Whether a handle has been installed
pub fn is_installed() -> bool {
    RUNTIME.get().is_some()
}

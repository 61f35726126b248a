//! Bridge configuration (jbridge.toml)
//!
//! Every field has a default, so an empty file is a valid configuration.
//!
//! ```toml
//! exception-class = "java/lang/IllegalStateException"
//! detach-attached-threads = true
//! local-frame-capacity = 16
//! debug = false
//!
//! [peer]
//! signature-method = "methodSignatureForSelector"
//! forward-method = "forwardInvocation"
//! responds-method = "respondsToSelector"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Class raised when no configuration is available
pub const DEFAULT_EXCEPTION_CLASS: &str = "java/lang/RuntimeException";

/// Bridge-wide settings shared by every proxy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BridgeConfig {
    /// Class raised by the exception bridge (internal form, `a/b/C`)
    pub exception_class: String,

    /// Names of the peer protocol methods
    pub peer: PeerProtocol,

    /// Detach threads the bridge attached once the operation that attached
    /// them is finished
    pub detach_attached_threads: bool,

    /// Capacity hint for the local frame around each boundary operation
    pub local_frame_capacity: usize,

    /// Log every forwarded selector at info level instead of trace
    pub debug: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            exception_class: DEFAULT_EXCEPTION_CLASS.to_string(),
            peer: PeerProtocol::default(),
            detach_attached_threads: true,
            local_frame_capacity: 16,
            debug: false,
        }
    }
}

/// Peer-side method names; descriptors are fixed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PeerProtocol {
    /// `(Ljava/lang/String;)Ljava/lang/String;`
    pub signature_method: String,
    /// `(Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/Object;`
    pub forward_method: String,
    /// `(Ljava/lang/String;)Z`
    pub responds_method: String,
}

impl Default for PeerProtocol {
    fn default() -> Self {
        Self {
            signature_method: "methodSignatureForSelector".to_string(),
            forward_method: "forwardInvocation".to_string(),
            responds_method: "respondsToSelector".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("loaded bridge config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check values the type system does not
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exception_class.is_empty() {
            return Err(ConfigError::ValidationError("exception-class is empty".to_string()));
        }
        if self.exception_class.contains('.') {
            return Err(ConfigError::ValidationError(format!(
                "exception-class must use '/' separators: {}",
                self.exception_class
            )));
        }
        for (key, name) in [
            ("peer.signature-method", &self.peer.signature_method),
            ("peer.forward-method", &self.peer.forward_method),
            ("peer.responds-method", &self.peer.responds_method),
        ] {
            if name.is_empty() {
                return Err(ConfigError::ValidationError(format!("{} is empty", key)));
            }
        }
        Ok(())
    }
}

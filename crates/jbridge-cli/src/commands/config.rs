//! `jbridge config`: print the effective configuration.

use jbridge_core::BridgeConfig;

pub fn execute(config: &BridgeConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

//! Configuration module.
//!
//! - `loader`: the binary's TOML config file and its precedence chain
//! - `store`: settings stores (in-memory and file-backed)

pub mod loader;
pub mod store;

pub use loader::{
    apply_cli_overrides, apply_env_overrides, load_config_with_precedence, merge_config,
    ConfigError, ConfigFile, ResolvedConfig,
};
pub use store::{FileStore, MemoryStore, SettingsStore};

//! Domain model types (pure).
//!
//! Settings, the windowing state machine, and the error taxonomy. Nothing in
//! this module touches a document.

pub mod error;
pub mod settings;
pub mod window;

// Re-export for convenience
pub use error::{AppError, ScriptError, StoreError};
pub use settings::{SettingKey, Settings, SettingsCache, SettingsChange, SettingsMap};
pub use window::{AppliedSnapshot, WindowPolicy, WindowState};

//! User settings and their coercion from raw store values.
//!
//! The settings store hands back loosely-typed values (whatever the editing
//! surface or a hand-edited file put there). [`Settings::from_values`] turns
//! them into a validated [`Settings`] using parse-with-fallback: anything
//! unparseable or zero falls back to the default, every other count floors
//! at 1.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw key/value map exchanged with a settings store.
pub type SettingsMap = serde_json::Map<String, Value>;

/// Default for `maxVisible`.
pub const DEFAULT_MAX_VISIBLE: u32 = 10;

/// Default for `batchSize`.
pub const DEFAULT_BATCH_SIZE: u32 = 10;

/// A recognised settings key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Minimum number of newest entries kept visible.
    MaxVisible,
    /// Entries revealed per "load more".
    BatchSize,
    /// Reveal a batch when the top of the window scrolls into view.
    AutoloadOnScroll,
    /// Growth policy instead of fixed threshold.
    HideOldestOnNew,
}

impl SettingKey {
    /// Every recognised key.
    pub const ALL: [SettingKey; 4] = [
        SettingKey::MaxVisible,
        SettingKey::BatchSize,
        SettingKey::AutoloadOnScroll,
        SettingKey::HideOldestOnNew,
    ];

    /// Store key name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::MaxVisible => "maxVisible",
            SettingKey::BatchSize => "batchSize",
            SettingKey::AutoloadOnScroll => "autoloadOnScroll",
            SettingKey::HideOldestOnNew => "hideOldestOnNew",
        }
    }

    /// Look up a key by its store name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

/// Validated settings.
///
/// # Invariants
/// - `max_visible >= 1`
/// - `batch_size >= 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Minimum number of newest entries the window keeps visible.
    pub max_visible: u32,
    /// Entries revealed per manual or automatic "load more".
    pub batch_size: u32,
    /// Reveal a batch when the sentinel scrolls into view.
    pub autoload_on_scroll: bool,
    /// Hide the oldest visible entry when a new one arrives.
    pub hide_oldest_on_new: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_visible: DEFAULT_MAX_VISIBLE,
            batch_size: DEFAULT_BATCH_SIZE,
            autoload_on_scroll: true,
            hide_oldest_on_new: true,
        }
    }
}

impl Settings {
    /// Coerce raw store values, falling back per key to the defaults.
    pub fn from_values(values: &SettingsMap) -> Self {
        let defaults = Self::default();
        let get = |key: SettingKey| values.get(key.as_str());
        Self {
            max_visible: coerce_count(get(SettingKey::MaxVisible), defaults.max_visible),
            batch_size: coerce_count(get(SettingKey::BatchSize), defaults.batch_size),
            autoload_on_scroll: coerce_flag(
                get(SettingKey::AutoloadOnScroll),
                defaults.autoload_on_scroll,
            ),
            hide_oldest_on_new: coerce_flag(
                get(SettingKey::HideOldestOnNew),
                defaults.hide_oldest_on_new,
            ),
        }
    }

    /// Store representation.
    pub fn to_values(&self) -> SettingsMap {
        let mut map = SettingsMap::new();
        map.insert(SettingKey::MaxVisible.as_str().into(), self.max_visible.into());
        map.insert(SettingKey::BatchSize.as_str().into(), self.batch_size.into());
        map.insert(
            SettingKey::AutoloadOnScroll.as_str().into(),
            self.autoload_on_scroll.into(),
        );
        map.insert(
            SettingKey::HideOldestOnNew.as_str().into(),
            self.hide_oldest_on_new.into(),
        );
        map
    }

    /// `maxVisible` as a count, never below 1.
    pub fn threshold(&self) -> usize {
        self.max_visible.max(1) as usize
    }

    /// `batchSize` as a count, never below 1.
    pub fn batch(&self) -> usize {
        self.batch_size.max(1) as usize
    }
}

/// A settings-store change notification: `(changedKeys, newValues)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SettingsChange {
    /// Keys that changed, recognised or not.
    pub keys: Vec<String>,
    /// New values for (at least) the changed keys.
    pub values: SettingsMap,
}

impl SettingsChange {
    /// Change that sets every key in `values`.
    pub fn from_values(values: SettingsMap) -> Self {
        Self {
            keys: values.keys().cloned().collect(),
            values,
        }
    }
}

/// Cached copy of the store's values plus their coerced form.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsCache {
    raw: SettingsMap,
    settings: Settings,
}

impl Default for SettingsCache {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            raw: settings.to_values(),
            settings,
        }
    }
}

impl SettingsCache {
    /// Cache built from a full store read.
    pub fn from_values(raw: SettingsMap) -> Self {
        let settings = Settings::from_values(&raw);
        Self { raw, settings }
    }

    /// Current coerced settings.
    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Apply a change notification. Unrecognised keys are ignored.
    ///
    /// A changed key with no new value was removed from the store and falls
    /// back to its default. Returns whether any recognised key changed.
    pub fn apply(&mut self, change: &SettingsChange) -> bool {
        let mut touched = false;
        for name in &change.keys {
            if SettingKey::parse(name).is_none() {
                continue;
            }
            match change.values.get(name) {
                Some(value) => {
                    self.raw.insert(name.clone(), value.clone());
                }
                None => {
                    self.raw.remove(name);
                }
            }
            touched = true;
        }
        if touched {
            self.settings = Settings::from_values(&self.raw);
        }
        touched
    }
}

/// Parse-with-fallback for counts: unparseable or zero → `default`, any
/// other number floors at 1 (so `0.5` and `-5` both become 1).
fn coerce_count(value: Option<&Value>, default: u32) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(true)) => Some(1.0),
        _ => None,
    };
    match parsed.filter(|f| f.is_finite()) {
        None => default,
        Some(f) if f == 0.0 => default,
        Some(f) => f.clamp(1.0, f64::from(u32::MAX)).trunc() as u32,
    }
}

fn coerce_flag(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" | "" => false,
            _ => default,
        },
        _ => default,
    }
}

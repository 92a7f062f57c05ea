use serde::{Deserialize, Serialize};

/// Engine settings from `engine.yaml`.
///
/// Operational knobs that live outside the bundle XML itself.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineSettings {
    #[serde(rename = "Engine", default)]
    pub engine: EngineSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// `//Config` keys that overrides may never write (compared case-insensitively).
    #[serde(rename = "Protected Keys", default = "default_protected_keys")]
    pub protected_keys: Vec<String>,

    /// Used when `//Config/DEFAULT_LOCALE` is absent.
    #[serde(rename = "Default Locale", default = "default_locale")]
    pub default_locale: String,

    /// Directory holding `<code>.locale` documents, relative to the bundle.
    #[serde(rename = "Locale Directory", default = "default_locale_dir")]
    pub locale_dir: String,

    #[serde(rename = "Log Directory", default = "default_log_dir")]
    pub log_dir: String,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            protected_keys: default_protected_keys(),
            default_locale: default_locale(),
            locale_dir: default_locale_dir(),
            log_dir: default_log_dir(),
            debug_mode: false,
        }
    }
}

fn default_protected_keys() -> Vec<String> {
    vec!["PRODUCT_TITLE".to_string(), "WORK_DIR".to_string()]
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_locale_dir() -> String {
    "locales".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl EngineSettings {
    /// True when `key` may not be written by overrides.
    pub fn is_protected(&self, key: &str) -> bool {
        self.engine
            .protected_keys
            .iter()
            .any(|k| k.eq_ignore_ascii_case(key))
    }
}

//! Locale negotiation.
//!
//! Picks the active locale code for a bundle:
//! 1. default code from `//Config/DEFAULT_LOCALE` (or the engine default, `"en"`)
//! 2. candidate from the `//Config/LOCALE` strategy (`oslang`, `userselected`)
//! 3. candidate validated against the available `<code>.locale` resources, with
//!    a single fallback hop to the default
//!
//! Loading and merging the chosen resource is the engine's job. The session
//! state ([`LocaleSession`]) belongs to one engine instance; there is no
//! process-wide locale.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;

/// File extension of locale resources.
pub const LOCALE_EXTENSION: &str = "locale";

/// How the candidate locale is chosen before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocaleStrategy {
    /// Use the OS UI language when a resource for it exists.
    OsLanguage,
    /// Use the locale picked by the user (or the client), if any.
    UserSelected,
    /// Always use the configured default.
    #[default]
    Default,
}

impl LocaleStrategy {
    /// Parses the `//Config/LOCALE` value; anything unrecognized keeps the default.
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "oslang" => Self::OsLanguage,
            "userselected" => Self::UserSelected,
            _ => Self::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocaleStatus {
    #[default]
    Unresolved,
    Resolving,
    Resolved,
}

/// Per-engine locale state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleSession {
    pub status: LocaleStatus,
    /// Code whose resource is currently merged into the document.
    pub resolved: Option<String>,
    /// Last code chosen by the user or client; survives re-resolution.
    pub user_selected: Option<String>,
    /// Default code used for the last resolution.
    pub default_code: String,
}

/// Source of `<code>.locale` documents.
pub trait LocaleResources {
    /// Codes of every available locale, in a stable order.
    fn available(&self) -> Vec<String>;

    fn exists(&self, code: &str) -> bool {
        self.available().iter().any(|c| c == code)
    }

    /// Raw XML of the locale document, `None` when it does not exist.
    fn load(&self, code: &str) -> Result<Option<String>>;
}

/// Locale documents held in memory, e.g. embedded in the binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocales {
    documents: IndexMap<String, String>,
}

impl InMemoryLocales {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale(mut self, code: impl Into<String>, xml: impl Into<String>) -> Self {
        self.insert(code, xml);
        self
    }

    pub fn insert(&mut self, code: impl Into<String>, xml: impl Into<String>) {
        self.documents.insert(code.into(), xml.into());
    }
}

impl LocaleResources for InMemoryLocales {
    fn available(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    fn exists(&self, code: &str) -> bool {
        self.documents.contains_key(code)
    }

    fn load(&self, code: &str) -> Result<Option<String>> {
        Ok(self.documents.get(code).cloned())
    }
}

/// Locale documents stored as `<dir>/<code>.locale` files.
#[derive(Debug, Clone)]
pub struct LocaleDirectory {
    dir: Utf8PathBuf,
}

impl LocaleDirectory {
    pub fn new<P: AsRef<Utf8Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, code: &str) -> Utf8PathBuf {
        self.dir.join(format!("{code}.{LOCALE_EXTENSION}"))
    }
}

impl LocaleResources for LocaleDirectory {
    fn available(&self) -> Vec<String> {
        let Ok(entries) = self.dir.read_dir_utf8() else {
            tracing::warn!("Locale directory not readable: {}", self.dir);
            return Vec::new();
        };
        let mut codes: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension() == Some(LOCALE_EXTENSION))
            .filter_map(|entry| entry.path().file_stem().map(str::to_string))
            .collect();
        codes.sort();
        codes
    }

    fn exists(&self, code: &str) -> bool {
        !code.is_empty() && self.path_for(code).is_file()
    }

    fn load(&self, code: &str) -> Result<Option<String>> {
        let path = self.path_for(code);
        if !path.is_file() {
            return Ok(None);
        }
        let xml = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read locale resource: {}", path))?;
        Ok(Some(xml))
    }
}

/// Reports the OS UI language.
#[cfg_attr(test, mockall::automock)]
pub trait OsLocaleProbe {
    /// Two-letter ISO 639-1 code of the OS display language, if known.
    fn two_letter_code(&self) -> Option<String>;
}

/// Asks the operating system for its UI locale through `sys_locale`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLocaleProbe;

impl OsLocaleProbe for SystemLocaleProbe {
    fn two_letter_code(&self) -> Option<String> {
        let locale = sys_locale::get_locale()?;
        tracing::debug!("OS locale: {}", locale);
        language_code(&locale)
    }
}

/// Always reports the same code.
#[derive(Debug, Clone)]
pub struct FixedLocaleProbe(pub String);

impl OsLocaleProbe for FixedLocaleProbe {
    fn two_letter_code(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Language part of a locale tag: `de-DE` and `de_DE.UTF-8` both give `de`.
/// `C` and `POSIX` carry no language.
pub fn language_code(locale: &str) -> Option<String> {
    let language = locale
        .split(['_', '-', '.', '@'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if language.len() != 2 || !language.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(language)
}

/// Maps a Windows LCID to its two-letter language code using the primary
/// language id (low ten bits).
pub fn lcid_to_two_letter(lcid: u32) -> Option<&'static str> {
    let code = match lcid & 0x3ff {
        0x01 => "ar",
        0x02 => "bg",
        0x03 => "ca",
        0x04 => "zh",
        0x05 => "cs",
        0x06 => "da",
        0x07 => "de",
        0x08 => "el",
        0x09 => "en",
        0x0a => "es",
        0x0b => "fi",
        0x0c => "fr",
        0x0d => "he",
        0x0e => "hu",
        0x0f => "is",
        0x10 => "it",
        0x11 => "ja",
        0x12 => "ko",
        0x13 => "nl",
        0x14 => "no",
        0x15 => "pl",
        0x16 => "pt",
        0x18 => "ro",
        0x19 => "ru",
        0x1a => "hr",
        0x1b => "sk",
        0x1d => "sv",
        0x1e => "th",
        0x1f => "tr",
        0x21 => "id",
        0x22 => "uk",
        0x24 => "sl",
        0x25 => "et",
        0x26 => "lv",
        0x27 => "lt",
        0x29 => "fa",
        0x2a => "vi",
        0x39 => "hi",
        0x3e => "ms",
        _ => return None,
    };
    Some(code)
}

/// Chooses the locale code to load.
///
/// Returns the validated candidate, or `default_code` when the candidate has no
/// resource. Whether `default_code` itself exists is the caller's concern.
pub fn negotiate_locale(
    strategy: LocaleStrategy,
    default_code: &str,
    user_selected: Option<&str>,
    os_probe: &dyn OsLocaleProbe,
    resources: &dyn LocaleResources,
) -> String {
    let candidate = match strategy {
        LocaleStrategy::OsLanguage => match os_probe.two_letter_code() {
            Some(os_code) => {
                tracing::info!("Detected OS display language code: {}", os_code);
                if resources.exists(&os_code) {
                    os_code
                } else {
                    default_code.to_string()
                }
            }
            None => default_code.to_string(),
        },
        LocaleStrategy::UserSelected => user_selected
            .filter(|code| !code.is_empty())
            .unwrap_or(default_code)
            .to_string(),
        LocaleStrategy::Default => default_code.to_string(),
    };

    if candidate != default_code && !resources.exists(&candidate) {
        tracing::info!(
            "Requested locale ({}) is missing from resources, using default: {}",
            candidate,
            default_code
        );
        return default_code.to_string();
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resources() -> InMemoryLocales {
        InMemoryLocales::new()
            .with_locale("en", "<Main><Locale/></Main>")
            .with_locale("de", "<Main><Locale/></Main>")
    }

    #[test]
    fn test_strategy_from_config() {
        assert_eq!(LocaleStrategy::from_config("OSLang"), LocaleStrategy::OsLanguage);
        assert_eq!(LocaleStrategy::from_config("userselected"), LocaleStrategy::UserSelected);
        assert_eq!(LocaleStrategy::from_config(""), LocaleStrategy::Default);
        assert_eq!(LocaleStrategy::from_config("static"), LocaleStrategy::Default);
    }

    #[test]
    fn test_oslang_uses_available_os_locale() {
        let mut probe = MockOsLocaleProbe::new();
        probe.expect_two_letter_code().return_const(Some("de".to_string()));
        let code = negotiate_locale(LocaleStrategy::OsLanguage, "en", None, &probe, &resources());
        assert_eq!(code, "de");
    }

    #[test]
    fn test_oslang_without_resource_falls_back() {
        let probe = FixedLocaleProbe("fr".into());
        let code = negotiate_locale(LocaleStrategy::OsLanguage, "en", None, &probe, &resources());
        assert_eq!(code, "en");
    }

    #[test]
    fn test_userselected_without_selection_is_default() {
        let mut probe = MockOsLocaleProbe::new();
        probe.expect_two_letter_code().never();
        let code = negotiate_locale(LocaleStrategy::UserSelected, "en", None, &probe, &resources());
        assert_eq!(code, "en");
    }

    #[test]
    fn test_userselected_validated_against_resources() {
        let probe = FixedLocaleProbe("en".into());
        let res = resources();
        assert_eq!(
            negotiate_locale(LocaleStrategy::UserSelected, "en", Some("de"), &probe, &res),
            "de"
        );
        assert_eq!(
            negotiate_locale(LocaleStrategy::UserSelected, "en", Some("ja"), &probe, &res),
            "en"
        );
    }

    #[test]
    fn test_default_strategy_ignores_selection() {
        let probe = FixedLocaleProbe("de".into());
        let code = negotiate_locale(LocaleStrategy::Default, "en", Some("de"), &probe, &resources());
        assert_eq!(code, "en");
    }

    #[test]
    fn test_language_code() {
        assert_eq!(language_code("de_DE.UTF-8").as_deref(), Some("de"));
        assert_eq!(language_code("en-US").as_deref(), Some("en"));
        assert_eq!(language_code("fr").as_deref(), Some("fr"));
        assert_eq!(language_code("PT-br").as_deref(), Some("pt"));
        assert_eq!(language_code("C"), None);
        assert_eq!(language_code("POSIX"), None);
        assert_eq!(language_code(""), None);
    }

    #[test]
    fn test_system_probe_reports_language_only() {
        // The host locale varies, so only the shape of the answer is checked
        if let Some(code) = SystemLocaleProbe.two_letter_code() {
            assert_eq!(code.len(), 2);
            assert_eq!(code, code.to_ascii_lowercase());
        }
    }

    #[test]
    fn test_lcid_conversion() {
        assert_eq!(lcid_to_two_letter(1033), Some("en"));
        assert_eq!(lcid_to_two_letter(2057), Some("en"));
        assert_eq!(lcid_to_two_letter(1031), Some("de"));
        assert_eq!(lcid_to_two_letter(3082), Some("es"));
        assert_eq!(lcid_to_two_letter(1041), Some("ja"));
        assert_eq!(lcid_to_two_letter(0), None);
        assert_eq!(lcid_to_two_letter(999_999), None);
    }

    #[test]
    fn test_locale_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        fs::write(dir.join("en.locale"), "<Main/>").unwrap();
        fs::write(dir.join("de.locale"), "<Main><Locale/></Main>").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let locales = LocaleDirectory::new(&dir);
        assert_eq!(locales.available(), vec!["de".to_string(), "en".to_string()]);
        assert!(locales.exists("de"));
        assert!(!locales.exists("fr"));
        assert_eq!(locales.load("de").unwrap().as_deref(), Some("<Main><Locale/></Main>"));
        assert!(locales.load("fr").unwrap().is_none());
    }

    #[test]
    fn test_missing_locale_directory_is_empty() {
        let locales = LocaleDirectory::new("/definitely/not/here");
        assert!(locales.available().is_empty());
        assert!(!locales.exists("en"));
    }
}

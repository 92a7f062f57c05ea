use crate::engine::{DEFAULT_MAIN_XML, StartupSources};
use crate::models::EngineSettings;
use crate::services::LocaleDirectory;
use crate::xml::XmlDocument;
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde_yaml_ng::Value;
use std::fs;

/// Loader for the files of an installer bundle directory.
///
/// Layout:
/// - `main.xml`: base configuration document
/// - `config.xml`: optional overlay
/// - `overrides.yaml`: ordered `KEY: value` map applied to `//Config`
/// - `engine.yaml`: [`EngineSettings`]
/// - `<Locale Directory>/<code>.locale`: locale resources
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    main_xml_path: Utf8PathBuf,
    config_xml_path: Utf8PathBuf,
    overrides_path: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager for the bundle at `config_dir`.
    ///
    /// The directory is not required to exist; missing files fall back to
    /// defaults when loaded.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if config_dir.exists() && !config_dir.is_dir() {
            bail!("Bundle path is not a directory: {}", config_dir);
        }

        Ok(Self {
            main_xml_path: config_dir.join("main.xml"),
            config_xml_path: config_dir.join("config.xml"),
            overrides_path: config_dir.join("overrides.yaml"),
            settings_path: config_dir.join("engine.yaml"),
            config_dir,
        })
    }

    /// Load the engine settings.
    ///
    /// # Returns
    /// The loaded EngineSettings, or default if file doesn't exist
    pub fn load_settings(&self) -> Result<EngineSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Engine settings not found at {}, using defaults",
                self.settings_path
            );
            return Ok(EngineSettings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read engine settings: {}", self.settings_path))?;

        let settings: EngineSettings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse engine settings: {}", self.settings_path))?;

        tracing::info!("Loaded engine settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Save the engine settings, creating the bundle directory if needed.
    pub fn save_settings(&self, settings: &EngineSettings) -> Result<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)
                .with_context(|| format!("Failed to create bundle directory: {}", self.config_dir))?;
        }

        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize engine settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write engine settings: {}", self.settings_path))?;

        tracing::info!("Saved engine settings to {}", self.settings_path);
        Ok(())
    }

    fn load_xml(path: &Utf8Path) -> Result<XmlDocument> {
        let file_contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        XmlDocument::parse(&file_contents).with_context(|| format!("Failed to parse {}", path))
    }

    /// Load the base document.
    ///
    /// # Returns
    /// The parsed `main.xml`, or an empty `<Main><Products/></Main>` if it doesn't exist
    pub fn load_main_xml(&self) -> Result<XmlDocument> {
        if !self.main_xml_path.exists() {
            tracing::warn!(
                "Main configuration not found at {}, using empty document",
                self.main_xml_path
            );
            return XmlDocument::parse(DEFAULT_MAIN_XML).context("Failed to parse default main document");
        }
        let doc = Self::load_xml(&self.main_xml_path)?;
        tracing::info!("Loaded main configuration from {}", self.main_xml_path);
        Ok(doc)
    }

    /// Load the `config.xml` overlay, if the bundle has one.
    pub fn load_config_xml(&self) -> Result<Option<XmlDocument>> {
        if !self.config_xml_path.exists() {
            tracing::debug!("No config overlay at {}", self.config_xml_path);
            return Ok(None);
        }
        let doc = Self::load_xml(&self.config_xml_path)?;
        tracing::info!("Loaded config overlay from {}", self.config_xml_path);
        Ok(Some(doc))
    }

    /// Load the key/value overrides in file order.
    ///
    /// Scalars of any YAML type are accepted and stringified; `null` becomes
    /// the empty string. Nested values are skipped with a warning.
    pub fn load_overrides(&self) -> Result<IndexMap<String, String>> {
        if !self.overrides_path.exists() {
            tracing::debug!("No overrides at {}", self.overrides_path);
            return Ok(IndexMap::new());
        }

        let file_contents = fs::read_to_string(&self.overrides_path)
            .with_context(|| format!("Failed to read overrides: {}", self.overrides_path))?;

        let raw: Option<IndexMap<String, Value>> = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse overrides: {}", self.overrides_path))?;

        let overrides: IndexMap<String, String> = raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                Value::Bool(b) => Some((key, b.to_string())),
                Value::Number(n) => Some((key, n.to_string())),
                Value::Null => Some((key, String::new())),
                _ => {
                    tracing::warn!("Override {} is not a scalar, skipping", key);
                    None
                }
            })
            .collect();

        tracing::info!(
            "Loaded {} override(s) from {}",
            overrides.len(),
            self.overrides_path
        );
        Ok(overrides)
    }

    /// Locale resources under the configured locale directory.
    pub fn locale_resources(&self, settings: &EngineSettings) -> LocaleDirectory {
        LocaleDirectory::new(self.config_dir.join(&settings.engine.locale_dir))
    }

    /// Load every bundle source the engine layers at startup.
    pub fn startup_sources(
        &self,
        override_file: Option<Utf8PathBuf>,
        user_locale: Option<String>,
    ) -> Result<StartupSources> {
        Ok(StartupSources {
            main: self.load_main_xml()?,
            config: self.load_config_xml()?,
            overrides: self.load_overrides()?,
            override_file,
            user_locale,
        })
    }

    /// Get the bundle directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

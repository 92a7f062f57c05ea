//! Config resolution engine.
//!
//! [`ConfigEngine`] owns the working document and everything derived from it.
//! Sources are layered in a fixed order by [`ConfigEngine::startup`]:
//!
//! 1. base `main.xml`
//! 2. `config.xml` overlay
//! 3. key/value overrides into `//Config`
//! 4. command-line override file (replaces the whole document)
//! 5. locale resource overlay
//! 6. work directory resolution
//! 7. form and page design
//!
//! Products are projected lazily. Any mutation marks the cached projections
//! stale; the next read rebuilds them once.

use crate::metrics::ResolutionMetrics;
use crate::models::{Color, EngineSettings, FormDesign, PageDesign, ProductSettings};
use crate::services::locale::{
    InMemoryLocales, LocaleResources, LocaleSession, LocaleStatus, LocaleStrategy, OsLocaleProbe,
    SystemLocaleProbe, lcid_to_two_letter, negotiate_locale,
};
use crate::services::projector::{ProjectionContext, build_form_design, build_pages_design, project_product};
use crate::services::requirements::{NullEvaluator, RequirementEvaluator, eval_custom_variables};
use crate::xml::path::{last_step, node_at_mut, select_nodes, select_paths, select_single, select_single_mut};
use crate::xml::{XmlDocument, XmlError, XmlNode, accessor, merge, normalize_markup};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;
use std::time::Instant;
use thiserror::Error;

/// Base document used when the bundle ships no `main.xml`.
pub const DEFAULT_MAIN_XML: &str = "<Main><Products></Products></Main>";

const REMOTE_PRODUCTS_ANCHOR: &str = "//Products";

const CUSTOM_VARS_PATH: &str = "//Products/Product/StaticData/CustomData/CustomVars";

/// Maximum length of the product title part of the default work directory.
const WORK_DIR_TITLE_LEN: usize = 15;

/// Errors that can occur during resolution
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error("Locale resource not found: {0}")]
    LocaleResourceMissing(String),

    #[error("Failed to load locale {code}: {message}")]
    LocaleLoad { code: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything [`ConfigEngine::startup`] layers, already loaded except the
/// command-line override file.
#[derive(Debug, Clone)]
pub struct StartupSources {
    pub main: XmlDocument,
    pub config: Option<XmlDocument>,
    pub overrides: IndexMap<String, String>,
    /// Replaces the whole document when the file exists.
    pub override_file: Option<Utf8PathBuf>,
    /// Locale requested on the command line.
    pub user_locale: Option<String>,
}

impl Default for StartupSources {
    fn default() -> Self {
        Self {
            main: default_document(),
            config: None,
            overrides: IndexMap::new(),
            override_file: None,
            user_locale: None,
        }
    }
}

fn default_document() -> XmlDocument {
    XmlDocument::new(XmlNode::new("Main").with_child(XmlNode::new("Products")))
}

/// Bare keys live under `//Config`; keys starting with `//` are full paths.
fn config_path(key: &str) -> String {
    if key.starts_with("//") {
        key.to_string()
    } else {
        format!("//Config/{key}")
    }
}

/// Last path step as lookups see it, which is what protection is checked against.
fn config_key_name(key: &str) -> &str {
    last_step(key).unwrap_or_default()
}

/// Strips characters that are invalid in file names, replaces spaces and
/// truncates to [`WORK_DIR_TITLE_LEN`] characters.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|&c| !c.is_control() && !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .map(|c| if c == ' ' { '_' } else { c })
        .take(WORK_DIR_TITLE_LEN)
        .collect()
}

fn temp_root() -> Utf8PathBuf {
    let tmp = std::env::temp_dir();
    Utf8PathBuf::from_path_buf(tmp).unwrap_or_else(|p| Utf8PathBuf::from(p.to_string_lossy().into_owned()))
}

/// Layered configuration document plus its memoized projections.
pub struct ConfigEngine {
    document: Option<XmlDocument>,
    settings: EngineSettings,
    locale: LocaleSession,
    locales: Box<dyn LocaleResources>,
    os_probe: Box<dyn OsLocaleProbe>,
    evaluator: Box<dyn RequirementEvaluator>,

    form: FormDesign,
    pages: Vec<PageDesign>,
    products: Vec<ProductSettings>,
    products_stale: bool,
    design_stale: bool,

    work_dir: Option<Utf8PathBuf>,
    save_path: Option<Utf8PathBuf>,
    metrics: ResolutionMetrics,
}

impl ConfigEngine {
    /// Creates an engine with no document, no locale resources, the
    /// system locale probe and an evaluator that yields empty values.
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            document: None,
            settings,
            locale: LocaleSession::default(),
            locales: Box::new(InMemoryLocales::new()),
            os_probe: Box::new(SystemLocaleProbe),
            evaluator: Box::new(NullEvaluator),
            form: FormDesign::default(),
            pages: Vec::new(),
            products: Vec::new(),
            products_stale: true,
            design_stale: true,
            work_dir: None,
            save_path: None,
            metrics: ResolutionMetrics::new(),
        }
    }

    pub fn with_locales(mut self, locales: impl LocaleResources + 'static) -> Self {
        self.locales = Box::new(locales);
        self
    }

    pub fn with_os_probe(mut self, probe: impl OsLocaleProbe + 'static) -> Self {
        self.os_probe = Box::new(probe);
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl RequirementEvaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Where [`resolve_settings`](Self::resolve_settings) writes the merged document.
    pub fn with_save_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    pub fn document(&self) -> Option<&XmlDocument> {
        self.document.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &ResolutionMetrics {
        &self.metrics
    }

    pub fn locale_session(&self) -> &LocaleSession {
        &self.locale
    }

    /// Code of the locale currently merged into the document.
    pub fn locale_code(&self) -> Option<&str> {
        self.locale.resolved.as_deref()
    }

    /// Codes of every locale resource the engine can load.
    pub fn available_locales(&self) -> Vec<String> {
        self.locales.available()
    }

    pub fn work_dir(&self) -> Option<&Utf8Path> {
        self.work_dir.as_deref()
    }

    fn document_mut(&mut self) -> &mut XmlDocument {
        self.document.get_or_insert_with(default_document)
    }

    fn mark_stale(&mut self) {
        self.products_stale = true;
        self.design_stale = true;
    }

    // ---- document sources ----

    /// Layers `sources` in order: the first becomes the base when the engine
    /// has no document yet, every other one is overlaid.
    pub fn read_xml_sources<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = XmlDocument>,
    {
        for source in sources {
            match self.document {
                None => self.replace_document(source),
                Some(_) => self.merge_document(&source),
            }
        }
    }

    /// Swaps in `doc` wholesale.
    pub fn replace_document(&mut self, doc: XmlDocument) {
        tracing::debug!("Replacing working document with <{}>", doc.root.name);
        self.document = Some(doc);
        self.mark_stale();
    }

    /// Overlays `source` onto the working document.
    pub fn merge_document(&mut self, source: &XmlDocument) {
        merge::merge_document(self.document_mut(), &source.root);
        self.metrics.record_merge();
        self.mark_stale();
    }

    /// Merges a remote configuration: its header into the document, then its
    /// products in front of the local ones, remote order preserved.
    ///
    /// A blank remote document is ignored.
    pub fn add_remote_config(&mut self, remote: &XmlDocument) -> Result<(), EngineError> {
        if remote.is_blank() {
            tracing::debug!("Remote configuration is empty, nothing to add");
            return Ok(());
        }

        let products: Vec<XmlNode> = select_nodes(&remote.root, "//RemoteConfiguration/Products/Product")
            .into_iter()
            .cloned()
            .collect();
        // Nothing may be merged unless the products can land too
        if !products.is_empty() && self.document_mut().select_single(REMOTE_PRODUCTS_ANCHOR).is_none() {
            let err = XmlError::MissingAnchor(REMOTE_PRODUCTS_ANCHOR.to_string());
            tracing::error!("Failed to add remote products: {}", err);
            return Err(err.into());
        }

        let mut header = remote.root.clone();
        if let Some(remote_config) = select_single_mut(&mut header, "//RemoteConfiguration") {
            remote_config.remove_children("Products");
        }
        merge::merge_document(self.document_mut(), &header);
        self.metrics.record_merge();

        if !products.is_empty() {
            merge::prepend_at(self.document_mut(), REMOTE_PRODUCTS_ANCHOR, &products)?;
            tracing::info!("Added {} remote product(s)", products.len());
        }

        self.mark_stale();
        Ok(())
    }

    // ---- config writes ----

    /// Writes `value` (markup-normalized) to a config key.
    ///
    /// Bare keys resolve to `//Config/{key}`. Returns `false` without touching
    /// the document when the key is protected.
    pub fn set_config_value(&mut self, key: &str, value: &str) -> bool {
        if self.settings.is_protected(config_key_name(key)) {
            tracing::error!("Refusing to override protected config key {}", key);
            self.metrics.record_rejected_write();
            return false;
        }
        let normalized = normalize_markup(value);
        tracing::debug!("Setting config value {} = {}", key, normalized);
        self.set_string_value(&config_path(key), &normalized);
        self.metrics.record_config_write();
        true
    }

    /// Applies a batch of overrides in order. Protected keys are skipped
    /// without stopping the batch. Returns the number applied.
    pub fn apply_config_overrides(&mut self, overrides: &IndexMap<String, String>) -> usize {
        let applied = overrides
            .iter()
            .filter(|(key, value)| self.set_config_value(key, value))
            .count();
        if applied < overrides.len() {
            tracing::warn!(
                "Applied {} of {} config overrides",
                applied,
                overrides.len()
            );
        } else {
            tracing::info!("Applied {} config overrides", applied);
        }
        applied
    }

    /// Sets the text of the node at `path`, creating missing elements.
    pub fn set_string_value(&mut self, path: &str, value: &str) {
        let node = self.document_mut().ensure_path(path);
        node.text = value.to_string();
        self.mark_stale();
    }

    // ---- getters ----

    fn node(&self, path: &str) -> Option<&XmlNode> {
        self.document.as_ref().and_then(|doc| doc.select_single(path))
    }

    pub fn get_string(&self, path: &str, default: &str) -> String {
        accessor::get_string(self.node(path), "", default)
    }

    pub fn get_int(&self, path: &str, default: i32) -> i32 {
        accessor::get_int(self.node(path), "", default)
    }

    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        accessor::get_bool(self.node(path), "", default)
    }

    pub fn get_color(&self, path: &str) -> Color {
        accessor::get_color(self.node(path), "")
    }

    /// Value of a config key; empty values fall back to `default`.
    pub fn get_config_value(&self, key: &str, default: &str) -> String {
        accessor::get_non_empty(self.node(&config_path(key)), "", default)
    }

    // ---- projections ----

    /// Settings for every `//Products/Product`, rebuilt only when stale.
    pub fn products_settings(&mut self) -> &[ProductSettings] {
        if self.products_stale {
            self.rebuild_products();
        } else {
            self.metrics.record_cache_hit();
        }
        &self.products
    }

    pub fn form_design(&mut self) -> &FormDesign {
        self.refresh_design();
        &self.form
    }

    pub fn pages_design(&mut self) -> &[PageDesign] {
        self.refresh_design();
        &self.pages
    }

    fn refresh_design(&mut self) {
        if !self.design_stale {
            return;
        }
        let root = self.document.as_ref().map(|doc| &doc.root);
        self.form = root.map(build_form_design).unwrap_or_default();
        self.pages = root
            .map(|root| build_pages_design(root, &self.form))
            .unwrap_or_default();
        tracing::debug!("Rebuilt form design and {} page(s)", self.pages.len());
        self.design_stale = false;
    }

    fn rebuild_products(&mut self) {
        let started = Instant::now();
        self.refresh_design();

        let Some(doc) = self.document.as_mut() else {
            self.products.clear();
            self.products_stale = false;
            return;
        };

        // Custom variables can feed the static data, so materialize them first
        for index_path in select_paths(&doc.root, CUSTOM_VARS_PATH) {
            if let Some(vars) = node_at_mut(&mut doc.root, &index_path) {
                eval_custom_variables(vars, self.evaluator.as_ref());
            }
        }

        let root = &doc.root;
        let ctx = ProjectionContext {
            config: select_single(root, "//Config"),
            locale: self.locale.resolved.as_deref().unwrap_or(&self.locale.default_code),
            default_control_design: &self.form.default_control_design,
        };
        self.products = select_nodes(root, "//Products/Product")
            .into_iter()
            .map(|node| project_product(node, &ctx))
            .collect();
        self.products_stale = false;

        self.metrics.record_projection(started.elapsed());
        tracing::info!("Projected {} product(s)", self.products.len());
    }

    /// Rebuilds every projection and, when a save path is set, writes the
    /// merged document there.
    pub fn resolve_settings(&mut self) -> Result<(), EngineError> {
        self.design_stale = true;
        self.refresh_design();
        self.rebuild_products();
        if let Some(path) = self.save_path.clone() {
            self.save_document(&path)?;
        }
        Ok(())
    }

    /// Serializes the merged document to `path`.
    pub fn save_document(&self, path: &Utf8Path) -> Result<(), EngineError> {
        let xml = match &self.document {
            Some(doc) => doc.to_xml_string()?,
            None => default_document().to_xml_string()?,
        };
        fs::write(path, xml).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Saved merged configuration to {}", path);
        Ok(())
    }

    // ---- locale ----

    /// Negotiates the locale and overlays its resource.
    ///
    /// With `replace_existing`, root-level `<Locale>` subtrees are removed first.
    /// The resource is loaded and parsed before the document is touched, so a
    /// failure leaves the document and session as they were.
    fn resolve_locale(&mut self, replace_existing: bool) -> Result<(), EngineError> {
        let previous = self.locale.status;
        self.locale.status = LocaleStatus::Resolving;

        let (default_code, code, resource) = match self.load_locale_resource() {
            Ok(loaded) => loaded,
            Err(e) => {
                self.locale.status = previous;
                return Err(e);
            }
        };

        if replace_existing {
            let removed = self.document_mut().root.remove_children("Locale");
            tracing::debug!("Removed {} locale subtree(s) before re-resolving", removed);
        }
        self.merge_document(&resource);

        tracing::info!("Resolved locale: {}", code);
        self.locale.default_code = default_code;
        self.locale.resolved = Some(code);
        self.locale.status = LocaleStatus::Resolved;
        self.metrics.record_locale_resolution();
        Ok(())
    }

    /// Picks the locale code and parses its resource: `(default, code, resource)`.
    fn load_locale_resource(&self) -> Result<(String, String, XmlDocument), EngineError> {
        let default_code = self.get_config_value("DEFAULT_LOCALE", &self.settings.engine.default_locale);
        let strategy = LocaleStrategy::from_config(&self.get_config_value("LOCALE", ""));
        let code = negotiate_locale(
            strategy,
            &default_code,
            self.locale.user_selected.as_deref(),
            self.os_probe.as_ref(),
            self.locales.as_ref(),
        );

        let xml = self
            .locales
            .load(&code)
            .map_err(|e| {
                tracing::error!("Failed to load locale {}: {:#}", code, e);
                EngineError::LocaleLoad {
                    code: code.clone(),
                    message: format!("{e:#}"),
                }
            })?
            .ok_or_else(|| {
                tracing::error!("Locale resource {} not found", code);
                EngineError::LocaleResourceMissing(code.clone())
            })?;

        let resource = XmlDocument::parse(&xml).map_err(|e| {
            tracing::error!("Locale resource {} is not valid XML: {}", code, e);
            EngineError::LocaleLoad {
                code: code.clone(),
                message: e.to_string(),
            }
        })?;
        Ok((default_code, code, resource))
    }

    /// Records the user's locale choice and re-resolves when it differs from
    /// the active locale. On failure the previous choice is kept.
    pub fn set_user_selected_locale(&mut self, code: &str) -> Result<(), EngineError> {
        let previous = self.locale.user_selected.replace(code.to_string());
        if self.locale.resolved.as_deref() == Some(code) {
            return Ok(());
        }

        if let Err(e) = self.resolve_locale(true) {
            self.locale.user_selected = previous;
            return Err(e);
        }
        self.refresh_design();
        self.products_stale = true;
        Ok(())
    }

    /// Accepts a code from a client: trimmed, lowercased, and converted when
    /// it is a numeric Windows LCID.
    pub fn set_client_selected_locale(&mut self, code: &str) -> Result<(), EngineError> {
        let code = code.trim().to_lowercase();
        let code = match code.parse::<u32>() {
            Ok(lcid) => match lcid_to_two_letter(lcid) {
                Some(two_letter) => two_letter.to_string(),
                None => {
                    tracing::error!("Client selected locale {} is not a valid LCID", lcid);
                    String::new()
                }
            },
            Err(_) => code,
        };
        if code.is_empty() {
            return Ok(());
        }
        self.set_user_selected_locale(&code)
    }

    // ---- startup ----

    /// `//Config/WORK_DIR`, or a per-product folder under the temp directory.
    /// Nothing is created on disk.
    pub fn resolve_work_dir(&mut self) -> Utf8PathBuf {
        let configured = self.get_config_value("WORK_DIR", "");
        let work_dir = if configured.is_empty() {
            let title = sanitize_title(&self.get_config_value("PRODUCT_TITLE", ""));
            temp_root().join("Temp").join(format!("{title}_files"))
        } else {
            Utf8PathBuf::from(configured)
        };
        tracing::info!("Work directory: {}", work_dir);
        self.work_dir = Some(work_dir.clone());
        work_dir
    }

    fn load_override_file(path: &Utf8Path) -> Result<Option<XmlDocument>, EngineError> {
        if !path.exists() {
            tracing::warn!("Override file not found, skipping: {}", path);
            return Ok(None);
        }
        let xml = fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(XmlDocument::parse(&xml)?))
    }

    /// Runs the full layering sequence described in the module docs.
    pub fn startup(&mut self, sources: StartupSources) -> Result<(), EngineError> {
        tracing::info!("Resolving configuration");

        self.replace_document(sources.main);
        if let Some(config) = &sources.config {
            self.merge_document(config);
        }
        self.apply_config_overrides(&sources.overrides);

        if let Some(path) = &sources.override_file {
            if let Some(doc) = Self::load_override_file(path)? {
                tracing::info!("Command-line override replaces configuration: {}", path);
                self.replace_document(doc);
            }
        }

        if let Some(code) = sources.user_locale.filter(|c| !c.trim().is_empty()) {
            self.locale.user_selected = Some(code);
        }
        self.resolve_locale(false)?;
        self.resolve_work_dir();
        self.refresh_design();

        tracing::info!("Configuration resolved");
        Ok(())
    }
}

impl std::fmt::Debug for ConfigEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigEngine")
            .field("locale", &self.locale)
            .field("products_stale", &self.products_stale)
            .field("design_stale", &self.design_stale)
            .field("work_dir", &self.work_dir)
            .finish_non_exhaustive()
    }
}

use super::design::ControlsLayout;
use super::requirement::RequirementGroup;
use indexmap::IndexMap;
use serde::Serialize;

/// A download location for one architecture (`x86`, `x64`, `arm64`, or empty for any).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DownloadUrl {
    pub arch: String,
    pub url: String,
}

/// A lifecycle event a product reports on.
///
/// `trigger` is the name of the first attribute on the event node and `value`
/// its value, e.g. `<Event reportOn="install">Installed</Event>` gives
/// `{name: "Installed", trigger: "reportOn", value: "install"}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProductEvent {
    pub name: String,
    pub trigger: String,
    pub value: String,
}

/// Flat, consumer-facing view of one `<Product>` node.
///
/// Rebuilt from scratch whenever the document changes; never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProductSettings {
    pub name: String,
    pub is_optional: bool,
    pub is_extractable: bool,
    pub skin: String,
    pub class: String,

    pub filename: String,
    pub extract_path: String,
    pub run_path: String,
    pub run_params: String,
    pub download_urls: Vec<DownloadUrl>,

    pub behavior: String,
    pub run_with_bits: bool,
    pub run_and_wait: bool,
    pub msi_timeout_ms: i32,
    pub download_method: String,
    pub secondary_download_method: String,
    pub events: Vec<ProductEvent>,

    pub pre_install: RequirementGroup,
    pub post_install: RequirementGroup,
    pub analytics_params: IndexMap<String, String>,

    pub layout_name: String,
    pub controls_layout: Option<ControlsLayout>,
}

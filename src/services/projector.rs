//! Projection of configuration nodes into consumer-facing records.
//!
//! - [`project_product`]: one `<Product>` node plus global config into [`ProductSettings`]
//! - [`build_form_design`]: `<FormDesign>` into [`FormDesign`]
//! - [`build_pages_design`]: `<Flow><Page>` list into ordered [`PageDesign`]s
//!
//! Projection only reads the document. Custom variables, which may be referenced
//! by the product's static data, are materialized by the engine beforehand.

use crate::models::{ControlsLayout, DownloadUrl, FormDesign, PageDesign, ProductEvent, ProductSettings};
use crate::services::requirements::build_requirements_root;
use crate::xml::XmlNode;
use crate::xml::accessor::{
    get_attribute_map, get_bool, get_bool_attribute, get_color, get_int, get_non_empty, get_string,
    get_string_attribute,
};
use crate::xml::path::{select_nodes, select_single};
use indexmap::IndexMap;

/// Global inputs shared by every product projection.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionContext<'a> {
    /// The `//Config` section, if the document has one.
    pub config: Option<&'a XmlNode>,
    /// Resolved locale code.
    pub locale: &'a str,
    pub default_control_design: &'a IndexMap<String, String>,
}

fn nodes_at<'a>(node: Option<&'a XmlNode>, path: &str) -> Vec<&'a XmlNode> {
    node.map(|n| select_nodes(n, path)).unwrap_or_default()
}

/// Builds the settings record for one product.
pub fn project_product(node: &XmlNode, ctx: &ProjectionContext<'_>) -> ProductSettings {
    let static_data = node.child("StaticData");
    let dynamic_data = node.child("DynamicData");

    let is_optional = get_bool_attribute(Some(node), "optional", false);
    let name = if is_optional {
        get_string(dynamic_data, "InternalName", "")
    } else {
        get_string(static_data, "Title", "")
    };
    tracing::debug!("Projecting product settings: {}", name);

    let mut settings = ProductSettings {
        name,
        is_optional,
        is_extractable: get_bool_attribute(Some(node), "extractable", true),
        skin: get_string(dynamic_data, "Skin", ""),
        class: get_string(dynamic_data, "Class", ""),
        filename: get_string(static_data, "Filename", ""),
        extract_path: get_string(static_data, "ExtractPath", ""),
        run_path: get_string(static_data, "RunPath", ""),
        layout_name: get_string(static_data, "Layout", ""),
        ..Default::default()
    };

    settings.download_urls = nodes_at(static_data, "DownloadURLs/DownloadURL")
        .into_iter()
        .map(|url| DownloadUrl {
            arch: get_string_attribute(Some(url), "arch", "").trim().to_string(),
            url: get_string(Some(url), "", "").trim().to_string(),
        })
        .collect();

    apply_logic(&mut settings, static_data, ctx);

    settings.run_params = nodes_at(static_data, "RunParams/RunParam")
        .into_iter()
        .map(|param| get_string(Some(param), "", "").trim().to_string())
        .filter(|param| !param.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    settings.pre_install = build_requirements_root(&nodes_at(static_data, "PreInstall/Requirements"));
    settings.post_install = build_requirements_root(&nodes_at(static_data, "PostInstall/Requirements"));

    settings.analytics_params = nodes_at(static_data, "AnalyticsParams/Param")
        .into_iter()
        .map(|param| (get_string(Some(param), "Key", ""), get_string(Some(param), "Value", "")))
        .collect();

    let locales = select_nodes(node, "Locales/Locale");
    if !locales.is_empty() {
        settings.controls_layout = select_locale_layout(&locales, ctx);
        if settings.controls_layout.is_none() {
            tracing::warn!(
                "Missing locale for product: {} language code: {}",
                settings.name,
                ctx.locale
            );
        }
    }

    settings
}

/// Run behavior from the first `<Logic>` node, with global fallbacks.
fn apply_logic(settings: &mut ProductSettings, static_data: Option<&XmlNode>, ctx: &ProjectionContext<'_>) {
    let logic_nodes = nodes_at(static_data, "Logic");
    if logic_nodes.len() > 1 {
        tracing::debug!(
            "{} has {} <Logic> nodes, using the first",
            settings.name,
            logic_nodes.len()
        );
    }
    let logic = logic_nodes.first().copied();

    let run_with_bits_default = get_bool(ctx.config, "RUN_WITH_BITS", true);
    settings.behavior = get_string(logic, "Behavior", "");
    settings.run_with_bits = get_bool(logic, "RunWithBits", run_with_bits_default);
    settings.run_and_wait = get_bool(logic, "RunAndWait", false);
    settings.msi_timeout_ms = get_int(logic, "MsiTimeoutMs", 0);
    settings.download_method = get_non_empty(
        logic,
        "DownloadMethod",
        &get_string(ctx.config, "DOWNLOAD_METHOD", ""),
    );
    settings.secondary_download_method = get_non_empty(
        logic,
        "SecondaryDownloadMethod",
        &get_string(ctx.config, "SECONDARY_DOWNLOAD_METHOD", ""),
    );

    settings.events = nodes_at(logic, "Events/Event")
        .into_iter()
        .filter_map(|event| {
            let Some((trigger, value)) = event.attributes.first() else {
                tracing::debug!("Dropping event without attributes in {}", settings.name);
                return None;
            };
            Some(ProductEvent {
                name: get_string(Some(event), "", ""),
                trigger: trigger.clone(),
                value: value.clone(),
            })
        })
        .collect();
}

fn layout_from_locale(locale: &XmlNode, defaults: &IndexMap<String, String>) -> ControlsLayout {
    ControlsLayout::new(
        &[
            select_nodes(locale, "Texts/Text"),
            select_nodes(locale, "Images/Image"),
            select_nodes(locale, "UILayouts"),
        ],
        defaults,
    )
}

/// Exact locale match first, then the entry marked `default="true"`. When
/// several entries qualify the last one wins.
fn select_locale_layout(locales: &[&XmlNode], ctx: &ProjectionContext<'_>) -> Option<ControlsLayout> {
    let mut exact = None;
    let mut default_locale = None;
    for &locale in locales {
        if get_bool_attribute(Some(locale), "default", false) {
            default_locale = Some(locale);
        }
        if get_string_attribute(Some(locale), "name", "") == ctx.locale {
            exact = Some(locale);
        }
    }
    exact
        .or(default_locale)
        .map(|locale| layout_from_locale(locale, ctx.default_control_design))
}

/// Reads `//FormDesign`; an absent node yields the default design.
pub fn build_form_design(root: &XmlNode) -> FormDesign {
    let Some(node) = select_single(root, "//FormDesign") else {
        tracing::debug!("No <FormDesign> in document");
        return FormDesign::default();
    };
    let form = Some(node);
    FormDesign {
        height: get_int(form, "Height", 0),
        width: get_int(form, "Width", 0),
        client_height: get_int(form, "ClientHeight", 0),
        client_width: get_int(form, "ClientWidth", 0),
        bottom_panel_height: get_int(form, "BottomPanelHeight", 0),
        form_name: get_string(form, "FormName", ""),
        background_color: get_color(form, "BackgroundColor"),
        default_control_design: get_attribute_map(node.child("DefaultControlDesign")),
    }
}

/// Builds the page flow in document order.
pub fn build_pages_design(root: &XmlNode, form: &FormDesign) -> Vec<PageDesign> {
    select_nodes(root, "//Flow/Page")
        .into_iter()
        .enumerate()
        .map(|(index, page)| {
            let controls: Vec<&XmlNode> = page
                .child("Controls")
                .map(|c| c.children.iter().collect())
                .unwrap_or_default();
            PageDesign {
                page_name: get_string(Some(page), "PageName", ""),
                controls_layout: ControlsLayout::new(&[controls], &form.default_control_design),
                index,
            }
        })
        .collect()
}

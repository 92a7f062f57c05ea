//! Typed value extraction from configuration nodes.
//!
//! Every getter degrades to the caller's default instead of failing: configuration
//! is expected to be partially absent across locales and bundle versions, so a
//! missing node, a missing field and an unparsable value all look the same to
//! callers.
//!
//! Named lookups check, in order, the first child element with that name and
//! then the attribute with that name. String values are passed through
//! [`normalize_markup`] so authors can embed simple inline HTML.

use crate::models::Color;
use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::escape::unescape_with;
use quick_xml::events::Event;
use regex::Regex;
use std::sync::LazyLock;

use super::XmlNode;

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(</?\s*br\s*/?>)").expect("Invalid line break regex"));

/// Resolves named HTML entities that XML itself does not define.
pub(crate) fn resolve_html_entity(entity: &str) -> Option<&'static str> {
    let resolved = match entity {
        "nbsp" => "\u{a0}",
        "copy" => "©",
        "reg" => "®",
        "trade" => "™",
        "hellip" => "…",
        "mdash" => "—",
        "ndash" => "–",
        "laquo" => "«",
        "raquo" => "»",
        "lsquo" => "‘",
        "rsquo" => "’",
        "ldquo" => "“",
        "rdquo" => "”",
        "bull" => "•",
        "middot" => "·",
        "deg" => "°",
        "euro" => "€",
        "pound" => "£",
        "yen" => "¥",
        "cent" => "¢",
        "sect" => "§",
        "times" => "×",
        "divide" => "÷",
        "eacute" => "é",
        "egrave" => "è",
        "ecirc" => "ê",
        "aacute" => "á",
        "agrave" => "à",
        "acirc" => "â",
        "iacute" => "í",
        "oacute" => "ó",
        "uacute" => "ú",
        "ntilde" => "ñ",
        "ccedil" => "ç",
        "auml" => "ä",
        "ouml" => "ö",
        "uuml" => "ü",
        "Auml" => "Ä",
        "Ouml" => "Ö",
        "Uuml" => "Ü",
        "szlig" => "ß",
        _ => return None,
    };
    Some(resolved)
}

/// Decodes HTML entities, collapses `<br>` markup to a space and strips any
/// remaining inline markup, keeping only its text.
///
/// Falls back to `value` unchanged when any step fails.
pub fn normalize_markup(value: &str) -> String {
    match try_normalize(value) {
        Some(normalized) => normalized,
        None => {
            tracing::debug!("Markup normalization failed, keeping raw value: {}", value);
            value.to_string()
        }
    }
}

fn try_normalize(value: &str) -> Option<String> {
    let decoded = unescape_with(value, resolve_html_entity).ok()?;
    let collapsed = LINE_BREAK.replace_all(&decoded, " ");
    root_text(&format!("<route>{collapsed}</route>"))
}

/// Text content of a wrapped fragment, whitespace preserved.
fn root_text(fragment: &str) -> Option<String> {
    let mut reader = Reader::from_str(fragment);
    let mut depth = 0usize;
    let mut out = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => depth = depth.checked_sub(1)?,
            Ok(Event::Text(e)) => out.push_str(&e.unescape_with(resolve_html_entity).ok()?),
            Ok(Event::CData(e)) => out.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    (depth == 0).then_some(out)
}

/// Raw (un-normalized) text of the named child element or attribute.
pub fn raw_value<'a>(node: &'a XmlNode, name: &str) -> Option<std::borrow::Cow<'a, str>> {
    if let Some(child) = node.child(name) {
        return Some(child.inner_text().into());
    }
    node.attribute(name).map(Into::into)
}

/// Text of the named child element or attribute of `node`.
///
/// An empty `name` reads the node's own inner text.
pub fn get_string(node: Option<&XmlNode>, name: &str, default: &str) -> String {
    let Some(node) = node else {
        return default.to_string();
    };
    let raw = if name.is_empty() {
        Some(node.inner_text().into())
    } else {
        raw_value(node, name)
    };
    match raw {
        Some(raw) => normalize_markup(&raw),
        None => default.to_string(),
    }
}

/// Like [`get_string`], but an empty value also yields `default`.
pub fn get_non_empty(node: Option<&XmlNode>, name: &str, default: &str) -> String {
    let value = get_string(node, name, "");
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

pub fn get_int(node: Option<&XmlNode>, name: &str, default: i32) -> i32 {
    let value = get_string(node, name, "");
    match value.trim().parse::<i32>() {
        Ok(parsed) => parsed,
        Err(_) => {
            if !value.is_empty() {
                tracing::debug!("Non-numeric value for {}: {:?}", name, value);
            }
            default
        }
    }
}

/// Parses a boolean token, case-insensitively.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn get_bool(node: Option<&XmlNode>, name: &str, default: bool) -> bool {
    parse_bool(&get_string(node, name, "")).unwrap_or(default)
}

/// Named or hex color; white when absent or unparsable.
pub fn get_color(node: Option<&XmlNode>, name: &str) -> Color {
    Color::parse(&get_string(node, name, "")).unwrap_or(Color::WHITE)
}

/// Attribute value of `node` itself.
pub fn get_string_attribute(node: Option<&XmlNode>, attr: &str, default: &str) -> String {
    node.and_then(|n| n.attribute(attr))
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

pub fn get_bool_attribute(node: Option<&XmlNode>, attr: &str, default: bool) -> bool {
    node.and_then(|n| n.attribute(attr))
        .and_then(parse_bool)
        .unwrap_or(default)
}

/// Attribute `attr` of the element named `element`: `node` itself when it carries
/// that name, otherwise its first child of that name. Empty when absent.
pub fn get_child_attribute(node: Option<&XmlNode>, element: &str, attr: &str) -> String {
    let Some(node) = node else {
        return String::new();
    };
    let target = if node.name == element {
        Some(node)
    } else {
        node.child(element)
    };
    get_string_attribute(target, attr, "")
}

/// Flattens a node's attributes and leaf children into an ordered map.
///
/// Attributes come first; a leaf child with the same name overrides.
pub fn get_attribute_map(node: Option<&XmlNode>) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    let Some(node) = node else {
        return map;
    };
    for (key, value) in &node.attributes {
        map.insert(key.clone(), value.clone());
    }
    for child in node.children.iter().filter(|c| !c.has_children()) {
        map.insert(child.name.clone(), normalize_markup(&child.text));
    }
    map
}

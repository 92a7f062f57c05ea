use crate::xml::XmlNode;
use indexmap::IndexMap;
use serde::Serialize;

/// ARGB color as used by form designs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { a: 255, r, g, b }
    }

    /// Accepts a named color, `#RGB`, `#RRGGBB`, `#AARRGGBB` or `r,g,b`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if let Some(hex) = value.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        if value.contains(',') {
            let parts: Vec<u8> = value
                .split(',')
                .map(|p| p.trim().parse::<u8>())
                .collect::<Result<_, _>>()
                .ok()?;
            return match parts.as_slice() {
                [r, g, b] => Some(Self::rgb(*r, *g, *b)),
                [a, r, g, b] => Some(Self { a: *a, r: *r, g: *g, b: *b }),
                _ => None,
            };
        }
        Self::named(value)
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.is_ascii() {
            return None;
        }
        let byte = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut channels = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
                Some(Self::rgb(channels.next()??, channels.next()??, channels.next()??))
            }
            6 => Some(Self::rgb(byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?)),
            8 => Some(Self {
                a: byte(&hex[0..2])?,
                r: byte(&hex[2..4])?,
                g: byte(&hex[4..6])?,
                b: byte(&hex[6..8])?,
            }),
            _ => None,
        }
    }

    fn named(name: &str) -> Option<Self> {
        let color = match name.to_ascii_lowercase().as_str() {
            "white" => Self::WHITE,
            "black" => Self::BLACK,
            "red" => Self::rgb(255, 0, 0),
            "green" => Self::rgb(0, 128, 0),
            "lime" => Self::rgb(0, 255, 0),
            "blue" => Self::rgb(0, 0, 255),
            "navy" => Self::rgb(0, 0, 128),
            "yellow" => Self::rgb(255, 255, 0),
            "orange" => Self::rgb(255, 165, 0),
            "purple" => Self::rgb(128, 0, 128),
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "lightgray" | "lightgrey" => Self::rgb(211, 211, 211),
            "darkgray" | "darkgrey" => Self::rgb(169, 169, 169),
            "silver" => Self::rgb(192, 192, 192),
            "maroon" => Self::rgb(128, 0, 0),
            "olive" => Self::rgb(128, 128, 0),
            "teal" => Self::rgb(0, 128, 128),
            "aqua" | "cyan" => Self::rgb(0, 255, 255),
            "fuchsia" | "magenta" => Self::rgb(255, 0, 255),
            "transparent" => Self { a: 0, r: 255, g: 255, b: 255 },
            _ => return None,
        };
        Some(color)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Opaque control layout handed to the rendering layer.
///
/// Built from one or more node lists (texts, images, UI layouts, page controls)
/// plus the form's default control design. The resolver never looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ControlsLayout {
    pub nodes: Vec<XmlNode>,
    pub default_design: IndexMap<String, String>,
}

impl ControlsLayout {
    pub fn new(node_lists: &[Vec<&XmlNode>], default_design: &IndexMap<String, String>) -> Self {
        Self {
            nodes: node_lists.iter().flatten().map(|n| (*n).clone()).collect(),
            default_design: default_design.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First control whose `name` attribute matches.
    pub fn control(&self, name: &str) -> Option<&XmlNode> {
        self.nodes.iter().find(|n| n.attribute("name") == Some(name))
    }
}

/// Window-level design read from `<FormDesign>`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FormDesign {
    pub height: i32,
    pub width: i32,
    pub client_height: i32,
    pub client_width: i32,
    pub bottom_panel_height: i32,
    pub form_name: String,
    pub background_color: Color,
    pub default_control_design: IndexMap<String, String>,
}

/// One page of the `<Flow>`, in flow order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PageDesign {
    pub page_name: String,
    pub controls_layout: ControlsLayout,
    pub index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse_forms() {
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("#102030"), Some(Color::rgb(0x10, 0x20, 0x30)));
        assert_eq!(
            Color::parse("#80102030"),
            Some(Color { a: 0x80, r: 0x10, g: 0x20, b: 0x30 })
        );
        assert_eq!(Color::parse("Navy"), Some(Color::rgb(0, 0, 128)));
        assert_eq!(Color::parse("1, 2, 3"), Some(Color::rgb(1, 2, 3)));
        assert_eq!(Color::parse("#12"), None);
        assert_eq!(Color::parse("#zzzzzz"), None);
        assert_eq!(Color::parse("notacolor"), None);
        assert_eq!(Color::parse("300,1,1"), None);
    }

    #[test]
    fn test_controls_layout_flattens_lists() {
        let a = XmlNode::new("Text").with_attribute("name", "title");
        let b = XmlNode::new("Image").with_attribute("name", "logo");
        let defaults = IndexMap::from([("FontName".to_string(), "Arial".to_string())]);
        let layout = ControlsLayout::new(&[vec![&a], vec![&b]], &defaults);
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.control("logo").unwrap().name, "Image");
        assert_eq!(layout.default_design["FontName"], "Arial");
    }
}

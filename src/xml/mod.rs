//! In-memory XML element tree for bundle configuration documents.
//!
//! The resolver only needs elements, attributes and text, so the tree is kept
//! deliberately small:
//! - [`XmlNode`]: an element with ordered attributes, text and child elements
//! - [`XmlDocument`]: a document wrapping a single root element
//!
//! Comments, processing instructions and the XML declaration are dropped on
//! parse. Mixed content (`Click <b>here</b> now`) keeps its order: text before
//! the first child is in [`XmlNode::text`], text after a child in that child's
//! [`XmlNode::tail`]. Outside mixed content, whitespace between elements is
//! indentation and is dropped, and leaf text is trimmed.
//!
//! Submodules:
//! - [`path`]: `//A/B`-style node lookups
//! - [`merge`]: the overlay merger
//! - [`accessor`]: typed value extraction with default fallback

pub mod accessor;
pub mod merge;
pub mod path;

use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::Serialize;
use thiserror::Error;

pub use accessor::normalize_markup;
pub use merge::{merge_document, merge_node, prepend_at};

/// Errors raised while parsing, serializing or structurally merging XML.
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("xml: {0}")]
    Parse(String),

    #[error("document has no root element")]
    EmptyDocument,

    #[error("unexpected closing tag </{0}>")]
    UnbalancedTag(String),

    #[error("merge anchor not found: {0}")]
    MissingAnchor(String),

    #[error("failed to serialize document: {0}")]
    Write(String),
}

/// A single XML element.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct XmlNode {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    /// Text before the first child element.
    pub text: String,
    pub children: Vec<XmlNode>,
    /// Text between this element's end tag and the next sibling, owned by the parent's content.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tail: String,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style helper used heavily by tests and the engine.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_tail(mut self, tail: impl Into<String>) -> Self {
        self.tail = tail.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// First direct child with the given element name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// All direct children with the given element name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Returns the first child named `name`, creating it at the end if missing.
    pub fn ensure_child(&mut self, name: &str) -> &mut XmlNode {
        let index = match self.children.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.children.push(XmlNode::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Removes every direct child named `name`, returning how many were removed.
    pub fn remove_children(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children.retain(|c| c.name != name);
        before - self.children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// True when text and child elements are interleaved.
    pub fn has_mixed_content(&self) -> bool {
        self.has_children() && (!self.text.is_empty() || self.children.iter().any(|c| !c.tail.is_empty()))
    }

    /// Drops indentation between child elements and trims leaf children.
    /// Mixed content is left untouched. Called once the element is complete.
    fn settle_whitespace(&mut self) {
        if self.children.is_empty() {
            return;
        }
        let has_text = !self.text.trim().is_empty() || self.children.iter().any(|c| !c.tail.trim().is_empty());
        if has_text {
            return;
        }
        self.text.clear();
        for child in &mut self.children {
            child.tail.clear();
            if child.children.is_empty() {
                child.trim_text();
            }
        }
    }

    fn trim_text(&mut self) {
        let trimmed = self.text.trim();
        if trimmed.len() != self.text.len() {
            self.text = trimmed.to_string();
        }
    }

    /// Concatenated text of this element and all descendants, in document order.
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.collect_text(out);
            out.push_str(&child.tail);
        }
    }

    /// Parses a fragment whose outermost element becomes the returned node.
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        XmlDocument::parse(xml).map(|doc| doc.root)
    }

    /// Writes the element. Inside mixed content nothing may be indented, so
    /// `inline` keeps the writer from breaking lines.
    fn write_to(&self, writer: &mut Writer<Vec<u8>>, inline: bool) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        keep_inline(writer, inline)?;
        if self.text.is_empty() && self.children.is_empty() {
            return emit(writer, Event::Empty(start));
        }
        emit(writer, Event::Start(start))?;

        let inline = inline || self.has_mixed_content();
        if !self.text.is_empty() {
            emit(writer, Event::Text(BytesText::new(&self.text)))?;
        }
        for child in &self.children {
            child.write_to(writer, inline)?;
            if !child.tail.is_empty() {
                emit(writer, Event::Text(BytesText::new(&child.tail)))?;
            }
        }
        keep_inline(writer, inline)?;
        emit(writer, Event::End(BytesEnd::new(self.name.as_str())))
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer.write_event(event).map_err(|e| XmlError::Write(e.to_string()))
}

/// An empty text event stops the indenting writer from starting a new line
/// before the next tag.
fn keep_inline(writer: &mut Writer<Vec<u8>>, inline: bool) -> Result<(), XmlError> {
    if inline {
        emit(writer, Event::Text(BytesText::new("")))?;
    }
    Ok(())
}

/// A parsed configuration document with exactly one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: XmlNode,
}

impl XmlDocument {
    pub fn new(root: XmlNode) -> Self {
        Self { root }
    }

    /// Parses a complete document.
    ///
    /// Entity references that XML does not define (`&nbsp;`, `&copy;`, ...) are
    /// resolved through the same HTML table the value accessor uses, so authors
    /// can paste simple HTML text into values.
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    stack.push(start_node(&reader, e)?);
                }
                Ok(Event::Empty(ref e)) => {
                    let node = start_node(&reader, e)?;
                    attach(&mut stack, &mut root, node);
                }
                Ok(Event::End(ref e)) => {
                    let mut node = stack.pop().ok_or_else(|| {
                        XmlError::UnbalancedTag(String::from_utf8_lossy(e.name().as_ref()).into())
                    })?;
                    node.settle_whitespace();
                    attach(&mut stack, &mut root, node);
                }
                Ok(Event::Text(ref e)) => {
                    let text = e
                        .unescape_with(accessor::resolve_html_entity)
                        .map_err(|err| XmlError::Parse(err.to_string()))?;
                    push_text(&mut stack, &text);
                }
                Ok(Event::CData(e)) => {
                    push_text(&mut stack, &String::from_utf8_lossy(&e.into_inner()));
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(XmlError::Parse(format!(
                        "{} at position {}",
                        e,
                        reader.buffer_position()
                    )));
                }
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Parse(format!("unclosed element <{}>", open.name)));
        }

        let mut root = root.ok_or(XmlError::EmptyDocument)?;
        if root.children.is_empty() {
            root.trim_text();
        }
        Ok(Self::new(root))
    }

    /// Serializes the document with two-space indentation.
    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        self.root.write_to(&mut writer, false)?;
        String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Write(e.to_string()))
    }

    /// True when the document carries no text anywhere.
    pub fn is_blank(&self) -> bool {
        self.root.inner_text().trim().is_empty()
    }
}

fn start_node(reader: &Reader<&[u8]>, e: &BytesStart<'_>) -> Result<XmlNode, XmlError> {
    let mut node = XmlNode::new(String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            XmlError::Parse(format!("{} at position {}", err, reader.buffer_position()))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| XmlError::Parse(err.to_string()))?
            .into_owned();
        node.attributes.insert(key, value);
    }
    Ok(node)
}

/// Appends text to the open element: after its last child when it has one.
fn push_text(stack: &mut [XmlNode], text: &str) {
    if let Some(current) = stack.last_mut() {
        match current.children.last_mut() {
            Some(last) => last.tail.push_str(text),
            None => current.text.push_str(text),
        }
    }
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            // Only the first top-level element is the document root.
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

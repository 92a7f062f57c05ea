//! Integration tests for the overlay merger
//!
//! These tests verify:
//! - Merging the same source twice equals merging it once
//! - Source attributes always survive a merge
//! - Mixed-content text from the source reads back unchanged
//! - Prepending keeps the prepended items' order ahead of existing ones
//! - Multi-document layering through the public document API

use bundlecfg::xml::accessor::get_string;
use bundlecfg::xml::path::select_nodes;
use bundlecfg::xml::{XmlDocument, XmlError, merge_document, merge_node, prepend_at};
use bundlecfg::XmlNode;
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = XmlNode> {
    (
        prop::sample::select(vec!["A", "B", "C"]),
        prop::option::of(prop::sample::select(vec!["x", "y"])),
        prop::option::of(prop::sample::select(vec!["1", "2"])),
        "[a-z]{0,3}",
    )
        .prop_map(|(name, key, flag, text)| {
            let mut node = XmlNode::new(name).with_text(text);
            if let Some(key) = key {
                node = node.with_attribute("name", key);
            }
            if let Some(flag) = flag {
                node = node.with_attribute("flag", flag);
            }
            node
        })
}

fn tree() -> impl Strategy<Value = XmlNode> {
    leaf().prop_recursive(3, 32, 4, |inner| {
        (leaf(), prop::collection::vec(inner, 0..4)).prop_map(|(mut node, children)| {
            node.children = children;
            node
        })
    })
}

proptest! {
    #[test]
    fn merge_is_idempotent(target in tree(), source in tree()) {
        let mut once = target.clone();
        merge_node(&mut once, &source);

        let mut twice = once.clone();
        merge_node(&mut twice, &source);

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merge_keeps_source_attributes(target in tree(), source in tree()) {
        let mut merged = target.clone();
        merge_node(&mut merged, &source);

        for (key, value) in &source.attributes {
            prop_assert_eq!(merged.attribute(key), Some(value.as_str()));
        }
        if source.has_mixed_content() {
            prop_assert_eq!(merged.inner_text(), source.inner_text());
        } else {
            prop_assert!(merged.children.len() >= target.children.len());
        }
    }
}

fn names(doc: &XmlDocument, path: &str) -> Vec<String> {
    select_nodes(&doc.root, path)
        .into_iter()
        .map(|n| n.attribute("id").unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_prepend_preserves_item_order() {
    let mut doc = XmlDocument::parse(r#"<Main><Products><Product id="P4"/></Products></Main>"#).unwrap();
    let items: Vec<XmlNode> = ["P1", "P2", "P3"]
        .into_iter()
        .map(|id| XmlNode::new("Product").with_attribute("id", id))
        .collect();

    prepend_at(&mut doc, "//Products", &items).unwrap();

    assert_eq!(names(&doc, "//Products/Product"), vec!["P1", "P2", "P3", "P4"]);
}

#[test]
fn test_prepend_without_anchor_fails() {
    let mut doc = XmlDocument::parse("<Main/>").unwrap();
    let err = prepend_at(&mut doc, "//Products", &[XmlNode::new("Product")]).unwrap_err();
    assert!(matches!(err, XmlError::MissingAnchor(path) if path == "//Products"));
}

#[test]
fn test_layered_documents() {
    let mut doc = XmlDocument::parse(
        r#"<Main>
             <Config><LOCALE>oslang</LOCALE><DOWNLOAD_METHOD>http</DOWNLOAD_METHOD></Config>
             <Products><Product id="A"><StaticData><Title>Alpha</Title></StaticData></Product></Products>
           </Main>"#,
    )
    .unwrap();
    let overlay = XmlDocument::parse(
        r#"<Main>
             <Config><DOWNLOAD_METHOD>bits</DOWNLOAD_METHOD><EXTRA>1</EXTRA></Config>
             <Products><Product><StaticData><Filename>a.exe</Filename></StaticData></Product></Products>
           </Main>"#,
    )
    .unwrap();

    merge_document(&mut doc, &overlay.root);

    let config = doc.select_single("//Config").unwrap();
    assert_eq!(config.child("LOCALE").unwrap().text, "oslang");
    assert_eq!(config.child("DOWNLOAD_METHOD").unwrap().text, "bits");
    assert_eq!(config.child("EXTRA").unwrap().text, "1");

    // Positional pairing merges into the existing product instead of adding one
    let products = doc.select_nodes("//Products/Product");
    assert_eq!(products.len(), 1);
    let static_data = products[0].child("StaticData").unwrap();
    assert_eq!(static_data.child("Title").unwrap().text, "Alpha");
    assert_eq!(static_data.child("Filename").unwrap().text, "a.exe");
}

#[test]
fn test_inline_markup_value_survives_merge_and_save() {
    let mut doc = XmlDocument::parse("<Main><Config><EULA>See terms</EULA></Config></Main>").unwrap();
    let overlay = XmlDocument::parse(
        "<Main><Config><EULA>Read the <a href=\"x\">terms</a> before you <b>install</b>.</EULA></Config></Main>",
    )
    .unwrap();

    merge_document(&mut doc, &overlay.root);
    let reparsed = XmlDocument::parse(&doc.to_xml_string().unwrap()).unwrap();

    assert_eq!(reparsed, doc);
    assert_eq!(
        get_string(reparsed.select_single("//Config/EULA"), "", ""),
        "Read the terms before you install."
    );
}

#[test]
fn test_named_siblings_survive_round_trip() {
    let mut doc = XmlDocument::parse(
        r#"<Main><Locales><Locale name="en"><T>Hello</T></Locale></Locales></Main>"#,
    )
    .unwrap();
    let overlay = XmlDocument::parse(
        r#"<Main><Locales><Locale name="de"><T>Hallo</T></Locale><Locale name="en"><T>Hi</T></Locale></Locales></Main>"#,
    )
    .unwrap();

    merge_document(&mut doc, &overlay.root);

    let reparsed = XmlDocument::parse(&doc.to_xml_string().unwrap()).unwrap();
    assert_eq!(reparsed, doc);

    let locales = reparsed.select_nodes("//Locales/Locale");
    assert_eq!(locales.len(), 2);
    assert_eq!(locales[0].attribute("name"), Some("en"));
    assert_eq!(locales[0].child("T").unwrap().text, "Hi");
    assert_eq!(locales[1].attribute("name"), Some("de"));
}

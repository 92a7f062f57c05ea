//! Overlay merging of XML subtrees.
//!
//! Same-named siblings are overlaid rather than duplicated:
//! - attributes are unioned, source wins on conflict
//! - leaf text from the source overwrites the target
//! - mixed content (text interleaved with elements) from the source replaces the
//!   target's content as a whole
//! - children are paired and merged recursively; unpaired children are inserted whole
//!
//! Sibling pairing uses the element name plus its `name` attribute when present,
//! so `<Locale name="en">` and `<Locale name="de">` stay distinct. Among siblings
//! sharing a key, the k-th source sibling pairs with the k-th target sibling that
//! existed before the merge started. Repeated list items therefore keep their
//! identity, and merging the same source twice is idempotent.
//!
//! List containers that should grow at the front (remote products) use
//! [`prepend_at`] instead, which inserts without pairing.

use super::{XmlDocument, XmlError, XmlNode};

fn sibling_key(node: &XmlNode) -> (&str, Option<&str>) {
    (node.name.as_str(), node.attribute("name"))
}

/// Overlays `source` onto `target` in place.
pub fn merge_node(target: &mut XmlNode, source: &XmlNode) {
    for (key, value) in &source.attributes {
        target.attributes.insert(key.clone(), value.clone());
    }

    if source.has_mixed_content() {
        target.text = source.text.clone();
        target.children = source.children.clone();
        return;
    }

    if !source.has_children() && (!source.text.is_empty() || !target.has_children()) {
        target.text = source.text.clone();
    }

    let existing = target.children.len();
    let mut claimed = vec![false; existing];

    for child in &source.children {
        let key = sibling_key(child);
        let paired = (0..existing).find(|&i| !claimed[i] && sibling_key(&target.children[i]) == key);
        match paired {
            Some(i) => {
                claimed[i] = true;
                merge_node(&mut target.children[i], child);
            }
            None => target.children.push(child.clone()),
        }
    }
}

/// Overlays a whole source document onto `doc`.
///
/// The source root acts as a wrapper even when its name differs from the
/// target root (e.g. `<RemoteConfiguration>` merged into `<Main>`).
pub fn merge_document(doc: &mut XmlDocument, source_root: &XmlNode) {
    tracing::debug!(
        "Merging <{}> into <{}> ({} top-level nodes)",
        source_root.name,
        doc.root.name,
        source_root.children.len()
    );
    merge_node(&mut doc.root, source_root);
}

/// Inserts `items` at the front of the node at `anchor_path`, preserving their
/// relative order.
///
/// Fails when the anchor does not exist: a missing list container means the
/// bundle itself is malformed.
pub fn prepend_at(doc: &mut XmlDocument, anchor_path: &str, items: &[XmlNode]) -> Result<(), XmlError> {
    let anchor = doc
        .select_single_mut(anchor_path)
        .ok_or_else(|| XmlError::MissingAnchor(anchor_path.to_string()))?;

    // Last item first so each insert at 0 pushes the previous one back into place
    for item in items.iter().rev() {
        anchor.children.insert(0, item.clone());
    }
    Ok(())
}

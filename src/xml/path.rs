//! Path lookups over an [`XmlNode`] tree.
//!
//! Supports the small subset of XPath the bundle format uses:
//! - `//A/B` - every `A` anywhere (including the context node), then child steps
//! - `/A/B` - the context node must be `A`, then child steps
//! - `A/B` - child steps from the context node
//! - `*` matches any element name in a step

use super::{XmlDocument, XmlNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Descendant,
    Absolute,
    Relative,
}

fn split(path: &str) -> (Anchor, Vec<&str>) {
    let (anchor, rest) = if let Some(rest) = path.strip_prefix("//") {
        (Anchor::Descendant, rest)
    } else if let Some(rest) = path.strip_prefix('/') {
        (Anchor::Absolute, rest)
    } else {
        (Anchor::Relative, path)
    };
    let steps = rest.split('/').map(str::trim).filter(|s| !s.is_empty()).collect();
    (anchor, steps)
}

/// Last step of `path` after the same trimming lookups apply, if any.
pub fn last_step(path: &str) -> Option<&str> {
    split(path).1.last().copied()
}

fn step_matches(node: &XmlNode, step: &str) -> bool {
    step == "*" || node.name == step
}

fn collect_descendants(node: &XmlNode, step: &str, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    if step_matches(node, step) {
        out.push(prefix.clone());
    }
    for (i, child) in node.children.iter().enumerate() {
        prefix.push(i);
        collect_descendants(child, step, prefix, out);
        prefix.pop();
    }
}

/// Resolves `path` against `context`, returning index paths (child positions
/// from `context`) of every match in document order.
pub fn select_paths(context: &XmlNode, path: &str) -> Vec<Vec<usize>> {
    let (anchor, steps) = split(path);
    let Some((first, rest)) = steps.split_first() else {
        return vec![Vec::new()];
    };

    let mut current: Vec<Vec<usize>> = match anchor {
        Anchor::Descendant => {
            let mut out = Vec::new();
            collect_descendants(context, first, &mut Vec::new(), &mut out);
            out
        }
        Anchor::Absolute => {
            if step_matches(context, first) {
                vec![Vec::new()]
            } else {
                Vec::new()
            }
        }
        Anchor::Relative => child_matches(context, &Vec::new(), first),
    };

    for step in rest {
        current = current
            .iter()
            .flat_map(|prefix| child_matches(context, prefix, step))
            .collect();
    }
    current
}

fn child_matches(context: &XmlNode, prefix: &[usize], step: &str) -> Vec<Vec<usize>> {
    let Some(parent) = node_at(context, prefix) else {
        return Vec::new();
    };
    parent
        .children
        .iter()
        .enumerate()
        .filter(|(_, c)| step_matches(c, step))
        .map(|(i, _)| {
            let mut p = prefix.to_vec();
            p.push(i);
            p
        })
        .collect()
}

pub fn node_at<'a>(context: &'a XmlNode, index_path: &[usize]) -> Option<&'a XmlNode> {
    index_path
        .iter()
        .try_fold(context, |node, &i| node.children.get(i))
}

pub fn node_at_mut<'a>(context: &'a mut XmlNode, index_path: &[usize]) -> Option<&'a mut XmlNode> {
    index_path
        .iter()
        .try_fold(context, |node, &i| node.children.get_mut(i))
}

pub fn select_nodes<'a>(context: &'a XmlNode, path: &str) -> Vec<&'a XmlNode> {
    select_paths(context, path)
        .iter()
        .filter_map(|p| node_at(context, p))
        .collect()
}

pub fn select_single<'a>(context: &'a XmlNode, path: &str) -> Option<&'a XmlNode> {
    select_paths(context, path)
        .first()
        .and_then(|p| node_at(context, p))
}

pub fn select_single_mut<'a>(context: &'a mut XmlNode, path: &str) -> Option<&'a mut XmlNode> {
    let first = select_paths(context, path).into_iter().next()?;
    node_at_mut(context, &first)
}

/// Returns the node at `path`, creating any missing elements on the way.
///
/// The first matching element is reused at every step. A `//` first step that
/// matches nothing is created as a direct child of `context`.
pub fn ensure_path<'a>(context: &'a mut XmlNode, path: &str) -> &'a mut XmlNode {
    let (anchor, steps) = split(path);
    let mut steps = steps.into_iter().peekable();

    let start: Vec<usize> = match anchor {
        Anchor::Descendant => match steps.next() {
            Some(first) => match select_paths(context, &format!("//{first}")).into_iter().next() {
                Some(found) => found,
                None => {
                    context.children.push(XmlNode::new(first));
                    vec![context.children.len() - 1]
                }
            },
            None => Vec::new(),
        },
        Anchor::Absolute => {
            if steps.peek().is_some_and(|first| step_matches(context, first)) {
                steps.next();
            }
            Vec::new()
        }
        Anchor::Relative => Vec::new(),
    };

    let mut node = descend(context, &start);
    for step in steps {
        node = node.ensure_child(step);
    }
    node
}

/// Walks `index_path` as far as it resolves.
fn descend<'a>(mut node: &'a mut XmlNode, index_path: &[usize]) -> &'a mut XmlNode {
    for &i in index_path {
        if i >= node.children.len() {
            break;
        }
        node = &mut node.children[i];
    }
    node
}

impl XmlDocument {
    pub fn select_nodes(&self, path: &str) -> Vec<&XmlNode> {
        select_nodes(&self.root, path)
    }

    pub fn select_single(&self, path: &str) -> Option<&XmlNode> {
        select_single(&self.root, path)
    }

    pub fn select_single_mut(&mut self, path: &str) -> Option<&mut XmlNode> {
        select_single_mut(&mut self.root, path)
    }

    pub fn ensure_path(&mut self, path: &str) -> &mut XmlNode {
        ensure_path(&mut self.root, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> XmlNode {
        XmlNode::parse(
            r#"<Main>
                 <Config><A>1</A></Config>
                 <Flow>
                   <Page><PageName>one</PageName></Page>
                   <Page><PageName>two</PageName></Page>
                 </Flow>
                 <Products>
                   <Product><Locales><Locale name="en"/></Locales></Product>
                 </Products>
               </Main>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_descendant_lookup() {
        let root = sample();
        let pages = select_nodes(&root, "//Flow/Page");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].child("PageName").unwrap().text, "two");

        assert_eq!(select_single(&root, "//Config/A").unwrap().text, "1");
        assert_eq!(select_nodes(&root, "//Locale").len(), 1);
    }

    #[test]
    fn test_descendant_lookup_includes_context() {
        let root = sample();
        assert_eq!(select_nodes(&root, "//Main").len(), 1);
    }

    #[test]
    fn test_absolute_and_relative_lookup() {
        let root = sample();
        assert!(select_single(&root, "/Main/Config/A").is_some());
        assert!(select_single(&root, "/Other/Config").is_none());
        assert_eq!(select_nodes(&root, "Flow/Page").len(), 2);
        assert_eq!(select_nodes(&root, "Flow/*").len(), 2);
        assert!(select_single(&root, "Page").is_none());
    }

    #[test]
    fn test_last_step_is_trimmed() {
        assert_eq!(last_step("//Config/WORK_DIR"), Some("WORK_DIR"));
        assert_eq!(last_step("WORK_DIR/"), Some("WORK_DIR"));
        assert_eq!(last_step(" WORK_DIR "), Some("WORK_DIR"));
        assert_eq!(last_step("//"), None);
    }

    #[test]
    fn test_ensure_path_creates_missing_elements() {
        let mut root = sample();
        ensure_path(&mut root, "//Config/NEW_KEY").text = "v".into();
        assert_eq!(select_single(&root, "//Config/NEW_KEY").unwrap().text, "v");
        // Existing Config reused, not duplicated
        assert_eq!(root.children_named("Config").count(), 1);

        ensure_path(&mut root, "//Missing/Deep").text = "x".into();
        assert_eq!(root.child("Missing").unwrap().child("Deep").unwrap().text, "x");

        ensure_path(&mut root, "/Main/Flow/Extra");
        assert!(select_single(&root, "//Flow/Extra").is_some());
    }
}

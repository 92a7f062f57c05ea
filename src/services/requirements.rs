//! Requirement tree construction.
//!
//! A product's `<PreInstall>` / `<PostInstall>` sections hold a nested boolean
//! expression:
//!
//! ```xml
//! <Requirements logicalOp="OR">
//!   <Requirement>
//!     <Type>RegistryKeyExists</Type>
//!     <Keys logicalOp="AND"><Key type="HKLM">Software\Vendor</Key></Keys>
//!     <Value compareOp="gte">2.0</Value>
//!     <Delta>7</Delta>
//!   </Requirement>
//!   <Requirements>
//!     ...
//!   </Requirements>
//! </Requirements>
//! ```
//!
//! Building is a pure recursive function over the node tree. A group's operator
//! is its own `logicalOp`, else the operator handed down by its parent, else AND.
//! Leaf requirements default their key operator to AND and never inherit.
//!
//! Evaluation belongs to a [`RequirementEvaluator`]; this module only calls it
//! to materialize product custom variables.

use crate::models::{LogicalOperator, Requirement, RequirementGroup, RequirementKey};
use crate::xml::XmlNode;
use crate::xml::accessor::{get_child_attribute, get_string, get_string_attribute};

/// Evaluates a single requirement against the running system.
#[cfg_attr(test, mockall::automock)]
pub trait RequirementEvaluator {
    /// Returns the evaluated value (often `"true"`/`"false"`, sometimes a looked-up string).
    fn eval_requirement(&self, requirement: &Requirement) -> String;
}

/// Evaluator used when none is wired in: every requirement evaluates to an
/// empty string.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEvaluator;

impl RequirementEvaluator for NullEvaluator {
    fn eval_requirement(&self, requirement: &Requirement) -> String {
        tracing::warn!(
            "No requirement evaluator configured, {} evaluates to empty",
            requirement.requirement_type
        );
        String::new()
    }
}

fn declared_operator(node: &XmlNode, element: &str) -> Option<LogicalOperator> {
    let raw = get_child_attribute(Some(node), element, "logicalOp");
    if raw.trim().is_empty() {
        return None;
    }
    let parsed = LogicalOperator::parse(&raw);
    if parsed.is_none() {
        tracing::warn!("Unknown logicalOp {:?} on <{}>, ignoring", raw, node.name);
    }
    parsed
}

/// Builds the root group of a requirement section.
///
/// No groups yields the empty AND group. Only the first group is honored; extra
/// top-level `<Requirements>` siblings are an authoring error and are ignored.
pub fn build_requirements_root(groups: &[&XmlNode]) -> RequirementGroup {
    match groups {
        [] => RequirementGroup::default(),
        [first, rest @ ..] => {
            if !rest.is_empty() {
                tracing::debug!(
                    "{} extra top-level <Requirements> ignored, first wins",
                    rest.len()
                );
            }
            build_requirements_group(first, None)
        }
    }
}

/// Builds one group and, recursively, its nested groups.
pub fn build_requirements_group(node: &XmlNode, inherited: Option<LogicalOperator>) -> RequirementGroup {
    let declared = declared_operator(node, "Requirements").or(inherited);
    let logical_operator = declared.unwrap_or_default();

    RequirementGroup {
        logical_operator,
        requirements: node.children_named("Requirement").map(build_requirement).collect(),
        groups: node
            .children_named("Requirements")
            .map(|child| build_requirements_group(child, declared))
            .collect(),
        unfulfilled_requirement_type: get_string(Some(node), "UnfulfilledRequirementType", ""),
        unfulfilled_requirement_delta: get_string(Some(node), "UnfulfilledRequirementDelta", ""),
    }
}

/// Builds a leaf `<Requirement>`.
pub fn build_requirement(node: &XmlNode) -> Requirement {
    Requirement {
        requirement_type: get_string(Some(node), "Type", ""),
        value: get_string(Some(node), "Value", ""),
        value_operator: get_child_attribute(Some(node), "Value", "compareOp"),
        delta: get_string(Some(node), "Delta", ""),
        logical_operator: declared_operator(node, "Keys").unwrap_or_default(),
        keys: build_keys(node),
    }
}

fn build_keys(node: &XmlNode) -> Vec<RequirementKey> {
    node.child("Keys")
        .map(|keys| {
            keys.children_named("Key")
                .map(|key| RequirementKey {
                    key_type: get_string_attribute(Some(key), "type", ""),
                    key_value: get_string(Some(key), "", ""),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Evaluates each named custom variable under `CustomVars` and writes the
/// result back as a child element `<{name}>result</{name}>`.
///
/// Results overwrite earlier evaluations of the same variable. Nodes without a
/// usable `name` attribute, including previously written results, are skipped.
/// Returns the number of variables evaluated.
pub fn eval_custom_variables(custom_vars: &mut XmlNode, evaluator: &dyn RequirementEvaluator) -> usize {
    let pending: Vec<(String, Requirement)> = custom_vars
        .children
        .iter()
        .filter(|var| !var.attributes.is_empty())
        .filter_map(|var| {
            let name = get_string_attribute(Some(var), "name", "");
            if !is_element_name(&name) {
                if !name.is_empty() {
                    tracing::warn!("Custom variable name {:?} is not a valid element name", name);
                }
                return None;
            }
            let requirement = Requirement {
                requirement_type: get_string(Some(var), "Type", ""),
                logical_operator: declared_operator(var, "Keys").unwrap_or_default(),
                keys: build_keys(var),
                ..Default::default()
            };
            Some((name, requirement))
        })
        .collect();

    for (name, requirement) in &pending {
        let value = evaluator.eval_requirement(requirement);
        tracing::debug!("Custom variable {} = {}", name, value);
        let slot = match custom_vars
            .children
            .iter()
            .position(|c| c.name == *name && c.attributes.is_empty())
        {
            Some(i) => &mut custom_vars.children[i],
            None => {
                custom_vars.children.push(XmlNode::new(name.as_str()));
                let last = custom_vars.children.len() - 1;
                &mut custom_vars.children[last]
            }
        };
        slot.text = value;
        slot.children.clear();
    }
    pending.len()
}

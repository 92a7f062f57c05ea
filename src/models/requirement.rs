use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical operator combining the children of a requirement group, or the keys
/// of a single requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    /// Parses `AND` / `OR`, case-insensitively. Blank or unknown tokens yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequirementKey {
    pub key_type: String,
    pub key_value: String,
}

/// A single leaf condition, evaluated by an external handler.
///
/// `delta` is an optional tolerance (time window, version distance, ...) whose
/// meaning belongs to the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Requirement {
    pub requirement_type: String,
    pub value: String,
    pub value_operator: String,
    pub delta: String,
    pub logical_operator: LogicalOperator,
    pub keys: Vec<RequirementKey>,
}

/// A node of the requirement tree: leaf requirements plus nested groups, all
/// combined with `logical_operator`.
///
/// The default value (AND, no children) is the "no requirements" root, which
/// evaluators treat as satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequirementGroup {
    pub logical_operator: LogicalOperator,
    pub requirements: Vec<Requirement>,
    pub groups: Vec<RequirementGroup>,
    pub unfulfilled_requirement_type: String,
    pub unfulfilled_requirement_delta: String,
}

impl RequirementGroup {
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty() && self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_operator_parse() {
        assert_eq!(LogicalOperator::parse("or"), Some(LogicalOperator::Or));
        assert_eq!(LogicalOperator::parse(" AND "), Some(LogicalOperator::And));
        assert_eq!(LogicalOperator::parse(""), None);
        assert_eq!(LogicalOperator::parse("XOR"), None);
        assert_eq!(LogicalOperator::default(), LogicalOperator::And);
    }

    #[test]
    fn test_default_group_is_empty_and() {
        let group = RequirementGroup::default();
        assert!(group.is_empty());
        assert_eq!(group.logical_operator, LogicalOperator::And);
    }
}

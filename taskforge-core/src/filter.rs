//! Typed filter expressions for graph queries
//!
//! Operators form a closed set. Untyped input (for example an operator string
//! arriving from an API layer) goes through [`FilterOperator::from_str`],
//! which rejects anything it does not recognise instead of letting the
//! filter match everything.

use crate::{Node, NodeType, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Filter operator for property comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Substring of a string, or element of an array
    Contains,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Gt => "gt",
            FilterOperator::Lt => "lt",
            FilterOperator::Contains => "contains",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "==" => Ok(FilterOperator::Eq),
            "gt" | ">" => Ok(FilterOperator::Gt),
            "lt" | "<" => Ok(FilterOperator::Lt),
            "contains" => Ok(FilterOperator::Contains),
            _ => Err(ValidationError::UnknownOperator {
                operator: s.to_string(),
            }),
        }
    }
}

/// Typed comparison operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Number(value as f64)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl FilterValue {
    /// Whether a JSON value equals this operand. Mismatched types never match.
    fn equals(&self, value: &Value) -> bool {
        match (self, value) {
            (FilterValue::Bool(a), Value::Bool(b)) => a == b,
            (FilterValue::Number(a), Value::Number(b)) => b.as_f64() == Some(*a),
            (FilterValue::Text(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering of a JSON value relative to this operand.
    fn compare(&self, value: &Value) -> Option<Ordering> {
        match (value, self) {
            (Value::Number(v), FilterValue::Number(a)) => v.as_f64()?.partial_cmp(a),
            (Value::String(v), FilterValue::Text(a)) => Some(v.as_str().cmp(a.as_str())),
            _ => None,
        }
    }
}

/// A single `property operator value` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Filter {
    pub property: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(
        property: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            property: property.into(),
            operator,
            value: value.into(),
        }
    }

    /// Build a filter from an untyped operator string.
    pub fn parse(
        property: impl Into<String>,
        operator: &str,
        value: impl Into<FilterValue>,
    ) -> Result<Self, ValidationError> {
        Ok(Self::new(property, operator.parse()?, value))
    }

    pub fn eq(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(property, FilterOperator::Eq, value)
    }

    pub fn gt(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(property, FilterOperator::Gt, value)
    }

    pub fn lt(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(property, FilterOperator::Lt, value)
    }

    pub fn contains(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(property, FilterOperator::Contains, value)
    }

    /// Evaluate against a node. A missing property never matches.
    pub fn matches(&self, node: &Node) -> bool {
        let Some(actual) = node.property(&self.property) else {
            return false;
        };
        match self.operator {
            FilterOperator::Eq => self.value.equals(&actual),
            FilterOperator::Gt => self.value.compare(&actual) == Some(Ordering::Greater),
            FilterOperator::Lt => self.value.compare(&actual) == Some(Ordering::Less),
            FilterOperator::Contains => match (&actual, &self.value) {
                (Value::String(haystack), FilterValue::Text(needle)) => {
                    haystack.contains(needle.as_str())
                }
                (Value::Array(items), operand) => items.iter().any(|item| operand.equals(item)),
                _ => false,
            },
        }
    }
}

/// Sort key for query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrderBy {
    pub property: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            descending: false,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            descending: true,
        }
    }
}

/// Order two JSON property values; missing or incomparable values sort last.
pub fn compare_property_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Bool(_) => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            _ => 3,
        }
    }

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}

/// Parameters for `GraphStore::query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GraphQuery {
    /// Restrict to these node types (all types when `None`)
    pub node_types: Option<Vec<NodeType>>,
    /// All filters must match
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl GraphQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(node_type: NodeType) -> Self {
        Self {
            node_types: Some(vec![node_type]),
            ..Self::default()
        }
    }

    pub fn with_types(mut self, node_types: Vec<NodeType>) -> Self {
        self.node_types = Some(node_types);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a node passes the type restriction and every filter.
    pub fn matches(&self, node: &Node) -> bool {
        let type_ok = self
            .node_types
            .as_ref()
            .map(|types| types.contains(&node.node_type))
            .unwrap_or(true);
        type_ok && self.filters.iter().all(|f| f.matches(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::new_entity_id;
    use serde_json::json;

    fn task_node(data: Value) -> Node {
        Node::new(new_entity_id(), NodeType::Task, data)
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = Filter::parse("status", "regex", "a.*").unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownOperator {
                operator: "regex".to_string()
            }
        );
    }

    #[test]
    fn test_operator_parse_symbols() {
        assert_eq!(">".parse::<FilterOperator>(), Ok(FilterOperator::Gt));
        assert_eq!("EQ".parse::<FilterOperator>(), Ok(FilterOperator::Eq));
    }

    #[test]
    fn test_eq_requires_matching_types() {
        let node = task_node(json!({"priority": 3, "status": "active"}));
        assert!(Filter::eq("priority", 3i64).matches(&node));
        assert!(!Filter::eq("priority", "3").matches(&node));
        assert!(Filter::eq("status", "active").matches(&node));
    }

    #[test]
    fn test_gt_lt_numeric() {
        let node = task_node(json!({"complexity": 0.6}));
        assert!(Filter::gt("complexity", 0.5).matches(&node));
        assert!(!Filter::gt("complexity", 0.6).matches(&node));
        assert!(Filter::lt("complexity", 0.7).matches(&node));
    }

    #[test]
    fn test_contains_string_and_array() {
        let node = task_node(json!({"title": "Refactor parser", "skills": ["rust", "sql"]}));
        assert!(Filter::contains("title", "parser").matches(&node));
        assert!(Filter::contains("skills", "sql").matches(&node));
        assert!(!Filter::contains("skills", "go").matches(&node));
    }

    #[test]
    fn test_missing_property_never_matches() {
        let node = task_node(json!({}));
        assert!(!Filter::eq("status", "active").matches(&node));
        assert!(!Filter::lt("priority", 10i64).matches(&node));
    }

    #[test]
    fn test_compare_property_values_missing_last() {
        let one = json!(1);
        assert_eq!(compare_property_values(Some(&one), None), Ordering::Less);
        assert_eq!(compare_property_values(None, Some(&one)), Ordering::Greater);
    }

    #[test]
    fn test_query_type_restriction() {
        let node = task_node(json!({}));
        assert!(GraphQuery::of_type(NodeType::Task).matches(&node));
        assert!(!GraphQuery::of_type(NodeType::Agent).matches(&node));
        assert!(GraphQuery::new().matches(&node));
    }
}

//! Filter expression tree.

use super::{MetadataField, Param};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operators understood by the IR.
///
/// Not every backend supports every operator; see
/// [`crate::render::QueryRenderer::supports_filter_operator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Exists,
    NotExists,
    ArrayContains,
    ArrayContainsAny,
    ArrayContainsAll,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 17] = [
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::Gt,
        FilterOperator::Ge,
        FilterOperator::Lt,
        FilterOperator::Le,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::Contains,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::Matches,
        FilterOperator::Exists,
        FilterOperator::NotExists,
        FilterOperator::ArrayContains,
        FilterOperator::ArrayContainsAny,
        FilterOperator::ArrayContainsAll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "EQ",
            FilterOperator::Ne => "NE",
            FilterOperator::Gt => "GT",
            FilterOperator::Ge => "GE",
            FilterOperator::Lt => "LT",
            FilterOperator::Le => "LE",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT_IN",
            FilterOperator::Contains => "CONTAINS",
            FilterOperator::StartsWith => "STARTS_WITH",
            FilterOperator::EndsWith => "ENDS_WITH",
            FilterOperator::Matches => "MATCHES",
            FilterOperator::Exists => "EXISTS",
            FilterOperator::NotExists => "NOT_EXISTS",
            FilterOperator::ArrayContains => "ARRAY_CONTAINS",
            FilterOperator::ArrayContainsAny => "ARRAY_CONTAINS_ANY",
            FilterOperator::ArrayContainsAll => "ARRAY_CONTAINS_ALL",
        }
    }

    /// Whether a condition with this operator compares against a value.
    ///
    /// Existence checks are the only unary operators.
    pub fn takes_value(&self) -> bool {
        !matches!(self, FilterOperator::Exists | FilterOperator::NotExists)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean connective of a [`FilterGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicOperator {
    And,
    Or,
    /// Negation; the group must hold exactly one child
    Not,
}

impl fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicOperator::And => "AND",
            LogicOperator::Or => "OR",
            LogicOperator::Not => "NOT",
        })
    }
}

/// A node of the filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterItem {
    Condition(FilterCondition),
    Group(FilterGroup),
    Range(RangeFilter),
    Geo(GeoFilter),
}

impl FilterItem {
    /// Variant name, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            FilterItem::Condition(_) => "condition",
            FilterItem::Group(_) => "group",
            FilterItem::Range(_) => "range",
            FilterItem::Geo(_) => "geo",
        }
    }

    /// Number of nested groups on the deepest path (leaves count 0)
    pub fn depth(&self) -> usize {
        match self {
            FilterItem::Group(group) => {
                1 + group
                    .children
                    .iter()
                    .map(FilterItem::depth)
                    .max()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Append every param in the subtree, in pre-order.
    pub fn collect_params<'a>(&'a self, out: &mut Vec<&'a Param>) {
        match self {
            FilterItem::Condition(cond) => out.extend(cond.value.iter()),
            FilterItem::Group(group) => {
                for child in &group.children {
                    child.collect_params(out);
                }
            }
            FilterItem::Range(range) => {
                out.extend(range.min.iter());
                out.extend(range.max.iter());
            }
            FilterItem::Geo(geo) => {
                out.push(&geo.center.lat);
                out.push(&geo.center.lon);
                out.push(&geo.radius);
            }
        }
    }
}

/// Leaf comparison `field <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: MetadataField,
    pub operator: FilterOperator,
    /// Absent for EXISTS / NOT_EXISTS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Param>,
}

/// Boolean combination of child filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub logic: LogicOperator,
    pub children: Vec<FilterItem>,
}

/// Numeric range on one field. At least one bound must be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub field: MetadataField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Param>,
    #[serde(default)]
    pub min_exclusive: bool,
    #[serde(default)]
    pub max_exclusive: bool,
}

/// Geographic coordinate made of two params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: Param,
    pub lon: Param,
}

/// "Within `radius` of `center`" on a geo field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFilter {
    pub field: MetadataField,
    pub center: GeoPoint,
    pub radius: Param,
}

impl From<FilterCondition> for FilterItem {
    fn from(value: FilterCondition) -> Self {
        FilterItem::Condition(value)
    }
}

impl From<FilterGroup> for FilterItem {
    fn from(value: FilterGroup) -> Self {
        FilterItem::Group(value)
    }
}

impl From<RangeFilter> for FilterItem {
    fn from(value: RangeFilter) -> Self {
        FilterItem::Range(value)
    }
}

impl From<GeoFilter> for FilterItem {
    fn from(value: GeoFilter) -> Self {
        FilterItem::Geo(value)
    }
}

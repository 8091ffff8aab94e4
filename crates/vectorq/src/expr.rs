//! Constructors for filter nodes, vector values and upsert records.
//!
//! ```
//! use vectorq::expr::{and, eq, gt, or};
//! use vectorq::{FilterItem, MetadataField, Param};
//!
//! let price_or_category = or([
//!     FilterItem::from(gt(MetadataField::new("price"), Param::new("min_price"))),
//!     FilterItem::from(eq(MetadataField::new("category"), Param::new("category"))),
//! ]);
//! let filter = and([
//!     FilterItem::from(eq(MetadataField::new("active"), Param::new("active"))),
//!     FilterItem::from(price_or_category),
//! ]);
//! assert_eq!(filter.children.len(), 2);
//! ```

use crate::ir::{
    FilterCondition, FilterGroup, FilterItem, FilterOperator, GeoFilter, GeoPoint, LogicOperator,
    MetadataField, Param, RangeFilter, SparseVectorValue, VectorRecord, VectorValue,
};

// ============================================================================
// Conditions
// ============================================================================

/// Binary condition `field <op> value`
pub fn condition(field: MetadataField, operator: FilterOperator, value: Param) -> FilterCondition {
    FilterCondition {
        field,
        operator,
        value: Some(value),
    }
}

pub fn eq(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::Eq, value)
}

pub fn ne(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::Ne, value)
}

pub fn gt(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::Gt, value)
}

pub fn gte(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::Ge, value)
}

pub fn lt(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::Lt, value)
}

pub fn lte(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::Le, value)
}

/// `field IN value` (the bound value is a list)
pub fn is_in(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::In, value)
}

pub fn not_in(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::NotIn, value)
}

pub fn contains(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::Contains, value)
}

pub fn starts_with(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::StartsWith, value)
}

pub fn ends_with(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::EndsWith, value)
}

/// Regex match
pub fn matches(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::Matches, value)
}

pub fn exists(field: MetadataField) -> FilterCondition {
    FilterCondition {
        field,
        operator: FilterOperator::Exists,
        value: None,
    }
}

pub fn not_exists(field: MetadataField) -> FilterCondition {
    FilterCondition {
        field,
        operator: FilterOperator::NotExists,
        value: None,
    }
}

pub fn array_contains(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::ArrayContains, value)
}

pub fn array_contains_any(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::ArrayContainsAny, value)
}

pub fn array_contains_all(field: MetadataField, value: Param) -> FilterCondition {
    condition(field, FilterOperator::ArrayContainsAll, value)
}

// ============================================================================
// Groups
// ============================================================================

pub fn and(children: impl IntoIterator<Item = FilterItem>) -> FilterGroup {
    FilterGroup {
        logic: LogicOperator::And,
        children: children.into_iter().collect(),
    }
}

pub fn or(children: impl IntoIterator<Item = FilterItem>) -> FilterGroup {
    FilterGroup {
        logic: LogicOperator::Or,
        children: children.into_iter().collect(),
    }
}

/// Negate a single filter
pub fn not(child: impl Into<FilterItem>) -> FilterGroup {
    FilterGroup {
        logic: LogicOperator::Not,
        children: vec![child.into()],
    }
}

// ============================================================================
// Range and geo
// ============================================================================

/// Inclusive range; either bound may be omitted
pub fn range(field: MetadataField, min: Option<Param>, max: Option<Param>) -> RangeFilter {
    RangeFilter {
        field,
        min,
        max,
        min_exclusive: false,
        max_exclusive: false,
    }
}

/// Range with both bounds exclusive
pub fn range_exclusive(field: MetadataField, min: Option<Param>, max: Option<Param>) -> RangeFilter {
    RangeFilter {
        min_exclusive: true,
        max_exclusive: true,
        ..range(field, min, max)
    }
}

pub fn geo(field: MetadataField, lat: Param, lon: Param, radius: Param) -> GeoFilter {
    GeoFilter {
        field,
        center: GeoPoint { lat, lon },
        radius,
    }
}

// ============================================================================
// Vectors and records
// ============================================================================

pub fn vec_param(param: Param) -> VectorValue {
    VectorValue::Param(param)
}

pub fn vec_literal(values: impl Into<Vec<f32>>) -> VectorValue {
    VectorValue::Literal(values.into())
}

pub fn sparse_param(param: Param) -> SparseVectorValue {
    SparseVectorValue::Param(param)
}

pub fn sparse_literal(indices: impl Into<Vec<u32>>, values: impl Into<Vec<f32>>) -> SparseVectorValue {
    SparseVectorValue::Literal {
        indices: indices.into(),
        values: values.into(),
    }
}

/// Builder for a single [`VectorRecord`].
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: VectorRecord,
}

impl RecordBuilder {
    pub fn new(id: Param, vector: VectorValue) -> Self {
        Self {
            record: VectorRecord::new(id, vector),
        }
    }

    /// Bind a metadata field; a repeated field replaces the earlier binding
    pub fn with_metadata(mut self, field: MetadataField, value: Param) -> Self {
        self.record.metadata.insert(field, value);
        self
    }

    pub fn with_sparse_vector(mut self, sparse: SparseVectorValue) -> Self {
        self.record.sparse_vector = Some(sparse);
        self
    }

    pub fn build(self) -> VectorRecord {
        self.record
    }
}

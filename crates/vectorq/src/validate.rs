//! Structural validation.
//!
//! Checks a completed [`VectorQuery`] against the per-operation rules and the
//! configured [`Limits`] before any renderer touches it.

use crate::config::Limits;
use crate::error::{ValidationError, ValidationResult};
use crate::ir::{
    FilterCondition, FilterItem, LogicOperator, Operation, PaginationValue, SparseVectorValue,
    VectorQuery,
};

/// Validate with the default limits.
pub fn validate(query: &VectorQuery) -> ValidationResult<()> {
    Validator::default().validate(query)
}

/// Validator bound to a set of limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    limits: Limits,
}

impl Validator {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Check `query`, returning the first violated rule.
    pub fn validate(&self, query: &VectorQuery) -> ValidationResult<()> {
        if query.target.name.is_empty() {
            return Err(ValidationError::MissingTarget);
        }

        match query.operation {
            Operation::Search => self.validate_search(query),
            Operation::Upsert => self.validate_upsert(query),
            Operation::Delete => self.validate_delete(query),
            Operation::Fetch => self.validate_fetch(query),
            Operation::Update => self.validate_update(query),
        }
    }

    fn validate_search(&self, query: &VectorQuery) -> ValidationResult<()> {
        if query.query_vector.is_none() {
            return Err(ValidationError::MissingQueryVector);
        }

        match &query.top_k {
            None => return Err(ValidationError::MissingTopK),
            Some(PaginationValue::Static(k)) => {
                if *k > self.limits.max_top_k {
                    return Err(ValidationError::TopKTooLarge {
                        value: *k,
                        max: self.limits.max_top_k,
                    });
                }
                if *k == 0 {
                    return Err(ValidationError::TopKNotPositive { value: *k });
                }
            }
            Some(PaginationValue::Param(_)) => {}
        }

        if query.metadata_fields.len() > self.limits.max_metadata_fields {
            return Err(ValidationError::TooManyMetadataFields {
                count: query.metadata_fields.len(),
                max: self.limits.max_metadata_fields,
            });
        }

        if let Some(filter) = &query.filter {
            self.validate_filter(filter, 0)?;
        }

        Ok(())
    }

    fn validate_upsert(&self, query: &VectorQuery) -> ValidationResult<()> {
        if query.vectors.is_empty() {
            return Err(ValidationError::EmptyUpsert);
        }
        if query.vectors.len() > self.limits.max_batch_size {
            return Err(ValidationError::BatchTooLarge {
                count: query.vectors.len(),
                max: self.limits.max_batch_size,
            });
        }

        for (i, record) in query.vectors.iter().enumerate() {
            if let Some(SparseVectorValue::Literal { indices, values }) = &record.sparse_vector {
                if indices.len() != values.len() {
                    return Err(ValidationError::SparseLengthMismatch {
                        record: i,
                        indices: indices.len(),
                        values: values.len(),
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_delete(&self, query: &VectorQuery) -> ValidationResult<()> {
        if query.ids.is_empty() && query.filter.is_none() {
            return Err(ValidationError::DeleteWithoutTarget);
        }
        if query.filter.is_some() && !query.delete_all {
            return Err(ValidationError::DeleteAllRequired);
        }
        self.check_id_count(query.ids.len())?;

        if let Some(filter) = &query.filter {
            self.validate_filter(filter, 0)?;
        }

        Ok(())
    }

    fn validate_fetch(&self, query: &VectorQuery) -> ValidationResult<()> {
        if query.ids.is_empty() {
            return Err(ValidationError::FetchWithoutIds);
        }
        self.check_id_count(query.ids.len())
    }

    fn validate_update(&self, query: &VectorQuery) -> ValidationResult<()> {
        if query.ids.is_empty() {
            return Err(ValidationError::UpdateWithoutIds);
        }
        if query.updates.is_empty() {
            return Err(ValidationError::UpdateWithoutFields);
        }
        self.check_id_count(query.ids.len())
    }

    fn check_id_count(&self, count: usize) -> ValidationResult<()> {
        if count > self.limits.max_ids {
            return Err(ValidationError::TooManyIds {
                count,
                max: self.limits.max_ids,
            });
        }
        Ok(())
    }

    /// Walk the filter tree. `depth` is the number of enclosing groups.
    ///
    /// The walk stops as soon as a group would exceed the depth limit, so it
    /// never descends further than `max_filter_depth + 1` levels.
    fn validate_filter(&self, item: &FilterItem, depth: usize) -> ValidationResult<()> {
        match item {
            FilterItem::Group(group) => {
                let level = depth + 1;
                if level > self.limits.max_filter_depth {
                    return Err(ValidationError::FilterTooDeep {
                        depth: level,
                        max: self.limits.max_filter_depth,
                    });
                }
                if group.logic == LogicOperator::Not && group.children.len() != 1 {
                    return Err(ValidationError::NotArity {
                        children: group.children.len(),
                    });
                }
                if group.children.is_empty() {
                    return Err(ValidationError::EmptyGroup { logic: group.logic });
                }
                for child in &group.children {
                    self.validate_filter(child, level)?;
                }
                Ok(())
            }
            FilterItem::Condition(cond) => validate_condition(cond),
            FilterItem::Range(range) => {
                if range.min.is_none() && range.max.is_none() {
                    return Err(ValidationError::EmptyRange {
                        field: range.field.name.clone(),
                    });
                }
                Ok(())
            }
            FilterItem::Geo(_) => Ok(()),
        }
    }
}

fn validate_condition(cond: &FilterCondition) -> ValidationResult<()> {
    match (cond.operator.takes_value(), cond.value.is_some()) {
        (true, false) => Err(ValidationError::MissingConditionValue {
            field: cond.field.name.clone(),
            operator: cond.operator,
        }),
        (false, true) => Err(ValidationError::UnexpectedConditionValue {
            field: cond.field.name.clone(),
            operator: cond.operator,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{and, eq, exists, not, range, vec_param};
    use crate::ir::{
        Collection, FilterCondition, FilterGroup, FilterOperator, MetadataField, Param,
        VectorRecord,
    };

    fn search() -> VectorQuery {
        let mut query = VectorQuery::new(Operation::Search, Collection::new("products"));
        query.query_vector = Some(vec_param(Param::new("query_vec")));
        query.top_k = Some(PaginationValue::Static(10));
        query
    }

    fn field(name: &str) -> MetadataField {
        MetadataField::new(name)
    }

    /// `levels` nested AND groups around a single condition
    fn nested(levels: usize) -> FilterItem {
        let mut item: FilterItem = eq(field("a"), Param::new("a")).into();
        for _ in 0..levels {
            item = and(vec![item]).into();
        }
        item
    }

    // =========================================================================
    // Common rules
    // =========================================================================

    #[test]
    fn test_missing_target() {
        let mut query = search();
        query.target = Collection::new("");
        assert_eq!(validate(&query), Err(ValidationError::MissingTarget));
    }

    #[test]
    fn test_validate_is_idempotent() {
        let query = search();
        assert_eq!(validate(&query), validate(&query));
        let mut bad = search();
        bad.top_k = None;
        assert_eq!(validate(&bad), validate(&bad));
    }

    // =========================================================================
    // SEARCH
    // =========================================================================

    #[test]
    fn test_search_minimal_is_valid() {
        assert_eq!(validate(&search()), Ok(()));
    }

    #[test]
    fn test_search_requires_vector() {
        let mut query = search();
        query.query_vector = None;
        assert_eq!(validate(&query), Err(ValidationError::MissingQueryVector));
    }

    #[test]
    fn test_search_requires_top_k() {
        let mut query = search();
        query.top_k = None;
        assert_eq!(validate(&query), Err(ValidationError::MissingTopK));
    }

    #[test]
    fn test_search_top_k_bounds() {
        let mut query = search();
        query.top_k = Some(PaginationValue::Static(0));
        assert_eq!(
            validate(&query),
            Err(ValidationError::TopKNotPositive { value: 0 })
        );

        query.top_k = Some(PaginationValue::Static(10_001));
        assert_eq!(
            validate(&query),
            Err(ValidationError::TopKTooLarge {
                value: 10_001,
                max: 10_000
            })
        );

        query.top_k = Some(PaginationValue::Static(10_000));
        assert_eq!(validate(&query), Ok(()));
    }

    #[test]
    fn test_search_param_top_k_skips_static_checks() {
        let mut query = search();
        query.top_k = Some(PaginationValue::Param(Param::new("k")));
        assert_eq!(validate(&query), Ok(()));
    }

    #[test]
    fn test_search_metadata_field_limit() {
        let mut query = search();
        query.metadata_fields = (0..51).map(|i| field(&format!("f{i}"))).collect();
        assert_eq!(
            validate(&query),
            Err(ValidationError::TooManyMetadataFields { count: 51, max: 50 })
        );
    }

    #[test]
    fn test_custom_limits_are_reported() {
        let validator = Validator::new(Limits {
            max_top_k: 50,
            ..Limits::default()
        });
        let mut query = search();
        query.top_k = Some(PaginationValue::Static(51));
        assert_eq!(
            validator.validate(&query),
            Err(ValidationError::TopKTooLarge { value: 51, max: 50 })
        );
    }

    // =========================================================================
    // Filter shape
    // =========================================================================

    #[test]
    fn test_filter_depth_five_passes() {
        let mut query = search();
        query.filter = Some(nested(5));
        assert_eq!(validate(&query), Ok(()));
    }

    #[test]
    fn test_filter_depth_six_fails() {
        let mut query = search();
        query.filter = Some(nested(6));
        assert_eq!(
            validate(&query),
            Err(ValidationError::FilterTooDeep { depth: 6, max: 5 })
        );
    }

    #[test]
    fn test_filter_depth_counts_groups_not_leaves() {
        let mut query = search();
        query.filter = Some(range(field("price"), Some(Param::new("lo")), None).into());
        assert_eq!(validate(&query), Ok(()));
    }

    #[test]
    fn test_empty_group_still_counts_as_a_level() {
        let mut item = FilterItem::Group(FilterGroup {
            logic: LogicOperator::And,
            children: vec![],
        });
        for _ in 0..5 {
            item = and(vec![item]).into();
        }
        let mut query = search();
        query.filter = Some(item);
        assert!(matches!(
            validate(&query),
            Err(ValidationError::FilterTooDeep { .. })
        ));
    }

    #[test]
    fn test_not_group_arity() {
        let mut query = search();
        query.filter = Some(FilterItem::Group(FilterGroup {
            logic: LogicOperator::Not,
            children: vec![nested(0), nested(0)],
        }));
        assert_eq!(
            validate(&query),
            Err(ValidationError::NotArity { children: 2 })
        );

        query.filter = Some(not(nested(0)).into());
        assert_eq!(validate(&query), Ok(()));
    }

    #[test]
    fn test_empty_and_or_groups_rejected() {
        let mut query = search();
        for logic in [LogicOperator::And, LogicOperator::Or] {
            query.filter = Some(FilterItem::Group(FilterGroup {
                logic,
                children: Vec::new(),
            }));
            assert_eq!(validate(&query), Err(ValidationError::EmptyGroup { logic }));
        }

        query.filter = Some(FilterItem::Group(FilterGroup {
            logic: LogicOperator::Not,
            children: Vec::new(),
        }));
        assert_eq!(validate(&query), Err(ValidationError::NotArity { children: 0 }));
    }

    #[test]
    fn test_empty_range_rejected() {
        let mut query = search();
        query.filter = Some(range(field("price"), None, None).into());
        assert_eq!(
            validate(&query),
            Err(ValidationError::EmptyRange {
                field: "price".to_string()
            })
        );
    }

    #[test]
    fn test_condition_value_arity() {
        let mut query = search();
        query.filter = Some(
            FilterCondition {
                field: field("tag"),
                operator: FilterOperator::Eq,
                value: None,
            }
            .into(),
        );
        assert!(matches!(
            validate(&query),
            Err(ValidationError::MissingConditionValue { .. })
        ));

        query.filter = Some(
            FilterCondition {
                field: field("tag"),
                operator: FilterOperator::Exists,
                value: Some(Param::new("tag")),
            }
            .into(),
        );
        assert!(matches!(
            validate(&query),
            Err(ValidationError::UnexpectedConditionValue { .. })
        ));

        query.filter = Some(exists(field("tag")).into());
        assert_eq!(validate(&query), Ok(()));
    }

    // =========================================================================
    // UPSERT
    // =========================================================================

    fn record(i: usize) -> VectorRecord {
        VectorRecord::new(
            Param::new(format!("id{i}")),
            vec_param(Param::new(format!("vec{i}"))),
        )
    }

    #[test]
    fn test_upsert_requires_vectors() {
        let query = VectorQuery::new(Operation::Upsert, Collection::new("docs"));
        assert_eq!(validate(&query), Err(ValidationError::EmptyUpsert));
    }

    #[test]
    fn test_upsert_batch_limit() {
        let mut query = VectorQuery::new(Operation::Upsert, Collection::new("docs"));
        query.vectors = (0..100).map(record).collect();
        assert_eq!(validate(&query), Ok(()));

        query.vectors.push(record(100));
        assert_eq!(
            validate(&query),
            Err(ValidationError::BatchTooLarge {
                count: 101,
                max: 100
            })
        );
    }

    #[test]
    fn test_upsert_sparse_length_mismatch() {
        let mut query = VectorQuery::new(Operation::Upsert, Collection::new("docs"));
        let mut rec = record(0);
        rec.sparse_vector = Some(SparseVectorValue::Literal {
            indices: vec![1, 5],
            values: vec![0.5],
        });
        query.vectors.push(rec);
        assert_eq!(
            validate(&query),
            Err(ValidationError::SparseLengthMismatch {
                record: 0,
                indices: 2,
                values: 1
            })
        );
    }

    // =========================================================================
    // DELETE / FETCH / UPDATE
    // =========================================================================

    #[test]
    fn test_delete_requires_ids_or_filter() {
        let query = VectorQuery::new(Operation::Delete, Collection::new("docs"));
        assert_eq!(validate(&query), Err(ValidationError::DeleteWithoutTarget));
    }

    #[test]
    fn test_delete_by_filter_requires_delete_all() {
        let mut query = VectorQuery::new(Operation::Delete, Collection::new("docs"));
        query.filter = Some(nested(1));
        assert_eq!(validate(&query), Err(ValidationError::DeleteAllRequired));

        query.delete_all = true;
        assert_eq!(validate(&query), Ok(()));
    }

    #[test]
    fn test_delete_by_ids_needs_no_flag() {
        let mut query = VectorQuery::new(Operation::Delete, Collection::new("docs"));
        query.ids = vec![Param::new("id1"), Param::new("id2")];
        assert_eq!(validate(&query), Ok(()));
    }

    #[test]
    fn test_delete_filter_depth_is_checked() {
        let mut query = VectorQuery::new(Operation::Delete, Collection::new("docs"));
        query.filter = Some(nested(6));
        query.delete_all = true;
        assert_eq!(
            validate(&query),
            Err(ValidationError::FilterTooDeep { depth: 6, max: 5 })
        );
    }

    #[test]
    fn test_id_limits() {
        let ids: Vec<Param> = (0..1001).map(|i| Param::new(format!("id{i}"))).collect();

        let mut fetch = VectorQuery::new(Operation::Fetch, Collection::new("docs"));
        fetch.ids = ids.clone();
        assert_eq!(
            validate(&fetch),
            Err(ValidationError::TooManyIds {
                count: 1001,
                max: 1000
            })
        );

        let mut delete = VectorQuery::new(Operation::Delete, Collection::new("docs"));
        delete.ids = ids;
        assert!(matches!(
            validate(&delete),
            Err(ValidationError::TooManyIds { .. })
        ));
    }

    #[test]
    fn test_fetch_requires_ids() {
        let query = VectorQuery::new(Operation::Fetch, Collection::new("docs"));
        assert_eq!(validate(&query), Err(ValidationError::FetchWithoutIds));
    }

    #[test]
    fn test_update_requirements() {
        let mut query = VectorQuery::new(Operation::Update, Collection::new("docs"));
        assert_eq!(validate(&query), Err(ValidationError::UpdateWithoutIds));

        query.ids.push(Param::new("id"));
        assert_eq!(validate(&query), Err(ValidationError::UpdateWithoutFields));

        query.updates.insert(field("status"), Param::new("status"));
        assert_eq!(validate(&query), Ok(()));
    }
}

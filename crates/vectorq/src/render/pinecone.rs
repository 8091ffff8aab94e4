//! Pinecone renderer.
//!
//! Produces Pinecone REST bodies (`/query`, `/vectors/upsert`,
//! `/vectors/delete`, `/vectors/fetch`, `/vectors/update`). Filters use the
//! MongoDB-style operator set (`$eq`, `$in`, `$and`, ...). Pinecone has no
//! `$not`, so negation is pushed down to the leaves: comparison operators are
//! inverted and groups are rewritten with De Morgan's laws.

use super::{
    condition_value, degrade_feature, encode_floats, keyed, pagination_json, resolve_operator,
    vector_json, ParamCollector, QueryRenderer, RenderedQuery,
};
use crate::config::RenderOptions;
use crate::error::{RenderError, RenderResult, ValidationError};
use crate::ir::{
    DistanceMetric, FilterCondition, FilterGroup, FilterItem, FilterOperator, LogicOperator,
    Operation, RangeFilter, SparseVectorValue, VectorQuery,
};
use crate::validate::Validator;
use serde_json::{Map, Value};
use tracing::{debug, trace};

const NAME: &str = "pinecone";

/// Pinecone renderer.
#[derive(Debug, Clone, Default)]
pub struct PineconeRenderer {
    pub options: RenderOptions,
}

/// Pinecone's leaf operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists(bool),
}

impl Op {
    fn native(operator: FilterOperator) -> Option<Op> {
        match operator {
            FilterOperator::Eq => Some(Op::Eq),
            FilterOperator::Ne => Some(Op::Ne),
            FilterOperator::Gt => Some(Op::Gt),
            FilterOperator::Ge => Some(Op::Gte),
            FilterOperator::Lt => Some(Op::Lt),
            FilterOperator::Le => Some(Op::Lte),
            FilterOperator::In => Some(Op::In),
            FilterOperator::NotIn => Some(Op::Nin),
            FilterOperator::Exists => Some(Op::Exists(true)),
            FilterOperator::NotExists => Some(Op::Exists(false)),
            _ => None,
        }
    }

    /// The operator matching exactly the documents this one rejects
    fn negate(self) -> Op {
        match self {
            Op::Eq => Op::Ne,
            Op::Ne => Op::Eq,
            Op::Gt => Op::Lte,
            Op::Gte => Op::Lt,
            Op::Lt => Op::Gte,
            Op::Lte => Op::Gt,
            Op::In => Op::Nin,
            Op::Nin => Op::In,
            Op::Exists(present) => Op::Exists(!present),
        }
    }

    fn key(self) -> &'static str {
        match self {
            Op::Eq => "$eq",
            Op::Ne => "$ne",
            Op::Gt => "$gt",
            Op::Gte => "$gte",
            Op::Lt => "$lt",
            Op::Lte => "$lte",
            Op::In => "$in",
            Op::Nin => "$nin",
            Op::Exists(_) => "$exists",
        }
    }
}

impl PineconeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RenderOptions) -> Self {
        Self { options }
    }

    fn render_search(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        if query.min_score.is_some() {
            degrade_feature(NAME, self.options.feature_policy, "min_score")?;
        }

        let mut doc = Map::new();
        if let Some(top_k) = &query.top_k {
            doc.insert("topK".into(), pagination_json(top_k, params));
        }
        if let Some(vector) = &query.query_vector {
            doc.insert("vector".into(), vector_json(vector, "query vector", params)?);
        }
        doc.insert("includeValues".into(), Value::Bool(query.include_vectors));
        doc.insert("includeMetadata".into(), Value::Bool(query.include_metadata));
        if let Some(filter) = &query.filter {
            doc.insert("filter".into(), self.render_filter(filter, false, params)?);
        }
        self.insert_namespace(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_upsert(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut vectors = Vec::with_capacity(query.vectors.len());
        for record in &query.vectors {
            let mut entry = Map::new();
            entry.insert("id".into(), params.bind(&record.id));
            entry.insert("values".into(), vector_json(&record.vector, "record vector", params)?);

            if !record.metadata.is_empty() {
                let metadata: Map<String, Value> = record
                    .metadata
                    .iter()
                    .map(|(field, value)| (field.name.clone(), params.bind(value)))
                    .collect();
                entry.insert("metadata".into(), Value::Object(metadata));
            }

            if let Some(sparse) = &record.sparse_vector {
                let sparse = match sparse {
                    SparseVectorValue::Param(param) => params.bind(param),
                    SparseVectorValue::Literal { indices, values } => {
                        let mut obj = Map::new();
                        obj.insert("indices".into(), Value::from(indices.clone()));
                        obj.insert("values".into(), encode_floats("sparse vector", values)?);
                        Value::Object(obj)
                    }
                };
                entry.insert("sparseValues".into(), sparse);
            }

            vectors.push(Value::Object(entry));
        }

        let mut doc = Map::new();
        doc.insert("vectors".into(), Value::Array(vectors));
        self.insert_namespace(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_delete(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = Map::new();
        if !query.ids.is_empty() {
            doc.insert("ids".into(), self.bind_ids(query, params));
        } else if let Some(filter) = &query.filter {
            doc.insert("filter".into(), self.render_filter(filter, false, params)?);
            // deleteAll=true would ignore the filter and clear the namespace
            doc.insert("deleteAll".into(), Value::Bool(false));
        }
        self.insert_namespace(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_fetch(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = Map::new();
        doc.insert("ids".into(), self.bind_ids(query, params));
        self.insert_namespace(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_update(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        // One object per request; the rest of the ids are dropped
        if query.ids.len() > 1 {
            degrade_feature(
                NAME,
                self.options.feature_policy,
                format!("UPDATE of {} ids in one request", query.ids.len()),
            )?;
        }

        let mut doc = Map::new();
        if let Some(id) = query.ids.first() {
            doc.insert("id".into(), params.bind(id));
        }
        let set_metadata: Map<String, Value> = query
            .updates
            .iter()
            .map(|(field, value)| (field.name.clone(), params.bind(value)))
            .collect();
        doc.insert("setMetadata".into(), Value::Object(set_metadata));
        self.insert_namespace(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn bind_ids(&self, query: &VectorQuery, params: &mut ParamCollector) -> Value {
        Value::Array(query.ids.iter().map(|id| params.bind(id)).collect())
    }

    fn insert_namespace(
        &self,
        doc: &mut Map<String, Value>,
        query: &VectorQuery,
        params: &mut ParamCollector,
    ) {
        if let Some(namespace) = &query.namespace {
            doc.insert("namespace".into(), params.bind(namespace));
        }
    }

    /// Render a filter node, applying a pending negation when `negated`
    fn render_filter(
        &self,
        item: &FilterItem,
        negated: bool,
        params: &mut ParamCollector,
    ) -> RenderResult<Value> {
        trace!(dialect = NAME, kind = item.kind(), negated, "rendering filter node");
        match item {
            FilterItem::Condition(condition) => self.render_condition(condition, negated, params),
            FilterItem::Group(group) => self.render_group(group, negated, params),
            FilterItem::Range(range) => self.render_range(range, negated, params),
            FilterItem::Geo(_) => Err(RenderError::UnsupportedFilter {
                dialect: NAME,
                kind: "geo",
            }),
        }
    }

    fn render_condition(
        &self,
        condition: &FilterCondition,
        negated: bool,
        params: &mut ParamCollector,
    ) -> RenderResult<Value> {
        let op = resolve_operator(
            NAME,
            self.options.operator_policy,
            condition.operator,
            Op::native(condition.operator),
            Op::Eq,
        )?;
        let op = if negated { op.negate() } else { op };

        let operand = match op {
            Op::Exists(present) => Value::Bool(present),
            _ => params.bind(condition_value(condition)?),
        };
        Ok(keyed(condition.field.name.clone(), keyed(op.key(), operand)))
    }

    fn render_group(
        &self,
        group: &FilterGroup,
        negated: bool,
        params: &mut ParamCollector,
    ) -> RenderResult<Value> {
        let key = match (group.logic, negated) {
            (LogicOperator::And, false) | (LogicOperator::Or, true) => "$and",
            (LogicOperator::Or, false) | (LogicOperator::And, true) => "$or",
            (LogicOperator::Not, _) => {
                let [child] = group.children.as_slice() else {
                    return Err(ValidationError::NotArity {
                        children: group.children.len(),
                    }
                    .into());
                };
                return self.render_filter(child, !negated, params);
            }
        };

        let children = group
            .children
            .iter()
            .map(|child| self.render_filter(child, negated, params))
            .collect::<RenderResult<Vec<_>>>()?;
        Ok(keyed(key, Value::Array(children)))
    }

    fn render_range(
        &self,
        range: &RangeFilter,
        negated: bool,
        params: &mut ParamCollector,
    ) -> RenderResult<Value> {
        let min_op = if range.min_exclusive { Op::Gt } else { Op::Gte };
        let max_op = if range.max_exclusive { Op::Lt } else { Op::Lte };
        let field = range.field.name.clone();

        if !negated {
            let mut bounds = Map::new();
            if let Some(min) = &range.min {
                bounds.insert(min_op.key().into(), params.bind(min));
            }
            if let Some(max) = &range.max {
                bounds.insert(max_op.key().into(), params.bind(max));
            }
            return Ok(keyed(field, Value::Object(bounds)));
        }

        // Outside the range: below the lower bound or above the upper one
        let mut outside = Vec::new();
        if let Some(min) = &range.min {
            outside.push(keyed(field.clone(), keyed(min_op.negate().key(), params.bind(min))));
        }
        if let Some(max) = &range.max {
            outside.push(keyed(field.clone(), keyed(max_op.negate().key(), params.bind(max))));
        }
        match outside.len() {
            1 => Ok(outside.remove(0)),
            _ => Ok(keyed("$or", Value::Array(outside))),
        }
    }
}

impl QueryRenderer for PineconeRenderer {
    fn name(&self) -> &str {
        NAME
    }

    fn render(&self, query: &VectorQuery) -> Result<RenderedQuery, RenderError> {
        Validator::new(self.options.limits).validate(query)?;
        debug!(
            dialect = NAME,
            operation = %query.operation,
            collection = %query.target.name,
            "rendering query"
        );

        let mut params = ParamCollector::new();
        let document = match query.operation {
            Operation::Search => self.render_search(query, &mut params)?,
            Operation::Upsert => self.render_upsert(query, &mut params)?,
            Operation::Delete => self.render_delete(query, &mut params)?,
            Operation::Fetch => self.render_fetch(query, &mut params)?,
            Operation::Update => self.render_update(query, &mut params)?,
        };

        let rendered = RenderedQuery::package(&document, params)?;
        debug!(
            dialect = NAME,
            params = rendered.required_params.len(),
            bytes = rendered.json.len(),
            "rendered query"
        );
        Ok(rendered)
    }

    fn supports_operation(&self, _operation: Operation) -> bool {
        true
    }

    fn supports_filter_operator(&self, operator: FilterOperator) -> bool {
        Op::native(operator).is_some()
    }

    fn supports_metric(&self, metric: DistanceMetric) -> bool {
        !matches!(metric, DistanceMetric::Manhattan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeaturePolicy, OperatorPolicy};
    use crate::expr::{
        and, eq, exists, geo, gt, is_in, not, or, range, sparse_literal, starts_with, vec_literal,
        vec_param, RecordBuilder,
    };
    use crate::ir::{Collection, MetadataField, PaginationValue, Param};
    use serde_json::json;
    use test_case::test_case;

    fn field(name: &str) -> MetadataField {
        MetadataField::new(name)
    }

    fn p(name: &str) -> Param {
        Param::new(name)
    }

    fn search(filter: Option<FilterItem>) -> VectorQuery {
        let mut query = VectorQuery::new(Operation::Search, Collection::new("products"));
        query.query_vector = Some(vec_param(p("query_vec")));
        query.top_k = Some(PaginationValue::Static(10));
        query.include_metadata = true;
        query.filter = filter;
        query
    }

    fn render(query: &VectorQuery) -> RenderedQuery {
        PineconeRenderer::new().render(query).unwrap()
    }

    // ========================================================================
    // Search
    // ========================================================================

    #[test]
    fn test_render_basic_search() {
        let result = render(&search(None));

        assert_eq!(
            result.json,
            r#"{"includeMetadata":true,"includeValues":false,"topK":10,"vector":":query_vec"}"#
        );
        assert_eq!(result.required_params, vec!["query_vec"]);
    }

    #[test]
    fn test_render_search_with_nested_filter() {
        let filter = and([
            FilterItem::from(eq(field("active"), p("active"))),
            FilterItem::from(or([
                FilterItem::from(gt(field("price"), p("min_price"))),
                FilterItem::from(eq(field("category"), p("category"))),
            ])),
        ]);
        let result = render(&search(Some(filter.into())));
        let doc = result.document().unwrap();

        assert_eq!(
            doc["filter"],
            json!({
                "$and": [
                    { "active": { "$eq": ":active" } },
                    { "$or": [
                        { "price": { "$gt": ":min_price" } },
                        { "category": { "$eq": ":category" } }
                    ]}
                ]
            })
        );
        assert_eq!(
            result.required_params,
            vec!["query_vec", "active", "min_price", "category"]
        );
    }

    #[test]
    fn test_render_literal_vector_and_namespace() {
        let mut query = search(None);
        query.query_vector = Some(vec_literal(vec![0.1, 0.2]));
        query.top_k = Some(PaginationValue::Param(p("k")));
        query.namespace = Some(p("tenant"));

        let result = render(&query);

        assert_eq!(
            result.json,
            r#"{"includeMetadata":true,"includeValues":false,"namespace":":tenant","topK":":k","vector":[0.1,0.2]}"#
        );
        assert_eq!(result.required_params, vec!["k", "tenant"]);
    }

    #[test]
    fn test_min_score_is_dropped_by_default() {
        let mut query = search(None);
        query.min_score = Some(p("threshold"));

        let result = render(&query);

        assert_eq!(
            result.json,
            r#"{"includeMetadata":true,"includeValues":false,"topK":10,"vector":":query_vec"}"#
        );
        assert_eq!(result.required_params, vec!["query_vec"]);
    }

    #[test]
    fn test_min_score_rejected_under_reject_policy() {
        let mut query = search(None);
        query.min_score = Some(p("threshold"));
        let renderer = PineconeRenderer::with_options(RenderOptions {
            feature_policy: FeaturePolicy::Reject,
            ..Default::default()
        });

        let err = renderer.render(&query).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedFeature { dialect: "pinecone", .. }));
    }

    #[test]
    fn test_non_finite_literal_fails() {
        let mut query = search(None);
        query.query_vector = Some(vec_literal(vec![1.0, f32::INFINITY]));

        let err = PineconeRenderer::new().render(&query).unwrap_err();
        assert!(matches!(err, RenderError::NonFiniteLiteral { index: 1, .. }));
    }

    // ========================================================================
    // Filters
    // ========================================================================

    #[test]
    fn test_range_exclusive_min_only() {
        let mut r = range(field("price"), Some(p("lo")), None);
        r.min_exclusive = true;
        let doc = render(&search(Some(r.into()))).document().unwrap();

        assert_eq!(doc["filter"], json!({ "price": { "$gt": ":lo" } }));
    }

    #[test]
    fn test_range_both_bounds_share_field_object() {
        let r = range(field("price"), Some(p("lo")), Some(p("hi")));
        let result = render(&search(Some(r.into())));
        let doc = result.document().unwrap();

        assert_eq!(doc["filter"], json!({ "price": { "$gte": ":lo", "$lte": ":hi" } }));
        assert_eq!(result.required_params, vec!["query_vec", "lo", "hi"]);
    }

    #[test]
    fn test_exists_uses_boolean_operand() {
        let doc = render(&search(Some(exists(field("tag")).into())))
            .document()
            .unwrap();

        assert_eq!(doc["filter"], json!({ "tag": { "$exists": true } }));
    }

    #[test]
    fn test_not_inverts_leaf_operator() {
        let filter = not(is_in(field("category"), p("cats")));
        let doc = render(&search(Some(filter.into()))).document().unwrap();

        assert_eq!(doc["filter"], json!({ "category": { "$nin": ":cats" } }));
    }

    #[test]
    fn test_not_applies_de_morgan_to_groups() {
        let filter = not(and([
            FilterItem::from(eq(field("a"), p("a"))),
            FilterItem::from(exists(field("b"))),
        ]));
        let doc = render(&search(Some(filter.into()))).document().unwrap();

        assert_eq!(
            doc["filter"],
            json!({ "$or": [
                { "a": { "$ne": ":a" } },
                { "b": { "$exists": false } }
            ]})
        );
    }

    #[test]
    fn test_double_negation_cancels() {
        let filter = not(not(gt(field("n"), p("n"))));
        let doc = render(&search(Some(filter.into()))).document().unwrap();

        assert_eq!(doc["filter"], json!({ "n": { "$gt": ":n" } }));
    }

    #[test]
    fn test_negated_range_becomes_outside_bounds() {
        let filter = not(range(field("price"), Some(p("lo")), Some(p("hi"))));
        let doc = render(&search(Some(filter.into()))).document().unwrap();

        assert_eq!(
            doc["filter"],
            json!({ "$or": [
                { "price": { "$lt": ":lo" } },
                { "price": { "$gt": ":hi" } }
            ]})
        );
    }

    #[test]
    fn test_unsupported_operator_falls_back_to_eq() {
        let filter = starts_with(field("title"), p("prefix"));
        let doc = render(&search(Some(filter.into()))).document().unwrap();

        assert_eq!(doc["filter"], json!({ "title": { "$eq": ":prefix" } }));
    }

    #[test]
    fn test_unsupported_operator_rejected_by_policy() {
        let renderer = PineconeRenderer::with_options(RenderOptions {
            operator_policy: OperatorPolicy::Reject,
            ..Default::default()
        });
        let query = search(Some(starts_with(field("title"), p("prefix")).into()));

        let err = renderer.render(&query).unwrap_err();
        assert!(matches!(
            err,
            RenderError::UnsupportedOperator {
                operator: FilterOperator::StartsWith,
                ..
            }
        ));
    }

    #[test]
    fn test_geo_filter_unsupported() {
        let filter = geo(field("loc"), p("lat"), p("lon"), p("radius"));
        let err = PineconeRenderer::new()
            .render(&search(Some(filter.into())))
            .unwrap_err();

        assert!(matches!(
            err,
            RenderError::UnsupportedFilter {
                dialect: "pinecone",
                kind: "geo"
            }
        ));
    }

    // ========================================================================
    // Writes and lookups
    // ========================================================================

    #[test]
    fn test_render_upsert_records() {
        let mut query = VectorQuery::new(Operation::Upsert, Collection::new("docs"));
        query.vectors = vec![
            RecordBuilder::new(p("id1"), vec_param(p("v1")))
                .with_metadata(field("title"), p("t1"))
                .build(),
            RecordBuilder::new(p("id2"), vec_literal(vec![0.5]))
                .with_sparse_vector(sparse_literal(vec![3, 7], vec![0.25, 0.5]))
                .build(),
        ];
        query.namespace = Some(p("ns"));

        let result = render(&query);

        assert_eq!(
            result.document().unwrap(),
            json!({
                "vectors": [
                    { "id": ":id1", "values": ":v1", "metadata": { "title": ":t1" } },
                    {
                        "id": ":id2",
                        "values": [0.5],
                        "sparseValues": { "indices": [3, 7], "values": [0.25, 0.5] }
                    }
                ],
                "namespace": ":ns"
            })
        );
        assert_eq!(result.required_params, vec!["id1", "v1", "t1", "id2", "ns"]);
    }

    #[test]
    fn test_render_delete_by_ids_keeps_order() {
        let mut query = VectorQuery::new(Operation::Delete, Collection::new("docs"));
        query.ids = vec![p("id1"), p("id2")];

        let result = render(&query);

        assert_eq!(result.json, r#"{"ids":[":id1",":id2"]}"#);
        assert_eq!(result.required_params, vec!["id1", "id2"]);
    }

    #[test]
    fn test_render_delete_by_filter() {
        let mut query = VectorQuery::new(Operation::Delete, Collection::new("docs"));
        query.filter = Some(eq(field("stale"), p("stale")).into());
        query.delete_all = true;

        let result = render(&query);

        assert_eq!(
            result.json,
            r#"{"deleteAll":false,"filter":{"stale":{"$eq":":stale"}}}"#
        );
    }

    #[test]
    fn test_render_fetch() {
        let mut query = VectorQuery::new(Operation::Fetch, Collection::new("docs"));
        query.ids = vec![p("a"), p("b")];
        query.namespace = Some(p("ns"));

        assert_eq!(render(&query).json, r#"{"ids":[":a",":b"],"namespace":":ns"}"#);
    }

    #[test]
    fn test_render_update_single_id() {
        let mut query = VectorQuery::new(Operation::Update, Collection::new("docs"));
        query.ids = vec![p("id")];
        query.updates.insert(field("status"), p("status"));

        let result = render(&query);

        assert_eq!(result.json, r#"{"id":":id","setMetadata":{"status":":status"}}"#);
        assert_eq!(result.required_params, vec!["id", "status"]);
    }

    #[test]
    fn test_update_of_several_ids_keeps_first() {
        let mut query = VectorQuery::new(Operation::Update, Collection::new("docs"));
        query.ids = vec![p("a"), p("b")];
        query.updates.insert(field("status"), p("status"));

        let result = render(&query);
        assert_eq!(result.json, r#"{"id":":a","setMetadata":{"status":":status"}}"#);
        assert_eq!(result.required_params, vec!["a", "status"]);

        let strict = PineconeRenderer::with_options(RenderOptions {
            feature_policy: FeaturePolicy::Reject,
            ..Default::default()
        });
        assert!(matches!(
            strict.render(&query).unwrap_err(),
            RenderError::UnsupportedFeature { .. }
        ));
    }

    #[test]
    fn test_invalid_query_is_rejected_before_rendering() {
        let query = VectorQuery::new(Operation::Fetch, Collection::new("docs"));
        let err = PineconeRenderer::new().render(&query).unwrap_err();

        assert!(matches!(err, RenderError::Invalid(_)));
    }

    // ========================================================================
    // Capabilities
    // ========================================================================

    #[test_case(FilterOperator::Eq, true)]
    #[test_case(FilterOperator::NotIn, true)]
    #[test_case(FilterOperator::NotExists, true)]
    #[test_case(FilterOperator::Contains, false)]
    #[test_case(FilterOperator::Matches, false)]
    #[test_case(FilterOperator::ArrayContainsAll, false)]
    fn test_supports_filter_operator(operator: FilterOperator, expected: bool) {
        assert_eq!(PineconeRenderer::new().supports_filter_operator(operator), expected);
    }

    #[test_case(DistanceMetric::Cosine, true)]
    #[test_case(DistanceMetric::DotProduct, true)]
    #[test_case(DistanceMetric::Manhattan, false)]
    fn test_supports_metric(metric: DistanceMetric, expected: bool) {
        assert_eq!(PineconeRenderer::new().supports_metric(metric), expected);
    }
}

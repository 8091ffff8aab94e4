//! Qdrant renderer.
//!
//! Produces Qdrant REST bodies (`/points/query`, `PUT /points`,
//! `/points/delete`, `POST /points`, `/points/payload`). Every filter node
//! renders to a Qdrant filter object (`must` / `should` / `must_not`), so
//! groups nest without special cases. A query namespace maps to `shard_key`.

use super::{
    condition_value, encode_floats, keyed, pagination_json, resolve_operator, vector_json,
    ParamCollector, QueryRenderer, RenderedQuery,
};
use crate::config::{QdrantConfig, RenderOptions};
use crate::error::{RenderError, RenderResult};
use crate::ir::{
    DistanceMetric, FilterCondition, FilterGroup, FilterItem, FilterOperator, GeoFilter,
    LogicOperator, Operation, RangeFilter, SparseVectorValue, VectorQuery, VectorRecord,
};
use crate::validate::Validator;
use serde_json::{Map, Value};
use tracing::{debug, trace};

const NAME: &str = "qdrant";

/// Qdrant renderer.
#[derive(Debug, Clone, Default)]
pub struct QdrantRenderer {
    pub config: QdrantConfig,
    pub options: RenderOptions,
}

/// Which clause of the wrapping filter a leaf lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Must,
    MustNot,
}

impl Clause {
    fn key(self) -> &'static str {
        match self {
            Clause::Must => "must",
            Clause::MustNot => "must_not",
        }
    }
}

/// Shape of a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leaf {
    Match(&'static str),
    Range(&'static str),
    IsEmpty,
}

/// Native translation of a filter operator: clause plus leaf shape.
fn native(operator: FilterOperator) -> Option<(Clause, Leaf)> {
    use FilterOperator as F;
    let leaf = match operator {
        F::Eq | F::ArrayContains => (Clause::Must, Leaf::Match("value")),
        F::Ne => (Clause::MustNot, Leaf::Match("value")),
        F::Gt => (Clause::Must, Leaf::Range("gt")),
        F::Ge => (Clause::Must, Leaf::Range("gte")),
        F::Lt => (Clause::Must, Leaf::Range("lt")),
        F::Le => (Clause::Must, Leaf::Range("lte")),
        F::In | F::ArrayContainsAny => (Clause::Must, Leaf::Match("any")),
        F::NotIn => (Clause::Must, Leaf::Match("except")),
        F::Contains => (Clause::Must, Leaf::Match("text")),
        F::Exists => (Clause::MustNot, Leaf::IsEmpty),
        F::NotExists => (Clause::Must, Leaf::IsEmpty),
        F::StartsWith | F::EndsWith | F::Matches | F::ArrayContainsAll => return None,
    };
    Some(leaf)
}

impl QdrantRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QdrantConfig, options: RenderOptions) -> Self {
        Self { config, options }
    }

    fn render_search(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = Map::new();

        if let Some(vector) = &query.query_vector {
            let mut target = Map::new();
            target.insert("vector".into(), vector_json(vector, "query vector", params)?);
            let name = query
                .query_embedding
                .as_ref()
                .map(|field| field.name.clone())
                .or_else(|| self.config.default_vector_name.clone());
            if let Some(name) = name {
                target.insert("name".into(), Value::String(name));
            }
            doc.insert("query".into(), Value::Object(target));
        }
        if let Some(top_k) = &query.top_k {
            doc.insert("limit".into(), pagination_json(top_k, params));
        }
        if let Some(min_score) = &query.min_score {
            doc.insert("score_threshold".into(), params.bind(min_score));
        }
        doc.insert("with_payload".into(), self.with_payload(query));
        doc.insert("with_vector".into(), Value::Bool(query.include_vectors));
        if let Some(filter) = &query.filter {
            doc.insert("filter".into(), self.render_filter(filter, params)?);
        }
        self.insert_shard_key(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_upsert(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let points = query
            .vectors
            .iter()
            .map(|record| self.render_point(record, params))
            .collect::<RenderResult<Vec<_>>>()?;

        let mut doc = Map::new();
        doc.insert("points".into(), Value::Array(points));
        self.insert_shard_key(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_point(&self, record: &VectorRecord, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut point = Map::new();
        point.insert("id".into(), params.bind(&record.id));

        let dense = vector_json(&record.vector, "record vector", params)?;
        let payload: Map<String, Value> = record
            .metadata
            .iter()
            .map(|(field, value)| (field.name.clone(), params.bind(value)))
            .collect();

        let vector = match &record.sparse_vector {
            None => dense,
            Some(sparse) => {
                // Named vectors: the dense one under the default name, the
                // sparse one under its own
                let sparse = match sparse {
                    SparseVectorValue::Param(param) => params.bind(param),
                    SparseVectorValue::Literal { indices, values } => {
                        let mut obj = Map::new();
                        obj.insert("indices".into(), Value::from(indices.clone()));
                        obj.insert("values".into(), encode_floats("sparse vector", values)?);
                        Value::Object(obj)
                    }
                };
                let mut named = Map::new();
                named.insert(
                    self.config.default_vector_name.clone().unwrap_or_default(),
                    dense,
                );
                named.insert(self.config.sparse_vector_name.clone(), sparse);
                Value::Object(named)
            }
        };
        point.insert("vector".into(), vector);

        if !payload.is_empty() {
            point.insert("payload".into(), Value::Object(payload));
        }
        Ok(Value::Object(point))
    }

    fn render_delete(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = Map::new();
        if !query.ids.is_empty() {
            doc.insert("points".into(), self.bind_ids(query, params));
        } else if let Some(filter) = &query.filter {
            doc.insert("filter".into(), self.render_filter(filter, params)?);
        }
        self.insert_shard_key(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_fetch(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = Map::new();
        doc.insert("ids".into(), self.bind_ids(query, params));
        doc.insert("with_payload".into(), self.with_payload(query));
        doc.insert("with_vector".into(), Value::Bool(query.include_vectors));
        self.insert_shard_key(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_update(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = Map::new();
        doc.insert("points".into(), self.bind_ids(query, params));
        let payload: Map<String, Value> = query
            .updates
            .iter()
            .map(|(field, value)| (field.name.clone(), params.bind(value)))
            .collect();
        doc.insert("payload".into(), Value::Object(payload));
        self.insert_shard_key(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    /// `true`/`false`, or the selected field names
    fn with_payload(&self, query: &VectorQuery) -> Value {
        if query.include_metadata && !query.metadata_fields.is_empty() {
            Value::Array(
                query
                    .metadata_fields
                    .iter()
                    .map(|field| Value::String(field.name.clone()))
                    .collect(),
            )
        } else {
            Value::Bool(query.include_metadata)
        }
    }

    fn bind_ids(&self, query: &VectorQuery, params: &mut ParamCollector) -> Value {
        Value::Array(query.ids.iter().map(|id| params.bind(id)).collect())
    }

    fn insert_shard_key(
        &self,
        doc: &mut Map<String, Value>,
        query: &VectorQuery,
        params: &mut ParamCollector,
    ) {
        if let Some(namespace) = &query.namespace {
            doc.insert("shard_key".into(), params.bind(namespace));
        }
    }

    fn render_filter(&self, item: &FilterItem, params: &mut ParamCollector) -> RenderResult<Value> {
        trace!(dialect = NAME, kind = item.kind(), "rendering filter node");
        match item {
            FilterItem::Condition(condition) => self.render_condition(condition, params),
            FilterItem::Group(group) => self.render_group(group, params),
            FilterItem::Range(range) => Ok(self.render_range(range, params)),
            FilterItem::Geo(geo) => Ok(self.render_geo(geo, params)),
        }
    }

    fn render_condition(
        &self,
        condition: &FilterCondition,
        params: &mut ParamCollector,
    ) -> RenderResult<Value> {
        let (clause, leaf) = resolve_operator(
            NAME,
            self.options.operator_policy,
            condition.operator,
            native(condition.operator),
            (Clause::Must, Leaf::Match("value")),
        )?;

        let key = condition.field.name.clone();
        let leaf = match leaf {
            Leaf::IsEmpty => keyed("is_empty", keyed("key", Value::String(key))),
            Leaf::Match(kind) => {
                let value = params.bind(condition_value(condition)?);
                let mut obj = Map::new();
                obj.insert("key".into(), Value::String(key));
                obj.insert("match".into(), keyed(kind, value));
                Value::Object(obj)
            }
            Leaf::Range(bound) => {
                let value = params.bind(condition_value(condition)?);
                let mut obj = Map::new();
                obj.insert("key".into(), Value::String(key));
                obj.insert("range".into(), keyed(bound, value));
                Value::Object(obj)
            }
        };
        Ok(keyed(clause.key(), Value::Array(vec![leaf])))
    }

    fn render_group(&self, group: &FilterGroup, params: &mut ParamCollector) -> RenderResult<Value> {
        let key = match group.logic {
            LogicOperator::And => "must",
            LogicOperator::Or => "should",
            LogicOperator::Not => "must_not",
        };
        let children = group
            .children
            .iter()
            .map(|child| self.render_filter(child, params))
            .collect::<RenderResult<Vec<_>>>()?;
        Ok(keyed(key, Value::Array(children)))
    }

    fn render_range(&self, range: &RangeFilter, params: &mut ParamCollector) -> Value {
        let mut bounds = Map::new();
        if let Some(min) = &range.min {
            let key = if range.min_exclusive { "gt" } else { "gte" };
            bounds.insert(key.into(), params.bind(min));
        }
        if let Some(max) = &range.max {
            let key = if range.max_exclusive { "lt" } else { "lte" };
            bounds.insert(key.into(), params.bind(max));
        }

        let mut leaf = Map::new();
        leaf.insert("key".into(), Value::String(range.field.name.clone()));
        leaf.insert("range".into(), Value::Object(bounds));
        keyed("must", Value::Array(vec![Value::Object(leaf)]))
    }

    fn render_geo(&self, geo: &GeoFilter, params: &mut ParamCollector) -> Value {
        let mut center = Map::new();
        center.insert("lat".into(), params.bind(&geo.center.lat));
        center.insert("lon".into(), params.bind(&geo.center.lon));

        let mut radius = Map::new();
        radius.insert("center".into(), Value::Object(center));
        radius.insert("radius".into(), params.bind(&geo.radius));

        let mut leaf = Map::new();
        leaf.insert("key".into(), Value::String(geo.field.name.clone()));
        leaf.insert("geo_radius".into(), Value::Object(radius));
        keyed("must", Value::Array(vec![Value::Object(leaf)]))
    }
}

impl QueryRenderer for QdrantRenderer {
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
        native(operator).is_some()
    }

    fn supports_metric(&self, _metric: DistanceMetric) -> bool {
        true
    }
}

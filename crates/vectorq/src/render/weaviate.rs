//! Weaviate renderer.
//!
//! Produces a JSON form of Weaviate's object and GraphQL `Get` arguments:
//! `nearVector`, `where` filters with `path`/`operator`/`value*` leaves, and
//! `tenant` for multi-tenancy. Class names follow Weaviate's convention of
//! a capitalized first letter.

use super::{
    condition_value, degrade_feature, pagination_json, resolve_operator, vector_json,
    ParamCollector, QueryRenderer, RenderedQuery,
};
use crate::config::{RenderOptions, WeaviateConfig};
use crate::error::{RenderError, RenderResult};
use crate::ir::{
    DistanceMetric, FilterCondition, FilterGroup, FilterItem, FilterOperator, GeoFilter,
    LogicOperator, Operation, RangeFilter, VectorQuery,
};
use crate::validate::Validator;
use serde_json::{Map, Value};
use tracing::{debug, trace};

const NAME: &str = "weaviate";

/// Weaviate renderer.
#[derive(Debug, Clone, Default)]
pub struct WeaviateRenderer {
    pub config: WeaviateConfig,
    pub options: RenderOptions,
}

/// Typed value slot of a `where` leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Text,
    Number,
    TextArray,
    /// `IsNull` carries a literal boolean instead of a param
    Null(bool),
}

impl Slot {
    fn key(self) -> &'static str {
        match self {
            Slot::Text => "valueString",
            Slot::Number => "valueNumber",
            Slot::TextArray => "valueTextArray",
            Slot::Null(_) => "valueBoolean",
        }
    }
}

fn native(operator: FilterOperator) -> Option<(&'static str, Slot)> {
    use FilterOperator as F;
    let leaf = match operator {
        F::Eq => ("Equal", Slot::Text),
        F::Ne => ("NotEqual", Slot::Text),
        F::Gt => ("GreaterThan", Slot::Number),
        F::Ge => ("GreaterThanEqual", Slot::Number),
        F::Lt => ("LessThan", Slot::Number),
        F::Le => ("LessThanEqual", Slot::Number),
        F::Contains | F::ArrayContains | F::ArrayContainsAny => ("ContainsAny", Slot::TextArray),
        F::ArrayContainsAll => ("ContainsAll", Slot::TextArray),
        F::Exists => ("IsNull", Slot::Null(false)),
        F::NotExists => ("IsNull", Slot::Null(true)),
        F::In | F::NotIn | F::StartsWith | F::EndsWith | F::Matches => return None,
    };
    Some(leaf)
}

impl WeaviateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: WeaviateConfig, options: RenderOptions) -> Self {
        Self { config, options }
    }

    fn class_name(&self, query: &VectorQuery) -> String {
        let name = &query.target.name;
        if !self.config.capitalize_class {
            return name.clone();
        }
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    fn render_search(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = Map::new();
        doc.insert("class".into(), Value::String(self.class_name(query)));

        let mut near_vector = Map::new();
        if let Some(vector) = &query.query_vector {
            near_vector.insert("vector".into(), vector_json(vector, "query vector", params)?);
        }
        if let Some(min_score) = &query.min_score {
            near_vector.insert("certainty".into(), params.bind(min_score));
        }
        if let Some(embedding) = &query.query_embedding {
            near_vector.insert(
                "targetVectors".into(),
                Value::Array(vec![Value::String(embedding.name.clone())]),
            );
        }
        doc.insert("nearVector".into(), Value::Object(near_vector));

        if let Some(top_k) = &query.top_k {
            doc.insert("limit".into(), pagination_json(top_k, params));
        }
        if query.include_metadata && !query.metadata_fields.is_empty() {
            doc.insert("properties".into(), self.properties(query));
        }
        if let Some(filter) = &query.filter {
            doc.insert("where".into(), self.render_filter(filter, params)?);
        }
        self.insert_tenant(&mut doc, query, params);

        let additional: &[&str] = if query.include_vectors {
            &["vector", "distance", "certainty"]
        } else {
            &["distance", "certainty"]
        };
        doc.insert("additional".into(), Value::from(additional.to_vec()));
        Ok(Value::Object(doc))
    }

    fn render_upsert(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let class = self.class_name(query);
        let mut objects = Vec::with_capacity(query.vectors.len());
        for record in &query.vectors {
            if record.sparse_vector.is_some() {
                degrade_feature(NAME, self.options.feature_policy, "sparse vectors")?;
            }

            let mut object = Map::new();
            object.insert("class".into(), Value::String(class.clone()));
            object.insert("id".into(), params.bind(&record.id));
            object.insert("vector".into(), vector_json(&record.vector, "record vector", params)?);
            if !record.metadata.is_empty() {
                let properties: Map<String, Value> = record
                    .metadata
                    .iter()
                    .map(|(field, value)| (field.name.clone(), params.bind(value)))
                    .collect();
                object.insert("properties".into(), Value::Object(properties));
            }
            objects.push(Value::Object(object));
        }

        let mut doc = Map::new();
        doc.insert("objects".into(), Value::Array(objects));
        self.insert_tenant(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_delete(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = Map::new();
        doc.insert("class".into(), Value::String(self.class_name(query)));
        if !query.ids.is_empty() {
            doc.insert("ids".into(), self.bind_ids(query, params));
        } else if let Some(filter) = &query.filter {
            doc.insert("where".into(), self.render_filter(filter, params)?);
        }
        self.insert_tenant(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_fetch(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = Map::new();
        doc.insert("class".into(), Value::String(self.class_name(query)));
        doc.insert("ids".into(), self.bind_ids(query, params));
        if query.include_metadata && !query.metadata_fields.is_empty() {
            doc.insert("properties".into(), self.properties(query));
        }
        if query.include_vectors {
            doc.insert("additional".into(), Value::from(vec!["vector"]));
        }
        self.insert_tenant(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_update(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        // Objects are patched one at a time; the rest of the ids are dropped
        if query.ids.len() > 1 {
            degrade_feature(
                NAME,
                self.options.feature_policy,
                format!("UPDATE of {} ids in one request", query.ids.len()),
            )?;
        }

        let mut doc = Map::new();
        doc.insert("class".into(), Value::String(self.class_name(query)));
        if let Some(id) = query.ids.first() {
            doc.insert("id".into(), params.bind(id));
        }
        let properties: Map<String, Value> = query
            .updates
            .iter()
            .map(|(field, value)| (field.name.clone(), params.bind(value)))
            .collect();
        doc.insert("properties".into(), Value::Object(properties));
        self.insert_tenant(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn properties(&self, query: &VectorQuery) -> Value {
        Value::Array(
            query
                .metadata_fields
                .iter()
                .map(|field| Value::String(field.name.clone()))
                .collect(),
        )
    }

    fn bind_ids(&self, query: &VectorQuery, params: &mut ParamCollector) -> Value {
        Value::Array(query.ids.iter().map(|id| params.bind(id)).collect())
    }

    fn insert_tenant(
        &self,
        doc: &mut Map<String, Value>,
        query: &VectorQuery,
        params: &mut ParamCollector,
    ) {
        if let Some(namespace) = &query.namespace {
            doc.insert("tenant".into(), params.bind(namespace));
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
        let (operator, slot) = resolve_operator(
            NAME,
            self.options.operator_policy,
            condition.operator,
            native(condition.operator),
            ("Equal", Slot::Text),
        )?;

        let value = match slot {
            Slot::Null(is_null) => Value::Bool(is_null),
            _ => params.bind(condition_value(condition)?),
        };
        Ok(leaf(&condition.field.name, operator, slot.key(), value))
    }

    fn render_group(&self, group: &FilterGroup, params: &mut ParamCollector) -> RenderResult<Value> {
        let operator = match group.logic {
            LogicOperator::And => "And",
            LogicOperator::Or => "Or",
            LogicOperator::Not => "Not",
        };
        let operands = group
            .children
            .iter()
            .map(|child| self.render_filter(child, params))
            .collect::<RenderResult<Vec<_>>>()?;
        Ok(compound(operator, operands))
    }

    fn render_range(&self, range: &RangeFilter, params: &mut ParamCollector) -> Value {
        let field = &range.field.name;
        let mut bounds = Vec::with_capacity(2);
        if let Some(min) = &range.min {
            let op = if range.min_exclusive { "GreaterThan" } else { "GreaterThanEqual" };
            bounds.push(leaf(field, op, Slot::Number.key(), params.bind(min)));
        }
        if let Some(max) = &range.max {
            let op = if range.max_exclusive { "LessThan" } else { "LessThanEqual" };
            bounds.push(leaf(field, op, Slot::Number.key(), params.bind(max)));
        }
        match bounds.len() {
            1 => bounds.remove(0),
            _ => compound("And", bounds),
        }
    }

    fn render_geo(&self, geo: &GeoFilter, params: &mut ParamCollector) -> Value {
        let mut coordinates = Map::new();
        coordinates.insert("latitude".into(), params.bind(&geo.center.lat));
        coordinates.insert("longitude".into(), params.bind(&geo.center.lon));

        let mut distance = Map::new();
        distance.insert("max".into(), params.bind(&geo.radius));

        let mut range = Map::new();
        range.insert("geoCoordinates".into(), Value::Object(coordinates));
        range.insert("distance".into(), Value::Object(distance));

        leaf(
            &geo.field.name,
            "WithinGeoRange",
            "valueGeoRange",
            Value::Object(range),
        )
    }
}

/// `{path: [field], operator, <slot>: value}`
fn leaf(field: &str, operator: &str, slot: &str, value: Value) -> Value {
    let mut obj = Map::new();
    obj.insert("path".into(), Value::Array(vec![Value::String(field.to_string())]));
    obj.insert("operator".into(), Value::String(operator.to_string()));
    obj.insert(slot.into(), value);
    Value::Object(obj)
}

fn compound(operator: &str, operands: Vec<Value>) -> Value {
    let mut obj = Map::new();
    obj.insert("operator".into(), Value::String(operator.to_string()));
    obj.insert("operands".into(), Value::Array(operands));
    Value::Object(obj)
}

impl QueryRenderer for WeaviateRenderer {
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

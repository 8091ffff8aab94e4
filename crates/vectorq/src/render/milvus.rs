//! Milvus renderer.
//!
//! Produces Milvus RESTful v2 bodies (`entities/search`, `entities/upsert`,
//! `entities/delete`, `entities/query`). Milvus filters are boolean
//! expression strings, so the filter tree renders to text with placeholders
//! inline, e.g. `(status == :status and price >= :min_price)`.

use super::{
    condition_value, encode_float, keyed, pagination_json, resolve_operator, vector_json,
    ParamCollector, QueryRenderer, RenderedQuery,
};
use crate::config::{MilvusConfig, RenderOptions};
use crate::error::{RenderError, RenderResult};
use crate::ir::{
    DistanceMetric, FilterCondition, FilterGroup, FilterItem, FilterOperator, LogicOperator,
    Operation, RangeFilter, SparseVectorValue, VectorQuery, VectorRecord,
};
use crate::validate::Validator;
use serde_json::{Map, Value};
use tracing::{debug, trace};

const NAME: &str = "milvus";

/// Milvus renderer.
#[derive(Debug, Clone, Default)]
pub struct MilvusRenderer {
    pub config: MilvusConfig,
    pub options: RenderOptions,
}

/// Expression form of a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expr {
    /// `field <op> :value`
    Infix(&'static str),
    /// `field <suffix>`
    Postfix(&'static str),
    /// `func(field, :value)`
    Call(&'static str),
}

fn native(operator: FilterOperator) -> Option<Expr> {
    use FilterOperator as F;
    let expr = match operator {
        F::Eq => Expr::Infix("=="),
        F::Ne => Expr::Infix("!="),
        F::Gt => Expr::Infix(">"),
        F::Ge => Expr::Infix(">="),
        F::Lt => Expr::Infix("<"),
        F::Le => Expr::Infix("<="),
        F::In => Expr::Infix("in"),
        F::NotIn => Expr::Infix("not in"),
        F::Contains => Expr::Infix("like"),
        F::Exists => Expr::Postfix("IS NOT NULL"),
        F::NotExists => Expr::Postfix("IS NULL"),
        F::ArrayContains => Expr::Call("array_contains"),
        F::ArrayContainsAny => Expr::Call("array_contains_any"),
        F::ArrayContainsAll => Expr::Call("array_contains_all"),
        F::StartsWith | F::EndsWith | F::Matches => return None,
    };
    Some(expr)
}

impl MilvusRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MilvusConfig, options: RenderOptions) -> Self {
        Self { config, options }
    }

    fn render_search(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = self.collection(query);

        let anns_field = query
            .query_embedding
            .as_ref()
            .map_or(self.config.default_vector_field.as_str(), |f| f.name.as_str());
        doc.insert("anns_field".into(), Value::String(anns_field.to_string()));

        if let Some(vector) = &query.query_vector {
            let data = match vector_json(vector, "query vector", params)? {
                literal @ Value::Array(_) => Value::Array(vec![literal]),
                placeholder => placeholder,
            };
            doc.insert("data".into(), data);
        }
        if let Some(top_k) = &query.top_k {
            doc.insert("limit".into(), pagination_json(top_k, params));
        }

        let output_fields = self.output_fields(query, false);
        if !output_fields.is_empty() {
            doc.insert("output_fields".into(), Value::from(output_fields));
        }
        if let Some(filter) = &query.filter {
            doc.insert("filter".into(), Value::String(self.render_filter(filter, params)?));
        }
        if let Some(min_score) = &query.min_score {
            let mut search_params = Map::new();
            search_params.insert("radius".into(), params.bind(min_score));
            doc.insert(
                "search_params".into(),
                keyed("params", Value::Object(search_params)),
            );
        }
        if let Some(namespace) = &query.namespace {
            doc.insert("partition_names".into(), Value::Array(vec![params.bind(namespace)]));
        }
        Ok(Value::Object(doc))
    }

    fn render_upsert(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let rows = query
            .vectors
            .iter()
            .map(|record| self.render_row(record, params))
            .collect::<RenderResult<Vec<_>>>()?;

        let mut doc = self.collection(query);
        doc.insert("data".into(), Value::Array(rows));
        self.insert_partition(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_row(&self, record: &VectorRecord, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut row = Map::new();
        set_column(&mut row, &self.config.primary_field, params.bind(&record.id))?;
        set_column(
            &mut row,
            &self.config.default_vector_field,
            vector_json(&record.vector, "record vector", params)?,
        )?;
        for (field, value) in &record.metadata {
            set_column(&mut row, &field.name, params.bind(value))?;
        }
        if let Some(sparse) = &record.sparse_vector {
            let sparse = match sparse {
                SparseVectorValue::Param(param) => params.bind(param),
                // Milvus takes sparse rows as {"index": value}
                SparseVectorValue::Literal { indices, values } => indices
                    .iter()
                    .zip(values)
                    .enumerate()
                    .map(|(i, (index, value))| {
                        Ok((index.to_string(), encode_float("sparse vector", i, *value)?))
                    })
                    .collect::<RenderResult<Map<String, Value>>>()
                    .map(Value::Object)?,
            };
            set_column(&mut row, &self.config.sparse_vector_field, sparse)?;
        }
        Ok(Value::Object(row))
    }

    fn render_delete(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = self.collection(query);
        let filter = if !query.ids.is_empty() {
            Some(self.ids_expression(query, params))
        } else {
            query
                .filter
                .as_ref()
                .map(|filter| self.render_filter(filter, params))
                .transpose()?
        };
        if let Some(filter) = filter {
            doc.insert("filter".into(), Value::String(filter));
        }
        self.insert_partition(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn render_fetch(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let mut doc = self.collection(query);
        doc.insert("filter".into(), Value::String(self.ids_expression(query, params)));

        let output_fields = self.output_fields(query, true);
        if !output_fields.is_empty() {
            doc.insert("output_fields".into(), Value::from(output_fields));
        }
        if let Some(namespace) = &query.namespace {
            doc.insert("partition_names".into(), Value::Array(vec![params.bind(namespace)]));
        }
        Ok(Value::Object(doc))
    }

    /// Partial upsert: one row per id carrying the primary key and the
    /// updated fields. Update params repeat once per row.
    fn render_update(&self, query: &VectorQuery, params: &mut ParamCollector) -> RenderResult<Value> {
        let rows = query
            .ids
            .iter()
            .map(|id| {
                let mut row = Map::new();
                set_column(&mut row, &self.config.primary_field, params.bind(id))?;
                for (field, value) in &query.updates {
                    set_column(&mut row, &field.name, params.bind(value))?;
                }
                Ok(Value::Object(row))
            })
            .collect::<RenderResult<Vec<_>>>()?;

        let mut doc = self.collection(query);
        doc.insert("data".into(), Value::Array(rows));
        doc.insert("partial_update".into(), Value::Bool(true));
        self.insert_partition(&mut doc, query, params);
        Ok(Value::Object(doc))
    }

    fn collection(&self, query: &VectorQuery) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert("collection_name".into(), Value::String(query.target.name.clone()));
        doc
    }

    fn insert_partition(
        &self,
        doc: &mut Map<String, Value>,
        query: &VectorQuery,
        params: &mut ParamCollector,
    ) {
        if let Some(namespace) = &query.namespace {
            doc.insert("partition_name".into(), params.bind(namespace));
        }
    }

    /// `<primary> in [:a, :b]`, ids in query order
    fn ids_expression(&self, query: &VectorQuery, params: &mut ParamCollector) -> String {
        let ids: Vec<String> = query.ids.iter().map(|id| params.placeholder(id)).collect();
        format!("{} in [{}]", self.config.primary_field, ids.join(", "))
    }

    /// Selected metadata fields, `*` for all when `wildcard` and nothing is
    /// selected, plus the vector field when vectors are requested.
    fn output_fields(&self, query: &VectorQuery, wildcard: bool) -> Vec<String> {
        let mut fields = Vec::new();
        if query.include_metadata {
            if !query.metadata_fields.is_empty() {
                fields.extend(query.metadata_fields.iter().map(|f| f.name.clone()));
            } else if wildcard {
                fields.push("*".to_string());
            }
        }
        if query.include_vectors && !fields.iter().any(|f| f == "*") {
            fields.push(self.config.default_vector_field.clone());
        }
        fields
    }

    fn render_filter(&self, item: &FilterItem, params: &mut ParamCollector) -> RenderResult<String> {
        trace!(dialect = NAME, kind = item.kind(), "rendering filter node");
        match item {
            FilterItem::Condition(condition) => self.render_condition(condition, params),
            FilterItem::Group(group) => self.render_group(group, params),
            FilterItem::Range(range) => Ok(self.render_range(range, params)),
            FilterItem::Geo(_) => Err(RenderError::UnsupportedFilter {
                dialect: NAME,
                kind: "geo",
            }),
        }
    }

    fn render_condition(
        &self,
        condition: &FilterCondition,
        params: &mut ParamCollector,
    ) -> RenderResult<String> {
        let expr = resolve_operator(
            NAME,
            self.options.operator_policy,
            condition.operator,
            native(condition.operator),
            Expr::Infix("=="),
        )?;

        let field = &condition.field.name;
        Ok(match expr {
            Expr::Postfix(suffix) => format!("{field} {suffix}"),
            Expr::Infix(op) => {
                let value = params.placeholder(condition_value(condition)?);
                format!("{field} {op} {value}")
            }
            Expr::Call(func) => {
                let value = params.placeholder(condition_value(condition)?);
                format!("{func}({field}, {value})")
            }
        })
    }

    fn render_group(&self, group: &FilterGroup, params: &mut ParamCollector) -> RenderResult<String> {
        let parts = group
            .children
            .iter()
            .map(|child| self.render_filter(child, params))
            .collect::<RenderResult<Vec<_>>>()?;

        Ok(match group.logic {
            LogicOperator::And => format!("({})", parts.join(" and ")),
            LogicOperator::Or => format!("({})", parts.join(" or ")),
            LogicOperator::Not => format!("not ({})", parts.join(" and ")),
        })
    }

    fn render_range(&self, range: &RangeFilter, params: &mut ParamCollector) -> String {
        let field = &range.field.name;
        let mut bounds = Vec::with_capacity(2);
        if let Some(min) = &range.min {
            let op = if range.min_exclusive { ">" } else { ">=" };
            bounds.push(format!("{field} {op} {}", params.placeholder(min)));
        }
        if let Some(max) = &range.max {
            let op = if range.max_exclusive { "<" } else { "<=" };
            bounds.push(format!("{field} {op} {}", params.placeholder(max)));
        }
        format!("({})", bounds.join(" and "))
    }
}

/// Add a row column; metadata may not shadow the key or vector columns
fn set_column(row: &mut Map<String, Value>, column: &str, value: Value) -> RenderResult<()> {
    if row.contains_key(column) {
        return Err(RenderError::ColumnClash {
            dialect: NAME,
            column: column.to_string(),
        });
    }
    row.insert(column.to_string(), value);
    Ok(())
}

impl QueryRenderer for MilvusRenderer {
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

    fn supports_metric(&self, metric: DistanceMetric) -> bool {
        !matches!(metric, DistanceMetric::Manhattan)
    }
}

//! Dialect renderers for the vector query IR.
//!
//! Renderers convert the backend-agnostic [`VectorQuery`] into the JSON
//! document a specific vector database expects, together with the ordered
//! list of param names the caller must bind.

mod milvus;
mod packager;
mod params;
mod pinecone;
mod qdrant;
mod weaviate;

pub use milvus::MilvusRenderer;
pub use packager::{encode_floats, RenderedQuery};
pub(crate) use packager::encode_float;
pub use params::ParamCollector;
pub use pinecone::PineconeRenderer;
pub use qdrant::QdrantRenderer;
pub use weaviate::WeaviateRenderer;

use crate::config::{FeaturePolicy, OperatorPolicy, VectorqConfig};
use crate::error::{RenderError, RenderResult};
use crate::ir::{
    DistanceMetric, FilterCondition, FilterOperator, Operation, PaginationValue, Param,
    VectorQuery, VectorValue,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Trait for rendering the IR into one backend's wire format.
///
/// Implementations are stateless apart from configuration fixed at
/// construction, so a single renderer can serve concurrent callers.
pub trait QueryRenderer: Send + Sync {
    /// Unique name for this renderer
    fn name(&self) -> &str;

    /// Validate and render the query
    fn render(&self, query: &VectorQuery) -> Result<RenderedQuery, RenderError>;

    /// Whether the backend supports the operation at all
    fn supports_operation(&self, operation: Operation) -> bool;

    /// Whether the operator has a native translation (no fallback needed)
    fn supports_filter_operator(&self, operator: FilterOperator) -> bool;

    /// Whether the backend can index with the metric
    fn supports_metric(&self, metric: DistanceMetric) -> bool;
}

/// The built-in dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Pinecone,
    Qdrant,
    Milvus,
    Weaviate,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::Pinecone,
        Dialect::Qdrant,
        Dialect::Milvus,
        Dialect::Weaviate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Pinecone => "pinecone",
            Dialect::Qdrant => "qdrant",
            Dialect::Milvus => "milvus",
            Dialect::Weaviate => "weaviate",
        }
    }

    /// Construct the renderer for this dialect from a full configuration
    pub fn renderer(&self, config: &VectorqConfig) -> Box<dyn QueryRenderer> {
        match self {
            Dialect::Pinecone => Box::new(PineconeRenderer::with_options(config.render)),
            Dialect::Qdrant => Box::new(QdrantRenderer::with_config(
                config.qdrant.clone(),
                config.render,
            )),
            Dialect::Milvus => Box::new(MilvusRenderer::with_config(
                config.milvus.clone(),
                config.render,
            )),
            Dialect::Weaviate => Box::new(WeaviateRenderer::with_config(
                config.weaviate.clone(),
                config.render,
            )),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pinecone" => Ok(Dialect::Pinecone),
            "qdrant" => Ok(Dialect::Qdrant),
            "milvus" => Ok(Dialect::Milvus),
            "weaviate" => Ok(Dialect::Weaviate),
            other => Err(format!(
                "unknown dialect '{other}' (expected pinecone, qdrant, milvus or weaviate)"
            )),
        }
    }
}

/// Pick the dialect-native operator, or apply the operator policy.
pub(crate) fn resolve_operator<T>(
    dialect: &'static str,
    policy: OperatorPolicy,
    operator: FilterOperator,
    native: Option<T>,
    fallback: T,
) -> RenderResult<T> {
    match (native, policy) {
        (Some(op), _) => Ok(op),
        (None, OperatorPolicy::Fallback) => {
            warn!(
                dialect,
                %operator,
                "operator has no native translation, using dialect default"
            );
            Ok(fallback)
        }
        (None, OperatorPolicy::Reject) => {
            Err(RenderError::UnsupportedOperator { dialect, operator })
        }
    }
}

/// Drop a populated field the backend cannot express, or fail under
/// [`FeaturePolicy::Reject`].
pub(crate) fn degrade_feature(
    dialect: &'static str,
    policy: FeaturePolicy,
    feature: impl Into<String>,
) -> RenderResult<()> {
    let feature = feature.into();
    match policy {
        FeaturePolicy::Degrade => {
            warn!(dialect, %feature, "backend cannot express feature, rendering without it");
            Ok(())
        }
        FeaturePolicy::Reject => Err(RenderError::UnsupportedFeature { dialect, feature }),
    }
}

/// The bound value of a binary condition.
pub(crate) fn condition_value(condition: &FilterCondition) -> RenderResult<&Param> {
    condition
        .value
        .as_ref()
        .ok_or_else(|| RenderError::MissingValue {
            field: condition.field.name.clone(),
            operator: condition.operator,
        })
}

/// A dense vector as a placeholder or literal array.
pub(crate) fn vector_json(
    value: &VectorValue,
    context: &'static str,
    params: &mut ParamCollector,
) -> RenderResult<Value> {
    match value {
        VectorValue::Param(param) => Ok(params.bind(param)),
        VectorValue::Literal(components) => encode_floats(context, components),
    }
}

pub(crate) fn pagination_json(value: &PaginationValue, params: &mut ParamCollector) -> Value {
    match value {
        PaginationValue::Static(k) => Value::from(*k),
        PaginationValue::Param(param) => params.bind(param),
    }
}

/// `{key: value}`
pub(crate) fn keyed(key: impl Into<String>, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.into(), value);
    Value::Object(map)
}

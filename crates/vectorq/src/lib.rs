//! Provider-agnostic query IR for vector databases
//!
//! This crate describes vector-store operations (similarity search, upsert,
//! delete, fetch, update) once, as a typed intermediate representation, and
//! renders them into the native JSON request bodies of Pinecone, Qdrant,
//! Milvus and Weaviate.
//!
//! ## Pipeline
//!
//! - **IR** ([`ir`]): the query tree. Runtime values are never embedded;
//!   they appear as named [`Param`] placeholders (`:name`).
//! - **Validator** ([`validate`]): structural rules and complexity
//!   [`Limits`], checked before any rendering.
//! - **Renderers** ([`render`]): one [`QueryRenderer`] per backend, each
//!   producing a [`RenderedQuery`] with the serialized document and the
//!   ordered list of params the caller must bind.
//!
//! ## Usage
//!
//! ```
//! use vectorq::expr::{gt, vec_param};
//! use vectorq::{Dialect, MetadataField, Param, QueryBuilder, VectorqConfig};
//!
//! let query = QueryBuilder::search("products")
//!     .vector(vec_param(Param::new("query_vec")))
//!     .top_k(10)
//!     .filter(gt(MetadataField::new("price"), Param::new("min_price")))
//!     .build()
//!     .unwrap();
//!
//! let config = VectorqConfig::default();
//! for dialect in Dialect::ALL {
//!     let rendered = dialect.renderer(&config).render(&query).unwrap();
//!     assert_eq!(rendered.required_params, vec!["query_vec", "min_price"]);
//! }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod expr;
pub mod ident;
pub mod ir;
pub mod render;
pub mod validate;

// Re-exports
pub use builder::QueryBuilder;
pub use config::{
    FeaturePolicy, Limits, MilvusConfig, OperatorPolicy, QdrantConfig, RenderOptions, VectorqConfig,
    WeaviateConfig,
};
pub use error::{BuildError, RenderError, RenderResult, ValidationError, ValidationResult};
pub use ir::{
    Collection, DistanceMetric, EmbeddingField, FilterCondition, FilterGroup, FilterItem,
    FilterOperator, GeoFilter, GeoPoint, InvalidIdentifier, LogicOperator, MetadataField,
    Operation, PaginationValue, Param, RangeFilter, SparseVectorValue, VectorQuery, VectorRecord,
    VectorValue,
};
pub use render::{
    Dialect, MilvusRenderer, PineconeRenderer, QdrantRenderer, QueryRenderer, RenderedQuery,
    WeaviateRenderer,
};
pub use validate::{validate, Validator};

//! Intermediate representation for vector database queries.
//!
//! The IR is backend-agnostic: one `VectorQuery` describes a search, upsert,
//! delete, fetch or update, and every renderer in [`crate::render`] consumes
//! the same tree. Runtime values never live in the IR. Wherever a caller
//! value is needed the tree holds a [`Param`], a named placeholder that is
//! bound at execution time.

mod filter;

pub use filter::{
    FilterCondition, FilterGroup, FilterItem, FilterOperator, GeoFilter, GeoPoint, LogicOperator,
    RangeFilter,
};

use crate::ident::is_valid_identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Operations and metrics
// ============================================================================

/// The kind of request a query describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Similarity search against a query vector
    Search,
    /// Insert or replace vector records
    Upsert,
    /// Delete by ids or by filter
    Delete,
    /// Fetch records by id
    Fetch,
    /// Update metadata of existing records
    Update,
}

impl Operation {
    /// All operations, in declaration order
    pub const ALL: [Operation; 5] = [
        Operation::Search,
        Operation::Upsert,
        Operation::Delete,
        Operation::Fetch,
        Operation::Update,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Search => "SEARCH",
            Operation::Upsert => "UPSERT",
            Operation::Delete => "DELETE",
            Operation::Fetch => "FETCH",
            Operation::Update => "UPDATE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance metric used by a collection's embedding index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    DotProduct,
    Manhattan,
}

impl DistanceMetric {
    pub const ALL: [DistanceMetric; 4] = [
        DistanceMetric::Cosine,
        DistanceMetric::Euclidean,
        DistanceMetric::DotProduct,
        DistanceMetric::Manhattan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "COSINE",
            DistanceMetric::Euclidean => "EUCLIDEAN",
            DistanceMetric::DotProduct => "DOT_PRODUCT",
            DistanceMetric::Manhattan => "MANHATTAN",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Name handles
// ============================================================================

/// Screen a name that will be written into a rendered document
fn screen(name: String) -> Result<String, InvalidIdentifier> {
    if is_valid_identifier(&name) {
        Ok(name)
    } else {
        Err(InvalidIdentifier { name })
    }
}

/// Wire form of the name handles, screened on the way in.
#[derive(Deserialize)]
struct RawName {
    name: String,
    #[serde(default)]
    collection: Option<String>,
}

/// A collection (index, class) the query targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawName")]
pub struct Collection {
    pub name: String,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Create a collection handle, rejecting names that are not bare identifiers
    pub fn try_new(name: impl Into<String>) -> Result<Self, InvalidIdentifier> {
        screen(name.into()).map(Self::new)
    }
}

impl TryFrom<RawName> for Collection {
    type Error = InvalidIdentifier;

    fn try_from(raw: RawName) -> Result<Self, Self::Error> {
        Self::try_new(raw.name)
    }
}

/// Reference to an embedding (vector) field, optionally scoped to a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawName")]
pub struct EmbeddingField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl EmbeddingField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: None,
        }
    }

    /// Create a field reference, rejecting names that are not bare identifiers
    pub fn try_new(name: impl Into<String>) -> Result<Self, InvalidIdentifier> {
        screen(name.into()).map(Self::new)
    }

    /// Scope the field to a collection
    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }
}

impl TryFrom<RawName> for EmbeddingField {
    type Error = InvalidIdentifier;

    fn try_from(raw: RawName) -> Result<Self, Self::Error> {
        let field = Self::try_new(raw.name)?;
        Ok(match raw.collection {
            Some(collection) => field.in_collection(screen(collection)?),
            None => field,
        })
    }
}

/// Reference to a metadata (payload, property) field.
///
/// Ordering is by `(name, collection)`, which is also the order metadata maps
/// are rendered in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawName")]
pub struct MetadataField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl MetadataField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: None,
        }
    }

    /// Create a field reference, rejecting names that are not bare identifiers
    pub fn try_new(name: impl Into<String>) -> Result<Self, InvalidIdentifier> {
        screen(name.into()).map(Self::new)
    }

    /// Scope the field to a collection
    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }
}

impl TryFrom<RawName> for MetadataField {
    type Error = InvalidIdentifier;

    fn try_from(raw: RawName) -> Result<Self, Self::Error> {
        let field = Self::try_new(raw.name)?;
        Ok(match raw.collection {
            Some(collection) => field.in_collection(screen(collection)?),
            None => field,
        })
    }
}

/// Named placeholder for a value supplied at execution time.
///
/// A `Param` has no value slot. Rendered documents only ever contain the
/// placeholder token, so they are safe to log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Param {
    name: String,
}

impl Param {
    /// Create a param without screening the name.
    ///
    /// Use [`Param::try_new`] for names that come from outside the program.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Create a param, rejecting names that are not bare identifiers
    pub fn try_new(name: impl Into<String>) -> Result<Self, InvalidIdentifier> {
        screen(name.into()).map(|name| Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TryFrom<String> for Param {
    type Error = InvalidIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Param::try_new(value)
    }
}

impl From<Param> for String {
    fn from(param: Param) -> Self {
        param.name
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.name)
    }
}

/// A name that failed identifier screening.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier: {name:?}")]
pub struct InvalidIdentifier {
    pub name: String,
}

// ============================================================================
// Values
// ============================================================================

/// A dense vector: either author-supplied literal components or a param.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorValue {
    Literal(Vec<f32>),
    Param(Param),
}

/// A sparse vector for hybrid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SparseVectorValue {
    Param(Param),
    Literal { indices: Vec<u32>, values: Vec<f32> },
}

/// Top-K / limit value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationValue {
    Static(usize),
    Param(Param),
}

/// One record of an upsert batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: Param,
    pub vector: VectorValue,
    #[serde(default, with = "field_map")]
    pub metadata: BTreeMap<MetadataField, Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_vector: Option<SparseVectorValue>,
}

impl VectorRecord {
    pub fn new(id: Param, vector: VectorValue) -> Self {
        Self {
            id,
            vector,
            metadata: BTreeMap::new(),
            sparse_vector: None,
        }
    }
}

// ============================================================================
// Query root
// ============================================================================

/// The IR root.
///
/// `operation` decides which of the remaining fields are meaningful; the
/// validator enforces the per-operation requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    pub operation: Operation,
    pub target: Collection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_vector: Option<VectorValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_embedding: Option<EmbeddingField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<PaginationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<Param>,
    #[serde(default)]
    pub include_vectors: bool,
    #[serde(default)]
    pub include_metadata: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata_fields: Vec<MetadataField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vectors: Vec<VectorRecord>,
    #[serde(default, with = "field_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub updates: BTreeMap<MetadataField, Param>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<Param>,
    #[serde(default)]
    pub delete_all: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Param>,
}

impl VectorQuery {
    /// Empty query for `operation` against `target`
    pub fn new(operation: Operation, target: Collection) -> Self {
        Self {
            operation,
            target,
            query_vector: None,
            query_embedding: None,
            top_k: None,
            min_score: None,
            include_vectors: false,
            include_metadata: false,
            filter: None,
            metadata_fields: Vec::new(),
            vectors: Vec::new(),
            updates: BTreeMap::new(),
            ids: Vec::new(),
            delete_all: false,
            namespace: None,
        }
    }

    /// Every param reachable from the query, in field order.
    ///
    /// Renderers may emit params in a different order (and may repeat them),
    /// but every param listed here appears in their required-param list.
    pub fn referenced_params(&self) -> Vec<&Param> {
        let mut out = Vec::new();
        if let Some(VectorValue::Param(p)) = &self.query_vector {
            out.push(p);
        }
        if let Some(PaginationValue::Param(p)) = &self.top_k {
            out.push(p);
        }
        out.extend(self.min_score.iter());
        if let Some(filter) = &self.filter {
            filter.collect_params(&mut out);
        }
        for record in &self.vectors {
            out.push(&record.id);
            if let VectorValue::Param(p) = &record.vector {
                out.push(p);
            }
            out.extend(record.metadata.values());
            if let Some(SparseVectorValue::Param(p)) = &record.sparse_vector {
                out.push(p);
            }
        }
        out.extend(self.updates.values());
        out.extend(self.ids.iter());
        out.extend(self.namespace.iter());
        out
    }
}

/// Serde adapter for `BTreeMap<MetadataField, Param>`.
///
/// JSON object keys must be strings, so the map travels as a list of
/// `{ "field": ..., "value": ... }` bindings.
mod field_map {
    use super::{MetadataField, Param};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize)]
    struct Binding {
        field: MetadataField,
        value: Param,
    }

    pub fn serialize<S>(map: &BTreeMap<MetadataField, Param>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bindings: Vec<Binding> = map
            .iter()
            .map(|(field, value)| Binding {
                field: field.clone(),
                value: value.clone(),
            })
            .collect();
        bindings.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<MetadataField, Param>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bindings = Vec::<Binding>::deserialize(deserializer)?;
        Ok(bindings.into_iter().map(|b| (b.field, b.value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_display_is_placeholder() {
        assert_eq!(Param::new("query_vec").to_string(), ":query_vec");
    }

    #[test]
    fn test_param_try_new_rejects_injection() {
        assert!(Param::try_new("id; drop").is_err());
        assert!(Param::try_new("").is_err());
        assert_eq!(Param::try_new("user_id").unwrap().name(), "user_id");
    }

    #[test]
    fn test_json_names_are_screened() {
        let injected = r#"{"type":"condition","field":{"name":"x == 1 or pk"},"operator":"EQ","value":"v"}"#;
        let err = serde_json::from_str::<FilterItem>(injected).unwrap_err();
        assert!(err.to_string().contains("invalid identifier"), "{err}");

        let scoped = r#"{"name":"price","collection":"a b"}"#;
        assert!(serde_json::from_str::<MetadataField>(scoped).is_err());
        assert!(serde_json::from_str::<EmbeddingField>(r#"{"name":"vec-1"}"#).is_err());
        assert!(serde_json::from_str::<Collection>(r#"{"name":"docs\" or 1"}"#).is_err());

        let ok: MetadataField =
            serde_json::from_str(r#"{"name":"price","collection":"products"}"#).unwrap();
        assert_eq!(ok, MetadataField::new("price").in_collection("products"));
    }

    #[test]
    fn test_try_new_screens_every_name_handle() {
        assert!(Collection::try_new("products").is_ok());
        assert!(Collection::try_new("prod ucts").is_err());
        assert!(EmbeddingField::try_new("title_vec").is_ok());
        assert!(EmbeddingField::try_new("title_vec)").is_err());
        assert!(MetadataField::try_new("a--b").is_err());
    }

    #[test]
    fn test_metadata_field_equality_includes_collection() {
        let a = MetadataField::new("category");
        let b = MetadataField::new("category").in_collection("products");
        assert_ne!(a, b);
        assert_eq!(b, MetadataField::new("category").in_collection("products"));
    }

    #[test]
    fn test_referenced_params_covers_records() {
        let mut query = VectorQuery::new(Operation::Upsert, Collection::new("docs"));
        let mut record = VectorRecord::new(Param::new("id"), VectorValue::Param(Param::new("vec")));
        record
            .metadata
            .insert(MetadataField::new("title"), Param::new("title"));
        record.sparse_vector = Some(SparseVectorValue::Param(Param::new("sparse")));
        query.vectors.push(record);
        query.namespace = Some(Param::new("ns"));

        let names: Vec<&str> = query.referenced_params().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["id", "vec", "title", "sparse", "ns"]);
    }

    #[test]
    fn test_query_json_roundtrip_keeps_metadata_bindings() {
        let mut query = VectorQuery::new(Operation::Update, Collection::new("docs"));
        query.ids.push(Param::new("id"));
        query
            .updates
            .insert(MetadataField::new("status"), Param::new("status"));

        let json = serde_json::to_string(&query).unwrap();
        assert!(json.contains(r#""updates":[{"field":{"name":"status"},"value":"status"}]"#));

        let back: VectorQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(back, query);
    }

    #[test]
    fn test_query_json_rejects_invalid_param_name() {
        let json = r#"{"operation":"FETCH","target":{"name":"docs"},"ids":["a' or 1=1"]}"#;
        assert!(serde_json::from_str::<VectorQuery>(json).is_err());
    }
}

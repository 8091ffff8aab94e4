//! Fluent construction of [`VectorQuery`] values.
//!
//! ```
//! use vectorq::expr::{eq, vec_param};
//! use vectorq::{MetadataField, Param, PineconeRenderer, QueryBuilder};
//!
//! let rendered = QueryBuilder::search("products")
//!     .vector(vec_param(Param::new("query_vec")))
//!     .top_k(10)
//!     .filter(eq(MetadataField::new("active"), Param::new("active")))
//!     .render(&PineconeRenderer::new())
//!     .unwrap();
//!
//! assert_eq!(rendered.required_params, vec!["query_vec", "active"]);
//! ```

use crate::error::BuildError;
use crate::ir::{
    Collection, EmbeddingField, FilterGroup, FilterItem, LogicOperator, MetadataField, Operation,
    PaginationValue, Param, VectorQuery, VectorRecord, VectorValue,
};
use crate::render::{QueryRenderer, RenderedQuery};
use crate::validate::Validator;

/// Builder for a single query.
///
/// Names passed as strings (collection, params, fields) are screened with
/// [`crate::ident::is_valid_identifier`]. The first misuse is recorded and
/// every later call is a no-op; the error surfaces from [`build`](Self::build).
#[derive(Debug)]
pub struct QueryBuilder {
    query: VectorQuery,
    error: Option<BuildError>,
}

impl QueryBuilder {
    fn start(operation: Operation, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        let (target, error) = match Collection::try_new(collection.as_str()) {
            Ok(target) => (target, None),
            Err(err) => (Collection::new(collection), Some(err.into())),
        };
        Self {
            query: VectorQuery::new(operation, target),
            error,
        }
    }

    /// Nearest-neighbour search; metadata is returned by default
    pub fn search(collection: impl Into<String>) -> Self {
        let mut builder = Self::start(Operation::Search, collection);
        builder.query.include_metadata = true;
        builder
    }

    pub fn upsert(collection: impl Into<String>) -> Self {
        Self::start(Operation::Upsert, collection)
    }

    pub fn delete(collection: impl Into<String>) -> Self {
        Self::start(Operation::Delete, collection)
    }

    /// Lookup by id; metadata and vectors are returned by default
    pub fn fetch(collection: impl Into<String>) -> Self {
        let mut builder = Self::start(Operation::Fetch, collection);
        builder.query.include_metadata = true;
        builder.query.include_vectors = true;
        builder
    }

    pub fn update(collection: impl Into<String>) -> Self {
        Self::start(Operation::Update, collection)
    }

    /// Whether `method` may proceed; records a misuse error otherwise
    fn allow(&mut self, method: &'static str, allowed: &'static str, ops: &[Operation]) -> bool {
        if self.error.is_some() {
            return false;
        }
        if !ops.contains(&self.query.operation) {
            self.error = Some(BuildError::WrongOperation {
                method,
                allowed,
                operation: self.query.operation,
            });
            return false;
        }
        true
    }

    fn param(&mut self, name: impl Into<String>) -> Option<Param> {
        match Param::try_new(name) {
            Ok(param) => Some(param),
            Err(err) => {
                self.error.get_or_insert(err.into());
                None
            }
        }
    }

    fn field(&mut self, name: impl Into<String>) -> Option<MetadataField> {
        match MetadataField::try_new(name) {
            Ok(field) => Some(field),
            Err(err) => {
                self.error.get_or_insert(err.into());
                None
            }
        }
    }

    // ========================================================================
    // SEARCH
    // ========================================================================

    pub fn vector(mut self, vector: VectorValue) -> Self {
        if self.allow("vector", "SEARCH", &[Operation::Search]) {
            self.query.query_vector = Some(vector);
        }
        self
    }

    /// Search a named vector field
    pub fn embedding(mut self, field: impl Into<String>) -> Self {
        if self.allow("embedding", "SEARCH", &[Operation::Search]) {
            match EmbeddingField::try_new(field) {
                Ok(field) => self.query.query_embedding = Some(field),
                Err(err) => self.error = Some(err.into()),
            }
        }
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        if self.allow("top_k", "SEARCH", &[Operation::Search]) {
            self.query.top_k = Some(PaginationValue::Static(k));
        }
        self
    }

    pub fn top_k_param(mut self, name: impl Into<String>) -> Self {
        if self.allow("top_k_param", "SEARCH", &[Operation::Search]) {
            if let Some(param) = self.param(name) {
                self.query.top_k = Some(PaginationValue::Param(param));
            }
        }
        self
    }

    pub fn min_score(mut self, name: impl Into<String>) -> Self {
        if self.allow("min_score", "SEARCH", &[Operation::Search]) {
            if let Some(param) = self.param(name) {
                self.query.min_score = Some(param);
            }
        }
        self
    }

    pub fn include_vectors(mut self, include: bool) -> Self {
        if self.allow(
            "include_vectors",
            "SEARCH or FETCH",
            &[Operation::Search, Operation::Fetch],
        ) {
            self.query.include_vectors = include;
        }
        self
    }

    pub fn include_metadata(mut self, include: bool) -> Self {
        if self.allow(
            "include_metadata",
            "SEARCH or FETCH",
            &[Operation::Search, Operation::Fetch],
        ) {
            self.query.include_metadata = include;
        }
        self
    }

    /// Restrict returned metadata to the named fields
    pub fn select_metadata<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.allow(
            "select_metadata",
            "SEARCH or FETCH",
            &[Operation::Search, Operation::Fetch],
        ) {
            for name in fields {
                if let Some(field) = self.field(name) {
                    self.query.metadata_fields.push(field);
                }
            }
        }
        self
    }

    // ========================================================================
    // Filters
    // ========================================================================

    /// Add a filter; repeated calls are AND-combined
    pub fn filter(mut self, item: impl Into<FilterItem>) -> Self {
        if !self.allow(
            "filter",
            "SEARCH or DELETE",
            &[Operation::Search, Operation::Delete],
        ) {
            return self;
        }

        let item = item.into();
        self.query.filter = Some(match self.query.filter.take() {
            None => item,
            Some(FilterItem::Group(mut group)) if group.logic == LogicOperator::And => {
                group.children.push(item);
                FilterItem::Group(group)
            }
            Some(existing) => FilterItem::Group(FilterGroup {
                logic: LogicOperator::And,
                children: vec![existing, item],
            }),
        });
        self
    }

    // ========================================================================
    // UPSERT, DELETE, FETCH, UPDATE
    // ========================================================================

    pub fn add_vector(mut self, record: VectorRecord) -> Self {
        if self.allow("add_vector", "UPSERT", &[Operation::Upsert]) {
            self.query.vectors.push(record);
        }
        self
    }

    pub fn vectors(mut self, records: impl IntoIterator<Item = VectorRecord>) -> Self {
        if self.allow("vectors", "UPSERT", &[Operation::Upsert]) {
            self.query.vectors.extend(records);
        }
        self
    }

    /// Bind `field` to param `value` in an UPDATE
    pub fn set(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        if self.allow("set", "UPDATE", &[Operation::Update]) {
            if let (Some(field), Some(value)) = (self.field(field), self.param(value)) {
                self.query.updates.insert(field, value);
            }
        }
        self
    }

    /// Id params, kept in the given order
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.allow(
            "ids",
            "DELETE, FETCH or UPDATE",
            &[Operation::Delete, Operation::Fetch, Operation::Update],
        ) {
            for name in ids {
                if let Some(param) = self.param(name) {
                    self.query.ids.push(param);
                }
            }
        }
        self
    }

    /// Confirm a DELETE by filter
    pub fn delete_all(mut self) -> Self {
        if self.allow("delete_all", "DELETE", &[Operation::Delete]) {
            self.query.delete_all = true;
        }
        self
    }

    /// Scope to a namespace / partition / tenant
    pub fn namespace(mut self, name: impl Into<String>) -> Self {
        if self.error.is_none() {
            if let Some(param) = self.param(name) {
                self.query.namespace = Some(param);
            }
        }
        self
    }

    // ========================================================================
    // Finish
    // ========================================================================

    fn finish(self) -> Result<VectorQuery, BuildError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.query),
        }
    }

    /// Finish and validate with the default limits
    pub fn build(self) -> Result<VectorQuery, BuildError> {
        self.build_with(&Validator::default())
    }

    pub fn build_with(self, validator: &Validator) -> Result<VectorQuery, BuildError> {
        let query = self.finish()?;
        validator.validate(&query)?;
        Ok(query)
    }

    /// Finish and render; validation uses the renderer's own limits
    pub fn render(self, renderer: &dyn QueryRenderer) -> Result<RenderedQuery, BuildError> {
        let query = self.finish()?;
        Ok(renderer.render(&query)?)
    }
}

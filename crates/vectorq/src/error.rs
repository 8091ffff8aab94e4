//! Error types for query validation, rendering and building.

use crate::ir::{FilterOperator, InvalidIdentifier, LogicOperator, Operation};
use thiserror::Error;

/// Structural problems found before rendering.
///
/// The first violated rule wins; the validator does not aggregate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("target collection is required")]
    MissingTarget,

    #[error("SEARCH requires a query vector")]
    MissingQueryVector,

    #[error("SEARCH requires TopK")]
    MissingTopK,

    #[error("TopK must be positive: {value}")]
    TopKNotPositive { value: usize },

    #[error("TopK exceeds maximum: {value} > {max}")]
    TopKTooLarge { value: usize, max: usize },

    #[error("metadata fields exceed maximum: {count} > {max}")]
    TooManyMetadataFields { count: usize, max: usize },

    #[error("filter nesting too deep: {depth} > {max}")]
    FilterTooDeep { depth: usize, max: usize },

    #[error("NOT filter group requires exactly one child, got {children}")]
    NotArity { children: usize },

    #[error("{logic} filter group requires at least one child")]
    EmptyGroup { logic: LogicOperator },

    #[error("range filter on '{field}' requires at least one bound")]
    EmptyRange { field: String },

    #[error("{operator} condition on '{field}' takes no value")]
    UnexpectedConditionValue {
        field: String,
        operator: FilterOperator,
    },

    #[error("{operator} condition on '{field}' requires a value")]
    MissingConditionValue {
        field: String,
        operator: FilterOperator,
    },

    #[error("UPSERT requires at least one vector")]
    EmptyUpsert,

    #[error("batch size exceeds maximum: {count} > {max}")]
    BatchTooLarge { count: usize, max: usize },

    #[error("sparse vector of record {record} has {indices} indices but {values} values")]
    SparseLengthMismatch {
        record: usize,
        indices: usize,
        values: usize,
    },

    #[error("DELETE requires either IDs or a filter")]
    DeleteWithoutTarget,

    #[error("DELETE by filter requires the delete_all flag for safety")]
    DeleteAllRequired,

    #[error("too many IDs: {count} > {max}")]
    TooManyIds { count: usize, max: usize },

    #[error("FETCH requires at least one ID")]
    FetchWithoutIds,

    #[error("UPDATE requires at least one ID")]
    UpdateWithoutIds,

    #[error("UPDATE requires at least one field to update")]
    UpdateWithoutFields,
}

/// Failures while translating a valid query into a dialect document.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("invalid query: {0}")]
    Invalid(#[from] ValidationError),

    #[error("{dialect} does not support {kind} filters")]
    UnsupportedFilter {
        dialect: &'static str,
        kind: &'static str,
    },

    #[error("{dialect} does not support the {operator} operator")]
    UnsupportedOperator {
        dialect: &'static str,
        operator: FilterOperator,
    },

    #[error("{dialect} cannot express {feature}")]
    UnsupportedFeature {
        dialect: &'static str,
        feature: String,
    },

    #[error("{dialect} row field '{column}' is set twice")]
    ColumnClash {
        dialect: &'static str,
        column: String,
    },

    #[error("{operator} condition on '{field}' has no value to bind")]
    MissingValue {
        field: String,
        operator: FilterOperator,
    },

    #[error("literal {context} contains a non-finite component at index {index}")]
    NonFiniteLiteral { context: &'static str, index: usize },

    #[error("failed to serialize query: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Misuse of the fluent builder, or a failure of the query it produced.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{method}() can only be used with {allowed}, not {operation}")]
    WrongOperation {
        method: &'static str,
        allowed: &'static str,
        operation: Operation,
    },

    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

pub type RenderResult<T> = Result<T, RenderError>;

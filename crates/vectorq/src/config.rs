//! Validation limits and renderer configuration.
//!
//! Every struct here has a `Default` matching the built-in behavior and
//! deserializes with missing keys filled from that default, so a config
//! file only needs to name what it changes.

use serde::{Deserialize, Serialize};

/// Complexity limits enforced by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Nested filter groups allowed on any path
    pub max_filter_depth: usize,
    /// Records per upsert
    pub max_batch_size: usize,
    /// Largest static top-K
    pub max_top_k: usize,
    /// Metadata fields a search may select
    pub max_metadata_fields: usize,
    /// Ids per delete, fetch or update
    pub max_ids: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_filter_depth: 5,
            max_batch_size: 100,
            max_top_k: 10_000,
            max_metadata_fields: 50,
            max_ids: 1_000,
        }
    }
}

/// What a renderer does with a filter operator its backend cannot express.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorPolicy {
    /// Substitute the dialect's default operator and log a warning
    #[default]
    Fallback,
    /// Fail the render
    Reject,
}

impl std::str::FromStr for OperatorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback" => Ok(OperatorPolicy::Fallback),
            "reject" => Ok(OperatorPolicy::Reject),
            other => Err(format!("unknown operator policy: {other}")),
        }
    }
}

/// What a renderer does with a populated IR field its backend has no slot for,
/// such as Pinecone's `min_score` or a multi-id Weaviate update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeaturePolicy {
    /// Render without the field and log a warning
    #[default]
    Degrade,
    /// Fail the render
    Reject,
}

impl std::str::FromStr for FeaturePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrade" => Ok(FeaturePolicy::Degrade),
            "reject" => Ok(FeaturePolicy::Reject),
            other => Err(format!("unknown feature policy: {other}")),
        }
    }
}

/// Settings shared by every renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub operator_policy: OperatorPolicy,
    pub feature_policy: FeaturePolicy,
    pub limits: Limits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    /// Named vector to search when the query names no embedding field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_vector_name: Option<String>,
    /// Named vector that receives sparse vectors on upsert
    pub sparse_vector_name: String,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            default_vector_name: None,
            sparse_vector_name: "sparse".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilvusConfig {
    /// Vector field searched and written when the query names none
    pub default_vector_field: String,
    /// Primary key field used in id expressions
    pub primary_field: String,
    /// Field that receives sparse vectors on upsert
    pub sparse_vector_field: String,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            default_vector_field: "embedding".to_string(),
            primary_field: "id".to_string(),
            sparse_vector_field: "sparse_vector".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaviateConfig {
    /// Upper-case the first letter of class names
    pub capitalize_class: bool,
}

impl Default for WeaviateConfig {
    fn default() -> Self {
        Self {
            capitalize_class: true,
        }
    }
}

/// Complete configuration for every dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorqConfig {
    pub render: RenderOptions,
    pub qdrant: QdrantConfig,
    pub milvus: MilvusConfig,
    pub weaviate: WeaviateConfig,
}

impl VectorqConfig {
    /// Parse a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_filter_depth, 5);
        assert_eq!(limits.max_batch_size, 100);
        assert_eq!(limits.max_top_k, 10_000);
        assert_eq!(limits.max_metadata_fields, 50);
        assert_eq!(limits.max_ids, 1_000);
    }

    #[test]
    fn test_operator_policy_from_str() {
        assert_eq!("Reject".parse::<OperatorPolicy>(), Ok(OperatorPolicy::Reject));
        assert_eq!(" fallback ".parse::<OperatorPolicy>(), Ok(OperatorPolicy::Fallback));
        assert!("strict".parse::<OperatorPolicy>().is_err());
    }

    #[test]
    fn test_feature_policy_defaults_to_degrade() {
        assert_eq!(RenderOptions::default().feature_policy, FeaturePolicy::Degrade);
        assert_eq!("REJECT".parse::<FeaturePolicy>(), Ok(FeaturePolicy::Reject));
        assert!("drop".parse::<FeaturePolicy>().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = VectorqConfig::from_toml_str(
            r#"
            [render]
            operator_policy = "reject"
            feature_policy = "reject"

            [render.limits]
            max_top_k = 500

            [milvus]
            default_vector_field = "dense"
            "#,
        )
        .unwrap();

        assert_eq!(config.render.operator_policy, OperatorPolicy::Reject);
        assert_eq!(config.render.feature_policy, FeaturePolicy::Reject);
        assert_eq!(config.render.limits.max_top_k, 500);
        assert_eq!(config.render.limits.max_batch_size, 100);
        assert_eq!(config.milvus.default_vector_field, "dense");
        assert_eq!(config.milvus.primary_field, "id");
        assert_eq!(config.qdrant.sparse_vector_name, "sparse");
        assert!(config.weaviate.capitalize_class);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(VectorqConfig::from_toml_str("").unwrap(), VectorqConfig::default());
    }
}

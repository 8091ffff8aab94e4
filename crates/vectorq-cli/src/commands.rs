//! Subcommand implementations.
//!
//! Each command returns the text to print so it can be tested without a
//! process boundary.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::info;
use vectorq::{
    Dialect, DistanceMetric, FilterOperator, Operation, Validator, VectorQuery, VectorqConfig,
};

/// Read a query IR from `path`, or stdin when `path` is `-`
pub fn read_query(path: &Path) -> Result<VectorQuery> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read query from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read query file: {}", path.display()))?
    };
    parse_query(&text)
}

pub fn parse_query(text: &str) -> Result<VectorQuery> {
    serde_json::from_str(text).context("Failed to parse query IR")
}

/// Packaged render output
#[derive(Debug, Serialize)]
struct RenderOutput {
    document: Value,
    required_params: Vec<String>,
}

pub fn render(
    config: &VectorqConfig,
    dialect: Dialect,
    query: &VectorQuery,
    raw: bool,
    pretty: bool,
) -> Result<String> {
    let rendered = dialect
        .renderer(config)
        .render(query)
        .with_context(|| format!("Failed to render {} query for {dialect}", query.operation))?;
    info!(
        %dialect,
        params = rendered.required_params.len(),
        "rendered query"
    );

    let output = if raw {
        rendered.document()?
    } else {
        serde_json::to_value(RenderOutput {
            document: rendered.document()?,
            required_params: rendered.required_params,
        })?
    };

    let text = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    Ok(text)
}

pub fn validate(config: &VectorqConfig, query: &VectorQuery) -> Result<String> {
    Validator::new(config.render.limits)
        .validate(query)
        .context("Query is invalid")?;
    Ok(format!(
        "valid {} query on '{}' ({} params)",
        query.operation,
        query.target.name,
        query.referenced_params().len()
    ))
}

#[derive(Debug, Serialize)]
struct Capabilities {
    dialect: Dialect,
    operations: BTreeMap<&'static str, bool>,
    filter_operators: BTreeMap<&'static str, bool>,
    metrics: BTreeMap<&'static str, bool>,
}

pub fn capabilities(config: &VectorqConfig, dialect: Dialect) -> Result<String> {
    let renderer = dialect.renderer(config);
    let report = Capabilities {
        dialect,
        operations: Operation::ALL
            .iter()
            .map(|op| (op.as_str(), renderer.supports_operation(*op)))
            .collect(),
        filter_operators: FilterOperator::ALL
            .iter()
            .map(|op| (op.as_str(), renderer.supports_filter_operator(*op)))
            .collect(),
        metrics: DistanceMetric::ALL
            .iter()
            .map(|m| (m.as_str(), renderer.supports_metric(*m)))
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str = r#"{
        "operation": "SEARCH",
        "target": { "name": "products" },
        "query_vector": { "param": "query_vec" },
        "top_k": { "static": 10 },
        "include_metadata": true
    }"#;

    #[test]
    fn test_render_packages_document_and_params() {
        let query = parse_query(SEARCH).unwrap();
        let out = render(&VectorqConfig::default(), Dialect::Pinecone, &query, false, false)
            .unwrap();

        assert_eq!(
            out,
            r#"{"document":{"includeMetadata":true,"includeValues":false,"topK":10,"vector":":query_vec"},"required_params":["query_vec"]}"#
        );
    }

    #[test]
    fn test_render_raw_prints_document_only() {
        let query = parse_query(SEARCH).unwrap();
        let out = render(&VectorqConfig::default(), Dialect::Qdrant, &query, true, false)
            .unwrap();

        assert_eq!(
            out,
            r#"{"limit":10,"query":{"vector":":query_vec"},"with_payload":true,"with_vector":false}"#
        );
    }

    #[test]
    fn test_validate_reports_limit() {
        let mut config = VectorqConfig::default();
        config.render.limits.max_top_k = 5;
        let query = parse_query(SEARCH).unwrap();

        let err = validate(&config, &query).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "Query is invalid: TopK exceeds maximum: 10 > 5"
        );
    }

    #[test]
    fn test_validate_ok() {
        let query = parse_query(SEARCH).unwrap();
        let out = validate(&VectorqConfig::default(), &query).unwrap();
        assert_eq!(out, "valid SEARCH query on 'products' (1 params)");
    }

    #[test]
    fn test_capabilities_lists_every_operator() {
        let out = capabilities(&VectorqConfig::default(), Dialect::Weaviate).unwrap();
        let report: Value = serde_json::from_str(&out).unwrap();

        assert_eq!(report["dialect"], "weaviate");
        assert_eq!(report["filter_operators"]["IN"], false);
        assert_eq!(report["filter_operators"]["CONTAINS"], true);
        assert_eq!(report["metrics"]["MANHATTAN"], true);
        assert_eq!(
            report["filter_operators"].as_object().unwrap().len(),
            FilterOperator::ALL.len()
        );
    }

    #[test]
    fn test_parse_query_rejects_bad_json() {
        assert!(parse_query("{").is_err());
    }
}

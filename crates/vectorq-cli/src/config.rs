//! Configuration loading for the CLI.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use vectorq::{FeaturePolicy, OperatorPolicy, VectorqConfig};

/// Load configuration with precedence: defaults < file < env
pub fn load(config_file: Option<PathBuf>) -> Result<VectorqConfig> {
    let mut config = match config_file {
        Some(path) => from_file(&path)?,
        None => VectorqConfig::default(),
    };
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

fn from_file(path: &Path) -> Result<VectorqConfig> {
    debug!(path = %path.display(), "loading config file");
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    VectorqConfig::from_toml_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Override limits and policies from `VECTORQ_*` variables
pub fn apply_env(
    config: &mut VectorqConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let limits = &mut config.render.limits;
    for (key, slot) in [
        ("VECTORQ_MAX_TOP_K", &mut limits.max_top_k),
        ("VECTORQ_MAX_FILTER_DEPTH", &mut limits.max_filter_depth),
        ("VECTORQ_MAX_BATCH_SIZE", &mut limits.max_batch_size),
        ("VECTORQ_MAX_IDS", &mut limits.max_ids),
    ] {
        if let Some(value) = var(key) {
            *slot = value
                .parse()
                .with_context(|| format!("{key} must be a non-negative integer, got {value:?}"))?;
        }
    }

    if let Some(value) = var("VECTORQ_OPERATOR_POLICY") {
        config.render.operator_policy = value
            .parse::<OperatorPolicy>()
            .map_err(anyhow::Error::msg)
            .context("Invalid VECTORQ_OPERATOR_POLICY")?;
    }

    if let Some(value) = var("VECTORQ_FEATURE_POLICY") {
        config.render.feature_policy = value
            .parse::<FeaturePolicy>()
            .map_err(anyhow::Error::msg)
            .context("Invalid VECTORQ_FEATURE_POLICY")?;
    }
    Ok(())
}

/// Render the configuration as TOML
pub fn display_as_toml(config: &VectorqConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize config as TOML")
}

//! Result packaging: serialize the dialect document and pair it with the
//! required-parameter list.

use super::ParamCollector;
use crate::error::{RenderError, RenderResult};
use serde::Serialize;
use serde_json::{Number, Value};

/// Output from rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedQuery {
    /// The serialized backend-native document
    pub json: String,
    /// Param names to bind, in first-occurrence order, duplicates kept
    pub required_params: Vec<String>,
}

impl RenderedQuery {
    /// Serialize `document` and take the params collected while building it
    pub fn package(document: &Value, params: ParamCollector) -> RenderResult<Self> {
        let json = serde_json::to_string(document)?;
        Ok(Self {
            json,
            required_params: params.into_names(),
        })
    }

    /// Parse the document back into a JSON value
    pub fn document(&self) -> RenderResult<Value> {
        Ok(serde_json::from_str(&self.json)?)
    }
}

/// Encode literal float components as a JSON array.
///
/// Components go through their shortest `f32` text form so `0.1f32` is
/// written as `0.1` rather than its widened `f64` expansion. NaN and
/// infinities have no JSON encoding and fail the render.
pub fn encode_floats(context: &'static str, values: &[f32]) -> RenderResult<Value> {
    values
        .iter()
        .enumerate()
        .map(|(index, v)| encode_float(context, index, *v))
        .collect::<RenderResult<Vec<_>>>()
        .map(Value::Array)
}

/// Encode the component at `index` of a literal
pub(crate) fn encode_float(context: &'static str, index: usize, value: f32) -> RenderResult<Value> {
    let widened: f64 = value.to_string().parse().unwrap_or(f64::from(value));
    Number::from_f64(widened)
        .filter(|_| value.is_finite())
        .map(Value::Number)
        .ok_or(RenderError::NonFiniteLiteral { context, index })
}

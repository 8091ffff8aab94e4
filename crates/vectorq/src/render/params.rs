//! Required-parameter accumulation.

use crate::ir::Param;
use serde_json::Value;

/// Records every param occurrence in rendering order.
///
/// Occurrences are kept, not a set: a param referenced twice is listed twice.
#[derive(Debug, Clone, Default)]
pub struct ParamCollector {
    names: Vec<String>,
}

impl ParamCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `param` and return its placeholder token (`:name`)
    pub fn placeholder(&mut self, param: &Param) -> String {
        self.names.push(param.name().to_string());
        param.to_string()
    }

    /// Record `param` and return its placeholder as a JSON string
    pub fn bind(&mut self, param: &Param) -> Value {
        Value::String(self.placeholder(param))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_order_and_duplicates() {
        let mut params = ParamCollector::new();
        let a = Param::new("a");
        let b = Param::new("b");

        assert_eq!(params.bind(&a), Value::String(":a".to_string()));
        assert_eq!(params.placeholder(&b), ":b");
        params.bind(&a);

        assert_eq!(params.len(), 3);
        assert_eq!(params.into_names(), vec!["a", "b", "a"]);
    }
}

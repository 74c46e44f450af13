//! Declarative index expressions: JSONPath queries evaluated against a
//! channel value.

use crate::errors::{RippleError, RippleResult};
use serde_json::Value;
use serde_json_path::JsonPath;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct IndexExpression {
    source: String,
    path: Arc<JsonPath>,
}

impl IndexExpression {
    /// Parse a JSONPath query. The regex-literal form `/$.path/` is accepted
    /// as well as the bare `$.path`.
    pub fn parse(expr: &str) -> RippleResult<Self> {
        let trimmed = expr.trim();
        let source = trimmed
            .strip_prefix('/')
            .and_then(|inner| inner.strip_suffix('/'))
            .unwrap_or(trimmed);

        let path = JsonPath::parse(source).map_err(|e| RippleError::IndexExpression {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: source.to_string(),
            path: Arc::new(path),
        })
    }

    /// Ordered matches of the query. Never fails; no match yields `[]`.
    pub fn query(&self, value: &Value) -> Vec<Value> {
        self.path.query(value).all().into_iter().cloned().collect()
    }

    /// Matches collected into a single array value.
    pub fn apply(&self, value: &Value) -> Value {
        Value::Array(self.query(value))
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for IndexExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexExpression(/{}/)", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_regex_literal_form() {
        let expr = IndexExpression::parse("/$.a/").unwrap();
        assert_eq!(expr.source(), "$.a");
        assert_eq!(expr.apply(&json!({ "a": 1 })), json!([1]));
    }

    #[test]
    fn test_wildcard_query_keeps_order() {
        let expr = IndexExpression::parse("$.items[*].id").unwrap();
        let value = json!({ "items": [{ "id": 3 }, { "id": 1 }, { "id": 2 }] });
        assert_eq!(expr.query(&value), vec![json!(3), json!(1), json!(2)]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let expr = IndexExpression::parse("$.missing").unwrap();
        assert_eq!(expr.apply(&json!({ "a": 1 })), json!([]));
        assert_eq!(expr.apply(&Value::Null), json!([]));
    }

    #[test]
    fn test_invalid_expression() {
        let result = IndexExpression::parse("not a path");
        assert!(matches!(result, Err(RippleError::IndexExpression { .. })));
    }
}

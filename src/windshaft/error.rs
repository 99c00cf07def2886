use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A backend error as reported in `errors_with_context`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindshaftError {
    pub message: String,
    /// `layer`, `analysis`, `unknown`, ...
    pub kind: Option<String>,
    pub subtype: Option<String>,
    pub layer_id: Option<String>,
    pub analysis_id: Option<String>,
    pub context: Option<Value>,
}

impl WindshaftError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Build from one `errors_with_context` entry.
    pub fn from_context(error: &Value) -> Self {
        let str_field = |name: &str| error.get(name).and_then(Value::as_str).map(str::to_string);
        let kind = str_field("type");

        let layer_id = match kind.as_deref() {
            Some("layer") => error
                .pointer("/layer/id")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        };
        let analysis_id = match kind.as_deref() {
            Some("analysis") => error
                .pointer("/analysis/node_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        };

        Self {
            message: str_field("message").unwrap_or_default(),
            subtype: str_field("subtype"),
            context: error.get("context").cloned(),
            kind,
            layer_id,
            analysis_id,
        }
    }

    /// Errors of an instantiation response body: every
    /// `errors_with_context` entry, or the first plain `errors` message.
    pub fn from_response(body: &Value) -> Vec<Self> {
        if let Some(errors) = body.get("errors_with_context").and_then(Value::as_array) {
            return errors.iter().map(Self::from_context).collect();
        }
        if let Some(first) = body
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
        {
            let message = match first {
                Value::String(message) => message.clone(),
                other => other.to_string(),
            };
            return vec![Self::new(message)];
        }
        Vec::new()
    }

    pub fn is_layer_error(&self) -> bool {
        self.kind.as_deref() == Some("layer")
    }

    pub fn is_analysis_error(&self) -> bool {
        self.kind.as_deref() == Some("analysis")
    }
}

impl std::fmt::Display for WindshaftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_errors_with_context() {
        let errors = WindshaftError::from_response(&json!({
            "errors": ["ignored"],
            "errors_with_context": [
                {
                    "type": "layer",
                    "subtype": "turbo-carto",
                    "message": "bad cartocss",
                    "layer": { "id": "l1", "index": 0 },
                    "context": { "line": 3 }
                },
                {
                    "type": "analysis",
                    "message": "missing column",
                    "analysis": { "id": "a0", "node_id": "a1" }
                }
            ]
        }));

        assert_eq!(errors.len(), 2);
        assert!(errors[0].is_layer_error());
        assert_eq!(errors[0].layer_id.as_deref(), Some("l1"));
        assert_eq!(errors[0].subtype.as_deref(), Some("turbo-carto"));
        assert_eq!(errors[0].context, Some(json!({ "line": 3 })));
        assert!(errors[1].is_analysis_error());
        assert_eq!(errors[1].analysis_id.as_deref(), Some("a1"));
        assert_eq!(errors[1].layer_id, None);
        assert_eq!(errors[1].to_string(), "missing column");
    }

    #[test]
    fn test_plain_errors_keep_first() {
        let errors = WindshaftError::from_response(&json!({ "errors": ["first", "second"] }));
        assert_eq!(errors, vec![WindshaftError::new("first")]);

        assert!(WindshaftError::from_response(&json!({ "layergroupid": "x" })).is_empty());
    }
}

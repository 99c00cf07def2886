use crate::prelude::HashMap;
use crate::{MapError, Result};

/// Parameters an analysis type accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisSchema {
    /// Params that are themselves analysis nodes, in declaration order
    pub source_names: Vec<String>,
    /// Plain scalar params
    pub param_names: Vec<String>,
}

impl AnalysisSchema {
    pub fn new<S, P>(source_names: S, param_names: P) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            source_names: source_names.into_iter().map(Into::into).collect(),
            param_names: param_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_source(&self, name: &str) -> bool {
        self.source_names.iter().any(|source| source == name)
    }

    pub fn is_param(&self, name: &str) -> bool {
        self.param_names.iter().any(|param| param == name)
    }

    /// Whether changes on `name` are observed by the node.
    pub fn binds(&self, name: &str) -> bool {
        self.is_source(name) || self.is_param(name)
    }
}

/// Schema provider for analysis types (the backend's analysis catalogue).
pub trait AnalysisReference: Send + Sync {
    fn schema(&self, analysis_type: &str) -> Result<AnalysisSchema>;
}

/// In-memory catalogue
#[derive(Debug, Clone, Default)]
pub struct StaticReference {
    types: HashMap<String, AnalysisSchema>,
}

impl StaticReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, analysis_type: impl Into<String>, schema: AnalysisSchema) -> Self {
        self.types.insert(analysis_type.into(), schema);
        self
    }

    pub fn register(&mut self, analysis_type: impl Into<String>, schema: AnalysisSchema) {
        self.types.insert(analysis_type.into(), schema);
    }
}

impl AnalysisReference for StaticReference {
    fn schema(&self, analysis_type: &str) -> Result<AnalysisSchema> {
        self.types
            .get(analysis_type)
            .cloned()
            .ok_or_else(|| MapError::UnknownAnalysisType(analysis_type.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_reference() {
        let reference = StaticReference::new().with_type(
            "trade-area",
            AnalysisSchema::new(["source"], ["kind", "time"]),
        );

        let schema = reference.schema("trade-area").unwrap();
        assert!(schema.is_source("source"));
        assert!(schema.is_param("kind"));
        assert!(schema.binds("time"));
        assert!(!schema.binds("other"));

        assert!(matches!(
            reference.schema("buffer"),
            Err(MapError::UnknownAnalysisType(t)) if t == "buffer"
        ));
    }
}

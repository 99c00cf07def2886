use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reference::AnalysisSchema;

/// Lifecycle of an analysis node as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Loading,
    Loaded,
    Failed,
}

impl AnalysisStatus {
    /// Map the backend's status vocabulary onto the node lifecycle.
    pub fn from_backend(status: &str) -> Self {
        match status {
            "running" | "loading" => Self::Loading,
            "ready" | "loaded" => Self::Loaded,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A node param: either an edge to another node or a plain value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Source(String),
    Scalar(Value),
}

impl ParamValue {
    pub fn as_source(&self) -> Option<&str> {
        match self {
            Self::Source(id) => Some(id),
            Self::Scalar(_) => None,
        }
    }
}

/// One step of the analysis graph.
///
/// Nodes are owned by [`crate::analysis::AnalysisGraph`]; source params hold
/// the id of the upstream node rather than the node itself.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisNode {
    id: String,
    kind: String,
    params: BTreeMap<String, ParamValue>,
    status: AnalysisStatus,
    error: Option<Value>,
    url: Option<Value>,
    schema: AnalysisSchema,
}

impl AnalysisNode {
    pub(crate) fn new(
        id: String,
        kind: String,
        params: BTreeMap<String, ParamValue>,
        schema: AnalysisSchema,
    ) -> Self {
        Self {
            id,
            kind,
            params,
            status: AnalysisStatus::default(),
            error: None,
            url: None,
            schema,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Analysis type, e.g. `trade-area`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn schema(&self) -> &AnalysisSchema {
        &self.schema
    }

    /// Ids of the direct upstream nodes, in schema order.
    pub fn source_ids(&self) -> Vec<&str> {
        self.schema
            .source_names
            .iter()
            .filter_map(|name| self.params.get(name).and_then(ParamValue::as_source))
            .collect()
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn error(&self) -> Option<&Value> {
        self.error.as_ref()
    }

    pub fn url(&self) -> Option<&Value> {
        self.url.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.status == AnalysisStatus::Loading
    }

    pub fn is_failed(&self) -> bool {
        self.status == AnalysisStatus::Failed
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, AnalysisStatus::Loaded | AnalysisStatus::Failed)
    }

    /// Returns true when status or error actually changed.
    pub(crate) fn set_status(&mut self, status: AnalysisStatus, error: Option<Value>) -> bool {
        if self.status == status && self.error == error {
            return false;
        }
        self.status = status;
        self.error = error;
        true
    }

    pub(crate) fn set_url(&mut self, url: Option<Value>) {
        self.url = url;
    }

    /// Replace type and schema. Params the new schema does not bind are dropped.
    pub(crate) fn rebind(&mut self, kind: String, schema: AnalysisSchema) {
        self.params.retain(|name, _| schema.binds(name));
        self.kind = kind;
        self.schema = schema;
    }

    /// Returns the names of bound params whose value changed.
    pub(crate) fn replace_params(&mut self, params: BTreeMap<String, ParamValue>) -> Vec<String> {
        let mut changed: Vec<String> = params
            .iter()
            .filter(|(name, value)| self.params.get(*name) != Some(value))
            .map(|(name, _)| name.clone())
            .collect();
        changed.extend(
            self.params
                .keys()
                .filter(|name| !params.contains_key(*name))
                .cloned(),
        );
        changed.retain(|name| self.schema.binds(name));
        self.params = params;
        changed
    }

    pub(crate) fn set_param(&mut self, name: &str, value: ParamValue) -> bool {
        if self.params.get(name) == Some(&value) {
            return false;
        }
        self.params.insert(name.to_string(), value);
        true
    }
}

//! Analysis graph and factory
//!
//! [`AnalysisGraph::analyse`] turns nested declarative definitions
//! (`{id, type, params}` where source params are themselves definitions) into
//! graph nodes. Re-analysing a definition whose `id` already exists updates the
//! existing node in place, so node identity survives updates and only actual
//! param changes request a map reload.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::node::{AnalysisNode, AnalysisStatus, ParamValue};
use super::reference::AnalysisReference;
use crate::core::reload::ReloadOptions;
use crate::events::EventManager;
use crate::prelude::{HashMap, HashSet};
use crate::{MapError, Result};

#[cfg(feature = "debug")]
use log;

/// Observable changes on the graph
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    Created {
        id: String,
    },
    /// Type or bound params changed
    Changed {
        id: String,
    },
    StatusChanged {
        id: String,
        status: AnalysisStatus,
        error: Option<Value>,
    },
    Removed {
        id: String,
    },
}

struct Definition<'a> {
    id: &'a str,
    kind: &'a str,
    params: Option<&'a Map<String, Value>>,
}

impl<'a> Definition<'a> {
    fn parse(value: &'a Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            MapError::Validation("analysis definition must be an object".to_string())
        })?;
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .ok_or(MapError::MissingAttribute("id"))?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(MapError::MissingAttribute("type"))?;
        let params = object.get("params").and_then(Value::as_object);
        Ok(Self { id, kind, params })
    }

    fn params(&self) -> impl Iterator<Item = (&'a String, &'a Value)> {
        self.params.into_iter().flat_map(|params| params.iter())
    }
}

pub struct AnalysisGraph {
    reference: Arc<dyn AnalysisReference>,
    nodes: HashMap<String, AnalysisNode>,
    events: EventManager<AnalysisEvent>,
    reload_requests: Vec<ReloadOptions>,
}

impl std::fmt::Debug for AnalysisGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisGraph")
            .field("nodes", &self.nodes)
            .field("reload_requests", &self.reload_requests)
            .finish()
    }
}

impl AnalysisGraph {
    pub fn new(reference: Arc<dyn AnalysisReference>) -> Self {
        Self {
            reference,
            nodes: HashMap::default(),
            events: EventManager::new(),
            reload_requests: Vec::new(),
        }
    }

    pub fn events(&mut self) -> &mut EventManager<AnalysisEvent> {
        &mut self.events
    }

    /// Build or update nodes from a nested definition. Returns the root id.
    ///
    /// The whole definition is validated before any node is touched, so a
    /// rejected definition leaves the graph unchanged.
    pub fn analyse(&mut self, definition: &Value) -> Result<String> {
        self.validate(definition, &mut Vec::new())?;
        self.apply(definition)
    }

    fn validate(&self, definition: &Value, ancestors: &mut Vec<String>) -> Result<()> {
        let def = Definition::parse(definition)?;
        if ancestors.iter().any(|ancestor| ancestor == def.id) {
            return Err(MapError::Validation(format!(
                "analysis '{}' depends on itself",
                def.id
            )));
        }
        let schema = self.reference.schema(def.kind)?;

        ancestors.push(def.id.to_string());
        for (name, value) in def.params() {
            if schema.is_source(name) {
                match value {
                    Value::Object(_) => self.validate(value, ancestors)?,
                    Value::String(source_id) => self.validate_reference(source_id, ancestors)?,
                    _ => {
                        return Err(MapError::Validation(format!(
                            "source param '{}' of analysis '{}' must be an analysis",
                            name, def.id
                        )))
                    }
                }
            } else if !schema.is_param(name) {
                return Err(MapError::UnknownParam {
                    analysis_type: def.kind.to_string(),
                    param: name.clone(),
                });
            }
        }
        ancestors.pop();
        Ok(())
    }

    fn validate_reference(&self, source_id: &str, ancestors: &[String]) -> Result<()> {
        if !self.nodes.contains_key(source_id) {
            return Err(MapError::NotFound(format!("analysis '{}'", source_id)));
        }
        if ancestors
            .iter()
            .any(|ancestor| self.find_analysis_by_id(source_id, ancestor).is_some())
        {
            return Err(MapError::Validation(format!(
                "analysis '{}' would create a cycle",
                source_id
            )));
        }
        Ok(())
    }

    fn apply(&mut self, definition: &Value) -> Result<String> {
        let def = Definition::parse(definition)?;
        let schema = self.reference.schema(def.kind)?;

        let mut params = BTreeMap::new();
        for (name, value) in def.params() {
            let param = if schema.is_source(name) {
                match value {
                    Value::String(source_id) => ParamValue::Source(source_id.clone()),
                    _ => ParamValue::Source(self.apply(value)?),
                }
            } else {
                ParamValue::Scalar(value.clone())
            };
            params.insert(name.clone(), param);
        }

        let id = def.id.to_string();
        let changed = match self.nodes.get_mut(&id) {
            Some(node) if node.kind() != def.kind => {
                node.rebind(def.kind.to_string(), schema);
                node.replace_params(params);
                true
            }
            Some(node) => !node.replace_params(params).is_empty(),
            None => {
                let node = AnalysisNode::new(id.clone(), def.kind.to_string(), params, schema);
                self.nodes.insert(id.clone(), node);
                self.events.emit(AnalysisEvent::Created { id: id.clone() });
                false
            }
        };

        if changed {
            self.node_changed(&id);
        }
        Ok(id)
    }

    fn node_changed(&mut self, id: &str) {
        #[cfg(feature = "debug")]
        log::debug!("analysis '{}' changed, requesting reload", id);

        self.events.emit(AnalysisEvent::Changed { id: id.to_string() });
        let request = ReloadOptions::scoped(id);
        if !self.reload_requests.contains(&request) {
            self.reload_requests.push(request);
        }
    }

    /// Reload requests produced by node changes since the last call.
    pub fn drain_reload_requests(&mut self) -> Vec<ReloadOptions> {
        std::mem::take(&mut self.reload_requests)
    }

    /// Set a single param. Unknown params are rejected.
    pub fn set_param(&mut self, id: &str, name: &str, value: Value) -> Result<()> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| MapError::NotFound(format!("analysis '{}'", id)))?;
        let schema = node.schema().clone();

        let param = if schema.is_param(name) {
            ParamValue::Scalar(value)
        } else if schema.is_source(name) {
            let mut ancestors = vec![id.to_string()];
            match &value {
                Value::String(source_id) => {
                    self.validate_reference(source_id, &ancestors)?;
                    ParamValue::Source(source_id.clone())
                }
                _ => {
                    self.validate(&value, &mut ancestors)?;
                    ParamValue::Source(self.apply(&value)?)
                }
            }
        } else {
            return Err(MapError::UnknownParam {
                analysis_type: node.kind().to_string(),
                param: name.to_string(),
            });
        };

        let changed = self
            .nodes
            .get_mut(id)
            .map(|node| node.set_param(name, param))
            .unwrap_or(false);
        if changed {
            self.node_changed(id);
        }
        Ok(())
    }

    /// Change the type of a node, rebinding its params to the new schema.
    pub fn set_kind(&mut self, id: &str, kind: &str) -> Result<()> {
        let schema = self.reference.schema(kind)?;
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| MapError::NotFound(format!("analysis '{}'", id)))?;
        if node.kind() == kind {
            return Ok(());
        }
        node.rebind(kind.to_string(), schema);
        self.node_changed(id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&AnalysisNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Depth-first search from `root_id` through source params.
    pub fn find_analysis_by_id(&self, root_id: &str, id: &str) -> Option<&AnalysisNode> {
        let mut stack = vec![root_id];
        let mut visited = HashSet::default();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if node.id() == id {
                return Some(node);
            }
            // Reverse so the first declared source is explored first
            stack.extend(node.source_ids().into_iter().rev());
        }

        None
    }

    /// Serialize the subgraph rooted at `id`, inlining source nodes.
    pub fn to_json(&self, id: &str) -> Option<Value> {
        let node = self.nodes.get(id)?;
        let mut params = Map::new();
        for (name, value) in node.params() {
            let value = match value {
                ParamValue::Scalar(value) => value.clone(),
                ParamValue::Source(source_id) => self
                    .to_json(source_id)
                    .unwrap_or_else(|| Value::String(source_id.clone())),
            };
            params.insert(name.clone(), value);
        }

        Some(json!({
            "id": node.id(),
            "type": node.kind(),
            "params": params,
        }))
    }

    /// Returns true when the status actually changed.
    pub fn set_status(
        &mut self,
        id: &str,
        status: AnalysisStatus,
        error: Option<Value>,
    ) -> Result<bool> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| MapError::NotFound(format!("analysis '{}'", id)))?;
        if !node.set_status(status, error.clone()) {
            return Ok(false);
        }
        self.events.emit(AnalysisEvent::StatusChanged {
            id: id.to_string(),
            status,
            error,
        });
        Ok(true)
    }

    /// Apply a `metadata.analyses[].nodes[id]` entry from an instantiation
    /// response: `{status, error_message, url}`.
    pub fn update_from_metadata(&mut self, id: &str, meta: &Value) -> Result<bool> {
        let status = meta
            .get("status")
            .and_then(Value::as_str)
            .map(AnalysisStatus::from_backend)
            .unwrap_or(AnalysisStatus::Loaded);
        let error = meta
            .get("error_message")
            .and_then(Value::as_str)
            .map(|message| json!({ "message": message }));

        if let Some(node) = self.nodes.get_mut(id) {
            node.set_url(meta.get("url").cloned());
        }
        self.set_status(id, status, error)
    }

    /// Detach a node. Nodes referencing it keep the dangling id.
    pub fn remove(&mut self, id: &str) -> Option<AnalysisNode> {
        let node = self.nodes.remove(id)?;
        self.events.emit(AnalysisEvent::Removed { id: id.to_string() });
        Some(node)
    }
}

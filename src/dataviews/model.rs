//! Dataview model and its fetch state machine
//!
//! Every transition (`on_url_change`, `on_bounds_change`, `set_enabled`,
//! `data_changed`) is a plain method returning a [`FetchDecision`]. The caller
//! performs the fetch, which keeps the rules testable without any I/O.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::analysis::{AnalysisGraph, AnalysisStatus};
use crate::core::geo::LatLngBounds;
use crate::core::reload::{ReloadOptions, UrlChange};
use crate::dataviews::category::CategoryDataview;
use crate::dataviews::formula::FormulaOperation;
use crate::dataviews::{DataviewData, DataviewKind, Fetchable};
use crate::events::EventManager;
use crate::filters::{BoundingBoxFilter, CategoryFilter, Filter};
use crate::layers::{DataProvider, Layer};
use crate::windshaft::transport::TransportError;
use crate::{MapError, Result};

#[cfg(feature = "debug")]
use log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataviewState {
    #[default]
    Uninitialized,
    Loading,
    Loaded,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDecision {
    Fetch,
    /// Re-run the applied category search instead of the regular fetch
    Search,
    Skip,
}

impl FetchDecision {
    pub fn should_fetch(&self) -> bool {
        matches!(self, FetchDecision::Fetch)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataviewEvent {
    Loading { id: String },
    Loaded { id: String },
    Error { id: String, error: Option<Value> },
    DataChanged { id: String },
    SearchChanged { id: String },
    Destroyed { id: String },
}

/// A fetch ticket. Only the response to the latest ticket is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub dataview_id: String,
    pub seq: u64,
    pub url: String,
}

/// Attributes that can be changed through [`DataviewModel::update`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DataviewUpdate {
    pub sync_on_data_change: Option<bool>,
    pub sync_on_bbox_change: Option<bool>,
    pub enabled: Option<bool>,
    pub source: Option<String>,
}

pub struct DataviewModel {
    id: String,
    layer_id: String,
    /// Analysis node or layer id this dataview was declared against
    source: String,
    layer_source: Option<String>,
    has_data_provider: bool,
    kind: DataviewKind,
    filter: Option<Filter>,
    url: Option<String>,
    api_key: Option<String>,
    auth_token: Option<String>,
    enabled: bool,
    sync_on_data_change: bool,
    sync_on_bbox_change: bool,
    state: DataviewState,
    /// Set after the first successful fetch (or first provider data); before
    /// that only the first url triggers a fetch.
    bound: bool,
    new_data_available: bool,
    data: Option<DataviewData>,
    error: Option<Value>,
    fetch_seq: u64,
    search_seq: u64,
    /// Analysis node whose status is forwarded as loading/error
    analysis_binding: Option<String>,
    events: EventManager<DataviewEvent>,
}

impl std::fmt::Debug for DataviewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataviewModel")
            .field("id", &self.id)
            .field("type", &self.kind.type_name())
            .field("layer_id", &self.layer_id)
            .field("source", &self.source)
            .field("state", &self.state)
            .field("enabled", &self.enabled)
            .field("url", &self.url)
            .finish()
    }
}

impl DataviewModel {
    pub(crate) fn new(
        id: String,
        layer_id: String,
        source: String,
        kind: DataviewKind,
        filter: Option<Filter>,
    ) -> Self {
        Self {
            id,
            layer_id,
            source,
            layer_source: None,
            has_data_provider: false,
            kind,
            filter,
            url: None,
            api_key: None,
            auth_token: None,
            enabled: true,
            sync_on_data_change: true,
            sync_on_bbox_change: true,
            state: DataviewState::Uninitialized,
            bound: false,
            new_data_available: false,
            data: None,
            error: None,
            fetch_seq: 0,
            search_seq: 0,
            analysis_binding: None,
            events: EventManager::new(),
        }
    }

    pub(crate) fn set_credentials(&mut self, api_key: Option<String>, auth_token: Option<String>) {
        self.api_key = api_key;
        self.auth_token = auth_token;
    }

    pub(crate) fn set_sync_flags(&mut self, on_data_change: bool, on_bbox_change: bool) {
        self.sync_on_data_change = on_data_change;
        self.sync_on_bbox_change = on_bbox_change;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn kind(&self) -> &DataviewKind {
        &self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub(crate) fn filter_mut(&mut self) -> Option<&mut Filter> {
        self.filter.as_mut()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Base url assigned by the last instantiation
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn state(&self) -> DataviewState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn sync_on_data_change(&self) -> bool {
        self.sync_on_data_change
    }

    pub fn sync_on_bbox_change(&self) -> bool {
        self.sync_on_bbox_change
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn new_data_available(&self) -> bool {
        self.new_data_available
    }

    pub fn data(&self) -> Option<&DataviewData> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&Value> {
        self.error.as_ref()
    }

    pub fn events(&mut self) -> &mut EventManager<DataviewEvent> {
        &mut self.events
    }

    pub fn to_json(&self) -> Value {
        self.kind.to_json()
    }

    // Source resolution

    /// Whether the dataview was declared against its layer rather than an
    /// analysis node.
    pub fn has_layer_as_source(&self) -> bool {
        self.source == self.layer_id
    }

    /// The analysis node feeding this dataview: the layer's source when the
    /// dataview points at a layer that has one, its own source otherwise.
    pub fn source_id(&self) -> &str {
        match &self.layer_source {
            Some(layer_source) if self.has_layer_as_source() => layer_source,
            _ => &self.source,
        }
    }

    pub fn has_same_source_as_layer(&self) -> bool {
        self.layer_source.as_deref() == Some(self.source_id())
    }

    pub fn analysis_binding(&self) -> Option<&str> {
        self.analysis_binding.as_deref()
    }

    /// Copy what the dataview needs from its layer and rebind to the
    /// resulting source node.
    pub fn sync_layer(&mut self, layer: &Layer, graph: &AnalysisGraph) {
        self.layer_source = layer.source.clone();
        self.has_data_provider = layer.data_provider().is_some();
        self.layer_meta_changed(layer);
        self.bind_analysis(graph);
    }

    pub(crate) fn layer_meta_changed(&mut self, layer: &Layer) {
        let column_type = layer.column_type().map(str::to_string);
        if let DataviewKind::Histogram(histogram) = &mut self.kind {
            histogram.column_type = column_type.clone();
        }
        if let Some(Filter::Range(range)) = &mut self.filter {
            range.column_type = column_type;
        }
    }

    /// Drop the old status binding before attaching the new one.
    pub fn bind_analysis(&mut self, graph: &AnalysisGraph) {
        self.analysis_binding = None;
        let source_id = self.source_id();
        if graph.contains(source_id) {
            self.analysis_binding = Some(source_id.to_string());
        }
    }

    fn source_affects_own_source(&self, source_id: &str, graph: &AnalysisGraph) -> bool {
        graph
            .find_analysis_by_id(self.source_id(), source_id)
            .is_some()
    }

    // Transitions

    /// A new instantiation assigned `url` to this dataview.
    pub fn on_url_change(
        &mut self,
        url: String,
        change: &UrlChange,
        graph: &AnalysisGraph,
    ) -> FetchDecision {
        let changed = self.url.as_deref() != Some(url.as_str());
        self.url = Some(url);

        if !self.bound {
            // With a data provider the first binding waits for its data.
            let first_fetch = changed
                && !self.has_data_provider
                && self.state != DataviewState::Loading;
            return if first_fetch {
                FetchDecision::Fetch
            } else {
                FetchDecision::Skip
            };
        }

        if !changed && !change.force_fetch {
            return FetchDecision::Skip;
        }

        if self.should_fetch_on_url_change(change, graph) {
            return FetchDecision::Fetch;
        }
        if self.sync_on_data_change {
            self.new_data_available = true;
        }
        FetchDecision::Skip
    }

    fn should_fetch_on_url_change(&self, change: &UrlChange, graph: &AnalysisGraph) -> bool {
        if change.force_fetch {
            return true;
        }
        self.sync_on_data_change
            && self.enabled
            && match &change.source_id {
                None => true,
                Some(source_id) => self.source_affects_own_source(source_id, graph),
            }
    }

    fn is_search_applied(&self) -> bool {
        self.category()
            .map(CategoryDataview::is_search_applied)
            .unwrap_or(false)
    }

    /// Debounced viewport change. An applied search keeps its rows.
    pub fn on_bounds_change(&mut self) -> FetchDecision {
        if !self.bound || self.is_search_applied() {
            return FetchDecision::Skip;
        }
        if self.enabled && self.sync_on_bbox_change {
            return FetchDecision::Fetch;
        }
        if self.sync_on_bbox_change {
            self.new_data_available = true;
        }
        FetchDecision::Skip
    }

    pub fn set_enabled(&mut self, enabled: bool) -> FetchDecision {
        if self.enabled == enabled {
            return FetchDecision::Skip;
        }
        self.enabled = enabled;
        if enabled && self.new_data_available {
            self.new_data_available = false;
            return FetchDecision::Fetch;
        }
        FetchDecision::Skip
    }

    /// The layer's data provider has new data.
    pub fn data_changed(&mut self) -> FetchDecision {
        self.bound = true;
        FetchDecision::Fetch
    }

    pub fn refresh(&self) -> FetchDecision {
        if self.is_search_applied() {
            FetchDecision::Search
        } else {
            FetchDecision::Fetch
        }
    }

    /// Apply the whitelisted attributes. A source change rebinds the analysis
    /// status binding immediately.
    pub fn update(&mut self, update: DataviewUpdate, graph: &AnalysisGraph) -> FetchDecision {
        if let Some(sync) = update.sync_on_data_change {
            self.sync_on_data_change = sync;
        }
        if let Some(sync) = update.sync_on_bbox_change {
            self.sync_on_bbox_change = sync;
        }
        if let Some(source) = update.source {
            if source != self.source {
                self.source = source;
                self.bind_analysis(graph);
            }
        }
        match update.enabled {
            Some(enabled) => self.set_enabled(enabled),
            None => FetchDecision::Skip,
        }
    }

    /// Forward a status change of the bound analysis node.
    pub fn on_analysis_status(
        &mut self,
        node_id: &str,
        status: AnalysisStatus,
        error: Option<&Value>,
    ) {
        if self.analysis_binding.as_deref() != Some(node_id) {
            return;
        }
        match status {
            AnalysisStatus::Loading => {
                self.events.emit(DataviewEvent::Loading {
                    id: self.id.clone(),
                });
            }
            AnalysisStatus::Failed => {
                self.state = DataviewState::Error;
                self.error = error.cloned();
                self.events.emit(DataviewEvent::Error {
                    id: self.id.clone(),
                    error: error.cloned(),
                });
            }
            // Loaded is observed through the url change that follows
            AnalysisStatus::Loaded | AnalysisStatus::Pending => {}
        }
    }

    /// The backend rejected this dataview's layer.
    pub fn on_layer_error(&mut self, error: Value) {
        self.fail(error);
    }

    // Fetching

    /// `url?bbox=west,south,east,north&<type params>&api_key|auth_token`
    pub fn build_url(&self, bounds: &LatLngBounds) -> Option<String> {
        let base = self.url.as_ref()?;
        let mut params = Vec::new();
        if self.kind.submits_bbox() {
            params.push(format!("bbox={}", BoundingBoxFilter::new(bounds)));
        }
        params.extend(self.kind.url_params());
        params.extend(self.credential_param());
        Some(format!("{}?{}", base, params.join("&")))
    }

    fn credential_param(&self) -> Option<String> {
        match (&self.api_key, &self.auth_token) {
            (Some(api_key), _) => Some(format!("api_key={}", api_key)),
            (None, Some(auth_token)) => Some(format!("auth_token={}", auth_token)),
            (None, None) => None,
        }
    }

    /// `url/search?q=<query>&bbox=...&api_key|auth_token`
    pub fn build_search_url(&self, bounds: &LatLngBounds) -> Option<String> {
        let base = self.url.as_ref()?;
        let category = self.category()?;
        let mut params = category.search_params();
        params.push(format!("bbox={}", BoundingBoxFilter::new(bounds)));
        params.extend(self.credential_param());
        Some(format!("{}/search?{}", base, params.join("&")))
    }

    /// Start a category search with the current query. Returns `None` until
    /// the dataview has a url.
    pub fn begin_search(&mut self, bounds: &LatLngBounds) -> Result<Option<FetchRequest>> {
        let category = self.category().ok_or_else(|| {
            MapError::Validation(format!("dataview '{}' is not a category", self.id))
        })?;
        if !category.is_search_valid() {
            return Err(MapError::Validation(format!(
                "dataview '{}' has no search query",
                self.id
            )));
        }
        let Some(url) = self.build_search_url(bounds) else {
            return Ok(None);
        };
        self.search_seq += 1;
        self.events.emit(DataviewEvent::Loading {
            id: self.id.clone(),
        });
        Ok(Some(FetchRequest {
            dataview_id: self.id.clone(),
            seq: self.search_seq,
            url,
        }))
    }

    /// Apply a search response, with the same ticket rules as
    /// [`DataviewModel::finish_fetch`].
    pub fn finish_search(
        &mut self,
        seq: u64,
        response: std::result::Result<Value, TransportError>,
    ) -> bool {
        if seq != self.search_seq {
            return false;
        }
        match response {
            Ok(body) => {
                let DataviewKind::Category(category) = &mut self.kind else {
                    return false;
                };
                category.apply_search_response(&body);
                self.events.emit(DataviewEvent::SearchChanged {
                    id: self.id.clone(),
                });
            }
            Err(TransportError::Aborted) => return false,
            Err(TransportError::Failed { body, .. }) => {
                let error = serde_json::from_str(&body)
                    .unwrap_or_else(|_| json!({ "errors": ["Unknown error"] }));
                self.fail(error);
            }
        }
        true
    }

    /// Start a network fetch. Returns `None` until the dataview has a url.
    pub fn begin_fetch(&mut self, bounds: &LatLngBounds) -> Option<FetchRequest> {
        let url = self.build_url(bounds)?;
        self.fetch_seq += 1;
        self.state = DataviewState::Loading;
        self.events.emit(DataviewEvent::Loading {
            id: self.id.clone(),
        });
        Some(FetchRequest {
            dataview_id: self.id.clone(),
            seq: self.fetch_seq,
            url,
        })
    }

    /// Apply a fetch response. Responses to superseded tickets and aborts are
    /// dropped; returns whether anything was applied.
    pub fn finish_fetch(
        &mut self,
        seq: u64,
        response: std::result::Result<Value, TransportError>,
    ) -> bool {
        if seq != self.fetch_seq {
            #[cfg(feature = "debug")]
            log::debug!("dropping stale response {} for dataview {}", seq, self.id);
            return false;
        }

        match response {
            Ok(body) => match self.kind.parse(&body, self.filter.as_ref()) {
                Ok(data) => {
                    self.bound = true;
                    self.error = None;
                    self.state = DataviewState::Loaded;
                    self.set_data(data);
                    self.events.emit(DataviewEvent::Loaded {
                        id: self.id.clone(),
                    });
                }
                Err(err) => self.fail(json!({ "message": err.to_string() })),
            },
            Err(TransportError::Aborted) => {
                #[cfg(feature = "debug")]
                log::debug!("fetch for dataview {} aborted", self.id);
                self.state = if self.data.is_some() {
                    DataviewState::Loaded
                } else {
                    DataviewState::Uninitialized
                };
                return false;
            }
            Err(TransportError::Failed { body, .. }) => {
                let error = serde_json::from_str(&body)
                    .unwrap_or_else(|_| json!({ "errors": ["Unknown error"] }));
                self.fail(error);
            }
        }
        true
    }

    /// Serve the dataview from the layer's provider, without network.
    pub fn fetch_from_provider(&mut self, provider: &dyn DataProvider) -> Result<()> {
        let raw = provider.get_data_for(self)?;
        let data = self.kind.parse(&raw, self.filter.as_ref())?;
        self.bound = true;
        self.state = DataviewState::Loaded;
        self.set_data(data);
        Ok(())
    }

    fn set_data(&mut self, data: DataviewData) {
        self.data = Some(data);
        self.events.emit(DataviewEvent::DataChanged {
            id: self.id.clone(),
        });
    }

    fn fail(&mut self, error: Value) {
        #[cfg(feature = "debug")]
        log::error!("dataview {} failed: {}", self.id, error);

        self.state = DataviewState::Error;
        self.error = Some(error.clone());
        self.events.emit(DataviewEvent::Error {
            id: self.id.clone(),
            error: Some(error),
        });
    }

    // Attribute changes that need a map reload

    /// Reload needed after the filter changed, unless the layer's provider
    /// applied it in-process.
    pub fn on_filter_changed(
        &self,
        provider: Option<&dyn DataProvider>,
    ) -> Result<Option<ReloadOptions>> {
        let Some(filter) = &self.filter else {
            return Ok(None);
        };
        if let Some(provider) = provider {
            if provider.can_apply_filter_to(self) {
                provider.apply_filter(self, filter)?;
                return Ok(None);
            }
        }
        Ok(Some(ReloadOptions::scoped(self.source_id())))
    }

    /// Change the aggregated column. Always forces a fetch after the reload;
    /// results for the old column cannot be reused.
    pub fn set_column(&mut self, column: impl Into<String>) -> Option<ReloadOptions> {
        let column = column.into();
        let changed = match &mut self.kind {
            DataviewKind::Category(category) => replace_if_changed(&mut category.column, column),
            DataviewKind::Formula(formula) => replace_if_changed(&mut formula.column, column),
            DataviewKind::Histogram(histogram) => {
                let changed = replace_if_changed(&mut histogram.column, column);
                if changed {
                    histogram.aggregation = None;
                }
                changed
            }
        };
        changed.then(|| ReloadOptions::scoped(self.source_id()).force_fetch())
    }

    /// Formula operation (`count`, `sum`, `avg`, `max`, `min`).
    pub fn set_operation(&mut self, operation: &str) -> Result<Option<ReloadOptions>> {
        let type_name = self.kind.type_name();
        let DataviewKind::Formula(formula) = &mut self.kind else {
            return Err(MapError::Validation(format!(
                "{} dataviews have no operation",
                type_name
            )));
        };
        let operation = operation.parse::<FormulaOperation>()?;
        if formula.operation == operation {
            return Ok(None);
        }
        formula.operation = operation;
        Ok(Some(ReloadOptions::scoped(self.source_id()).force_fetch()))
    }

    pub fn category(&self) -> Option<&CategoryDataview> {
        match &self.kind {
            DataviewKind::Category(category) => Some(category),
            _ => None,
        }
    }

    pub(crate) fn category_mut(&mut self) -> Option<&mut CategoryDataview> {
        match &mut self.kind {
            DataviewKind::Category(category) => Some(category),
            _ => None,
        }
    }

    /// Lock the accepted categories and seed the search rows with the
    /// current data.
    pub fn setup_search(&mut self) {
        let current = self.data.as_ref().and_then(DataviewData::as_category);
        if let (DataviewKind::Category(category), Some(Filter::Category(filter))) =
            (&mut self.kind, self.filter.as_ref())
        {
            category.setup_search(filter, current);
        }
    }

    pub(crate) fn category_parts_mut(
        &mut self,
    ) -> Option<(&mut CategoryDataview, &mut CategoryFilter)> {
        match (&mut self.kind, self.filter.as_mut()) {
            (DataviewKind::Category(category), Some(Filter::Category(filter))) => {
                Some((category, filter))
            }
            _ => None,
        }
    }

    /// Detach the analysis binding. Returns the reload needed when the
    /// dataview leaves a non-empty filter behind.
    pub fn remove(&mut self) -> Option<ReloadOptions> {
        self.analysis_binding = None;
        let reload = self
            .filter
            .as_ref()
            .filter(|filter| !filter.is_empty())
            .map(|_| ReloadOptions::scoped(self.source_id()));
        self.events.emit(DataviewEvent::Destroyed {
            id: self.id.clone(),
        });
        self.events.stop_listening();
        reload
    }
}

fn replace_if_changed(slot: &mut String, value: String) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisSchema, StaticReference};
    use crate::dataviews::formula::FormulaDataview;
    use crate::dataviews::histogram::HistogramDataview;
    use crate::dataviews::DataviewData;
    use std::sync::Arc;

    fn graph() -> AnalysisGraph {
        let reference = StaticReference::new()
            .with_type("source", AnalysisSchema::new(Vec::<String>::new(), ["query"]))
            .with_type("buffer", AnalysisSchema::new(["source"], ["radius"]));
        let mut graph = AnalysisGraph::new(Arc::new(reference));
        graph
            .analyse(&json!({
                "id": "a1",
                "type": "buffer",
                "params": {
                    "radius": 300,
                    "source": { "id": "a0", "type": "source", "params": { "query": "SELECT 1" } }
                }
            }))
            .unwrap();
        graph
            .analyse(&json!({ "id": "b0", "type": "source", "params": { "query": "SELECT 2" } }))
            .unwrap();
        graph
    }

    fn formula(source: &str) -> DataviewModel {
        DataviewModel::new(
            "formula-1".to_string(),
            "layer1".to_string(),
            source.to_string(),
            DataviewKind::Formula(FormulaDataview {
                column: "population".to_string(),
                operation: FormulaOperation::Sum,
            }),
            None,
        )
    }

    fn bound(source: &str, graph: &AnalysisGraph) -> DataviewModel {
        let mut dataview = formula(source);
        dataview.bind_analysis(graph);
        let first = dataview.on_url_change("http://dv/1".to_string(), &UrlChange::default(), graph);
        assert_eq!(first, FetchDecision::Fetch);
        let request = dataview.begin_fetch(&LatLngBounds::default()).unwrap();
        assert!(dataview.finish_fetch(request.seq, Ok(json!({ "operation": "sum", "result": 3 }))));
        dataview
    }

    #[test]
    fn test_first_url_fetches_even_when_disabled() {
        let graph = graph();
        let mut dataview = formula("a1");
        dataview.set_enabled(false);
        let decision = dataview.on_url_change("http://dv/1".to_string(), &UrlChange::default(), &graph);
        assert_eq!(decision, FetchDecision::Fetch);
        assert!(!dataview.is_bound());
    }

    #[test]
    fn test_url_change_scoped_to_unrelated_source_is_skipped() {
        let graph = graph();
        let mut dataview = bound("a1", &graph);

        let change = UrlChange {
            source_id: Some("b0".to_string()),
            force_fetch: false,
        };
        assert_eq!(
            dataview.on_url_change("http://dv/2".to_string(), &change, &graph),
            FetchDecision::Skip
        );
        assert!(dataview.new_data_available());

        // An upstream node of the dataview's own source is relevant
        let change = UrlChange {
            source_id: Some("a0".to_string()),
            force_fetch: false,
        };
        assert_eq!(
            dataview.on_url_change("http://dv/3".to_string(), &change, &graph),
            FetchDecision::Fetch
        );
    }

    #[test]
    fn test_force_fetch_wins() {
        let graph = graph();
        let mut dataview = bound("a1", &graph);
        dataview.update(
            DataviewUpdate {
                sync_on_data_change: Some(false),
                ..Default::default()
            },
            &graph,
        );

        let change = UrlChange {
            source_id: Some("b0".to_string()),
            force_fetch: true,
        };
        assert_eq!(
            dataview.on_url_change("http://dv/1".to_string(), &change, &graph),
            FetchDecision::Fetch
        );
        assert!(!dataview.new_data_available());
    }

    #[test]
    fn test_disabled_dataview_fetches_once_when_enabled() {
        let graph = graph();
        let mut dataview = bound("a1", &graph);

        assert_eq!(dataview.set_enabled(false), FetchDecision::Skip);
        assert_eq!(dataview.on_bounds_change(), FetchDecision::Skip);
        assert!(dataview.new_data_available());

        assert_eq!(dataview.set_enabled(true), FetchDecision::Fetch);
        assert!(!dataview.new_data_available());

        // Nothing new since: no redundant fetch
        dataview.set_enabled(false);
        assert_eq!(dataview.set_enabled(true), FetchDecision::Skip);
    }

    #[test]
    fn test_bounds_change_respects_sync_flag() {
        let graph = graph();
        let mut dataview = bound("a1", &graph);
        assert_eq!(dataview.on_bounds_change(), FetchDecision::Fetch);

        dataview.update(
            DataviewUpdate {
                sync_on_bbox_change: Some(false),
                ..Default::default()
            },
            &graph,
        );
        assert_eq!(dataview.on_bounds_change(), FetchDecision::Skip);
        assert!(!dataview.new_data_available());
    }

    #[test]
    fn test_stale_and_aborted_responses_are_dropped() {
        let graph = graph();
        let mut dataview = bound("a1", &graph);
        dataview.events().drain();

        let bounds = LatLngBounds::default();
        let first = dataview.begin_fetch(&bounds).unwrap();
        let second = dataview.begin_fetch(&bounds).unwrap();

        assert!(!dataview.finish_fetch(first.seq, Ok(json!({ "result": 1 }))));
        assert!(!dataview.finish_fetch(second.seq, Err(TransportError::Aborted)));
        assert_eq!(dataview.state(), DataviewState::Loaded);

        let events = dataview.events().drain();
        assert!(events
            .iter()
            .all(|event| matches!(event, DataviewEvent::Loading { .. })));
        match dataview.data() {
            Some(DataviewData::Formula(result)) => assert_eq!(result.result, Some(3.0)),
            other => panic!("unexpected data {:?}", other),
        }
    }

    #[test]
    fn test_failed_fetch_parses_error_body() {
        let graph = graph();
        let mut dataview = bound("a1", &graph);
        let request = dataview.begin_fetch(&LatLngBounds::default()).unwrap();

        dataview.finish_fetch(
            request.seq,
            Err(TransportError::Failed {
                status: 500,
                body: "<html>".to_string(),
            }),
        );
        assert_eq!(dataview.state(), DataviewState::Error);
        assert_eq!(dataview.error(), Some(&json!({ "errors": ["Unknown error"] })));
    }

    #[test]
    fn test_analysis_status_forwarding() {
        let graph = graph();
        let mut dataview = formula("a1");
        dataview.bind_analysis(&graph);
        assert_eq!(dataview.analysis_binding(), Some("a1"));

        dataview.on_analysis_status("a1", AnalysisStatus::Loading, None);
        dataview.on_analysis_status("b0", AnalysisStatus::Failed, None);
        let error = json!({ "message": "boom" });
        dataview.on_analysis_status("a1", AnalysisStatus::Failed, Some(&error));

        assert_eq!(
            dataview.events().drain(),
            vec![
                DataviewEvent::Loading { id: "formula-1".to_string() },
                DataviewEvent::Error { id: "formula-1".to_string(), error: Some(error) },
            ]
        );

        // Rebinding detaches the old node
        dataview.update(
            DataviewUpdate {
                source: Some("b0".to_string()),
                ..Default::default()
            },
            &graph,
        );
        dataview.on_analysis_status("a1", AnalysisStatus::Loading, None);
        assert!(dataview.events().drain().is_empty());
    }

    #[test]
    fn test_layer_source_resolution() {
        let graph = graph();
        let mut dataview = formula("layer1");
        assert!(dataview.has_layer_as_source());
        assert_eq!(dataview.source_id(), "layer1");

        let layer = Layer::cartodb("layer1").with_source("a1");
        dataview.sync_layer(&layer, &graph);
        assert_eq!(dataview.source_id(), "a1");
        assert!(dataview.has_same_source_as_layer());
        assert_eq!(dataview.analysis_binding(), Some("a1"));
    }

    #[test]
    fn test_build_url() {
        let graph = graph();
        let mut dataview = formula("a1");
        dataview.set_credentials(Some("KEY".to_string()), Some("TOKEN".to_string()));
        assert_eq!(dataview.build_url(&LatLngBounds::default()), None);

        dataview.on_url_change("http://dv/1".to_string(), &UrlChange::default(), &graph);
        let bounds = LatLngBounds::from_view_bounds([[10.0, 20.0], [30.0, 40.0]]);
        assert_eq!(
            dataview.build_url(&bounds).as_deref(),
            Some("http://dv/1?bbox=20,10,40,30&api_key=KEY")
        );
    }

    fn category(graph: &AnalysisGraph) -> DataviewModel {
        let mut dataview = DataviewModel::new(
            "cat".to_string(),
            "layer1".to_string(),
            "a1".to_string(),
            DataviewKind::Category(CategoryDataview::new("city")),
            Some(Filter::Category(CategoryFilter::new())),
        );
        dataview.bind_analysis(graph);
        dataview.on_url_change("http://dv/cat".to_string(), &UrlChange::default(), graph);
        let request = dataview.begin_fetch(&LatLngBounds::default()).unwrap();
        let body = json!({ "categories": [{ "category": "Madrid", "value": 5 }] });
        assert!(dataview.finish_fetch(request.seq, Ok(body)));
        dataview.events().drain();
        dataview
    }

    #[test]
    fn test_applied_search_takes_over_refresh_and_bounds() {
        let graph = graph();
        let mut dataview = category(&graph);
        let bounds = LatLngBounds::from_view_bounds([[10.0, 20.0], [30.0, 40.0]]);
        assert!(dataview.begin_search(&bounds).is_err());

        dataview.category_mut().unwrap().set_search_query("Mad");
        dataview.setup_search();
        let request = dataview.begin_search(&bounds).unwrap().unwrap();
        assert_eq!(request.url, "http://dv/cat/search?q=Mad&bbox=20,10,40,30");

        let body = json!({ "categories": [{ "category": "Madrid", "value": 5 }] });
        assert!(dataview.finish_search(request.seq, Ok(body)));
        assert_eq!(
            dataview.events().drain(),
            vec![
                DataviewEvent::Loading { id: "cat".to_string() },
                DataviewEvent::SearchChanged { id: "cat".to_string() },
            ]
        );
        assert_eq!(dataview.refresh(), FetchDecision::Search);
        assert_eq!(dataview.on_bounds_change(), FetchDecision::Skip);
        assert!(!dataview.new_data_available());

        dataview.category_mut().unwrap().clean_search();
        assert_eq!(dataview.refresh(), FetchDecision::Fetch);
        assert_eq!(dataview.on_bounds_change(), FetchDecision::Fetch);
    }

    #[test]
    fn test_layer_error_fails_the_dataview() {
        let graph = graph();
        let mut dataview = bound("a1", &graph);
        dataview.events().drain();

        dataview.on_layer_error(json!({ "message": "bad style" }));
        assert_eq!(dataview.state(), DataviewState::Error);
        assert_eq!(dataview.error(), Some(&json!({ "message": "bad style" })));
        assert_eq!(dataview.events().drain().len(), 1);
    }

    #[test]
    fn test_oversized_histogram_response_is_an_error() {
        let graph = graph();
        let mut dataview = DataviewModel::new(
            "histogram-1".to_string(),
            "layer1".to_string(),
            "a1".to_string(),
            DataviewKind::Histogram(HistogramDataview::new("price")),
            None,
        );
        dataview.on_url_change("http://dv/h".to_string(), &UrlChange::default(), &graph);
        let request = dataview.begin_fetch(&LatLngBounds::default()).unwrap();

        let body = json!({ "bins_count": 4611686018427387904u64, "bins": [] });
        assert!(dataview.finish_fetch(request.seq, Ok(body)));
        assert_eq!(dataview.state(), DataviewState::Error);
        assert!(dataview.data().is_none());
    }

    #[test]
    fn test_operation_change_forces_fetch() {
        let mut dataview = formula("a1");
        assert_eq!(dataview.set_operation("sum").unwrap(), None);
        assert_eq!(
            dataview.set_operation("avg").unwrap(),
            Some(ReloadOptions::scoped("a1").force_fetch())
        );
        assert!(dataview.set_operation("median").is_err());
        assert_eq!(
            dataview.set_column("area"),
            Some(ReloadOptions::scoped("a1").force_fetch())
        );
    }
}

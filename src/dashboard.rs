//! Dashboard orchestration
//!
//! Owns every model and wires their transitions together. A reload hands
//! out new dataview urls, and those decide which dataviews fetch.

use std::sync::Arc;

use instant::Instant;
use serde_json::Value;

use crate::analysis::{AnalysisEvent, AnalysisGraph, AnalysisReference};
use crate::core::config::SyncConfig;
use crate::core::geo::{LatLng, LatLngBounds};
use crate::core::reload::ReloadOptions;
use crate::core::viewport::{BoundsDebouncer, MapViewport, Viewport};
use crate::dataviews::factory::{DataviewAttributes, DataviewsFactory};
use crate::dataviews::category::CategoryDataview;
use crate::dataviews::fetch::{fetch_all, fetch_dataview};
use crate::dataviews::model::{DataviewModel, DataviewUpdate, FetchDecision};
use crate::dataviews::DataviewsCollection;
use crate::filters::Filter;
use crate::layers::{DataProvider, Layer, LayerCollection};
use crate::windshaft::config::MapConfigGenerator;
use crate::windshaft::instance::MapInstance;
use crate::windshaft::map::WindshaftMap;
use crate::windshaft::transport::Transport;
use crate::windshaft::updater::ModelTargets;
use crate::{MapError, Result};

#[cfg(feature = "debug")]
use log;

pub struct Dashboard {
    config: SyncConfig,
    transport: Arc<dyn Transport>,
    layers: LayerCollection,
    dataviews: DataviewsCollection,
    graph: AnalysisGraph,
    map: WindshaftMap,
    viewport: Viewport,
    debouncer: BoundsDebouncer,
    factory: DataviewsFactory,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("layers", &self.layers)
            .field("dataviews", &self.dataviews)
            .field("graph", &self.graph)
            .field("map", &self.map)
            .field("viewport", &self.viewport)
            .finish()
    }
}

impl Dashboard {
    pub fn new(
        config: SyncConfig,
        reference: Arc<dyn AnalysisReference>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            map: WindshaftMap::new(&config, Arc::clone(&transport)),
            factory: DataviewsFactory::new(&config),
            debouncer: BoundsDebouncer::new(config.bbox_debounce()),
            graph: AnalysisGraph::new(reference),
            layers: LayerCollection::new(),
            dataviews: DataviewsCollection::new(),
            viewport: Viewport::default(),
            transport,
            config,
        })
    }

    pub fn with_generator(mut self, generator: MapConfigGenerator) -> Self {
        self.map = self.map.with_generator(generator);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn layers(&self) -> &LayerCollection {
        &self.layers
    }

    pub fn dataviews(&self) -> &DataviewsCollection {
        &self.dataviews
    }

    pub fn dataview(&self, id: &str) -> Option<&DataviewModel> {
        self.dataviews.get(id)
    }

    pub fn dataview_mut(&mut self, id: &str) -> Option<&mut DataviewModel> {
        self.dataviews.get_mut(id)
    }

    pub fn graph(&self) -> &AnalysisGraph {
        &self.graph
    }

    pub fn map(&self) -> &WindshaftMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut WindshaftMap {
        &mut self.map
    }

    pub fn instance(&self) -> Option<&Arc<MapInstance>> {
        self.map.instance()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    // Models

    pub fn add_layer(&mut self, layer: Layer) -> Result<()> {
        self.layers.add_layer(layer)
    }

    /// Add (or update) analysis nodes. Param changes of existing nodes are
    /// queued; [`Dashboard::apply_analysis_changes`] sends them.
    pub fn analyse(&mut self, definition: &Value) -> Result<String> {
        let id = self.graph.analyse(definition)?;
        self.rebind_dataviews();
        Ok(id)
    }

    pub async fn set_analysis_param(&mut self, id: &str, name: &str, value: Value) -> Result<()> {
        self.graph.set_param(id, name, value)?;
        self.apply_analysis_changes().await
    }

    pub async fn set_analysis_type(&mut self, id: &str, kind: &str) -> Result<()> {
        self.graph.set_kind(id, kind)?;
        self.rebind_dataviews();
        self.apply_analysis_changes().await
    }

    /// One reload per analysis node changed since the last call.
    pub async fn apply_analysis_changes(&mut self) -> Result<()> {
        for request in self.graph.drain_reload_requests() {
            #[cfg(feature = "debug")]
            log::debug!("reloading for analysis {:?}", request.source_id);
            self.reload(request).await?;
        }
        Ok(())
    }

    fn rebind_dataviews(&mut self) {
        for dataview in self.dataviews.iter_mut() {
            dataview.bind_analysis(&self.graph);
        }
    }

    /// Create a dataview bound to `layer_id`. It gets its url, and with it
    /// its first data, on the next reload.
    pub fn create_dataview(
        &mut self,
        dataview_type: &str,
        layer_id: &str,
        attrs: &DataviewAttributes,
    ) -> Result<String> {
        let layer = self
            .layers
            .get_layer(layer_id)
            .ok_or_else(|| MapError::NotFound(format!("layer '{}'", layer_id)))?;
        let dataview = self.factory.create(dataview_type, attrs, layer, &self.graph)?;
        let id = dataview.id().to_string();
        self.dataviews.add(dataview)?;
        Ok(id)
    }

    pub async fn remove_dataview(&mut self, id: &str) -> Result<()> {
        let mut dataview = self
            .dataviews
            .remove(id)
            .ok_or_else(|| MapError::NotFound(format!("dataview '{}'", id)))?;
        match dataview.remove() {
            Some(reload) => self.reload(reload).await,
            None => Ok(()),
        }
    }

    // Reload and fetch

    /// Instantiate the map and fetch whatever the new urls require.
    ///
    /// Active filters always travel with the payload.
    pub async fn reload(&mut self, options: ReloadOptions) -> Result<()> {
        let to_fetch = self.instantiate(options).await?;
        self.fetch_dataviews(&to_fetch).await;
        Ok(())
    }

    async fn instantiate(&mut self, options: ReloadOptions) -> Result<Vec<String>> {
        let options = options.with_filters();
        let result = self
            .map
            .create_instance(
                &options,
                ModelTargets {
                    layers: &mut self.layers,
                    dataviews: &mut self.dataviews,
                    graph: &mut self.graph,
                },
            )
            .await;
        // Analysis status changes happen on success and on failure alike
        self.forward_analysis_events();
        result
    }

    fn forward_analysis_events(&mut self) {
        for event in self.graph.events().drain() {
            if let AnalysisEvent::StatusChanged { id, status, error } = event {
                for dataview in self.dataviews.iter_mut() {
                    dataview.on_analysis_status(&id, status, error.as_ref());
                }
            }
        }
    }

    fn layer_provider(&self, layer_id: &str) -> Option<Arc<dyn DataProvider>> {
        self.layers
            .get_layer(layer_id)
            .and_then(|layer| layer.data_provider())
            .cloned()
    }

    /// Fetch the given dataviews: from their layer's provider when it can
    /// serve them, over the network otherwise.
    pub async fn fetch_dataviews(&mut self, ids: &[String]) {
        let bounds = self.viewport.view_bounds();
        let mut requests = Vec::new();

        for id in ids {
            let provider = match self.dataviews.get(id) {
                Some(dataview) => self
                    .layer_provider(dataview.layer_id())
                    .filter(|provider| provider.can_provide_data_for(dataview)),
                None => continue,
            };
            let Some(dataview) = self.dataviews.get_mut(id) else {
                continue;
            };

            match provider {
                Some(provider) => {
                    if let Err(_err) = dataview.fetch_from_provider(provider.as_ref()) {
                        #[cfg(feature = "debug")]
                        log::error!("provider failed for dataview {}: {}", id, _err);
                    }
                }
                None => requests.extend(dataview.begin_fetch(&bounds)),
            }
        }

        if requests.is_empty() {
            return;
        }
        for (request, result) in fetch_all(self.transport.as_ref(), requests).await {
            if let Some(dataview) = self.dataviews.get_mut(&request.dataview_id) {
                dataview.finish_fetch(request.seq, result);
            }
        }
    }

    async fn fetch_where<F>(&mut self, mut decide: F)
    where
        F: FnMut(&mut DataviewModel) -> FetchDecision,
    {
        let ids: Vec<String> = self
            .dataviews
            .iter_mut()
            .filter_map(|dataview| {
                decide(dataview)
                    .should_fetch()
                    .then(|| dataview.id().to_string())
            })
            .collect();
        self.fetch_dataviews(&ids).await;
    }

    pub async fn refresh_dataview(&mut self, id: &str) -> Result<()> {
        let decision = self.require_dataview(id)?.refresh();
        match decision {
            FetchDecision::Fetch => self.fetch_dataviews(&[id.to_string()]).await,
            FetchDecision::Search => self.apply_category_search(id).await?,
            FetchDecision::Skip => {}
        }
        Ok(())
    }

    pub async fn update_dataview(&mut self, id: &str, update: DataviewUpdate) -> Result<()> {
        let graph = &self.graph;
        let dataview = self
            .dataviews
            .get_mut(id)
            .ok_or_else(|| MapError::NotFound(format!("dataview '{}'", id)))?;
        if dataview.update(update, graph).should_fetch() {
            self.fetch_dataviews(&[id.to_string()]).await;
        }
        Ok(())
    }

    // Viewport

    /// Report the current view. Bounds-driven fetches happen once the
    /// debounce window settles, see [`Dashboard::poll`].
    pub fn notify_viewport_changed(
        &mut self,
        center: LatLng,
        zoom: f64,
        bounds: LatLngBounds,
        now: Instant,
    ) {
        if self.viewport.set_view(center, zoom, bounds) {
            self.debouncer.notify(now);
        }
    }

    /// Drive the bounds debouncer. Returns whether a settled viewport change
    /// was dispatched to the dataviews.
    pub async fn poll(&mut self, now: Instant) -> bool {
        if !self.debouncer.poll(now) {
            return false;
        }
        self.fetch_where(|dataview| dataview.on_bounds_change()).await;
        true
    }

    /// Sleep out the pending debounce window, then dispatch it.
    #[cfg(feature = "tokio-runtime")]
    pub async fn settle(&mut self) -> bool {
        if let Some(remaining) = self.debouncer.remaining(Instant::now()) {
            tokio::time::sleep(remaining).await;
        }
        self.poll(Instant::now()).await
    }

    // Layers

    /// Toggle a layer. Its dataviews follow (`enabled`) and the map is
    /// reloaded since hidden layers leave the payload.
    pub async fn set_layer_visible(&mut self, layer_id: &str, visible: bool) -> Result<()> {
        let layer = self
            .layers
            .get_layer_mut(layer_id)
            .ok_or_else(|| MapError::NotFound(format!("layer '{}'", layer_id)))?;
        if layer.visible == visible {
            return Ok(());
        }
        layer.visible = visible;

        let mut to_fetch: Vec<String> = self
            .dataviews
            .iter_mut()
            .filter(|dataview| dataview.layer_id() == layer_id)
            .filter_map(|dataview| {
                dataview
                    .set_enabled(visible)
                    .should_fetch()
                    .then(|| dataview.id().to_string())
            })
            .collect();

        // A failed reload keeps the old urls, which still serve the
        // refreshes `set_enabled` already consumed.
        let result = self.instantiate(ReloadOptions::new()).await;
        if let Ok(ids) = &result {
            for id in ids {
                if !to_fetch.contains(id) {
                    to_fetch.push(id.clone());
                }
            }
        }
        self.fetch_dataviews(&to_fetch).await;
        result.map(|_| ())
    }

    /// The layer's data provider has new data.
    pub async fn data_changed(&mut self, layer_id: &str) {
        let layer_id = layer_id.to_string();
        self.fetch_where(|dataview| {
            if dataview.layer_id() == layer_id {
                dataview.data_changed()
            } else {
                FetchDecision::Skip
            }
        })
        .await;
    }

    // Filters and dataview attributes

    fn require_dataview(&self, id: &str) -> Result<&DataviewModel> {
        self.dataviews
            .get(id)
            .ok_or_else(|| MapError::NotFound(format!("dataview '{}'", id)))
    }

    /// Mutate a dataview's filter. When it actually changed, the filter goes
    /// to the layer's provider if that one can take it, or triggers a reload
    /// scoped to the dataview's source.
    pub async fn update_filter<F>(&mut self, id: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut Filter),
    {
        let dataview = self
            .dataviews
            .get_mut(id)
            .ok_or_else(|| MapError::NotFound(format!("dataview '{}'", id)))?;
        let filter = dataview
            .filter_mut()
            .ok_or_else(|| MapError::Validation(format!("dataview '{}' has no filter", id)))?;
        let before = filter.clone();
        update(filter);
        if *filter == before {
            return Ok(());
        }
        self.filter_changed(id).await
    }

    async fn filter_changed(&mut self, id: &str) -> Result<()> {
        let dataview = self.require_dataview(id)?;
        let provider = self.layer_provider(dataview.layer_id());
        match dataview.on_filter_changed(provider.as_deref())? {
            Some(reload) => self.reload(reload).await,
            None => Ok(()),
        }
    }

    pub async fn accept_categories<I, S>(&mut self, id: &str, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_filter(id, |filter| {
            if let Some(category) = filter.as_category_mut() {
                category.accept(names);
            }
        })
        .await
    }

    pub async fn reject_categories<I, S>(&mut self, id: &str, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_filter(id, |filter| {
            if let Some(category) = filter.as_category_mut() {
                category.reject(names);
            }
        })
        .await
    }

    pub async fn accept_all_categories(&mut self, id: &str) -> Result<()> {
        self.update_filter(id, |filter| {
            if let Some(category) = filter.as_category_mut() {
                category.accept_all();
            }
        })
        .await
    }

    pub async fn set_range(&mut self, id: &str, min: f64, max: f64) -> Result<()> {
        self.update_filter(id, |filter| {
            if let Some(range) = filter.as_range_mut() {
                range.set_range(min, max);
            }
        })
        .await
    }

    pub async fn unset_range(&mut self, id: &str) -> Result<()> {
        self.update_filter(id, |filter| {
            if let Some(range) = filter.as_range_mut() {
                range.unset_range();
            }
        })
        .await
    }

    /// Lock the given categories of a category dataview: they are accepted
    /// and stay listed even when later responses drop them.
    pub async fn lock_categories<I, S>(&mut self, id: &str, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dataview = self
            .dataviews
            .get_mut(id)
            .ok_or_else(|| MapError::NotFound(format!("dataview '{}'", id)))?;
        let (category, filter) = dataview
            .category_parts_mut()
            .ok_or_else(|| MapError::Validation(format!("dataview '{}' is not a category", id)))?;
        category.lock_items(names);
        if !category.can_apply_locked(filter) {
            return Ok(());
        }
        let before = filter.clone();
        category.apply_locked(filter);
        if *filter == before {
            return Ok(());
        }
        self.filter_changed(id).await
    }

    pub async fn unlock_categories(&mut self, id: &str) -> Result<()> {
        let dataview = self
            .dataviews
            .get_mut(id)
            .ok_or_else(|| MapError::NotFound(format!("dataview '{}'", id)))?;
        let (category, filter) = dataview
            .category_parts_mut()
            .ok_or_else(|| MapError::Validation(format!("dataview '{}' is not a category", id)))?;
        category.unlock_categories(filter);
        self.filter_changed(id).await
    }

    fn category_mut(&mut self, id: &str) -> Result<&mut CategoryDataview> {
        self.dataviews
            .get_mut(id)
            .ok_or_else(|| MapError::NotFound(format!("dataview '{}'", id)))?
            .category_mut()
            .ok_or_else(|| MapError::Validation(format!("dataview '{}' is not a category", id)))
    }

    pub fn set_category_search(&mut self, id: &str, query: impl Into<String>) -> Result<()> {
        self.category_mut(id)?.set_search_query(query);
        Ok(())
    }

    /// Lock the accepted categories so a search can add to them.
    pub fn setup_category_search(&mut self, id: &str) -> Result<()> {
        self.category_mut(id)?;
        if let Some(dataview) = self.dataviews.get_mut(id) {
            dataview.setup_search();
        }
        Ok(())
    }

    /// Run the category search. While applied, viewport changes leave the
    /// dataview alone and refreshes repeat the search.
    pub async fn apply_category_search(&mut self, id: &str) -> Result<()> {
        let bounds = self.viewport.view_bounds();
        let dataview = self
            .dataviews
            .get_mut(id)
            .ok_or_else(|| MapError::NotFound(format!("dataview '{}'", id)))?;
        let Some(request) = dataview.begin_search(&bounds)? else {
            return Ok(());
        };

        let result = fetch_dataview(self.transport.as_ref(), &request).await;
        if let Some(dataview) = self.dataviews.get_mut(id) {
            dataview.finish_search(request.seq, result);
        }
        Ok(())
    }

    pub fn clean_category_search(&mut self, id: &str) -> Result<()> {
        self.category_mut(id)?.clean_search();
        Ok(())
    }

    pub async fn set_dataview_column(&mut self, id: &str, column: &str) -> Result<()> {
        let dataview = self
            .dataviews
            .get_mut(id)
            .ok_or_else(|| MapError::NotFound(format!("dataview '{}'", id)))?;
        match dataview.set_column(column) {
            Some(reload) => self.reload(reload).await,
            None => Ok(()),
        }
    }

    pub async fn set_dataview_operation(&mut self, id: &str, operation: &str) -> Result<()> {
        let dataview = self
            .dataviews
            .get_mut(id)
            .ok_or_else(|| MapError::NotFound(format!("dataview '{}'", id)))?;
        match dataview.set_operation(operation)? {
            Some(reload) => self.reload(reload).await,
            None => Ok(()),
        }
    }
}

//! Writes the outcome of an instantiation back into the models.

use serde_json::json;

use crate::analysis::{AnalysisGraph, AnalysisStatus};
use crate::core::reload::{ReloadOptions, UrlChange};
use crate::dataviews::DataviewsCollection;
use crate::layers::{LayerCollection, LayerKind};
use crate::windshaft::error::WindshaftError;
use crate::windshaft::instance::MapInstance;
use crate::Result;

#[cfg(feature = "debug")]
use log;

/// The models an instantiation touches
pub struct ModelTargets<'a> {
    pub layers: &'a mut LayerCollection,
    pub dataviews: &'a mut DataviewsCollection,
    pub graph: &'a mut AnalysisGraph,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelUpdater;

impl ModelUpdater {
    pub fn new() -> Self {
        Self
    }

    /// Apply a new instance. `sent_layers` are the ids of the layers in the
    /// payload, in payload order. Returns the ids of dataviews that must be
    /// fetched now.
    pub fn update_models(
        &self,
        instance: &MapInstance,
        sent_layers: &[String],
        options: &ReloadOptions,
        targets: ModelTargets<'_>,
    ) -> Result<Vec<String>> {
        let ModelTargets {
            layers,
            dataviews,
            graph,
        } = targets;

        for (index, layer_id) in sent_layers.iter().enumerate() {
            let Some(layer) = layers.get_layer_mut(layer_id) else {
                continue;
            };
            match layer.kind {
                LayerKind::Torque => {
                    layer.meta = instance.layer_meta(index);
                    layer.urls = Some(instance.get_tiles("torque"));
                }
                LayerKind::CartoDB => layer.meta = instance.layer_meta(index),
                LayerKind::Tiled | LayerKind::Plain => continue,
            }
            layer.error = None;

            let layer = &*layer;
            for dataview in dataviews.iter_mut().filter(|dv| dv.layer_id() == layer.id) {
                dataview.layer_meta_changed(layer);
            }
        }

        let change = UrlChange::from(options);
        let mut to_fetch = Vec::new();
        for dataview in dataviews.iter_mut() {
            let Some(url) = instance.dataview_url(dataview.id(), instance.protocol()) else {
                continue;
            };
            if dataview.on_url_change(url, &change, graph).should_fetch() {
                to_fetch.push(dataview.id().to_string());
            }
        }

        let node_ids: Vec<String> = graph.ids().map(str::to_string).collect();
        for node_id in node_ids {
            if let Some(meta) = instance.analysis_node_metadata(&node_id) {
                graph.update_from_metadata(&node_id, meta)?;
            }
        }

        #[cfg(feature = "debug")]
        log::debug!(
            "instance {} applied, {} dataview(s) to fetch",
            instance.layergroup_id(),
            to_fetch.len()
        );

        Ok(to_fetch)
    }

    /// Attach backend errors to the layers and analysis nodes they name.
    /// A layer error also fails the dataviews of that layer.
    pub fn set_errors(&self, errors: &[WindshaftError], targets: ModelTargets<'_>) -> Result<()> {
        let ModelTargets {
            layers,
            dataviews,
            graph,
        } = targets;

        for error in errors {
            #[cfg(feature = "debug")]
            log::error!("Maps API error: {:?}", error);

            if let Some(layer_id) = error.layer_id.as_deref().filter(|_| error.is_layer_error()) {
                if let Some(layer) = layers.get_layer_mut(layer_id) {
                    layer.error = Some(error.clone());
                    for dataview in dataviews.iter_mut().filter(|dv| dv.layer_id() == layer_id) {
                        dataview.on_layer_error(json!({ "message": error.message }));
                    }
                }
            }
            if let Some(node_id) = error.analysis_id.as_deref().filter(|_| error.is_analysis_error()) {
                if graph.contains(node_id) {
                    graph.set_status(
                        node_id,
                        AnalysisStatus::Failed,
                        Some(json!({ "message": error.message })),
                    )?;
                }
            }
        }
        Ok(())
    }
}

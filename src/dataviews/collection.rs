use crate::dataviews::model::DataviewModel;
use crate::filters::FiltersCollection;
use crate::layers::LayerCollection;
use crate::{MapError, Result};

/// Dataviews in creation order. Order matters for the `widgets` entries of
/// the instantiation payload.
#[derive(Debug, Default)]
pub struct DataviewsCollection {
    dataviews: Vec<DataviewModel>,
}

impl DataviewsCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dataview: DataviewModel) -> Result<()> {
        if self.get(dataview.id()).is_some() {
            return Err(MapError::Validation(format!(
                "dataview '{}' already exists",
                dataview.id()
            )));
        }
        self.dataviews.push(dataview);
        Ok(())
    }

    /// Take a dataview out of the collection. Call
    /// [`DataviewModel::remove`] on it to release its bindings.
    pub fn remove(&mut self, id: &str) -> Option<DataviewModel> {
        let index = self.dataviews.iter().position(|dv| dv.id() == id)?;
        Some(self.dataviews.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&DataviewModel> {
        self.dataviews.iter().find(|dv| dv.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DataviewModel> {
        self.dataviews.iter_mut().find(|dv| dv.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataviewModel> {
        self.dataviews.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DataviewModel> {
        self.dataviews.iter_mut()
    }

    pub fn for_layer<'a>(&'a self, layer_id: &'a str) -> impl Iterator<Item = &'a DataviewModel> {
        self.dataviews
            .iter()
            .filter(move |dv| dv.layer_id() == layer_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.dataviews.iter().map(|dv| dv.id().to_string()).collect()
    }

    /// Filters of dataviews whose layer is visible.
    pub fn filters<'a>(&'a self, layers: &LayerCollection) -> FiltersCollection<'a> {
        self.dataviews
            .iter()
            .filter(|dv| {
                layers
                    .get_layer(dv.layer_id())
                    .map(|layer| layer.is_visible())
                    .unwrap_or(false)
            })
            .filter_map(|dv| dv.filter().map(|filter| (dv.id(), filter)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.dataviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataviews.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisGraph, StaticReference};
    use crate::dataviews::factory::{DataviewAttributes, DataviewsFactory};
    use crate::layers::Layer;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_filters_of_visible_layers_only() {
        let graph = AnalysisGraph::new(Arc::new(StaticReference::new()));
        let mut layers = LayerCollection::new();
        layers.add_layer(Layer::cartodb("visible")).unwrap();
        layers.add_layer(Layer::cartodb("hidden").hidden()).unwrap();

        let mut factory = DataviewsFactory::default();
        let mut collection = DataviewsCollection::new();
        for layer_id in ["visible", "hidden"] {
            let attrs = DataviewAttributes::new()
                .id(format!("{}-cat", layer_id))
                .source(layer_id)
                .column("city");
            let layer = layers.get_layer(layer_id).unwrap();
            let mut dataview = factory.create_category_model(&attrs, layer, &graph).unwrap();
            dataview
                .category_parts_mut()
                .unwrap()
                .1
                .reject(["Madrid"]);
            collection.add(dataview).unwrap();
        }

        assert_eq!(
            collection.filters(&layers).to_json(),
            Some(json!({ "dataviews": { "visible-cat": { "reject": ["Madrid"] } } }))
        );
    }

    #[test]
    fn test_add_get_remove() {
        let graph = AnalysisGraph::new(Arc::new(StaticReference::new()));
        let layer = Layer::cartodb("l1");
        let mut factory = DataviewsFactory::default();
        let mut collection = DataviewsCollection::new();

        let attrs = DataviewAttributes::new().id("dv").source("a0").column("c");
        collection
            .add(factory.create_histogram_model(&attrs, &layer, &graph).unwrap())
            .unwrap();
        assert!(collection
            .add(factory.create_histogram_model(&attrs, &layer, &graph).unwrap())
            .is_err());

        assert_eq!(collection.for_layer("l1").count(), 1);
        assert!(collection.remove("dv").is_some());
        assert!(collection.is_empty());
    }
}

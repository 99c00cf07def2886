use crate::layers::layer::Layer;
use crate::prelude::HashMap;
use crate::{MapError, Result};

/// Ordered collection of layers. Order is the payload order sent to the
/// backend, so it only changes through `add_layer`/`move_layer`.
#[derive(Debug, Default, Clone)]
pub struct LayerCollection {
    /// All layers indexed by ID
    layers: HashMap<String, Layer>,
    /// Layer IDs in collection order
    order: Vec<String>,
}

impl LayerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer. Ids must be unique.
    pub fn add_layer(&mut self, layer: Layer) -> Result<()> {
        if self.layers.contains_key(&layer.id) {
            return Err(MapError::Validation(format!(
                "layer '{}' already exists",
                layer.id
            )));
        }
        self.order.push(layer.id.clone());
        self.layers.insert(layer.id.clone(), layer);
        Ok(())
    }

    pub fn remove_layer(&mut self, layer_id: &str) -> Option<Layer> {
        self.order.retain(|id| id != layer_id);
        self.layers.remove(layer_id)
    }

    /// Moves a layer to `index`, clamped to the collection size.
    pub fn move_layer(&mut self, layer_id: &str, index: usize) -> Result<()> {
        let position = self
            .position(layer_id)
            .ok_or_else(|| MapError::NotFound(format!("layer '{}'", layer_id)))?;
        let id = self.order.remove(position);
        let index = index.min(self.order.len());
        self.order.insert(index, id);
        Ok(())
    }

    pub fn get_layer(&self, layer_id: &str) -> Option<&Layer> {
        self.layers.get(layer_id)
    }

    pub fn get_layer_mut(&mut self, layer_id: &str) -> Option<&mut Layer> {
        self.layers.get_mut(layer_id)
    }

    /// Applies a function to a specific layer mutably
    pub fn with_layer_mut<F, R>(&mut self, layer_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut Layer) -> R,
    {
        self.layers.get_mut(layer_id).map(f)
    }

    pub fn position(&self, layer_id: &str) -> Option<usize> {
        self.order.iter().position(|id| id == layer_id)
    }

    /// Gets all layers in collection order
    pub fn layers(&self) -> Vec<&Layer> {
        self.order
            .iter()
            .filter_map(|id| self.layers.get(id))
            .collect()
    }

    /// Layers that take part in the instantiation payload, in order.
    pub fn windshaft_layers(&self) -> Vec<&Layer> {
        self.layers()
            .into_iter()
            .filter(|layer| layer.kind.is_windshaft())
            .collect()
    }

    /// Applies a function to each layer mutably in collection order
    pub fn for_each_layer_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Layer),
    {
        for id in &self.order {
            if let Some(layer) = self.layers.get_mut(id) {
                f(layer);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

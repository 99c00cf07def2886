//! Map configuration generators
//!
//! Generation is a pure function of the layers, dataviews and analysis
//! graph: the same state always yields the same payload, which is what lets
//! the request tracker recognise repeated instantiations.

use serde_json::{json, Map, Value};

use crate::analysis::AnalysisGraph;
use crate::core::constants::ATTRIBUTES_ID_COLUMN;
use crate::dataviews::DataviewsCollection;
use crate::layers::Layer;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MapConfigGenerator {
    /// Full layergroup definition sent inline
    #[default]
    Anonymous,
    /// Visibility switches for a template stored on the backend
    Named { template_id: String },
}

impl MapConfigGenerator {
    pub fn named(template_id: impl Into<String>) -> Self {
        MapConfigGenerator::Named {
            template_id: template_id.into(),
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, MapConfigGenerator::Named { .. })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, MapConfigGenerator::Anonymous)
    }

    /// Instantiation endpoint relative to the user host.
    pub fn endpoint(&self, base: &str) -> String {
        match self {
            MapConfigGenerator::Anonymous => base.to_string(),
            MapConfigGenerator::Named { template_id } => format!("{}/named/{}", base, template_id),
        }
    }

    /// `layers` are the layers sent to the backend, in order.
    pub fn generate(
        &self,
        layers: &[&Layer],
        dataviews: &DataviewsCollection,
        graph: &AnalysisGraph,
    ) -> Value {
        match self {
            MapConfigGenerator::Anonymous => anonymous_config(layers, dataviews, graph),
            MapConfigGenerator::Named { .. } => named_config(layers),
        }
    }
}

fn anonymous_config(layers: &[&Layer], dataviews: &DataviewsCollection, graph: &AnalysisGraph) -> Value {
    let mut layer_configs = Vec::new();
    let mut analysis_roots: Vec<&str> = Vec::new();

    for layer in layers.iter().filter(|layer| layer.is_visible()) {
        let widgets: Map<String, Value> = dataviews
            .for_layer(&layer.id)
            .map(|dataview| (dataview.id().to_string(), dataview.to_json()))
            .collect();

        let mut options = json!({
            "sql": layer.sql,
            "cartocss": layer.cartocss,
            "cartocss_version": layer.cartocss_version,
            "interactivity": layer.interactive_column_names(),
            "widgets": widgets,
        });
        if !layer.infowindow_fields.is_empty() {
            options["attributes"] = json!({
                "id": ATTRIBUTES_ID_COLUMN,
                "columns": layer.infowindow_fields,
            });
        }
        if let Some(source) = &layer.source {
            options["source"] = json!({ "id": source });
            if graph.contains(source) && !analysis_roots.contains(&source.as_str()) {
                analysis_roots.push(source.as_str());
            }
        }

        layer_configs.push(json!({
            "type": layer.kind.as_str().to_lowercase(),
            "options": options,
        }));
    }

    let mut config = json!({ "layers": layer_configs });
    let analyses: Vec<Value> = analysis_roots
        .iter()
        .filter_map(|root| graph.to_json(root))
        .collect();
    if !analyses.is_empty() {
        config["analyses"] = Value::Array(analyses);
    }
    config
}

fn named_config(layers: &[&Layer]) -> Value {
    let switches: Map<String, Value> = layers
        .iter()
        .enumerate()
        .map(|(index, layer)| (format!("layer{}", index), json!(u8::from(layer.is_visible()))))
        .collect();
    Value::Object(switches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisSchema, StaticReference};
    use crate::dataviews::factory::{DataviewAttributes, DataviewsFactory};
    use crate::layers::LayerCollection;
    use std::sync::Arc;

    fn setup() -> (LayerCollection, DataviewsCollection, AnalysisGraph) {
        let reference = StaticReference::new()
            .with_type("source", AnalysisSchema::new(Vec::<String>::new(), ["query"]));
        let mut graph = AnalysisGraph::new(Arc::new(reference));
        graph
            .analyse(&json!({ "id": "a0", "type": "source", "params": { "query": "SELECT * FROM t" } }))
            .unwrap();

        let mut layers = LayerCollection::new();
        layers
            .add_layer(
                Layer::cartodb("l1")
                    .with_sql("SELECT * FROM t")
                    .with_cartocss("#t {}", "2.1.0")
                    .with_infowindow_fields(["name"])
                    .with_source("a0"),
            )
            .unwrap();
        layers.add_layer(Layer::torque("l2").hidden()).unwrap();

        let mut factory = DataviewsFactory::default();
        let mut dataviews = DataviewsCollection::new();
        let attrs = DataviewAttributes::new().id("dv1").source("l1").column("price").bins(10);
        let layer = layers.get_layer("l1").unwrap();
        dataviews
            .add(factory.create_histogram_model(&attrs, layer, &graph).unwrap())
            .unwrap();

        (layers, dataviews, graph)
    }

    #[test]
    fn test_anonymous_config() {
        let (layers, dataviews, graph) = setup();
        let config = MapConfigGenerator::Anonymous.generate(&layers.layers(), &dataviews, &graph);

        assert_eq!(
            config,
            json!({
                "layers": [{
                    "type": "cartodb",
                    "options": {
                        "sql": "SELECT * FROM t",
                        "cartocss": "#t {}",
                        "cartocss_version": "2.1.0",
                        "interactivity": ["cartodb_id", "name"],
                        "widgets": {
                            "dv1": { "type": "histogram", "options": { "column": "price", "bins": 10 } }
                        },
                        "attributes": { "id": "cartodb_id", "columns": ["name"] },
                        "source": { "id": "a0" }
                    }
                }],
                "analyses": [
                    { "id": "a0", "type": "source", "params": { "query": "SELECT * FROM t" } }
                ]
            })
        );
    }

    #[test]
    fn test_generation_is_deterministic() {
        let (layers, dataviews, graph) = setup();
        let generator = MapConfigGenerator::Anonymous;
        let first = generator.generate(&layers.layers(), &dataviews, &graph).to_string();
        let second = generator.generate(&layers.layers(), &dataviews, &graph).to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_named_config() {
        let (layers, dataviews, graph) = setup();
        let generator = MapConfigGenerator::named("tpl_123");
        assert_eq!(
            generator.generate(&layers.layers(), &dataviews, &graph),
            json!({ "layer0": 1, "layer1": 0 })
        );
        assert_eq!(generator.endpoint("api/v1/map"), "api/v1/map/named/tpl_123");
        assert_eq!(MapConfigGenerator::Anonymous.endpoint("api/v1/map"), "api/v1/map");
    }
}

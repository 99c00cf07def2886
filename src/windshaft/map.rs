//! The backend map: generates the payload, guards against repeated
//! instantiations and owns the current instance snapshot.

use std::sync::Arc;

use instant::Instant;

use crate::core::config::SyncConfig;
use crate::core::reload::ReloadOptions;
use crate::events::EventManager;
use crate::layers::Layer;
use crate::windshaft::client::WindshaftClient;
use crate::windshaft::config::MapConfigGenerator;
use crate::windshaft::instance::MapInstance;
use crate::windshaft::request::{Request, RequestParams};
use crate::windshaft::tracker::RequestTracker;
use crate::windshaft::transport::Transport;
use crate::windshaft::updater::{ModelTargets, ModelUpdater};
use crate::{MapError, Result};

#[cfg(feature = "debug")]
use log;

#[derive(Debug, Clone, PartialEq)]
pub enum WindshaftEvent {
    /// Models were updated from the new instance
    InstanceCreated { layergroup_id: String },
    InstanceFailed { message: String },
}

#[derive(Debug)]
pub struct WindshaftMap {
    config: SyncConfig,
    client: WindshaftClient,
    generator: MapConfigGenerator,
    tracker: RequestTracker,
    updater: ModelUpdater,
    instance: Option<Arc<MapInstance>>,
    events: EventManager<WindshaftEvent>,
}

impl WindshaftMap {
    pub fn new(config: &SyncConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: config.clone(),
            client: WindshaftClient::new(config, transport),
            generator: MapConfigGenerator::Anonymous,
            tracker: RequestTracker::new(config.instantiation_limit)
                .with_window(config.request_window()),
            updater: ModelUpdater::new(),
            instance: None,
            events: EventManager::new(),
        }
    }

    /// Switch generator; the client endpoint follows it.
    pub fn with_generator(mut self, generator: MapConfigGenerator) -> Self {
        self.client = self
            .client
            .with_endpoint(generator.endpoint(&self.config.endpoint));
        self.generator = generator;
        self
    }

    pub fn with_client(mut self, client: WindshaftClient) -> Self {
        self.client = client;
        self
    }

    pub fn generator(&self) -> &MapConfigGenerator {
        &self.generator
    }

    pub fn client(&self) -> &WindshaftClient {
        &self.client
    }

    /// Snapshot of the last successful instantiation
    pub fn instance(&self) -> Option<&Arc<MapInstance>> {
        self.instance.as_ref()
    }

    pub fn events(&mut self) -> &mut EventManager<WindshaftEvent> {
        &mut self.events
    }

    pub fn is_named_map(&self) -> bool {
        self.generator.is_named()
    }

    /// Layers that end up in the payload, in payload order. Named templates
    /// address every layer, anonymous configs only the visible ones.
    fn sent_layers<'a>(&self, layers: &[&'a Layer]) -> Vec<&'a Layer> {
        layers
            .iter()
            .copied()
            .filter(|layer| self.generator.is_named() || layer.is_visible())
            .collect()
    }

    /// `{stat_tag, api_key|auth_token, filters?}`
    pub fn params(&self, filters: Option<serde_json::Value>) -> RequestParams {
        RequestParams {
            filters,
            ..RequestParams::from_config(&self.config)
        }
    }

    /// Build the request for the current model state.
    pub fn build_request(&self, options: &ReloadOptions, targets: &ModelTargets<'_>) -> Result<Request> {
        let windshaft_layers = targets.layers.windshaft_layers();
        let config = self
            .generator
            .generate(&windshaft_layers, &*targets.dataviews, &*targets.graph);
        let payload = serde_json::to_string(&config)?;

        let filters = if options.include_filters {
            targets.dataviews.filters(&*targets.layers).to_json()
        } else {
            None
        };

        Ok(Request::new(payload, self.params(filters), options.clone()))
    }

    /// Instantiate the map and update the models from the answer.
    ///
    /// Returns the ids of the dataviews that have to be fetched. Backend
    /// errors are set on the layers and analysis nodes they reference before
    /// being returned.
    pub async fn create_instance(
        &mut self,
        options: &ReloadOptions,
        targets: ModelTargets<'_>,
    ) -> Result<Vec<String>> {
        let request = self.build_request(options, &targets)?;
        let sent_layers: Vec<String> = self
            .sent_layers(&targets.layers.windshaft_layers())
            .into_iter()
            .map(|layer| layer.id.clone())
            .collect();

        if !self.tracker.can_request_be_performed(&request, Instant::now()) {
            let error = MapError::MaxInstantiationRetries {
                limit: self.tracker.limit(),
            };
            #[cfg(feature = "debug")]
            log::error!("{} {} {:?}", error, request.payload, request.params);
            return Err(error);
        }

        let result = self
            .client
            .instantiate_map(&request.payload, &request.params)
            .await;
        self.tracker.track(request, Instant::now());

        let result = result.and_then(|body| MapInstance::new(body, &self.config));
        match result {
            Ok(instance) => {
                let instance = Arc::new(instance);
                self.instance = Some(Arc::clone(&instance));
                let to_fetch =
                    self.updater
                        .update_models(&instance, &sent_layers, options, targets)?;
                self.events.emit(WindshaftEvent::InstanceCreated {
                    layergroup_id: instance.layergroup_id().to_string(),
                });
                Ok(to_fetch)
            }
            Err(MapError::Windshaft(errors)) => {
                self.updater.set_errors(&errors, targets)?;
                let error = MapError::Windshaft(errors);
                self.events.emit(WindshaftEvent::InstanceFailed {
                    message: error.to_string(),
                });
                Err(error)
            }
            Err(error) => {
                self.events.emit(WindshaftEvent::InstanceFailed {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisGraph, StaticReference};
    use crate::dataviews::DataviewsCollection;
    use crate::layers::LayerCollection;
    use crate::windshaft::transport::{HttpRequest, HttpResponse, TransportError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        body: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(&self, _request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse::ok(self.body.clone()))
        }
    }

    fn models() -> (LayerCollection, DataviewsCollection, AnalysisGraph) {
        let mut layers = LayerCollection::new();
        layers.add_layer(Layer::cartodb("l1").with_sql("SELECT 1")).unwrap();
        layers.add_layer(Layer::cartodb("l2").hidden()).unwrap();
        (
            layers,
            DataviewsCollection::new(),
            AnalysisGraph::new(Arc::new(StaticReference::new())),
        )
    }

    #[tokio::test]
    async fn test_create_instance_and_dedup() {
        let transport = Arc::new(CountingTransport {
            body: json!({ "layergroupid": "LG", "metadata": { "layers": [{ "type": "mapnik", "meta": { "a": 1 } }] } })
                .to_string(),
            calls: AtomicUsize::new(0),
        });
        let mut map = WindshaftMap::new(&SyncConfig::for_testing(), transport.clone());
        let (mut layers, mut dataviews, mut graph) = models();

        for _ in 0..3 {
            map.create_instance(
                &ReloadOptions::new(),
                ModelTargets {
                    layers: &mut layers,
                    dataviews: &mut dataviews,
                    graph: &mut graph,
                },
            )
            .await
            .unwrap();
        }
        assert_eq!(map.instance().unwrap().layergroup_id(), "LG");
        assert_eq!(layers.get_layer("l1").unwrap().meta, json!({ "a": 1 }));

        let err = map
            .create_instance(
                &ReloadOptions::new(),
                ModelTargets {
                    layers: &mut layers,
                    dataviews: &mut dataviews,
                    graph: &mut graph,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MapError::MaxInstantiationRetries { limit: 3 }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(map.events().drain().len(), 3);
    }

    #[tokio::test]
    async fn test_response_without_layergroup_fails_the_instance() {
        let transport = Arc::new(CountingTransport {
            body: json!({ "metadata": { "layers": [] } }).to_string(),
            calls: AtomicUsize::new(0),
        });
        let mut map = WindshaftMap::new(&SyncConfig::for_testing(), transport);
        let (mut layers, mut dataviews, mut graph) = models();

        let err = map
            .create_instance(
                &ReloadOptions::new(),
                ModelTargets {
                    layers: &mut layers,
                    dataviews: &mut dataviews,
                    graph: &mut graph,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MapError::MissingAttribute("layergroupid")));
        assert!(map.instance().is_none());
        assert_eq!(
            map.events().drain(),
            vec![WindshaftEvent::InstanceFailed {
                message: err.to_string()
            }]
        );
    }

    #[test]
    fn test_named_map_sends_every_layer() {
        let transport = Arc::new(CountingTransport {
            body: String::new(),
            calls: AtomicUsize::new(0),
        });
        let map = WindshaftMap::new(&SyncConfig::for_testing(), transport)
            .with_generator(MapConfigGenerator::named("tpl"));
        let (mut layers, mut dataviews, mut graph) = models();
        let targets = ModelTargets {
            layers: &mut layers,
            dataviews: &mut dataviews,
            graph: &mut graph,
        };

        let request = map.build_request(&ReloadOptions::new(), &targets).unwrap();
        assert_eq!(request.payload, r#"{"layer0":1,"layer1":0}"#);
        assert_eq!(map.client().endpoint(), "api/v1/map/named/tpl");
        assert_eq!(map.sent_layers(&targets.layers.windshaft_layers()).len(), 2);
    }
}

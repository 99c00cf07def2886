//! Snapshot of a backend map instance (layergroup)
//!
//! Built from a successful instantiation response and never mutated: a new
//! instantiation replaces the whole snapshot. Everything the models need
//! afterwards (tile/grid templates, layer meta, dataview urls, analysis node
//! metadata) is derived from it here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::config::SyncConfig;
use crate::core::constants::{EMPTY_GIF, HTTP_SUBDOMAINS, MAPS_API_BASE_URL};
use crate::{MapError, Result};

/// Tile and UTFGrid url templates (`{z}/{x}/{y}` placeholders), one per
/// subdomain. `grids` holds one list per mapnik layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileUrls {
    pub tiles: Vec<String>,
    pub grids: Vec<Vec<String>>,
}

impl TileUrls {
    /// Whether these urls are the transparent placeholder for "no layers".
    pub fn is_empty_placeholder(&self) -> bool {
        self.tiles.len() == 1 && self.tiles[0] == EMPTY_GIF
    }
}

fn tile_extension(layer_type: &str) -> &'static str {
    match layer_type {
        "torque" => ".json.torque",
        _ => ".png",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapInstance {
    layergroup_id: String,
    url_template: String,
    user_name: String,
    api_key: Option<String>,
    response: Value,
}

impl MapInstance {
    pub fn new(response: Value, config: &SyncConfig) -> Result<Self> {
        let layergroup_id = response
            .get("layergroupid")
            .and_then(Value::as_str)
            .ok_or(MapError::MissingAttribute("layergroupid"))?
            .to_string();

        Ok(Self {
            layergroup_id,
            url_template: config.url_template.clone(),
            user_name: config.user_name.clone(),
            api_key: config.api_key.clone(),
            response,
        })
    }

    pub fn layergroup_id(&self) -> &str {
        &self.layergroup_id
    }

    /// The raw instantiation response
    pub fn response(&self) -> &Value {
        &self.response
    }

    pub fn use_https(&self) -> bool {
        self.url_template.starts_with("https")
    }

    pub fn protocol(&self) -> &'static str {
        if self.use_https() {
            "https"
        } else {
            "http"
        }
    }

    /// CDN host for the current protocol, when the backend sent one.
    pub fn cdn_host(&self) -> Option<&str> {
        self.response
            .get("cdn_url")
            .and_then(|cdn| cdn.get(self.protocol()))
            .and_then(Value::as_str)
            .filter(|host| !host.is_empty())
    }

    pub fn host(&self, subhost: Option<&str>) -> String {
        match self.cdn_host() {
            Some(cdn) => {
                let subhost = subhost
                    .filter(|subhost| !subhost.is_empty())
                    .map(|subhost| format!("{}.", subhost))
                    .unwrap_or_default();
                format!("{}://{}{}/{}", self.protocol(), subhost, cdn, self.user_name)
            }
            None => self.url_template.replace("{user}", &self.user_name),
        }
    }

    /// `{host}/api/v1/map/{layergroupid}`
    pub fn base_url(&self, subhost: Option<&str>) -> String {
        format!(
            "{}/{}/{}",
            self.host(subhost),
            MAPS_API_BASE_URL,
            self.layergroup_id
        )
    }

    /// Browsers multiplex HTTP/2 connections, so sharding only pays off over
    /// plain HTTP.
    pub fn supported_subdomains(&self) -> Vec<&'static str> {
        if self.use_https() {
            vec![""]
        } else {
            HTTP_SUBDOMAINS.to_vec()
        }
    }

    fn metadata_list(&self, name: &str) -> &[Value] {
        self.response
            .get("metadata")
            .and_then(|metadata| metadata.get(name))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `metadata.layers`, in the backend's ordering
    pub fn layers(&self) -> &[Value] {
        self.metadata_list("layers")
    }

    pub fn layer_indexes_by_type(&self, layer_type: &str) -> Vec<usize> {
        self.layers()
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.get("type").and_then(Value::as_str) == Some(layer_type))
            .map(|(index, _)| index)
            .collect()
    }

    /// Tile templates for every layer of `layer_type` (`mapnik` or
    /// `torque`), plus per-layer grid templates for mapnik. Without layers
    /// of that type the tiles are the [`EMPTY_GIF`] placeholder.
    pub fn get_tiles(&self, layer_type: &str) -> TileUrls {
        let indexes = self.layer_indexes_by_type(layer_type);
        if indexes.is_empty() {
            return TileUrls {
                tiles: vec![EMPTY_GIF.to_string()],
                grids: Vec::new(),
            };
        }

        let joined = indexes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let query = self
            .api_key
            .as_ref()
            .map(|api_key| format!("?api_key={}", api_key))
            .unwrap_or_default();
        let with_grids = layer_type == "mapnik";

        let mut tiles = Vec::new();
        let mut grids: Vec<Vec<String>> = vec![Vec::new(); if with_grids { indexes.len() } else { 0 }];
        for subdomain in self.supported_subdomains() {
            let base = self.base_url(Some(subdomain));
            tiles.push(format!(
                "{}/{}/{{z}}/{{x}}/{{y}}{}{}",
                base,
                joined,
                tile_extension(layer_type),
                query
            ));
            if with_grids {
                for (grid, index) in grids.iter_mut().zip(&indexes) {
                    grid.push(format!("{}/{}/{{z}}/{{x}}/{{y}}.grid.json{}", base, index, query));
                }
            }
        }

        TileUrls { tiles, grids }
    }

    /// `meta` of the backend layer at `index`, `{}` when absent.
    pub fn layer_metadata(&self, index: usize) -> Value {
        self.layers()
            .get(index)
            .and_then(|layer| layer.get("meta"))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Backend index of the `local_index`-th layer we sent. The backend
    /// prepends an `http` layer for basemaps, which shifts every index by
    /// one.
    pub fn windshaft_layer_index(&self, local_index: usize) -> usize {
        let has_tiled_layer = self
            .layers()
            .first()
            .and_then(|layer| layer.get("type"))
            .and_then(Value::as_str)
            == Some("http");
        if has_tiled_layer {
            local_index + 1
        } else {
            local_index
        }
    }

    pub fn layer_meta(&self, local_index: usize) -> Value {
        self.layer_metadata(self.windshaft_layer_index(local_index))
    }

    /// From `metadata.dataviews`, falling back to the `widgets` of each layer.
    pub fn dataview_metadata(&self, dataview_id: &str) -> Option<&Value> {
        let top_level = self
            .response
            .get("metadata")
            .and_then(|metadata| metadata.get("dataviews"))
            .and_then(|dataviews| dataviews.get(dataview_id));
        if top_level.is_some() {
            return top_level;
        }

        // Later layers win, as when the widget maps are merged
        self.layers()
            .iter()
            .rev()
            .filter_map(|layer| layer.get("widgets"))
            .find_map(|widgets| widgets.get(dataview_id))
    }

    pub fn dataview_url(&self, dataview_id: &str, protocol: &str) -> Option<String> {
        self.dataview_metadata(dataview_id)?
            .get("url")?
            .get(protocol)?
            .as_str()
            .map(str::to_string)
    }

    /// Merged `metadata.analyses[].nodes` entry for `node_id`.
    pub fn analysis_node_metadata(&self, node_id: &str) -> Option<&Value> {
        self.metadata_list("analyses")
            .iter()
            .rev()
            .filter_map(|analysis| analysis.get("nodes"))
            .find_map(|nodes| nodes.get(node_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance(response: Value, config: &SyncConfig) -> MapInstance {
        MapInstance::new(response, config).unwrap()
    }

    fn layers(types: &[&str]) -> Value {
        json!({
            "layergroupid": "LG",
            "metadata": {
                "layers": types.iter().map(|t| json!({ "type": t, "meta": {} })).collect::<Vec<_>>()
            }
        })
    }

    #[test]
    fn test_tiles_by_layer_type() {
        let config = SyncConfig::new("http://{user}.example.com", "rambo");
        let instance = instance(layers(&["mapnik", "torque", "mapnik", "torque"]), &config);

        let mapnik = instance.get_tiles("mapnik");
        assert_eq!(mapnik.tiles.len(), 4);
        assert_eq!(
            mapnik.tiles[0],
            "http://rambo.example.com/api/v1/map/LG/0,2/{z}/{x}/{y}.png"
        );
        assert_eq!(mapnik.grids.len(), 2);
        assert_eq!(
            mapnik.grids[1][3],
            "http://rambo.example.com/api/v1/map/LG/2/{z}/{x}/{y}.grid.json"
        );

        let torque = instance.get_tiles("torque");
        assert_eq!(
            torque.tiles[0],
            "http://rambo.example.com/api/v1/map/LG/1,3/{z}/{x}/{y}.json.torque"
        );
        assert!(torque.grids.is_empty());
    }

    #[test]
    fn test_no_layers_yields_placeholder() {
        let config = SyncConfig::new("http://{user}.example.com", "rambo");
        let urls = instance(layers(&[]), &config).get_tiles("mapnik");
        assert_eq!(urls.tiles, vec![EMPTY_GIF.to_string()]);
        assert!(urls.grids.is_empty());
        assert!(urls.is_empty_placeholder());
    }

    #[test]
    fn test_cdn_host_and_https_subdomains() {
        let config = SyncConfig::new("https://{user}.example.com", "rambo").with_api_key("KEY");
        let mut response = layers(&["mapnik"]);
        response["cdn_url"] = json!({ "http": "cdn.http.net", "https": "cdn.https.net" });
        let instance = instance(response, &config);

        assert_eq!(instance.supported_subdomains(), vec![""]);
        assert_eq!(instance.host(Some("0")), "https://0.cdn.https.net/rambo");
        assert_eq!(
            instance.get_tiles("mapnik").tiles,
            vec!["https://cdn.https.net/rambo/api/v1/map/LG/0/{z}/{x}/{y}.png?api_key=KEY"]
        );
    }

    #[test]
    fn test_layer_meta_skips_http_layer() {
        let config = SyncConfig::for_testing();
        let instance = instance(
            json!({
                "layergroupid": "LG",
                "metadata": {
                    "layers": [
                        { "type": "http", "meta": { "basemap": true } },
                        { "type": "mapnik", "meta": { "column_type": "number" } }
                    ]
                }
            }),
            &config,
        );
        assert_eq!(instance.layer_meta(0), json!({ "column_type": "number" }));
        assert_eq!(instance.layer_metadata(5), json!({}));
    }

    #[test]
    fn test_dataview_and_analysis_metadata() {
        let config = SyncConfig::for_testing();
        let instance = instance(
            json!({
                "layergroupid": "LG",
                "metadata": {
                    "layers": [
                        { "type": "mapnik", "widgets": { "dv1": { "url": { "http": "http://dv1", "https": "https://dv1" } } } }
                    ],
                    "dataviews": { "dv2": { "url": { "http": "http://dv2" } } },
                    "analyses": [
                        { "nodes": { "a0": { "status": "ready" } } },
                        { "nodes": { "a1": { "status": "running" } } }
                    ]
                }
            }),
            &config,
        );

        assert_eq!(instance.dataview_url("dv1", "https").as_deref(), Some("https://dv1"));
        assert_eq!(instance.dataview_url("dv2", "http").as_deref(), Some("http://dv2"));
        assert_eq!(instance.dataview_url("dv3", "http"), None);
        assert_eq!(
            instance.analysis_node_metadata("a1"),
            Some(&json!({ "status": "running" }))
        );
        assert_eq!(instance.analysis_node_metadata("a9"), None);
    }

    #[test]
    fn test_requires_layergroup_id() {
        let err = MapInstance::new(json!({}), &SyncConfig::for_testing()).unwrap_err();
        assert!(matches!(err, MapError::MissingAttribute("layergroupid")));
    }
}

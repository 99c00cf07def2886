use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::constants::ATTRIBUTES_ID_COLUMN;
use crate::layers::provider::DataProvider;
use crate::windshaft::error::WindshaftError;
use crate::windshaft::instance::TileUrls;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    /// Mapnik-rendered layer backed by SQL or an analysis node
    #[serde(rename = "CartoDB")]
    CartoDB,
    #[serde(rename = "torque")]
    Torque,
    /// Plain XYZ tile layer, never sent to the backend
    #[serde(rename = "Tiled")]
    Tiled,
    #[serde(rename = "Plain")]
    Plain,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::CartoDB => "CartoDB",
            LayerKind::Torque => "torque",
            LayerKind::Tiled => "Tiled",
            LayerKind::Plain => "Plain",
        }
    }

    /// Whether layers of this kind are part of the instantiation payload.
    pub fn is_windshaft(&self) -> bool {
        matches!(self, LayerKind::CartoDB | LayerKind::Torque)
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A map layer as seen by the synchronization engine.
///
/// `meta`, `urls` and `error` are written back after each instantiation;
/// everything else is owned by the application.
#[derive(Clone)]
pub struct Layer {
    pub id: String,
    pub kind: LayerKind,
    pub visible: bool,
    /// Analysis node feeding this layer
    pub source: Option<String>,
    pub sql: Option<String>,
    pub cartocss: Option<String>,
    pub cartocss_version: Option<String>,
    pub infowindow_fields: Vec<String>,
    pub tooltip_fields: Vec<String>,
    pub meta: Value,
    pub urls: Option<TileUrls>,
    pub error: Option<WindshaftError>,
    data_provider: Option<Arc<dyn DataProvider>>,
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("visible", &self.visible)
            .field("source", &self.source)
            .field("meta", &self.meta)
            .field("error", &self.error)
            .field("data_provider", &self.data_provider.is_some())
            .finish()
    }
}

impl Layer {
    pub fn new(id: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            kind,
            visible: true,
            source: None,
            sql: None,
            cartocss: None,
            cartocss_version: None,
            infowindow_fields: Vec::new(),
            tooltip_fields: Vec::new(),
            meta: Value::Object(Default::default()),
            urls: None,
            error: None,
            data_provider: None,
        }
    }

    pub fn cartodb(id: impl Into<String>) -> Self {
        Self::new(id, LayerKind::CartoDB)
    }

    pub fn torque(id: impl Into<String>) -> Self {
        Self::new(id, LayerKind::Torque)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_cartocss(mut self, cartocss: impl Into<String>, version: impl Into<String>) -> Self {
        self.cartocss = Some(cartocss.into());
        self.cartocss_version = Some(version.into());
        self
    }

    pub fn with_infowindow_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.infowindow_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tooltip_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tooltip_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_data_provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.data_provider = Some(provider);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn data_provider(&self) -> Option<&Arc<dyn DataProvider>> {
        self.data_provider.as_ref()
    }

    /// Columns the backend must expose for interactivity: the id column plus
    /// every infowindow and tooltip field, without duplicates.
    pub fn interactive_column_names(&self) -> Vec<String> {
        let mut columns = vec![ATTRIBUTES_ID_COLUMN.to_string()];
        for field in self.infowindow_fields.iter().chain(&self.tooltip_fields) {
            if !columns.contains(field) {
                columns.push(field.clone());
            }
        }
        columns
    }

    /// Column type reported by the backend for this layer, if any.
    pub fn column_type(&self) -> Option<&str> {
        self.meta.get("column_type").and_then(Value::as_str)
    }
}

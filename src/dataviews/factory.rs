use serde::Deserialize;

use crate::analysis::AnalysisGraph;
use crate::core::config::SyncConfig;
use crate::dataviews::category::CategoryDataview;
use crate::dataviews::formula::{FormulaDataview, FormulaOperation};
use crate::dataviews::histogram::HistogramDataview;
use crate::dataviews::model::DataviewModel;
use crate::dataviews::{DataviewKind, Fetchable};
use crate::filters::{CategoryFilter, Filter, RangeFilter};
use crate::layers::Layer;
use crate::{MapError, Result};

/// Declarative attributes of a new dataview.
///
/// Which ones are required depends on the type: `source` and `column` for
/// every type, plus `operation` for formulas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DataviewAttributes {
    pub id: Option<String>,
    /// Analysis node id, or the id of the layer itself
    pub source: Option<String>,
    pub column: Option<String>,
    pub operation: Option<String>,
    pub aggregation: Option<String>,
    #[serde(rename = "aggregationColumn")]
    pub aggregation_column: Option<String>,
    pub bins: Option<u32>,
    pub own_filter: Option<u8>,
    pub sync_on_data_change: Option<bool>,
    pub sync_on_bbox_change: Option<bool>,
    pub enabled: Option<bool>,
}

impl DataviewAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn aggregation(mut self, aggregation: impl Into<String>) -> Self {
        self.aggregation = Some(aggregation.into());
        self
    }

    pub fn bins(mut self, bins: u32) -> Self {
        self.bins = Some(bins);
        self
    }

    pub fn sync_on_bbox_change(mut self, sync: bool) -> Self {
        self.sync_on_bbox_change = Some(sync);
        self
    }

    pub fn sync_on_data_change(mut self, sync: bool) -> Self {
        self.sync_on_data_change = Some(sync);
        self
    }
}

fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or(MapError::MissingAttribute(name))
}

/// Builds validated dataview models and hands them the credentials used for
/// their fetch urls.
#[derive(Debug, Clone, Default)]
pub struct DataviewsFactory {
    api_key: Option<String>,
    auth_token: Option<String>,
    counter: usize,
}

impl DataviewsFactory {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            auth_token: config.auth_token.clone(),
            counter: 0,
        }
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = Some(api_key.into());
    }

    pub fn set_auth_token(&mut self, auth_token: impl Into<String>) {
        self.auth_token = Some(auth_token.into());
    }

    /// Dispatch on the dataview type name.
    pub fn create(
        &mut self,
        dataview_type: &str,
        attrs: &DataviewAttributes,
        layer: &Layer,
        graph: &AnalysisGraph,
    ) -> Result<DataviewModel> {
        match dataview_type {
            "category" => self.create_category_model(attrs, layer, graph),
            "histogram" => self.create_histogram_model(attrs, layer, graph),
            "formula" => self.create_formula_model(attrs, layer, graph),
            other => Err(MapError::Validation(format!(
                "dataview type '{}' is not supported",
                other
            ))),
        }
    }

    pub fn create_category_model(
        &mut self,
        attrs: &DataviewAttributes,
        layer: &Layer,
        graph: &AnalysisGraph,
    ) -> Result<DataviewModel> {
        require(&attrs.source, "source")?;
        let column = require(&attrs.column, "column")?;

        let mut category = CategoryDataview::new(column);
        category.aggregation = attrs.aggregation.clone();
        category.aggregation_column = attrs.aggregation_column.clone();

        Ok(self.build(
            attrs,
            layer,
            graph,
            DataviewKind::Category(category),
            Some(Filter::Category(CategoryFilter::new())),
        ))
    }

    pub fn create_formula_model(
        &mut self,
        attrs: &DataviewAttributes,
        layer: &Layer,
        graph: &AnalysisGraph,
    ) -> Result<DataviewModel> {
        require(&attrs.source, "source")?;
        let column = require(&attrs.column, "column")?;
        let operation = require(&attrs.operation, "operation")?.parse::<FormulaOperation>()?;

        let formula = FormulaDataview {
            column: column.to_string(),
            operation,
        };
        Ok(self.build(attrs, layer, graph, DataviewKind::Formula(formula), None))
    }

    pub fn create_histogram_model(
        &mut self,
        attrs: &DataviewAttributes,
        layer: &Layer,
        graph: &AnalysisGraph,
    ) -> Result<DataviewModel> {
        require(&attrs.source, "source")?;
        let column = require(&attrs.column, "column")?;

        let mut histogram = HistogramDataview::new(column);
        histogram.bins = attrs.bins;
        histogram.own_filter = attrs.own_filter;
        histogram.aggregation = attrs.aggregation.clone();

        Ok(self.build(
            attrs,
            layer,
            graph,
            DataviewKind::Histogram(histogram),
            Some(Filter::Range(RangeFilter::new())),
        ))
    }

    fn build(
        &mut self,
        attrs: &DataviewAttributes,
        layer: &Layer,
        graph: &AnalysisGraph,
        kind: DataviewKind,
        filter: Option<Filter>,
    ) -> DataviewModel {
        self.counter += 1;
        let id = attrs
            .id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", kind.type_name(), self.counter));
        let source = attrs.source.clone().unwrap_or_default();

        let mut model = DataviewModel::new(id, layer.id.clone(), source, kind, filter);
        model.set_credentials(self.api_key.clone(), self.auth_token.clone());
        model.set_sync_flags(
            attrs.sync_on_data_change.unwrap_or(true),
            attrs.sync_on_bbox_change.unwrap_or(true),
        );
        model.set_enabled(attrs.enabled.unwrap_or(true) && layer.is_visible());
        model.sync_layer(layer, graph);
        model
    }
}

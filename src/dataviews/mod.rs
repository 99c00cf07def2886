//! Dataviews: backend aggregations bound to a layer's source.
//!
//! [`model::DataviewModel`] holds the shared state machine; the per-type
//! behaviour (extra url params, response parsing, payload serialization) lives
//! behind the [`Fetchable`] capability of each [`DataviewKind`] variant.

pub mod category;
pub mod collection;
pub mod factory;
pub mod fetch;
pub mod formula;
pub mod histogram;
pub mod model;

use serde::Serialize;
use serde_json::Value;

use crate::filters::Filter;
use crate::Result;

pub use category::{CategoryDataview, CategoryItem, CategoryResult, CategorySearch};
pub use collection::DataviewsCollection;
pub use factory::{DataviewAttributes, DataviewsFactory};
pub use formula::{FormulaDataview, FormulaOperation, FormulaResult};
pub use histogram::{HistogramBucket, HistogramDataview, HistogramResult};
pub use model::{DataviewEvent, DataviewModel, DataviewState, DataviewUpdate, FetchDecision};

/// What a dataview type contributes to fetching.
pub trait Fetchable {
    /// Prefix of generated ids (`category-1`, ...)
    fn type_name(&self) -> &'static str;

    /// Type-specific `key=value` query params
    fn url_params(&self) -> Vec<String>;

    /// Whether the viewport `bbox` param is sent
    fn submits_bbox(&self) -> bool {
        true
    }

    fn parse(&mut self, response: &Value, filter: Option<&Filter>) -> Result<DataviewData>;

    /// Entry under `widgets` in the instantiation payload
    fn to_json(&self) -> Value;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataviewKind {
    Category(CategoryDataview),
    Histogram(HistogramDataview),
    Formula(FormulaDataview),
}

impl DataviewKind {
    fn fetchable(&self) -> &dyn Fetchable {
        match self {
            DataviewKind::Category(category) => category,
            DataviewKind::Histogram(histogram) => histogram,
            DataviewKind::Formula(formula) => formula,
        }
    }

    fn fetchable_mut(&mut self) -> &mut dyn Fetchable {
        match self {
            DataviewKind::Category(category) => category,
            DataviewKind::Histogram(histogram) => histogram,
            DataviewKind::Formula(formula) => formula,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            DataviewKind::Category(category) => &category.column,
            DataviewKind::Histogram(histogram) => &histogram.column,
            DataviewKind::Formula(formula) => &formula.column,
        }
    }
}

impl Fetchable for DataviewKind {
    fn type_name(&self) -> &'static str {
        self.fetchable().type_name()
    }

    fn url_params(&self) -> Vec<String> {
        self.fetchable().url_params()
    }

    fn submits_bbox(&self) -> bool {
        self.fetchable().submits_bbox()
    }

    fn parse(&mut self, response: &Value, filter: Option<&Filter>) -> Result<DataviewData> {
        self.fetchable_mut().parse(response, filter)
    }

    fn to_json(&self) -> Value {
        self.fetchable().to_json()
    }
}

/// Parsed result of a fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataviewData {
    Category(CategoryResult),
    Histogram(HistogramResult),
    Formula(FormulaResult),
}

impl DataviewData {
    pub fn as_category(&self) -> Option<&CategoryResult> {
        match self {
            DataviewData::Category(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_histogram(&self) -> Option<&HistogramResult> {
        match self {
            DataviewData::Histogram(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_formula(&self) -> Option<&FormulaResult> {
        match self {
            DataviewData::Formula(result) => Some(result),
            _ => None,
        }
    }
}

use serde_json::Value;

use crate::dataviews::model::DataviewModel;
use crate::filters::Filter;
use crate::Result;

/// In-process data source attached to a layer (e.g. vector data already
/// loaded by the view). Dataviews it can serve never hit the network.
///
/// Providers announce new data through [`crate::Dashboard::data_changed`].
pub trait DataProvider: Send + Sync {
    fn can_provide_data_for(&self, dataview: &DataviewModel) -> bool;

    /// Raw response in the same shape the backend would return.
    fn get_data_for(&self, dataview: &DataviewModel) -> Result<Value>;

    fn can_apply_filter_to(&self, dataview: &DataviewModel) -> bool;

    fn apply_filter(&self, dataview: &DataviewModel, filter: &Filter) -> Result<()>;
}

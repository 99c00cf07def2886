use serde_json::{Map, Value};

use crate::filters::Filter;

/// Filters attached to an instantiation request as the `filters` param.
#[derive(Debug, Default, Clone)]
pub struct FiltersCollection<'a> {
    filters: Vec<(&'a str, &'a Filter)>,
}

impl<'a> FiltersCollection<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dataview_id: &'a str, filter: &'a Filter) {
        self.filters.push((dataview_id, filter));
    }

    /// Whether any filter would be serialized.
    pub fn is_empty(&self) -> bool {
        self.filters.iter().all(|(_, filter)| filter.is_empty())
    }

    /// `{dataviews: {id: filter}}` with the non-empty filters, or `None`.
    pub fn to_json(&self) -> Option<Value> {
        let dataviews: Map<String, Value> = self
            .filters
            .iter()
            .filter(|(_, filter)| !filter.is_empty())
            .map(|(id, filter)| (id.to_string(), filter.to_json()))
            .collect();
        if dataviews.is_empty() {
            return None;
        }

        let mut filters = Map::new();
        filters.insert("dataviews".to_string(), Value::Object(dataviews));
        Some(Value::Object(filters))
    }
}

impl<'a> FromIterator<(&'a str, &'a Filter)> for FiltersCollection<'a> {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a Filter)>>(iter: T) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}

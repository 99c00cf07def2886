//! Dataview filters.
//!
//! Filters are plain values owned by their dataview. Changing one goes through
//! the dashboard, which either hands it to the layer's data provider or
//! reloads the map scoped to the dataview's source.

pub mod bounding_box;
pub mod category;
pub mod collection;
pub mod range;

use serde_json::Value;

pub use bounding_box::BoundingBoxFilter;
pub use category::CategoryFilter;
pub use collection::FiltersCollection;
pub use range::RangeFilter;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Category(CategoryFilter),
    Range(RangeFilter),
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        match self {
            Filter::Category(filter) => filter.is_empty(),
            Filter::Range(filter) => filter.is_empty(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Filter::Category(filter) => filter.to_json(),
            Filter::Range(filter) => filter.to_json(),
        }
    }

    pub fn as_category(&self) -> Option<&CategoryFilter> {
        match self {
            Filter::Category(filter) => Some(filter),
            Filter::Range(_) => None,
        }
    }

    pub fn as_category_mut(&mut self) -> Option<&mut CategoryFilter> {
        match self {
            Filter::Category(filter) => Some(filter),
            Filter::Range(_) => None,
        }
    }

    pub fn as_range(&self) -> Option<&RangeFilter> {
        match self {
            Filter::Range(filter) => Some(filter),
            Filter::Category(_) => None,
        }
    }

    pub fn as_range_mut(&mut self) -> Option<&mut RangeFilter> {
        match self {
            Filter::Range(filter) => Some(filter),
            Filter::Category(_) => None,
        }
    }
}

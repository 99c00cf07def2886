//! Category (aggregation) dataview
//!
//! Besides parsing, a category dataview can *lock* a selection: the accepted
//! categories stay listed, with a zero value, even when a later response no
//! longer contains them.

use serde::Serialize;
use serde_json::{json, Value};

use crate::dataviews::{DataviewData, Fetchable};
use crate::filters::{CategoryFilter, Filter};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryItem {
    pub selected: bool,
    pub name: String,
    /// Whether the row aggregates the "other" categories
    pub agg: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryResult {
    pub data: Vec<CategoryItem>,
    /// New names followed by previously accepted ones, first occurrence wins
    #[serde(rename = "allCategoryNames")]
    pub all_category_names: Vec<String>,
    pub nulls: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: Option<f64>,
}

/// Category search state. Results come from the dataview's `/search`
/// endpoint and replace the regular rows while applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorySearch {
    query: String,
    result: Vec<CategoryItem>,
    applied: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryDataview {
    pub column: String,
    pub aggregation: Option<String>,
    pub aggregation_column: Option<String>,
    locked: bool,
    /// Selection waiting to be applied by `apply_locked`
    locked_items: Vec<String>,
    search: CategorySearch,
}

impl CategoryDataview {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Self::default()
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn locked_items(&self) -> &[String] {
        &self.locked_items
    }

    pub fn lock_items<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.locked_items.contains(&name) {
                self.locked_items.push(name);
            }
        }
    }

    pub fn search_query(&self) -> &str {
        &self.search.query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search.query = query.into();
    }

    pub fn is_search_valid(&self) -> bool {
        !self.search.query.trim().is_empty()
    }

    /// Whether a search response currently stands in for the regular rows.
    pub fn is_search_applied(&self) -> bool {
        self.search.applied
    }

    pub fn search_result(&self) -> &[CategoryItem] {
        &self.search.result
    }

    /// Start a selection from the accepted categories, seeding the search
    /// rows with the current data. No-op while a search is applied.
    pub fn setup_search(&mut self, filter: &CategoryFilter, current: Option<&CategoryResult>) {
        if self.search.applied {
            return;
        }
        self.lock_items(filter.accepted().iter().cloned());
        self.search.result = current.map(|result| result.data.clone()).unwrap_or_default();
    }

    /// Drop the pending selection and the search rows.
    pub fn clean_search(&mut self) {
        self.locked_items.clear();
        self.search.result.clear();
        self.search.applied = false;
    }

    /// `q` param of the search url
    pub fn search_params(&self) -> Vec<String> {
        vec![format!("q={}", urlencoding::encode(&self.search.query))]
    }

    /// Apply a search response. Rows are selected when they are part of the
    /// pending selection.
    pub fn apply_search_response(&mut self, response: &Value) -> &[CategoryItem] {
        let categories = response.get("categories").and_then(Value::as_array);
        let result: Vec<CategoryItem> = categories
            .into_iter()
            .flatten()
            .map(|datum| {
                let name = datum.get("category").map(category_name).unwrap_or_default();
                CategoryItem {
                    selected: self.locked_items.contains(&name),
                    name,
                    agg: datum.get("agg").and_then(Value::as_bool).unwrap_or(false),
                    value: datum.get("value").and_then(Value::as_f64).unwrap_or(0.0),
                }
            })
            .collect();
        self.search.result = result;
        self.search.applied = true;
        &self.search.result
    }

    pub fn can_be_locked(&self, filter: &CategoryFilter) -> bool {
        self.locked || !filter.accepted().is_empty()
    }

    /// Whether applying the pending selection would change the filter.
    pub fn can_apply_locked(&self, filter: &CategoryFilter) -> bool {
        filter.accepted().len() != self.locked_items.len()
            || filter
                .accepted()
                .iter()
                .any(|name| !self.locked_items.contains(name))
    }

    /// Make the pending selection the accepted set. With nothing pending the
    /// dataview is unlocked instead and `false` is returned.
    pub fn apply_locked(&mut self, filter: &mut CategoryFilter) -> bool {
        if self.locked_items.is_empty() {
            self.unlock_categories(filter);
            return false;
        }
        self.locked = true;
        filter.clean_filter();
        filter.accept(std::mem::take(&mut self.locked_items));
        self.clean_search();
        true
    }

    pub fn lock_categories(&mut self) {
        self.locked = true;
    }

    pub fn unlock_categories(&mut self, filter: &mut CategoryFilter) {
        self.locked = false;
        filter.accept_all();
    }
}

fn category_name(category: &Value) -> String {
    match category {
        Value::String(name) => name.clone(),
        other => other.to_string(),
    }
}

impl Fetchable for CategoryDataview {
    fn type_name(&self) -> &'static str {
        "category"
    }

    fn url_params(&self) -> Vec<String> {
        vec![format!("own_filter={}", if self.locked { 1 } else { 0 })]
    }

    fn parse(&mut self, response: &Value, filter: Option<&Filter>) -> Result<DataviewData> {
        let filter = filter.and_then(Filter::as_category);
        let is_rejected = |name: &str| filter.map(|f| f.is_rejected(name)).unwrap_or(false);

        let mut data = Vec::new();
        let mut all_category_names: Vec<String> = Vec::new();
        let categories = response.get("categories").and_then(Value::as_array);
        for datum in categories.into_iter().flatten() {
            let name = datum.get("category").map(category_name).unwrap_or_default();
            data.push(CategoryItem {
                selected: !is_rejected(&name),
                name: name.clone(),
                agg: datum.get("agg").and_then(Value::as_bool).unwrap_or(false),
                value: datum.get("value").and_then(Value::as_f64).unwrap_or(0.0),
            });
            if !all_category_names.contains(&name) {
                all_category_names.push(name);
            }
        }

        if self.locked {
            let accepted = filter.map(CategoryFilter::accepted).unwrap_or_default();
            for name in accepted {
                if !data.iter().any(|item| item.name == *name) {
                    data.push(CategoryItem {
                        selected: true,
                        name: name.clone(),
                        agg: false,
                        value: 0.0,
                    });
                }
                if !all_category_names.contains(name) {
                    all_category_names.push(name.clone());
                }
            }
        }

        Ok(DataviewData::Category(CategoryResult {
            data,
            all_category_names,
            nulls: response.get("nulls").and_then(Value::as_f64),
            min: response.get("min").and_then(Value::as_f64),
            max: response.get("max").and_then(Value::as_f64),
            count: response.get("count").and_then(Value::as_f64),
        }))
    }

    fn to_json(&self) -> Value {
        json!({
            "type": "aggregation",
            "options": {
                "column": self.column,
                "aggregation": self.aggregation,
                "aggregationColumn": self.aggregation_column,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(categories: Value) -> Value {
        json!({ "categories": categories, "nulls": 0, "min": 1, "max": 10, "count": 3 })
    }

    fn parse(dataview: &mut CategoryDataview, filter: &CategoryFilter, response: &Value) -> CategoryResult {
        let filter = Filter::Category(filter.clone());
        match dataview.parse(response, Some(&filter)).unwrap() {
            DataviewData::Category(result) => result,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_normalizes_rows() {
        let mut dataview = CategoryDataview::new("city");
        let mut filter = CategoryFilter::new();
        filter.reject(["Madrid"]);

        let result = parse(
            &mut dataview,
            &filter,
            &response(json!([
                { "category": "Madrid", "agg": false, "value": 5 },
                { "category": 2, "agg": false, "value": 3 },
                { "category": "Other", "agg": true, "value": 1 }
            ])),
        );

        assert_eq!(result.data.len(), 3);
        assert!(!result.data[0].selected);
        assert_eq!(result.data[1].name, "2");
        assert!(result.data[1].selected);
        assert!(result.data[2].agg);
        assert_eq!(result.all_category_names, vec!["Madrid", "2", "Other"]);
        assert_eq!(result.count, Some(3.0));
    }

    #[test]
    fn test_locked_categories_survive_missing_rows() {
        let mut dataview = CategoryDataview::new("city");
        let mut filter = CategoryFilter::new();
        filter.accept(["A", "B"]);

        dataview.setup_search(&filter, None);
        assert!(dataview.can_be_locked(&filter));
        assert!(dataview.apply_locked(&mut filter));
        assert!(dataview.is_locked());
        assert!(dataview.locked_items().is_empty());
        assert_eq!(filter.accepted(), ["A", "B"]);

        let result = parse(
            &mut dataview,
            &filter,
            &response(json!([
                { "category": "A", "agg": false, "value": 5 },
                { "category": "C", "agg": false, "value": 2 }
            ])),
        );

        let b = result.data.iter().find(|item| item.name == "B").unwrap();
        assert!(b.selected);
        assert_eq!(b.value, 0.0);
        assert!(!b.agg);
        assert!(!result.data.iter().find(|item| item.name == "C").unwrap().selected);
        assert_eq!(result.all_category_names, vec!["A", "C", "B"]);
        assert_eq!(dataview.url_params(), vec!["own_filter=1"]);
    }

    #[test]
    fn test_search_rows_follow_the_pending_selection() {
        let mut dataview = CategoryDataview::new("city");
        let mut filter = CategoryFilter::new();
        filter.accept(["Madrid"]);

        assert!(!dataview.is_search_valid());
        dataview.set_search_query("Ma drid");
        assert!(dataview.is_search_valid());
        assert_eq!(dataview.search_params(), vec!["q=Ma%20drid"]);

        let current = parse(
            &mut dataview,
            &filter,
            &response(json!([{ "category": "Madrid", "agg": false, "value": 5 }])),
        );
        dataview.setup_search(&filter, Some(&current));
        assert!(!dataview.is_search_applied());
        assert_eq!(dataview.search_result().len(), 1);
        assert_eq!(dataview.locked_items(), ["Madrid"]);

        let rows = dataview.apply_search_response(&json!({
            "categories": [
                { "category": "Madrid", "value": 5 },
                { "category": "Malaga", "value": 2 }
            ]
        }));
        assert!(rows[0].selected);
        assert!(!rows[1].selected);
        assert!(dataview.is_search_applied());

        // Applying the selection ends the search
        dataview.lock_items(["Malaga"]);
        assert!(dataview.apply_locked(&mut filter));
        assert!(!dataview.is_search_applied());
        assert!(dataview.search_result().is_empty());
        assert_eq!(filter.accepted(), ["Madrid", "Malaga"]);
    }

    #[test]
    fn test_apply_locked_without_selection_unlocks() {
        let mut dataview = CategoryDataview::new("city");
        let mut filter = CategoryFilter::new();
        dataview.lock_categories();
        filter.reject(["A"]);

        assert!(!dataview.apply_locked(&mut filter));
        assert!(!dataview.is_locked());
        assert!(filter.is_empty());
    }

    #[test]
    fn test_can_apply_locked() {
        let mut dataview = CategoryDataview::new("city");
        let mut filter = CategoryFilter::new();
        filter.accept(["A"]);
        dataview.lock_items(["A"]);
        assert!(!dataview.can_apply_locked(&filter));

        dataview.lock_items(["B"]);
        assert!(dataview.can_apply_locked(&filter));
    }

    #[test]
    fn test_to_json() {
        let mut dataview = CategoryDataview::new("city");
        dataview.aggregation = Some("count".to_string());
        assert_eq!(
            dataview.to_json(),
            json!({
                "type": "aggregation",
                "options": { "column": "city", "aggregation": "count", "aggregationColumn": null }
            })
        );
    }
}

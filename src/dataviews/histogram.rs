use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::constants::MAX_HISTOGRAM_BINS;
use crate::dataviews::{DataviewData, Fetchable};
use crate::filters::Filter;
use crate::{MapError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub bin: usize,
    pub start: f64,
    pub end: f64,
    pub freq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    /// Any other per-bin field the backend reports
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistogramResult {
    pub data: Vec<HistogramBucket>,
    pub nulls: Option<u64>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramDataview {
    pub column: String,
    pub bins: Option<u32>,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub own_filter: Option<u8>,
    pub aggregation: Option<String>,
    /// From the layer metadata
    pub column_type: Option<String>,
    /// The first fetch covers the whole dataset, later ones the viewport
    submit_bbox: bool,
}

impl HistogramDataview {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Self::default()
        }
    }
}

/// Rebuild the dense bucket list from the sparse `bins` of a response.
pub fn parse_buckets(response: &Value) -> Result<Vec<HistogramBucket>> {
    let count = response
        .get("bins_count")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if count > MAX_HISTOGRAM_BINS {
        return Err(MapError::Validation(format!(
            "histogram declares {} bins, at most {} are supported",
            count, MAX_HISTOGRAM_BINS
        )));
    }
    let count = count as usize;
    let width = response
        .get("bin_width")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let start = response
        .get("bins_start")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let mut sparse: Vec<Option<&Map<String, Value>>> = vec![None; count];
    let bins = response.get("bins").and_then(Value::as_array);
    for bin in bins.into_iter().flatten().filter_map(Value::as_object) {
        match bin.get("bin").and_then(Value::as_u64) {
            Some(index) if (index as usize) < count => sparse[index as usize] = Some(bin),
            _ => {}
        }
    }

    let mut buckets = sparse
        .into_iter()
        .enumerate()
        .map(|(i, bin)| {
            let mut bucket = Map::new();
            bucket.insert("bin".to_string(), json!(i));
            bucket.insert("start".to_string(), json!(start + i as f64 * width));
            bucket.insert("end".to_string(), json!(start + (i + 1) as f64 * width));
            bucket.insert("freq".to_string(), json!(0));
            // Real data overrides the computed defaults
            if let Some(bin) = bin {
                bucket.extend(bin.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            serde_json::from_value(Value::Object(bucket))
        })
        .collect::<std::result::Result<Vec<HistogramBucket>, _>>()?;

    // Repeated float multiplication can leave the last end below its max
    if let Some(last) = buckets.last_mut() {
        if let Some(max) = last.max {
            if last.end < max {
                last.end = max;
            }
        }
    }

    Ok(buckets)
}

impl Fetchable for HistogramDataview {
    fn type_name(&self) -> &'static str {
        "histogram"
    }

    fn url_params(&self) -> Vec<String> {
        let mut params = Vec::new();
        if let Some(column_type) = &self.column_type {
            params.push(format!("column_type={}", column_type));
        }
        if let Some(start) = self.start {
            params.push(format!("start={}", start));
        }
        if let Some(end) = self.end {
            params.push(format!("end={}", end));
        }
        if let Some(bins) = self.bins {
            params.push(format!("bins={}", bins));
        }
        if let Some(own_filter) = self.own_filter {
            params.push(format!("own_filter={}", own_filter));
        }
        if let Some(aggregation) = &self.aggregation {
            params.push(format!("aggregation={}", aggregation));
        }
        params
    }

    fn submits_bbox(&self) -> bool {
        self.submit_bbox
    }

    fn parse(&mut self, response: &Value, _filter: Option<&Filter>) -> Result<DataviewData> {
        let data = parse_buckets(response)?;
        self.submit_bbox = true;
        Ok(DataviewData::Histogram(HistogramResult {
            start: data.first().map(|bucket| bucket.start),
            end: data.last().map(|bucket| bucket.end),
            nulls: response.get("nulls").and_then(Value::as_u64),
            data,
        }))
    }

    fn to_json(&self) -> Value {
        json!({
            "type": "histogram",
            "options": {
                "column": self.column,
                "bins": self.bins,
            }
        })
    }
}

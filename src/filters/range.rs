use serde_json::{json, Value};

/// Numeric `[min, max]` range over a histogram column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeFilter {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Picked up from the owning layer's metadata (`number`, `date`, ...)
    pub column_type: Option<String>,
}

impl RangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_range(&mut self, min: f64, max: f64) {
        self.min = Some(min);
        self.max = Some(max);
    }

    pub fn unset_range(&mut self) {
        self.min = None;
        self.max = None;
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn to_json(&self) -> Value {
        if self.is_empty() {
            return json!({});
        }
        json!({ "min": self.min, "max": self.max })
    }
}

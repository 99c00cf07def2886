use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dataviews::{DataviewData, Fetchable};
use crate::filters::Filter;
use crate::{MapError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormulaOperation {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl FormulaOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormulaOperation::Count => "count",
            FormulaOperation::Sum => "sum",
            FormulaOperation::Avg => "avg",
            FormulaOperation::Max => "max",
            FormulaOperation::Min => "min",
        }
    }
}

impl FromStr for FormulaOperation {
    type Err = MapError;

    fn from_str(operation: &str) -> Result<Self> {
        match operation {
            "count" => Ok(FormulaOperation::Count),
            "sum" => Ok(FormulaOperation::Sum),
            "avg" => Ok(FormulaOperation::Avg),
            "max" => Ok(FormulaOperation::Max),
            "min" => Ok(FormulaOperation::Min),
            other => Err(MapError::Validation(format!(
                "operation '{}' is not supported",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaResult {
    pub operation: Option<String>,
    pub result: Option<f64>,
    pub nulls: Option<u64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormulaDataview {
    pub column: String,
    pub operation: FormulaOperation,
}

impl Fetchable for FormulaDataview {
    fn type_name(&self) -> &'static str {
        "formula"
    }

    fn url_params(&self) -> Vec<String> {
        Vec::new()
    }

    fn parse(&mut self, response: &Value, _filter: Option<&Filter>) -> Result<DataviewData> {
        let result = FormulaResult::deserialize(response)?;
        Ok(DataviewData::Formula(result))
    }

    fn to_json(&self) -> Value {
        json!({
            "type": "formula",
            "options": {
                "column": self.column,
                "operation": self.operation.as_str(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parsing() {
        assert_eq!("avg".parse::<FormulaOperation>().unwrap(), FormulaOperation::Avg);
        assert!(matches!(
            "median".parse::<FormulaOperation>(),
            Err(MapError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_and_to_json() {
        let mut formula = FormulaDataview {
            column: "population".to_string(),
            operation: FormulaOperation::Max,
        };
        let data = formula
            .parse(&json!({ "operation": "max", "result": 1204.5, "nulls": 2, "type": "formula" }), None)
            .unwrap();
        let result = data.as_formula().unwrap();
        assert_eq!(result.result, Some(1204.5));
        assert_eq!(result.nulls, Some(2));

        assert_eq!(
            formula.to_json(),
            json!({ "type": "formula", "options": { "column": "population", "operation": "max" } })
        );
    }
}

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::types::{FeatureRow, FeatureValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    #[default]
    Error,
    Ignore,
}

/// How one input column becomes numeric slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnEncoding {
    OneHot {
        categories: Vec<String>,
        #[serde(default)]
        handle_unknown: HandleUnknown,
    },
    Ordinal {
        categories: Vec<String>,
        #[serde(default)]
        unknown_value: Option<f64>,
    },
    Numeric {
        #[serde(default)]
        mean: f64,
        #[serde(default = "default_scale")]
        scale: f64,
    },
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(flatten)]
    pub encoding: ColumnEncoding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSpec {
    pub columns: Vec<ColumnSpec>,
}

/// Feature encoder declared by an artifact. Turns a record into the vector
/// its estimator was fit on.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    columns: Vec<ColumnSpec>,
    width: usize,
}

impl FeatureEncoder {
    pub fn from_spec(spec: EncoderSpec) -> ModelResult<Self> {
        if spec.columns.is_empty() {
            return Err(ModelError::incompatible("encoder declares no columns"));
        }

        let mut width = 0;
        for column in &spec.columns {
            match &column.encoding {
                ColumnEncoding::OneHot { categories, .. } => {
                    if categories.is_empty() {
                        return Err(ModelError::incompatible(format!(
                            "one-hot column '{}' has no categories",
                            column.name
                        )));
                    }
                    width += categories.len();
                }
                ColumnEncoding::Ordinal { categories, .. } => {
                    if categories.is_empty() {
                        return Err(ModelError::incompatible(format!(
                            "ordinal column '{}' has no categories",
                            column.name
                        )));
                    }
                    width += 1;
                }
                ColumnEncoding::Numeric { mean, scale } => {
                    if !mean.is_finite() || !scale.is_finite() || *scale == 0.0 {
                        return Err(ModelError::incompatible(format!(
                            "numeric column '{}' has invalid mean/scale",
                            column.name
                        )));
                    }
                    width += 1;
                }
            }
        }

        Ok(Self {
            columns: spec.columns,
            width,
        })
    }

    /// Length of the encoded vector
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn encode(&self, row: &FeatureRow) -> ModelResult<Array1<f64>> {
        let mut out = Vec::with_capacity(self.width);

        for column in &self.columns {
            let value = row
                .get(&column.name)
                .ok_or_else(|| ModelError::MissingColumn(column.name.clone()))?;

            match &column.encoding {
                ColumnEncoding::OneHot { categories, handle_unknown } => {
                    let text = expect_text(&column.name, value)?;
                    let hit = categories.iter().position(|c| c == text);
                    if hit.is_none() && *handle_unknown == HandleUnknown::Error {
                        return Err(unknown(&column.name, text));
                    }
                    out.extend((0..categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
                }
                ColumnEncoding::Ordinal { categories, unknown_value } => {
                    let text = expect_text(&column.name, value)?;
                    let encoded = match categories.iter().position(|c| c == text) {
                        Some(i) => i as f64,
                        None => unknown_value.ok_or_else(|| unknown(&column.name, text))?,
                    };
                    out.push(encoded);
                }
                ColumnEncoding::Numeric { mean, scale } => {
                    let x = match value {
                        FeatureValue::Number(n) => *n,
                        FeatureValue::Text(_) => {
                            return Err(ModelError::ColumnType {
                                column: column.name.clone(),
                                expected: "numeric",
                            })
                        }
                    };
                    out.push((x - mean) / scale);
                }
            }
        }

        Ok(Array1::from(out))
    }
}

fn expect_text<'a>(column: &str, value: &'a FeatureValue) -> ModelResult<&'a str> {
    match value {
        FeatureValue::Text(s) => Ok(s),
        FeatureValue::Number(_) => Err(ModelError::ColumnType {
            column: column.to_string(),
            expected: "text",
        }),
    }
}

fn unknown(column: &str, value: &str) -> ModelError {
    ModelError::UnknownCategory {
        column: column.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
pub(crate) fn sample_encoder_spec() -> EncoderSpec {
    serde_json::from_str(
        r#"{"columns": [
            {"name": "experience_level", "kind": "ordinal", "categories": ["EN", "MI", "SE", "EX"]},
            {"name": "employment_type", "kind": "one_hot", "categories": ["FT", "PT"], "handle_unknown": "ignore"},
            {"name": "remote_ratio", "kind": "numeric", "mean": 50.0, "scale": 50.0},
            {"name": "company_size", "kind": "ordinal", "categories": ["S", "M", "L"], "unknown_value": -1.0}
        ]}"#,
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::sample_record;

    #[test]
    fn test_encodes_mixed_columns() {
        let encoder = FeatureEncoder::from_spec(sample_encoder_spec()).unwrap();
        assert_eq!(encoder.width(), 5);

        let x = encoder.encode(&sample_record().to_row()).unwrap();
        assert_eq!(x.to_vec(), vec![2.0, 1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_unknown_category_handling() {
        let encoder = FeatureEncoder::from_spec(sample_encoder_spec()).unwrap();

        let mut record = sample_record();
        record.employment_type = "FL".to_string();
        record.company_size = "XL".to_string();
        let x = encoder.encode(&record.to_row()).unwrap();
        assert_eq!(x.to_vec(), vec![2.0, 0.0, 0.0, 1.0, -1.0]);

        record.experience_level = "CEO".to_string();
        let err = encoder.encode(&record.to_row()).unwrap_err();
        assert!(matches!(err, ModelError::UnknownCategory { ref column, .. } if column == "experience_level"));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let spec: EncoderSpec = serde_json::from_str(
            r#"{"columns": [{"name": "years_of_experience", "kind": "numeric"}]}"#,
        )
        .unwrap();
        let encoder = FeatureEncoder::from_spec(spec).unwrap();

        let err = encoder.encode(&sample_record().to_row()).unwrap_err();
        assert!(matches!(err, ModelError::MissingColumn(ref c) if c == "years_of_experience"));
    }

    #[test]
    fn test_type_mismatch() {
        let spec: EncoderSpec = serde_json::from_str(
            r#"{"columns": [{"name": "job_title", "kind": "numeric"}]}"#,
        )
        .unwrap();
        let encoder = FeatureEncoder::from_spec(spec).unwrap();
        assert!(matches!(
            encoder.encode(&sample_record().to_row()),
            Err(ModelError::ColumnType { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_scale() {
        let spec: EncoderSpec = serde_json::from_str(
            r#"{"columns": [{"name": "remote_ratio", "kind": "numeric", "scale": 0.0}]}"#,
        )
        .unwrap();
        assert!(FeatureEncoder::from_spec(spec).is_err());
    }
}

use serde::{Deserialize, Serialize};

/// Column names in the order the classifiers were trained on
pub const FEATURE_COLUMNS: [&str; 7] = [
    "experience_level",
    "employment_type",
    "job_title",
    "employee_residence",
    "remote_ratio",
    "company_location",
    "company_size",
];

/// Description of a professional submitted for estimation.
/// Every field is required; there are no defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub experience_level: String,
    pub employment_type: String,
    pub job_title: String,
    pub employee_residence: String,
    pub remote_ratio: i64,
    pub company_location: String,
    pub company_size: String,
}

impl InputRecord {
    /// Tabular form handed to classifiers
    pub fn to_row(&self) -> FeatureRow {
        FeatureRow {
            values: vec![
                FeatureValue::Text(self.experience_level.clone()),
                FeatureValue::Text(self.employment_type.clone()),
                FeatureValue::Text(self.job_title.clone()),
                FeatureValue::Text(self.employee_residence.clone()),
                FeatureValue::Number(self.remote_ratio as f64),
                FeatureValue::Text(self.company_location.clone()),
                FeatureValue::Text(self.company_size.clone()),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Text(String),
    Number(f64),
}

/// One record laid out as named columns. Values are stored positionally
/// against `FEATURE_COLUMNS`; lookups are by name.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    values: Vec<FeatureValue>,
}

impl FeatureRow {
    pub fn get(&self, column: &str) -> Option<&FeatureValue> {
        FEATURE_COLUMNS
            .iter()
            .position(|c| *c == column)
            .and_then(|idx| self.values.get(idx))
    }

    #[cfg(test)]
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, &FeatureValue)> {
        FEATURE_COLUMNS.iter().copied().zip(self.values.iter())
    }
}

#[cfg(test)]
pub(crate) fn sample_record() -> InputRecord {
    InputRecord {
        experience_level: "SE".to_string(),
        employment_type: "FT".to_string(),
        job_title: "Data Scientist".to_string(),
        employee_residence: "BR".to_string(),
        remote_ratio: 100,
        company_location: "BR".to_string(),
        company_size: "M".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_follows_training_column_order() {
        let row = sample_record().to_row();
        let names: Vec<&str> = row.columns().map(|(name, _)| name).collect();
        assert_eq!(names, FEATURE_COLUMNS.to_vec());
    }

    #[test]
    fn test_row_lookup_by_name() {
        let row = sample_record().to_row();
        assert_eq!(row.get("remote_ratio"), Some(&FeatureValue::Number(100.0)));
        assert_eq!(
            row.get("job_title"),
            Some(&FeatureValue::Text("Data Scientist".to_string()))
        );
        assert_eq!(row.get("salary"), None);
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let json = r#"{"experience_level":"SE","employment_type":"FT","job_title":"Data Scientist",
            "employee_residence":"BR","company_location":"BR","company_size":"M"}"#;
        assert!(serde_json::from_str::<InputRecord>(json).is_err());
    }

    #[test]
    fn test_non_numeric_remote_ratio_is_rejected() {
        let json = r#"{"experience_level":"SE","employment_type":"FT","job_title":"Data Scientist",
            "employee_residence":"BR","remote_ratio":"abc","company_location":"BR","company_size":"M"}"#;
        assert!(serde_json::from_str::<InputRecord>(json).is_err());
    }
}

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Prefix marking a failed model entry in the string-shaped response
pub const ERROR_PREFIX: &str = "Erro: ";

/// Value produced by a classifier before band mapping. Classifiers trained
/// on encoded targets yield indices; ones trained on labels yield text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrediction {
    Integer(i64),
    Float(f64),
    Label(String),
}

impl fmt::Display for RawPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawPrediction::Integer(i) => write!(f, "{}", i),
            RawPrediction::Float(x) => f.write_str(&float_repr(*x)),
            RawPrediction::Label(s) => write!(f, "{}", s),
        }
    }
}

/// Shortest round-trip form with a trailing ".0" on whole numbers. Exponents
/// carry a sign and at least two digits (`1e+16`, `1.5e-05`).
fn float_repr(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let debug = format!("{:?}", x);
    match debug.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => debug,
    }
}

/// Result of running one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutcome {
    Band(String),
    Failed(String),
}

impl ModelOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ModelOutcome::Failed(_))
    }

    #[cfg(test)]
    pub fn band(&self) -> Option<&str> {
        match self {
            ModelOutcome::Band(label) => Some(label),
            ModelOutcome::Failed(_) => None,
        }
    }
}

impl fmt::Display for ModelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelOutcome::Band(label) => write!(f, "{}", label),
            ModelOutcome::Failed(reason) => write!(f, "{}{}", ERROR_PREFIX, reason),
        }
    }
}

impl Serialize for ModelOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Per-model outcomes in registry order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionResult {
    entries: Vec<(String, ModelOutcome)>,
}

impl PredictionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model_id: impl Into<String>, outcome: ModelOutcome) {
        let model_id = model_id.into();
        match self.entries.iter_mut().find(|(id, _)| *id == model_id) {
            Some(entry) => entry.1 = outcome,
            None => self.entries.push((model_id, outcome)),
        }
    }

    #[cfg(test)]
    pub fn get(&self, model_id: &str) -> Option<&ModelOutcome> {
        self.entries
            .iter()
            .find(|(id, _)| id == model_id)
            .map(|(_, outcome)| outcome)
    }

    #[cfg(test)]
    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelOutcome)> {
        self.entries.iter().map(|(id, outcome)| (id.as_str(), outcome))
    }

    pub fn failure_count(&self) -> usize {
        self.entries.iter().filter(|(_, o)| o.is_failed()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for PredictionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (id, outcome) in self.iter() {
            map.serialize_entry(id, outcome)?;
        }
        map.end()
    }
}

/// Response body of the prediction endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub previsoes: PredictionResult,
}

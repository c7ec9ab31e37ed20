use tracing::debug;

use crate::types::RawPrediction;

/// Salary bands from lowest to highest
pub const BAND_TABLE: [&str; 6] = [
    "Até 50k",
    "50k–100k",
    "100k–150k",
    "150k–200k",
    "200k–300k",
    "Acima de 300k",
];

/// Label for a band index, if the index is inside the table
pub fn band_for_index(index: i64) -> Option<&'static str> {
    usize::try_from(index).ok().and_then(|i| BAND_TABLE.get(i).copied())
}

/// Convert a raw classifier output into a band label.
///
/// Numeric values inside the table's index range select a band (floats are
/// truncated first). Anything else, including out-of-range numbers, comes
/// back as its string form.
pub fn map_prediction(raw: &RawPrediction) -> String {
    let band = match raw {
        RawPrediction::Integer(i) => band_for_index(*i),
        RawPrediction::Float(x) if x.is_finite() => band_for_index(x.trunc() as i64),
        RawPrediction::Float(_) => None,
        RawPrediction::Label(label) => return label.clone(),
    };

    match band {
        Some(label) => label.to_string(),
        None => {
            debug!("Prediction {} outside band table, passing through", raw);
            raw.to_string()
        }
    }
}

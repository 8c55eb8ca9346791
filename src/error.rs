use thiserror::Error;

/// Errors the prediction core exposes to its callers.
///
/// Missing factor data never surfaces here — it is absorbed as defaults and
/// reported through `data_completeness` on the result instead.
#[derive(Debug, Error)]
pub enum PredictionError {
    /// The fixture (or one of its teams) could not be resolved. Fatal:
    /// raised before any factor fetch starts.
    #[error("fixture not found: {0}")]
    FixtureNotFound(String),

    /// The normalized outcome probabilities do not form a valid
    /// distribution. The normalization step makes this unreachable in
    /// practice; if it fires anyway we fail loudly rather than emit a
    /// bad distribution.
    #[error("outcome probabilities do not sum to 100 (sum = {sum})")]
    InvalidDistribution { sum: f64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PredictionError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PredictionError::FixtureNotFound(_))
    }
}

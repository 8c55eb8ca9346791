use std::env;
use std::time::Duration;

/// Relative influence of each factor category on the outcome distribution.
///
/// The five duplicated engines in earlier iterations of this model disagreed
/// on the exact split; these are now a single tunable table instead of five
/// code paths. The values are heuristics, not fitted coefficients.
#[derive(Debug, Clone)]
pub struct FactorWeights {
    pub form: f64,
    pub head_to_head: f64,
    pub injuries: f64,
    pub home_advantage: f64,
    pub motivation: f64,
    /// Reserved for signals not yet wired in (referee, weather, travel).
    pub other: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            form: 0.40,
            head_to_head: 0.20,
            injuries: 0.15,
            home_advantage: 0.10,
            motivation: 0.10,
            other: 0.05,
        }
    }
}

/// Every tunable constant of the prediction core in one place.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub weights: FactorWeights,

    /// Points of form-rating difference translated into probability points,
    /// before the ±30 clamp.
    pub form_scale: f64,

    /// Home boost in probability points, pre-normalization. Entered at face
    /// value rather than through `weights.home_advantage`: the 10% share in
    /// the canonical weight table describes this default magnitude.
    pub home_advantage_base: f64,

    /// Internal share when blending with an external baseline prediction.
    /// Fixed ratio, never derived per request.
    pub baseline_blend_internal: f64,

    /// Per-source fetch timeout. A source that misses it contributes its
    /// default value and a reduced `data_completeness`.
    pub fetch_timeout: Duration,

    /// Cap on fixtures predicted concurrently in a batch; the rest queue.
    pub max_concurrent_predictions: usize,

    /// Win-market value-bet thresholds (probability in percent).
    pub win_flag_medium: f64,
    pub win_flag_high: f64,
    /// Goal-market flag threshold; the complementary side is flagged at
    /// `100 - goal_market_flag`.
    pub goal_market_flag: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            form_scale: 3.0,
            home_advantage_base: 15.0,
            baseline_blend_internal: 0.70,
            fetch_timeout: Duration::from_secs(10),
            max_concurrent_predictions: 5,
            win_flag_medium: 55.0,
            win_flag_high: 65.0,
            goal_market_flag: 65.0,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with environment overrides, dotenv style.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_f64("MATCHCAST_HOME_ADVANTAGE") {
            cfg.home_advantage_base = v;
        }
        if let Some(v) = env_f64("MATCHCAST_BASELINE_BLEND") {
            cfg.baseline_blend_internal = v.clamp(0.0, 1.0);
        }
        if let Some(v) = env_f64("MATCHCAST_FETCH_TIMEOUT_SECS") {
            cfg.fetch_timeout = Duration::from_secs_f64(v.max(0.1));
        }
        if let Ok(v) = env::var("MATCHCAST_MAX_CONCURRENT") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.max_concurrent_predictions = n.max(1);
            }
        }

        cfg
    }
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key).ok().and_then(|v| v.parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_cover_the_full_budget() {
        let w = FactorWeights::default();
        let total = w.form + w.head_to_head + w.injuries + w.home_advantage + w.motivation + w.other;
        assert!((total - 1.0).abs() < 1e-9);
    }
}

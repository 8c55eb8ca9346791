use statrs::distribution::{Discrete, DiscreteCDF, Poisson};

use crate::config::EngineConfig;
use crate::error::PredictionError;
use crate::models::{BaselineExternalPrediction, ScorelineProbability};
use crate::services::scoring::FactorBreakdown;

/// Largest per-side goal count considered in the exact-score grid.
const SCORE_GRID_MAX: u32 = 5;

/// Floor applied to each outcome before normalization so no result is ever
/// assigned a zero or negative probability.
const OUTCOME_FLOOR: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
pub struct OutcomeDistribution {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl OutcomeDistribution {
    pub fn max(&self) -> f64 {
        self.home.max(self.draw).max(self.away)
    }
}

/// The aggregator's full output: normalized outcome distribution plus
/// derived goal markets.
#[derive(Debug, Clone)]
pub struct ScoredMarkets {
    pub outcome: OutcomeDistribution,
    pub expected_goals_home: f64,
    pub expected_goals_away: f64,
    pub over_25: f64,
    pub btts: f64,
    pub predicted_score: (u32, u32),
    pub top_scorelines: Vec<ScorelineProbability>,
}

/// Combines weighted factor adjustments onto the equal starting simplex,
/// blends an optional external baseline, and derives goal markets from the
/// expected-goals estimate.
pub struct Aggregator {
    config: EngineConfig,
}

impl Aggregator {
    /// Equal starting distribution before any factor is applied.
    pub const START: OutcomeDistribution =
        OutcomeDistribution { home: 33.33, draw: 33.33, away: 33.34 };

    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn aggregate(
        &self,
        breakdown: &FactorBreakdown,
        baseline: Option<&BaselineExternalPrediction>,
    ) -> Result<ScoredMarkets, PredictionError> {
        let total = breakdown.total();
        let mut home = Self::START.home + total.home;
        let mut draw = Self::START.draw + total.draw;
        let mut away = Self::START.away + total.away;

        home = home.max(OUTCOME_FLOOR);
        draw = draw.max(OUTCOME_FLOOR);
        away = away.max(OUTCOME_FLOOR);

        if let Some(external) = baseline {
            let w = self.config.baseline_blend_internal;
            home = w * home + (1.0 - w) * external.home_pct;
            draw = w * draw + (1.0 - w) * external.draw_pct;
            away = w * away + (1.0 - w) * external.away_pct;
        }

        let outcome = normalize(home, draw, away)?;

        let xg_home = breakdown.expected_goals_home.max(0.05);
        let xg_away = breakdown.expected_goals_away.max(0.05);

        let mut over_25 = over_25_probability(xg_home + xg_away)?;
        let mut btts = self.btts_probability(breakdown, xg_home, xg_away);

        if let Some(external) = baseline {
            let w = self.config.baseline_blend_internal;
            if let Some(ext_over) = external.over25_pct {
                over_25 = w * over_25 + (1.0 - w) * ext_over;
            }
            if let Some(ext_btts) = external.btts_pct {
                btts = w * btts + (1.0 - w) * ext_btts;
            }
        }

        let (predicted_score, top_scorelines) = score_grid(xg_home, xg_away)?;

        Ok(ScoredMarkets {
            outcome,
            expected_goals_home: xg_home,
            expected_goals_away: xg_away,
            over_25,
            btts,
            predicted_score,
            top_scorelines,
        })
    }

    /// BTTS = product of each side's P(score ≥ 1), each bumped 10% when the
    /// opponent leaks ≥1.5 goals per game and bounded to [0, 0.9].
    fn btts_probability(&self, breakdown: &FactorBreakdown, xg_home: f64, xg_away: f64) -> f64 {
        let mut p_home_scores = 1.0 - (-xg_home).exp();
        let mut p_away_scores = 1.0 - (-xg_away).exp();

        if breakdown.away_avg_conceded >= 1.5 {
            p_home_scores *= 1.1;
        }
        if breakdown.home_avg_conceded >= 1.5 {
            p_away_scores *= 1.1;
        }

        p_home_scores = p_home_scores.clamp(0.0, 0.9);
        p_away_scores = p_away_scores.clamp(0.0, 0.9);

        p_home_scores * p_away_scores * 100.0
    }
}

/// Scales the triple to sum exactly 100, assigning the rounding remainder to
/// the home value (deliberate tie-break so the invariant holds exactly).
fn normalize(home: f64, draw: f64, away: f64) -> Result<OutcomeDistribution, PredictionError> {
    let sum = home + draw + away;
    if !sum.is_finite() || sum <= 0.0 {
        return Err(PredictionError::InvalidDistribution { sum });
    }

    let scale = 100.0 / sum;
    let draw = draw * scale;
    let away = away * scale;
    let home = 100.0 - draw - away;

    let check = home + draw + away;
    if !home.is_finite() || home < 0.0 || (check - 100.0).abs() > 1e-6 {
        return Err(PredictionError::InvalidDistribution { sum: check });
    }

    Ok(OutcomeDistribution { home, draw, away })
}

/// Poisson tail P(total goals > 2) at λ = total expected goals, in percent.
fn over_25_probability(lambda: f64) -> Result<f64, PredictionError> {
    let dist = Poisson::new(lambda.max(0.05))
        .map_err(|e| PredictionError::Internal(anyhow::anyhow!(e)))?;
    Ok((1.0 - dist.cdf(2)) * 100.0)
}

/// Independent Poisson grid over 0..=5 goals per side; returns the modal
/// scoreline and the five most likely ones.
fn score_grid(
    xg_home: f64,
    xg_away: f64,
) -> Result<((u32, u32), Vec<ScorelineProbability>), PredictionError> {
    let home_dist = Poisson::new(xg_home.max(0.05))
        .map_err(|e| PredictionError::Internal(anyhow::anyhow!(e)))?;
    let away_dist = Poisson::new(xg_away.max(0.05))
        .map_err(|e| PredictionError::Internal(anyhow::anyhow!(e)))?;

    let mut grid = Vec::with_capacity(((SCORE_GRID_MAX + 1) * (SCORE_GRID_MAX + 1)) as usize);
    for h in 0..=SCORE_GRID_MAX {
        for a in 0..=SCORE_GRID_MAX {
            grid.push(ScorelineProbability {
                home_goals: h,
                away_goals: a,
                probability: home_dist.pmf(h as u64) * away_dist.pmf(a as u64) * 100.0,
            });
        }
    }

    grid.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    grid.truncate(5);

    let predicted = (grid[0].home_goals, grid[0].away_goals);
    Ok((predicted, grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scoring::{AdjustmentTriple, FactorBreakdown};

    fn neutral_breakdown() -> FactorBreakdown {
        FactorBreakdown {
            form: AdjustmentTriple::ZERO,
            head_to_head: AdjustmentTriple::ZERO,
            injuries: AdjustmentTriple::ZERO,
            home_advantage: AdjustmentTriple::ZERO,
            motivation: AdjustmentTriple::ZERO,
            expected_goals_home: 1.375,
            expected_goals_away: 1.125,
            home_avg_conceded: 1.25,
            away_avg_conceded: 1.25,
            flags: Vec::new(),
        }
    }

    #[test]
    fn probabilities_sum_to_one_hundred() {
        let agg = Aggregator::new(EngineConfig::default());
        let mut breakdown = neutral_breakdown();
        breakdown.form = AdjustmentTriple::from_signed_delta(7.3);
        breakdown.home_advantage = AdjustmentTriple::from_signed_delta(15.0);
        breakdown.injuries = AdjustmentTriple::from_signed_delta(-2.1);

        let markets = agg.aggregate(&breakdown, None).unwrap();
        let sum = markets.outcome.home + markets.outcome.draw + markets.outcome.away;
        assert!((sum - 100.0).abs() < 1e-6);
    }

    #[test]
    fn home_advantage_only_matches_documented_baseline() {
        let agg = Aggregator::new(EngineConfig::default());
        let mut breakdown = neutral_breakdown();
        breakdown.home_advantage = AdjustmentTriple::from_signed_delta(15.0);

        let markets = agg.aggregate(&breakdown, None).unwrap();
        assert!((markets.outcome.home - 48.33).abs() < 1e-6);
        assert!((markets.outcome.draw - 27.33).abs() < 1e-6);
        assert!((markets.outcome.away - 24.34).abs() < 1e-6);
    }

    #[test]
    fn over_25_exceeds_fifty_percent_at_high_expected_goals() {
        let agg = Aggregator::new(EngineConfig::default());
        let mut breakdown = neutral_breakdown();
        breakdown.expected_goals_home = 2.0;
        breakdown.expected_goals_away = 1.5;

        let markets = agg.aggregate(&breakdown, None).unwrap();
        assert!(markets.over_25 > 50.0);
    }

    #[test]
    fn low_expected_goals_keep_over_25_below_fifty() {
        let agg = Aggregator::new(EngineConfig::default());
        let mut breakdown = neutral_breakdown();
        breakdown.expected_goals_home = 0.9;
        breakdown.expected_goals_away = 0.7;

        let markets = agg.aggregate(&breakdown, None).unwrap();
        assert!(markets.over_25 < 50.0);
    }

    #[test]
    fn baseline_blend_pulls_toward_external_prediction() {
        let agg = Aggregator::new(EngineConfig::default());
        let breakdown = neutral_breakdown();

        let internal_only = agg.aggregate(&breakdown, None).unwrap();
        let external = BaselineExternalPrediction {
            source: "thirdparty".into(),
            home_pct: 70.0,
            draw_pct: 20.0,
            away_pct: 10.0,
            over25_pct: None,
            btts_pct: None,
        };
        let blended = agg.aggregate(&breakdown, Some(&external)).unwrap();

        assert!(blended.outcome.home > internal_only.outcome.home);
        assert!(blended.outcome.home < external.home_pct);
        let sum = blended.outcome.home + blended.outcome.draw + blended.outcome.away;
        assert!((sum - 100.0).abs() < 1e-6);
    }

    #[test]
    fn modal_scoreline_tracks_expected_goals() {
        let agg = Aggregator::new(EngineConfig::default());
        let mut breakdown = neutral_breakdown();
        breakdown.expected_goals_home = 2.2;
        breakdown.expected_goals_away = 0.6;

        let markets = agg.aggregate(&breakdown, None).unwrap();
        assert_eq!(markets.top_scorelines.len(), 5);
        assert!(markets.predicted_score.0 >= markets.predicted_score.1);
        let top = &markets.top_scorelines[0];
        assert_eq!(
            (top.home_goals, top.away_goals),
            markets.predicted_score
        );
    }

    #[test]
    fn btts_is_bounded_even_for_extreme_attacks() {
        let agg = Aggregator::new(EngineConfig::default());
        let mut breakdown = neutral_breakdown();
        breakdown.expected_goals_home = 6.0;
        breakdown.expected_goals_away = 6.0;
        breakdown.home_avg_conceded = 3.0;
        breakdown.away_avg_conceded = 3.0;

        let markets = agg.aggregate(&breakdown, None).unwrap();
        assert!(markets.btts <= 81.0 + 1e-9); // 0.9 * 0.9
    }
}

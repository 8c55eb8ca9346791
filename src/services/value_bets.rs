use crate::config::EngineConfig;
use crate::models::{BetMarket, ConfidenceLevel, ValueBet};
use crate::services::aggregate::ScoredMarkets;

/// Scans the final probabilities against static thresholds and emits
/// recommended-bet records with a capped, conservative stake size.
pub struct ValueBetDetector {
    config: EngineConfig,
}

impl ValueBetDetector {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, markets: &ScoredMarkets) -> Vec<ValueBet> {
        let mut bets = Vec::new();

        // Win market: flag the strongest single outcome when it clears the
        // medium threshold; tier upgrades at the high threshold.
        let outcomes = [
            ("home", markets.outcome.home),
            ("draw", markets.outcome.draw),
            ("away", markets.outcome.away),
        ];
        if let Some((selection, probability)) = outcomes
            .iter()
            .copied()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        {
            if probability >= self.config.win_flag_medium {
                let tier = if probability >= self.config.win_flag_high {
                    ConfidenceLevel::High
                } else {
                    ConfidenceLevel::Medium
                };
                bets.push(self.bet(BetMarket::MatchWinner, selection, probability, tier));
            }
        }

        // Goal markets are symmetric: a strong side is flagged directly; a
        // weak side flags its complement.
        self.flag_symmetric(
            &mut bets,
            BetMarket::OverUnder25,
            "over_2.5",
            "under_2.5",
            markets.over_25,
        );
        self.flag_symmetric(
            &mut bets,
            BetMarket::BothTeamsToScore,
            "btts_yes",
            "btts_no",
            markets.btts,
        );

        bets
    }

    fn flag_symmetric(
        &self,
        bets: &mut Vec<ValueBet>,
        market: BetMarket,
        direct: &str,
        complement: &str,
        probability: f64,
    ) {
        let threshold = self.config.goal_market_flag;
        if probability >= threshold {
            bets.push(self.bet(market, direct, probability, ConfidenceLevel::High));
        } else if probability <= 100.0 - threshold {
            bets.push(self.bet(market, complement, 100.0 - probability, ConfidenceLevel::High));
        }
    }

    fn bet(
        &self,
        market: BetMarket,
        selection: &str,
        probability: f64,
        tier: ConfidenceLevel,
    ) -> ValueBet {
        ValueBet {
            market,
            selection: selection.to_string(),
            probability,
            confidence_tier: tier,
            suggested_stake: suggested_stake(probability),
        }
    }
}

/// Capped Kelly-like sizing: 0.5 units at ≤50% rising linearly to 3.0 units
/// at 100%. Probabilities at or below 50 always get the floor stake — there
/// is deliberately no negative "bet against" stake.
pub fn suggested_stake(probability: f64) -> f64 {
    if probability <= 50.0 {
        return 0.5;
    }
    (0.5 + ((probability - 50.0) / 50.0) * 2.5).clamp(0.5, 3.0)
}

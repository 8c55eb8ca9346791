use crate::models::{ConfidenceLevel, RiskLevel};
use crate::services::aggregate::OutcomeDistribution;
use crate::services::scoring::FactorFlag;

/// Number of independent factor sources fetched per fixture.
pub const SOURCE_COUNT: u32 = 5;

/// Confidence haircut applied when fewer than 80% of sources responded.
const INCOMPLETE_DATA_SCALE: f64 = 0.8;

#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub risk_assessment: RiskLevel,
    pub data_completeness: f64,
}

/// Deterministic function of the final distribution, source availability and
/// factor flags. No hidden state.
pub fn classify(
    outcome: &OutcomeDistribution,
    available_sources: u32,
    flags: &[FactorFlag],
) -> Classification {
    let data_completeness = available_sources.min(SOURCE_COUNT) as f64 / SOURCE_COUNT as f64 * 100.0;

    let mut confidence = outcome.max();
    if data_completeness < 80.0 {
        confidence *= INCOMPLETE_DATA_SCALE;
    }
    let confidence = confidence.clamp(0.0, 100.0);

    let confidence_level = if confidence >= 65.0 && data_completeness >= 80.0 {
        ConfidenceLevel::High
    } else if confidence >= 50.0 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    let has_injury_flags = !flags.is_empty();
    let risk_assessment = if confidence < 45.0 || has_injury_flags {
        RiskLevel::High
    } else if confidence >= 65.0 {
        RiskLevel::Low
    } else {
        RiskLevel::Medium
    };

    Classification {
        confidence,
        confidence_level,
        risk_assessment,
        data_completeness,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;

    fn dist(home: f64, draw: f64, away: f64) -> OutcomeDistribution {
        OutcomeDistribution { home, draw, away }
    }

    #[test]
    fn completeness_is_the_available_share_of_sources() {
        let c = classify(&dist(40.0, 30.0, 30.0), 4, &[]);
        assert!((c.data_completeness - 80.0).abs() < 1e-9);

        let c = classify(&dist(40.0, 30.0, 30.0), 0, &[]);
        assert!((c.data_completeness - 0.0).abs() < 1e-9);
    }

    #[test]
    fn missing_sources_scale_confidence_down() {
        let full = classify(&dist(70.0, 18.0, 12.0), 5, &[]);
        let partial = classify(&dist(70.0, 18.0, 12.0), 3, &[]);
        assert!((full.confidence - 70.0).abs() < 1e-9);
        assert!((partial.confidence - 70.0 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn high_tier_needs_both_confidence_and_completeness() {
        let c = classify(&dist(70.0, 18.0, 12.0), 5, &[]);
        assert_eq!(c.confidence_level, ConfidenceLevel::High);
        assert_eq!(c.risk_assessment, RiskLevel::Low);

        // Same distribution but with a stale source: 70 * 0.8 = 56 -> medium.
        let c = classify(&dist(70.0, 18.0, 12.0), 3, &[]);
        assert_eq!(c.confidence_level, ConfidenceLevel::Medium);
    }

    #[test]
    fn low_confidence_or_injury_flags_mean_high_risk() {
        let c = classify(&dist(40.0, 32.0, 28.0), 5, &[]);
        assert_eq!(c.confidence_level, ConfidenceLevel::Low);
        assert_eq!(c.risk_assessment, RiskLevel::High);

        let flagged = classify(
            &dist(70.0, 18.0, 12.0),
            5,
            &[FactorFlag::DefensiveCrisis(Side::Away)],
        );
        assert_eq!(flagged.risk_assessment, RiskLevel::High);
    }
}

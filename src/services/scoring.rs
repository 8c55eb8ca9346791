use crate::config::EngineConfig;
use crate::models::{
    HeadToHeadRecord, InjurySuspensionReport, Side, StandingsContext, TeamFormSnapshot,
};

/// Signed adjustment to the outcome triple, in probability points.
/// Every adjustment is distributed zero-sum so the running triple keeps its
/// 100-point total until normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentTriple {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl AdjustmentTriple {
    pub const ZERO: AdjustmentTriple = AdjustmentTriple { home: 0.0, draw: 0.0, away: 0.0 };

    /// Distributes a signed delta: the favored side gains the full delta,
    /// the draw gives up 40% of it and the other side 60%.
    pub fn from_signed_delta(delta: f64) -> Self {
        if delta >= 0.0 {
            Self { home: delta, draw: -0.4 * delta, away: -0.6 * delta }
        } else {
            let d = -delta;
            Self { home: -0.6 * d, draw: -0.4 * d, away: d }
        }
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }
}

impl std::ops::Add for AdjustmentTriple {
    type Output = AdjustmentTriple;

    fn add(self, rhs: AdjustmentTriple) -> AdjustmentTriple {
        AdjustmentTriple {
            home: self.home + rhs.home,
            draw: self.draw + rhs.draw,
            away: self.away + rhs.away,
        }
    }
}

/// Qualitative findings the risk classifier consumes alongside the numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorFlag {
    DefensiveCrisis(Side),
    SignificantInjuries(Side),
}

/// Everything the scorer feeds the aggregator: one adjustment per factor
/// category, the expected-goals estimate, and risk flags.
#[derive(Debug, Clone)]
pub struct FactorBreakdown {
    pub form: AdjustmentTriple,
    pub head_to_head: AdjustmentTriple,
    pub injuries: AdjustmentTriple,
    pub home_advantage: AdjustmentTriple,
    pub motivation: AdjustmentTriple,
    pub expected_goals_home: f64,
    pub expected_goals_away: f64,
    /// Conceding averages carried through for the BTTS scaling rule.
    pub home_avg_conceded: f64,
    pub away_avg_conceded: f64,
    pub flags: Vec<FactorFlag>,
}

impl FactorBreakdown {
    pub fn total(&self) -> AdjustmentTriple {
        self.form + self.head_to_head + self.injuries + self.home_advantage + self.motivation
    }
}

/// Inputs assembled by the orchestrator from the five metric fetches.
pub struct FactorInputs<'a> {
    pub home_form: &'a TeamFormSnapshot,
    pub away_form: &'a TeamFormSnapshot,
    pub head_to_head: &'a HeadToHeadRecord,
    pub home_injuries: &'a InjurySuspensionReport,
    pub away_injuries: &'a InjurySuspensionReport,
    pub home_standings: &'a StandingsContext,
    pub away_standings: &'a StandingsContext,
}

/// Translates raw factor entities into weighted probability adjustments.
/// Pure: no I/O, no state beyond the configured constants.
pub struct FactorScorer {
    config: EngineConfig,
}

impl FactorScorer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, inputs: &FactorInputs<'_>) -> FactorBreakdown {
        let (form, xg_home, xg_away) = self.score_form(inputs.home_form, inputs.away_form);
        let head_to_head = self.score_head_to_head(inputs.head_to_head);
        let (injuries, flags) = self.score_injuries(inputs.home_injuries, inputs.away_injuries);
        let home_advantage = self.score_home_advantage(inputs.home_form);
        let motivation = self.score_motivation(inputs.home_standings, inputs.away_standings);

        FactorBreakdown {
            form,
            head_to_head,
            injuries,
            home_advantage,
            motivation,
            expected_goals_home: xg_home,
            expected_goals_away: xg_away,
            home_avg_conceded: inputs.home_form.avg_goals_conceded,
            away_avg_conceded: inputs.away_form.avg_goals_conceded,
            flags,
        }
    }

    /// Form-rating gap, clamped to ±30 raw points, then category-weighted.
    /// Expected goals per side blend own scoring with the opponent's
    /// conceding (0.6/0.4), boosted 1.1x at home and damped 0.9x away.
    fn score_form(
        &self,
        home: &TeamFormSnapshot,
        away: &TeamFormSnapshot,
    ) -> (AdjustmentTriple, f64, f64) {
        let raw = (self.config.form_scale * (home.form_rating - away.form_rating))
            .clamp(-30.0, 30.0);
        let triple = AdjustmentTriple::from_signed_delta(raw * self.config.weights.form);

        let xg_home = (0.6 * home.avg_goals_scored + 0.4 * away.avg_goals_conceded) * 1.1;
        let xg_away = (0.6 * away.avg_goals_scored + 0.4 * home.avg_goals_conceded) * 0.9;

        (triple, xg_home, xg_away)
    }

    /// Historical win-rate edge, ramped down for thin histories and zeroed
    /// entirely below 3 meetings. When ≥2 of the last 3 meetings went the
    /// same way, that side's edge is amplified 20%.
    fn score_head_to_head(&self, h2h: &HeadToHeadRecord) -> AdjustmentTriple {
        if h2h.total_matches < 3 {
            return AdjustmentTriple::ZERO;
        }

        let total = h2h.total_matches as f64;
        let home_edge = (h2h.home_wins as f64 / total - 1.0 / 3.0) * 20.0;
        let away_edge = (h2h.away_wins as f64 / total - 1.0 / 3.0) * 20.0;
        let ramp = (h2h.total_matches.min(HeadToHeadRecord::MAX_MEETINGS as u32) as f64)
            / HeadToHeadRecord::MAX_MEETINGS as f64;

        let mut net = (home_edge - away_edge) * ramp;

        let recent_home = h2h
            .recent_meetings
            .iter()
            .filter(|w| **w == Some(Side::Home))
            .count();
        let recent_away = h2h
            .recent_meetings
            .iter()
            .filter(|w| **w == Some(Side::Away))
            .count();
        if (net > 0.0 && recent_home >= 2) || (net < 0.0 && recent_away >= 2) {
            net *= 1.2;
        }

        AdjustmentTriple::from_signed_delta(net * self.config.weights.head_to_head)
    }

    /// Impact-rating difference plus flat penalties for a missing top
    /// scorer, missing first-choice keeper, or a defensive crisis.
    fn score_injuries(
        &self,
        home: &InjurySuspensionReport,
        away: &InjurySuspensionReport,
    ) -> (AdjustmentTriple, Vec<FactorFlag>) {
        let mut net = 1.5 * (away.impact_rating - home.impact_rating);
        net += Self::flat_penalty(home) * -1.0 + Self::flat_penalty(away);

        let mut flags = Vec::new();
        for (report, side) in [(home, Side::Home), (away, Side::Away)] {
            if report.defensive_crisis() {
                flags.push(FactorFlag::DefensiveCrisis(side));
            }
            if report.impact_rating >= 6.0 {
                flags.push(FactorFlag::SignificantInjuries(side));
            }
        }

        (
            AdjustmentTriple::from_signed_delta(net * self.config.weights.injuries),
            flags,
        )
    }

    fn flat_penalty(report: &InjurySuspensionReport) -> f64 {
        let mut penalty = 0.0;
        if report.missing_top_scorer() {
            penalty += 3.0;
        }
        if report.missing_first_choice_keeper() {
            penalty += 3.0;
        }
        if report.defensive_crisis() {
            penalty += 4.0;
        }
        penalty
    }

    /// Fixed home boost, scaled by how the home side actually performs at
    /// its own ground (0.7x for a winless home record up to 1.3x for a
    /// perfect one; 1.0x with no home sample).
    fn score_home_advantage(&self, home_form: &TeamFormSnapshot) -> AdjustmentTriple {
        let scale = home_form
            .home_venue_win_rate()
            .map(|rate| (0.7 + 0.6 * rate).clamp(0.7, 1.3))
            .unwrap_or(1.0);

        AdjustmentTriple::from_signed_delta(self.config.home_advantage_base * scale)
    }

    /// Motivation-level difference plus flat bonuses for asymmetric stakes:
    /// one side fighting relegation, or one side chasing the title against
    /// mid-table opposition.
    fn score_motivation(
        &self,
        home: &StandingsContext,
        away: &StandingsContext,
    ) -> AdjustmentTriple {
        let mut net = 1.5 * (home.motivation_level - away.motivation_level);

        if home.in_relegation_battle && !away.in_relegation_battle {
            net += 4.0;
        } else if away.in_relegation_battle && !home.in_relegation_battle {
            net -= 4.0;
        }

        if home.in_title_race && away.mid_table() {
            net += 3.0;
        } else if away.in_title_race && home.mid_table() {
            net -= 3.0;
        }

        AdjustmentTriple::from_signed_delta(net * self.config.weights.motivation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{H2hMeeting, MatchOutcome, MissingPlayer, PlayerPosition, RecentResult};
    use chrono::Utc;

    fn scorer() -> FactorScorer {
        FactorScorer::new(EngineConfig::default())
    }

    fn form_with_rating(rating_points: u32) -> TeamFormSnapshot {
        // Build last-5 results that produce rating_points of 15.
        let mut results = Vec::new();
        let mut remaining = rating_points;
        for _ in 0..5 {
            let outcome = if remaining >= 3 {
                remaining -= 3;
                MatchOutcome::Win
            } else if remaining >= 1 {
                remaining -= 1;
                MatchOutcome::Draw
            } else {
                MatchOutcome::Loss
            };
            results.push(RecentResult {
                outcome,
                goals_for: if outcome == MatchOutcome::Loss { 0 } else { 2 },
                goals_against: if outcome == MatchOutcome::Win { 0 } else { 1 },
                home: false,
                date: Utc::now(),
            });
        }
        TeamFormSnapshot::from_results("t", "T", results)
    }

    #[test]
    fn adjustments_are_zero_sum() {
        for delta in [-17.5, -1.0, 0.0, 4.2, 30.0] {
            assert!(AdjustmentTriple::from_signed_delta(delta).sum().abs() < 1e-9);
        }
    }

    #[test]
    fn form_delta_is_clamped() {
        let s = scorer();
        let strong = form_with_rating(15); // 10.0
        let hopeless = TeamFormSnapshot::from_results(
            "t",
            "T",
            (0..5)
                .map(|_| RecentResult {
                    outcome: MatchOutcome::Loss,
                    goals_for: 0,
                    goals_against: 3,
                    home: false,
                    date: Utc::now(),
                })
                .collect(),
        ); // 0.0
        let (triple, _, _) = s.score_form(&strong, &hopeless);
        // raw 3.0 * 10 = 30 (clamp boundary), weighted by 0.40
        assert!((triple.home - 12.0).abs() < 1e-9);
    }

    #[test]
    fn expected_goals_blend_scoring_and_conceding() {
        let s = scorer();
        let home = TeamFormSnapshot {
            avg_goals_scored: 2.0,
            avg_goals_conceded: 1.0,
            ..TeamFormSnapshot::unavailable("h", "H")
        };
        let away = TeamFormSnapshot {
            avg_goals_scored: 1.0,
            avg_goals_conceded: 2.0,
            ..TeamFormSnapshot::unavailable("a", "A")
        };
        let (_, xg_home, xg_away) = s.score_form(&home, &away);
        assert!((xg_home - (0.6 * 2.0 + 0.4 * 2.0) * 1.1).abs() < 1e-9);
        assert!((xg_away - (0.6 * 1.0 + 0.4 * 1.0) * 0.9).abs() < 1e-9);
    }

    #[test]
    fn h2h_below_three_meetings_contributes_nothing() {
        let s = scorer();
        let thin = HeadToHeadRecord::from_meetings(vec![
            H2hMeeting { home_team_goals: 5, away_team_goals: 0, date: Utc::now() },
            H2hMeeting { home_team_goals: 4, away_team_goals: 0, date: Utc::now() },
        ]);
        assert_eq!(s.score_head_to_head(&thin), AdjustmentTriple::ZERO);
    }

    #[test]
    fn h2h_recent_bias_amplifies_the_streaking_side() {
        let s = scorer();
        // 6 home wins, 2 away wins, 2 draws; last three all home wins.
        let mut meetings: Vec<H2hMeeting> = (0..3)
            .map(|_| H2hMeeting { home_team_goals: 2, away_team_goals: 0, date: Utc::now() })
            .collect();
        meetings.extend((0..3).map(|i| H2hMeeting {
            home_team_goals: if i == 0 { 2 } else { 0 },
            away_team_goals: if i == 0 { 0 } else if i == 1 { 1 } else { 0 },
            date: Utc::now(),
        }));
        meetings.extend((0..4).map(|i| H2hMeeting {
            home_team_goals: if i < 2 { 3 } else { 1 },
            away_team_goals: if i < 2 { 1 } else if i == 2 { 2 } else { 1 },
            date: Utc::now(),
        }));
        let rec = HeadToHeadRecord::from_meetings(meetings);
        assert_eq!(rec.total_matches, 10);

        let biased = s.score_head_to_head(&rec);
        let mut unbiased_rec = rec.clone();
        unbiased_rec.recent_meetings = vec![Some(Side::Home), None, Some(Side::Away)];
        let unbiased = s.score_head_to_head(&unbiased_rec);
        assert!((biased.home - unbiased.home * 1.2).abs() < 1e-9);
    }

    #[test]
    fn injury_difference_penalizes_the_depleted_side() {
        let s = scorer();
        let defender = |name: &str| MissingPlayer {
            name: name.into(),
            position: PlayerPosition::Defender,
            reason: "injury".into(),
            return_date: None,
            is_top_scorer: false,
            is_first_choice_keeper: false,
        };
        let home = InjurySuspensionReport::from_missing("h", vec![defender("A"), defender("B")]);
        let away = InjurySuspensionReport::empty("a");

        let (triple, flags) = s.score_injuries(&home, &away);
        assert!(triple.home < 0.0);
        assert!(triple.away > 0.0);
        assert!(flags.contains(&FactorFlag::DefensiveCrisis(Side::Home)));
    }

    #[test]
    fn home_advantage_scales_with_home_venue_form() {
        let s = scorer();
        let no_sample = TeamFormSnapshot::unavailable("h", "H");
        let neutral = s.score_home_advantage(&no_sample);
        assert!((neutral.home - 15.0).abs() < 1e-9);

        let perfect_home = TeamFormSnapshot::from_results(
            "h",
            "H",
            (0..4)
                .map(|_| RecentResult {
                    outcome: MatchOutcome::Win,
                    goals_for: 2,
                    goals_against: 0,
                    home: true,
                    date: Utc::now(),
                })
                .collect(),
        );
        let boosted = s.score_home_advantage(&perfect_home);
        assert!((boosted.home - 15.0 * 1.3).abs() < 1e-9);
    }

    #[test]
    fn relegation_asymmetry_adds_flat_motivation_bonus() {
        let s = scorer();
        let battling = StandingsContext::from_table_row("h", 18, 20, 60, 19, 20);
        let cruising = StandingsContext::from_table_row("a", 10, 38, 60, 19, 20);
        assert!(battling.in_relegation_battle);
        assert!(cruising.mid_table());

        let triple = s.score_motivation(&battling, &cruising);
        // motivation gap 3.0 * 1.5 + flat 4.0 = 8.5, weighted by 0.10
        assert!((triple.home - 0.85).abs() < 1e-9);
    }
}

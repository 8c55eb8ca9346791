use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Reference data ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub league: String,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub id: String,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_team_name: String,
    pub away_team_name: String,
    pub league: String,
    pub kickoff: DateTime<Utc>,
    pub status: String, // "scheduled", "live", "finished"
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Win,
    Draw,
    Loss,
}

impl MatchOutcome {
    pub fn from_goals(goals_for: u32, goals_against: u32) -> Self {
        match goals_for.cmp(&goals_against) {
            std::cmp::Ordering::Greater => MatchOutcome::Win,
            std::cmp::Ordering::Equal => MatchOutcome::Draw,
            std::cmp::Ordering::Less => MatchOutcome::Loss,
        }
    }

    pub fn points(&self) -> u32 {
        match self {
            MatchOutcome::Win => 3,
            MatchOutcome::Draw => 1,
            MatchOutcome::Loss => 0,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            MatchOutcome::Win => 'W',
            MatchOutcome::Draw => 'D',
            MatchOutcome::Loss => 'L',
        }
    }
}

/// One finished match from a team's perspective, most recent first in lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentResult {
    pub outcome: MatchOutcome,
    pub goals_for: u32,
    pub goals_against: u32,
    pub home: bool,
    pub date: DateTime<Utc>,
}

// ── Factor entities ──────────────────────────────────────────────────────────

/// A team's recent form, derived entirely from its last results. Every
/// numeric field is recomputed from `last_results`; none is stored or
/// overwritten independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamFormSnapshot {
    pub team_id: String,
    pub team_name: String,
    /// Up to 10 most recent results, most recent first.
    pub last_results: Vec<RecentResult>,
    /// Points earned over the last 5 results, scaled to [0, 10].
    pub form_rating: f64,
    pub avg_goals_scored: f64,
    pub avg_goals_conceded: f64,
    pub clean_sheet_rate: f64,
    pub btts_rate: f64,
    /// e.g. "W3" — leading run of identical outcomes.
    pub current_streak: String,
}

impl TeamFormSnapshot {
    pub const MAX_RESULTS: usize = 10;

    pub fn from_results(team_id: &str, team_name: &str, mut results: Vec<RecentResult>) -> Self {
        results.truncate(Self::MAX_RESULTS);

        let n = results.len() as f64;
        let form_rating = {
            let last5 = &results[..results.len().min(5)];
            if last5.is_empty() {
                5.0
            } else {
                let points: u32 = last5.iter().map(|r| r.outcome.points()).sum();
                points as f64 / (last5.len() as f64 * 3.0) * 10.0
            }
        };

        let (avg_goals_scored, avg_goals_conceded, clean_sheet_rate, btts_rate) =
            if results.is_empty() {
                // Neutral league-average placeholders for teams with no sample.
                (1.25, 1.25, 0.3, 0.5)
            } else {
                let scored: u32 = results.iter().map(|r| r.goals_for).sum();
                let conceded: u32 = results.iter().map(|r| r.goals_against).sum();
                let clean = results.iter().filter(|r| r.goals_against == 0).count();
                let btts = results
                    .iter()
                    .filter(|r| r.goals_for > 0 && r.goals_against > 0)
                    .count();
                (
                    scored as f64 / n,
                    conceded as f64 / n,
                    clean as f64 / n,
                    btts as f64 / n,
                )
            };

        let current_streak = match results.first() {
            None => String::new(),
            Some(first) => {
                let run = results
                    .iter()
                    .take_while(|r| r.outcome == first.outcome)
                    .count();
                format!("{}{}", first.outcome.letter(), run)
            }
        };

        Self {
            team_id: team_id.to_string(),
            team_name: team_name.to_string(),
            last_results: results,
            form_rating,
            avg_goals_scored,
            avg_goals_conceded,
            clean_sheet_rate,
            btts_rate,
            current_streak,
        }
    }

    /// Neutral snapshot used when the results source is unavailable.
    pub fn unavailable(team_id: &str, team_name: &str) -> Self {
        Self::from_results(team_id, team_name, Vec::new())
    }

    /// Win rate in home-venue results only; `None` when there is no sample.
    pub fn home_venue_win_rate(&self) -> Option<f64> {
        let home: Vec<_> = self.last_results.iter().filter(|r| r.home).collect();
        if home.is_empty() {
            return None;
        }
        let wins = home
            .iter()
            .filter(|r| r.outcome == MatchOutcome::Win)
            .count();
        Some(wins as f64 / home.len() as f64)
    }
}

/// One prior meeting between the two teams of the current fixture, with
/// goals oriented to the fixture's home team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct H2hMeeting {
    pub home_team_goals: u32,
    pub away_team_goals: u32,
    pub date: DateTime<Utc>,
}

impl H2hMeeting {
    pub fn winner(&self) -> Option<Side> {
        match self.home_team_goals.cmp(&self.away_team_goals) {
            std::cmp::Ordering::Greater => Some(Side::Home),
            std::cmp::Ordering::Less => Some(Side::Away),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Head-to-head history between the fixture's two teams, wins attributed to
/// the current fixture's home side. Invariant:
/// `home_wins + away_wins + draws == total_matches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadToHeadRecord {
    pub total_matches: u32,
    pub home_wins: u32,
    pub away_wins: u32,
    pub draws: u32,
    pub avg_total_goals: f64,
    pub btts_pct: f64,
    pub over25_pct: f64,
    /// Winners of up to the last 3 meetings, most recent first (None = draw).
    pub recent_meetings: Vec<Option<Side>>,
    /// Set when one side's win share exceeds the other's by ≥50% relative.
    pub dominant_team: Option<Side>,
}

impl HeadToHeadRecord {
    pub const MAX_MEETINGS: usize = 10;

    /// Builds the record from prior meetings, most recent first.
    pub fn from_meetings(mut meetings: Vec<H2hMeeting>) -> Self {
        meetings.truncate(Self::MAX_MEETINGS);

        let total = meetings.len() as u32;
        let mut home_wins = 0u32;
        let mut away_wins = 0u32;
        let mut draws = 0u32;
        let mut btts = 0u32;
        let mut over25 = 0u32;
        let mut goals = 0u32;

        for m in &meetings {
            match m.winner() {
                Some(Side::Home) => home_wins += 1,
                Some(Side::Away) => away_wins += 1,
                None => draws += 1,
            }
            if m.home_team_goals > 0 && m.away_team_goals > 0 {
                btts += 1;
            }
            let sum = m.home_team_goals + m.away_team_goals;
            if sum > 2 {
                over25 += 1;
            }
            goals += sum;
        }

        let dominant_team = if home_wins as f64 >= away_wins as f64 * 1.5 && home_wins > away_wins
        {
            Some(Side::Home)
        } else if away_wins as f64 >= home_wins as f64 * 1.5 && away_wins > home_wins {
            Some(Side::Away)
        } else {
            None
        };

        let recent_meetings = meetings.iter().take(3).map(|m| m.winner()).collect();

        Self {
            total_matches: total,
            home_wins,
            away_wins,
            draws,
            avg_total_goals: if total == 0 {
                0.0
            } else {
                goals as f64 / total as f64
            },
            btts_pct: pct(btts, total),
            over25_pct: pct(over25, total),
            recent_meetings,
            dominant_team,
        }
    }

    pub fn empty() -> Self {
        Self::from_meetings(Vec::new())
    }
}

fn pct(count: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerPosition {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingPlayer {
    pub name: String,
    pub position: PlayerPosition,
    pub reason: String, // "injury" or "suspension"
    pub return_date: Option<DateTime<Utc>>,
    pub is_top_scorer: bool,
    pub is_first_choice_keeper: bool,
}

/// Per-team absence report with a 0–10 impact rating: monotonically
/// increasing with the number of missing players, key players counted
/// double, plus a surcharge when the defence is short-handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjurySuspensionReport {
    pub team_id: String,
    pub missing: Vec<MissingPlayer>,
    pub impact_rating: f64,
}

impl InjurySuspensionReport {
    pub fn from_missing(team_id: &str, missing: Vec<MissingPlayer>) -> Self {
        let mut rating: f64 = 0.0;
        for p in &missing {
            rating += if p.is_top_scorer || p.is_first_choice_keeper {
                2.4
            } else {
                1.2
            };
        }
        if Self::count_defenders(&missing) >= 2 {
            rating += 1.5;
        }

        Self {
            team_id: team_id.to_string(),
            missing,
            impact_rating: rating.min(10.0),
        }
    }

    pub fn empty(team_id: &str) -> Self {
        Self::from_missing(team_id, Vec::new())
    }

    fn count_defenders(missing: &[MissingPlayer]) -> usize {
        missing
            .iter()
            .filter(|p| p.position == PlayerPosition::Defender)
            .count()
    }

    pub fn missing_top_scorer(&self) -> bool {
        self.missing.iter().any(|p| p.is_top_scorer)
    }

    pub fn missing_first_choice_keeper(&self) -> bool {
        self.missing.iter().any(|p| p.is_first_choice_keeper)
    }

    /// Two or more first-team defenders out at once.
    pub fn defensive_crisis(&self) -> bool {
        Self::count_defenders(&self.missing) >= 2
    }
}

/// League-table situation and what the team is still playing for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingsContext {
    pub team_id: String,
    pub position: u32,
    pub points: u32,
    pub points_from_top: u32,
    pub points_from_relegation_zone: u32,
    pub in_title_race: bool,
    pub in_relegation_battle: bool,
    pub in_european_race: bool,
    pub motivation_level: f64,
}

impl StandingsContext {
    /// Derives the race flags and motivation level from a raw table row.
    /// `leader_points` is the current leader's total; `safety_points` the
    /// total of the best-placed team inside the relegation zone.
    pub fn from_table_row(
        team_id: &str,
        position: u32,
        points: u32,
        leader_points: u32,
        safety_points: u32,
        total_teams: u32,
    ) -> Self {
        let points_from_top = leader_points.saturating_sub(points);
        let points_from_relegation_zone = points.saturating_sub(safety_points);

        let in_title_race = position <= 4 && points_from_top <= 6;
        let in_relegation_battle =
            position + 4 >= total_teams.max(1) || points_from_relegation_zone <= 6;
        let in_european_race = !in_title_race && !in_relegation_battle && position <= 7;

        let mut motivation: f64 = 5.0;
        if in_title_race {
            motivation += 3.0;
        }
        if in_relegation_battle {
            motivation += 3.0;
        }
        if in_european_race {
            motivation += 1.5;
        }

        Self {
            team_id: team_id.to_string(),
            position,
            points,
            points_from_top,
            points_from_relegation_zone,
            in_title_race,
            in_relegation_battle,
            in_european_race,
            motivation_level: motivation.min(10.0),
        }
    }

    /// Neutral context used when the standings source is unavailable.
    pub fn unavailable(team_id: &str) -> Self {
        Self {
            team_id: team_id.to_string(),
            position: 0,
            points: 0,
            points_from_top: 0,
            points_from_relegation_zone: 0,
            in_title_race: false,
            in_relegation_battle: false,
            in_european_race: false,
            motivation_level: 5.0,
        }
    }

    pub fn mid_table(&self) -> bool {
        !self.in_title_race && !self.in_relegation_battle && !self.in_european_race
    }
}

/// Third-party probabilities, blended in at a fixed ratio. Never the sole
/// source of truth. All probabilities in percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineExternalPrediction {
    pub source: String,
    pub home_pct: f64,
    pub draw_pct: f64,
    pub away_pct: f64,
    pub over25_pct: Option<f64>,
    pub btts_pct: Option<f64>,
}

// ── Prediction output ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetMarket {
    MatchWinner,
    OverUnder25,
    BothTeamsToScore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueBet {
    pub market: BetMarket,
    pub selection: String,
    pub probability: f64,
    pub confidence_tier: ConfidenceLevel,
    /// Stake units from the capped Kelly-like sizing rule, in [0.5, 3.0].
    pub suggested_stake: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorelineProbability {
    pub home_goals: u32,
    pub away_goals: u32,
    pub probability: f64,
}

/// Final prediction for one fixture. Immutable once built: the pipeline is a
/// pure function of its inputs and nothing mutates the result afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub fixture_id: String,
    pub home_team: String,
    pub away_team: String,
    /// Percentages; the three always sum to 100 within 1e-6.
    pub home_win_probability: f64,
    pub draw_probability: f64,
    pub away_win_probability: f64,
    pub predicted_score: (u32, u32),
    pub top_scorelines: Vec<ScorelineProbability>,
    pub expected_goals_home: f64,
    pub expected_goals_away: f64,
    pub over_25_probability: f64,
    pub btts_probability: f64,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub risk_assessment: RiskLevel,
    /// Share of the five factor sources actually retrieved, in percent.
    pub data_completeness: f64,
    pub value_bets: Vec<ValueBet>,
    pub generated_at: DateTime<Utc>,
}

// ── API envelope ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(outcome: MatchOutcome, gf: u32, ga: u32, home: bool) -> RecentResult {
        RecentResult {
            outcome,
            goals_for: gf,
            goals_against: ga,
            home,
            date: Utc::now(),
        }
    }

    #[test]
    fn form_rating_derives_from_last_five_results() {
        // W W D L W over the last 5 = 10 points of 15 -> 6.67
        let results = vec![
            result(MatchOutcome::Win, 2, 0, true),
            result(MatchOutcome::Win, 3, 1, false),
            result(MatchOutcome::Draw, 1, 1, true),
            result(MatchOutcome::Loss, 0, 2, false),
            result(MatchOutcome::Win, 2, 1, true),
            // older results must not affect the rating
            result(MatchOutcome::Loss, 0, 4, false),
        ];
        let snap = TeamFormSnapshot::from_results("t1", "Testers", results);
        assert!((snap.form_rating - 10.0 / 15.0 * 10.0).abs() < 1e-9);
        assert_eq!(snap.current_streak, "W2");
    }

    #[test]
    fn empty_results_yield_neutral_snapshot() {
        let snap = TeamFormSnapshot::unavailable("t1", "Testers");
        assert!((snap.form_rating - 5.0).abs() < 1e-9);
        assert_eq!(snap.current_streak, "");
        assert_eq!(snap.home_venue_win_rate(), None);
    }

    #[test]
    fn h2h_record_counts_reconcile() {
        let meetings = vec![
            H2hMeeting { home_team_goals: 2, away_team_goals: 0, date: Utc::now() },
            H2hMeeting { home_team_goals: 1, away_team_goals: 1, date: Utc::now() },
            H2hMeeting { home_team_goals: 0, away_team_goals: 3, date: Utc::now() },
            H2hMeeting { home_team_goals: 4, away_team_goals: 2, date: Utc::now() },
        ];
        let rec = HeadToHeadRecord::from_meetings(meetings);
        assert_eq!(rec.total_matches, 4);
        assert_eq!(rec.home_wins + rec.away_wins + rec.draws, rec.total_matches);
        assert!((rec.avg_total_goals - 13.0 / 4.0).abs() < 1e-9);
        assert!((rec.over25_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn dominant_team_needs_fifty_percent_relative_edge() {
        let lopsided: Vec<H2hMeeting> = (0..10)
            .map(|i| H2hMeeting {
                home_team_goals: if i < 8 { 2 } else { 0 },
                away_team_goals: if i < 9 { 0 } else { 1 },
                date: Utc::now(),
            })
            .collect();
        let rec = HeadToHeadRecord::from_meetings(lopsided);
        assert_eq!(rec.home_wins, 8);
        assert_eq!(rec.away_wins, 1);
        assert_eq!(rec.draws, 1);
        assert_eq!(rec.dominant_team, Some(Side::Home));

        let even = vec![
            H2hMeeting { home_team_goals: 1, away_team_goals: 0, date: Utc::now() },
            H2hMeeting { home_team_goals: 0, away_team_goals: 1, date: Utc::now() },
        ];
        assert_eq!(HeadToHeadRecord::from_meetings(even).dominant_team, None);
    }

    #[test]
    fn injury_impact_doubles_for_key_players() {
        let squad_player = MissingPlayer {
            name: "A".into(),
            position: PlayerPosition::Midfielder,
            reason: "injury".into(),
            return_date: None,
            is_top_scorer: false,
            is_first_choice_keeper: false,
        };
        let top_scorer = MissingPlayer {
            name: "B".into(),
            position: PlayerPosition::Forward,
            is_top_scorer: true,
            ..squad_player.clone()
        };

        let base = InjurySuspensionReport::from_missing("t1", vec![squad_player]);
        let key = InjurySuspensionReport::from_missing("t1", vec![top_scorer]);
        assert!((key.impact_rating - base.impact_rating * 2.0).abs() < 1e-9);
    }

    #[test]
    fn two_missing_defenders_is_a_defensive_crisis() {
        let defender = |name: &str| MissingPlayer {
            name: name.into(),
            position: PlayerPosition::Defender,
            reason: "injury".into(),
            return_date: None,
            is_top_scorer: false,
            is_first_choice_keeper: false,
        };
        let report =
            InjurySuspensionReport::from_missing("t1", vec![defender("A"), defender("B")]);
        assert!(report.defensive_crisis());
        assert!((report.impact_rating - (1.2 * 2.0 + 1.5)).abs() < 1e-9);
    }

    #[test]
    fn standings_flags_drive_motivation() {
        let contender = StandingsContext::from_table_row("t1", 2, 55, 58, 20, 20);
        assert!(contender.in_title_race);
        assert!(contender.motivation_level > 7.0);

        let strugglers = StandingsContext::from_table_row("t2", 18, 22, 58, 20, 20);
        assert!(strugglers.in_relegation_battle);

        let comfortable = StandingsContext::from_table_row("t3", 11, 35, 58, 20, 20);
        assert!(comfortable.mid_table());
        assert!((comfortable.motivation_level - 5.0).abs() < 1e-9);
    }
}

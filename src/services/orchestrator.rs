use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;

use crate::config::EngineConfig;
use crate::error::PredictionError;
use crate::models::{Fixture, PredictionResult};
use crate::services::aggregate::Aggregator;
use crate::services::classify;
use crate::services::metrics::MetricsProvider;
use crate::services::scoring::{FactorInputs, FactorScorer};
use crate::services::value_bets::ValueBetDetector;

/// One batch entry; failed fixtures are reported, never dropped, so the
/// response length always matches the request length.
#[derive(Debug)]
pub struct BatchPrediction {
    pub fixture_id: String,
    pub result: Result<PredictionResult, PredictionError>,
}

/// Runs the full pipeline for a fixture: resolve, fan out the five factor
/// fetches concurrently, score, aggregate, classify, detect value bets.
/// Holds no per-request state; the same inputs always produce the same
/// prediction.
pub struct PredictionOrchestrator {
    metrics: MetricsProvider,
    scorer: FactorScorer,
    aggregator: Aggregator,
    detector: ValueBetDetector,
    batch_permits: Arc<Semaphore>,
}

impl PredictionOrchestrator {
    pub fn new(metrics: MetricsProvider, config: EngineConfig) -> Self {
        let batch_permits = Arc::new(Semaphore::new(config.max_concurrent_predictions));
        Self {
            metrics,
            scorer: FactorScorer::new(config.clone()),
            aggregator: Aggregator::new(config.clone()),
            detector: ValueBetDetector::new(config),
            batch_permits,
        }
    }

    pub async fn predict(&self, fixture_id: &str) -> Result<PredictionResult, PredictionError> {
        let fixture = self.metrics.resolve_fixture(fixture_id).await?;
        self.predict_fixture(&fixture).await
    }

    pub async fn predict_by_teams(
        &self,
        home_team_id: &str,
        away_team_id: &str,
    ) -> Result<PredictionResult, PredictionError> {
        let fixture = self
            .metrics
            .resolve_fixture_by_teams(home_team_id, away_team_id)
            .await?;
        self.predict_fixture(&fixture).await
    }

    async fn predict_fixture(
        &self,
        fixture: &Fixture,
    ) -> Result<PredictionResult, PredictionError> {
        // All five factor fetches run concurrently; each one degrades to its
        // default independently instead of failing the prediction.
        let (form, head_to_head, injuries, standings, baseline) = tokio::join!(
            self.metrics.form_pair(fixture),
            self.metrics.head_to_head(fixture),
            self.metrics.injury_pair(fixture),
            self.metrics.standings_pair(fixture),
            self.metrics.baseline(&fixture.id),
        );

        let available_sources = [
            form.available,
            head_to_head.available,
            injuries.available,
            standings.available,
            baseline.available,
        ]
        .iter()
        .filter(|a| **a)
        .count() as u32;

        let (home_form, away_form) = &form.value;
        let (home_injuries, away_injuries) = &injuries.value;
        let (home_standings, away_standings) = &standings.value;

        let breakdown = self.scorer.score(&FactorInputs {
            home_form,
            away_form,
            head_to_head: &head_to_head.value,
            home_injuries,
            away_injuries,
            home_standings,
            away_standings,
        });

        let markets = self
            .aggregator
            .aggregate(&breakdown, baseline.value.as_ref())?;
        let classification =
            classify::classify(&markets.outcome, available_sources, &breakdown.flags);
        let value_bets = self.detector.detect(&markets);

        tracing::info!(
            "predicted {} vs {}: {:.1}/{:.1}/{:.1} (confidence {:.1}, completeness {:.0}%)",
            fixture.home_team_name,
            fixture.away_team_name,
            markets.outcome.home,
            markets.outcome.draw,
            markets.outcome.away,
            classification.confidence,
            classification.data_completeness,
        );

        Ok(PredictionResult {
            fixture_id: fixture.id.clone(),
            home_team: fixture.home_team_name.clone(),
            away_team: fixture.away_team_name.clone(),
            home_win_probability: markets.outcome.home,
            draw_probability: markets.outcome.draw,
            away_win_probability: markets.outcome.away,
            predicted_score: markets.predicted_score,
            top_scorelines: markets.top_scorelines,
            expected_goals_home: markets.expected_goals_home,
            expected_goals_away: markets.expected_goals_away,
            over_25_probability: markets.over_25,
            btts_probability: markets.btts,
            confidence: classification.confidence,
            confidence_level: classification.confidence_level,
            risk_assessment: classification.risk_assessment,
            data_completeness: classification.data_completeness,
            value_bets,
            generated_at: Utc::now(),
        })
    }

    /// Predicts a whole slate. Fixtures run concurrently up to the configured
    /// cap; results come back in request order.
    pub async fn predict_batch(self: &Arc<Self>, fixture_ids: &[String]) -> Vec<BatchPrediction> {
        let mut handles = Vec::with_capacity(fixture_ids.len());
        for fixture_id in fixture_ids {
            let orchestrator = Arc::clone(self);
            let permits = Arc::clone(&self.batch_permits);
            let fixture_id = fixture_id.clone();
            handles.push(tokio::spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => orchestrator.predict(&fixture_id).await,
                    Err(e) => Err(PredictionError::Internal(anyhow::anyhow!(
                        "batch semaphore closed: {}",
                        e
                    ))),
                };
                BatchPrediction { fixture_id, result }
            }));
        }

        let mut predictions = Vec::with_capacity(handles.len());
        for (handle, fixture_id) in handles.into_iter().zip(fixture_ids) {
            match handle.await {
                Ok(prediction) => predictions.push(prediction),
                Err(e) => predictions.push(BatchPrediction {
                    fixture_id: fixture_id.clone(),
                    result: Err(PredictionError::Internal(anyhow::anyhow!(
                        "prediction task panicked: {}",
                        e
                    ))),
                }),
            }
        }
        predictions
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::models::{
        BaselineExternalPrediction, ConfidenceLevel, H2hMeeting, MatchOutcome, MissingPlayer,
        RecentResult, StandingsContext,
    };
    use crate::services::metrics::{
        BaselineSource, FixtureLookup, HeadToHeadSource, InjurySource, ResultsSource,
        StandingsSource,
    };

    #[derive(Default)]
    struct FakeSources {
        fixtures: Vec<Fixture>,
        results: HashMap<String, Vec<RecentResult>>,
        meetings: Vec<H2hMeeting>,
        injuries: HashMap<String, Vec<MissingPlayer>>,
        standings: HashMap<String, StandingsContext>,
        baseline: Option<BaselineExternalPrediction>,
        fail_standings: bool,
    }

    #[async_trait]
    impl FixtureLookup for FakeSources {
        async fn fixture_by_id(&self, fixture_id: &str) -> Result<Option<Fixture>> {
            Ok(self.fixtures.iter().find(|f| f.id == fixture_id).cloned())
        }

        async fn fixture_by_teams(
            &self,
            home_team_id: &str,
            away_team_id: &str,
        ) -> Result<Option<Fixture>> {
            Ok(self
                .fixtures
                .iter()
                .find(|f| f.home_team_id == home_team_id && f.away_team_id == away_team_id)
                .cloned())
        }
    }

    #[async_trait]
    impl ResultsSource for FakeSources {
        async fn recent_results(
            &self,
            team_id: &str,
            _limit: u32,
        ) -> Result<Option<Vec<RecentResult>>> {
            Ok(self.results.get(team_id).cloned())
        }
    }

    #[async_trait]
    impl HeadToHeadSource for FakeSources {
        async fn meetings(
            &self,
            _home: &str,
            _away: &str,
            _limit: u32,
        ) -> Result<Option<Vec<H2hMeeting>>> {
            if self.meetings.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.meetings.clone()))
            }
        }
    }

    #[async_trait]
    impl InjurySource for FakeSources {
        async fn missing_players(&self, team_id: &str) -> Result<Option<Vec<MissingPlayer>>> {
            Ok(self.injuries.get(team_id).cloned())
        }
    }

    #[async_trait]
    impl StandingsSource for FakeSources {
        async fn standings_context(&self, team_id: &str) -> Result<Option<StandingsContext>> {
            if self.fail_standings {
                anyhow::bail!("standings upstream returned 503");
            }
            Ok(self.standings.get(team_id).cloned())
        }
    }

    #[async_trait]
    impl BaselineSource for FakeSources {
        async fn baseline_prediction(
            &self,
            _fixture_id: &str,
        ) -> Result<Option<BaselineExternalPrediction>> {
            Ok(self.baseline.clone())
        }
    }

    fn fixture(id: &str, home: &str, away: &str) -> Fixture {
        Fixture {
            id: id.to_string(),
            home_team_id: home.to_string(),
            away_team_id: away.to_string(),
            home_team_name: home.to_uppercase(),
            away_team_name: away.to_uppercase(),
            league: "Premier League".to_string(),
            kickoff: Utc::now(),
            status: "scheduled".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn results_with(outcomes: &[MatchOutcome]) -> Vec<RecentResult> {
        outcomes
            .iter()
            .map(|o| RecentResult {
                outcome: *o,
                goals_for: match o {
                    MatchOutcome::Win => 2,
                    MatchOutcome::Draw => 1,
                    MatchOutcome::Loss => 0,
                },
                goals_against: match o {
                    MatchOutcome::Win => 0,
                    MatchOutcome::Draw => 1,
                    MatchOutcome::Loss => 2,
                },
                home: false,
                date: Utc::now(),
            })
            .collect()
    }

    fn orchestrator(sources: FakeSources) -> Arc<PredictionOrchestrator> {
        let sources = Arc::new(sources);
        let metrics = MetricsProvider::new(
            sources.clone(),
            sources.clone(),
            sources.clone(),
            sources.clone(),
            sources.clone(),
            sources,
            Duration::from_secs(1),
        );
        Arc::new(PredictionOrchestrator::new(
            metrics,
            EngineConfig::default(),
        ))
    }

    #[tokio::test]
    async fn unknown_fixture_fails_fast() {
        let orch = orchestrator(FakeSources {
            fixtures: vec![fixture("f1", "h", "a")],
            ..Default::default()
        });
        let err = orch.predict("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn all_sources_missing_yields_home_leaning_low_confidence_default() {
        let orch = orchestrator(FakeSources {
            fixtures: vec![fixture("f1", "h", "a")],
            ..Default::default()
        });
        let p = orch.predict("f1").await.unwrap();

        // Only the fixed home boost moves the equal start.
        assert!((p.home_win_probability - 48.33).abs() < 1e-6);
        assert!((p.draw_probability - 27.33).abs() < 1e-6);
        assert!((p.away_win_probability - 24.34).abs() < 1e-6);
        assert!((p.data_completeness - 0.0).abs() < 1e-9);
        assert!((p.confidence - 48.33 * 0.8).abs() < 1e-6);
        assert_eq!(p.confidence_level, ConfidenceLevel::Low);
    }

    #[tokio::test]
    async fn failed_standings_source_degrades_completeness_not_probabilities() {
        let base = || FakeSources {
            fixtures: vec![fixture("f1", "h", "a")],
            results: HashMap::from([
                ("h".to_string(), results_with(&[MatchOutcome::Win; 5])),
                ("a".to_string(), results_with(&[MatchOutcome::Loss; 5])),
            ]),
            meetings: vec![
                H2hMeeting { home_team_goals: 2, away_team_goals: 1, date: Utc::now() },
                H2hMeeting { home_team_goals: 1, away_team_goals: 1, date: Utc::now() },
                H2hMeeting { home_team_goals: 0, away_team_goals: 2, date: Utc::now() },
            ],
            injuries: HashMap::from([
                ("h".to_string(), Vec::new()),
                ("a".to_string(), Vec::new()),
            ]),
            // Two comfortable mid-table sides: the same neutral motivation the
            // fallback context produces.
            standings: HashMap::from([
                (
                    "h".to_string(),
                    StandingsContext::from_table_row("h", 10, 35, 60, 20, 20),
                ),
                (
                    "a".to_string(),
                    StandingsContext::from_table_row("a", 11, 34, 60, 20, 20),
                ),
            ]),
            baseline: Some(BaselineExternalPrediction {
                source: "thirdparty".into(),
                home_pct: 50.0,
                draw_pct: 28.0,
                away_pct: 22.0,
                over25_pct: None,
                btts_pct: None,
            }),
            fail_standings: false,
        };

        let healthy = orchestrator(base()).predict("f1").await.unwrap();
        let degraded = orchestrator(FakeSources { fail_standings: true, ..base() })
            .predict("f1")
            .await
            .unwrap();

        assert!((healthy.data_completeness - 100.0).abs() < 1e-9);
        assert!((degraded.data_completeness - 80.0).abs() < 1e-9);
        assert!((healthy.home_win_probability - degraded.home_win_probability).abs() < 1e-9);
        assert!((healthy.draw_probability - degraded.draw_probability).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stronger_form_shifts_probability_toward_that_side() {
        let with_home_form = |outcomes: &[MatchOutcome]| FakeSources {
            fixtures: vec![fixture("f1", "h", "a")],
            results: HashMap::from([
                ("h".to_string(), results_with(outcomes)),
                (
                    "a".to_string(),
                    results_with(&[
                        MatchOutcome::Win,
                        MatchOutcome::Draw,
                        MatchOutcome::Loss,
                        MatchOutcome::Draw,
                        MatchOutcome::Win,
                    ]),
                ),
            ]),
            ..Default::default()
        };

        let hot = orchestrator(with_home_form(&[MatchOutcome::Win; 5]))
            .predict("f1")
            .await
            .unwrap();
        let cold = orchestrator(with_home_form(&[MatchOutcome::Loss; 5]))
            .predict("f1")
            .await
            .unwrap();

        assert!(hot.home_win_probability > cold.home_win_probability);
        assert!(hot.away_win_probability < cold.away_win_probability);
        let sum = hot.home_win_probability + hot.draw_probability + hot.away_win_probability;
        assert!((sum - 100.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn h2h_dominance_lifts_home_win_probability() {
        let meeting = |hg: u32, ag: u32| H2hMeeting {
            home_team_goals: hg,
            away_team_goals: ag,
            date: Utc::now(),
        };
        // 8 home wins, 1 draw, 1 away win across 10 meetings, most recent first.
        let mut meetings = vec![meeting(2, 0); 8];
        meetings.push(meeting(1, 1));
        meetings.push(meeting(0, 2));

        let no_history = orchestrator(FakeSources {
            fixtures: vec![fixture("f1", "h", "a")],
            ..Default::default()
        })
        .predict("f1")
        .await
        .unwrap();
        let dominant = orchestrator(FakeSources {
            fixtures: vec![fixture("f1", "h", "a")],
            meetings,
            ..Default::default()
        })
        .predict("f1")
        .await
        .unwrap();

        assert!(dominant.home_win_probability > no_history.home_win_probability);
        assert!(dominant.away_win_probability < no_history.away_win_probability);
    }

    #[tokio::test]
    async fn strong_home_form_beats_the_home_advantage_only_default() {
        let no_data = orchestrator(FakeSources {
            fixtures: vec![fixture("f1", "h", "a")],
            ..Default::default()
        })
        .predict("f1")
        .await
        .unwrap();
        let in_form = orchestrator(FakeSources {
            fixtures: vec![fixture("f1", "h", "a")],
            results: HashMap::from([
                ("h".to_string(), results_with(&[MatchOutcome::Win; 5])),
                (
                    "a".to_string(),
                    results_with(&[
                        MatchOutcome::Win,
                        MatchOutcome::Draw,
                        MatchOutcome::Loss,
                        MatchOutcome::Draw,
                        MatchOutcome::Win,
                    ]),
                ),
            ]),
            ..Default::default()
        })
        .predict("f1")
        .await
        .unwrap();

        // The no-data run is the home-advantage-only distribution.
        assert!((no_data.home_win_probability - 48.33).abs() < 1e-6);
        assert!(in_form.home_win_probability > no_data.home_win_probability);
    }

    #[tokio::test]
    async fn batch_preserves_order_and_matches_single_predictions() {
        let orch = orchestrator(FakeSources {
            fixtures: vec![fixture("f1", "h", "a"), fixture("f2", "x", "y")],
            results: HashMap::from([
                ("h".to_string(), results_with(&[MatchOutcome::Win; 5])),
                ("a".to_string(), results_with(&[MatchOutcome::Loss; 5])),
            ]),
            ..Default::default()
        });

        let ids = vec!["f1".to_string(), "missing".to_string(), "f2".to_string()];
        let batch = orch.predict_batch(&ids).await;

        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].fixture_id, "f1");
        assert_eq!(batch[1].fixture_id, "missing");
        assert_eq!(batch[2].fixture_id, "f2");
        assert!(batch[1].result.as_ref().unwrap_err().is_not_found());

        let single = orch.predict("f1").await.unwrap();
        let batched = batch[0].result.as_ref().unwrap();
        assert!((single.home_win_probability - batched.home_win_probability).abs() < 1e-9);
        assert!((single.over_25_probability - batched.over_25_probability).abs() < 1e-9);
    }
}

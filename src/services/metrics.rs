use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db;
use crate::error::PredictionError;
use crate::models::{
    BaselineExternalPrediction, Fixture, H2hMeeting, HeadToHeadRecord, InjurySuspensionReport,
    MissingPlayer, RecentResult, StandingsContext, TeamFormSnapshot,
};

// ── Collaborator contracts ───────────────────────────────────────────────────
//
// Each upstream (team/fixture lookup, historical results, head-to-head,
// injuries, standings, third-party baseline) is consumed through a trait so
// tests substitute in-memory fakes for the sqlite adapters. `Ok(None)` means
// the collaborator has no data; `Err` means it failed. MetricsProvider treats
// both as "use the default", but logs them apart.

#[async_trait]
pub trait FixtureLookup: Send + Sync {
    async fn fixture_by_id(&self, fixture_id: &str) -> Result<Option<Fixture>>;
    async fn fixture_by_teams(
        &self,
        home_team_id: &str,
        away_team_id: &str,
    ) -> Result<Option<Fixture>>;
}

#[async_trait]
pub trait ResultsSource: Send + Sync {
    /// Finished matches for a team, most recent first, oriented to the team.
    async fn recent_results(&self, team_id: &str, limit: u32)
        -> Result<Option<Vec<RecentResult>>>;
}

#[async_trait]
pub trait HeadToHeadSource: Send + Sync {
    /// Prior meetings between the two teams, most recent first, with goals
    /// oriented to `home_team_id`.
    async fn meetings(
        &self,
        home_team_id: &str,
        away_team_id: &str,
        limit: u32,
    ) -> Result<Option<Vec<H2hMeeting>>>;
}

#[async_trait]
pub trait InjurySource: Send + Sync {
    async fn missing_players(&self, team_id: &str) -> Result<Option<Vec<MissingPlayer>>>;
}

#[async_trait]
pub trait StandingsSource: Send + Sync {
    async fn standings_context(&self, team_id: &str) -> Result<Option<StandingsContext>>;
}

#[async_trait]
pub trait BaselineSource: Send + Sync {
    async fn baseline_prediction(
        &self,
        fixture_id: &str,
    ) -> Result<Option<BaselineExternalPrediction>>;
}

// ── Provider ─────────────────────────────────────────────────────────────────

/// A factor bundle plus whether its source actually responded. Unavailable
/// bundles carry the entity's neutral default.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub available: bool,
}

impl<T> Fetched<T> {
    fn hit(value: T) -> Self {
        Self { value, available: true }
    }

    fn fallback(value: T) -> Self {
        Self { value, available: false }
    }
}

/// Fetches and derives the five factor bundles for a fixture. Every fetch is
/// independent, timeout-bounded, and degrades to the entity's default rather
/// than propagating its failure.
pub struct MetricsProvider {
    fixtures: Arc<dyn FixtureLookup>,
    results: Arc<dyn ResultsSource>,
    head_to_head: Arc<dyn HeadToHeadSource>,
    injuries: Arc<dyn InjurySource>,
    standings: Arc<dyn StandingsSource>,
    baselines: Arc<dyn BaselineSource>,
    timeout: Duration,
}

impl MetricsProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fixtures: Arc<dyn FixtureLookup>,
        results: Arc<dyn ResultsSource>,
        head_to_head: Arc<dyn HeadToHeadSource>,
        injuries: Arc<dyn InjurySource>,
        standings: Arc<dyn StandingsSource>,
        baselines: Arc<dyn BaselineSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            fixtures,
            results,
            head_to_head,
            injuries,
            standings,
            baselines,
            timeout,
        }
    }

    /// Wires every collaborator to the shared sqlite database.
    pub fn sqlite(pool: SqlitePool, timeout: Duration) -> Self {
        let sources = Arc::new(SqliteSources { pool });
        Self::new(
            sources.clone(),
            sources.clone(),
            sources.clone(),
            sources.clone(),
            sources.clone(),
            sources,
            timeout,
        )
    }

    /// Resolving the fixture is the one fetch that fails fast: an unknown id
    /// aborts the prediction before any factor fan-out begins.
    pub async fn resolve_fixture(&self, fixture_id: &str) -> Result<Fixture, PredictionError> {
        match tokio::time::timeout(self.timeout, self.fixtures.fixture_by_id(fixture_id)).await {
            Ok(Ok(Some(fixture))) => Ok(fixture),
            Ok(Ok(None)) => Err(PredictionError::FixtureNotFound(fixture_id.to_string())),
            Ok(Err(e)) => Err(PredictionError::Internal(e)),
            Err(_) => Err(PredictionError::Internal(anyhow::anyhow!(
                "fixture lookup timed out after {:?}",
                self.timeout
            ))),
        }
    }

    pub async fn resolve_fixture_by_teams(
        &self,
        home_team_id: &str,
        away_team_id: &str,
    ) -> Result<Fixture, PredictionError> {
        match tokio::time::timeout(
            self.timeout,
            self.fixtures.fixture_by_teams(home_team_id, away_team_id),
        )
        .await
        {
            Ok(Ok(Some(fixture))) => Ok(fixture),
            Ok(Ok(None)) => Err(PredictionError::FixtureNotFound(format!(
                "{} vs {}",
                home_team_id, away_team_id
            ))),
            Ok(Err(e)) => Err(PredictionError::Internal(e)),
            Err(_) => Err(PredictionError::Internal(anyhow::anyhow!(
                "fixture lookup timed out after {:?}",
                self.timeout
            ))),
        }
    }

    /// Form snapshots for both teams; one factor source for completeness
    /// purposes, unavailable unless both team histories resolve.
    pub async fn form_pair(
        &self,
        fixture: &Fixture,
    ) -> Fetched<(TeamFormSnapshot, TeamFormSnapshot)> {
        let (home, away) = tokio::join!(
            self.guarded(
                "form/home",
                self.results
                    .recent_results(&fixture.home_team_id, TeamFormSnapshot::MAX_RESULTS as u32),
            ),
            self.guarded(
                "form/away",
                self.results
                    .recent_results(&fixture.away_team_id, TeamFormSnapshot::MAX_RESULTS as u32),
            ),
        );

        let available = home.is_some() && away.is_some();
        let home_snap = match home {
            Some(results) => TeamFormSnapshot::from_results(
                &fixture.home_team_id,
                &fixture.home_team_name,
                results,
            ),
            None => TeamFormSnapshot::unavailable(&fixture.home_team_id, &fixture.home_team_name),
        };
        let away_snap = match away {
            Some(results) => TeamFormSnapshot::from_results(
                &fixture.away_team_id,
                &fixture.away_team_name,
                results,
            ),
            None => TeamFormSnapshot::unavailable(&fixture.away_team_id, &fixture.away_team_name),
        };

        Fetched { value: (home_snap, away_snap), available }
    }

    pub async fn head_to_head(&self, fixture: &Fixture) -> Fetched<HeadToHeadRecord> {
        let meetings = self
            .guarded(
                "head_to_head",
                self.head_to_head.meetings(
                    &fixture.home_team_id,
                    &fixture.away_team_id,
                    HeadToHeadRecord::MAX_MEETINGS as u32,
                ),
            )
            .await;

        match meetings {
            Some(meetings) => Fetched::hit(HeadToHeadRecord::from_meetings(meetings)),
            None => Fetched::fallback(HeadToHeadRecord::empty()),
        }
    }

    pub async fn injury_pair(
        &self,
        fixture: &Fixture,
    ) -> Fetched<(InjurySuspensionReport, InjurySuspensionReport)> {
        let (home, away) = tokio::join!(
            self.guarded(
                "injuries/home",
                self.injuries.missing_players(&fixture.home_team_id),
            ),
            self.guarded(
                "injuries/away",
                self.injuries.missing_players(&fixture.away_team_id),
            ),
        );

        let available = home.is_some() && away.is_some();
        let home_report = match home {
            Some(missing) => InjurySuspensionReport::from_missing(&fixture.home_team_id, missing),
            None => InjurySuspensionReport::empty(&fixture.home_team_id),
        };
        let away_report = match away {
            Some(missing) => InjurySuspensionReport::from_missing(&fixture.away_team_id, missing),
            None => InjurySuspensionReport::empty(&fixture.away_team_id),
        };

        Fetched { value: (home_report, away_report), available }
    }

    pub async fn standings_pair(
        &self,
        fixture: &Fixture,
    ) -> Fetched<(StandingsContext, StandingsContext)> {
        let (home, away) = tokio::join!(
            self.guarded(
                "standings/home",
                self.standings.standings_context(&fixture.home_team_id),
            ),
            self.guarded(
                "standings/away",
                self.standings.standings_context(&fixture.away_team_id),
            ),
        );

        let available = home.is_some() && away.is_some();
        Fetched {
            value: (
                home.unwrap_or_else(|| StandingsContext::unavailable(&fixture.home_team_id)),
                away.unwrap_or_else(|| StandingsContext::unavailable(&fixture.away_team_id)),
            ),
            available,
        }
    }

    pub async fn baseline(&self, fixture_id: &str) -> Fetched<Option<BaselineExternalPrediction>> {
        match self
            .guarded("baseline", self.baselines.baseline_prediction(fixture_id))
            .await
        {
            Some(prediction) => Fetched::hit(Some(prediction)),
            None => Fetched::fallback(None),
        }
    }

    /// Timeout + error boundary around one collaborator call. Absence and
    /// failure both yield `None`; only the log line tells them apart.
    async fn guarded<T, F>(&self, source: &str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<Option<T>>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(Some(value))) => Some(value),
            Ok(Ok(None)) => {
                tracing::debug!("no data from source '{}', using default", source);
                None
            }
            Ok(Err(e)) => {
                tracing::warn!("source '{}' failed, using default: {}", source, e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "source '{}' timed out after {:?}, using default",
                    source,
                    self.timeout
                );
                None
            }
        }
    }
}

// ── Sqlite adapters ──────────────────────────────────────────────────────────
//
// Parsing and validation of stored upstream data happens here, isolated from
// the scoring math.

pub struct SqliteSources {
    pool: SqlitePool,
}

#[async_trait]
impl FixtureLookup for SqliteSources {
    async fn fixture_by_id(&self, fixture_id: &str) -> Result<Option<Fixture>> {
        db::get_fixture_by_id(&self.pool, fixture_id).await
    }

    async fn fixture_by_teams(
        &self,
        home_team_id: &str,
        away_team_id: &str,
    ) -> Result<Option<Fixture>> {
        db::get_fixture_by_teams(&self.pool, home_team_id, away_team_id).await
    }
}

#[async_trait]
impl ResultsSource for SqliteSources {
    async fn recent_results(
        &self,
        team_id: &str,
        limit: u32,
    ) -> Result<Option<Vec<RecentResult>>> {
        let results = db::get_recent_results(&self.pool, team_id, limit).await?;
        // No finished matches on record means no usable form sample.
        Ok(if results.is_empty() { None } else { Some(results) })
    }
}

#[async_trait]
impl HeadToHeadSource for SqliteSources {
    async fn meetings(
        &self,
        home_team_id: &str,
        away_team_id: &str,
        limit: u32,
    ) -> Result<Option<Vec<H2hMeeting>>> {
        // Teams that never met are valid data, not an absent source.
        Ok(Some(
            db::get_meetings(&self.pool, home_team_id, away_team_id, limit).await?,
        ))
    }
}

#[async_trait]
impl InjurySource for SqliteSources {
    async fn missing_players(&self, team_id: &str) -> Result<Option<Vec<MissingPlayer>>> {
        // An empty list means a fully fit squad.
        Ok(Some(db::get_missing_players(&self.pool, team_id).await?))
    }
}

#[async_trait]
impl StandingsSource for SqliteSources {
    async fn standings_context(&self, team_id: &str) -> Result<Option<StandingsContext>> {
        db::get_standings_context(&self.pool, team_id).await
    }
}

#[async_trait]
impl BaselineSource for SqliteSources {
    async fn baseline_prediction(
        &self,
        fixture_id: &str,
    ) -> Result<Option<BaselineExternalPrediction>> {
        db::get_baseline_prediction(&self.pool, fixture_id).await
    }
}

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;
use std::env;

use crate::db;
use crate::models::{BaselineExternalPrediction, Fixture, MissingPlayer, Team};

// ── football-data.org structures ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FootballDataTeams {
    pub teams: Vec<FootballTeam>,
}

#[derive(Debug, Deserialize)]
pub struct FootballTeam {
    pub id: u32,
    pub name: String,
    pub crest: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FootballDataMatches {
    pub matches: Vec<FootballMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FootballMatch {
    pub id: u32,
    pub utc_date: String,
    pub status: String,
    pub home_team: MatchTeam,
    pub away_team: MatchTeam,
    pub score: MatchScore,
}

#[derive(Debug, Deserialize)]
pub struct MatchTeam {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchScore {
    pub full_time: Option<Score>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Score {
    pub home: Option<u32>,
    pub away: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct FootballDataStandings {
    pub standings: Vec<StandingsGroup>,
}

#[derive(Debug, Deserialize)]
pub struct StandingsGroup {
    #[serde(rename = "type")]
    pub table_type: String,
    pub table: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TableEntry {
    pub position: u32,
    pub team: MatchTeam,
    pub points: u32,
}

// ── Feed structures (injury + baseline JSON feeds) ───────────────────────────

#[derive(Debug, Deserialize)]
pub struct InjuryFeedEntry {
    pub team_id: String,
    pub players: Vec<MissingPlayer>,
}

#[derive(Debug, Deserialize)]
pub struct BaselineFeedEntry {
    pub fixture_id: String,
    #[serde(flatten)]
    pub prediction: BaselineExternalPrediction,
}

// ── DataFetcher ──────────────────────────────────────────────────────────────

/// Pulls EPL teams, matches and standings from football-data.org, plus
/// injuries and third-party baselines from configurable JSON feeds, and
/// stores everything in sqlite for the prediction pipeline to read.
pub struct DataFetcher {
    client: Client,
    football_api_key: Option<String>,
    injury_feed_url: Option<String>,
    baseline_feed_url: Option<String>,
}

impl DataFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            football_api_key: env::var("FOOTBALL_DATA_API_KEY").ok(),
            injury_feed_url: env::var("MATCHCAST_INJURY_FEED_URL").ok(),
            baseline_feed_url: env::var("MATCHCAST_BASELINE_FEED_URL").ok(),
        }
    }

    pub fn has_football_key(&self) -> bool {
        self.football_api_key.is_some()
    }

    /// GET with up to 3 retries on 429, exponential backoff (10s, 20s, 40s).
    async fn get_json<T: DeserializeOwned>(&self, url: &str, api_key: &str) -> Result<T> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let resp = self
                .client
                .get(url)
                .header("X-Auth-Token", api_key)
                .send()
                .await?;

            if resp.status() == 429 {
                let wait = 2u64.pow(attempts) * 5;
                tracing::warn!(
                    "429 rate-limited on {} — waiting {}s (attempt {})",
                    url,
                    wait,
                    attempts
                );
                if attempts >= 3 {
                    return Err(anyhow!("rate limit exceeded after {} attempts", attempts));
                }
                tokio::time::sleep(tokio::time::Duration::from_secs(wait)).await;
                continue;
            }

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(anyhow!("API error {} on {}: {}", status, url, body));
            }

            return Ok(resp.json().await?);
        }
    }

    // ── Teams ─────────────────────────────────────────────────────────────────

    pub async fn fetch_epl_teams(&self, pool: &SqlitePool) -> Result<()> {
        let api_key = self
            .football_api_key
            .as_ref()
            .ok_or_else(|| anyhow!("FOOTBALL_DATA_API_KEY not set"))?;

        tracing::info!("Fetching EPL teams from football-data.org…");

        let data: FootballDataTeams = self
            .get_json(
                "https://api.football-data.org/v4/competitions/PL/teams",
                api_key,
            )
            .await?;

        for t in data.teams {
            db::insert_team(
                pool,
                &Team {
                    id: format!("epl_{}", t.id),
                    name: t.name,
                    league: "EPL".to_string(),
                    logo_url: t.crest,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
            )
            .await?;
        }

        tracing::info!("EPL teams stored");
        Ok(())
    }

    // ── Matches ───────────────────────────────────────────────────────────────

    /// Fetches the season's matches: finished ones become result rows (the
    /// form and head-to-head source), scheduled ones become fixtures.
    pub async fn fetch_epl_matches(&self, pool: &SqlitePool) -> Result<()> {
        let api_key = self
            .football_api_key
            .as_ref()
            .ok_or_else(|| anyhow!("FOOTBALL_DATA_API_KEY not set"))?;

        tracing::info!("Fetching EPL matches from football-data.org…");

        let data: FootballDataMatches = self
            .get_json(
                "https://api.football-data.org/v4/competitions/PL/matches",
                api_key,
            )
            .await?;

        let mut results = 0usize;
        let mut fixtures = 0usize;

        for m in data.matches {
            let date = match DateTime::parse_from_rfc3339(&m.utc_date) {
                Ok(d) => d.with_timezone(&Utc),
                Err(e) => {
                    tracing::warn!("Bad date '{}': {}", m.utc_date, e);
                    continue;
                }
            };

            match m.status.as_str() {
                "FINISHED" => {
                    let Some(score) = m.score.full_time.as_ref() else {
                        continue;
                    };
                    let (Some(home_goals), Some(away_goals)) = (score.home, score.away) else {
                        continue;
                    };
                    db::insert_result(
                        pool,
                        &format!("epl_{}", m.id),
                        &format!("epl_{}", m.home_team.id),
                        &format!("epl_{}", m.away_team.id),
                        home_goals,
                        away_goals,
                        "EPL",
                        date,
                    )
                    .await?;
                    results += 1;
                }
                status => {
                    let status = match status {
                        "IN_PLAY" | "PAUSED" => "live",
                        _ => "scheduled", // SCHEDULED, TIMED, POSTPONED …
                    };
                    db::insert_fixture(
                        pool,
                        &Fixture {
                            id: format!("epl_{}", m.id),
                            home_team_id: format!("epl_{}", m.home_team.id),
                            away_team_id: format!("epl_{}", m.away_team.id),
                            home_team_name: m.home_team.name,
                            away_team_name: m.away_team.name,
                            league: "EPL".to_string(),
                            kickoff: date,
                            status: status.to_string(),
                            created_at: Utc::now(),
                            updated_at: Utc::now(),
                        },
                    )
                    .await?;
                    fixtures += 1;
                }
            }
        }

        tracing::info!("Stored {} results and {} fixtures", results, fixtures);
        Ok(())
    }

    // ── Standings ─────────────────────────────────────────────────────────────

    pub async fn fetch_epl_standings(&self, pool: &SqlitePool) -> Result<()> {
        let api_key = self
            .football_api_key
            .as_ref()
            .ok_or_else(|| anyhow!("FOOTBALL_DATA_API_KEY not set"))?;

        tracing::info!("Fetching EPL standings from football-data.org…");

        let data: FootballDataStandings = self
            .get_json(
                "https://api.football-data.org/v4/competitions/PL/standings",
                api_key,
            )
            .await?;

        let table = data
            .standings
            .into_iter()
            .find(|g| g.table_type == "TOTAL")
            .map(|g| g.table)
            .unwrap_or_default();

        let rows = table.len();
        for entry in table {
            db::upsert_standing(
                pool,
                &format!("epl_{}", entry.team.id),
                "EPL",
                entry.position,
                entry.points,
            )
            .await?;
        }

        tracing::info!("Stored {} standings rows", rows);
        Ok(())
    }

    // ── Injury + baseline feeds ───────────────────────────────────────────────

    pub async fn fetch_injuries(&self, pool: &SqlitePool) -> Result<()> {
        let url = self
            .injury_feed_url
            .as_ref()
            .ok_or_else(|| anyhow!("MATCHCAST_INJURY_FEED_URL not set"))?;

        tracing::info!("Fetching injury feed…");

        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("injury feed error {}", resp.status()));
        }
        let entries: Vec<InjuryFeedEntry> = resp.json().await?;

        let teams = entries.len();
        for entry in entries {
            db::replace_injuries(pool, &entry.team_id, &entry.players).await?;
        }

        tracing::info!("Stored absence lists for {} teams", teams);
        Ok(())
    }

    pub async fn fetch_baselines(&self, pool: &SqlitePool) -> Result<()> {
        let url = self
            .baseline_feed_url
            .as_ref()
            .ok_or_else(|| anyhow!("MATCHCAST_BASELINE_FEED_URL not set"))?;

        tracing::info!("Fetching baseline prediction feed…");

        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("baseline feed error {}", resp.status()));
        }
        let entries: Vec<BaselineFeedEntry> = resp.json().await?;

        let fixtures = entries.len();
        for entry in entries {
            db::upsert_baseline(pool, &entry.fixture_id, &entry.prediction).await?;
        }

        tracing::info!("Stored baselines for {} fixtures", fixtures);
        Ok(())
    }

    // ── Combined fetch ───────────────────────────────────────────────────────

    pub async fn fetch_all_data(&self, pool: &SqlitePool) -> Result<()> {
        if self.has_football_key() {
            self.fetch_epl_teams(pool).await?;
            // football-data.org free tier: 10 req/min — wait between calls
            tokio::time::sleep(tokio::time::Duration::from_secs(6)).await;
            self.fetch_epl_matches(pool).await?;
            tokio::time::sleep(tokio::time::Duration::from_secs(6)).await;
            self.fetch_epl_standings(pool).await?;
        } else {
            tracing::warn!("FOOTBALL_DATA_API_KEY not set — skipping EPL sync");
        }

        if self.injury_feed_url.is_some() {
            self.fetch_injuries(pool).await?;
        } else {
            tracing::warn!("MATCHCAST_INJURY_FEED_URL not set — skipping injuries");
        }

        if self.baseline_feed_url.is_some() {
            self.fetch_baselines(pool).await?;
        } else {
            tracing::warn!("MATCHCAST_BASELINE_FEED_URL not set — skipping baselines");
        }

        Ok(())
    }
}

impl Default for DataFetcher {
    fn default() -> Self {
        Self::new()
    }
}

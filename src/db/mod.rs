pub mod seed;
pub use seed::seed_data;

use anyhow::Result;
use chrono::Utc;
use sqlx::{Row, SqlitePool, sqlite::SqliteConnectOptions};
use std::env;
use std::str::FromStr;

use crate::models::*;

pub async fn create_pool() -> Result<SqlitePool> {
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/matchcast.db".to_string());

    // Strip the "sqlite:" prefix to get the file path, create parent dir if needed
    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(&database_url);

    if let Some(parent) = std::path::Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }

    let options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

/// Called from the CLI where no pool exists yet.
pub async fn init_database() -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await
}

/// Called from the server so schema creation shares the main pool.
pub async fn init_database_with_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            league TEXT NOT NULL,
            logo_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fixtures (
            id TEXT PRIMARY KEY,
            home_team_id TEXT NOT NULL,
            away_team_id TEXT NOT NULL,
            home_team_name TEXT NOT NULL,
            away_team_name TEXT NOT NULL,
            league TEXT NOT NULL,
            kickoff TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (home_team_id) REFERENCES teams (id),
            FOREIGN KEY (away_team_id) REFERENCES teams (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // results: finished matches, the single source for both form and
    // head-to-head derivations
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS results (
            id TEXT PRIMARY KEY,
            home_team_id TEXT NOT NULL,
            away_team_id TEXT NOT NULL,
            home_goals INTEGER NOT NULL,
            away_goals INTEGER NOT NULL,
            league TEXT NOT NULL,
            played_at TEXT NOT NULL,
            FOREIGN KEY (home_team_id) REFERENCES teams (id),
            FOREIGN KEY (away_team_id) REFERENCES teams (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS injuries (
            id TEXT PRIMARY KEY,
            team_id TEXT NOT NULL,
            player_name TEXT NOT NULL,
            position TEXT NOT NULL,
            reason TEXT NOT NULL,
            return_date TEXT,
            is_top_scorer INTEGER NOT NULL DEFAULT 0,
            is_first_choice_keeper INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (team_id) REFERENCES teams (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // standings: one row per team; race flags and motivation are derived at
    // read time from the league aggregates, never stored
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS standings (
            team_id TEXT PRIMARY KEY,
            league TEXT NOT NULL,
            position INTEGER NOT NULL,
            points INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (team_id) REFERENCES teams (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // baseline_predictions: latest third-party probabilities per fixture
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS baseline_predictions (
            fixture_id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            home_pct REAL NOT NULL,
            draw_pct REAL NOT NULL,
            away_pct REAL NOT NULL,
            over25_pct REAL,
            btts_pct REAL,
            fetched_at TEXT NOT NULL,
            FOREIGN KEY (fixture_id) REFERENCES fixtures (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // predictions: full result as JSON plus headline columns for queries
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS predictions (
            id TEXT PRIMARY KEY,
            fixture_id TEXT NOT NULL,
            home_win_probability REAL NOT NULL,
            draw_probability REAL NOT NULL,
            away_win_probability REAL NOT NULL,
            confidence REAL NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (fixture_id) REFERENCES fixtures (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_fixtures_kickoff ON fixtures(kickoff)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_results_home ON results(home_team_id, played_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_results_away ON results(away_team_id, played_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_injuries_team ON injuries(team_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_predictions_fixture ON predictions(fixture_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database initialized successfully");
    Ok(())
}

// Team operations

pub async fn insert_team(pool: &SqlitePool, team: &Team) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO teams (id, name, league, logo_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&team.id)
    .bind(&team.name)
    .bind(&team.league)
    .bind(&team.logo_url)
    .bind(team.created_at.to_rfc3339())
    .bind(team.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_all_teams(pool: &SqlitePool) -> Result<Vec<Team>> {
    let rows = sqlx::query("SELECT * FROM teams ORDER BY league, name")
        .fetch_all(pool)
        .await?;

    rows.iter().map(team_from_row).collect()
}

fn team_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Team> {
    Ok(Team {
        id: row.get("id"),
        name: row.get("name"),
        league: row.get("league"),
        logo_url: row.get("logo_url"),
        created_at: parse_utc(&row.get::<String, _>("created_at"))?,
        updated_at: parse_utc(&row.get::<String, _>("updated_at"))?,
    })
}

// Fixture operations

pub async fn insert_fixture(pool: &SqlitePool, fixture: &Fixture) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO fixtures
        (id, home_team_id, away_team_id, home_team_name, away_team_name, league,
         kickoff, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&fixture.id)
    .bind(&fixture.home_team_id)
    .bind(&fixture.away_team_id)
    .bind(&fixture.home_team_name)
    .bind(&fixture.away_team_name)
    .bind(&fixture.league)
    .bind(fixture.kickoff.to_rfc3339())
    .bind(&fixture.status)
    .bind(fixture.created_at.to_rfc3339())
    .bind(fixture.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_fixture_by_id(pool: &SqlitePool, fixture_id: &str) -> Result<Option<Fixture>> {
    let row = sqlx::query("SELECT * FROM fixtures WHERE id = ?")
        .bind(fixture_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(fixture_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Next scheduled meeting of the pair, home side as given.
pub async fn get_fixture_by_teams(
    pool: &SqlitePool,
    home_team_id: &str,
    away_team_id: &str,
) -> Result<Option<Fixture>> {
    let row = sqlx::query(
        r#"SELECT * FROM fixtures
           WHERE home_team_id = ? AND away_team_id = ? AND status = 'scheduled'
           ORDER BY kickoff ASC LIMIT 1"#,
    )
    .bind(home_team_id)
    .bind(away_team_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(fixture_from_row(&row)?)),
        None => Ok(None),
    }
}

pub async fn get_upcoming_fixtures(pool: &SqlitePool, limit: i64) -> Result<Vec<Fixture>> {
    let rows = sqlx::query(
        r#"SELECT * FROM fixtures
           WHERE status = 'scheduled' AND kickoff > datetime('now')
           ORDER BY kickoff ASC LIMIT ?"#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(fixture_from_row).collect()
}

fn fixture_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Fixture> {
    Ok(Fixture {
        id: row.get("id"),
        home_team_id: row.get("home_team_id"),
        away_team_id: row.get("away_team_id"),
        home_team_name: row.get("home_team_name"),
        away_team_name: row.get("away_team_name"),
        league: row.get("league"),
        kickoff: parse_utc(&row.get::<String, _>("kickoff"))?,
        status: row.get("status"),
        created_at: parse_utc(&row.get::<String, _>("created_at"))?,
        updated_at: parse_utc(&row.get::<String, _>("updated_at"))?,
    })
}

// Result operations

/// Idempotent on `id` so repeated syncs never duplicate a match.
pub async fn insert_result(
    pool: &SqlitePool,
    id: &str,
    home_team_id: &str,
    away_team_id: &str,
    home_goals: u32,
    away_goals: u32,
    league: &str,
    played_at: chrono::DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"INSERT OR REPLACE INTO results (id, home_team_id, away_team_id, home_goals, away_goals, league, played_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(id)
    .bind(home_team_id)
    .bind(away_team_id)
    .bind(home_goals)
    .bind(away_goals)
    .bind(league)
    .bind(played_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Finished matches oriented to the given team, most recent first.
pub async fn get_recent_results(
    pool: &SqlitePool,
    team_id: &str,
    limit: u32,
) -> Result<Vec<RecentResult>> {
    let rows = sqlx::query(
        r#"SELECT played_at,
                  CASE WHEN home_team_id = ? THEN home_goals ELSE away_goals END AS goals_for,
                  CASE WHEN home_team_id = ? THEN away_goals ELSE home_goals END AS goals_against,
                  (home_team_id = ?) AS was_home
           FROM results
           WHERE home_team_id = ? OR away_team_id = ?
           ORDER BY played_at DESC LIMIT ?"#,
    )
    .bind(team_id)
    .bind(team_id)
    .bind(team_id)
    .bind(team_id)
    .bind(team_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut results = Vec::new();
    for row in rows {
        let goals_for: u32 = row.get("goals_for");
        let goals_against: u32 = row.get("goals_against");
        results.push(RecentResult {
            outcome: MatchOutcome::from_goals(goals_for, goals_against),
            goals_for,
            goals_against,
            home: row.get("was_home"),
            date: parse_utc(&row.get::<String, _>("played_at"))?,
        });
    }
    Ok(results)
}

/// Prior meetings of the pair in either venue, goals oriented to
/// `home_team_id`, most recent first.
pub async fn get_meetings(
    pool: &SqlitePool,
    home_team_id: &str,
    away_team_id: &str,
    limit: u32,
) -> Result<Vec<H2hMeeting>> {
    let rows = sqlx::query(
        r#"SELECT played_at,
                  CASE WHEN home_team_id = ? THEN home_goals ELSE away_goals END AS for_goals,
                  CASE WHEN home_team_id = ? THEN away_goals ELSE home_goals END AS against_goals
           FROM results
           WHERE (home_team_id = ? AND away_team_id = ?)
              OR (home_team_id = ? AND away_team_id = ?)
           ORDER BY played_at DESC LIMIT ?"#,
    )
    .bind(home_team_id)
    .bind(home_team_id)
    .bind(home_team_id)
    .bind(away_team_id)
    .bind(away_team_id)
    .bind(home_team_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut meetings = Vec::new();
    for row in rows {
        meetings.push(H2hMeeting {
            home_team_goals: row.get("for_goals"),
            away_team_goals: row.get("against_goals"),
            date: parse_utc(&row.get::<String, _>("played_at"))?,
        });
    }
    Ok(meetings)
}

// Injury operations

/// Replaces the team's absence list wholesale; partial updates would leave
/// recovered players lingering.
pub async fn replace_injuries(
    pool: &SqlitePool,
    team_id: &str,
    missing: &[MissingPlayer],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM injuries WHERE team_id = ?")
        .bind(team_id)
        .execute(&mut *tx)
        .await?;

    let now = Utc::now().to_rfc3339();
    for player in missing {
        sqlx::query(
            r#"INSERT INTO injuries
               (id, team_id, player_name, position, reason, return_date,
                is_top_scorer, is_first_choice_keeper, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(team_id)
        .bind(&player.name)
        .bind(position_str(player.position))
        .bind(&player.reason)
        .bind(player.return_date.map(|d| d.to_rfc3339()))
        .bind(player.is_top_scorer)
        .bind(player.is_first_choice_keeper)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn get_missing_players(pool: &SqlitePool, team_id: &str) -> Result<Vec<MissingPlayer>> {
    let rows = sqlx::query("SELECT * FROM injuries WHERE team_id = ? ORDER BY player_name")
        .bind(team_id)
        .fetch_all(pool)
        .await?;

    let mut players = Vec::new();
    for row in rows {
        let return_date = match row.get::<Option<String>, _>("return_date") {
            Some(raw) => Some(parse_utc(&raw)?),
            None => None,
        };
        players.push(MissingPlayer {
            name: row.get("player_name"),
            position: position_from_str(&row.get::<String, _>("position"))?,
            reason: row.get("reason"),
            return_date,
            is_top_scorer: row.get("is_top_scorer"),
            is_first_choice_keeper: row.get("is_first_choice_keeper"),
        });
    }
    Ok(players)
}

fn position_str(position: PlayerPosition) -> &'static str {
    match position {
        PlayerPosition::Goalkeeper => "goalkeeper",
        PlayerPosition::Defender => "defender",
        PlayerPosition::Midfielder => "midfielder",
        PlayerPosition::Forward => "forward",
    }
}

fn position_from_str(raw: &str) -> Result<PlayerPosition> {
    match raw {
        "goalkeeper" => Ok(PlayerPosition::Goalkeeper),
        "defender" => Ok(PlayerPosition::Defender),
        "midfielder" => Ok(PlayerPosition::Midfielder),
        "forward" => Ok(PlayerPosition::Forward),
        other => anyhow::bail!("unknown player position '{}'", other),
    }
}

// Standings operations

pub async fn upsert_standing(
    pool: &SqlitePool,
    team_id: &str,
    league: &str,
    position: u32,
    points: u32,
) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO standings (team_id, league, position, points, updated_at)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT(team_id) DO UPDATE SET
               league     = excluded.league,
               position   = excluded.position,
               points     = excluded.points,
               updated_at = excluded.updated_at"#,
    )
    .bind(team_id)
    .bind(league)
    .bind(position)
    .bind(points)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Assembles the team's table context from its row plus the league
/// aggregates: leader total, the best total inside the bottom-three zone,
/// and the table size.
pub async fn get_standings_context(
    pool: &SqlitePool,
    team_id: &str,
) -> Result<Option<StandingsContext>> {
    let row = sqlx::query("SELECT league, position, points FROM standings WHERE team_id = ?")
        .bind(team_id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let league: String = row.get("league");
    let position: u32 = row.get("position");
    let points: u32 = row.get("points");

    let aggregates = sqlx::query(
        "SELECT COUNT(*) AS total_teams, MAX(points) AS leader_points FROM standings WHERE league = ?",
    )
    .bind(&league)
    .fetch_one(pool)
    .await?;
    let total_teams: u32 = aggregates.get("total_teams");
    let leader_points: u32 = aggregates.get("leader_points");

    let safety_points: u32 = sqlx::query(
        "SELECT points FROM standings WHERE league = ? AND position = ?",
    )
    .bind(&league)
    .bind(total_teams.saturating_sub(2))
    .fetch_optional(pool)
    .await?
    .map(|r| r.get("points"))
    .unwrap_or(0);

    Ok(Some(StandingsContext::from_table_row(
        team_id,
        position,
        points,
        leader_points,
        safety_points,
        total_teams,
    )))
}

// Baseline operations

pub async fn upsert_baseline(
    pool: &SqlitePool,
    fixture_id: &str,
    baseline: &BaselineExternalPrediction,
) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO baseline_predictions
           (fixture_id, source, home_pct, draw_pct, away_pct, over25_pct, btts_pct, fetched_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(fixture_id) DO UPDATE SET
               source     = excluded.source,
               home_pct   = excluded.home_pct,
               draw_pct   = excluded.draw_pct,
               away_pct   = excluded.away_pct,
               over25_pct = excluded.over25_pct,
               btts_pct   = excluded.btts_pct,
               fetched_at = excluded.fetched_at"#,
    )
    .bind(fixture_id)
    .bind(&baseline.source)
    .bind(baseline.home_pct)
    .bind(baseline.draw_pct)
    .bind(baseline.away_pct)
    .bind(baseline.over25_pct)
    .bind(baseline.btts_pct)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_baseline_prediction(
    pool: &SqlitePool,
    fixture_id: &str,
) -> Result<Option<BaselineExternalPrediction>> {
    let row = sqlx::query("SELECT * FROM baseline_predictions WHERE fixture_id = ?")
        .bind(fixture_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| BaselineExternalPrediction {
        source: r.get("source"),
        home_pct: r.get("home_pct"),
        draw_pct: r.get("draw_pct"),
        away_pct: r.get("away_pct"),
        over25_pct: r.get("over25_pct"),
        btts_pct: r.get("btts_pct"),
    }))
}

// Prediction operations

pub async fn insert_prediction(pool: &SqlitePool, prediction: &PredictionResult) -> Result<()> {
    let payload = serde_json::to_string(prediction)?;
    sqlx::query(
        r#"INSERT INTO predictions
           (id, fixture_id, home_win_probability, draw_probability, away_win_probability,
            confidence, payload, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&prediction.fixture_id)
    .bind(prediction.home_win_probability)
    .bind(prediction.draw_probability)
    .bind(prediction.away_win_probability)
    .bind(prediction.confidence)
    .bind(payload)
    .bind(prediction.generated_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_latest_prediction(
    pool: &SqlitePool,
    fixture_id: &str,
) -> Result<Option<PredictionResult>> {
    let row = sqlx::query(
        "SELECT payload FROM predictions WHERE fixture_id = ? ORDER BY created_at DESC LIMIT 1",
    )
    .bind(fixture_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let payload: String = row.get("payload");
            Ok(Some(serde_json::from_str(&payload)?))
        }
        None => Ok(None),
    }
}

fn parse_utc(raw: &str) -> Result<chrono::DateTime<Utc>> {
    Ok(chrono::DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

use anyhow::Result;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::db;
use crate::models::{BaselineExternalPrediction, Fixture, MissingPlayer, PlayerPosition, Team};

pub async fn seed_data(pool: &SqlitePool) -> Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        tracing::info!("Database already seeded ({} teams found), skipping.", count);
        return Ok(());
    }

    tracing::info!("Seeding database with EPL demo data...");
    seed_epl(pool).await?;
    tracing::info!("Database seeded successfully.");
    Ok(())
}

async fn seed_epl(pool: &SqlitePool) -> Result<()> {
    let now = Utc::now();

    // (id, name, position, points)
    let teams: Vec<(&str, &str, u32, u32)> = vec![
        ("epl_1",  "Arsenal",           1, 58),
        ("epl_2",  "Liverpool",         2, 57),
        ("epl_3",  "Manchester City",   3, 56),
        ("epl_4",  "Chelsea",           4, 48),
        ("epl_5",  "Aston Villa",       5, 47),
        ("epl_6",  "Tottenham Hotspur", 6, 45),
        ("epl_7",  "Newcastle United",  7, 44),
        ("epl_8",  "Manchester United", 8, 40),
        ("epl_9",  "Brighton",          9, 39),
        ("epl_10", "West Ham United",  10, 36),
        ("epl_11", "Everton",          11, 34),
        ("epl_12", "Fulham",           12, 34),
        ("epl_13", "Crystal Palace",   13, 32),
        ("epl_14", "Brentford",        14, 32),
        ("epl_15", "Wolves",           15, 29),
        ("epl_16", "Nottingham Forest", 16, 28),
        ("epl_17", "Bournemouth",      17, 28),
        ("epl_18", "Leicester City",   18, 23),
        ("epl_19", "Ipswich Town",     19, 20),
        ("epl_20", "Southampton",      20, 13),
    ];

    for (id, name, position, points) in &teams {
        db::insert_team(
            pool,
            &Team {
                id: id.to_string(),
                name: name.to_string(),
                league: "EPL".to_string(),
                logo_url: None,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;
        db::upsert_standing(pool, id, "EPL", *position, *points).await?;
    }

    let name_map: std::collections::HashMap<&str, &str> =
        teams.iter().map(|(id, name, ..)| (*id, *name)).collect();

    // ── Finished matches (form + head-to-head source) ────────────────────────
    // (home_id, away_id, home_goals, away_goals, days_ago)
    let results: Vec<(&str, &str, u32, u32, i64)> = vec![
        // Recent rounds, newest sides of the table in decent form
        ("epl_1",  "epl_15", 3, 0, 5),
        ("epl_2",  "epl_11", 2, 1, 6),
        ("epl_3",  "epl_19", 4, 0, 6),
        ("epl_4",  "epl_13", 2, 2, 7),
        ("epl_6",  "epl_10", 2, 0, 7),
        ("epl_8",  "epl_18", 1, 1, 8),
        ("epl_9",  "epl_20", 3, 1, 8),
        ("epl_5",  "epl_16", 2, 1, 9),
        ("epl_7",  "epl_14", 1, 0, 9),
        ("epl_12", "epl_17", 2, 2, 10),
        // One round earlier
        ("epl_15", "epl_2",  0, 2, 12),
        ("epl_11", "epl_3",  0, 3, 13),
        ("epl_19", "epl_4",  1, 2, 13),
        ("epl_13", "epl_1",  0, 1, 14),
        ("epl_10", "epl_8",  2, 1, 14),
        ("epl_18", "epl_9",  0, 2, 15),
        ("epl_20", "epl_6",  0, 3, 15),
        ("epl_16", "epl_7",  1, 1, 16),
        ("epl_14", "epl_5",  1, 2, 16),
        ("epl_17", "epl_12", 1, 0, 17),
        // Older rounds to thicken the form sample
        ("epl_1",  "epl_9",  2, 1, 19),
        ("epl_2",  "epl_7",  2, 0, 20),
        ("epl_3",  "epl_12", 3, 1, 20),
        ("epl_4",  "epl_6",  0, 1, 21),
        ("epl_5",  "epl_8",  2, 0, 21),
        ("epl_20", "epl_18", 0, 1, 22),
        ("epl_19", "epl_17", 1, 2, 22),
        // Head-to-head history for the marquee pairs
        ("epl_1",  "epl_2",  2, 2, 160),
        ("epl_2",  "epl_1",  1, 0, 300),
        ("epl_1",  "epl_2",  3, 1, 460),
        ("epl_2",  "epl_1",  2, 2, 640),
        ("epl_3",  "epl_2",  2, 1, 100),
        ("epl_2",  "epl_3",  3, 2, 280),
        ("epl_3",  "epl_2",  1, 1, 450),
        ("epl_4",  "epl_6",  0, 2, 200),
        ("epl_6",  "epl_4",  1, 1, 380),
        ("epl_4",  "epl_6",  2, 0, 560),
    ];

    for (i, (home, away, hg, ag, days_ago)) in results.iter().enumerate() {
        db::insert_result(
            pool,
            &format!("epl_r{}", i + 1),
            home,
            away,
            *hg,
            *ag,
            "EPL",
            now - Duration::days(*days_ago),
        )
        .await?;
    }

    // ── Current absences ─────────────────────────────────────────────────────
    let man_utd_missing = vec![
        MissingPlayer {
            name: "Rasmus Hojlund".to_string(),
            position: PlayerPosition::Forward,
            reason: "injury".to_string(),
            return_date: Some(now + Duration::days(21)),
            is_top_scorer: true,
            is_first_choice_keeper: false,
        },
        MissingPlayer {
            name: "Lisandro Martinez".to_string(),
            position: PlayerPosition::Defender,
            reason: "injury".to_string(),
            return_date: Some(now + Duration::days(30)),
            is_top_scorer: false,
            is_first_choice_keeper: false,
        },
        MissingPlayer {
            name: "Luke Shaw".to_string(),
            position: PlayerPosition::Defender,
            reason: "injury".to_string(),
            return_date: None,
            is_top_scorer: false,
            is_first_choice_keeper: false,
        },
    ];
    db::replace_injuries(pool, "epl_8", &man_utd_missing).await?;

    let leicester_missing = vec![MissingPlayer {
        name: "Mads Hermansen".to_string(),
        position: PlayerPosition::Goalkeeper,
        reason: "injury".to_string(),
        return_date: Some(now + Duration::days(14)),
        is_top_scorer: false,
        is_first_choice_keeper: true,
    }];
    db::replace_injuries(pool, "epl_18", &leicester_missing).await?;

    let spurs_missing = vec![MissingPlayer {
        name: "James Maddison".to_string(),
        position: PlayerPosition::Midfielder,
        reason: "suspension".to_string(),
        return_date: Some(now + Duration::days(7)),
        is_top_scorer: false,
        is_first_choice_keeper: false,
    }];
    db::replace_injuries(pool, "epl_6", &spurs_missing).await?;

    // ── Upcoming fixtures ────────────────────────────────────────────────────
    // (id, home_id, away_id, days_ahead)
    let upcoming: Vec<(&str, &str, &str, i64)> = vec![
        ("epl_u1", "epl_1",  "epl_2",  2),
        ("epl_u2", "epl_3",  "epl_4",  2),
        ("epl_u3", "epl_6",  "epl_8",  3),
        ("epl_u4", "epl_5",  "epl_7",  3),
        ("epl_u5", "epl_9",  "epl_14", 4),
        ("epl_u6", "epl_18", "epl_20", 4),
        ("epl_u7", "epl_11", "epl_12", 5),
        ("epl_u8", "epl_15", "epl_19", 5),
    ];

    for (id, home, away, days_ahead) in &upcoming {
        db::insert_fixture(
            pool,
            &Fixture {
                id: id.to_string(),
                home_team_id: home.to_string(),
                away_team_id: away.to_string(),
                home_team_name: name_map[home].to_string(),
                away_team_name: name_map[away].to_string(),
                league: "EPL".to_string(),
                kickoff: now + Duration::days(*days_ahead),
                status: "scheduled".to_string(),
                created_at: now,
                updated_at: now,
            },
        )
        .await?;
    }

    // ── Third-party baselines for the marquee fixtures ───────────────────────
    db::upsert_baseline(
        pool,
        "epl_u1",
        &BaselineExternalPrediction {
            source: "oddsmaker-consensus".to_string(),
            home_pct: 42.0,
            draw_pct: 27.0,
            away_pct: 31.0,
            over25_pct: Some(61.0),
            btts_pct: Some(64.0),
        },
    )
    .await?;

    db::upsert_baseline(
        pool,
        "epl_u2",
        &BaselineExternalPrediction {
            source: "oddsmaker-consensus".to_string(),
            home_pct: 55.0,
            draw_pct: 24.0,
            away_pct: 21.0,
            over25_pct: Some(57.0),
            btts_pct: None,
        },
    )
    .await?;

    tracing::info!(
        "EPL data seeded: {} teams, {} results, {} fixtures",
        20,
        results.len(),
        upcoming.len()
    );
    Ok(())
}

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::api::rank_teams_by_name;
use crate::config::EngineConfig;
use crate::db;
use crate::models::{PredictionResult, TeamFormSnapshot};
use crate::services::data_fetcher::DataFetcher;
use crate::services::{MetricsProvider, PredictionOrchestrator};
use crate::utils::{probability_to_odds, round2};

async fn build_orchestrator(pool: &SqlitePool) -> Arc<PredictionOrchestrator> {
    let config = EngineConfig::from_env();
    let metrics = MetricsProvider::sqlite(pool.clone(), config.fetch_timeout);
    Arc::new(PredictionOrchestrator::new(metrics, config))
}

pub async fn sync_data() -> Result<()> {
    let pool = db::create_pool().await?;
    db::init_database_with_pool(&pool).await?;
    let fetcher = DataFetcher::new();

    println!("📥 Syncing upstream data...");
    fetcher.fetch_all_data(&pool).await?;
    println!("✅ Upstream data synced!");

    Ok(())
}

pub async fn seed_demo_data() -> Result<()> {
    let pool = db::create_pool().await?;
    db::init_database_with_pool(&pool).await?;

    println!("🌱 Seeding demo data...");
    db::seed_data(&pool).await?;
    println!("✅ Demo data ready. Try: matchcast predict --fixture epl_u1");

    Ok(())
}

pub async fn predict_fixture(fixture_id: &str) -> Result<()> {
    let pool = db::create_pool().await?;
    let orchestrator = build_orchestrator(&pool).await;

    println!("🔮 Predicting fixture {}...\n", fixture_id);

    match orchestrator.predict(fixture_id).await {
        Ok(prediction) => {
            db::insert_prediction(&pool, &prediction).await?;
            print_prediction(&prediction);
        }
        Err(e) if e.is_not_found() => {
            println!("❌ {}", e);
            println!("💡 List fixtures with: matchcast upcoming");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Predicts the next scheduled meeting of the pair, home side first.
pub async fn predict_pair(home_team_id: &str, away_team_id: &str) -> Result<()> {
    let pool = db::create_pool().await?;
    let orchestrator = build_orchestrator(&pool).await;

    println!(
        "🔮 Predicting next {} vs {} fixture...\n",
        home_team_id, away_team_id
    );

    match orchestrator.predict_by_teams(home_team_id, away_team_id).await {
        Ok(prediction) => {
            db::insert_prediction(&pool, &prediction).await?;
            print_prediction(&prediction);
        }
        Err(e) if e.is_not_found() => {
            println!("❌ {}", e);
            println!("💡 Find team ids with: matchcast team --name <name>");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

pub async fn predict_batch(fixture_ids: &[String]) -> Result<()> {
    let pool = db::create_pool().await?;
    let orchestrator = build_orchestrator(&pool).await;

    println!("🔮 Predicting {} fixtures...\n", fixture_ids.len());

    let batch = orchestrator.predict_batch(fixture_ids).await;
    for entry in batch {
        match entry.result {
            Ok(prediction) => {
                db::insert_prediction(&pool, &prediction).await?;
                println!(
                    "{} vs {}: {:.1}% / {:.1}% / {:.1}% ({} confidence)",
                    prediction.home_team,
                    prediction.away_team,
                    prediction.home_win_probability,
                    prediction.draw_probability,
                    prediction.away_win_probability,
                    prediction.confidence_level.as_str(),
                );
            }
            Err(e) => println!("{}: ❌ {}", entry.fixture_id, e),
        }
    }

    Ok(())
}

pub async fn show_upcoming() -> Result<()> {
    let pool = db::create_pool().await?;
    let fixtures = db::get_upcoming_fixtures(&pool, 20).await?;

    if fixtures.is_empty() {
        println!("📭 No upcoming fixtures. Try: matchcast sync  (or: matchcast seed)");
        return Ok(());
    }

    println!("📅 Upcoming fixtures:\n");
    for f in fixtures {
        println!(
            "   {}  {} vs {}  ({})",
            f.id,
            f.home_team_name,
            f.away_team_name,
            f.kickoff.format("%Y-%m-%d %H:%M"),
        );
    }
    println!("\n💡 Predict one with: matchcast predict --fixture <id>");

    Ok(())
}

pub async fn query_team(team_name: &str) -> Result<()> {
    let pool = db::create_pool().await?;

    println!("🔍 Searching for team: {}", team_name);

    let matches = rank_teams_by_name(db::get_all_teams(&pool).await?, team_name);
    let Some(team) = matches.first() else {
        println!("❌ No teams found matching '{}'", team_name);
        return Ok(());
    };
    if matches.len() > 1 {
        println!(
            "📋 {} teams matched; showing the closest: {}",
            matches.len(),
            team.name
        );
    }

    println!("\n📊 {} ({})", team.name, team.league);

    let results = db::get_recent_results(&pool, &team.id, 10).await?;
    let form = TeamFormSnapshot::from_results(&team.id, &team.name, results);
    if form.last_results.is_empty() {
        println!("   No finished matches on record");
    } else {
        println!(
            "   Form rating: {:.1}/10 (streak {})",
            form.form_rating, form.current_streak
        );
        println!(
            "   Goals: {:.2} scored / {:.2} conceded per game",
            form.avg_goals_scored, form.avg_goals_conceded
        );
        println!(
            "   Clean sheets: {:.0}% | Both teams scored: {:.0}%",
            form.clean_sheet_rate * 100.0,
            form.btts_rate * 100.0
        );
    }

    if let Some(context) = db::get_standings_context(&pool, &team.id).await? {
        let situation = if context.in_title_race {
            "in the title race"
        } else if context.in_relegation_battle {
            "in a relegation battle"
        } else if context.in_european_race {
            "chasing European places"
        } else {
            "mid-table"
        };
        println!(
            "   Table: {}. with {} pts — {} (motivation {:.1}/10)",
            context.position, context.points, situation, context.motivation_level
        );
    }

    println!("\n📅 Next fixtures:");
    let upcoming: Vec<_> = db::get_upcoming_fixtures(&pool, 100)
        .await?
        .into_iter()
        .filter(|f| f.home_team_id == team.id || f.away_team_id == team.id)
        .take(5)
        .collect();
    if upcoming.is_empty() {
        println!("   None scheduled");
    } else {
        for f in upcoming {
            let (venue, opponent) = if f.home_team_id == team.id {
                ("vs", f.away_team_name)
            } else {
                ("at", f.home_team_name)
            };
            println!(
                "   {}  {} {}  [{}]",
                f.kickoff.format("%m/%d %H:%M"),
                venue,
                opponent,
                f.id
            );
        }
    }

    Ok(())
}

fn print_prediction(p: &PredictionResult) {
    println!("⚽ {} vs {}", p.home_team, p.away_team);
    println!(
        "   Home {:.1}% | Draw {:.1}% | Away {:.1}%",
        p.home_win_probability, p.draw_probability, p.away_win_probability
    );
    println!(
        "   Fair odds: {:.2} / {:.2} / {:.2}",
        probability_to_odds(p.home_win_probability),
        probability_to_odds(p.draw_probability),
        probability_to_odds(p.away_win_probability),
    );
    println!(
        "   Predicted score: {}-{} (xG {:.2} vs {:.2})",
        p.predicted_score.0, p.predicted_score.1, p.expected_goals_home, p.expected_goals_away
    );
    println!(
        "   Over 2.5: {:.1}% | BTTS: {:.1}%",
        p.over_25_probability, p.btts_probability
    );

    if !p.top_scorelines.is_empty() {
        let lines: Vec<String> = p
            .top_scorelines
            .iter()
            .map(|s| format!("{}-{} ({:.1}%)", s.home_goals, s.away_goals, s.probability))
            .collect();
        println!("   Likely scorelines: {}", lines.join(", "));
    }

    println!(
        "\n   Confidence: {:.1}% ({}) | Risk: {} | Data completeness: {:.0}%",
        round2(p.confidence),
        p.confidence_level.as_str(),
        p.risk_assessment.as_str(),
        p.data_completeness
    );

    if p.value_bets.is_empty() {
        println!("   No value bets flagged.");
    } else {
        println!("\n💰 Value bets:");
        for bet in &p.value_bets {
            println!(
                "   {:?} → {} at {:.1}% ({} tier, stake {:.1}u)",
                bet.market,
                bet.selection,
                bet.probability,
                bet.confidence_tier.as_str(),
                bet.suggested_stake
            );
        }
    }
}

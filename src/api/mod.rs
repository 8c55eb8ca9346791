use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::EngineConfig;
use crate::db;
use crate::models::{ApiResponse, Fixture, PredictionResult, Team};
use crate::services::data_fetcher::DataFetcher;
use crate::services::{MetricsProvider, PredictionOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub orchestrator: Arc<PredictionOrchestrator>,
}

pub async fn serve(port: u16) -> anyhow::Result<()> {
    let pool = db::create_pool().await?;
    db::init_database_with_pool(&pool).await?;

    let config = EngineConfig::from_env();
    let metrics = MetricsProvider::sqlite(pool.clone(), config.fetch_timeout);
    let orchestrator = Arc::new(PredictionOrchestrator::new(metrics, config));

    let app = create_router().with_state(AppState { pool, orchestrator });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Matchcast API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/fixtures/upcoming", get(upcoming_fixtures_handler))
        .route("/predictions/{fixture_id}", get(predict_fixture_handler))
        .route("/predictions/batch", post(predict_batch_handler))
        .route("/teams/search", get(search_teams_handler))
        .route("/data/sync", post(sync_data_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("Matchcast API is running"))
}

type ApiError = (StatusCode, Json<ApiResponse<()>>);

fn error_response(status: StatusCode, message: String) -> ApiError {
    (status, Json(ApiResponse::error(message)))
}

// GET /fixtures/upcoming — fixtures plus their most recent stored prediction
#[derive(Deserialize)]
struct UpcomingQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct UpcomingFixture {
    fixture: Fixture,
    last_prediction: Option<PredictionResult>,
}

async fn upcoming_fixtures_handler(
    State(state): State<AppState>,
    Query(params): Query<UpcomingQuery>,
) -> Result<Json<ApiResponse<Vec<UpcomingFixture>>>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    match db::get_upcoming_fixtures(&state.pool, limit).await {
        Ok(fixtures) => {
            let mut out = Vec::with_capacity(fixtures.len());
            for fixture in fixtures {
                let last_prediction = db::get_latest_prediction(&state.pool, &fixture.id)
                    .await
                    .ok()
                    .flatten();
                out.push(UpcomingFixture { fixture, last_prediction });
            }
            Ok(Json(ApiResponse::success(out)))
        }
        Err(e) => {
            tracing::error!("Failed to fetch upcoming fixtures: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to fetch upcoming fixtures".to_string(),
            ))
        }
    }
}

// GET /predictions/{fixture_id} — runs the pipeline and persists the result
async fn predict_fixture_handler(
    State(state): State<AppState>,
    Path(fixture_id): Path<String>,
) -> Result<Json<ApiResponse<PredictionResult>>, ApiError> {
    match state.orchestrator.predict(&fixture_id).await {
        Ok(prediction) => {
            if let Err(e) = db::insert_prediction(&state.pool, &prediction).await {
                tracing::warn!("Failed to persist prediction for {}: {}", fixture_id, e);
            }
            Ok(Json(ApiResponse::success(prediction)))
        }
        Err(e) if e.is_not_found() => Err(error_response(StatusCode::NOT_FOUND, e.to_string())),
        Err(e) => {
            tracing::error!("Prediction failed for {}: {}", fixture_id, e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "prediction failed".to_string(),
            ))
        }
    }
}

// POST /predictions/batch
#[derive(Deserialize)]
struct BatchRequest {
    fixture_ids: Vec<String>,
}

#[derive(Serialize)]
struct BatchEntry {
    fixture_id: String,
    prediction: Option<PredictionResult>,
    error: Option<String>,
}

async fn predict_batch_handler(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<ApiResponse<Vec<BatchEntry>>>, ApiError> {
    if request.fixture_ids.is_empty() || request.fixture_ids.len() > 50 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "fixture_ids must contain between 1 and 50 ids".to_string(),
        ));
    }

    let batch = state.orchestrator.predict_batch(&request.fixture_ids).await;

    let mut entries = Vec::with_capacity(batch.len());
    for item in batch {
        match item.result {
            Ok(prediction) => {
                if let Err(e) = db::insert_prediction(&state.pool, &prediction).await {
                    tracing::warn!(
                        "Failed to persist prediction for {}: {}",
                        item.fixture_id,
                        e
                    );
                }
                entries.push(BatchEntry {
                    fixture_id: item.fixture_id,
                    prediction: Some(prediction),
                    error: None,
                });
            }
            Err(e) => entries.push(BatchEntry {
                fixture_id: item.fixture_id,
                prediction: None,
                error: Some(e.to_string()),
            }),
        }
    }

    Ok(Json(ApiResponse::success(entries)))
}

// GET /teams/search?name=
#[derive(Deserialize)]
struct SearchQuery {
    name: String,
}

async fn search_teams_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<Team>>>, ApiError> {
    match db::get_all_teams(&state.pool).await {
        Ok(teams) => Ok(Json(ApiResponse::success(rank_teams_by_name(
            teams,
            &params.name,
        )))),
        Err(e) => {
            tracing::error!("Failed to search teams: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "team search failed".to_string(),
            ))
        }
    }
}

/// Jaro-Winkler ranking; substring hits sort ahead of fuzzy ones.
pub fn rank_teams_by_name(teams: Vec<Team>, query: &str) -> Vec<Team> {
    let needle = query.to_lowercase();
    let mut scored: Vec<(f64, Team)> = teams
        .into_iter()
        .filter_map(|team| {
            let name = team.name.to_lowercase();
            let score = if name.contains(&needle) {
                1.0
            } else {
                strsim::jaro_winkler(&name, &needle)
            };
            (score > 0.6).then_some((score, team))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(10).map(|(_, team)| team).collect()
}

// POST /data/sync — pull fresh data from the upstream APIs
async fn sync_data_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let fetcher = DataFetcher::new();
    match fetcher.fetch_all_data(&state.pool).await {
        Ok(()) => Ok(Json(ApiResponse::success(
            "Upstream data synced".to_string(),
        ))),
        Err(e) => {
            tracing::error!("Data sync failed: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "data sync failed".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn team(name: &str) -> Team {
        Team {
            id: name.to_lowercase().replace(' ', "_"),
            name: name.to_string(),
            league: "EPL".to_string(),
            logo_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn substring_matches_rank_first() {
        let teams = vec![
            team("Manchester United"),
            team("Manchester City"),
            team("Southampton"),
        ];
        let ranked = rank_teams_by_name(teams, "manchester");
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|t| t.name.starts_with("Manchester")));
    }

    #[test]
    fn fuzzy_matches_tolerate_typos() {
        let teams = vec![team("Liverpool"), team("Brentford")];
        let ranked = rank_teams_by_name(teams, "livrpool");
        assert_eq!(ranked[0].name, "Liverpool");
    }

    #[test]
    fn unrelated_names_are_filtered_out() {
        let teams = vec![team("Arsenal"), team("Wolves")];
        let ranked = rank_teams_by_name(teams, "zzzzqqq");
        assert!(ranked.is_empty());
    }
}

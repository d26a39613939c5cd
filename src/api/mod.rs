use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::cache::{CacheKey, MatchCache};
use crate::refresh::{Refresher, StatsView};
use crate::sports::{Match, Sport};

#[derive(Clone)]
pub struct AppState {
    pub cache: MatchCache,
    pub refresher: Arc<Refresher>,
}

/// Build the Axum router for the read API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck_handler))
        .route("/api/matches/:sport", get(matches_handler))
        .route("/api/status", get(status_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

async fn healthcheck_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "ok" }))
}

#[derive(Debug, Default, Deserialize)]
pub struct MatchesQuery {
    /// Defaults to live matches.
    pub live: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct MatchesResponse {
    pub sport: Sport,
    pub live: bool,
    pub refreshed_at: DateTime<Utc>,
    pub matches: Vec<Match>,
}

/// GET /api/matches/:sport?live=true
async fn matches_handler(
    State(state): State<Arc<AppState>>,
    Path(sport): Path<String>,
    Query(query): Query<MatchesQuery>,
) -> Result<Json<MatchesResponse>, (StatusCode, String)> {
    let sport: Sport = sport
        .parse()
        .map_err(|e: String| (StatusCode::BAD_REQUEST, e))?;
    let live = query.live.unwrap_or(true);

    match state.cache.get(sport, live).await {
        Some(snapshot) => Ok(Json(MatchesResponse {
            sport,
            live,
            refreshed_at: snapshot.refreshed_at,
            matches: snapshot.matches.to_vec(),
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            format!("no matches found for {}", CacheKey::new(sport, live)),
        )),
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotStatus {
    pub key: CacheKey,
    pub matches: usize,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub refresh: StatsView,
    pub snapshots: Vec<SnapshotStatus>,
}

/// GET /api/status
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshots = state
        .cache
        .populated()
        .await
        .into_iter()
        .map(|(key, snapshot)| SnapshotStatus {
            key,
            matches: snapshot.matches.len(),
            refreshed_at: snapshot.refreshed_at,
        })
        .collect();
    Json(StatusResponse {
        refresh: state.refresher.stats(),
        snapshots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sports::models::{Score, Team};
    use crate::sports::{FetchError, MatchSource, RawMatch};
    use async_trait::async_trait;
    use std::time::Duration;

    struct EmptySource;

    #[async_trait]
    impl MatchSource for EmptySource {
        fn name(&self) -> &str {
            "empty"
        }

        async fn fetch_matches(&self, _: Sport, _: bool) -> Result<Vec<RawMatch>, FetchError> {
            Ok(vec![])
        }
    }

    fn state() -> Arc<AppState> {
        let cache = MatchCache::new();
        let refresher = Arc::new(Refresher::new(
            Arc::new(EmptySource),
            cache.clone(),
            Duration::from_secs(1),
        ));
        Arc::new(AppState { cache, refresher })
    }

    fn tennis_match() -> Match {
        Match {
            sport: Sport::Tennis,
            home: Team { name: "Sinner".into() },
            away: Team { name: "Alcaraz".into() },
            score: Score {
                home: vec!["6".into(), "3".into()],
                away: vec!["4".into(), "6".into()],
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_matches_not_found_before_first_publish() {
        let state = state();
        let err = matches_handler(
            State(state),
            Path("basketball".into()),
            Query(MatchesQuery { live: Some(false) }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_matches_defaults_to_live() {
        let state = state();
        state.cache.put(Sport::Tennis, true, vec![tennis_match()]).await;

        let Json(body) = matches_handler(
            State(state),
            Path("Tennis".into()),
            Query(MatchesQuery::default()),
        )
        .await
        .unwrap();
        assert!(body.live);
        assert_eq!(body.matches.len(), 1);
        assert_eq!(body.matches[0].away.name, "Alcaraz");
    }

    #[tokio::test]
    async fn test_unknown_sport_is_bad_request() {
        let err = matches_handler(
            State(state()),
            Path("cricket".into()),
            Query(MatchesQuery::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_reports_published_keys() {
        let state = state();
        state.cache.put(Sport::Basketball, false, vec![]).await;

        let Json(body) = status_handler(State(state)).await;
        assert_eq!(body.refresh.cycles, 0);
        assert_eq!(body.snapshots.len(), 1);
        assert_eq!(body.snapshots[0].key, CacheKey::new(Sport::Basketball, false));
        assert_eq!(body.snapshots[0].matches, 0);
    }

    #[test]
    fn test_match_serializes_with_lowercase_sport() {
        let json = serde_json::to_value(tennis_match()).unwrap();
        assert_eq!(json["sport"], "tennis");
        assert_eq!(json["score"]["home"][1], "3");
    }
}

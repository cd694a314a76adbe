use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::db::models::SeverityCounts;
use crate::db::FlagStore;
use crate::engine::{CycleReport, Severity};
use crate::runner::{CycleStatus, SharedState};

#[derive(Clone)]
pub struct AppState {
    pub store: FlagStore,
    pub shared: Arc<SharedState>,
}

/// Build the Axum router for the results API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/report", get(report_handler))
        .route("/api/ev", get(ev_handler))
        .route("/api/arbitrage", get(arbitrage_handler))
        .route("/api/flagged", get(flagged_handler))
        .route("/api/flagged/audit", get(audit_list_handler))
        .route("/api/flagged/audit/:id", get(audit_record_handler))
        .route("/api/cycles", get(cycles_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    /// Only live (`true`) or only pre-game (`false`) results
    pub live: Option<bool>,
    pub severity: Option<String>,
}

impl ListQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(100).min(1000)
    }

    fn severity(&self) -> Result<Option<Severity>, (StatusCode, String)> {
        match self.severity.as_deref() {
            None => Ok(None),
            Some(s) => Severity::parse(s)
                .map(Some)
                .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("unknown severity '{}'", s))),
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    cycle: &'static str,
    detail: Option<String>,
    flag_history: usize,
    flag_counts: SeverityCounts,
}

/// Latest completed report, or 503 when the last cycle did not complete.
async fn latest_report(state: &AppState) -> Result<Arc<CycleReport>, (StatusCode, String)> {
    match &*state.shared.status.read().await {
        CycleStatus::Completed { report, .. } => Ok(Arc::clone(report)),
        CycleStatus::Pending => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "no refresh cycle has completed yet".to_string(),
        )),
        CycleStatus::TimedOut { message, .. } | CycleStatus::Failed { message, .. } => {
            Err((StatusCode::SERVICE_UNAVAILABLE, message.clone()))
        }
    }
}

/// GET /api/health
async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (cycle, detail) = {
        let status = state.shared.status.read().await;
        let detail = match &*status {
            CycleStatus::TimedOut { message, .. } | CycleStatus::Failed { message, .. } => {
                Some(message.clone())
            }
            _ => None,
        };
        (status.as_str(), detail)
    };
    let flag_history = state.shared.history.lock().await.len();
    let flag_counts = state
        .store
        .severity_counts()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(Health {
        cycle,
        detail,
        flag_history,
        flag_counts,
    }))
}

/// GET /api/report
async fn report_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    latest_report(&state).await.map(|r| Json((*r).clone()))
}

/// GET /api/ev?limit=50&live=true
async fn ev_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report = latest_report(&state).await?;
    let opps: Vec<_> = report
        .ev_opportunities
        .iter()
        .filter(|o| q.live.map_or(true, |live| o.is_live == live))
        .take(q.limit())
        .cloned()
        .collect();
    Ok(Json(opps))
}

/// GET /api/arbitrage?limit=50&live=false
async fn arbitrage_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report = latest_report(&state).await?;
    let arbs: Vec<_> = report
        .arbitrage_opportunities
        .iter()
        .filter(|a| q.live.map_or(true, |live| a.is_live == live))
        .take(q.limit())
        .cloned()
        .collect();
    Ok(Json(arbs))
}

/// GET /api/flagged?severity=suspicious (in-memory review history)
async fn flagged_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let severity = q.severity()?;
    let history = state.shared.history.lock().await;
    let records: Vec<_> = history
        .recent(usize::MAX)
        .into_iter()
        .filter(|r| severity.map_or(true, |s| r.severity == s))
        .take(q.limit())
        .collect();
    Ok(Json(records))
}

/// GET /api/flagged/audit (persisted flag summaries)
async fn audit_list_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let severity = q.severity()?;
    state
        .store
        .list_recent_flags(q.limit() as i64, severity.map(Severity::as_str))
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/flagged/audit/:id (one record with its input snapshot)
async fn audit_record_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.store.get_flag(id) {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("no flagged record {}", id))),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// GET /api/cycles
async fn cycles_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .store
        .list_cycles(50)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

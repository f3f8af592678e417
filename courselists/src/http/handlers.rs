use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
    GovernorLayer,
};
use tracing::{debug, info};

use crate::mailing_list::{suggested_name, MailingList};

use super::auth::require_site_role;
use super::error::ApiError;
use super::responses::{
    csv_attachment, welcome_log_csv, welcome_log_filename, CreateListRequest, HealthResponse,
    PopulateResponse,
};
use super::state::AppState;

pub fn router(state: AppState) -> Router {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(20)
            .burst_size(50)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .expect("default governor config is valid"),
    );

    Router::new()
        .route("/health", get(health))
        .route("/api/mailing_lists/{site_id}", get(get_mailing_list))
        .route("/api/mailing_lists/{site_id}/create", post(create_mailing_list))
        .route(
            "/api/mailing_lists/{site_id}/suggested_name",
            get(get_suggested_name),
        )
        .route(
            "/api/mailing_lists/{site_id}/download/welcome_email_log",
            get(download_welcome_email_log),
        )
        .route(
            "/api/mailing_lists/{site_id}/populate",
            post(populate_mailing_list),
        )
        .layer(GovernorLayer::new(governor_conf))
        .layer(
            tower_http::request_id::SetRequestIdLayer::new(
                axum::http::header::HeaderName::from_static("x-request-id"),
                tower_http::request_id::MakeRequestUuid::default(),
            ),
        )
        .layer(tower_http::request_id::PropagateRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mailing_lists: state.lists.len(),
    })
}

/// The site's mailing list, or `null` when the site has none yet.
async fn get_mailing_list(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Option<MailingList>>, ApiError> {
    require_site_role(&state, &headers, &site_id).await?;
    let list = state.lists.find_by_site_id(&site_id);
    debug!(%site_id, found = list.is_some(), "mailing list requested");
    Ok(Json(list))
}

async fn create_mailing_list(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    headers: HeaderMap,
    payload: Option<Json<CreateListRequest>>,
) -> Result<Json<MailingList>, ApiError> {
    let course = require_site_role(&state, &headers, &site_id).await?;

    // A blank or whitespace-only name means "pick one for me".
    let name = payload
        .and_then(|Json(request)| request.name)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    let list = state
        .lists
        .create(&course, name.as_deref(), &state.list_domain)?;
    info!(%site_id, name = %list.name, "mailing list created via API");
    Ok(Json(list))
}

async fn get_suggested_name(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<String>, ApiError> {
    let course = require_site_role(&state, &headers, &site_id).await?;
    Ok(Json(suggested_name(&course)))
}

async fn download_welcome_email_log(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    require_site_role(&state, &headers, &site_id).await?;
    let list = state
        .lists
        .find_by_site_id(&site_id)
        .ok_or_else(|| no_list_error(&site_id))?;

    let members = state.lists.members_of(&list.id);
    let body = welcome_log_csv(&members);
    let filename = welcome_log_filename(&site_id, Local::now());
    debug!(%site_id, members = members.len(), %filename, "welcome email log downloaded");
    csv_attachment(&filename, body)
}

async fn populate_mailing_list(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PopulateResponse>, ApiError> {
    require_site_role(&state, &headers, &site_id).await?;
    if state.lists.find_by_site_id(&site_id).is_none() {
        return Err(no_list_error(&site_id));
    }

    let roster = state.courses.get_roster(&site_id).await?;
    let (mailing_list, summary) = state
        .lists
        .populate(&site_id, &roster)
        .ok_or_else(|| no_list_error(&site_id))?;
    info!(
        %site_id,
        roster = roster.len(),
        changes = summary.total_changes(),
        "mailing list populated via API"
    );
    Ok(Json(PopulateResponse {
        mailing_list,
        summary,
    }))
}

fn no_list_error(site_id: &str) -> ApiError {
    ApiError::NotFound(format!("No mailing list found for course site {site_id}"))
}

use axum::http::HeaderMap;
use tracing::{debug, warn};

use crate::canvas::Course;

use super::error::ApiError;
use super::state::AppState;

/// Header carrying the caller's LMS user id. Set by the portal in front of
/// this service; session handling happens there, not here.
pub const CALLER_UID_HEADER: &str = "x-canvas-user-id";

/// Role guard run before every mailing-list handler body.
///
/// Resolves the course site first, so a nonexistent site is a 404 no matter
/// who asks. Then the caller must hold Teacher, TA, Lead TA, or Reader on
/// the site. Returns the course so handlers do not fetch it twice.
pub async fn require_site_role(
    state: &AppState,
    headers: &HeaderMap,
    site_id: &str,
) -> Result<Course, ApiError> {
    let uid = headers
        .get(CALLER_UID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
        .ok_or(ApiError::Unauthorized)?;

    let course = state
        .courses
        .get_course(site_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No course site with ID \"{site_id}\" was found."))
        })?;

    match state.courses.get_user_role(site_id, uid).await? {
        Some(role) if role.can_manage_mailing_lists() => {
            debug!(site_id, uid, ?role, "authorized by course role");
            Ok(course)
        }
        role => {
            warn!(site_id, uid, ?role, "caller lacks a mailing list role");
            Err(ApiError::Forbidden)
        }
    }
}

//! HTTP layer: Axum router, role guard, handlers, and responses.
//!
//! Exposes the mailing-list endpoints under `/api/mailing_lists/{site_id}`
//! plus a `/health` liveness route.

mod auth;
mod error;
mod handlers;
mod responses;
mod state;


pub use handlers::router;
pub use state::AppState;

//! # courselists
//!
//! Course mailing-list service for an educational administration portal.
//!
//! Manages one email distribution list per course site in the external
//! course-management system (LMS): creation with validated or suggested
//! names, membership sync against the course roster, and a CSV log of
//! welcome messages. Callers are authorized by their course role.
//!
//! ## Architecture
//!
//! - **Canvas client**: LMS REST access behind the `CourseApi` trait
//! - **Mailing lists**: in-memory model with soft-deleted members
//! - **HTTP**: Axum router with a per-site role guard, rate limiting,
//!   request IDs, and graceful shutdown

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod canvas;
mod config;
mod http;
mod mailing_list;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::canvas::CanvasClient;
use crate::config::{AppConfig, Cli};
use crate::http::{router, AppState};
use crate::mailing_list::ListStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;
    info!(
        bind = %config.bind,
        canvas_base_url = %config.canvas_base_url,
        list_domain = %config.list_domain,
        "configuration loaded"
    );

    let courses = CanvasClient::new(config.canvas_base_url.clone(), config.canvas_token.clone());
    let state = AppState {
        courses: Arc::new(courses),
        lists: ListStore::new(),
        list_domain: config.list_domain,
    };

    let app = router(state);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "courselists listening");

    serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = shutdown.await;
        info!("shutting down gracefully");
    })
    .await
    .context("server exited with error")
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}

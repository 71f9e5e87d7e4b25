//! Credential capture portal.
//!
//! A single route, `/`: `GET` serves the form, `POST` provisions the
//! submitted network. The server stops when the terminate token fires.

mod handlers;
mod html;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::provision::Provisioner;
use crate::shutdown::ShutdownSequencer;

pub use handlers::CredentialForm;
pub use html::render_form;

pub struct PortalState {
    pub provisioner: Arc<Provisioner>,
    pub shutdown: Arc<ShutdownSequencer>,
}

impl PortalState {
    pub fn new(provisioner: Arc<Provisioner>, shutdown: Arc<ShutdownSequencer>) -> Self {
        Self {
            provisioner,
            shutdown,
        }
    }
}

pub fn router(state: PortalState) -> Router {
    Router::new()
        .route("/", get(handlers::index).post(handlers::submit))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve the portal on `listener` until `terminate` is cancelled.
pub async fn serve(listener: TcpListener, state: PortalState, terminate: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Portal started at http://{addr}");

    let app = router(state);
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result.context("Portal server failed"),
        _ = terminate.cancelled() => {
            info!("Portal stopped");
            Ok(())
        }
    }
}

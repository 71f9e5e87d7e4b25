use axum::{
    Form,
    body::Body,
    extract::{State, rejection::FormRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use super::PortalState;
use super::html;
use crate::provision::ProvisioningOutcome;

/// Form body of a submission. Missing fields read as empty and fail
/// validation like blank ones.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialForm {
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

pub async fn index() -> Response {
    let (status, page) = page(None, false, StatusCode::OK);
    (status, Html(page)).into_response()
}

pub async fn submit(
    State(state): State<Arc<PortalState>>,
    form: Result<Form<CredentialForm>, FormRejection>,
) -> Response {
    // An unreadable body is treated like an empty form.
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!("Unreadable form body: {rejection}");
            CredentialForm::default()
        }
    };
    info!(ssid = %form.ssid.trim(), "Credential submission received");

    let provisioner = Arc::clone(&state.provisioner);
    let outcome = match tokio::task::spawn_blocking(move || {
        provisioner.submit(&form.ssid, &form.password)
    })
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Provisioning task failed: {e}");
            ProvisioningOutcome::ConnectionError
        }
    };

    let (status, page) = page(Some(outcome.message()), outcome.is_error(), status_for(outcome));
    if outcome != ProvisioningOutcome::Success {
        return (status, Html(page)).into_response();
    }

    let (body, delivered) = delivery_tracked(page);
    if state.shutdown.schedule(delivered).is_none() {
        debug!("Shutdown was already armed by an earlier submission");
    }
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

fn status_for(outcome: ProvisioningOutcome) -> StatusCode {
    match outcome {
        ProvisioningOutcome::Success => StatusCode::OK,
        ProvisioningOutcome::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
        ProvisioningOutcome::PersistenceError => StatusCode::INTERNAL_SERVER_ERROR,
        ProvisioningOutcome::ConnectionError => StatusCode::BAD_GATEWAY,
    }
}

fn page(message: Option<&str>, is_error: bool, status: StatusCode) -> (StatusCode, String) {
    match html::render_form(message, is_error) {
        Ok(page) => (status, page),
        Err(e) => {
            error!("Template render error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error".to_string())
        }
    }
}

/// Single-chunk response body that signals `delivered` once the HTTP layer
/// has consumed and dropped it.
struct TrackedBody {
    chunk: Option<Bytes>,
    delivered: Option<oneshot::Sender<()>>,
}

impl Stream for TrackedBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunk.take().map(Ok))
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        if let Some(tx) = self.delivered.take() {
            let _ = tx.send(());
        }
    }
}

fn delivery_tracked(page: String) -> (Body, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    let body = TrackedBody {
        chunk: Some(Bytes::from(page)),
        delivered: Some(tx),
    };
    (Body::from_stream(body), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracked_body_signals_after_it_is_consumed() {
        let (body, mut delivered) = delivery_tracked("<p>ok</p>".to_string());
        assert!(delivered.try_recv().is_err());

        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<p>ok</p>");
        assert!(delivered.await.is_ok());
    }

    #[test]
    fn failures_map_to_distinct_statuses() {
        assert_eq!(status_for(ProvisioningOutcome::ValidationError), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ProvisioningOutcome::ConnectionError), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ProvisioningOutcome::Success), StatusCode::OK);
    }
}

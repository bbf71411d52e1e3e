//! HTTP surface: a single `/validate` admission webhook endpoint plus the
//! health/readiness probes the kubelet and the webhook registration expect.
//! TLS termination, certificate rotation, and the `ValidatingWebhookConfiguration`
//! itself are external collaborators, not this crate's concern.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{error, warn};

use crate::admission::AdmissionAdapter;
use crate::wire::{AdmissionReviewRequest, AdmissionReviewResponse};

pub fn router(adapter: Arc<AdmissionAdapter>) -> Router {
    Router::new()
        .route("/validate", post(validate))
        .route("/healthz", get(health))
        .route("/readyz", get(health))
        .with_state(adapter)
}

async fn health() -> &'static str {
    "OK"
}

/// Both "body isn't JSON" and "body is JSON but missing the `request` field"
/// are rejected as 400: the envelope is either well-formed or it isn't,
/// there's no 422-worthy distinction for an admission caller to act on.
async fn validate(
    State(adapter): State<Arc<AdmissionAdapter>>,
    body: Result<Json<AdmissionReviewRequest>, JsonRejection>,
) -> Response {
    let envelope = match body {
        Ok(Json(envelope)) => envelope,
        Err(rejection) => {
            warn!(error = %rejection, "malformed admission request body");
            return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
        }
    };

    let uid = envelope.request.uid.clone();
    let response = adapter.review(envelope).await;
    if !response.response.allowed {
        error!(uid = %uid, "webhook denied request");
    }
    Json(response).into_response()
}

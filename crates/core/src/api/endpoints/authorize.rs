use axum::{
    Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::api::ApiState;
use crate::gateway::{ChargeError, ChargeRequest};

/// POST /authorize request body.
///
/// One endpoint, three modes: `diag` echoes non-sensitive configuration,
/// `ping` probes the provider with the configured credentials, and otherwise
/// the body describes a charge attempt.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub diag: bool,
    #[serde(default)]
    pub ping: bool,
    #[serde(default)]
    pub checkout_token: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    /// Accepted as a bare JSON number and validated to be a positive
    /// integer; a fractional amount is as invalid as a missing one.
    #[serde(default)]
    pub amount_cents: Option<f64>,
    #[serde(default)]
    pub capture: Option<bool>,
    #[serde(default)]
    pub shipping_carrier: Option<String>,
    #[serde(default)]
    pub shipping_confirmation: Option<String>,
}

/// POST /authorize endpoint - exchange a checkout token for captured funds
pub async fn handler(
    Extension(state): Extension<ApiState>,
    Json(request): Json<AuthorizeRequest>,
) -> Response {
    if request.diag {
        return diag(&state);
    }
    if request.ping {
        return ping(&state).await;
    }

    let capture = request.capture.unwrap_or(true);
    let charge_request = ChargeRequest {
        checkout_token: request.checkout_token.unwrap_or_default(),
        order_id: request.order_id,
        amount_minor: request
            .amount_cents
            .filter(|a| a.is_finite() && a.fract() == 0.0)
            .map(|a| a as i64),
        capture,
        shipping_carrier: request.shipping_carrier,
        shipping_confirmation: request.shipping_confirmation,
    };

    info!(
        order_id = charge_request.order_id.as_deref().unwrap_or(""),
        capture, "received charge attempt"
    );

    match state.gateway.charge(&charge_request).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "charge_id": outcome.charge_id,
                "authorized": true,
                "captured": outcome.captured,
                "authorize": outcome.authorize_body,
                "capture": outcome.capture_body,
            })),
        )
            .into_response(),
        Err(err) => charge_error_response(err),
    }
}

/// Map every gateway failure to the uniform client envelope. Nothing below
/// this boundary is allowed to leave the buyer's UI hanging on an unhandled
/// fault.
fn charge_error_response(err: ChargeError) -> Response {
    match err {
        ChargeError::MissingToken | ChargeError::MissingOrderId | ChargeError::InvalidAmount => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": err.to_string() })),
        )
            .into_response(),
        ChargeError::MissingCredentials => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": err.to_string() })),
        )
            .into_response(),
        ChargeError::Rejected {
            step,
            status,
            body,
            charge_id,
        } => {
            let mut payload = json!({
                "ok": false,
                "step": step.as_str(),
                "error": body,
            });
            if let Some(charge_id) = charge_id {
                payload["charge_id"] = Value::String(charge_id);
            }
            (status, Json(payload)).into_response()
        }
        ChargeError::MissingChargeId { body } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "ok": false,
                "step": "authorize",
                "error": "Authorize succeeded but missing charge id",
                "raw": body,
            })),
        )
            .into_response(),
        ChargeError::Transport { step, source } => {
            error!(step = step.as_str(), error = %source, "charge attempt failed in transport");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "ok": false,
                    "error": "server_error",
                    "name": "TransportError",
                    "message": source.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// Diagnostic mode: configuration echo without contacting the provider.
/// Key material is reported as presence booleans only.
fn diag(state: &ApiState) -> Response {
    let config = &state.config;
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "diag": {
                "base": config.affirm_base.as_str().trim_end_matches('/'),
                "endpoints": {
                    "authorize": state.gateway.authorize_endpoint(),
                    "capture": state.gateway.capture_endpoint_template(),
                },
                "env": {
                    "AFFIRM_ENV": config.environment.as_str(),
                    "HAS_AFFIRM_PUBLIC_KEY": config.has_affirm_keys(),
                    "HAS_AFFIRM_PRIVATE_KEY": config.has_affirm_keys(),
                },
            },
        })),
    )
        .into_response()
}

/// Probe mode: one authenticated read call, no checkout token consumed.
async fn ping(state: &ApiState) -> Response {
    match state.gateway.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "base": state.config.affirm_base.as_str().trim_end_matches('/'),
                "env": state.config.environment.as_str(),
            })),
        )
            .into_response(),
        Err(err) => charge_error_response(err),
    }
}

//! Card rail: one-shot hosted checkout session creation against Stripe.
//!
//! Unlike the financing flow there is no multi-step state machine here; the
//! storefront posts the cart and gets back a redirect URL.

use axum::{
    Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use paylane_types::to_minor_units;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::api::ApiState;

const CHECKOUT_SESSIONS_PATH: &str = "/v1/checkout/sessions";

/// Stripe rejects USD line items under 50 cents.
const MIN_UNIT_MINOR: i64 = 50;

const MAX_NAME_LEN: usize = 120;

/// Payment methods offered on the hosted page: card plus the pay-later
/// options the hosted page can render without extra integration work.
const PAYMENT_METHOD_TYPES: [&str; 4] = ["card", "afterpay_clearpay", "klarna", "zip"];

#[derive(Debug, Deserialize)]
pub struct CardCheckoutRequest {
    #[serde(default)]
    pub items: Vec<CardItemInput>,
}

/// One raw cart row; prices arrive in major units from the storefront.
#[derive(Debug, Deserialize)]
pub struct CardItemInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub qty: Option<f64>,
}

struct CardLineItem {
    name: String,
    unit_amount_minor: i64,
    quantity: i64,
}

/// POST /card/checkout endpoint - create a hosted card checkout session
pub async fn handler(
    Extension(state): Extension<ApiState>,
    Json(request): Json<CardCheckoutRequest>,
) -> Response {
    if request.items.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "items array required");
    }

    let raw_count = request.items.len();
    let line_items = normalize_items(request.items);
    if line_items.is_empty() {
        info!(raw_count, "card checkout had no valid line items");
        return reject(StatusCode::BAD_REQUEST, "no_valid_line_items");
    }
    if line_items.len() < raw_count {
        info!(
            dropped = raw_count - line_items.len(),
            "dropped invalid card line items"
        );
    }

    let Some(secret_key) = state.config.stripe_secret_key.as_deref() else {
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Missing STRIPE_SECRET_KEY env var",
        );
    };

    match create_hosted_session(&state, secret_key, &line_items).await {
        Ok(url) => (StatusCode::OK, Json(json!({ "ok": true, "url": url }))).into_response(),
        Err(CardCheckoutError::Declined { message, code }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": message, "code": code })),
        )
            .into_response(),
        Err(CardCheckoutError::Transport(source)) => {
            error!(error = %source, "card checkout transport failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": source.to_string(), "code": Value::Null })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CardCheckoutError {
    #[error("card processor declined session creation: {message}")]
    Declined {
        message: String,
        code: Option<String>,
    },
    #[error("card processor unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

fn reject(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "ok": false, "error": error }))).into_response()
}

fn normalize_items(items: Vec<CardItemInput>) -> Vec<CardLineItem> {
    items
        .into_iter()
        .filter_map(|item| {
            let name: String = item
                .name
                .unwrap_or_default()
                .trim()
                .chars()
                .take(MAX_NAME_LEN)
                .collect();
            let unit_amount_minor = to_minor_units(item.price.unwrap_or(0.0));
            let quantity = (item.qty.unwrap_or(1.0).trunc() as i64).max(1);

            if name.is_empty() || unit_amount_minor < MIN_UNIT_MINOR {
                return None;
            }
            Some(CardLineItem {
                name,
                unit_amount_minor,
                quantity,
            })
        })
        .collect()
}

/// One form-encoded session-creation call; the response carries the hosted
/// page URL the buyer is redirected to.
async fn create_hosted_session(
    state: &ApiState,
    secret_key: &str,
    line_items: &[CardLineItem],
) -> Result<String, CardCheckoutError> {
    let origin = state.config.merchant_origin.as_str().trim_end_matches('/');

    let mut form: Vec<(String, String)> = vec![
        ("mode".to_string(), "payment".to_string()),
        (
            "success_url".to_string(),
            format!("{origin}/?card=success&session_id={{CHECKOUT_SESSION_ID}}"),
        ),
        ("cancel_url".to_string(), format!("{origin}/?card=cancel")),
    ];
    for (index, method) in PAYMENT_METHOD_TYPES.iter().enumerate() {
        form.push((
            format!("payment_method_types[{index}]"),
            (*method).to_string(),
        ));
    }
    for (index, item) in line_items.iter().enumerate() {
        form.push((
            format!("line_items[{index}][price_data][currency]"),
            "usd".to_string(),
        ));
        form.push((
            format!("line_items[{index}][price_data][product_data][name]"),
            item.name.clone(),
        ));
        form.push((
            format!("line_items[{index}][price_data][unit_amount]"),
            item.unit_amount_minor.to_string(),
        ));
        form.push((
            format!("line_items[{index}][quantity]"),
            item.quantity.to_string(),
        ));
    }

    let base = state.config.stripe_api_base.as_str().trim_end_matches('/');
    let response = reqwest::Client::new()
        .post(format!("{base}{CHECKOUT_SESSIONS_PATH}"))
        .bearer_auth(secret_key)
        .form(&form)
        .send()
        .await?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    info!(status = status.as_u16(), "stripe checkout session");

    if !status.is_success() {
        return Err(CardCheckoutError::Declined {
            message: body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("server_error")
                .to_string(),
            code: body
                .pointer("/error/code")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }

    match body.get("url").and_then(Value::as_str) {
        Some(url) => Ok(url.to_string()),
        None => Err(CardCheckoutError::Declined {
            message: "session created without a redirect url".to_string(),
            code: None,
        }),
    }
}

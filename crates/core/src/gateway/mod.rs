//! Two-phase authorize/capture orchestration against the Affirm Charges v2
//! API.
//!
//! This runs only in a trusted execution context: the capture sequence
//! carries the merchant's private API key. One invocation is one attempt.
//! No server-side retries, no deduplication beyond the provider's own
//! single-use token semantics, and no compensating void on failure (blindly
//! voiding after a transport error could cancel a capture that actually
//! landed provider-side).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use paylane_types::GatewayConfig;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{error, info};

const CHARGES_PATH: &str = "/api/v2/charges";
const PROVIDER_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on response bodies echoed into logs.
const LOG_BODY_LIMIT: usize = 8_000;

/// Which phase of the protocol an error belongs to. The distinction is
/// load-bearing for reconciliation: an authorize failure means the buyer was
/// never charged, a capture failure means an authorized charge is waiting for
/// manual capture or void.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStep {
    Authorize,
    Capture,
}

impl ChargeStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStep::Authorize => "authorize",
            ChargeStep::Capture => "capture",
        }
    }
}

impl fmt::Display for ChargeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One charge attempt, as received from the storefront after the buyer
/// completed the provider's interactive flow.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub checkout_token: String,
    pub order_id: Option<String>,
    pub amount_minor: Option<i64>,
    pub capture: bool,
    pub shipping_carrier: Option<String>,
    pub shipping_confirmation: Option<String>,
}

impl ChargeRequest {
    /// A bare authorize-and-capture attempt; capture defaults to true.
    pub fn new(checkout_token: impl Into<String>) -> Self {
        ChargeRequest {
            checkout_token: checkout_token.into(),
            order_id: None,
            amount_minor: None,
            capture: true,
            shipping_carrier: None,
            shipping_confirmation: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChargeError {
    #[error("Missing checkout_token")]
    MissingToken,
    #[error("Missing order_id (required when capture=true)")]
    MissingOrderId,
    #[error("amount_cents required (positive integer) when capture=true")]
    InvalidAmount,
    #[error("Missing AFFIRM_PUBLIC_KEY or AFFIRM_PRIVATE_KEY env vars")]
    MissingCredentials,
    /// Non-success status from the provider at either phase. The body is
    /// carried verbatim for diagnosability; `charge_id` is populated on
    /// capture failures so the authorized-but-uncaptured charge can be
    /// resolved out-of-band.
    #[error("provider rejected {step} with status {status}")]
    Rejected {
        step: ChargeStep,
        status: StatusCode,
        body: Value,
        charge_id: Option<String>,
    },
    /// The provider returned 2xx on authorize but no charge id. Distinct
    /// from a rejection: it means a charge may exist that this system has no
    /// handle on.
    #[error("Authorize succeeded but missing charge id")]
    MissingChargeId { body: Value },
    #[error("{step} transport failure: {source}")]
    Transport {
        step: ChargeStep,
        #[source]
        source: reqwest::Error,
    },
}

/// Terminal success of one attempt.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub charge_id: String,
    pub captured: bool,
    pub authorize_body: Value,
    pub capture_body: Option<Value>,
}

/// Orchestrates the authorize → capture sequence for one checkout token.
#[derive(Clone)]
pub struct ChargeGateway {
    http: reqwest::Client,
    config: Arc<GatewayConfig>,
}

impl ChargeGateway {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_CALL_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        ChargeGateway { http, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Basic auth header from the configured key pair, rebuilt on every call
    /// so a key rotation never serves a stale credential.
    fn auth_header(&self) -> Result<String, ChargeError> {
        let keys = self
            .config
            .affirm_keys
            .as_ref()
            .ok_or(ChargeError::MissingCredentials)?;
        let raw = format!("{}:{}", keys.public_key, keys.private_key);
        Ok(format!("Basic {}", BASE64.encode(raw)))
    }

    /// The charge-creation endpoint, also echoed by the diagnostic mode.
    pub fn authorize_endpoint(&self) -> String {
        format!("{}{}", base_str(&self.config), CHARGES_PATH)
    }

    /// Human-readable capture endpoint template for diagnostics.
    pub fn capture_endpoint_template(&self) -> String {
        format!("{}{}/{{id}}/capture", base_str(&self.config), CHARGES_PATH)
    }

    fn capture_url(&self, charge_id: &str) -> String {
        format!(
            "{}{}/{}/capture",
            base_str(&self.config),
            CHARGES_PATH,
            urlencoding::encode(charge_id)
        )
    }

    /// Run one attempt through the full protocol.
    ///
    /// Validation happens synchronously before any network traffic; the two
    /// provider calls are strictly sequential since capture's URL embeds the
    /// charge id extracted from authorize's response.
    pub async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, ChargeError> {
        if request.checkout_token.trim().is_empty() {
            return Err(ChargeError::MissingToken);
        }
        let order_id = request.order_id.as_deref().map(str::trim).unwrap_or("");
        if request.capture && order_id.is_empty() {
            return Err(ChargeError::MissingOrderId);
        }
        let amount_minor = request.amount_minor.unwrap_or(0);
        if request.capture && amount_minor <= 0 {
            return Err(ChargeError::InvalidAmount);
        }

        let auth = self.auth_header()?;

        // Phase 1: exchange the single-use token for a charge.
        let (status, body) = self
            .post_json(
                &self.authorize_endpoint(),
                &auth,
                &json!({ "checkout_token": request.checkout_token.trim() }),
                ChargeStep::Authorize,
            )
            .await?;

        info!(
            status = status.as_u16(),
            order_id,
            body = %bounded_body(&body),
            "affirm authorize"
        );

        if !status.is_success() {
            return Err(ChargeError::Rejected {
                step: ChargeStep::Authorize,
                status,
                body,
                charge_id: None,
            });
        }

        let Some(charge_id) = body.get("id").and_then(Value::as_str).map(str::to_string) else {
            error!(body = %bounded_body(&body), "authorize response missing charge id");
            return Err(ChargeError::MissingChargeId { body });
        };

        if !request.capture {
            return Ok(ChargeOutcome {
                charge_id,
                captured: false,
                authorize_body: body,
                capture_body: None,
            });
        }

        // Phase 2: move funds against the authorized charge.
        let mut capture_payload = json!({
            "order_id": order_id,
            "amount": amount_minor,
        });
        if let Some(carrier) = non_blank(&request.shipping_carrier) {
            capture_payload["shipping_carrier"] = Value::String(carrier);
        }
        if let Some(confirmation) = non_blank(&request.shipping_confirmation) {
            capture_payload["shipping_confirmation"] = Value::String(confirmation);
        }

        let (capture_status, capture_body) = self
            .post_json(
                &self.capture_url(&charge_id),
                &auth,
                &capture_payload,
                ChargeStep::Capture,
            )
            .await?;

        info!(
            status = capture_status.as_u16(),
            order_id,
            amount_minor,
            charge_id = %charge_id,
            body = %bounded_body(&capture_body),
            "affirm capture"
        );

        if !capture_status.is_success() {
            // Known terminal ambiguous state: authorized but not captured.
            return Err(ChargeError::Rejected {
                step: ChargeStep::Capture,
                status: capture_status,
                body: capture_body,
                charge_id: Some(charge_id),
            });
        }

        Ok(ChargeOutcome {
            charge_id,
            captured: true,
            authorize_body: body,
            capture_body: Some(capture_body),
        })
    }

    /// Lightweight authenticated read to validate credentials without
    /// consuming a checkout token.
    pub async fn ping(&self) -> Result<(), ChargeError> {
        let auth = self.auth_header()?;
        let response = self
            .http
            .get(self.authorize_endpoint())
            .query(&[("limit", "1")])
            .header(reqwest::header::AUTHORIZATION, auth.as_str())
            .send()
            .await
            .map_err(|source| ChargeError::Transport {
                step: ChargeStep::Authorize,
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = read_body(response).await;
            Err(ChargeError::Rejected {
                step: ChargeStep::Authorize,
                status,
                body,
                charge_id: None,
            })
        }
    }

    async fn post_json(
        &self,
        url: &str,
        auth: &str,
        payload: &Value,
        step: ChargeStep,
    ) -> Result<(StatusCode, Value), ChargeError> {
        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(payload)
            .send()
            .await
            .map_err(|source| ChargeError::Transport { step, source })?;

        let status = response.status();
        let body = read_body(response).await;
        Ok((status, body))
    }
}

fn base_str(config: &GatewayConfig) -> &str {
    config.affirm_base.as_str().trim_end_matches('/')
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Read a response body as JSON, degrading to `{"raw": <text>}` when the
/// provider sends something unparseable, and `null` when it sends nothing.
async fn read_body(response: reqwest::Response) -> Value {
    let text = response.text().await.unwrap_or_default();
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }))
}

/// Size-bounded serialization for logs. Credentials never pass through here.
fn bounded_body(body: &Value) -> String {
    let mut rendered = body.to_string();
    if rendered.len() > LOG_BODY_LIMIT {
        rendered.truncate(
            (0..=LOG_BODY_LIMIT)
                .rev()
                .find(|i| rendered.is_char_boundary(*i))
                .unwrap_or(0),
        );
        rendered.push('…');
    }
    rendered
}

#[cfg(test)]
pub(crate) mod fake_provider {
    //! In-process stand-in for the Affirm API, scripted per test.

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    #[derive(Clone)]
    pub struct ProviderScript {
        pub authorize_status: u16,
        pub authorize_body: Value,
        pub capture_status: u16,
        pub capture_body: Value,
        pub authorize_calls: Arc<AtomicUsize>,
        pub capture_calls: Arc<AtomicUsize>,
        pub seen_auth_header: Arc<Mutex<Option<String>>>,
        pub seen_capture_request: Arc<Mutex<Option<Value>>>,
    }

    impl ProviderScript {
        pub fn happy() -> Self {
            ProviderScript {
                authorize_status: 200,
                authorize_body: json!({ "id": "chg_1", "status": "authorized" }),
                capture_status: 200,
                capture_body: json!({ "status": "captured" }),
                authorize_calls: Arc::new(AtomicUsize::new(0)),
                capture_calls: Arc::new(AtomicUsize::new(0)),
                seen_auth_header: Arc::new(Mutex::new(None)),
                seen_capture_request: Arc::new(Mutex::new(None)),
            }
        }

        pub fn authorize_count(&self) -> usize {
            self.authorize_calls.load(Ordering::SeqCst)
        }

        pub fn capture_count(&self) -> usize {
            self.capture_calls.load(Ordering::SeqCst)
        }
    }

    async fn authorize(
        State(script): State<ProviderScript>,
        headers: HeaderMap,
        Json(_request): Json<Value>,
    ) -> impl IntoResponse {
        script.authorize_calls.fetch_add(1, Ordering::SeqCst);
        *script.seen_auth_header.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        (
            StatusCode::from_u16(script.authorize_status).unwrap(),
            Json(script.authorize_body.clone()),
        )
    }

    async fn list_charges(State(_script): State<ProviderScript>) -> impl IntoResponse {
        (StatusCode::OK, Json(json!({ "data": [] })))
    }

    async fn capture(
        State(script): State<ProviderScript>,
        Path(_charge_id): Path<String>,
        Json(request): Json<Value>,
    ) -> impl IntoResponse {
        script.capture_calls.fetch_add(1, Ordering::SeqCst);
        *script.seen_capture_request.lock().unwrap() = Some(request);
        (
            StatusCode::from_u16(script.capture_status).unwrap(),
            Json(script.capture_body.clone()),
        )
    }

    /// Serve the script on an ephemeral port, returning the base URL.
    pub async fn spawn(script: ProviderScript) -> String {
        let app = Router::new()
            .route("/api/v2/charges", post(authorize).get(list_charges))
            .route("/api/v2/charges/{charge_id}/capture", post(capture))
            .with_state(script);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use paylane_types::{AffirmEnv, AffirmKeys};
    use serde_json::json;
    use url::Url;

    use super::fake_provider::ProviderScript;
    use super::*;

    fn test_config(base: &str, with_keys: bool) -> GatewayConfig {
        GatewayConfig {
            environment: AffirmEnv::Sandbox,
            affirm_base: Url::parse(base).unwrap(),
            affirm_keys: with_keys.then(|| AffirmKeys {
                public_key: "pub_key".to_string(),
                private_key: "priv_key".to_string(),
            }),
            stripe_secret_key: None,
            stripe_api_base: Url::parse("https://api.stripe.com").unwrap(),
            merchant_origin: Url::parse("https://shop.example.com").unwrap(),
            merchant_name: "Test Storefront".to_string(),
        }
    }

    fn capture_request() -> ChargeRequest {
        ChargeRequest {
            checkout_token: "tok_abc".to_string(),
            order_id: Some("ORDER-1".to_string()),
            amount_minor: Some(150_000),
            capture: true,
            shipping_carrier: None,
            shipping_confirmation: None,
        }
    }

    async fn gateway_for(script: ProviderScript) -> ChargeGateway {
        let base = super::fake_provider::spawn(script).await;
        ChargeGateway::new(Arc::new(test_config(&base, true)))
    }

    #[tokio::test]
    async fn validation_failures_make_no_remote_calls() {
        let script = ProviderScript::happy();
        let gateway = gateway_for(script.clone()).await;

        let blank_token = ChargeRequest::new("   ");
        assert!(matches!(
            gateway.charge(&blank_token).await.unwrap_err(),
            ChargeError::MissingToken
        ));

        let mut no_order = capture_request();
        no_order.order_id = None;
        assert!(matches!(
            gateway.charge(&no_order).await.unwrap_err(),
            ChargeError::MissingOrderId
        ));

        let mut zero_amount = capture_request();
        zero_amount.amount_minor = Some(0);
        assert!(matches!(
            gateway.charge(&zero_amount).await.unwrap_err(),
            ChargeError::InvalidAmount
        ));

        let mut no_amount = capture_request();
        no_amount.amount_minor = None;
        assert!(matches!(
            gateway.charge(&no_amount).await.unwrap_err(),
            ChargeError::InvalidAmount
        ));

        assert_eq!(script.authorize_count(), 0);
        assert_eq!(script.capture_count(), 0);
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_call() {
        let script = ProviderScript::happy();
        let base = super::fake_provider::spawn(script.clone()).await;
        let gateway = ChargeGateway::new(Arc::new(test_config(&base, false)));

        assert!(matches!(
            gateway.charge(&capture_request()).await.unwrap_err(),
            ChargeError::MissingCredentials
        ));
        assert_eq!(script.authorize_count(), 0);
    }

    #[tokio::test]
    async fn full_protocol_authorizes_then_captures() {
        let script = ProviderScript::happy();
        let gateway = gateway_for(script.clone()).await;

        let outcome = gateway.charge(&capture_request()).await.unwrap();
        assert_eq!(outcome.charge_id, "chg_1");
        assert!(outcome.captured);
        assert_eq!(outcome.capture_body, Some(json!({ "status": "captured" })));

        assert_eq!(script.authorize_count(), 1);
        assert_eq!(script.capture_count(), 1);

        // Basic credential, rebuilt per call from the configured key pair.
        let expected = format!("Basic {}", BASE64.encode("pub_key:priv_key"));
        assert_eq!(
            script.seen_auth_header.lock().unwrap().as_deref(),
            Some(expected.as_str())
        );

        let capture_body = script.seen_capture_request.lock().unwrap().clone().unwrap();
        assert_eq!(capture_body["order_id"], "ORDER-1");
        assert_eq!(capture_body["amount"], 150_000);
        assert!(capture_body.get("shipping_carrier").is_none());
    }

    #[tokio::test]
    async fn shipping_metadata_is_forwarded_when_present() {
        let script = ProviderScript::happy();
        let gateway = gateway_for(script.clone()).await;

        let mut request = capture_request();
        request.shipping_carrier = Some("UPS".to_string());
        request.shipping_confirmation = Some("1Z999".to_string());
        gateway.charge(&request).await.unwrap();

        let capture_body = script.seen_capture_request.lock().unwrap().clone().unwrap();
        assert_eq!(capture_body["shipping_carrier"], "UPS");
        assert_eq!(capture_body["shipping_confirmation"], "1Z999");
    }

    #[tokio::test]
    async fn authorize_rejection_never_reaches_capture() {
        let mut script = ProviderScript::happy();
        script.authorize_status = 402;
        script.authorize_body = json!({ "type": "invalid_request", "message": "expired token" });
        let gateway = gateway_for(script.clone()).await;

        let err = gateway.charge(&capture_request()).await.unwrap_err();
        match err {
            ChargeError::Rejected {
                step,
                status,
                body,
                charge_id,
            } => {
                assert_eq!(step, ChargeStep::Authorize);
                assert_eq!(status.as_u16(), 402);
                assert_eq!(body["message"], "expired token");
                assert_eq!(charge_id, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(script.authorize_count(), 1);
        assert_eq!(script.capture_count(), 0);
    }

    #[tokio::test]
    async fn success_without_charge_id_is_a_contract_violation() {
        let mut script = ProviderScript::happy();
        script.authorize_body = json!({ "status": "authorized" });
        let gateway = gateway_for(script.clone()).await;

        let err = gateway.charge(&capture_request()).await.unwrap_err();
        assert!(matches!(err, ChargeError::MissingChargeId { .. }));
        assert_eq!(script.capture_count(), 0);
    }

    #[tokio::test]
    async fn authorize_only_makes_exactly_one_call() {
        let script = ProviderScript::happy();
        let gateway = gateway_for(script.clone()).await;

        let mut request = capture_request();
        request.capture = false;
        request.order_id = None;
        request.amount_minor = None;

        let outcome = gateway.charge(&request).await.unwrap();
        assert_eq!(outcome.charge_id, "chg_1");
        assert!(!outcome.captured);
        assert_eq!(outcome.capture_body, None);

        assert_eq!(script.authorize_count(), 1);
        assert_eq!(script.capture_count(), 0);
    }

    #[tokio::test]
    async fn capture_rejection_surfaces_the_charge_id() {
        let mut script = ProviderScript::happy();
        script.capture_status = 500;
        script.capture_body = json!({ "message": "internal" });
        let gateway = gateway_for(script.clone()).await;

        let err = gateway.charge(&capture_request()).await.unwrap_err();
        match err {
            ChargeError::Rejected {
                step,
                status,
                charge_id,
                ..
            } => {
                assert_eq!(step, ChargeStep::Capture);
                assert_eq!(status.as_u16(), 500);
                assert_eq!(charge_id.as_deref(), Some("chg_1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_not_a_rejection() {
        // Nothing listens on this port.
        let gateway = ChargeGateway::new(Arc::new(test_config("http://127.0.0.1:9", true)));
        let err = gateway.charge(&capture_request()).await.unwrap_err();
        assert!(matches!(
            err,
            ChargeError::Transport {
                step: ChargeStep::Authorize,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn ping_validates_credentials_without_consuming_a_token() {
        let script = ProviderScript::happy();
        let gateway = gateway_for(script.clone()).await;

        gateway.ping().await.unwrap();
        assert_eq!(script.authorize_count(), 0);
        assert_eq!(script.capture_count(), 0);
    }

    #[test]
    fn bounded_body_truncates_large_payloads() {
        let body = json!({ "raw": "y".repeat(LOG_BODY_LIMIT * 2) });
        let rendered = bounded_body(&body);
        assert!(rendered.len() <= LOG_BODY_LIMIT + '…'.len_utf8());
        assert!(rendered.ends_with('…'));
    }
}


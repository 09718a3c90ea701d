pub mod endpoints;

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use paylane_types::GatewayConfig;
use tower_http::cors::{Any, CorsLayer};

use crate::gateway::ChargeGateway;

/// Shared state for the checkout API.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<GatewayConfig>,
    pub gateway: ChargeGateway,
}

impl ApiState {
    pub fn new(config: GatewayConfig) -> Self {
        let config = Arc::new(config);
        let gateway = ChargeGateway::new(config.clone());
        ApiState { config, gateway }
    }
}

/// Create checkout routes without the state layer.
///
/// The routes expect `Extension<ApiState>` to be present in the request.
pub fn create_routes() -> Router {
    Router::new()
        .route("/health", get(endpoints::health::handler))
        .route("/authorize", post(endpoints::authorize::handler))
        .route("/card/checkout", post(endpoints::card::handler))
}

/// Create the checkout router with state and CORS applied.
///
/// The storefront runs on a different origin than the gateway in local dev,
/// so the browser needs CORS for the POST endpoints.
pub fn create_router(state: ApiState) -> Router {
    let cors_layer = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    create_routes().layer(Extension(state)).layer(cors_layer)
}

/// Start the checkout gateway server.
pub async fn start_server(state: ApiState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("Starting Paylane checkout gateway on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

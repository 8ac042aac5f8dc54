use crate::errors::AppError;
use crate::models::{QuoteRequest, QuoteResponse};
use crate::simulation::QuoteSimulator;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest accepted request body. Quote requests are a few hundred bytes.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Quote simulation workflow with its data providers.
    pub simulator: QuoteSimulator,
    /// Flips to `true` when the server starts shutting down.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Resolves once shutdown starts. Never resolves if the sender is gone without
    /// having signalled.
    fn shutdown_signal(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut shutdown = self.shutdown.clone();
        async move {
            let signalled = shutdown.wait_for(|stopping| *stopping).await.map(|_| ());
            if signalled.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Builds the application router with its middleware stack.
pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        .route("/api/v1/simulacao-seguro", post(simulate_quote))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)));

    Router::new()
        .route("/health", get(health))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "seguro-veiculo-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/simulacao-seguro
///
/// Simulates a vehicle insurance quote: looks up the vehicle's market value and the
/// driver's accident history, scores the driver and prices the requested coverages.
///
/// # Returns
///
/// * `Result<Json<QuoteResponse>, AppError>` - The priced quote, or 400 for invalid
///   input (malformed bodies included), 502 when a provider fails, 499 when the
///   simulation was cancelled.
pub async fn simulate_quote(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<QuoteResponse>, AppError> {
    let Json(request) =
        payload.map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;

    tracing::info!(
        "POST /simulacao-seguro - vehicle: {} {} {}, coverages: {:?}",
        request.vehicle.make,
        request.vehicle.model,
        request.vehicle.year,
        request.coverages.codes
    );

    let today = chrono::Local::now().date_naive();
    let outcome = state
        .simulator
        .simulate(&request, today, state.shutdown_signal())
        .await?;

    tracing::info!(
        "Simulation {} priced at {} (tier {})",
        outcome.id,
        outcome.premium,
        outcome.risk_tier
    );

    Ok(Json(outcome.into()))
}

/// Serves the OpenAPI specification YAML file.
///
/// Reads `openapi.yml` from the working directory; 404 when it is missing.
async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found").into_response(),
    }
}

/// Serves the Swagger UI page pointed at `/api-docs/openapi.yml`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Seguro Veículo API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

use std::net::SocketAddr;

use axum::Router;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod intent;
mod mcp;
mod middleware;
mod openai;
mod retry;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CalChat API",
        version = "0.1.0",
        description = "Calendar-assistant chat backend: conversation proxy to a language model with confirmation-gated calendar actions."
    ),
    paths(
        routes::health::health_check,
        routes::chat::send_message,
        routes::confirm::confirm_action,
        routes::confirm::confirmation_health,
    ),
    components(schemas(
        HealthResponse,
        routes::chat::ChatRequest,
        routes::chat::ChatResponse,
        routes::confirm::ConfirmationRequest,
        calchat_core::error::ApiError,
        calchat_core::types::ChatMessage,
        calchat_core::types::Role,
        calchat_core::types::CalendarAction,
        calchat_core::types::ActionType,
        calchat_core::types::EventDetails,
        calchat_core::types::RecurrenceRule,
        calchat_core::types::Frequency,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calchat_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let openai_config = config::OpenAiConfig::from_env()
        .unwrap_or_else(|err| panic!("{err}"));
    let calendar = mcp::CalendarClient::new(config::McpTools::from_env());
    let llm = openai::LlmClient::new(openai_config, calendar.tool_param());

    let app_state = state::AppState { llm, calendar };

    let cors_layer = middleware::cors::build_cors_layer();

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::chat::router())
        .merge(routes::confirm::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("CalChat API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

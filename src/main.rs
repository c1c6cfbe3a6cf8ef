use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use chart_core::{
    ChartClient, ChartServices, EnvValues, config_from_env_values, constants::DEFAULT_REST_ADDR,
};

/// Main entry point for the chart gateway
///
/// Resolves configuration from the environment once, then serves the REST gateway with
/// OpenAPI/Swagger documentation.
///
/// # Environment Variables
/// - `CHART_BASE_URL`: Backend server root, e.g. `https://emr.example.org/openmrs` (required)
/// - `CHART_USERNAME` / `CHART_PASSWORD`: Basic-auth credentials for the backend
/// - `CHART_REACTION_CONCEPT`: Concept set listed as allergy reactions
/// - `CHART_TIMEOUT_SECS`: Backend request timeout in seconds (default: 30)
/// - `CHART_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is missing or invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chart_run=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CHART_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());

    let cfg = Arc::new(config_from_env_values(EnvValues::from_env())?);
    tracing::info!("++ Chart backend at {}", cfg.base_url());
    tracing::info!("++ Starting chart REST on {}", rest_addr);

    let client = ChartClient::connect(cfg)?;
    let state = AppState::new(ChartServices::new(client));

    api_rest::serve(&rest_addr, state).await
}

//! isnad-node
//!
//! REST service over the trust ledger: identities, attestations, trust
//! scores, bundles, revocations, delegations, policies, discovery,
//! platform data, and Prometheus metrics.

use axum::{
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

mod config;
mod handlers;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let state = Arc::new(AppState::new(config.clone())?);

    // Background platform scanner.
    state.worker.start();

    let cors = if config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics))
        // identities
        .route("/identities", post(handlers::create_identity))
        .route("/identities/:agent_id", get(handlers::get_identity))
        // attestations
        .route("/attestations", post(handlers::create_attestation))
        .route("/attestations/batch", post(handlers::create_attestations_batch))
        .route("/attestations/verify", post(handlers::verify_attestation))
        .route(
            "/attestations/subject/:agent_id",
            get(handlers::attestations_by_subject),
        )
        .route(
            "/attestations/witness/:agent_id",
            get(handlers::attestations_by_witness),
        )
        // trust
        .route("/trust/:agent_id", get(handlers::trust_score))
        .route("/trust/:agent_id/history", get(handlers::trust_history))
        .route(
            "/trust/transitive/:source/:target",
            get(handlers::transitive_trust),
        )
        // chain / bundles
        .route("/chain/export", get(handlers::export_chain))
        .route("/chain/import", post(handlers::import_chain))
        .route("/chain/verify", post(handlers::verify_chain_bundle))
        // revocations
        .route("/revocations", post(handlers::create_revocation))
        .route("/revocations/:target_id", get(handlers::revocations_for_target))
        // delegations
        .route("/delegations", post(handlers::create_delegation))
        .route("/delegations/:id/verify", get(handlers::verify_delegation_chain))
        .route(
            "/delegations/delegate/:agent_id",
            get(handlers::delegations_for_agent),
        )
        // policies
        .route("/policies", post(handlers::create_policy).get(handlers::list_policies))
        .route(
            "/policies/:name",
            get(handlers::get_policy).delete(handlers::delete_policy),
        )
        .route("/policies/:name/evaluate", post(handlers::evaluate_policy))
        .route(
            "/policies/:name/evaluate-batch",
            post(handlers::evaluate_policy_batch),
        )
        // discovery
        .route("/discovery/register", post(handlers::register_profile))
        .route("/discovery/search", get(handlers::search_profiles))
        .route("/discovery/:agent_id", get(handlers::get_profile))
        .route("/discovery/:agent_id", delete(handlers::remove_profile))
        // platform data
        .route(
            "/agents/:agent_id/platforms",
            get(handlers::platform_data).post(handlers::declare_platform),
        )
        .route("/agents/:agent_id/scan", post(handlers::scan_agent))
        .route("/agents/:agent_id", delete(handlers::erase_agent))
        // events
        .route("/events/recent", get(handlers::recent_events))
        .with_state(state.clone());

    let app = app.layer(cors);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("isnad-node listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "isnad-node",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

async fn index(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Result<Json<Value>, StatusCode> {
    if state.config.production {
        return Ok(Json(json!({"service": "isnad-node"})));
    }
    Ok(Json(json!({
        "service": "isnad-node",
        "resources": [
            "/health", "/metrics",
            "/identities", "/attestations", "/trust/:agent_id",
            "/chain/export", "/revocations", "/delegations",
            "/policies", "/discovery", "/agents/:agent_id/platforms",
            "/events/recent",
        ],
    })))
}

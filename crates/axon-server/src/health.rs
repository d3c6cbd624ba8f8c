use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use axon_config::ProviderStatus;
use axon_routing::ProviderRegistry;

/// Health check handler
///
/// Reports liveness plus provider counts by status; never touches a
/// provider itself.
pub async fn health_handler(State(registry): State<Arc<ProviderRegistry>>) -> impl IntoResponse {
    let providers = registry.list();
    let by_status = |status: ProviderStatus| {
        providers
            .iter()
            .filter(|descriptor| descriptor.status == status)
            .count()
    };

    Json(serde_json::json!({
        "status": "ok",
        "providers": {
            "total": providers.len(),
            "online": by_status(ProviderStatus::Online),
            "degraded": by_status(ProviderStatus::Degraded),
            "offline": by_status(ProviderStatus::Offline),
        },
    }))
}

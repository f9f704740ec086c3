pub mod accounts;
pub mod extract;
pub mod interest;
pub mod passbook;
pub mod rates;
pub mod transactions;

use crate::error::LedgerError;
use crate::validation;
use crate::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

pub const STAFF_HEADER: &str = "x-staff-id";

/// The acting staff member, taken from the `x-staff-id` header set by the
/// authenticating front end.
#[derive(Debug, Clone)]
pub struct StaffId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for StaffId
where
    S: Send + Sync,
{
    type Rejection = LedgerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let staff_id = parts
            .headers
            .get(STAFF_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                LedgerError::Unauthorized(format!("missing {} header", STAFF_HEADER))
            })?;

        validation::validate_staff_id(staff_id)
            .map_err(|e| LedgerError::Unauthorized(e.to_string()))?;

        Ok(StaffId(staff_id.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub storage: String,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let storage_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Storage health check failed");
            false
        }
    };

    let health_response = HealthStatus {
        status: if storage_ok { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: if storage_ok { "connected" } else { "disconnected" }.to_string(),
    };

    let status_code = if storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}

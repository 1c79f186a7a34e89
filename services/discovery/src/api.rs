//! HTTP command surface.
//!
//! Thin facade over the sync worker: every handler turns into one mailbox
//! command, so the worker stays the single writer of the cache.

use axum::{
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use fleet_events::{CloudService, DeployRequest};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::DiscoveryError;
use crate::sync::SyncHandle;

/// Create the API router with all routes and middleware.
pub fn create_router(handle: SyncHandle) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/services", get(list_services).post(deploy_service))
        .route("/v1/services/{id}", delete(remove_service))
        .layer(TraceLayer::new_for_http())
        .with_state(handle)
}

// =============================================================================
// Errors
// =============================================================================

/// RFC 7807 problem payload.
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub problem: Box<ProblemDetails>,
}

impl ApiError {
    fn new(status: StatusCode, code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        let problem = Box::new(ProblemDetails {
            r#type: format!("https://fleetsync.dev/problems/{code}"),
            title: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            status: status.as_u16(),
            detail: detail.into(),
            code,
        });
        Self { status, problem }
    }

    pub fn bad_request(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, detail)
    }

    pub fn bad_gateway(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, code, detail)
    }

    pub fn service_unavailable(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, code, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.problem)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

impl From<DiscoveryError> for ApiError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::Provider(_) => {
                error!(error = %e, "Provider error serving request");
                ApiError::bad_gateway("provider_error", e.to_string())
            }
            DiscoveryError::Dns(_) => {
                error!(error = %e, "DNS error serving request");
                ApiError::bad_gateway("dns_error", e.to_string())
            }
            DiscoveryError::NoSidecars => {
                ApiError::service_unavailable("no_sidecars", e.to_string())
            }
            DiscoveryError::WorkerUnavailable => {
                ApiError::service_unavailable("worker_unavailable", e.to_string())
            }
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
    timestamp: String,
}

/// GET /healthz
async fn healthz() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "discovery".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    /// Comma-separated numeric service ids.
    #[serde(default)]
    ids: Option<String>,
}

#[derive(Debug, Serialize)]
struct ServiceList {
    services: Vec<CloudService>,
}

/// List cached services, all of them or a requested subset.
///
/// GET /v1/services[?ids=1,2,3]
async fn list_services(
    State(handle): State<SyncHandle>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let services = match query.ids {
        Some(raw) => {
            let ids = parse_ids(&raw)
                .map_err(|part| {
                    ApiError::bad_request("invalid_id", format!("'{part}' is not a service id"))
                })?;
            handle.list_by_ids(ids).await?
        }
        None => handle.list_all().await?,
    };

    Ok(Json(ServiceList { services }))
}

/// Parse a comma-separated id list; the offending token is the error.
fn parse_ids(raw: &str) -> Result<Vec<i64>, &str> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|part| part.parse().map_err(|_| part))
        .collect()
}

/// Deploy a new service.
///
/// POST /v1/services
async fn deploy_service(
    State(handle): State<SyncHandle>,
    Json(request): Json<DeployRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.name.is_empty() {
        return Err(ApiError::bad_request(
            "invalid_name",
            "Service name cannot be empty",
        ));
    }
    if request.image.is_empty() {
        return Err(ApiError::bad_request(
            "invalid_image",
            "Image reference cannot be empty",
        ));
    }

    let service = handle.deploy(request).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// Remove a deployed service. Unknown ids are a no-op.
///
/// DELETE /v1/services/{id}
async fn remove_service(
    State(handle): State<SyncHandle>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    handle.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::parse_ids;

    #[rstest]
    #[case("42", vec![42])]
    #[case("42,7", vec![42, 7])]
    #[case(" 42 , 7 ", vec![42, 7])]
    #[case("42,,7,", vec![42, 7])]
    #[case("", vec![])]
    fn test_parse_ids(#[case] raw: &str, #[case] expected: Vec<i64>) {
        assert_eq!(parse_ids(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("forty-two", "forty-two")]
    #[case("42,x", "x")]
    fn test_parse_ids_rejects_bad_tokens(#[case] raw: &str, #[case] offender: &str) {
        assert_eq!(parse_ids(raw).unwrap_err(), offender);
    }
}

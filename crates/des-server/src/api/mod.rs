//! HTTP surface of the export service

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use des_common::types::{ExportRequest, TransferRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::AuthConfig;
use crate::engines::Engines;
use crate::error::{AppError, INVALID_INPUT, REQUIRED_PARAMETER_MISSING};
use crate::middleware;
use crate::sqoop::SqoopExport;
use crate::transfer::HdfsToS3Pipeline;

/// Path of the export endpoint.
pub const EXPORT_ROUTE: &str = "/dataexportservice/export";

/// Request discriminator field.
pub const EXPORT_TYPE_KEY: &str = "export_type";

#[derive(Clone)]
pub struct AppState {
    pub transfers: Arc<HdfsToS3Pipeline>,
    pub exports: Arc<SqoopExport>,
    /// Cancelled on shutdown; aborts in-flight jobs
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(engines: Engines, shutdown: CancellationToken) -> Self {
        Self {
            transfers: engines.transfers,
            exports: engines.exports,
            shutdown,
        }
    }
}

pub fn create_router(state: AppState, auth: AuthConfig) -> Router {
    let export_routes = Router::new()
        .route(EXPORT_ROUTE, post(export))
        .route_layer(from_fn_with_state(
            Arc::new(auth),
            middleware::require_basic_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(export_routes)
        .with_state(state)
        .layer(middleware::tracing_layer())
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

async fn export(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Response, AppError> {
    let export_type = body
        .get(EXPORT_TYPE_KEY)
        .and_then(Value::as_str)
        .map(str::to_string);

    match export_type.as_deref() {
        None => {
            error!("{}", REQUIRED_PARAMETER_MISSING);
            Err(AppError::BadRequest(REQUIRED_PARAMETER_MISSING.to_string()))
        },
        Some("dbexport") => {
            let status = match serde_json::from_value::<ExportRequest>(body) {
                Ok(request) => state.exports.run_export(&request, &state.shutdown).await?,
                Err(err) => {
                    error!(error = %err, "Error Parsing Input Config");
                    des_common::types::ExportStatus::failed(crate::command::INPUT_CONFIG_ERROR)
                },
            };
            Ok(Json(status).into_response())
        },
        Some("hdfsToS3") => {
            let request = serde_json::from_value::<TransferRequest>(body).map_err(|err| {
                error!(error = %err, "Invalid hdfsToS3 request");
                AppError::BadRequest(format!("{REQUIRED_PARAMETER_MISSING}: {err}"))
            })?;
            let status = state.transfers.run_transfer(&request, &state.shutdown).await?;
            Ok(Json(status).into_response())
        },
        Some(other) => {
            info!(export_type = %other, "Unsupported export type");
            Err(AppError::BadRequest(INVALID_INPUT.to_string()))
        },
    }
}

pub mod script_api;
pub mod table_api;
mod wire;

pub use script_api::ScriptApiGateway;
pub use table_api::TableApiGateway;

use crate::application::ports::RemoteGateway;
use crate::shared::config::{BackendConfig, BackendKind};
use crate::shared::error::AppError;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Builds the gateway selected by the backend configuration.
pub fn build_gateway(config: &BackendConfig) -> Result<Arc<dyn RemoteGateway>, AppError> {
    let gateway: Arc<dyn RemoteGateway> = match config.kind {
        BackendKind::TableApi => Arc::new(TableApiGateway::from_config(config)?),
        BackendKind::ScriptApi => Arc::new(ScriptApiGateway::from_config(config)?),
    };
    Ok(gateway)
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<Client, AppError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|err| AppError::ConfigurationError(format!("failed to build HTTP client: {err}")))
}

/// Turns a non-2xx response into a protocol error carrying the body text.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = body.trim();
    if detail.is_empty() {
        Err(AppError::Protocol(format!("unexpected status {status}")))
    } else {
        Err(AppError::Protocol(format!("unexpected status {status}: {detail}")))
    }
}

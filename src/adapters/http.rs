use crate::utils::error::{ConnectorError, Result};
use reqwest::Response;

/// Passes 2xx responses through; anything else becomes
/// `UnexpectedStatusError` carrying the response body.
pub(crate) async fn ensure_success(service: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!("{} returned HTTP {}: {}", service, status.as_u16(), body);

    Err(ConnectorError::UnexpectedStatusError {
        service,
        status: status.as_u16(),
        body,
    })
}

/// Logs a transport-level failure and hands the error back for `?`.
pub(crate) fn transport_failure(service: &'static str, err: reqwest::Error) -> ConnectorError {
    tracing::error!("{} request failed: {}", service, err);
    ConnectorError::HttpError(err)
}

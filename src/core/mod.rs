pub mod middleware;

use serde::Deserialize;

/// Google API error envelope, `{"error": {"code": 400, "message": "USER_NOT_FOUND"}}`.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetails {
    pub code: u16,
    pub message: String,
}

/// Reads a non-success response into `"<message> (code: n)"`, or
/// `"<default_msg>: <status>"` when the body is not an error envelope.
pub async fn parse_error_response(response: reqwest::Response, default_msg: &str) -> String {
    let status = response.status();
    match response.json::<ApiErrorResponse>().await {
        Ok(resp) => format!("{} (code: {})", resp.error.message, resp.error.code),
        Err(_) => format!("{}: {}", default_msg, status),
    }
}

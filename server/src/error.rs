use axum::Json;
use axum::response::IntoResponse;
use axum::response::Response;
use http::StatusCode;
use msgbridge_protocol::client::ClientError;
use msgbridge_protocol::client::ClientErrorBody;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed client JSON or a request the upstream cannot answer.
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid Authorization header format")]
    InvalidAuthorization,

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to call upstream API")]
    UpstreamUnavailable(#[source] reqwest::Error),

    #[error("failed to parse response from upstream API")]
    UpstreamDecode(#[source] serde_json::Error),

    /// The upstream answered with its own `error` object.
    #[error("{message}")]
    UpstreamReported {
        status: StatusCode,
        kind: String,
        message: String,
    },

    #[error("upstream stream ended before message_stop")]
    UpstreamStreamTruncated,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) | GatewayError::InvalidAuthorization => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Configuration(_)
            | GatewayError::UpstreamUnavailable(_)
            | GatewayError::UpstreamDecode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UpstreamReported { status, .. } => *status,
            GatewayError::UpstreamStreamTruncated => StatusCode::BAD_GATEWAY,
        }
    }

    /// The body returned to the caller. Transport and decode failures only
    /// carry the generic display text, never the underlying cause.
    pub fn to_client_error(&self) -> ClientErrorBody {
        let kind = match self {
            GatewayError::BadRequest(_) | GatewayError::InvalidAuthorization => {
                "invalid_request_error".to_string()
            }
            GatewayError::Configuration(_) => "configuration_error".to_string(),
            GatewayError::UpstreamReported { kind, .. } => kind.clone(),
            GatewayError::UpstreamUnavailable(_)
            | GatewayError::UpstreamDecode(_)
            | GatewayError::UpstreamStreamTruncated => "api_error".to_string(),
        };
        ClientErrorBody {
            error: ClientError {
                kind,
                message: self.to_string(),
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            GatewayError::UpstreamUnavailable(e) => {
                tracing::error!("upstream request failed: {e}");
            }
            GatewayError::UpstreamDecode(e) => {
                tracing::error!("upstream returned undecodable body: {e}");
            }
            GatewayError::Configuration(msg) => tracing::error!("{msg}"),
            _ => tracing::debug!("request failed: {self}"),
        }
        (self.status(), Json(self.to_client_error())).into_response()
    }
}

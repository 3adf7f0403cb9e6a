use http::HeaderMap;
use http::header::ACCEPT;
use http::header::AUTHORIZATION;
use http::header::CONTENT_TYPE;
use msgbridge_protocol::upstream::UpstreamRequest;
use tracing::debug;

use crate::error::GatewayError;
use crate::error::Result;

const MESSAGES_PATH: &str = "/v1/messages";
const API_KEY_HEADER: &str = "x-api-key";
const VERSION_HEADER: &str = "anthropic-version";
const API_VERSION: &str = "2023-06-01";

/// Extracts the caller's key from `Authorization: Bearer <key>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<String> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(GatewayError::InvalidAuthorization)?;
    match header.strip_prefix("Bearer ") {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(GatewayError::InvalidAuthorization),
    }
}

/// Sends translated requests to the upstream messages endpoint. Cheap to
/// clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    messages_url: String,
}

impl UpstreamClient {
    /// `endpoint` must already be validated by
    /// [`crate::config::validate_endpoint`].
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            messages_url: format!("{endpoint}{MESSAGES_PATH}"),
        }
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    /// Issues one request. Transport failures are returned immediately; there
    /// is no retry.
    pub async fn send(&self, api_key: &str, body: &UpstreamRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .http
            .post(&self.messages_url)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, api_key)
            .header(VERSION_HEADER, API_VERSION)
            .json(body);
        if body.stream {
            builder = builder.header(ACCEPT, "text/event-stream");
        }

        let resp = builder
            .send()
            .await
            .map_err(GatewayError::UpstreamUnavailable)?;
        debug!(
            status = resp.status().as_u16(),
            stream = body.stream,
            "upstream responded"
        );
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use http::HeaderValue;
    use msgbridge_protocol::upstream::UpstreamContentBlock;
    use msgbridge_protocol::upstream::UpstreamMessage;
    use msgbridge_protocol::upstream::UpstreamRole;
    use pretty_assertions::assert_eq;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::body_json;
    use wiremock::matchers::header;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn bearer_token_requires_bearer_scheme() {
        assert_eq!(bearer_token(&headers("Bearer sk-1")).unwrap(), "sk-1");
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(GatewayError::InvalidAuthorization)
        ));
        assert!(matches!(
            bearer_token(&headers("Basic abc")),
            Err(GatewayError::InvalidAuthorization)
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer ")),
            Err(GatewayError::InvalidAuthorization)
        ));
    }

    #[tokio::test]
    async fn send_sets_auth_and_version_headers() {
        let server = MockServer::start().await;
        let body = UpstreamRequest {
            model: "m".to_string(),
            max_tokens: 4096,
            system: Some("sys".to_string()),
            messages: vec![UpstreamMessage {
                role: UpstreamRole::User,
                content: vec![UpstreamContentBlock::Text {
                    text: "hi".to_string(),
                }],
            }],
            stream: false,
            temperature: None,
            top_p: None,
        };
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(header("content-type", "application/json"))
            .and(body_json(&body))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = UpstreamClient::new(&server.uri());
        let resp = client.send("sk-test", &body).await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_unavailable() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = UpstreamClient::new(&format!("http://127.0.0.1:{port}"));
        let body = UpstreamRequest {
            model: "m".to_string(),
            max_tokens: 4096,
            system: None,
            messages: Vec::new(),
            stream: false,
            temperature: None,
            top_p: None,
        };
        let err = client.send("k", &body).await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable(_)));
    }
}

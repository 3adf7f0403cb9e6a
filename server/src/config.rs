use std::net::SocketAddr;

use reqwest::Url;

use crate::cli::Cli;
use crate::error::GatewayError;
use crate::error::Result;
use crate::models::ModelAllowlist;

pub const DEFAULT_UPSTREAM_ENDPOINT: &str = "https://api.anthropic.com";

/// Runtime configuration, validated once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    /// Base URL without trailing slash; `/v1/messages` is appended per call.
    pub upstream_endpoint: String,
    pub models: ModelAllowlist,
    pub cors_origins: Vec<String>,
}

impl GatewayConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let listen_addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
            .parse()
            .map_err(|e| {
                GatewayError::Configuration(format!(
                    "cannot listen on {}:{}: {e}",
                    cli.host, cli.port
                ))
            })?;
        let models = if cli.models.is_empty() {
            ModelAllowlist::default()
        } else {
            ModelAllowlist::new(cli.models.clone())?
        };
        Ok(Self {
            listen_addr,
            upstream_endpoint: validate_endpoint(&cli.upstream_endpoint)?,
            models,
            cors_origins: cli.cors_origins.clone(),
        })
    }
}

/// Checks an upstream base URL and returns it without a trailing slash.
///
/// Endpoints that already carry the API path are rejected rather than
/// rewritten, so a misconfigured deployment fails at startup instead of
/// sending every request to `/v1/v1/messages`.
pub fn validate_endpoint(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| {
        GatewayError::Configuration(format!("upstream endpoint `{raw}` is not a valid URL: {e}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(GatewayError::Configuration(format!(
            "upstream endpoint `{raw}` must use http or https"
        )));
    }
    if trimmed.ends_with("/v1") || trimmed.ends_with("/v1/messages") {
        return Err(GatewayError::Configuration(format!(
            "upstream endpoint `{raw}` must not include the `/v1` path; \
             it is appended automatically"
        )));
    }
    Ok(trimmed.to_string())
}

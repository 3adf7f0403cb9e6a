use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Serve chat-completions requests from a messages-API backend")]
pub struct Cli {
    /// Host interface to bind.
    #[arg(long = "host", env = "MSGBRIDGE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long = "port", short = 'p', env = "MSGBRIDGE_PORT", default_value_t = 6600)]
    pub port: u16,

    /// Base URL of the upstream service, without the `/v1/messages` path.
    #[arg(
        long = "upstream-endpoint",
        env = "MSGBRIDGE_UPSTREAM_ENDPOINT",
        default_value = crate::config::DEFAULT_UPSTREAM_ENDPOINT
    )]
    pub upstream_endpoint: String,

    /// Comma separated list of accepted model ids. The first one is used
    /// whenever a request names a model that is not listed.
    #[arg(
        long = "models",
        env = "MSGBRIDGE_MODELS",
        value_name = "MODEL",
        value_delimiter = ','
    )]
    pub models: Vec<String>,

    /// Allowed CORS origins (repeatable). `*` allows any origin.
    #[arg(
        long = "cors-origin",
        env = "MSGBRIDGE_CORS_ORIGINS",
        value_name = "ORIGIN",
        value_delimiter = ',',
        default_value = "*"
    )]
    pub cors_origins: Vec<String>,

    /// Log translated payloads and upstream statuses.
    #[arg(long = "debug", env = "MSGBRIDGE_DEBUG", default_value_t = false)]
    pub debug: bool,
}

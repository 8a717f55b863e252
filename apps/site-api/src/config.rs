//! Command-line and environment configuration

use clap::Parser;

/// Command-line arguments for the site API.
///
/// Every upstream credential may also come from the environment (or a
/// `.env` file). Missing credentials select local stand-ins.
#[derive(Parser, Debug, Clone)]
#[command(name = "site-api")]
#[command(about = "Consulting site API: uploads, submissions, surveys and the chat assistant")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "SITE_PORT", default_value = "3000")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "SITE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Rate limit: requests per second per IP
    #[arg(long, default_value = "10")]
    pub rate_limit: u32,

    /// Timeout for upstream API calls in seconds
    #[arg(long, default_value = "60")]
    pub upstream_timeout_secs: u64,

    /// Key-value REST endpoint
    #[arg(long, env = "KV_REST_API_URL")]
    pub kv_url: Option<String>,

    /// Key-value REST token
    #[arg(long, env = "KV_REST_API_TOKEN", hide_env_values = true)]
    pub kv_token: Option<String>,

    /// Blob storage API endpoint
    #[arg(long, env = "BLOB_API_URL", default_value = "https://blob.vercel-storage.com")]
    pub blob_api_url: String,

    /// Blob storage read/write token
    #[arg(long, env = "BLOB_READ_WRITE_TOKEN", hide_env_values = true)]
    pub blob_token: Option<String>,

    /// Base URL for objects kept by the in-memory blob store (served under `/blobs`)
    #[arg(long, env = "PUBLIC_BLOB_BASE", default_value = "http://localhost:3000/blobs")]
    pub public_blob_base: String,

    /// Chat completion API base URL
    #[arg(long, env = "DEEPSEEK_BASE_URL", default_value = "https://api.deepseek.com")]
    pub deepseek_base_url: String,

    /// Chat completion API key
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    pub deepseek_api_key: Option<String>,

    /// Web search API base URL
    #[arg(long, env = "TAVILY_BASE_URL", default_value = "https://api.tavily.com")]
    pub tavily_base_url: String,

    /// Web search API key
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    pub tavily_api_key: Option<String>,

    /// Exchange-rate API endpoint
    #[arg(long, env = "EXCHANGE_RATE_URL", default_value = "https://open.er-api.com/v6/latest")]
    pub exchange_rate_url: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_without_credentials() {
        let args = Args::try_parse_from(["site-api", "--port", "8080"]).unwrap();
        assert_eq!(args.port, 8080);
        assert_eq!(args.rate_limit, 10);
        assert!(args.exchange_rate_url.starts_with("https://"));
    }
}

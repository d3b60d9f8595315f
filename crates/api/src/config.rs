use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Externally reachable base URL, used to build the webhook callback
    /// URL registered with the provider.
    pub public_base_url: String,
    /// fal queue base URL.
    pub fal_base_url: String,
    /// fal account API key.
    pub fal_api_key: String,
    /// Shared secret for webhook HMAC signatures. When `None`, signature
    /// verification is skipped (local development only).
    pub webhook_secret: Option<String>,
    /// S3 bucket artifacts are stored in.
    pub artifact_bucket: String,
    /// Key prefix for stored artifacts.
    pub artifact_prefix: String,
    /// How often the background reconciler runs, in seconds (default: `300`).
    pub reconcile_interval_secs: u64,
    /// Age in minutes past which a non-terminal job counts as stale
    /// (default: `20`).
    pub stale_after_minutes: i64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                    |
    /// |---------------------------|----------------------------|
    /// | `HOST`                    | `0.0.0.0`                  |
    /// | `PORT`                    | `3000`                     |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                       |
    /// | `PUBLIC_BASE_URL`         | `http://localhost:3000`    |
    /// | `FAL_BASE_URL`            | `https://queue.fal.run`    |
    /// | `FAL_API_KEY`             | (empty)                    |
    /// | `WEBHOOK_SECRET`          | unset (verification off)   |
    /// | `ARTIFACT_BUCKET`         | `mirage-artifacts`         |
    /// | `ARTIFACT_PREFIX`         | `generations`              |
    /// | `RECONCILE_INTERVAL_SECS` | `300`                      |
    /// | `STALE_AFTER_MINUTES`     | `20`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());

        let fal_base_url =
            std::env::var("FAL_BASE_URL").unwrap_or_else(|_| "https://queue.fal.run".into());

        let fal_api_key = std::env::var("FAL_API_KEY").unwrap_or_default();

        let webhook_secret = std::env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());

        let artifact_bucket =
            std::env::var("ARTIFACT_BUCKET").unwrap_or_else(|_| "mirage-artifacts".into());

        let artifact_prefix =
            std::env::var("ARTIFACT_PREFIX").unwrap_or_else(|_| "generations".into());

        let reconcile_interval_secs: u64 = std::env::var("RECONCILE_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("RECONCILE_INTERVAL_SECS must be a valid u64");

        let stale_after_minutes: i64 = std::env::var("STALE_AFTER_MINUTES")
            .unwrap_or_else(|_| "20".into())
            .parse()
            .expect("STALE_AFTER_MINUTES must be a valid i64");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            public_base_url,
            fal_base_url,
            fal_api_key,
            webhook_secret,
            artifact_bucket,
            artifact_prefix,
            reconcile_interval_secs,
            stale_after_minutes,
            jwt,
        }
    }

    /// The callback URL registered with the provider at submission time.
    pub fn webhook_url(&self) -> String {
        format!("{}/api/v1/webhooks/fal", self.public_base_url)
    }
}

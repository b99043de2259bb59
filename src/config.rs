use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Key for the management API. Required in production.
    pub admin_key: Option<String>,
    /// Where the view redirects after a successful use when no hook answers.
    /// Set via PRIVATEURL_SUCCESS_REDIRECT. Default: "/".
    pub success_redirect: String,
    /// Mount point of the `/{action}/{token}` route. Empty = root.
    pub path_prefix: String,
    /// Interval of the expired-url sweep. 0 = disabled.
    pub cleanup_interval_secs: u64,
}

impl Config {
    /// Route path for the presentation view, e.g. `/p/:action/:token`.
    pub fn view_route(&self) -> String {
        format!("{}/:action/:token", self.path_prefix)
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup, so tests do not touch the process
/// environment.
pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let admin_key = get("PRIVATEURL_ADMIN_KEY").filter(|k| !k.is_empty());

    if admin_key.is_none() {
        let env_mode = get("PRIVATEURL_ENV")
            .or_else(|| get("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!("PRIVATEURL_ADMIN_KEY must be set before running in production.");
        }
        tracing::warn!("PRIVATEURL_ADMIN_KEY is not set; the management API will reject every request");
    }

    let path_prefix = normalize_prefix(&get("PRIVATEURL_PATH_PREFIX").unwrap_or_default());

    Ok(Config {
        port: get("PRIVATEURL_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080),
        database_url: get("DATABASE_URL")
            .unwrap_or_else(|| "postgres://localhost/privateurl".into()),
        admin_key,
        success_redirect: get("PRIVATEURL_SUCCESS_REDIRECT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "/".into()),
        path_prefix,
        cleanup_interval_secs: get("PRIVATEURL_CLEANUP_INTERVAL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
    })
}

/// "p/" -> "/p", "/" -> "".
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

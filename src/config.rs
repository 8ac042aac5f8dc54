use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// FIPE valuation API. `None` runs with the fixed-value stub.
    pub fipe_api_url: Option<String>,
    /// Accident history API. `None` runs with the fixed-history stub.
    pub accident_history_api_url: Option<String>,
    pub accident_history_token: Option<String>,
    /// Timeout applied to each upstream request.
    pub upstream_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            fipe_api_url: optional_url("FIPE_API_URL")?,
            accident_history_api_url: optional_url("ACCIDENT_HISTORY_API_URL")?,
            accident_history_token: std::env::var("ACCIDENT_HISTORY_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            upstream_timeout_secs: std::env::var("UPSTREAM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("UPSTREAM_TIMEOUT_SECS must be a positive integer"))
                .and_then(|secs: u64| {
                    if secs == 0 {
                        anyhow::bail!("UPSTREAM_TIMEOUT_SECS must be greater than zero");
                    }
                    Ok(secs)
                })?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match config.fipe_api_url {
            Some(ref url) => tracing::debug!("FIPE API URL: {}", url),
            None => tracing::warn!("FIPE_API_URL not set, using fixed vehicle valuation"),
        }
        match config.accident_history_api_url {
            Some(ref url) => tracing::debug!("Accident history API URL: {}", url),
            None => tracing::warn!("ACCIDENT_HISTORY_API_URL not set, using fixed accident history"),
        }
        tracing::debug!("Upstream timeout: {}s", config.upstream_timeout_secs);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

/// Reads an optional base URL. Blank values count as unset; anything else must be http(s).
fn optional_url(key: &str) -> anyhow::Result<Option<String>> {
    let Some(url) = std::env::var(key).ok().filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };

    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", key);
    }

    Ok(Some(url.trim_end_matches('/').to_string()))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            fipe_api_url: None,
            accident_history_api_url: None,
            accident_history_token: None,
            upstream_timeout_secs: 30,
        }
    }
}

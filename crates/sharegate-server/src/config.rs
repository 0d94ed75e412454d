//! Server configuration loaded from environment variables.
//!
//! Only the bot token and the frontend URL are required; everything else
//! has a default suitable for local development.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use sharegate_shared::constants::DEFAULT_HTTP_PORT;
use sharegate_shared::ChainId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not provided")]
    Missing(&'static str),
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Telegram bot token.
    /// Env: `BOT_API_TOKEN` (required)
    pub bot_api_token: String,

    /// Base URL of the web frontend, used in links sent to owners.
    /// Env: `FRONTEND_URL` (required)
    pub frontend_url: String,

    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:3000`
    pub http_addr: SocketAddr,

    /// Env: `DATABASE_PATH`
    /// Default: `./sharegate.db`
    pub database_path: PathBuf,

    /// JSON-RPC endpoint per chain id.
    /// Env: `RPC_ENDPOINTS` as `chainId=url` pairs separated by commas
    /// Default: `5=https://ethereum-goerli.publicnode.com`
    pub rpc_endpoints: HashMap<ChainId, String>,

    /// Upper bound on each chain call.
    /// Env: `RPC_TIMEOUT_SECS`
    /// Default: `10`
    pub rpc_timeout: Duration,

    /// Env: `TELEGRAM_API_URL`
    /// Default: `https://api.telegram.org`
    pub telegram_api_url: String,

    /// Re-query the member's holding before approving a join request.
    /// Env: `RECHECK_HOLDING_ON_JOIN` (true/false)
    /// Default: `true`
    pub recheck_holding_on_join: bool,

    /// Idle time after which a pending chat selection is dropped.
    /// Env: `SESSION_TTL_SECS`
    /// Default: `3600`
    pub session_ttl: Duration,

    /// Allow any origin. Meant for local frontend development.
    /// Env: `CORS_PERMISSIVE` (true/false)
    /// Default: `false`
    pub cors_permissive: bool,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bot_api_token", &"<redacted>")
            .field("frontend_url", &self.frontend_url)
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("rpc_endpoints", &self.rpc_endpoints)
            .field("rpc_timeout", &self.rpc_timeout)
            .field("telegram_api_url", &self.telegram_api_url)
            .field("recheck_holding_on_join", &self.recheck_holding_on_join)
            .field("session_ttl", &self.session_ttl)
            .field("cors_permissive", &self.cors_permissive)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            var(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let mut config = Self {
            bot_api_token: required("BOT_API_TOKEN")?,
            frontend_url: required("FRONTEND_URL")?,
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./sharegate.db"),
            rpc_endpoints: HashMap::from([(5, "https://ethereum-goerli.publicnode.com".to_string())]),
            rpc_timeout: Duration::from_secs(10),
            telegram_api_url: "https://api.telegram.org".to_string(),
            recheck_holding_on_join: true,
            session_ttl: Duration::from_secs(3600),
            cors_permissive: false,
        };

        if let Some(addr) = parsed(&var, "HTTP_ADDR") {
            config.http_addr = addr;
        }

        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(raw) = var("RPC_ENDPOINTS") {
            match parse_rpc_endpoints(&raw) {
                Ok(endpoints) => config.rpc_endpoints = endpoints,
                Err(e) => tracing::warn!(error = %e, "Invalid RPC_ENDPOINTS, using default"),
            }
        }

        if let Some(secs) = parsed::<u64>(&var, "RPC_TIMEOUT_SECS") {
            config.rpc_timeout = Duration::from_secs(secs);
        }

        if let Some(url) = var("TELEGRAM_API_URL") {
            config.telegram_api_url = url;
        }

        if let Some(val) = var("RECHECK_HOLDING_ON_JOIN") {
            config.recheck_holding_on_join = flag(&val);
        }

        if let Some(secs) = parsed::<u64>(&var, "SESSION_TTL_SECS") {
            config.session_ttl = Duration::from_secs(secs);
        }

        if let Some(val) = var("CORS_PERMISSIVE") {
            config.cors_permissive = flag(&val);
        }

        Ok(config)
    }
}

fn parsed<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = var(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(value = %raw, "Invalid {name}, using default");
            None
        }
    }
}

fn flag(val: &str) -> bool {
    val != "false" && val != "0"
}

/// Parse `1=https://a,5=https://b`.
fn parse_rpc_endpoints(raw: &str) -> Result<HashMap<ChainId, String>, String> {
    let mut endpoints = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (chain, url) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected chainId=url, got {pair:?}"))?;
        let chain_id = chain
            .trim()
            .parse::<ChainId>()
            .map_err(|_| format!("invalid chain id {chain:?}"))?;
        endpoints.insert(chain_id, url.trim().to_string());
    }
    if endpoints.is_empty() {
        return Err("no endpoints given".to_string());
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("BOT_API_TOKEN", "123:secret"),
        ("FRONTEND_URL", "https://app.example"),
    ];

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 3000).into());
        assert_eq!(config.rpc_endpoints.len(), 1);
        assert!(config.rpc_endpoints.contains_key(&5));
        assert!(config.recheck_holding_on_join);
        assert!(!config.cors_permissive);
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_required_vars() {
        assert_eq!(
            ServerConfig::from_lookup(lookup(&[("FRONTEND_URL", "x")])).unwrap_err(),
            ConfigError::Missing("BOT_API_TOKEN")
        );
        assert_eq!(
            ServerConfig::from_lookup(lookup(&[("BOT_API_TOKEN", "x"), ("FRONTEND_URL", " ")]))
                .unwrap_err(),
            ConfigError::Missing("FRONTEND_URL")
        );
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("HTTP_ADDR", "127.0.0.1:8080"),
            ("RPC_ENDPOINTS", "1=https://eth.example, 137=https://polygon.example"),
            ("RPC_TIMEOUT_SECS", "3"),
            ("RECHECK_HOLDING_ON_JOIN", "false"),
            ("CORS_PERMISSIVE", "1"),
        ]);
        let config = ServerConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 8080).into());
        assert_eq!(config.rpc_endpoints[&137], "https://polygon.example");
        assert!(!config.rpc_endpoints.contains_key(&5));
        assert_eq!(config.rpc_timeout, Duration::from_secs(3));
        assert!(!config.recheck_holding_on_join);
        assert!(config.cors_permissive);
    }

    #[test]
    fn test_invalid_optional_values_keep_defaults() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([("HTTP_ADDR", "nope"), ("RPC_ENDPOINTS", "mainnet")]);
        let config = ServerConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 3000).into());
        assert!(config.rpc_endpoints.contains_key(&5));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ServerConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert!(!format!("{config:?}").contains("secret"));
    }
}

/*
 * Responsibility
 * - Load settings from the environment (listen address, OIDC issuer, session store, timeouts)
 * - Validate them (startup fails when something required is missing)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::middleware::auth::{MiddlewareConfig, SessionMiddlewareConfig};
use crate::services::auth::{FailureHandler, verbose_handler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Bearer ID token settings; present when `AUTH_ISSUER` is set.
#[derive(Debug, Clone)]
pub struct OidcSettings {
    pub issuer: String,
    pub client_id: String,
    pub skip_client_id_check: bool,
    pub email: String,
    pub skip_email_check: bool,
    pub leeway_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub oidc: Option<OidcSettings>,
    pub session_store_url: Option<String>,

    pub http_client_timeout: Duration,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup` instead.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = match var("PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };
        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV"));

        let oidc = match var("AUTH_ISSUER") {
            Some(issuer) => {
                let client_id = var("AUTH_CLIENT_ID").unwrap_or_default();
                let skip_client_id_check =
                    env_bool(var("AUTH_SKIP_CLIENT_ID_CHECK"), "AUTH_SKIP_CLIENT_ID_CHECK")?;
                if client_id.is_empty() && !skip_client_id_check {
                    return Err(ConfigError::Missing("AUTH_CLIENT_ID"));
                }

                let email = var("AUTH_EMAIL").unwrap_or_default();
                let skip_email_check =
                    env_bool(var("AUTH_SKIP_EMAIL_CHECK"), "AUTH_SKIP_EMAIL_CHECK")?;
                if email.is_empty() && !skip_email_check {
                    return Err(ConfigError::Missing("AUTH_EMAIL"));
                }

                Some(OidcSettings {
                    issuer,
                    client_id,
                    skip_client_id_check,
                    email,
                    skip_email_check,
                    leeway_seconds: env_u64(var("AUTH_LEEWAY_SECONDS"), "AUTH_LEEWAY_SECONDS", 0)?,
                })
            }
            None => None,
        };

        let session_store_url = var("SESSION_STORE_URL");

        if oidc.is_none() && session_store_url.is_none() {
            return Err(ConfigError::Missing("AUTH_ISSUER or SESSION_STORE_URL"));
        }

        Ok(Self {
            addr,
            app_env,
            oidc,
            session_store_url,
            http_client_timeout: Duration::from_secs(env_u64(
                var("HTTP_CLIENT_TIMEOUT_SECONDS"),
                "HTTP_CLIENT_TIMEOUT_SECONDS",
                10,
            )?),
            request_timeout: Duration::from_secs(env_u64(
                var("REQUEST_TIMEOUT_SECONDS"),
                "REQUEST_TIMEOUT_SECONDS",
                30,
            )?),
            shutdown_timeout: Duration::from_secs(env_u64(
                var("SHUTDOWN_TIMEOUT_SECONDS"),
                "SHUTDOWN_TIMEOUT_SECONDS",
                10,
            )?),
        })
    }

    /// Token middleware settings, if the token layer is enabled.
    pub fn middleware_config(&self) -> Option<MiddlewareConfig> {
        let oidc = self.oidc.as_ref()?;
        Some(MiddlewareConfig {
            client_id: oidc.client_id.clone(),
            skip_client_id_check: oidc.skip_client_id_check,
            leeway_seconds: oidc.leeway_seconds,
            email: oidc.email.clone(),
            skip_email_check: oidc.skip_email_check,
            auth_failed_handler: self.failure_handler(),
            ..Default::default()
        })
    }

    pub fn session_middleware_config(&self) -> SessionMiddlewareConfig {
        SessionMiddlewareConfig {
            auth_failed_handler: self.failure_handler(),
        }
    }

    // Outside production, failures are explained in the response body.
    fn failure_handler(&self) -> Option<FailureHandler> {
        (!self.app_env.is_production()).then(verbose_handler)
    }
}

fn env_bool(raw: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid(key)),
        },
    }
}

fn env_u64(raw: Option<String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match raw {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn oidc_only_with_defaults() {
        let config = load(&[
            ("AUTH_ISSUER", "https://issuer.example"),
            ("AUTH_CLIENT_ID", "client-a"),
            ("AUTH_EMAIL", "alice@example.com"),
        ])
        .unwrap();

        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.http_client_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        assert!(config.session_store_url.is_none());

        let mw = config.middleware_config().unwrap();
        assert_eq!(mw.client_id, "client-a");
        assert_eq!(mw.email, "alice@example.com");
        assert!(!mw.skip_email_check);
        assert!(!mw.insecure_skip_signature_check);
        assert!(mw.auth_failed_handler.is_some());
    }

    #[test]
    fn production_keeps_the_opaque_401() {
        let config = load(&[
            ("APP_ENV", "production"),
            ("SESSION_STORE_URL", "https://auth.example"),
        ])
        .unwrap();

        assert!(config.middleware_config().is_none());
        assert!(config.session_middleware_config().auth_failed_handler.is_none());
    }

    #[test]
    fn something_to_authenticate_against_is_required() {
        assert_eq!(
            load(&[]).unwrap_err(),
            ConfigError::Missing("AUTH_ISSUER or SESSION_STORE_URL")
        );
    }

    #[test]
    fn client_id_or_skip_is_required() {
        let err = load(&[
            ("AUTH_ISSUER", "https://issuer.example"),
            ("AUTH_SKIP_EMAIL_CHECK", "true"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("AUTH_CLIENT_ID"));

        let config = load(&[
            ("AUTH_ISSUER", "https://issuer.example"),
            ("AUTH_SKIP_CLIENT_ID_CHECK", "1"),
            ("AUTH_SKIP_EMAIL_CHECK", "true"),
        ])
        .unwrap();
        assert!(config.middleware_config().unwrap().skip_client_id_check);
    }

    #[test]
    fn email_or_skip_is_required() {
        let err = load(&[
            ("AUTH_ISSUER", "https://issuer.example"),
            ("AUTH_CLIENT_ID", "client-a"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("AUTH_EMAIL"));
    }

    #[test]
    fn invalid_values_are_reported_by_key() {
        let base = [("SESSION_STORE_URL", "https://auth.example")];

        for (key, value) in [
            ("PORT", "eighty"),
            ("REQUEST_TIMEOUT_SECONDS", "-1"),
            ("HTTP_CLIENT_TIMEOUT_SECONDS", "soon"),
        ] {
            let mut vars = base.to_vec();
            vars.push((key, value));
            assert!(matches!(load(&vars), Err(ConfigError::Invalid(k)) if k == key));
        }

        let err = load(&[
            ("AUTH_ISSUER", "https://issuer.example"),
            ("AUTH_SKIP_CLIENT_ID_CHECK", "maybe"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::Invalid("AUTH_SKIP_CLIENT_ID_CHECK"));
    }

    #[test]
    fn config_error_display() {
        assert_eq!(
            ConfigError::Missing("AUTH_EMAIL").to_string(),
            "missing configuration: AUTH_EMAIL"
        );
    }
}

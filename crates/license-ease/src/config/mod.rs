use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::licensing::applications::intake::DEFAULT_MAX_FILE_BYTES;

const DEVELOPMENT_JWT_SECRET: &str = "license-ease-dev-jwt-secret";
const DEVELOPMENT_WEBHOOK_SECRET: &str = "license-ease-dev-webhook-secret";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub payments: PaymentConfig,
    pub intake: IntakeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = secret_var(environment, "APP_JWT_SECRET", DEVELOPMENT_JWT_SECRET)?;
        let role_claim = env::var("APP_ROLE_CLAIM").unwrap_or_else(|_| "role".to_string());
        let default_role = env::var("APP_DEFAULT_ROLE").unwrap_or_else(|_| "client".to_string());
        if role_claim.trim().is_empty() {
            return Err(ConfigError::EmptyValue { key: "APP_ROLE_CLAIM" });
        }
        if default_role.trim().is_empty() {
            return Err(ConfigError::EmptyValue {
                key: "APP_DEFAULT_ROLE",
            });
        }

        let webhook_secret =
            secret_var(environment, "APP_WEBHOOK_SECRET", DEVELOPMENT_WEBHOOK_SECRET)?;
        let webhook_tolerance_secs = parse_u64("APP_WEBHOOK_TOLERANCE_SECS", 300)?;
        let settlement_currency = env::var("APP_SETTLEMENT_CURRENCY")
            .unwrap_or_else(|_| "RWF".to_string())
            .trim()
            .to_ascii_uppercase();

        let max_upload_bytes = parse_u64("APP_MAX_UPLOAD_BYTES", DEFAULT_MAX_FILE_BYTES)?;
        let fee_schedule_path = env::var("APP_FEE_SCHEDULE_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            auth: AuthConfig {
                jwt_secret,
                role_claim,
                default_role,
            },
            payments: PaymentConfig {
                webhook_secret,
                webhook_tolerance_secs,
                settlement_currency,
            },
            intake: IntakeConfig {
                max_upload_bytes,
                fee_schedule_path,
            },
        })
    }
}

fn secret_var(
    environment: AppEnvironment,
    key: &'static str,
    development_default: &str,
) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ if environment == AppEnvironment::Production => Err(ConfigError::MissingSecret { key }),
        _ => Ok(development_default.to_string()),
    }
}

fn parse_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Credential verification and role resolution settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Dotted path of the claim holding the caller's role, e.g. `custom_claims.role`.
    pub role_claim: String,
    /// Role assigned when the verified token carries no role claim.
    pub default_role: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("role_claim", &self.role_claim)
            .field("default_role", &self.default_role)
            .finish()
    }
}

/// Payment provider settings.
#[derive(Clone)]
pub struct PaymentConfig {
    pub webhook_secret: String,
    pub webhook_tolerance_secs: u64,
    pub settlement_currency: String,
}

impl fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("webhook_secret", &"[REDACTED]")
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("settlement_currency", &self.settlement_currency)
            .finish()
    }
}

/// Document intake limits and the optional fee catalog override.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub max_upload_bytes: u64,
    pub fee_schedule_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    EmptyValue { key: &'static str },
    MissingSecret { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
            ConfigError::EmptyValue { key } => write!(f, "{key} must not be empty"),
            ConfigError::MissingSecret { key } => {
                write!(f, "{key} is required when APP_ENV=production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

use secrecy::SecretString;
use service_core::config::{self as core_config, parse_flag, parse_list};
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub agent: AgentConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Unset outside prod means the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub strict_origins: bool,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub session_attempts: u32,
    pub session_window_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Only needed when a snapshot is emailed.
    pub api_key: Option<SecretString>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub from_address: String,
    pub from_name: String,
}

pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

impl ReadinessConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = ReadinessConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("readiness-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: if is_prod {
                    Some(get_env("DATABASE_URL", None, true)?)
                } else {
                    get_optional_env("DATABASE_URL")
                },
                max_connections: get_parsed("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: get_parsed("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            session: SessionConfig {
                ttl_hours: get_parsed("SESSION_TTL_HOURS", "168", is_prod)?,
            },
            cors: CorsConfig {
                allowed_origins: parse_list(&get_env(
                    "CORS_ALLOWED_ORIGINS",
                    Some(DEFAULT_ALLOWED_ORIGINS),
                    is_prod,
                )?),
                strict_origins: parse_flag(&get_env("CORS_STRICT_ORIGINS", Some("false"), false)?),
            },
            rate_limit: RateLimitConfig {
                session_attempts: get_parsed("RATE_LIMIT_SESSION_ATTEMPTS", "10", is_prod)?,
                session_window_seconds: get_parsed(
                    "RATE_LIMIT_SESSION_WINDOW_SECONDS",
                    "3600",
                    is_prod,
                )?,
            },
            agent: AgentConfig {
                api_key: if is_prod {
                    Some(SecretString::new(get_env("AGENT_API_KEY", None, true)?))
                } else {
                    get_optional_env("AGENT_API_KEY").map(SecretString::new)
                },
                model: get_env("AGENT_MODEL", Some("claude-sonnet-4-20250514"), false)?,
                base_url: get_env("AGENT_BASE_URL", Some("https://api.anthropic.com"), false)?,
                timeout_seconds: get_parsed("AGENT_TIMEOUT_SECONDS", "120", false)?,
                max_tokens: get_parsed("AGENT_MAX_TOKENS", "4096", false)?,
            },
            email: EmailConfig {
                api_key: get_optional_env("EMAIL_API_KEY").map(SecretString::new),
                smtp_host: get_env("EMAIL_SMTP_HOST", Some("smtp.resend.com"), false)?,
                smtp_port: get_parsed("EMAIL_SMTP_PORT", "587", false)?,
                smtp_user: get_env("EMAIL_SMTP_USER", Some("resend"), false)?,
                from_address: get_env("EMAIL_FROM", Some("snapshots@localhost"), is_prod)?,
                from_name: get_env("EMAIL_FROM_NAME", Some("Atlas Readiness Guide"), false)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.session.ttl_hours <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_HOURS must be positive"
            )));
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "CORS_ALLOWED_ORIGINS must name at least one origin"
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS cannot exceed DATABASE_MAX_CONNECTIONS"
            )));
        }

        if self.environment == Environment::Prod
            && self.cors.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session.ttl_hours)
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_parsed<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), is_prod)?;
    parse_value(key, &raw)
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("Invalid {}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

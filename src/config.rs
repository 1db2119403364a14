use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 5000;
const CONFIG_DIR: &str = "config";
const DEFAULT_ORDER_NUMBER_PREFIX: &str = "ORD";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.razorpay.com";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Page size used when a list request names none
    #[serde(default = "default_api_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub api_default_page_size: u64,

    /// Upper bound on any requested page size
    #[serde(default = "default_api_max_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub api_max_page_size: u64,

    /// Leading segment of generated order numbers
    #[serde(default = "default_order_number_prefix")]
    #[validate(custom = "validate_order_number_prefix")]
    pub order_number_prefix: String,

    /// ISO currency code sent to the payment gateway
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub currency: String,

    /// Payment gateway key id; gateway is disabled unless both key id and secret are set
    #[serde(default)]
    pub payment_gateway_key_id: Option<String>,

    /// Payment gateway key secret, also the HMAC key for callback signatures
    #[serde(default)]
    pub payment_gateway_key_secret: Option<String>,

    /// Payment gateway API root
    #[serde(default = "default_gateway_base_url")]
    pub payment_gateway_base_url: String,

    /// Mail relay endpoint; email is log-only when unset
    #[serde(default)]
    pub mail_api_url: Option<String>,

    /// Bearer token for the mail relay
    #[serde(default)]
    pub mail_api_token: Option<String>,

    /// Sender address for outgoing email
    #[serde(default)]
    #[validate(email)]
    pub mail_from: Option<String>,

    /// Recipient of new-order notifications
    #[serde(default)]
    #[validate(email)]
    pub admin_email: Option<String>,
}

/// Credentials for the hosted payment gateway
#[derive(Clone, Debug)]
pub struct GatewayCredentials {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
    pub currency: String,
}

/// Mail relay connection settings
#[derive(Clone, Debug)]
pub struct MailRelaySettings {
    pub url: String,
    pub token: Option<String>,
    pub from: String,
    pub admin_email: Option<String>,
}

impl AppConfig {
    /// Creates a new configuration with defaults for everything optional
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            api_default_page_size: default_api_page_size(),
            api_max_page_size: default_api_max_page_size(),
            order_number_prefix: default_order_number_prefix(),
            currency: default_currency(),
            payment_gateway_key_id: None,
            payment_gateway_key_secret: None,
            payment_gateway_base_url: default_gateway_base_url(),
            mail_api_url: None,
            mail_api_token: None,
            mail_from: None,
            admin_email: None,
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        !self.is_production() || self.cors_allow_any_origin
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Gateway credentials, or `None` when the gateway is not configured
    pub fn gateway_credentials(&self) -> Option<GatewayCredentials> {
        let key_id = non_blank(self.payment_gateway_key_id.as_deref())?;
        let key_secret = non_blank(self.payment_gateway_key_secret.as_deref())?;
        Some(GatewayCredentials {
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
            base_url: self.payment_gateway_base_url.trim_end_matches('/').to_string(),
            currency: self.currency.clone(),
        })
    }

    /// Mail relay settings, or `None` when email delivery is not configured
    pub fn mail_relay(&self) -> Option<MailRelaySettings> {
        let url = non_blank(self.mail_api_url.as_deref())?;
        let from = non_blank(self.mail_from.as_deref())?;
        Some(MailRelaySettings {
            url: url.to_string(),
            token: non_blank(self.mail_api_token.as_deref()).map(str::to_string),
            from: from.to_string(),
            admin_email: non_blank(self.admin_email.as_deref()).map(str::to_string),
        })
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.api_default_page_size > self.api_max_page_size {
            let mut err = ValidationError::new("api_default_page_size");
            err.message = Some("api_default_page_size must not exceed api_max_page_size".into());
            errors.add("api_default_page_size", err);
        }

        if !self.has_cors_allowed_origins() && !self.should_allow_permissive_cors() {
            let mut err = ValidationError::new("cors_allowed_origins");
            err.message = Some(
                "Production requires APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
                    .into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_api_page_size() -> u64 {
    50
}

fn default_api_max_page_size() -> u64 {
    100
}

fn default_order_number_prefix() -> String {
    DEFAULT_ORDER_NUMBER_PREFIX.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_gateway_base_url() -> String {
    DEFAULT_GATEWAY_BASE_URL.to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_order_number_prefix(prefix: &str) -> Result<(), ValidationError> {
    if !prefix.is_empty() && prefix.len() <= 8 && prefix.chars().all(|c| c.is_ascii_alphanumeric())
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("order_number_prefix");
        err.message = Some("order_number_prefix must be 1-8 ASCII letters or digits".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_orders={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit config directory
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let dir = config_dir.display();
    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    if app_config.gateway_credentials().is_none() {
        info!("Payment gateway credentials not set; online payments disabled");
    }

    info!("Configuration loaded successfully");
    Ok(app_config)
}

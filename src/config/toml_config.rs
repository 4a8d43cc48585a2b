use crate::domain::ports::ConfigProvider;
use crate::utils::error::{BookingError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub square: SquareConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub session_ttl_minutes: i64,
    pub cookie_secure: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            session_ttl_minutes: 60,
            cookie_secure: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquareConfig {
    #[serde(default = "default_square_base_url")]
    pub base_url: String,
    pub access_token: String,
    pub location_id: String,
    #[serde(default = "default_square_api_version")]
    pub api_version: String,
    pub timeout_seconds: Option<u64>,
}

fn default_square_base_url() -> String {
    "https://connect.squareup.com".to_string()
}

fn default_square_api_version() -> String {
    "2024-07-17".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_base_url")]
    pub base_url: String,
    pub api_key: String,
}

fn default_identity_base_url() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub max_quantity_per_service: u32,
    pub max_search_days: i64,
    pub default_search_days: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_quantity_per_service: 5,
            max_search_days: 31,
            default_search_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub token: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BookingError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BookingError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SQUARE_ACCESS_TOKEN})，未設定的保留原樣，交給驗證階段回報
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BookingError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.server.host)?;
        validation::validate_range("server.port", self.server.port, 1, u16::MAX)?;
        validation::validate_range(
            "server.session_ttl_minutes",
            self.server.session_ttl_minutes,
            1,
            24 * 60,
        )?;

        validation::validate_url("square.base_url", &self.square.base_url)?;
        validation::validate_resolved("square.access_token", &self.square.access_token)?;
        validation::validate_non_empty_string("square.access_token", &self.square.access_token)?;
        validation::validate_resolved("square.location_id", &self.square.location_id)?;
        validation::validate_non_empty_string("square.location_id", &self.square.location_id)?;
        validation::validate_non_empty_string("square.api_version", &self.square.api_version)?;

        validation::validate_url("identity.base_url", &self.identity.base_url)?;
        validation::validate_resolved("identity.api_key", &self.identity.api_key)?;

        validation::validate_range(
            "booking.max_quantity_per_service",
            self.booking.max_quantity_per_service,
            1,
            20,
        )?;
        // Square 的 availability 搜尋區間上限為 32 天
        validation::validate_range("booking.max_search_days", self.booking.max_search_days, 1, 31)?;
        validation::validate_range(
            "booking.default_search_days",
            self.booking.default_search_days,
            1,
            self.booking.max_search_days,
        )?;

        validation::validate_resolved("admin.token", &self.admin.token)?;
        if self.admin.token.len() < 16 {
            return Err(BookingError::InvalidConfigValueError {
                field: "admin.token".to_string(),
                value: "<redacted>".to_string(),
                reason: "Admin token must be at least 16 characters".to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ConfigProvider for AppConfig {
    fn location_id(&self) -> &str {
        &self.square.location_id
    }

    fn max_quantity_per_service(&self) -> u32 {
        self.booking.max_quantity_per_service
    }

    fn max_search_days(&self) -> i64 {
        self.booking.max_search_days
    }

    fn default_search_days(&self) -> i64 {
        self.booking.default_search_days
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Platform request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration field '{field}' is invalid: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Rate limited by platform")]
    RateLimited,

    #[error("Session expired or missing")]
    SessionExpired,

    #[error("Requested time is no longer available")]
    SlotUnavailable,

    #[error("Platform error ({status}) {code}: {detail}")]
    PlatformError {
        status: u16,
        code: String,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, BookingError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Client,
    Platform,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BookingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BookingError::ValidationError {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        BookingError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        BookingError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BookingError::ConfigError { .. }
            | BookingError::ConfigValidationError { .. }
            | BookingError::InvalidConfigValueError { .. }
            | BookingError::MissingConfigError { .. } => ErrorCategory::Configuration,
            BookingError::ValidationError { .. }
            | BookingError::NotFound { .. }
            | BookingError::Unauthorized { .. }
            | BookingError::SessionExpired
            | BookingError::SlotUnavailable => ErrorCategory::Client,
            BookingError::HttpError(_)
            | BookingError::RateLimited
            | BookingError::PlatformError { .. } => ErrorCategory::Platform,
            BookingError::IoError(_) | BookingError::SerializationError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Client => ErrorSeverity::Low,
            ErrorCategory::Platform => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 對外的錯誤代碼，用於重導向的 `?error=` 參數與 JSON 回應
    pub fn error_code(&self) -> &'static str {
        match self {
            BookingError::ValidationError { .. } => "validation",
            BookingError::NotFound { .. } => "not_found",
            BookingError::Unauthorized { .. } => "unauthorized",
            BookingError::RateLimited => "rate_limited",
            BookingError::SessionExpired => "session_expired",
            BookingError::SlotUnavailable => "unavailable",
            BookingError::HttpError(_) | BookingError::PlatformError { .. } => "platform_error",
            _ => "internal",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BookingError::ValidationError { message } => message.clone(),
            BookingError::NotFound { resource } => format!("{} could not be found", resource),
            BookingError::Unauthorized { .. } => "Please sign in to continue".to_string(),
            BookingError::RateLimited => {
                "The booking system is busy, please try again shortly".to_string()
            }
            BookingError::SessionExpired => {
                "Your session has expired, please start again".to_string()
            }
            BookingError::SlotUnavailable => {
                "That time is no longer available, please pick another".to_string()
            }
            BookingError::HttpError(_) | BookingError::PlatformError { .. } => {
                "The booking system could not complete the request".to_string()
            }
            _ => "Something went wrong on our side".to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check salon.toml and the referenced environment variables",
            ErrorCategory::Client => "Review the submitted request and try again",
            ErrorCategory::Platform => "Check Square credentials, location id and platform status",
            ErrorCategory::System => "Check file permissions and server logs",
        }
    }
}

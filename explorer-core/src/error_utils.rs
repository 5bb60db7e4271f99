use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

/// Reporting helpers shared by every error type of the workspace.
pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    /// Message suitable for printing to the user.
    fn user_friendly_message(&self) -> String;
    /// Stable identifier, e.g. `REDDIT_RATE_LIMIT`.
    fn error_code(&self) -> &'static str;
}

macro_rules! log_as {
    ($label:literal) => {
        fn log_error(&self) -> &Self {
            error!(concat!($label, ": {}"), self);
            self
        }

        fn log_warn(&self) -> &Self {
            warn!(concat!($label, " (warning): {}"), self);
            self
        }
    };
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("{} [{}]", self, self.error_code());
        match self {
            CoreError::RedditApi(e) => {
                e.log_error();
            }
            CoreError::Database(e) => {
                e.log_error();
            }
            CoreError::Llm(e) => {
                e.log_error();
            }
            CoreError::Config(e) => {
                e.log_error();
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("{} [{}]", self, self.error_code());
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_retryable(),
            CoreError::Database(e) => e.is_retryable(),
            CoreError::Llm(e) => e.is_retryable(),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RedditApi(e) => e.retry_after(),
            CoreError::Database(e) => e.retry_after(),
            CoreError::Llm(e) => e.retry_after(),
            CoreError::Network(_) if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Database(e) => e.user_friendly_message(),
            CoreError::Llm(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(e) if e.is_timeout() => {
                "The request timed out. Check your connection and try again.".to_string()
            }
            CoreError::Network(_) => {
                "Could not reach the server. Check your internet connection.".to_string()
            }
            CoreError::Io(e) => format!("File error: {}", e),
            CoreError::Serialization(_) => "Stored data could not be read.".to_string(),
            CoreError::InvalidInput { message } => message.clone(),
            CoreError::NotFound { resource } => format!("No {} was found.", resource),
            CoreError::Internal { message } => format!("Something went wrong: {}", message),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CoreError::RedditApi(e) => e.error_code(),
            CoreError::Database(e) => e.error_code(),
            CoreError::Llm(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "SERIALIZATION",
            CoreError::Network(_) => "NETWORK",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Internal { .. } => "INTERNAL",
        }
    }
}

impl ErrorExt for RedditApiError {
    log_as!("Reddit");

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            RedditApiError::RateLimitExceeded { .. }
                | RedditApiError::RequestTimeout
                | RedditApiError::ServerError { .. }
                | RedditApiError::EndpointUnavailable { .. }
                | RedditApiError::InvalidResponse { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(30)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Reddit is rate limiting requests. Wait {} seconds and try again.",
                retry_after
            ),
            RedditApiError::Unauthorized => {
                "Reddit refused the request. Try a different user agent in [reddit].".to_string()
            }
            RedditApiError::Forbidden { resource } => format!(
                "Reddit denied access to {}. The subreddit may be private or quarantined.",
                resource
            ),
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("r/{} does not exist or is private.", subreddit)
            }
            RedditApiError::PostNotFound { post_id } => {
                format!("Post {} could not be found on Reddit.", post_id)
            }
            RedditApiError::EndpointUnavailable { endpoint } => {
                format!("{} is not available.", endpoint)
            }
            RedditApiError::RequestTimeout => "Reddit did not answer in time.".to_string(),
            RedditApiError::InvalidResponse { .. } => {
                "Reddit sent a response that could not be understood.".to_string()
            }
            RedditApiError::ServerError { status_code } => {
                format!("Reddit is having problems (HTTP {}). Try again later.", status_code)
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT",
            RedditApiError::Unauthorized => "REDDIT_UNAUTHORIZED",
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN",
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND",
            RedditApiError::PostNotFound { .. } => "REDDIT_POST_NOT_FOUND",
            RedditApiError::EndpointUnavailable { .. } => "REDDIT_ENDPOINT_UNAVAILABLE",
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT",
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE",
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR",
        }
    }
}

impl ErrorExt for DatabaseError {
    log_as!("Database");

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseError::DatabaseLocked | DatabaseError::ConnectionFailed { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            DatabaseError::DatabaseLocked => Some(Duration::from_millis(100)),
            DatabaseError::ConnectionFailed { .. } => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { reason } => {
                format!("Could not open the database: {}", reason)
            }
            DatabaseError::MigrationFailed { .. } => {
                "The database schema could not be updated.".to_string()
            }
            DatabaseError::ConstraintViolation { constraint } => {
                format!("That change conflicts with existing data ({}).", constraint)
            }
            DatabaseError::ProtectedCategory { name } => {
                format!("The '{}' category cannot be renamed or removed.", name)
            }
            DatabaseError::DatabaseLocked => {
                "The database is busy, probably used by another command. Try again.".to_string()
            }
            DatabaseError::Sql(_) => "A database query failed.".to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED",
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED",
            DatabaseError::ConstraintViolation { .. } => "DB_CONSTRAINT_VIOLATION",
            DatabaseError::ProtectedCategory { .. } => "DB_PROTECTED_CATEGORY",
            DatabaseError::DatabaseLocked => "DB_LOCKED",
            DatabaseError::Sql(_) => "DB_SQL_ERROR",
        }
    }
}

impl ErrorExt for LlmError {
    log_as!("LLM");

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimitExceeded { .. }
                | LlmError::ServiceUnavailable { .. }
                | LlmError::RequestTimeout { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimitExceeded { retry_after, .. } => {
                Some(Duration::from_secs(*retry_after))
            }
            LlmError::ServiceUnavailable { .. } | LlmError::RequestTimeout { .. } => {
                Some(Duration::from_secs(10))
            }
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LlmError::InvalidApiKey { provider } => {
                format!("{} rejected the API key. Check [ai].api_key or OPENAI_API_KEY.", provider)
            }
            LlmError::RateLimitExceeded {
                provider,
                retry_after,
            } => format!(
                "{} is rate limiting requests. Wait {} seconds and try again.",
                provider, retry_after
            ),
            LlmError::ModelNotAvailable { model } => {
                format!("Model '{}' is not available. Set another one in [ai].model.", model)
            }
            LlmError::InvalidPrompt { reason } => format!("Invalid AI request: {}", reason),
            LlmError::ServiceUnavailable { provider } => {
                format!("{} is temporarily unavailable. Try again later.", provider)
            }
            LlmError::RequestTimeout { provider } => {
                format!("{} did not answer in time.", provider)
            }
            LlmError::InsufficientCredits { provider } => {
                format!("Your {} account has no credits left.", provider)
            }
            LlmError::InvalidResponseFormat { provider } => {
                format!("{} sent a reply that could not be understood.", provider)
            }
            LlmError::RequestFailed {
                provider, status, ..
            } => format!("{} request failed with HTTP {}.", provider, status),
            LlmError::NotConfigured => {
                "AI features need an API key. Set OPENAI_API_KEY or [ai].api_key.".to_string()
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            LlmError::InvalidApiKey { .. } => "LLM_INVALID_API_KEY",
            LlmError::RateLimitExceeded { .. } => "LLM_RATE_LIMIT",
            LlmError::ModelNotAvailable { .. } => "LLM_MODEL_NOT_AVAILABLE",
            LlmError::InvalidPrompt { .. } => "LLM_INVALID_PROMPT",
            LlmError::ServiceUnavailable { .. } => "LLM_SERVICE_UNAVAILABLE",
            LlmError::RequestTimeout { .. } => "LLM_TIMEOUT",
            LlmError::InsufficientCredits { .. } => "LLM_INSUFFICIENT_CREDITS",
            LlmError::InvalidResponseFormat { .. } => "LLM_INVALID_RESPONSE",
            LlmError::RequestFailed { .. } => "LLM_REQUEST_FAILED",
            LlmError::NotConfigured => "LLM_NOT_CONFIGURED",
        }
    }
}

impl ErrorExt for ConfigError {
    log_as!("Config");

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => format!(
                "Configuration file '{}' not found. Copy reddit_explorer.example.toml to get started.",
                path
            ),
            ConfigError::Parse(e) => format!("reddit_explorer.toml could not be parsed: {}", e),
            ConfigError::InvalidValue { field, value } => {
                format!("'{}' is not a valid value for {}.", value, field)
            }
            ConfigError::ValidationFailed { reason } => {
                format!("Configuration is invalid: {}", reason)
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED",
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR",
        }
    }
}

/// Logs errors with their code, user message and retry hint.
pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if !self.report_errors {
            return;
        }
        error.log_error();
        info!("User message: {}", error.user_friendly_message());
        if let Some(retry_after) = error.retry_after().filter(|_| error.is_retryable()) {
            info!("Retryable after {:?}", retry_after);
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

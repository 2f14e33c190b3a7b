//! Error types for the livewheel client engine
//!
//! Every failure in the engine falls into one of a handful of categories:
//! push-channel connection problems, outbound request failures, malformed
//! inbound events and guard violations. None of them are fatal to the running
//! process; the category decides how a failure is surfaced and recovered.

use thiserror::Error;

/// Result type alias for livewheel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories used to route failures to the right surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport or protocol failure on the push channel
    Connection,
    /// An outbound request to the game API failed
    Request,
    /// A single inbound message could not be parsed
    MalformedEvent,
    /// An operation was requested in a state that does not allow it
    Guard,
    /// Configuration loading or validation problems
    Configuration,
    /// Everything else
    Internal,
}

impl ErrorCategory {
    /// How loudly this category should be surfaced
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection => ErrorSeverity::High,
            Self::Configuration | Self::Internal => ErrorSeverity::High,
            Self::Request => ErrorSeverity::Medium,
            Self::MalformedEvent => ErrorSeverity::Low,
            Self::Guard => ErrorSeverity::Silent,
        }
    }

    /// How the category is presented to the player
    pub fn surface(&self) -> ErrorSurface {
        match self {
            Self::Connection => ErrorSurface::PersistentBanner,
            Self::Request => ErrorSurface::TransientNotice,
            Self::MalformedEvent | Self::Guard => ErrorSurface::LogOnly,
            Self::Configuration | Self::Internal => ErrorSurface::LogOnly,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Silent,
    Low,
    Medium,
    High,
}

/// Where an error ends up once it reaches the composition root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSurface {
    /// Stays visible with a manual retry until the channel recovers
    PersistentBanner,
    /// Shown inline and cleared after a few seconds
    TransientNotice,
    /// Never shown, only logged
    LogOnly,
}

/// livewheel error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Malformed event on {destination}: {reason}")]
    MalformedEvent { destination: String, reason: String },

    #[error("Request error: {0}")]
    Request(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid wager: {0}")]
    InvalidWager(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Guard violation: {0}")]
    GuardViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Request(format!("HTTP request error: {}", err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("Invalid URL: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Connection(format!("WebSocket error: {}", err))
    }
}

impl Error {
    /// Short stable code for log correlation
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E001",
            Self::Connection(_) => "E010",
            Self::ChannelClosed(_) => "E011",
            Self::Protocol(_) => "E012",
            Self::MalformedEvent { .. } => "E020",
            Self::Request(_) => "E030",
            Self::Api { .. } => "E031",
            Self::NotAuthenticated => "E032",
            Self::InvalidWager(_) => "E033",
            Self::InsufficientBalance => "E034",
            Self::GuardViolation(_) => "E040",
            Self::Serialization(_) => "E050",
            Self::Config(_) => "E060",
            Self::Internal(_) => "E099",
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection(_) | Self::ChannelClosed(_) | Self::Protocol(_) => {
                ErrorCategory::Connection
            }
            Self::MalformedEvent { .. } => ErrorCategory::MalformedEvent,
            Self::Request(_)
            | Self::Api { .. }
            | Self::NotAuthenticated
            | Self::InvalidWager(_)
            | Self::InsufficientBalance => ErrorCategory::Request,
            Self::GuardViolation(_) => ErrorCategory::Guard,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Io(_) | Self::Serialization(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Get the error severity
    pub fn severity(&self) -> ErrorSeverity {
        self.category().severity()
    }

    /// Only push-channel failures are retried automatically; requests never are
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Connection
    }

    /// Create a malformed event error for a destination
    pub fn malformed(destination: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedEvent {
            destination: destination.into(),
            reason: reason.into(),
        }
    }

    /// Human-readable text suitable for an inline notice or banner
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::Connection(message) | Self::Protocol(message) => message.clone(),
            Self::InsufficientBalance => "Insufficient balance".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = Error::Connection("socket reset".to_string());
        assert_eq!(err.category(), ErrorCategory::Connection);
        assert_eq!(err.category().surface(), ErrorSurface::PersistentBanner);
        assert!(err.is_retryable());

        let err = Error::Api {
            status: 400,
            message: "Betting is closed".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Request);
        assert_eq!(err.category().surface(), ErrorSurface::TransientNotice);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_guard_violations_are_silent() {
        let err = Error::GuardViolation("settle without winning number".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Silent);
        assert_eq!(err.category().surface(), ErrorSurface::LogOnly);
    }

    #[test]
    fn test_user_message() {
        let err = Error::Api {
            status: 409,
            message: "Bet already settled".to_string(),
        };
        assert_eq!(err.user_message(), "Bet already settled");
        assert_eq!(Error::InsufficientBalance.user_message(), "Insufficient balance");
        assert_eq!(err.code(), "E031");
    }

    #[test]
    fn test_malformed_helper() {
        let err = Error::malformed("/topic/game", "expected value");
        assert!(matches!(err, Error::MalformedEvent { .. }));
        assert_eq!(err.category(), ErrorCategory::MalformedEvent);
    }
}

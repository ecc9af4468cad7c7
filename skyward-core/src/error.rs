use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Business-rule rejections the UI reacts to with a mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    PassportRequired,
    TooManyOtpAttempts,
    FareExpired,
    Other,
}

impl RejectionKind {
    fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "PASSPORT_REQUIRED" => Some(RejectionKind::PassportRequired),
            "TOO_MANY_OTP_ATTEMPTS" | "OTP_LIMIT_EXCEEDED" => Some(RejectionKind::TooManyOtpAttempts),
            "FARE_EXPIRED" | "FARE_NOT_AVAILABLE" | "SESSION_EXPIRED" => Some(RejectionKind::FareExpired),
            _ => None,
        }
    }

    // Backends that predate error codes only send copy.
    fn from_message(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("passport") {
            RejectionKind::PassportRequired
        } else if message.contains("too many otp") {
            RejectionKind::TooManyOtpAttempts
        } else if message.contains("fare expired")
            || message.contains("session expired")
            || message.contains("no longer available")
        {
            RejectionKind::FareExpired
        } else {
            RejectionKind::Other
        }
    }
}

/// A 4xx from the backend, surfaced verbatim to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub message: String,
}

impl Rejection {
    /// Structured `code` wins; the message is only inspected when the
    /// code is absent or unknown.
    pub fn classify(code: Option<&str>, message: &str) -> Self {
        let kind = code
            .and_then(RejectionKind::from_code)
            .unwrap_or_else(|| RejectionKind::from_message(message));
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("Booking backend unreachable: {0}")]
    Transport(String),
    #[error("Booking backend timed out")]
    Timeout,
    #[error("Booking backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("{}", .0.message)]
    Rejected(Rejection),
    #[error("Unexpected booking backend response: {0}")]
    Decode(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    /// Timeouts, connection failures and 5xx are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport(_) | BackendError::Timeout => true,
            BackendError::Status { status, .. } => *status >= 500 || *status == 429,
            BackendError::Rejected(_) | BackendError::Decode(_) => false,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            BackendError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// Builds the error for a non-2xx response from its status and body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let message = field("message")
            .or_else(|| field("error"))
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        if (400..500).contains(&status) && status != 429 {
            let code = field("code");
            BackendError::Rejected(Rejection::classify(code.as_deref(), &message))
        } else {
            BackendError::Status { status, message }
        }
    }
}

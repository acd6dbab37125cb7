//! Error handling for the booking client
//!
//! Backend failures arrive as arbitrary JSON bodies (`{"detail": ...}`,
//! `{"error": ...}`, `{"message": ...}` or per-field arrays). They are
//! normalized exactly once, into [`ApiError`], at the session boundary.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

const MSG_NETWORK: &str = "تعذر الاتصال بالخادم، يرجى المحاولة مرة أخرى";
const MSG_AUTH_EXPIRED: &str = "انتهت الجلسة، يرجى تسجيل الدخول مرة أخرى";
const MSG_UNAUTHORIZED: &str = "بيانات الدخول غير صحيحة";
const MSG_NOT_FOUND: &str = "العنصر غير موجود أو تم حذفه";
const MSG_FORBIDDEN: &str = "غير مسموح";
const MSG_SERVER: &str = "حدث خطأ في الخادم";
const MSG_UNEXPECTED: &str = "حدث خطأ غير متوقع";

/// Category of a failed API call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 401 that could not be recovered by a token refresh; the session is gone
    AuthExpired,
    /// 401 from an endpoint that checks credentials (login)
    Unauthorized,
    /// 4xx carrying field-level messages
    Validation,
    /// Business rule refusal: full group, duplicate or missing membership
    Conflict,
    /// No response was received
    Network,
    /// Referenced record does not exist
    NotFound,
    /// Authenticated but not allowed
    Forbidden,
    /// 5xx
    Server,
    /// Anything the backend should never send
    Unexpected,
}

impl ErrorKind {
    fn default_message(self) -> &'static str {
        match self {
            ErrorKind::AuthExpired => MSG_AUTH_EXPIRED,
            ErrorKind::Unauthorized => MSG_UNAUTHORIZED,
            ErrorKind::Network => MSG_NETWORK,
            ErrorKind::NotFound => MSG_NOT_FOUND,
            ErrorKind::Forbidden => MSG_FORBIDDEN,
            ErrorKind::Server => MSG_SERVER,
            ErrorKind::Validation | ErrorKind::Conflict | ErrorKind::Unexpected => MSG_UNEXPECTED,
        }
    }
}

/// A normalized backend error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The error category
    pub kind: ErrorKind,

    /// HTTP status, absent for transport failures
    pub status: Option<StatusCode>,

    /// Message suitable for showing to the user
    pub message: String,

    /// Field name to first message, for inline form errors
    pub field_errors: BTreeMap<String, String>,
}

impl ApiError {
    /// Create an error with the default message for its kind
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            status: None,
            message: kind.default_message().to_string(),
            field_errors: BTreeMap::new(),
        }
    }

    /// Replace the message
    pub fn with_message<T: fmt::Display>(mut self, message: T) -> Self {
        self.message = message.to_string();
        self
    }

    /// The session could not be kept alive
    pub fn auth_expired() -> Self {
        Self::new(ErrorKind::AuthExpired).with_status(StatusCode::UNAUTHORIZED)
    }

    fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Normalize a non-success response body
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();

        let mut message = None;
        let mut field_errors = BTreeMap::new();

        match parsed {
            Some(Value::Object(map)) => {
                for key in ["detail", "error", "message", "non_field_errors"] {
                    if let Some(text) = map.get(key).and_then(first_text) {
                        message = Some(text);
                        break;
                    }
                }
                for (key, value) in &map {
                    if matches!(key.as_str(), "detail" | "error" | "message" | "non_field_errors" | "code") {
                        continue;
                    }
                    if let Some(text) = first_text(value) {
                        field_errors.insert(key.clone(), text);
                    }
                }
            }
            Some(other) => message = first_text(&other),
            None => {}
        }

        let kind = match status {
            StatusCode::UNAUTHORIZED => ErrorKind::Unauthorized,
            StatusCode::FORBIDDEN => ErrorKind::Forbidden,
            StatusCode::NOT_FOUND => ErrorKind::NotFound,
            StatusCode::CONFLICT => ErrorKind::Conflict,
            s if s.is_client_error() && !field_errors.is_empty() => ErrorKind::Validation,
            s if s.is_client_error() => ErrorKind::Conflict,
            s if s.is_server_error() => ErrorKind::Server,
            _ => ErrorKind::Unexpected,
        };

        // A field message is still better than a generic one
        let message = message
            .or_else(|| field_errors.values().next().cloned())
            .unwrap_or_else(|| kind.default_message().to_string());

        Self {
            kind,
            status: Some(status),
            message,
            field_errors,
        }
    }

    /// Map a transport error that never produced a usable response
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
            ErrorKind::Network
        } else {
            ErrorKind::Unexpected
        };
        let mut api_error = Self::new(kind);
        api_error.status = err.status();
        api_error
    }

    /// Message for a single form field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.field_errors.get(name).map(String::as_str)
    }

    /// Whether the caller should offer a retry affordance
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Network | ErrorKind::Server)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{:?} ({}): {}", self.kind, status.as_u16(), self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

/// Actions refused on the client before any request is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No session; the caller must go to the login entry point
    LoginRequired,
    /// The cached group has no seats left
    GroupFull,
    /// The user already belongs to the group
    AlreadyEnrolled,
    /// The user does not belong to the group
    NotEnrolled,
    /// Another join/leave is still in flight
    Busy,
    /// Memberships are not loaded yet
    Loading,
}

impl Rejection {
    /// Message suitable for showing to the user
    pub fn message(self) -> &'static str {
        match self {
            Rejection::LoginRequired => "يجب تسجيل الدخول أولاً",
            Rejection::GroupFull => "هذه المجموعة مكتملة",
            Rejection::AlreadyEnrolled => "أنت بالفعل عضو في هذه المجموعة",
            Rejection::NotEnrolled => "أنت لست عضوًا في هذه المجموعة",
            Rejection::Busy => "جاري تنفيذ طلب سابق",
            Rejection::Loading => "جاري تحميل البيانات، يرجى الانتظار",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Rejection::LoginRequired => "login required",
            Rejection::GroupFull => "group is full",
            Rejection::AlreadyEnrolled => "already enrolled",
            Rejection::NotEnrolled => "not enrolled",
            Rejection::Busy => "another action is in flight",
            Rejection::Loading => "memberships are still loading",
        };
        f.write_str(text)
    }
}

/// Unified error type for the booking client
#[derive(Error, Debug)]
pub enum Error {
    /// Backend or transport failure
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Client-side refusal
    #[error("Rejected: {0}")]
    Rejected(Rejection),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Session store errors
    #[error("Session store error: {0}")]
    Store(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Api(ApiError::from_transport(&err))
    }
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        Error::Rejected(rejection)
    }
}

impl Error {
    /// Create a new session store error
    pub fn store<T: fmt::Display>(msg: T) -> Self {
        Error::Store(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// The API error category, if this came from the backend
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Api(api) => Some(api.kind),
            _ => None,
        }
    }

    /// The normalized API error, if any
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            Error::Api(api) => api.message.clone(),
            Error::Rejected(rejection) => rejection.message().to_string(),
            _ => MSG_UNEXPECTED.to_string(),
        }
    }
}

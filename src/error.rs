use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Outcome classes every failed request is sorted into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    InvalidInput,
    NotFound,
    Forbidden,
    Unreachable,
    Timeout,
    RemoteOther,
    LocalIo,
}

impl FailureClass {
    pub fn status(&self) -> StatusCode {
        match self {
            FailureClass::InvalidInput => StatusCode::BAD_REQUEST,
            FailureClass::NotFound => StatusCode::NOT_FOUND,
            FailureClass::Forbidden => StatusCode::FORBIDDEN,
            FailureClass::Unreachable => StatusCode::SERVICE_UNAVAILABLE,
            FailureClass::Timeout => StatusCode::REQUEST_TIMEOUT,
            FailureClass::RemoteOther | FailureClass::LocalIo => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::InvalidInput => write!(f, "invalid_input"),
            FailureClass::NotFound => write!(f, "not_found"),
            FailureClass::Forbidden => write!(f, "forbidden"),
            FailureClass::Unreachable => write!(f, "unreachable"),
            FailureClass::Timeout => write!(f, "timeout"),
            FailureClass::RemoteOther => write!(f, "remote_error"),
            FailureClass::LocalIo => write!(f, "local_io_error"),
        }
    }
}

/// Error returned by every handler.
///
/// Renders as `{"error": <class>, "message": <fixed user message>}`; raw
/// internal error text is logged at the handler and never put in here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub class: FailureClass,
    pub message: &'static str,
}

impl ApiError {
    pub fn new(class: FailureClass, message: &'static str) -> Self {
        Self { class, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.class.status(),
            Json(serde_json::json!({
                "error": self.class.to_string(),
                "message": self.message
            })),
        )
            .into_response()
    }
}

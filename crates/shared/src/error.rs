use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    LoginRequired,
    LoginCancelled,
    CompanyNotFound,
    InvalidCompanyId,
    ServerError,
    NetworkError,
    DataFormatError,
    #[serde(other)]
    General,
}

/// Error body returned by the API for failed requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub status_code: Option<u16>,
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            code,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn login_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::LoginRequired, message)
    }

    /// Builds an error from a non-success HTTP response.
    ///
    /// A 401 is always treated as login required, whatever the body says.
    pub fn from_response(status_code: u16, body: &str) -> Self {
        if status_code == 401 {
            return Self::login_required("the API rejected the access token").with_status(401);
        }

        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self::new(parsed.code, parsed.message).with_status(status_code),
            Err(_) => {
                let code = if status_code >= 500 {
                    ErrorCode::ServerError
                } else {
                    ErrorCode::General
                };
                Self::new(code, format!("API request failed with status {status_code}"))
                    .with_status(status_code)
            }
        }
    }

    /// The only detail the load coordinator cares about.
    pub fn requires_login(&self) -> bool {
        self.code == ErrorCode::LoginRequired
    }

    /// Deep links can carry unknown or malformed company ids; these are not
    /// treated as application faults.
    pub fn is_expected_business_error(&self) -> bool {
        matches!(
            (self.status_code, self.code),
            (Some(404), ErrorCode::CompanyNotFound) | (Some(400), ErrorCode::InvalidCompanyId)
        )
    }
}

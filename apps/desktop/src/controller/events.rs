//! UI/backend events and error modeling for the desktop controller.

use client_core::{CoordinatorEvent, ScreenLoad};
use shared::error::{ApiError, ErrorCode};

#[derive(Debug, Clone)]
pub enum UiEvent {
    Info(String),
    Error(UiError),
    LoadStateChanged(bool),
    LoginRequired,
    ScreenLoaded(ScreenLoad),
    LoginSucceeded,
    LoginFailed(ApiError),
    LoggedOut,
}

impl From<CoordinatorEvent> for UiEvent {
    fn from(event: CoordinatorEvent) -> Self {
        match event {
            CoordinatorEvent::LoadStateChanged { loaded, .. } => UiEvent::LoadStateChanged(loaded),
            CoordinatorEvent::LoginRequired { .. } => UiEvent::LoginRequired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Auth,
    Transport,
    Server,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Login,
    Logout,
    LoadData,
    General,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_api(context: UiErrorContext, err: &ApiError) -> Self {
        let category = match err.code {
            ErrorCode::LoginRequired | ErrorCode::LoginCancelled => UiErrorCategory::Auth,
            ErrorCode::NetworkError => UiErrorCategory::Transport,
            ErrorCode::ServerError => UiErrorCategory::Server,
            ErrorCode::DataFormatError
            | ErrorCode::CompanyNotFound
            | ErrorCode::InvalidCompanyId => UiErrorCategory::Validation,
            ErrorCode::General => UiErrorCategory::Unknown,
        };
        let message = match err.status_code {
            Some(status) => format!("{} (status {status})", err.message),
            None => err.message.clone(),
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("401")
            || message_lower.contains("unauthorized")
            || message_lower.contains("login required")
            || message_lower.contains("invalid token")
        {
            UiErrorCategory::Auth
        } else if message_lower.contains("timeout")
            || message_lower.contains("connection")
            || message_lower.contains("network")
            || message_lower.contains("disconnect")
        {
            UiErrorCategory::Transport
        } else if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("malformed")
        {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == UiErrorCategory::Auth
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::RoundId;

    #[test]
    fn classifies_api_errors_by_code() {
        let err = UiError::from_api(
            UiErrorContext::LoadData,
            &ApiError::new(ErrorCode::NetworkError, "connection refused"),
        );
        assert_eq!(err.category(), UiErrorCategory::Transport);
        assert!(!err.requires_reauth());

        let err = UiError::from_api(
            UiErrorContext::LoadData,
            &ApiError::login_required("expired").with_status(401),
        );
        assert!(err.requires_reauth());
        assert_eq!(err.message(), "expired (status 401)");
    }

    #[test]
    fn classifies_command_processor_disconnect_as_transport_error() {
        let err = UiError::from_message(
            UiErrorContext::General,
            "Backend command processor disconnected (possible startup/runtime failure)",
        );
        assert_eq!(err.category(), UiErrorCategory::Transport);
    }

    #[test]
    fn coordinator_events_drop_their_round() {
        assert!(matches!(
            UiEvent::from(CoordinatorEvent::LoginRequired { round: RoundId(4) }),
            UiEvent::LoginRequired
        ));
        assert!(matches!(
            UiEvent::from(CoordinatorEvent::LoadStateChanged {
                round: RoundId(4),
                loaded: true
            }),
            UiEvent::LoadStateChanged(true)
        ));
    }
}

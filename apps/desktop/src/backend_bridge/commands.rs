//! Backend commands queued from UI to backend worker.

use client_core::{ApiRequestOptions, Route};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    LoadRoute {
        route: Route,
        options: ApiRequestOptions,
    },
    ExpireAccessToken,
    Login,
    Logout,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::LoadRoute { .. } => "load_route",
            BackendCommand::ExpireAccessToken => "expire_access_token",
            BackendCommand::Login => "login",
            BackendCommand::Logout => "logout",
        }
    }
}

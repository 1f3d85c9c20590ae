//! App model and the state transitions driven by UI events.
//!
//! `apply` never talks to channels; it returns the backend commands an event
//! leads to, which keeps every transition testable on its own.

use client_core::{ApiRequestOptions, Route, ScreenLoad};
use shared::error::ErrorCode;
use tracing::{error, info, warn};

use crate::{
    backend_bridge::commands::BackendCommand,
    controller::events::{UiError, UiErrorContext, UiEvent},
};

/// Re-authentication attempts allowed before a screen loads successfully.
const MAX_LOGINS_WITHOUT_DATA: u32 = 2;

/// What the shell does after its first load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionScript {
    pub cause_error_on_first_load: bool,
    pub expire_token_before_reload: bool,
    pub reloads: u32,
    pub logout_after_reloads: bool,
}

#[derive(Debug)]
pub struct AppModel {
    route: Route,
    is_data_loaded: bool,
    session_id: Option<String>,
    errors: Vec<UiError>,
    loads_in_flight: usize,
    login_in_flight: bool,
    logout_in_flight: bool,
    logins_without_data: u32,
    script: SessionScript,
    started: bool,
    halted: bool,
    last_load: Option<ScreenLoad>,
}

impl AppModel {
    pub fn new(route: Route, script: SessionScript) -> Self {
        Self {
            route,
            is_data_loaded: false,
            session_id: None,
            errors: Vec::new(),
            loads_in_flight: 0,
            login_in_flight: false,
            logout_in_flight: false,
            logins_without_data: 0,
            script,
            started: false,
            halted: false,
            last_load: None,
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// Session buttons are only enabled once every view has loaded.
    pub fn is_data_loaded(&self) -> bool {
        self.is_data_loaded
    }

    pub fn errors(&self) -> &[UiError] {
        &self.errors
    }

    pub fn last_load(&self) -> Option<&ScreenLoad> {
        self.last_load.as_ref()
    }

    pub fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn start(&mut self) -> Vec<BackendCommand> {
        self.started = true;
        let options = ApiRequestOptions {
            cause_error: self.script.cause_error_on_first_load,
        };
        vec![self.load_current_route(options)]
    }

    /// Stops the session, e.g. when the backend can no longer be reached.
    pub fn halt(&mut self, reason: UiError) {
        error!(reason = reason.message(), "stopping desktop session");
        self.errors.push(reason);
        self.halted = true;
    }

    pub fn is_finished(&self) -> bool {
        self.halted
            || (self.started
                && self.loads_in_flight == 0
                && !self.login_in_flight
                && !self.logout_in_flight
                && self.script.reloads == 0
                && !self.script.logout_after_reloads)
    }

    pub fn apply(&mut self, event: UiEvent) -> Vec<BackendCommand> {
        let mut commands = Vec::new();

        match event {
            UiEvent::Info(message) => info!("{message}"),
            UiEvent::Error(err) => {
                warn!(context = ?err.context(), "{}", err.message());
                match err.context() {
                    UiErrorContext::BackendStartup => self.halt(err),
                    UiErrorContext::Logout => {
                        self.logout_in_flight = false;
                        self.errors.push(err);
                    }
                    _ => self.errors.push(err),
                }
            }
            UiEvent::LoadStateChanged(loaded) => self.is_data_loaded = loaded,
            UiEvent::LoginRequired => {
                self.is_data_loaded = false;
                if self.login_in_flight {
                    return commands;
                }
                if self.logins_without_data >= MAX_LOGINS_WITHOUT_DATA {
                    self.errors.push(UiError::from_message(
                        UiErrorContext::Login,
                        "the API keeps rejecting new logins; sign in again later",
                    ));
                    self.route = Route::LoginRequired;
                } else {
                    self.login_in_flight = true;
                    self.logins_without_data += 1;
                    commands.push(BackendCommand::Login);
                }
            }
            UiEvent::ScreenLoaded(load) => {
                self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
                self.record_load_errors(&load);
                let redirect = load.redirect;
                self.last_load = Some(load);

                if let Some(route) = redirect {
                    self.route = route;
                    commands.push(self.load_current_route(ApiRequestOptions::default()));
                } else {
                    commands.extend(self.next_script_step());
                }
            }
            UiEvent::LoginSucceeded => {
                self.login_in_flight = false;
                if self.route == Route::LoginRequired {
                    self.route = Route::Home;
                }
                commands.push(self.load_current_route(ApiRequestOptions::default()));
            }
            UiEvent::LoginFailed(err) => {
                self.login_in_flight = false;
                if err.code == ErrorCode::LoginCancelled {
                    self.route = Route::LoginRequired;
                } else {
                    self.errors.push(UiError::from_api(UiErrorContext::Login, &err));
                }
                commands.extend(self.next_script_step());
            }
            UiEvent::LoggedOut => {
                self.logout_in_flight = false;
                self.route = Route::LoginRequired;
                self.is_data_loaded = false;
            }
        }

        commands
    }

    fn record_load_errors(&mut self, load: &ScreenLoad) {
        let errors = load.errors();
        if errors.is_empty() {
            self.logins_without_data = 0;
        }
        // Login prompts and deep-link redirects are handled without an error summary.
        for err in errors {
            if err.requires_login() || err.is_expected_business_error() {
                continue;
            }
            self.errors
                .push(UiError::from_api(UiErrorContext::LoadData, err));
        }
    }

    fn next_script_step(&mut self) -> Vec<BackendCommand> {
        if self.loads_in_flight > 0 || self.login_in_flight || self.logout_in_flight {
            return Vec::new();
        }
        if self.script.reloads == 0 {
            if !self.script.logout_after_reloads {
                return Vec::new();
            }
            self.script.logout_after_reloads = false;
            self.logout_in_flight = true;
            return vec![BackendCommand::Logout];
        }

        let mut commands = Vec::new();
        if self.script.expire_token_before_reload {
            self.script.expire_token_before_reload = false;
            commands.push(BackendCommand::ExpireAccessToken);
        }
        self.script.reloads -= 1;
        commands.push(self.load_current_route(ApiRequestOptions::default()));
        commands
    }

    fn load_current_route(&mut self, options: ApiRequestOptions) -> BackendCommand {
        self.loads_in_flight += 1;
        BackendCommand::LoadRoute {
            route: self.route,
            options,
        }
    }
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;

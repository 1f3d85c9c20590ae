//! Runtime bridge between UI command queue and backend event intake.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use client_core::{Authenticator, LoadObserver, ScreenController};
use crossbeam_channel::{Receiver, Sender};

use crate::{
    backend_bridge::commands::BackendCommand,
    controller::events::{UiError, UiErrorContext, UiEvent},
};

pub struct Backend {
    pub screen: Arc<ScreenController>,
    pub authenticator: Arc<dyn Authenticator>,
}

/// Forwards coordinator callbacks to the UI queue when they are delivered
/// inline on a backend thread.
pub struct UiForwarder {
    ui_tx: Sender<UiEvent>,
}

impl UiForwarder {
    pub fn new(ui_tx: Sender<UiEvent>) -> Self {
        Self { ui_tx }
    }

    fn forward(&self, event: UiEvent) {
        // Blocking send: coordinator events must not be dropped.
        if self.ui_tx.send(event).is_err() {
            tracing::warn!("UI event queue disconnected; coordinator event dropped");
        }
    }
}

impl LoadObserver for UiForwarder {
    fn on_load_state_changed(&self, loaded: bool) {
        self.forward(UiEvent::LoadStateChanged(loaded));
    }

    fn on_login_required(&self) {
        self.forward(UiEvent::LoginRequired);
    }
}

pub fn launch(
    backend: Backend,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("backend".into())
        .spawn(move || run_backend(backend, cmd_rx, ui_tx))
}

fn run_backend(backend: Backend, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                UiErrorContext::BackendStartup,
                format!("backend worker startup failure: failed to build runtime: {err}"),
            )));
            tracing::error!("failed to build backend runtime: {err}");
            return;
        }
    };

    runtime.block_on(async move {
        let _ = ui_tx.try_send(UiEvent::Info(format!(
            "Backend worker ready (API session {})",
            backend.screen.session_id()
        )));

        while let Ok(cmd) = cmd_rx.recv() {
            tracing::debug!(command = cmd.name(), "backend command received");
            match cmd {
                BackendCommand::LoadRoute { route, options } => {
                    let screen = backend.screen.clone();
                    let ui_tx = ui_tx.clone();
                    tokio::spawn(async move {
                        let event = match screen.load(route, options).await {
                            Ok(load) => UiEvent::ScreenLoaded(load),
                            Err(err) => UiEvent::Error(UiError::from_message(
                                UiErrorContext::LoadData,
                                err.to_string(),
                            )),
                        };
                        if ui_tx.send(event).is_err() {
                            tracing::warn!(?route, "UI event queue disconnected; screen load dropped");
                        }
                    });
                }
                BackendCommand::ExpireAccessToken => {
                    backend.authenticator.expire_access_token();
                    let _ = ui_tx.try_send(UiEvent::Info("Access token expired".to_string()));
                }
                BackendCommand::Login => {
                    let event = match backend.authenticator.login().await {
                        Ok(()) => UiEvent::LoginSucceeded,
                        Err(err) => UiEvent::LoginFailed(err),
                    };
                    let _ = ui_tx.send(event);
                }
                BackendCommand::Logout => {
                    let event = match backend.authenticator.logout().await {
                        Ok(()) => UiEvent::LoggedOut,
                        Err(err) => UiEvent::Error(UiError::from_api(UiErrorContext::Logout, &err)),
                    };
                    let _ = ui_tx.send(event);
                }
            }
        }

        tracing::info!("backend command queue closed; worker exiting");
    });
}

//! UI thread: drains backend and coordinator queues and applies them to the model.

use client_core::CoordinatorEvent;
use crossbeam_channel::{never, select, Receiver, Sender};

use crate::{
    backend_bridge::commands::BackendCommand,
    controller::{
        events::{UiError, UiErrorContext, UiEvent},
        orchestration::dispatch_backend_command,
        reducer::AppModel,
    },
    ui::render,
};

pub struct DesktopApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    coordinator_rx: Option<Receiver<CoordinatorEvent>>,
    model: AppModel,
    status: String,
}

impl DesktopApp {
    /// `coordinator_rx` is set when coordinator callbacks are marshaled to
    /// this thread rather than forwarded by the backend.
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        coordinator_rx: Option<Receiver<CoordinatorEvent>>,
        model: AppModel,
    ) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            coordinator_rx,
            model,
            status: String::new(),
        }
    }

    pub fn model(&self) -> &AppModel {
        &self.model
    }

    /// Runs until the session script has finished or the backend goes away.
    pub fn run(&mut self) -> &AppModel {
        let commands = self.model.start();
        self.dispatch(commands);

        let ui_rx = self.ui_rx.clone();
        let coordinator_rx = self.coordinator_rx.clone().unwrap_or_else(never);

        while !self.model.is_finished() {
            select! {
                recv(coordinator_rx) -> event => match event {
                    Ok(event) => self.handle(UiEvent::from(event)),
                    Err(_) => self.backend_lost(),
                },
                recv(ui_rx) -> event => match event {
                    Ok(event) => {
                        // Coordinator events are queued before the load that caused them
                        // reports back; apply them first.
                        self.drain_coordinator(&coordinator_rx);
                        self.handle(event);
                    }
                    Err(_) => self.backend_lost(),
                },
            }
        }

        &self.model
    }

    fn drain_coordinator(&mut self, coordinator_rx: &Receiver<CoordinatorEvent>) {
        while let Ok(event) = coordinator_rx.try_recv() {
            self.handle(UiEvent::from(event));
        }
    }

    fn handle(&mut self, event: UiEvent) {
        let rendered = match &event {
            UiEvent::ScreenLoaded(_) => None,
            UiEvent::Error(err) => Some(render::error_summary(err)),
            UiEvent::LoginRequired => Some("Login required; starting sign-in".to_string()),
            UiEvent::LoginSucceeded => Some("Signed in; reloading data".to_string()),
            _ => None,
        };
        let screen = match &event {
            UiEvent::ScreenLoaded(load) => Some(load.clone()),
            _ => None,
        };
        let errors_before = self.model.errors().len();

        let commands = self.model.apply(event);

        if let Some(line) = rendered {
            println!("{line}");
        }
        if let Some(load) = screen {
            for line in render::screen_lines(&load, self.model.is_data_loaded()) {
                println!("{line}");
            }
            for err in &self.model.errors()[errors_before..] {
                println!("{}", render::error_summary(err));
            }
        }

        self.dispatch(commands);
    }

    fn dispatch(&mut self, commands: Vec<BackendCommand>) {
        for cmd in commands {
            dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
            if !self.status.is_empty() {
                let status = std::mem::take(&mut self.status);
                self.model
                    .halt(UiError::from_message(UiErrorContext::General, status));
                return;
            }
        }
    }

    fn backend_lost(&mut self) {
        self.model.halt(UiError::from_message(
            UiErrorContext::General,
            "Backend worker disconnected",
        ));
    }
}

use std::{path::PathBuf, sync::Arc};

mod backend_bridge;
mod controller;
mod ui;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use client_core::{
    config::{load_settings, DEFAULT_CONFIG_FILE},
    ApiClient, Authenticator, DeliveryMode, HttpApiClient, InMemoryAuthenticator, LoadCoordinator,
    Route, ScreenController, SimulatedApiClient,
};
use crossbeam_channel::bounded;
use shared::domain::CompanyId;
use tracing_subscriber::EnvFilter;

use crate::{
    backend_bridge::{
        commands::BackendCommand,
        runtime::{self, Backend, UiForwarder},
    },
    controller::{
        events::UiEvent,
        reducer::{AppModel, SessionScript},
    },
    ui::DesktopApp,
};

const SIMULATED_TOKEN: &str = "simulated-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RouteArg {
    Home,
    Transactions,
    LoginRequired,
}

#[derive(Parser, Debug)]
#[command(about = "Investments desktop shell")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Serve fixture data in-process instead of calling the API.
    #[arg(long)]
    simulate: bool,
    #[arg(long, value_enum)]
    route: Option<RouteArg>,
    #[arg(long)]
    company_id: Option<i64>,
    /// Ask the API to fail the first load.
    #[arg(long)]
    cause_error: bool,
    /// Expire the access token before the first reload.
    #[arg(long)]
    expire_access_token: bool,
    #[arg(long, default_value_t = 0)]
    reloads: u32,
    /// Sign out once the last reload has finished.
    #[arg(long)]
    logout: bool,
}

fn resolve_route(route: Option<RouteArg>, company_id: Option<i64>) -> Result<Route> {
    match (route, company_id) {
        (None, None) | (Some(RouteArg::Home), None) => Ok(Route::Home),
        (None, Some(id)) | (Some(RouteArg::Transactions), Some(id)) => {
            Ok(Route::Transactions(CompanyId(id)))
        }
        (Some(RouteArg::Transactions), None) => bail!("--route transactions needs --company-id"),
        (Some(RouteArg::LoginRequired), None) => Ok(Route::LoginRequired),
        (Some(other), Some(_)) => bail!("--company-id only applies to the transactions route, not {other:?}"),
    }
}

/// `RUST_LOG` directives, falling back to `info` when unset or invalid.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(
            std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        ))
        .init();
    let args = Args::parse();

    let route = resolve_route(args.route, args.company_id)?;
    let settings = load_settings(&args.config)?;
    tracing::info!(
        config = %args.config.display(),
        simulate = args.simulate,
        delivery = ?settings.delivery,
        "starting desktop shell"
    );

    let token = match (&settings.access_token, args.simulate) {
        (Some(token), _) => Some(token.clone()),
        (None, true) => Some(SIMULATED_TOKEN.to_string()),
        (None, false) => None,
    };
    let authenticator: Arc<dyn Authenticator> = Arc::new(InMemoryAuthenticator::new(token.clone()));

    let api: Arc<dyn ApiClient> = if args.simulate {
        let accepted = token.unwrap_or_else(|| SIMULATED_TOKEN.to_string());
        Arc::new(
            SimulatedApiClient::new(authenticator.clone(), accepted)
                .with_latency(settings.simulated_latency()),
        )
    } else {
        Arc::new(HttpApiClient::new(
            &settings.api_base_url,
            settings.request_timeout(),
            authenticator.clone(),
        )?)
    };

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);

    let (coordinator, coordinator_rx) = match settings.delivery {
        DeliveryMode::Inline => (
            LoadCoordinator::inline(Arc::new(UiForwarder::new(ui_tx.clone()))),
            None,
        ),
        DeliveryMode::Marshaled => {
            let (coordinator, rx) = LoadCoordinator::marshaled();
            (coordinator, Some(rx))
        }
    };

    let screen = Arc::new(ScreenController::new(api, coordinator));
    let mut model = AppModel::new(
        route,
        SessionScript {
            cause_error_on_first_load: args.cause_error,
            expire_token_before_reload: args.expire_access_token,
            reloads: args.reloads,
            logout_after_reloads: args.logout,
        },
    );
    model.set_session_id(screen.session_id());

    let backend = runtime::launch(
        Backend {
            screen,
            authenticator,
        },
        cmd_rx,
        ui_tx,
    )
    .context("failed to spawn backend thread")?;

    let mut app = DesktopApp::new(cmd_tx, ui_rx, coordinator_rx, model);
    app.run();
    let model = app.model();
    let error_count = model.errors().len();
    tracing::info!(
        session_id = model.session_id().unwrap_or_default(),
        route = ?model.route(),
        last_route = ?model.last_load().map(|load| load.route),
        data_loaded = model.is_data_loaded(),
        "desktop session finished"
    );
    // Closing the command queue lets the backend loop exit.
    drop(app);

    backend
        .join()
        .map_err(|_| anyhow!("backend thread panicked"))?;

    if error_count > 0 {
        tracing::warn!(error_count, "desktop session finished with errors");
    }
    Ok(())
}

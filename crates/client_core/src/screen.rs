//! Composite screen: a main view plus the user-info title view, loaded
//! concurrently and aggregated through the screen's [`LoadCoordinator`].

use std::sync::Arc;

use shared::{
    domain::{Company, CompanyId, CompanyTransactions, UserInfo},
    error::ApiError,
};
use tracing::{info, warn};

use crate::{
    api_client::{ApiClient, ApiRequestOptions},
    load_coordinator::{CoordinatorError, LoadCoordinator, LoadTicket, RoundId},
};

/// Main view plus the title view's user info.
pub const VIEWS_PER_SCREEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Transactions(CompanyId),
    LoginRequired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MainView {
    Companies(Vec<Company>),
    Transactions(CompanyTransactions),
}

#[derive(Debug, Clone)]
pub struct ViewResults {
    pub round: RoundId,
    pub main: Result<MainView, ApiError>,
    pub user_info: Result<UserInfo, ApiError>,
}

#[derive(Debug, Clone)]
pub struct ScreenLoad {
    pub route: Route,
    /// `None` when the route shows no API data.
    pub views: Option<ViewResults>,
    /// Set when the main view asks to navigate elsewhere.
    pub redirect: Option<Route>,
}

impl ScreenLoad {
    pub fn errors(&self) -> Vec<&ApiError> {
        let Some(views) = &self.views else {
            return Vec::new();
        };
        [views.main.as_ref().err(), views.user_info.as_ref().err()]
            .into_iter()
            .flatten()
            .collect()
    }
}

pub struct ScreenController {
    api: Arc<dyn ApiClient>,
    coordinator: LoadCoordinator,
}

impl ScreenController {
    pub fn new(api: Arc<dyn ApiClient>, coordinator: LoadCoordinator) -> Self {
        Self { api, coordinator }
    }

    pub fn coordinator(&self) -> &LoadCoordinator {
        &self.coordinator
    }

    pub fn session_id(&self) -> &str {
        self.api.session_id()
    }

    /// Starts a new load round for `route` and waits for both views.
    pub async fn load(
        &self,
        route: Route,
        options: ApiRequestOptions,
    ) -> Result<ScreenLoad, CoordinatorError> {
        let main_request = match route {
            Route::Home => MainRequest::Companies,
            Route::Transactions(company_id) => MainRequest::Transactions(company_id),
            Route::LoginRequired => {
                return Ok(ScreenLoad {
                    route,
                    views: None,
                    redirect: None,
                })
            }
        };

        let round = self.coordinator.configure(VIEWS_PER_SCREEN)?;
        info!(?route, %round, "loading screen");

        let (main, user_info) = futures::join!(
            self.load_main(round, main_request, options),
            self.load_user_info(round, options)
        );

        let redirect = match &main {
            Err(err) if err.is_expected_business_error() => Some(Route::Home),
            _ => None,
        };

        Ok(ScreenLoad {
            route,
            views: Some(ViewResults {
                round,
                main,
                user_info,
            }),
            redirect,
        })
    }

    async fn load_main(
        &self,
        round: RoundId,
        request: MainRequest,
        options: ApiRequestOptions,
    ) -> Result<MainView, ApiError> {
        let ticket = self.coordinator.begin_load_in(round);
        let result = match request {
            MainRequest::Companies => self
                .api
                .get_companies(options)
                .await
                .map(MainView::Companies),
            MainRequest::Transactions(company_id) => self
                .api
                .get_company_transactions(company_id, options)
                .await
                .map(MainView::Transactions),
        };
        self.report(ticket, "main", &result);
        result
    }

    async fn load_user_info(
        &self,
        round: RoundId,
        options: ApiRequestOptions,
    ) -> Result<UserInfo, ApiError> {
        let ticket = self.coordinator.begin_load_in(round);
        let result = self.api.get_user_info(options).await;
        self.report(ticket, "user_info", &result);
        result
    }

    fn report<T>(&self, ticket: LoadTicket, view: &'static str, result: &Result<T, ApiError>) {
        match result {
            Ok(_) => {
                self.coordinator.report_success_for(ticket);
            }
            Err(err) => {
                if err.is_expected_business_error() {
                    info!(view, code = ?err.code, "view redirected after business error");
                } else {
                    warn!(view, code = ?err.code, message = %err.message, "view load failed");
                }
                self.coordinator
                    .report_failure_for(ticket, err.requires_login());
            }
        }
    }
}

enum MainRequest {
    Companies,
    Transactions(CompanyId),
}

#[cfg(test)]
#[path = "tests/screen_tests.rs"]
mod tests;

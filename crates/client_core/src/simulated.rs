//! In-process API used by the offline shell and by tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{Company, CompanyId, CompanyTransactions, Transaction, TransactionId, UserInfo},
    error::{ApiError, ErrorCode},
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    api_client::{ApiClient, ApiRequestOptions},
    auth::Authenticator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Companies,
    Transactions,
    UserInfo,
}

pub struct SimulatedApiClient {
    authenticator: Arc<dyn Authenticator>,
    accepted_token: String,
    latency: Duration,
    session_id: String,
    injected_failures: Mutex<HashMap<Endpoint, ApiError>>,
}

impl SimulatedApiClient {
    pub fn new(authenticator: Arc<dyn Authenticator>, accepted_token: impl Into<String>) -> Self {
        Self {
            authenticator,
            accepted_token: accepted_token.into(),
            latency: Duration::ZERO,
            session_id: Uuid::new_v4().to_string(),
            injected_failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every call to `endpoint` fails with `error` until cleared.
    pub fn fail_endpoint(&self, endpoint: Endpoint, error: ApiError) {
        self.failures().insert(endpoint, error);
    }

    pub fn clear_failures(&self) {
        self.failures().clear();
    }

    fn failures(&self) -> MutexGuard<'_, HashMap<Endpoint, ApiError>> {
        self.injected_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn call(&self, endpoint: Endpoint, options: ApiRequestOptions) -> Result<(), ApiError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        debug!(?endpoint, "simulated API call");

        match self.authenticator.access_token().await {
            Some(token) if token == self.accepted_token => {}
            Some(_) => {
                return Err(ApiError::login_required("the API rejected the access token")
                    .with_status(401))
            }
            None => return Err(ApiError::login_required("no access token is available")),
        }

        if let Some(err) = self.failures().get(&endpoint).cloned() {
            return Err(err);
        }
        if options.cause_error {
            return Err(
                ApiError::new(ErrorCode::ServerError, "simulated exception in the API")
                    .with_status(500),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ApiClient for SimulatedApiClient {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn get_companies(&self, options: ApiRequestOptions) -> Result<Vec<Company>, ApiError> {
        self.call(Endpoint::Companies, options).await?;
        Ok(companies())
    }

    async fn get_company_transactions(
        &self,
        company_id: CompanyId,
        options: ApiRequestOptions,
    ) -> Result<CompanyTransactions, ApiError> {
        self.call(Endpoint::Transactions, options).await?;

        if company_id.0 <= 0 {
            return Err(ApiError::new(
                ErrorCode::InvalidCompanyId,
                format!("the company id {company_id} is not a positive integer"),
            )
            .with_status(400));
        }

        // Company 3 exists but is not visible to the signed-in user.
        let company = companies()
            .into_iter()
            .find(|company| company.id == company_id && company_id.0 != 3)
            .ok_or_else(|| {
                ApiError::new(
                    ErrorCode::CompanyNotFound,
                    format!("company {company_id} was not found for this user"),
                )
                .with_status(404)
            })?;

        let transactions = (1..=3)
            .map(|n| Transaction {
                id: TransactionId(company_id.0 * 100 + n),
                investor_id: format!("{}", 170 + n),
                amount_usd: 10_000 * n,
            })
            .collect();

        Ok(CompanyTransactions {
            id: company_id,
            company,
            transactions,
        })
    }

    async fn get_user_info(&self, options: ApiRequestOptions) -> Result<UserInfo, ApiError> {
        self.call(Endpoint::UserInfo, options).await?;
        Ok(UserInfo {
            given_name: "Guest".into(),
            family_name: "User".into(),
        })
    }
}

fn companies() -> Vec<Company> {
    [
        (1, "Cool Company", "Asia", 800_000, 650_000, 45),
        (2, "Mega Health", "Europe", 1_200_000, 1_000_000, 65),
        (3, "Well Brewed", "USA", 650_000, 650_000, 25),
        (4, "Global Trading", "Asia", 1_300_000, 1_200_000, 60),
    ]
    .into_iter()
    .map(
        |(id, name, region, target_usd, investment_usd, no_investors)| Company {
            id: CompanyId(id),
            name: name.into(),
            region: region.into(),
            target_usd,
            investment_usd,
            no_investors,
        },
    )
    .collect()
}

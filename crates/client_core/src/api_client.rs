//! Data fetches behind the composite screen.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    domain::{Company, CompanyId, CompanyTransactions, UserInfo},
    error::{ApiError, ErrorCode},
};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::Authenticator;

pub const SESSION_ID_HEADER: &str = "x-mycompany-api-session-id";
pub const TEST_EXCEPTION_HEADER: &str = "x-mycompany-test-exception";
const TEST_EXCEPTION_API_NAME: &str = "SampleApi";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiRequestOptions {
    /// Asks the API to fail the request, for exercising error handling.
    pub cause_error: bool,
}

#[async_trait]
pub trait ApiClient: Send + Sync {
    fn session_id(&self) -> &str;

    async fn get_companies(&self, options: ApiRequestOptions) -> Result<Vec<Company>, ApiError>;

    async fn get_company_transactions(
        &self,
        company_id: CompanyId,
        options: ApiRequestOptions,
    ) -> Result<CompanyTransactions, ApiError>;

    async fn get_user_info(&self, options: ApiRequestOptions) -> Result<UserInfo, ApiError>;
}

pub struct HttpApiClient {
    http: Client,
    base_url: Url,
    authenticator: Arc<dyn Authenticator>,
    session_id: String,
}

impl HttpApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            authenticator,
            session_id: Uuid::new_v4().to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: ApiRequestOptions,
    ) -> Result<T, ApiError> {
        let Some(token) = self.authenticator.access_token().await else {
            return Err(ApiError::login_required("no access token is available"));
        };

        let url = self.base_url.join(path).map_err(|err| {
            ApiError::new(ErrorCode::General, format!("invalid API path '{path}': {err}"))
        })?;

        let mut request = self
            .http
            .get(url.clone())
            .bearer_auth(token)
            .header(SESSION_ID_HEADER, &self.session_id);
        if options.cause_error {
            request = request.header(TEST_EXCEPTION_HEADER, TEST_EXCEPTION_API_NAME);
        }

        debug!(%url, "calling API");
        let response = request.send().await.map_err(|err| {
            ApiError::new(
                ErrorCode::NetworkError,
                format!("failed to reach API at {url}: {err}"),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_response(status.as_u16(), &body);
            warn!(%url, status = status.as_u16(), code = ?err.code, "API request failed");
            return Err(err);
        }

        response.json::<T>().await.map_err(|err| {
            ApiError::new(
                ErrorCode::DataFormatError,
                format!("invalid response payload from {url}: {err}"),
            )
            .with_status(status.as_u16())
        })
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn get_companies(&self, options: ApiRequestOptions) -> Result<Vec<Company>, ApiError> {
        self.get_json("companies", options).await
    }

    async fn get_company_transactions(
        &self,
        company_id: CompanyId,
        options: ApiRequestOptions,
    ) -> Result<CompanyTransactions, ApiError> {
        self.get_json(&format!("companies/{company_id}/transactions"), options)
            .await
    }

    async fn get_user_info(&self, options: ApiRequestOptions) -> Result<UserInfo, ApiError> {
        self.get_json("userinfo", options).await
    }
}

/// `Url::join` drops the last path segment unless the base ends with '/'.
fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).with_context(|| format!("invalid API base url '{raw}'"))
}

#[cfg(test)]
#[path = "tests/api_client_tests.rs"]
mod tests;

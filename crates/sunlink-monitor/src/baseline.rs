// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of SunLink.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! REST client for the state a view starts from before live events arrive

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use sunlink_channel::CredentialProvider;
use sunlink_types::{AlertRecord, EnergyReading, OverviewSnapshot};

use crate::config::BaselineSettings;

#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type BaselineResult<T> = Result<T, BaselineError>;

/// Spring-style page wrapper
#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    content: Vec<T>,
}

#[derive(Clone)]
pub struct BaselineClient {
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl fmt::Debug for BaselineClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaselineClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl BaselineClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> BaselineResult<Self> {
        Self::with_timeout(base_url, credentials, Duration::from_secs(10))
    }

    fn with_timeout(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> BaselineResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BaselineError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            credentials,
            client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    pub fn from_settings(
        settings: &BaselineSettings,
        credentials: Arc<dyn CredentialProvider>,
    ) -> BaselineResult<Self> {
        Ok(
            Self::with_timeout(&settings.base_url, credentials, settings.timeout())?
                .with_retry_config(settings.max_retries, settings.retry_delay()),
        )
    }

    #[must_use]
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Current fleet overview
    pub async fn fetch_overview(&self) -> BaselineResult<OverviewSnapshot> {
        self.get_json("/monitoring/installations/overview", &[]).await
    }

    /// Latest tamper alerts, newest first
    pub async fn fetch_alerts(&self, limit: usize) -> BaselineResult<Vec<AlertRecord>> {
        let page: Page<AlertRecord> = self
            .get_json(
                "/api/security/admin/all-alerts",
                &[("size", limit.to_string()), ("sort", "timestamp,desc".to_owned())],
            )
            .await?;
        Ok(page.content)
    }

    /// Most recent readings of one installation
    pub async fn fetch_recent_readings(
        &self,
        installation_id: &str,
        limit: usize,
    ) -> BaselineResult<Vec<EnergyReading>> {
        let path = format!("/monitoring/readings/recent/{installation_id}");
        self.get_json(&path, &[("limit", limit.to_string())]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> BaselineResult<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "Fetching baseline");

        let response = self
            .retry_request(|| {
                let request = self.client.get(&url).query(query);
                let request = match self.credentials.token() {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                };
                request.send()
            })
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body = response.text().await?;
                Ok(serde_json::from_str(&body)?)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!(url = %url, "Baseline request rejected: authentication failed");
                Err(BaselineError::AuthenticationFailed)
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                error!(url = %url, status = %status, "Baseline request failed");
                Err(BaselineError::ApiError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Retry transport failures with exponential backoff
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> BaselineResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!(attempts, error = %e, "Baseline request failed");
                    return Err(BaselineError::Http(e));
                }
                Err(e) => {
                    warn!(
                        attempt = attempts,
                        max_retries = self.max_retries,
                        error = %e,
                        "Baseline request failed, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

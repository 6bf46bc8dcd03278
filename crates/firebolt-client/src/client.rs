//! Firebolt API client.
//!
//! The client owns the session (tokens plus the resolved account, engine and
//! engine endpoint). `login` has to succeed before anything else; every other
//! call sends the bearer token and relies on [`RetryTransport`] to refresh it
//! when the service answers 401.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{ClientOptions, LoginParams};
use crate::error::{Error, Result};
use crate::models::{
    AccountIdByNameResponse, EngineIdByNameResponse, EngineResponse, EngineStatus,
    EngineUrlByNameResponse, LoginRequest, LoginResponse, QueryResponse, RefreshTokenRequest,
};
use crate::normalize::normalize;
use crate::transport::{RetryTransport, TokenRefresher};

const LOGIN_PATH: &str = "/auth/v1/login";
const REFRESH_TOKEN_PATH: &str = "/auth/v1/refresh";
const ACCOUNT_ID_BY_NAME_PATH: &str = "/iam/v2/accounts:getIdByName";

/// State created by `login`; the access token is replaced on refresh.
#[derive(Debug, Default, Clone)]
struct Session {
    access_token: String,
    refresh_token: String,
    account_name: String,
    account_id: String,
    engine_name: String,
    engine_id: String,
    engine_endpoint: String,
}

enum Body {
    Empty,
    Json(Vec<u8>),
    Text(String),
}

/// Client for the Firebolt REST API and the per-engine query endpoint.
pub struct Client {
    transport: RetryTransport,
    base_url: String,
    database: String,
    engine_poll_interval: Duration,
    session: RwLock<Session>,
}

impl Client {
    /// Create a client with default options.
    pub fn new(database: impl Into<String>) -> Result<Self> {
        Self::with_options(database, ClientOptions::default())
    }

    pub fn with_options(database: impl Into<String>, options: ClientOptions) -> Result<Self> {
        Ok(Self {
            transport: RetryTransport::new(options.retry)?,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            database: database.into(),
            engine_poll_interval: options.engine_poll_interval,
            session: RwLock::new(Session::default()),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Current access token (empty before login).
    pub async fn access_token(&self) -> String {
        self.session.read().await.access_token.clone()
    }

    /// Resolved engine endpoint (empty before login).
    pub async fn engine_endpoint(&self) -> String {
        self.session.read().await.engine_endpoint.clone()
    }

    /// Log in and resolve the account id, the engine id and the engine endpoint.
    pub async fn login(&self, cancel: &CancellationToken, params: &LoginParams) -> Result<()> {
        let body = serde_json::to_vec(&LoginRequest {
            username: &params.email,
            password: &params.password,
        })?;
        let request = self
            .request(Method::POST, self.api_url(LOGIN_PATH, &[])?, Body::Json(body), false)
            .await?;

        let response: LoginResponse = match self.call(cancel, request, false).await {
            Err(Error::InvalidStatus { status, body })
                if matches!(status, 400 | 401 | 403) =>
            {
                return Err(Error::Auth { status, body });
            }
            other => other.map_err(|e| e.context("execute login request"))?,
        };
        if response.access_token.is_empty() {
            return Err(Error::Auth {
                status: 200,
                body: "login response carries no access token".to_string(),
            });
        }

        {
            let mut session = self.session.write().await;
            *session = Session {
                access_token: response.access_token,
                refresh_token: response.refresh_token,
                account_name: params.account_name.clone(),
                engine_name: params.engine_name.clone(),
                ..Session::default()
            };
        }

        let account_id = self
            .account_id_by_name(cancel, &params.account_name)
            .await
            .map_err(|e| e.context("get account id by name"))?;
        self.session.write().await.account_id = account_id.clone();

        let engine_id = self
            .engine_id_by_name(cancel, &account_id, &params.engine_name)
            .await
            .map_err(|e| e.context("get engine id by name"))?;
        self.session.write().await.engine_id = engine_id;

        let endpoint = self
            .engine_url_by_name(cancel, &account_id, &params.engine_name)
            .await
            .map_err(|e| e.context("get engine url by name"))?;
        self.session.write().await.engine_endpoint = endpoint;

        info!(
            account = %params.account_name,
            engine = %params.engine_name,
            "Logged in to Firebolt"
        );
        Ok(())
    }

    /// Ask the service to start the engine. Returns whether it is already running.
    pub async fn start_engine(&self, cancel: &CancellationToken) -> Result<bool> {
        let (account_id, engine_id) = self.engine_ids().await?;
        let url = self.api_url(
            &format!("/core/v1/accounts/{account_id}/engines/{engine_id}:start"),
            &[],
        )?;
        let request = self.request(Method::POST, url, Body::Empty, true).await?;

        let response: EngineResponse = self
            .call(cancel, request, true)
            .await
            .map_err(|e| e.context("execute start engine request"))?;

        debug!(engine_status = %response.engine.current_status, "Requested engine start");
        Ok(response.engine.current_status.is_running())
    }

    /// Current engine status.
    pub async fn engine_status(&self, cancel: &CancellationToken) -> Result<EngineStatus> {
        let (account_id, engine_id) = self.engine_ids().await?;
        let url = self.api_url(
            &format!("/core/v1/accounts/{account_id}/engines/{engine_id}"),
            &[],
        )?;
        let request = self.request(Method::GET, url, Body::Empty, true).await?;

        let response: EngineResponse = self
            .call(cancel, request, true)
            .await
            .map_err(|e| e.context("get engine by id"))?;

        Ok(response.engine.current_status)
    }

    /// Start the engine and block until it is running.
    ///
    /// Polls the engine status at a fixed interval. A terminated engine
    /// (for example one that was shutting down when the start request
    /// arrived) is started again. Returns [`Error::Cancelled`] as soon as
    /// `cancel` fires; callers bound the wait by cancelling or with a timeout.
    pub async fn wait_engine_started(&self, cancel: &CancellationToken) -> Result<()> {
        self.engine_ids().await?;

        if self.start_engine(cancel).await? {
            return Ok(());
        }

        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.engine_poll_interval,
            self.engine_poll_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = ticker.tick() => {}
            }

            let status = self
                .engine_status(cancel)
                .await
                .map_err(|e| e.context("get engine status"))?;
            debug!(engine_status = %status, "Checking Firebolt engine status");

            if status.is_running() {
                info!("Firebolt engine is running");
                return Ok(());
            }

            if status.is_terminated() {
                info!(engine_status = %status, "Firebolt engine is terminated, restarting it");
                if self
                    .start_engine(cancel)
                    .await
                    .map_err(|e| e.context("start engine"))?
                {
                    return Ok(());
                }
            }
        }
    }

    /// Start the engine and wait for it to run for at most `timeout`.
    pub async fn ensure_engine_running(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<()> {
        info!(timeout = ?timeout, "Waiting for Firebolt engine to start");
        match tokio::time::timeout(timeout, self.wait_engine_started(cancel)).await {
            Ok(result) => result.map_err(|e| e.context("wait engine started")),
            Err(_) => Err(Error::EngineStartTimeout(timeout)),
        }
    }

    /// Exchange the refresh token for a new access token.
    pub async fn refresh_token(&self, cancel: &CancellationToken) -> Result<()> {
        self.refresh(cancel).await.map(|_| ())
    }

    /// Run one SQL statement against the engine endpoint.
    pub async fn run_query(&self, cancel: &CancellationToken, query: &str) -> Result<QueryResponse> {
        let endpoint = self.session.read().await.engine_endpoint.clone();
        if endpoint.is_empty() {
            return Err(Error::NotLoggedIn);
        }

        let url = self.query_url(&endpoint)?;
        let request = self
            .request(Method::POST, url, Body::Text(query.to_string()), true)
            .await?;

        let mut response: QueryResponse = self
            .call(cancel, request, true)
            .await
            .map_err(|e| e.context("execute run query request"))?;

        normalize(&mut response).map_err(|e| e.context("prepare run query response data"))?;

        debug!(
            rows = response.rows,
            elapsed = response.statistics.elapsed,
            "Query executed"
        );
        Ok(response)
    }

    /// Release pooled connections. Safe to call more than once.
    pub async fn close(&self) {
        self.transport.close().await;
    }

    async fn account_id_by_name(&self, cancel: &CancellationToken, name: &str) -> Result<String> {
        let url = self.api_url(ACCOUNT_ID_BY_NAME_PATH, &[("account_name", name)])?;
        let request = self.request(Method::GET, url, Body::Empty, true).await?;
        let response: AccountIdByNameResponse = self.call(cancel, request, true).await?;

        non_empty(response.account_id, "account id", name)
    }

    async fn engine_id_by_name(
        &self,
        cancel: &CancellationToken,
        account_id: &str,
        name: &str,
    ) -> Result<String> {
        let url = self.api_url(
            &format!("/core/v1/accounts/{account_id}/engines:getIdByName"),
            &[("engine_name", name)],
        )?;
        let request = self.request(Method::GET, url, Body::Empty, true).await?;
        let response: EngineIdByNameResponse = self.call(cancel, request, true).await?;

        non_empty(response.engine_id.engine_id, "engine id", name)
    }

    async fn engine_url_by_name(
        &self,
        cancel: &CancellationToken,
        account_id: &str,
        name: &str,
    ) -> Result<String> {
        let url = self.api_url(
            &format!("/core/v1/accounts/{account_id}/engines"),
            &[("filter.name_contains", name)],
        )?;
        let request = self.request(Method::GET, url, Body::Empty, true).await?;
        let response: EngineUrlByNameResponse = self.call(cancel, request, true).await?;

        let endpoint = response
            .edges
            .into_iter()
            .next()
            .map(|edge| edge.node.endpoint)
            .unwrap_or_default();
        non_empty(endpoint, "engine url", name)
    }

    async fn engine_ids(&self) -> Result<(String, String)> {
        let session = self.session.read().await;
        if session.account_id.is_empty() || session.engine_id.is_empty() {
            return Err(Error::NotLoggedIn);
        }
        Ok((session.account_id.clone(), session.engine_id.clone()))
    }

    fn api_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}{}", self.base_url, path);
        let mut url = parse_url(&raw)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// The engine endpoint is reported without a scheme; HTTPS is implied.
    fn query_url(&self, endpoint: &str) -> Result<Url> {
        let base = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", endpoint.trim_end_matches('/'))
        };
        let mut url = parse_url(&format!("{base}/"))?;
        url.query_pairs_mut().append_pair("database", &self.database);
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        body: Body,
        authorized: bool,
    ) -> Result<reqwest::Request> {
        let mut request = reqwest::Request::new(method, url);

        match body {
            Body::Empty => {}
            Body::Json(bytes) => {
                request.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/json;charset=UTF-8"),
                );
                *request.body_mut() = Some(bytes.into());
            }
            Body::Text(text) => {
                *request.body_mut() = Some(text.into());
            }
        }

        if authorized {
            let token = self.session.read().await.access_token.clone();
            if !token.is_empty() {
                request
                    .headers_mut()
                    .insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
            }
        }

        Ok(request)
    }

    /// Send a request and decode the JSON body. An empty body decodes to `T::default()`.
    async fn call<T: DeserializeOwned + Default>(
        &self,
        cancel: &CancellationToken,
        request: reqwest::Request,
        refresh_on_401: bool,
    ) -> Result<T> {
        let refresher: Option<&dyn TokenRefresher> = if refresh_on_401 { Some(self) } else { None };
        let response = self.transport.send(cancel, request, refresher).await?;
        let status = response.status();

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            body = response.bytes() => body?,
        };

        if !status.is_success() {
            return Err(Error::InvalidStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) || status == StatusCode::NO_CONTENT {
            return Ok(T::default());
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl TokenRefresher for Client {
    async fn refresh(&self, cancel: &CancellationToken) -> Result<String> {
        let refresh_token = self.session.read().await.refresh_token.clone();
        let body = serde_json::to_vec(&RefreshTokenRequest {
            refresh_token: &refresh_token,
        })?;
        let request = self
            .request(Method::POST, self.api_url(REFRESH_TOKEN_PATH, &[])?, Body::Json(body), false)
            .await?;

        let response: LoginResponse = self
            .call(cancel, request, false)
            .await
            .map_err(|e| e.context("execute refresh token request"))?;

        let mut session = self.session.write().await;
        session.access_token = response.access_token.clone();
        if !response.refresh_token.is_empty() {
            session.refresh_token = response.refresh_token;
        }
        debug!("Refreshed Firebolt access token");

        Ok(response.access_token)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

fn non_empty(value: String, what: &'static str, name: &str) -> Result<String> {
    if value.is_empty() {
        return Err(Error::Resolution {
            what,
            name: name.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_url_adds_scheme_and_database() {
        let client = Client::new("my_db").unwrap();

        let url = client.query_url("engine.firebolt.io").unwrap();
        assert_eq!(url.as_str(), "https://engine.firebolt.io/?database=my_db");

        let url = client.query_url("http://127.0.0.1:8080/").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/?database=my_db");
    }

    #[test]
    fn test_api_url_encodes_query() {
        let client = Client::new("db").unwrap();
        let url = client
            .api_url(ACCOUNT_ID_BY_NAME_PATH, &[("account_name", "my account")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.app.firebolt.io/iam/v2/accounts:getIdByName?account_name=my+account"
        );
    }

    #[tokio::test]
    async fn test_operations_require_login() {
        let client = Client::new("db").unwrap();
        let cancel = CancellationToken::new();

        assert!(matches!(
            client.start_engine(&cancel).await,
            Err(Error::NotLoggedIn)
        ));
        assert!(matches!(
            client.engine_status(&cancel).await,
            Err(Error::NotLoggedIn)
        ));
        assert!(matches!(
            client.wait_engine_started(&cancel).await,
            Err(Error::NotLoggedIn)
        ));
        assert!(matches!(
            client.run_query(&cancel, "SELECT 1").await,
            Err(Error::NotLoggedIn)
        ));
    }
}

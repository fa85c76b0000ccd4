use crate::{events::Stream, Error, Result};
use bourse_types::api::{
    ErrorBody, Home, InfoQuery, LeaderboardView, LoginRequest, LoginResponse, MarketUpdate,
    MyStocks, Outcome, Portfolio, Quotes, SearchQuery, SearchResults, SignupRequest, StockInfo,
    TradeRequest,
};
use reqwest::Client as HttpClient;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tracing::{debug, info};
use url::Url;

/// Timeout for connections and requests
const TIMEOUT: Duration = Duration::from_secs(30);

/// Retry policy for transient HTTP failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request (including the first attempt).
    pub max_attempts: usize,
    /// Initial backoff delay after the first retryable failure.
    pub initial_backoff: Duration,
    /// Maximum backoff delay between attempts.
    pub max_backoff: Duration,
    /// Whether non-idempotent requests (e.g., POST) may be retried.
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            retry_non_idempotent: false,
        }
    }
}

/// Bourse API client
///
/// Holds at most one session: [Client::login] stores the returned token and
/// every authenticated call sends it as a bearer token.
#[derive(Clone)]
pub struct Client {
    pub base_url: Url,
    pub ws_url: Url,
    pub http_client: HttpClient,

    token: Option<String>,
    retry_policy: RetryPolicy,
}

impl Client {
    /// Create a new client
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;

        // Convert http(s) to ws(s) for WebSocket URL
        let ws_scheme = match base_url.scheme() {
            "http" => "ws",
            "https" => "wss",
            scheme => {
                return Err(Error::InvalidScheme(scheme.to_string()));
            }
        };

        let mut ws_url = base_url.clone();
        ws_url
            .set_scheme(ws_scheme)
            .map_err(|_| Error::InvalidScheme(ws_scheme.to_string()))?;

        let http_client = HttpClient::builder()
            .timeout(TIMEOUT)
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url,
            ws_url,
            http_client,
            token: None,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Returns a copy of the current retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Sets the retry policy for subsequent HTTP requests.
    pub fn set_retry_policy(&mut self, retry_policy: RetryPolicy) {
        self.retry_policy = retry_policy;
    }

    /// Returns a new client with the provided retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// The session token, if logged in.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn session(&self) -> Result<&str> {
        self.token().ok_or(Error::NotLoggedIn)
    }

    async fn send_with_retry(
        &self,
        method: reqwest::Method,
        make_request: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let max_attempts =
            if method == reqwest::Method::GET || self.retry_policy.retry_non_idempotent {
                self.retry_policy.max_attempts.max(1)
            } else {
                1
            };

        let mut attempt = 0usize;
        let mut backoff = self.retry_policy.initial_backoff;
        loop {
            attempt += 1;
            let result = make_request().send().await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) || attempt >= max_attempts {
                        return Ok(response);
                    }
                }
                Err(err) => {
                    if attempt >= max_attempts || !is_retryable_error(&err) {
                        return Err(Error::Reqwest(err));
                    }
                }
            }

            if backoff > Duration::ZERO {
                sleep(backoff).await;
                backoff = std::cmp::min(backoff.saturating_mul(2), self.retry_policy.max_backoff);
            }
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&(impl Serialize + ?Sized)>,
        token: Option<&str>,
    ) -> Result<T> {
        let url = self.base_url.join(path)?;
        debug!("GET {}", url);
        let response = self
            .send_with_retry(reqwest::Method::GET, || {
                let mut request = self.http_client.get(url.clone());
                if let Some(query) = query {
                    request = request.query(query);
                }
                if let Some(token) = token {
                    request = request.bearer_auth(token);
                }
                request
            })
            .await?;
        parse(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&(impl Serialize + ?Sized)>,
        token: Option<&str>,
    ) -> Result<T> {
        let url = self.base_url.join(path)?;
        debug!("POST {}", url);
        let response = self
            .send_with_retry(reqwest::Method::POST, || {
                let mut request = self.http_client.post(url.clone());
                if let Some(body) = body {
                    request = request.json(body);
                }
                if let Some(token) = token {
                    request = request.bearer_auth(token);
                }
                request
            })
            .await?;
        parse(response).await
    }

    /// Create an account. Does not log in.
    pub async fn signup(&self, username: &str, password: &str) -> Result<Portfolio> {
        let request = SignupRequest {
            username: username.to_string(),
            password: password.to_string(),
            confirm_password: password.to_string(),
        };
        self.post("signup", Some(&request), None).await
    }

    /// Log in and keep the session token for later calls.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<LoginResponse> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self.post("login", Some(&request), None).await?;
        self.token = Some(response.token.clone());
        Ok(response)
    }

    pub async fn logout(&mut self) -> Result<()> {
        let token = self.session()?.to_string();
        let url = self.base_url.join("logout")?;
        let response = self
            .send_with_retry(reqwest::Method::POST, || {
                self.http_client.post(url.clone()).bearer_auth(&token)
            })
            .await?;
        if !response.status().is_success() {
            return Err(Error::Failed(response.status()));
        }
        self.token = None;
        Ok(())
    }

    pub async fn home(&self) -> Result<Home> {
        self.get("home", None::<&()>, Some(self.session()?)).await
    }

    pub async fn my_stocks(&self) -> Result<MyStocks> {
        self.get("mystocks", None::<&()>, Some(self.session()?))
            .await
    }

    pub async fn search(&self, query: &str) -> Result<SearchResults> {
        let query = SearchQuery {
            q: query.to_string(),
        };
        self.get("search", Some(&query), Some(self.session()?))
            .await
    }

    pub async fn leaderboard(&self) -> Result<LeaderboardView> {
        self.get("leaderboard", None::<&()>, Some(self.session()?))
            .await
    }

    /// Price history of `user`'s stock, or `None` if there is no such user.
    pub async fn info(&self, user: &str) -> Result<Option<StockInfo>> {
        let query = InfoQuery {
            user: user.to_string(),
        };
        match self.get("info", Some(&query), None).await {
            Ok(info) => Ok(Some(info)),
            Err(Error::Api { status, .. }) if status == reqwest::StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Current stock value of every user.
    pub async fn quotes(&self) -> Result<Quotes> {
        self.get("stock_api", None::<&()>, None).await
    }

    pub async fn buy(&self, user: &str, amount: u64) -> Result<Outcome> {
        self.trade("buy", user, amount).await
    }

    pub async fn sell(&self, user: &str, amount: u64) -> Result<Outcome> {
        self.trade("sell", user, amount).await
    }

    async fn trade(&self, path: &str, user: &str, amount: u64) -> Result<Outcome> {
        let request = TradeRequest {
            user: user.to_string(),
            amount,
        };
        self.post(path, Some(&request), Some(self.session()?)).await
    }

    pub async fn claim(&self) -> Result<Outcome> {
        self.post("claim", None::<&()>, Some(self.session()?)).await
    }

    pub async fn refresh(&self) -> Result<Outcome> {
        self.post("refresh", None::<&()>, Some(self.session()?))
            .await
    }

    /// Connect to the ticker of trades and price changes
    pub async fn connect_ticker(&self) -> Result<Stream<MarketUpdate>> {
        self.connect_ticker_with_capacity(0).await
    }

    /// Connect to the ticker with a configurable channel capacity.
    ///
    /// A `channel_capacity` of `0` uses the default capacity.
    pub async fn connect_ticker_with_capacity(
        &self,
        channel_capacity: usize,
    ) -> Result<Stream<MarketUpdate>> {
        let ws_url = self.ws_url.join("ticker")?;
        info!("Connecting to WebSocket at {}", ws_url);

        let (ws_stream, _) = timeout(TIMEOUT, connect_async(ws_url.as_str()))
            .await
            .map_err(|_| Error::DialTimeout)??;
        info!("WebSocket connected");

        Ok(Stream::new_with_capacity(ws_stream, channel_capacity))
    }
}

async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    match response.json::<ErrorBody>().await {
        Ok(body) => Err(Error::Api {
            status,
            message: body.message,
            code: body.code,
        }),
        Err(_) => Err(Error::Failed(status)),
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    use reqwest::StatusCode;
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

use crate::{
    config::RateLimit,
    sessions::{expired_cookie, session_cookie, token_from_headers, Session},
    Error, Market,
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        rejection::{JsonRejection, QueryRejection},
        ConnectInfo, Query, State as AxumState,
    },
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bourse_execution::queries;
use bourse_types::{
    api::{
        Home, InfoQuery, LeaderboardView, LoginRequest, LoginResponse, MyStocks, Outcome,
        Portfolio, Quotes, SearchQuery, SearchResults, SignupRequest, StockInfo, TradeRequest,
    },
    market::{DAILY_REWARD, LEADERBOARD_SIZE},
    Instruction,
};
use futures::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::broadcast;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

const METRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

pub struct Api {
    market: Arc<Market>,
    rate_limit: Option<RateLimit>,
}

impl Api {
    pub fn new(market: Arc<Market>) -> Self {
        Self {
            market,
            rate_limit: None,
        }
    }

    /// Limits requests per client IP (honouring `X-Forwarded-For`).
    pub fn with_rate_limit(mut self, rate_limit: Option<RateLimit>) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn router(&self) -> Router {
        // Configure CORS
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

        let mut router = Router::new()
            .route("/signup", post(signup))
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/home", get(home))
            .route("/mystocks", get(mystocks))
            .route("/search", get(search))
            .route("/leaderboard", get(leaderboard))
            .route("/info", get(info))
            .route("/buy", post(buy))
            .route("/sell", post(sell))
            .route("/claim", post(claim))
            .route("/refresh", post(refresh))
            .route("/stock_api", get(stock_api))
            .route("/ticker", get(ticker_ws))
            .route("/metrics", get(metrics))
            .fallback(not_found)
            .layer(cors);

        // Configure Rate Limiting
        if let Some(limit) = self.rate_limit {
            match GovernorConfigBuilder::default()
                .per_second(limit.per_second)
                .burst_size(limit.burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
            {
                Some(config) => {
                    router = router.layer(GovernorLayer {
                        config: Arc::new(config),
                    });
                }
                None => tracing::warn!(?limit, "Invalid rate limit, serving without one"),
            }
        }

        router.with_state(self.market.clone())
    }
}

/// Which flash message an action writes to.
#[derive(Clone, Copy)]
enum Flash {
    Home,
    Stocks,
}

fn authenticate(market: &Market, headers: &HeaderMap) -> Result<(Uuid, Session), Error> {
    let token = token_from_headers(headers).ok_or(Error::Unauthorized)?;
    let session = market.sessions().get(&token).ok_or(Error::Unauthorized)?;
    Ok((token, session))
}

async fn portfolio(market: &Market, username: &str) -> Result<Portfolio, Error> {
    let ledger = market.ledger().await;
    let portfolio = queries::portfolio(ledger.store(), username).await;
    portfolio.ok_or(Error::Unauthorized)
}

/// Best guess at the client address for logging.
fn client_ip(headers: &HeaderMap, connect_info: Option<ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    forwarded
        .or_else(real_ip)
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

async fn signup(
    AxumState(market): AxumState<Arc<Market>>,
    request: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Portfolio>), Error> {
    let Json(request) = request?;
    let instruction = Instruction::SignUp {
        password: request.password,
        confirm_password: request.confirm_password,
    };
    let events = market.submit(&request.username, &instruction).await;
    if let Some((code, message)) = events.iter().find_map(|e| e.rejection()) {
        return Err(Error::Rejected {
            code,
            message: message.to_string(),
        });
    }
    let portfolio = portfolio(&market, &request.username).await?;
    Ok((StatusCode::CREATED, Json(portfolio)))
}

async fn login(
    AxumState(market): AxumState<Arc<Market>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    request: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(request) = request?;
    let token = match market.login(&request.username, &request.password).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!("{}: *{}", client_ip(&headers, connect_info), e);
            return Err(e.into());
        }
    };
    let cookie = session_cookie(&token, market.sessions().ttl());
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            username: request.username,
            token: token.to_string(),
        }),
    ))
}

async fn logout(
    AxumState(market): AxumState<Arc<Market>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Error> {
    let (token, _) = authenticate(&market, &headers)?;
    market.sessions().remove(&token);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, expired_cookie())]))
}

async fn home(
    AxumState(market): AxumState<Arc<Market>>,
    headers: HeaderMap,
) -> Result<Json<Home>, Error> {
    let (token, session) = authenticate(&market, &headers)?;
    market
        .sessions()
        .update(&token, |s| s.stocks_message = None);

    let portfolio = portfolio(&market, &session.username).await?;
    let featured = {
        let ledger = market.ledger().await;
        queries::featured(ledger.store(), &session.username).await
    };
    Ok(Json(Home {
        portfolio,
        featured,
        message: session.home_message,
    }))
}

async fn mystocks(
    AxumState(market): AxumState<Arc<Market>>,
    headers: HeaderMap,
) -> Result<Json<MyStocks>, Error> {
    let (token, session) = authenticate(&market, &headers)?;
    market.sessions().update(&token, |s| s.home_message = None);

    let portfolio = portfolio(&market, &session.username).await?;
    Ok(Json(MyStocks {
        portfolio,
        message: session.stocks_message,
    }))
}

async fn search(
    AxumState(market): AxumState<Arc<Market>>,
    headers: HeaderMap,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResults>, Error> {
    authenticate(&market, &headers)?;
    let Query(query) = query?;
    let results = {
        let ledger = market.ledger().await;
        queries::search(ledger.store(), &query.q).await
    };
    Ok(Json(SearchResults {
        query: query.q,
        results,
    }))
}

async fn leaderboard(
    AxumState(market): AxumState<Arc<Market>>,
    headers: HeaderMap,
) -> Result<Json<LeaderboardView>, Error> {
    let (_, session) = authenticate(&market, &headers)?;
    let board = {
        let ledger = market.ledger().await;
        queries::leaderboard(ledger.store()).await
    };
    let standing = board
        .standing(&session.username)
        .ok_or(Error::Unauthorized)?;
    Ok(Json(LeaderboardView {
        rank: standing.rank,
        net_worth: standing.net_worth,
        top: board.top(LEADERBOARD_SIZE).to_vec(),
    }))
}

async fn info(
    AxumState(market): AxumState<Arc<Market>>,
    query: Result<Query<InfoQuery>, QueryRejection>,
) -> Result<Json<StockInfo>, Error> {
    let Query(query) = query?;
    let ledger = market.ledger().await;
    let info = queries::stock_info(ledger.store(), &query.user).await;
    info.map(Json).ok_or(Error::UnknownUser)
}

async fn act(
    market: &Market,
    headers: &HeaderMap,
    instruction: Instruction,
    flash: Flash,
) -> Result<Json<Outcome>, Error> {
    let (token, session) = authenticate(market, headers)?;
    let events = market.submit(&session.username, &instruction).await;

    let rejection = events
        .iter()
        .find_map(|e| e.rejection())
        .map(|(code, message)| (code, message.to_string()));
    let (code, message) = match rejection {
        Some((code, message)) => (Some(code), Some(message)),
        None if instruction == Instruction::Claim => (
            None,
            Some(format!("Daily claimed!\nYou received {DAILY_REWARD} coins")),
        ),
        None => (None, None),
    };
    market.sessions().update(&token, |s| match flash {
        Flash::Home => s.home_message = message.clone(),
        Flash::Stocks => s.stocks_message = message.clone(),
    });

    let portfolio = portfolio(market, &session.username).await?;
    Ok(Json(Outcome {
        message,
        code,
        portfolio,
    }))
}

async fn buy(
    AxumState(market): AxumState<Arc<Market>>,
    headers: HeaderMap,
    request: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Json<Outcome>, Error> {
    let Json(request) = request?;
    let instruction = Instruction::Buy {
        owner: request.user,
        amount: request.amount,
    };
    act(&market, &headers, instruction, Flash::Home).await
}

async fn sell(
    AxumState(market): AxumState<Arc<Market>>,
    headers: HeaderMap,
    request: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Json<Outcome>, Error> {
    let Json(request) = request?;
    let instruction = Instruction::Sell {
        owner: request.user,
        amount: request.amount,
    };
    act(&market, &headers, instruction, Flash::Stocks).await
}

async fn claim(
    AxumState(market): AxumState<Arc<Market>>,
    headers: HeaderMap,
) -> Result<Json<Outcome>, Error> {
    act(&market, &headers, Instruction::Claim, Flash::Home).await
}

async fn refresh(
    AxumState(market): AxumState<Arc<Market>>,
    headers: HeaderMap,
) -> Result<Json<Outcome>, Error> {
    act(&market, &headers, Instruction::Refresh, Flash::Home).await
}

async fn stock_api(AxumState(market): AxumState<Arc<Market>>) -> Json<Quotes> {
    let ledger = market.ledger().await;
    let quotes = queries::quotes(ledger.store()).await;
    Json(quotes)
}

async fn metrics(AxumState(market): AxumState<Arc<Market>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        market.metrics().encode(),
    )
}

async fn not_found() -> Error {
    Error::NotFound
}

async fn ticker_ws(
    AxumState(market): AxumState<Arc<Market>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ticker_ws(socket, market))
}

async fn handle_ticker_ws(socket: WebSocket, market: Arc<Market>) {
    tracing::debug!("Ticker WebSocket connected");
    let (mut sender, mut receiver) = socket.split();
    let mut updates = market.subscribe();

    loop {
        tokio::select! {
            // Handle incoming WebSocket messages (ping/pong/close)
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) => {
                        tracing::debug!("Client closed ticker WebSocket connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            tracing::warn!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Ticker WebSocket error: {:?}", e);
                        break;
                    }
                    None => {
                        tracing::debug!("Ticker WebSocket stream ended");
                        break;
                    }
                    _ => {}
                }
            }
            // Handle broadcast updates
            update = updates.recv() => {
                match update {
                    Ok(update) => {
                        let text = match serde_json::to_string(&update) {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::error!("Failed to encode ticker update: {}", e);
                                continue;
                            }
                        };
                        tracing::debug!("Sending ticker update");
                        if sender.send(Message::Text(text)).await.is_err() {
                            tracing::warn!("Failed to send ticker update, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Ticker client lagged behind, skipped {} updates", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Ticker broadcast channel closed");
                        break;
                    }
                }
            }
        }
    }
    tracing::debug!("Ticker WebSocket handler exiting");
    let _ = sender.close().await;
}

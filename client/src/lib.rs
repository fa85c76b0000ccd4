pub mod client;
pub mod events;

pub use client::Client;
pub use client::RetryPolicy;
pub use events::Stream;
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed: {0}")]
    Failed(reqwest::StatusCode),
    #[error("{status}: {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
        code: Option<u8>,
    },
    #[error("not logged in")]
    NotLoggedIn,
    #[error("invalid data: {0}")]
    InvalidData(#[from] serde_json::Error),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("dial timeout")]
    DialTimeout,
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_execution::Memory;
    use bourse_server::{clock::ManualClock, store::Store, Api, Market};
    use bourse_types::{
        api::MarketUpdate,
        market::{ERROR_INSUFFICIENT_SUPPLY, INITIAL_COINS, INITIAL_STOCK_SUPPLY},
    };
    use axum::{http::StatusCode, routing::get, Json, Router};
    use std::{
        net::SocketAddr,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };
    use tokio::time::{sleep, Duration};

    const PASSWORD: &str = "hunter22";
    const START: u64 = 1_700_000_000;

    struct TestContext {
        clock: Arc<ManualClock>,
        base_url: String,
        server_handle: tokio::task::JoinHandle<()>,
    }

    impl TestContext {
        async fn new() -> Self {
            let clock = Arc::new(ManualClock::new(START));
            let market = Arc::new(Market::new(
                Store::Memory(Memory::default()),
                0,
                clock.clone(),
                Duration::from_secs(3_600),
            ));
            let api = Api::new(market);

            // Start server on random port
            let addr = SocketAddr::from(([127, 0, 0, 1], 0));
            let router = api.router();
            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            let actual_addr = listener.local_addr().unwrap();
            let base_url = format!("http://{actual_addr}");

            let server_handle = tokio::spawn(async move {
                axum::serve(
                    listener,
                    router.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .await
                .unwrap();
            });

            // Give server time to start
            sleep(Duration::from_millis(100)).await;

            Self {
                clock,
                base_url,
                server_handle,
            }
        }

        fn create_client(&self) -> Client {
            Client::new(&self.base_url).unwrap()
        }

        async fn player(&self, username: &str) -> Client {
            let mut client = self.create_client();
            client.signup(username, PASSWORD).await.unwrap();
            client.login(username, PASSWORD).await.unwrap();
            client
        }
    }

    impl Drop for TestContext {
        fn drop(&mut self) {
            self.server_handle.abort();
        }
    }

    #[tokio::test]
    async fn test_client_signup_and_login() {
        let ctx = TestContext::new().await;
        let mut client = ctx.create_client();

        let portfolio = client.signup("alice", PASSWORD).await.unwrap();
        assert_eq!(portfolio.coins, INITIAL_COINS);
        assert!(client.token().is_none());

        // Wrong password
        let err = client.login("alice", "wrong-password").await.unwrap_err();
        match err {
            Error::Api {
                status, message, ..
            } => {
                assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
                assert_eq!(message, "Incorrect password");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Calls needing a session fail locally before login
        assert!(matches!(client.home().await, Err(Error::NotLoggedIn)));

        let response = client.login("alice", PASSWORD).await.unwrap();
        assert_eq!(response.username, "alice");
        assert_eq!(client.token(), Some(response.token.as_str()));
        let home = client.home().await.unwrap();
        assert_eq!(home.portfolio.username, "alice");

        client.logout().await.unwrap();
        assert!(client.token().is_none());
        assert!(matches!(client.home().await, Err(Error::NotLoggedIn)));
    }

    #[tokio::test]
    async fn test_client_trading() {
        let ctx = TestContext::new().await;
        let alice = ctx.player("alice").await;
        let bob = ctx.player("bob").await;
        let carol = ctx.player("carol").await;

        let outcome = alice.buy("bob", 30).await.unwrap();
        assert_eq!(outcome.code, None);
        assert_eq!(outcome.portfolio.coins, INITIAL_COINS - 300);

        // carol takes all but 5 of bob's remaining 70 shares
        let outcome = carol.buy("bob", 65).await.unwrap();
        assert_eq!(outcome.code, None);

        // alice can afford 6 more shares but only 5 are left
        let outcome = alice.buy("bob", 6).await.unwrap();
        assert_eq!(outcome.code, Some(ERROR_INSUFFICIENT_SUPPLY));
        assert_eq!(outcome.message.as_deref(), Some("bob stock not enough..."));
        assert_eq!(outcome.portfolio.coins, INITIAL_COINS - 300);
        let home = alice.home().await.unwrap();
        assert_eq!(home.message, outcome.message);

        let outcome = alice.sell("bob", 10).await.unwrap();
        assert_eq!(outcome.code, None);
        let stocks = alice.my_stocks().await.unwrap();
        assert_eq!(stocks.portfolio.holdings[0].amount, 20);

        let info = bob.info("bob").await.unwrap().unwrap();
        assert_eq!(info.stock_left, INITIAL_STOCK_SUPPLY - 20 - 65);
        assert!(bob.info("nobody").await.unwrap().is_none());

        let outcome = bob.claim().await.unwrap();
        assert_eq!(outcome.portfolio.coins, INITIAL_COINS + 100);
        let board = bob.leaderboard().await.unwrap();
        assert_eq!(board.rank, 1);

        let quotes = bob.quotes().await.unwrap();
        assert_eq!(quotes.get("bob"), Some(&11));

        let results = bob.search("al").await.unwrap();
        assert_eq!(results.results, vec!["alice"]);
    }

    #[tokio::test]
    async fn test_client_refresh_cooldown() {
        let ctx = TestContext::new().await;
        let alice = ctx.player("alice").await;
        ctx.player("bob").await;

        let outcome = alice.refresh().await.unwrap();
        assert_eq!(outcome.code, None);
        let home = alice.home().await.unwrap();
        assert_eq!(home.featured.len(), 1);

        let outcome = alice.refresh().await.unwrap();
        assert_eq!(
            outcome.message.as_deref(),
            Some("You still need to wait for 10 seconds to refresh")
        );

        ctx.clock.advance(11);
        let outcome = alice.refresh().await.unwrap();
        assert_eq!(outcome.code, None);
    }

    #[tokio::test]
    async fn test_client_ticker_stream() {
        let ctx = TestContext::new().await;
        let alice = ctx.player("alice").await;
        ctx.player("bob").await;

        let mut stream = alice.connect_ticker_with_capacity(8).await.unwrap();

        // Give the server time to subscribe
        sleep(Duration::from_millis(100)).await;

        alice.buy("bob", 2).await.unwrap();
        let update = stream.next().await.unwrap().unwrap();
        assert_eq!(
            update,
            MarketUpdate::Trade {
                trader: "alice".to_string(),
                owner: "bob".to_string(),
                amount: 2,
                price: 20,
                buy: true,
            }
        );

        ctx.player("carol").await;
        let update = stream.next().await.unwrap().unwrap();
        assert!(matches!(update, MarketUpdate::Listed { username, .. } if username == "carol"));
    }

    /// Serves `/stock_api`, failing the first `failures` requests with a 503.
    async fn flaky_server(failures: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/stock_api",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < failures {
                        Err(StatusCode::SERVICE_UNAVAILABLE)
                    } else {
                        Ok(Json(serde_json::json!({ "bob": 11 })))
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (base_url, hits)
    }

    #[tokio::test]
    async fn test_client_retries_unavailable() {
        let (base_url, hits) = flaky_server(2).await;
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(10),
            retry_non_idempotent: false,
        };
        let client = Client::new(&base_url).unwrap().with_retry_policy(policy);
        assert_eq!(client.retry_policy(), policy);

        let quotes = client.quotes().await.unwrap();
        assert_eq!(quotes.get("bob"), Some(&11));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_gives_up_after_max_attempts() {
        let (base_url, hits) = flaky_server(usize::MAX).await;
        let mut client = Client::new(&base_url).unwrap();

        // Default policy makes a single attempt
        assert_eq!(client.retry_policy(), RetryPolicy::default());
        let err = client.quotes().await.unwrap_err();
        assert!(
            matches!(err, Error::Failed(status) if status == reqwest::StatusCode::SERVICE_UNAVAILABLE)
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        client.set_retry_policy(RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::ZERO,
            ..RetryPolicy::default()
        });
        let err = client.quotes().await.unwrap_err();
        assert!(
            matches!(err, Error::Failed(status) if status == reqwest::StatusCode::SERVICE_UNAVAILABLE)
        );
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_client_invalid_scheme() {
        let result = Client::new("ftp://example.com");
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(matches!(err, Error::InvalidScheme(_)));
            assert_eq!(
                err.to_string(),
                "invalid URL scheme: ftp (expected http or https)"
            );
        }

        assert!(Client::new("http://localhost:8080").is_ok());
        assert!(Client::new("https://localhost:8080").is_ok());
    }
}

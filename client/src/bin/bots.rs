//! Bot traders - simulates many concurrent players against a running server
//!
//! Usage:
//!   cargo run --release --bin bots -- [OPTIONS]
//!
//! Options:
//!   -u, --url            Server URL (default: http://localhost:8080)
//!   -n, --num-bots       Number of bots to spawn (default: 50)
//!   -d, --duration       Duration in seconds (default: 60)
//!   -r, --rate           Actions per second per bot (default: 2.0)
//!   -p, --password       Password shared by every bot
//!   -a, --attempts       Attempts per read request (default: 3)

use bourse_client::{Client, Error, RetryPolicy};
use clap::Parser;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::time;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bot traders for bourse")]
struct Args {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "50")]
    num_bots: usize,

    #[arg(short, long, default_value = "60")]
    duration: u64,

    #[arg(short, long, default_value = "2.0")]
    rate: f64,

    #[arg(short, long, default_value = "bot-password")]
    password: String,

    #[arg(short, long, default_value = "3")]
    attempts: usize,
}

/// Global metrics
#[derive(Default)]
struct Metrics {
    submitted: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    total_latency_ms: AtomicU64,
}

impl Metrics {
    fn record(&self, result: &Result<Option<u8>, Error>, latency_ms: u64) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(None) => self.accepted.fetch_add(1, Ordering::Relaxed),
            Ok(Some(_)) => self.rejected.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        self.total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
    }
}

/// Signs up (or reuses) a bot account and logs in.
async fn enroll(
    url: &str,
    name: &str,
    password: &str,
    retry_policy: RetryPolicy,
) -> Result<Client, Error> {
    let mut client = Client::new(url)?.with_retry_policy(retry_policy);
    match client.signup(name, password).await {
        Ok(_) => {}
        Err(Error::Api { message, .. }) if message == "Username already exists" => {}
        Err(e) => return Err(e),
    }
    client.login(name, password).await?;
    Ok(client)
}

/// Picks and submits one action, returning the rejection code if any.
async fn act(client: &Client, rng: &mut StdRng) -> Result<Option<u8>, Error> {
    let outcome = match rng.gen_range(0..10u8) {
        0 => client.claim().await?,
        1 => client.refresh().await?,
        2..=4 => {
            let stocks = client.my_stocks().await?;
            let Some(holding) = stocks.portfolio.holdings.choose(rng) else {
                return Ok(None);
            };
            let amount = rng.gen_range(1..=holding.amount);
            client.sell(&holding.name, amount).await?
        }
        _ => {
            let home = client.home().await?;
            let Some(quote) = home.featured.choose(rng) else {
                return client.refresh().await.map(|o| o.code);
            };
            let amount = rng.gen_range(1..=5);
            client.buy(&quote.username, amount).await?
        }
    };
    Ok(outcome.code)
}

/// Run a single bot
async fn run_bot(
    client: Client,
    duration: Duration,
    rate_limit_per_sec: f64,
    metrics: Arc<Metrics>,
) {
    let mut rng = StdRng::from_entropy();

    let start_time = Instant::now();
    let interval_duration = Duration::from_secs_f64(1.0 / rate_limit_per_sec);
    let mut interval = time::interval(interval_duration);
    // Tick once immediately to start
    interval.tick().await;

    while start_time.elapsed() < duration {
        interval.tick().await;

        let start = Instant::now();
        let result = act(&client, &mut rng).await;
        if let Err(e) = &result {
            warn!("Action failed: {}", e);
        }
        metrics.record(&result, start.elapsed().as_millis() as u64);
    }
}

/// Logs the most valuable stocks every few seconds
async fn monitor(client: Client, duration: Duration) {
    let start_time = Instant::now();
    info!("Starting market monitor...");

    while start_time.elapsed() < duration {
        time::sleep(Duration::from_secs(5)).await;
        log_top_quotes(&client).await;
    }
}

async fn log_top_quotes(client: &Client) {
    match client.quotes().await {
        Ok(quotes) => {
            let mut quotes: Vec<_> = quotes.into_iter().collect();
            quotes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            info!("Market ({} stocks):", quotes.len());
            for (i, (name, value)) in quotes.iter().take(5).enumerate() {
                info!("  #{}: {} - {} coins", i + 1, name, value);
            }
        }
        Err(e) => error!("Failed to query quotes: {}", e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();
    anyhow::ensure!(args.rate > 0.0, "rate must be positive");

    // Setup logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting {} bots against {}", args.num_bots, args.url);
    info!(
        "Duration: {} seconds, Rate: {} actions/sec/bot",
        args.duration, args.rate
    );

    // Enroll bots
    let retry_policy = RetryPolicy {
        max_attempts: args.attempts,
        ..RetryPolicy::default()
    };
    let mut clients = Vec::with_capacity(args.num_bots);
    for i in 0..args.num_bots {
        let name = format!("bot_{i:04}");
        clients.push(enroll(&args.url, &name, &args.password, retry_policy).await?);
    }
    let mut observer = Client::new(&args.url)?;
    observer.set_retry_policy(retry_policy);

    let metrics = Arc::new(Metrics::default());
    let start_time = Instant::now();
    let duration = Duration::from_secs(args.duration);

    // Spawn monitor task
    let monitor_handle = tokio::spawn(monitor(observer.clone(), duration));

    // Spawn bot tasks
    let mut handles = Vec::new();
    for client in clients {
        let metrics = Arc::clone(&metrics);
        handles.push(tokio::spawn(run_bot(client, duration, args.rate, metrics)));
    }

    // Wait for all bots to complete
    for handle in handles {
        let _ = handle.await;
    }
    let _ = monitor_handle.await;

    // Print results
    let elapsed = start_time.elapsed();
    let submitted = metrics.submitted.load(Ordering::Relaxed);
    let accepted = metrics.accepted.load(Ordering::Relaxed);
    let rejected = metrics.rejected.load(Ordering::Relaxed);
    let failed = metrics.failed.load(Ordering::Relaxed);
    let total_latency = metrics.total_latency_ms.load(Ordering::Relaxed);

    let rps = if elapsed.as_secs() > 0 {
        submitted as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    let avg_latency = if submitted > 0 {
        total_latency as f64 / submitted as f64
    } else {
        0.0
    };

    info!("=== BOT RESULTS ===");
    info!("Duration: {:.2}s", elapsed.as_secs_f64());
    info!(
        "Actions: {} submitted, {} accepted, {} rejected, {} failed",
        submitted, accepted, rejected, failed
    );
    info!("Actions/sec: {:.2}", rps);
    info!("Average Latency: {:.2}ms", avg_latency);

    info!("Final market:");
    log_top_quotes(&observer).await;

    Ok(())
}

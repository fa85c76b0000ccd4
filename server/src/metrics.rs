use bourse_types::Event;
use prometheus_client::{
    encoding::text::encode,
    metrics::counter::Counter,
    registry::Registry,
};
use std::sync::atomic::AtomicU64;

type U64Counter = Counter<u64, AtomicU64>;

/// Counters for market activity, exposed on `/metrics`.
pub struct Metrics {
    registry: Registry,

    pub signups: U64Counter,
    pub logins: U64Counter,
    pub failed_logins: U64Counter,
    pub buys: U64Counter,
    pub sells: U64Counter,
    pub claims: U64Counter,
    pub refreshes: U64Counter,
    pub rejections: U64Counter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("bourse");
        let signups = U64Counter::default();
        let logins = U64Counter::default();
        let failed_logins = U64Counter::default();
        let buys = U64Counter::default();
        let sells = U64Counter::default();
        let claims = U64Counter::default();
        let refreshes = U64Counter::default();
        let rejections = U64Counter::default();
        registry.register("signups", "Accounts created", signups.clone());
        registry.register("logins", "Successful logins", logins.clone());
        registry.register("failed_logins", "Refused logins", failed_logins.clone());
        registry.register("buys", "Executed purchases", buys.clone());
        registry.register("sells", "Executed sales", sells.clone());
        registry.register("claims", "Daily rewards claimed", claims.clone());
        registry.register("refreshes", "Featured stock refreshes", refreshes.clone());
        registry.register("rejections", "Rejected instructions", rejections.clone());

        Self {
            registry,
            signups,
            logins,
            failed_logins,
            buys,
            sells,
            claims,
            refreshes,
            rejections,
        }
    }

    pub fn observe(&self, event: &Event) {
        let counter = match event {
            Event::SignedUp { .. } => &self.signups,
            Event::Bought { .. } => &self.buys,
            Event::Sold { .. } => &self.sells,
            Event::Claimed { .. } => &self.claims,
            Event::Refreshed { .. } => &self.refreshes,
            Event::Rejected { .. } => &self.rejections,
            Event::Repriced { .. } => return,
        };
        counter.inc();
    }

    /// Prometheus text exposition of every counter.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            tracing::warn!("Failed to encode metrics: {:?}", e);
        }
        buffer
    }
}

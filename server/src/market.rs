use crate::{clock::Clock, metrics::Metrics, sessions::Sessions, store::Store};
use bourse_execution::{execute, queries, LoginError};
use bourse_types::{
    api::MarketUpdate,
    market::{stock_value_for, INITIAL_COINS},
    Event, Instruction,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

const UPDATES_CAPACITY: usize = 1024;

/// The store plus the count of instructions executed against it.
pub struct Ledger {
    store: Store,
    sequence: u64,
}

impl Ledger {
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Shared server state.
///
/// Every instruction runs while holding the ledger lock, so the read, check
/// and write of one request never interleave with another's.
pub struct Market {
    ledger: Mutex<Ledger>,
    sessions: Sessions,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    updates: broadcast::Sender<MarketUpdate>,
}

impl Market {
    pub fn new(store: Store, sequence: u64, clock: Arc<dyn Clock>, session_ttl: Duration) -> Self {
        let (updates, _) = broadcast::channel(UPDATES_CAPACITY);
        Self {
            ledger: Mutex::new(Ledger { store, sequence }),
            sessions: Sessions::new(session_ttl),
            clock,
            metrics: Metrics::new(),
            updates,
        }
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketUpdate> {
        self.updates.subscribe()
    }

    /// Locks the ledger for reading.
    pub async fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().await
    }

    /// Executes `instruction` on behalf of `username`.
    pub async fn submit(&self, username: &str, instruction: &Instruction) -> Vec<Event> {
        let events = {
            let mut ledger = self.ledger.lock().await;
            ledger.sequence += 1;
            let sequence = ledger.sequence;
            let seed: u64 = rand::random();
            execute(
                &mut ledger.store,
                self.now(),
                seed,
                sequence,
                username,
                instruction,
            )
            .await
        };

        for event in &events {
            self.metrics.observe(event);
            self.publish(event);
        }
        events
    }

    /// Verifies credentials and opens a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Uuid, LoginError> {
        let verified = {
            let ledger = self.ledger.lock().await;
            queries::verify_login(&ledger.store, username, password).await
        };
        if let Err(e) = verified {
            self.metrics.failed_logins.inc();
            return Err(e);
        }
        self.metrics.logins.inc();
        info!(username, "logged in");
        Ok(self.sessions.create(username))
    }

    fn publish(&self, event: &Event) {
        let update = match event {
            Event::SignedUp { username } => {
                info!(%username, "signed up");
                MarketUpdate::Listed {
                    username: username.clone(),
                    stock_value: stock_value_for(INITIAL_COINS),
                }
            }
            Event::Bought {
                buyer,
                owner,
                amount,
                cost,
            } => {
                info!(%buyer, %owner, amount, cost, "bought stock");
                MarketUpdate::Trade {
                    trader: buyer.clone(),
                    owner: owner.clone(),
                    amount: *amount,
                    price: *cost,
                    buy: true,
                }
            }
            Event::Sold {
                seller,
                owner,
                amount,
                earned,
            } => {
                info!(%seller, %owner, amount, earned, "sold stock");
                MarketUpdate::Trade {
                    trader: seller.clone(),
                    owner: owner.clone(),
                    amount: *amount,
                    price: *earned,
                    buy: false,
                }
            }
            Event::Repriced {
                username,
                stock_value,
            } => MarketUpdate::Price {
                username: username.clone(),
                stock_value: *stock_value,
            },
            Event::Claimed { username, amount } => {
                info!(%username, amount, "claimed daily reward");
                return;
            }
            Event::Refreshed { username, .. } => {
                debug!(%username, "refreshed featured stocks");
                return;
            }
            Event::Rejected {
                username,
                code,
                message,
            } => {
                info!(%username, code, reason = %message, "instruction rejected");
                return;
            }
        };
        if self.updates.send(update).is_err() {
            debug!("No ticker subscribers");
        }
    }
}

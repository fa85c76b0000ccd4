use bourse_types::{
    market::{stock_value_for, Account},
    Event, Instruction, Key, Value,
};
use rand::{rngs::StdRng, SeedableRng};
use std::collections::BTreeMap;

use crate::state::{load_account, State, Status};

mod handlers;

pub use handlers::format_wait;

/// Stages the writes of one instruction on top of a [State].
///
/// Nothing reaches the underlying state until the caller applies the
/// changes returned by [Layer::commit].
pub struct Layer<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,

    now: u64,
    rng: StdRng,
}

impl<'a, S: State> Layer<'a, S> {
    pub fn new(state: &'a S, now: u64, seed: u64) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),

            now,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn insert(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    pub async fn apply(&mut self, username: &str, instruction: &Instruction) -> Vec<Event> {
        match instruction {
            Instruction::SignUp {
                password,
                confirm_password,
            } => {
                self.handle_signup(username, password, confirm_password)
                    .await
            }
            Instruction::Buy { owner, amount } => {
                self.handle_buy(username, owner, *amount).await
            }
            Instruction::Sell { owner, amount } => {
                self.handle_sell(username, owner, *amount).await
            }
            Instruction::Claim => self.handle_claim(username).await,
            Instruction::Refresh => self.handle_refresh(username).await,
        }
    }

    pub fn commit(self) -> Vec<(Key, Status)> {
        self.pending.into_iter().collect()
    }

    fn reject(username: &str, code: u8, message: impl Into<String>) -> Vec<Event> {
        vec![Event::Rejected {
            username: username.to_string(),
            code,
            message: message.into(),
        }]
    }

    /// Stages `account`, repricing its stock from the resulting net worth.
    ///
    /// Holdings are valued at each owner's stored price; holders of this
    /// account's stock pick up the new price the next time they change.
    async fn store_account(&mut self, mut account: Account) -> Option<Event> {
        let mut net_worth = account.coins;
        for holding in &account.stocks {
            let value = match load_account(&*self, &holding.name).await {
                Some(owner) => owner.stock_value,
                None => 0,
            };
            net_worth = net_worth.saturating_add(holding.amount.saturating_mul(value));
        }

        let repriced = account
            .record_price(self.now, stock_value_for(net_worth))
            .then(|| Event::Repriced {
                username: account.username.clone(),
                stock_value: account.stock_value,
            });
        self.insert(
            Key::Account(account.username.clone()),
            Value::Account(account),
        );
        repriced
    }
}

impl<'a, S: State> State for Layer<'a, S> {
    async fn get(&self, key: &Key) -> Option<Value> {
        match self.pending.get(key) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key).await,
        }
    }

    async fn insert(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    async fn delete(&mut self, key: &Key) {
        self.pending.insert(key.clone(), Status::Delete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{seeded_memory, TEST_NOW, TEST_PASSWORD};
    use crate::state::{load_directory, Memory};
    use bourse_types::market::{
        ERROR_ACCOUNT_EXISTS, ERROR_COOLDOWN, ERROR_INSUFFICIENT_FUNDS,
        ERROR_INSUFFICIENT_HOLDINGS, ERROR_INSUFFICIENT_SUPPLY, ERROR_INVALID_AMOUNT,
        ERROR_INVALID_PASSWORD, ERROR_INVALID_USERNAME, ERROR_PASSWORD_MISMATCH,
        ERROR_MARKET_FULL, ERROR_SELF_TRADE, ERROR_TOO_MANY_HOLDINGS, DAILY_REWARD,
        FEATURED_STOCKS, INITIAL_COINS, INITIAL_STOCK_SUPPLY, MAX_ACCOUNTS, MAX_HOLDINGS,
    };
    use bourse_types::market::{Directory, Holding};
    use commonware_runtime::deterministic::Runner;
    use commonware_runtime::Runner as _;

    fn buy(owner: &str, amount: u64) -> Instruction {
        Instruction::Buy {
            owner: owner.to_string(),
            amount,
        }
    }

    fn sell(owner: &str, amount: u64) -> Instruction {
        Instruction::Sell {
            owner: owner.to_string(),
            amount,
        }
    }

    fn signup(password: &str, confirm: &str) -> Instruction {
        Instruction::SignUp {
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    fn rejection_code(events: &[Event]) -> Option<u8> {
        events.iter().find_map(|e| e.rejection().map(|(code, _)| code))
    }

    #[test]
    fn test_signup() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = Memory::default();
            let mut layer = Layer::new(&state, TEST_NOW, 1);

            let events = layer
                .apply("alice", &signup(TEST_PASSWORD, TEST_PASSWORD))
                .await;
            assert_eq!(
                events,
                vec![Event::SignedUp {
                    username: "alice".to_string()
                }]
            );

            let account = load_account(&layer, "alice").await.unwrap();
            assert_eq!(account.coins, INITIAL_COINS);
            assert_eq!(account.stock_left, INITIAL_STOCK_SUPPLY);
            assert_eq!(account.created_at, TEST_NOW);
            assert!(crate::password::verify(&account.credential, TEST_PASSWORD));
            assert!(load_directory(&layer).await.contains("alice"));

            // Taken usernames are refused
            let events = layer
                .apply("alice", &signup(TEST_PASSWORD, TEST_PASSWORD))
                .await;
            assert_eq!(rejection_code(&events), Some(ERROR_ACCOUNT_EXISTS));

            let changes = layer.commit();
            assert_eq!(changes.len(), 2);
        });
    }

    #[test]
    fn test_signup_validation() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = Memory::default();
            let mut layer = Layer::new(&state, TEST_NOW, 1);

            let events = layer
                .apply("a b", &signup(TEST_PASSWORD, TEST_PASSWORD))
                .await;
            assert_eq!(rejection_code(&events), Some(ERROR_INVALID_USERNAME));

            let events = layer.apply("alice", &signup("short", "short")).await;
            assert_eq!(rejection_code(&events), Some(ERROR_INVALID_PASSWORD));

            let events = layer
                .apply("alice", &signup(TEST_PASSWORD, "something-else"))
                .await;
            assert_eq!(rejection_code(&events), Some(ERROR_PASSWORD_MISMATCH));

            // Rejections stage nothing
            assert!(layer.commit().is_empty());
        });
    }

    #[test]
    fn test_buy() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = seeded_memory(&["alice", "bob"]).await;
            let mut layer = Layer::new(&state, TEST_NOW, 1);

            let events = layer.apply("alice", &buy("bob", 5)).await;
            assert_eq!(
                events,
                vec![Event::Bought {
                    buyer: "alice".to_string(),
                    owner: "bob".to_string(),
                    amount: 5,
                    cost: 50,
                }]
            );

            let alice = load_account(&layer, "alice").await.unwrap();
            let bob = load_account(&layer, "bob").await.unwrap();
            assert_eq!(alice.coins, INITIAL_COINS - 50);
            assert_eq!(alice.holding("bob"), 5);
            assert_eq!(bob.stock_left, INITIAL_STOCK_SUPPLY - 5);
            assert_eq!(bob.coins, INITIAL_COINS);

            // Net worth is unchanged, so the price holds
            assert_eq!(alice.stock_value, 10);
        });
    }

    #[test]
    fn test_buy_rejections() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = seeded_memory(&["alice", "bob"]).await;
            let mut layer = Layer::new(&state, TEST_NOW, 1);

            let events = layer.apply("alice", &buy("bob", 0)).await;
            assert_eq!(rejection_code(&events), Some(ERROR_INVALID_AMOUNT));

            let events = layer.apply("alice", &buy("alice", 1)).await;
            assert_eq!(rejection_code(&events), Some(ERROR_SELF_TRADE));

            // 101 shares at 10 coins cost more than 1000 coins
            let events = layer.apply("alice", &buy("bob", 101)).await;
            assert_eq!(
                events[0].rejection(),
                Some((ERROR_INSUFFICIENT_FUNDS, "Not enough coins"))
            );

            assert!(layer.commit().is_empty());
        });
    }

    #[test]
    fn test_buy_exhausts_supply() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = seeded_memory(&["alice", "bob", "carol"]).await;
            let mut layer = Layer::new(&state, TEST_NOW, 1);

            // Alice and bob each buy 50 of carol's 100 shares
            assert!(rejection_code(&layer.apply("alice", &buy("carol", 50)).await).is_none());
            assert!(rejection_code(&layer.apply("bob", &buy("carol", 50)).await).is_none());

            let events = layer.apply("alice", &buy("carol", 1)).await;
            assert_eq!(
                events[0].rejection(),
                Some((ERROR_INSUFFICIENT_SUPPLY, "carol stock not enough..."))
            );
            assert_eq!(load_account(&layer, "carol").await.unwrap().stock_left, 0);
        });
    }

    #[test]
    fn test_buy_holdings_cap() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let mut state = seeded_memory(&["alice", "bob"]).await;
            let mut alice = load_account(&state, "alice").await.unwrap();
            alice.stocks = (0..MAX_HOLDINGS)
                .map(|i| Holding {
                    name: format!("h{i}"),
                    amount: 1,
                })
                .collect();
            state
                .insert(Key::Account("alice".to_string()), Value::Account(alice.clone()))
                .await;

            // A new distinct holding would not fit
            {
                let mut layer = Layer::new(&state, TEST_NOW, 1);
                let events = layer.apply("alice", &buy("bob", 1)).await;
                assert_eq!(rejection_code(&events), Some(ERROR_TOO_MANY_HOLDINGS));
                assert!(layer.commit().is_empty());
            }

            // Adding to an existing holding still works at the cap
            alice.stocks[0].name = "bob".to_string();
            state
                .insert(Key::Account("alice".to_string()), Value::Account(alice))
                .await;
            let mut layer = Layer::new(&state, TEST_NOW, 1);
            let events = layer.apply("alice", &buy("bob", 1)).await;
            assert_eq!(rejection_code(&events), None);
            let alice = load_account(&layer, "alice").await.unwrap();
            assert_eq!(alice.stocks.len(), MAX_HOLDINGS);
            assert_eq!(alice.holding("bob"), 2);
        });
    }

    #[test]
    fn test_signup_market_full() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let mut state = Memory::default();
            let directory = Directory {
                usernames: (0..MAX_ACCOUNTS).map(|i| format!("u{i}")).collect(),
            };
            state
                .insert(Key::Directory, Value::Directory(directory))
                .await;

            let mut layer = Layer::new(&state, TEST_NOW, 1);
            let events = layer
                .apply("alice", &signup(TEST_PASSWORD, TEST_PASSWORD))
                .await;
            assert_eq!(rejection_code(&events), Some(ERROR_MARKET_FULL));
            assert!(layer.commit().is_empty());
        });
    }

    #[test]
    fn test_sell() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = seeded_memory(&["alice", "bob"]).await;
            let mut layer = Layer::new(&state, TEST_NOW, 1);
            layer.apply("alice", &buy("bob", 5)).await;

            let events = layer.apply("alice", &sell("bob", 6)).await;
            assert_eq!(
                events[0].rejection(),
                Some((ERROR_INSUFFICIENT_HOLDINGS, "You don't have so much stocks!"))
            );

            let events = layer.apply("alice", &sell("bob", 5)).await;
            assert_eq!(
                events,
                vec![Event::Sold {
                    seller: "alice".to_string(),
                    owner: "bob".to_string(),
                    amount: 5,
                    earned: 50,
                }]
            );
            let alice = load_account(&layer, "alice").await.unwrap();
            assert_eq!(alice.coins, INITIAL_COINS);
            assert!(alice.stocks.is_empty());
            assert_eq!(
                load_account(&layer, "bob").await.unwrap().stock_left,
                INITIAL_STOCK_SUPPLY
            );

            let events = layer.apply("alice", &sell("bob", 1)).await;
            assert_eq!(rejection_code(&events), Some(ERROR_INSUFFICIENT_HOLDINGS));
        });
    }

    #[test]
    fn test_claim() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = seeded_memory(&["alice"]).await;
            let mut layer = Layer::new(&state, TEST_NOW, 1);

            let events = layer.apply("alice", &Instruction::Claim).await;
            assert_eq!(
                events,
                vec![
                    Event::Claimed {
                        username: "alice".to_string(),
                        amount: DAILY_REWARD,
                    },
                    Event::Repriced {
                        username: "alice".to_string(),
                        stock_value: 11,
                    },
                ]
            );
            let alice = load_account(&layer, "alice").await.unwrap();
            assert_eq!(alice.coins, INITIAL_COINS + DAILY_REWARD);
            assert_eq!(alice.last_claim, TEST_NOW);
            assert_eq!(alice.history.len(), 2);

            let events = layer.apply("alice", &Instruction::Claim).await;
            assert_eq!(
                events[0].rejection(),
                Some((
                    ERROR_COOLDOWN,
                    "You need to wait for 24 hours to claim your daily"
                ))
            );
        });
    }

    #[test]
    fn test_claim_cooldown_boundary() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let mut state = seeded_memory(&["alice"]).await;
            crate::execute(&mut state, TEST_NOW, 1, 1, "alice", &Instruction::Claim).await;

            // Exactly one day later is still too early
            let mut layer = Layer::new(&state, TEST_NOW + 86_400, 2);
            let events = layer.apply("alice", &Instruction::Claim).await;
            assert_eq!(
                events[0].rejection(),
                Some((ERROR_COOLDOWN, "You need to wait for 0 seconds to claim your daily"))
            );

            let mut layer = Layer::new(&state, TEST_NOW + 86_401, 3);
            let events = layer.apply("alice", &Instruction::Claim).await;
            assert!(rejection_code(&events).is_none());
        });
    }

    #[test]
    fn test_refresh() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let names = ["alice", "bob", "carol", "dave", "erin", "frank", "grace"];
            let state = seeded_memory(&names).await;
            let mut layer = Layer::new(&state, TEST_NOW, 7);

            let events = layer.apply("alice", &Instruction::Refresh).await;
            let Event::Refreshed { username, featured } = &events[0] else {
                panic!("expected Refreshed, got {events:?}");
            };
            assert_eq!(username, "alice");
            assert_eq!(featured.len(), FEATURED_STOCKS);
            assert!(!featured.iter().any(|name| name == "alice"));
            let alice = load_account(&layer, "alice").await.unwrap();
            assert_eq!(&alice.featured, featured);
            assert_eq!(alice.last_refresh, TEST_NOW);

            let mut layer = Layer::new(&state, TEST_NOW, 7);
            layer.insert(Key::Account("alice".to_string()), Value::Account(alice));
            let events = layer.apply("alice", &Instruction::Refresh).await;
            assert_eq!(
                events[0].rejection(),
                Some((ERROR_COOLDOWN, "You still need to wait for 10 seconds to refresh"))
            );
        });
    }

    #[test]
    fn test_refresh_few_users() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = seeded_memory(&["alice", "bob"]).await;
            let mut layer = Layer::new(&state, TEST_NOW, 7);
            let events = layer.apply("alice", &Instruction::Refresh).await;
            assert_eq!(
                events,
                vec![Event::Refreshed {
                    username: "alice".to_string(),
                    featured: vec!["bob".to_string()],
                }]
            );
        });
    }

    #[test]
    fn test_unknown_user() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = seeded_memory(&["bob"]).await;
            let mut layer = Layer::new(&state, TEST_NOW, 1);
            for instruction in [
                buy("bob", 1),
                sell("bob", 1),
                Instruction::Claim,
                Instruction::Refresh,
            ] {
                let events = layer.apply("ghost", &instruction).await;
                assert_eq!(
                    rejection_code(&events),
                    Some(bourse_types::market::ERROR_ACCOUNT_NOT_FOUND)
                );
            }
            let events = layer.apply("bob", &buy("ghost", 1)).await;
            assert_eq!(
                rejection_code(&events),
                Some(bourse_types::market::ERROR_ACCOUNT_NOT_FOUND)
            );
            assert!(layer.commit().is_empty());
        });
    }
}

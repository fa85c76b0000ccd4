//! Read-only views over a [State].

use crate::{
    password,
    state::{load_account, load_directory, State},
};
use bourse_types::{
    api::{HoldingView, Portfolio, Quote, Quotes, StockInfo},
    market::{Account, Leaderboard, SEARCH_LIMIT},
};
use thiserror::Error;

/// Why a login attempt was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginError {
    #[error("User does not exist")]
    UnknownUser,
    #[error("Incorrect password")]
    IncorrectPassword,
}

pub async fn verify_login<S: State>(
    state: &S,
    username: &str,
    password: &str,
) -> Result<(), LoginError> {
    let account = load_account(state, username)
        .await
        .ok_or(LoginError::UnknownUser)?;
    if !password::verify(&account.credential, password) {
        return Err(LoginError::IncorrectPassword);
    }
    Ok(())
}

async fn stock_value<S: State>(state: &S, owner: &str) -> u64 {
    load_account(state, owner)
        .await
        .map(|account| account.stock_value)
        .unwrap_or(0)
}

/// Coins plus every holding valued at its owner's current stock value.
pub async fn net_worth<S: State>(state: &S, account: &Account) -> u64 {
    let mut total = account.coins;
    for holding in &account.stocks {
        let value = stock_value(state, &holding.name).await;
        total = total.saturating_add(holding.amount.saturating_mul(value));
    }
    total
}

pub async fn portfolio<S: State>(state: &S, username: &str) -> Option<Portfolio> {
    let account = load_account(state, username).await?;

    let mut holdings = Vec::with_capacity(account.stocks.len());
    let mut net_worth = account.coins;
    for holding in &account.stocks {
        let stock_value = stock_value(state, &holding.name).await;
        let worth = holding.amount.saturating_mul(stock_value);
        net_worth = net_worth.saturating_add(worth);
        holdings.push(HoldingView {
            name: holding.name.clone(),
            amount: holding.amount,
            stock_value,
            worth,
        });
    }

    Some(Portfolio {
        username: account.username,
        coins: account.coins,
        stock_value: account.stock_value,
        stock_left: account.stock_left,
        net_worth,
        holdings,
        last_claim: account.last_claim,
        last_refresh: account.last_refresh,
    })
}

/// Quotes for the stocks featured on `username`'s home page.
///
/// Stocks whose owner no longer resolves are skipped.
pub async fn featured<S: State>(state: &S, username: &str) -> Vec<Quote> {
    let Some(account) = load_account(state, username).await else {
        return Vec::new();
    };
    let mut quotes = Vec::with_capacity(account.featured.len());
    for name in &account.featured {
        if let Some(owner) = load_account(state, name).await {
            quotes.push(Quote {
                username: owner.username,
                stock_value: owner.stock_value,
                stock_left: owner.stock_left,
            });
        }
    }
    quotes
}

pub async fn leaderboard<S: State>(state: &S) -> Leaderboard {
    let directory = load_directory(state).await;
    let mut net_worths = Vec::with_capacity(directory.usernames.len());
    for username in directory.usernames {
        let Some(account) = load_account(state, &username).await else {
            continue;
        };
        let worth = net_worth(state, &account).await;
        net_worths.push((username, worth));
    }
    Leaderboard::from_net_worths(net_worths)
}

/// Usernames containing `query`, ignoring case.
pub async fn search<S: State>(state: &S, query: &str) -> Vec<String> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    load_directory(state)
        .await
        .usernames
        .into_iter()
        .filter(|username| username.to_lowercase().contains(&query))
        .take(SEARCH_LIMIT)
        .collect()
}

pub async fn quotes<S: State>(state: &S) -> Quotes {
    let directory = load_directory(state).await;
    let mut quotes = Quotes::new();
    for username in directory.usernames {
        if let Some(account) = load_account(state, &username).await {
            quotes.insert(username, account.stock_value);
        }
    }
    quotes
}

pub async fn stock_info<S: State>(state: &S, owner: &str) -> Option<StockInfo> {
    let account = load_account(state, owner).await?;
    Some(StockInfo {
        owner: account.username,
        stock_value: account.stock_value,
        stock_left: account.stock_left,
        history: account.history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{seeded_memory, TEST_NOW, TEST_PASSWORD};
    use crate::{execute, Memory};
    use bourse_types::{market::INITIAL_COINS, Instruction};
    use commonware_runtime::{deterministic::Runner, Runner as _};

    #[test]
    fn test_verify_login() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = seeded_memory(&["alice"]).await;
            assert_eq!(verify_login(&state, "alice", TEST_PASSWORD).await, Ok(()));
            assert_eq!(
                verify_login(&state, "alice", "wrong-password").await,
                Err(LoginError::IncorrectPassword)
            );
            assert_eq!(
                verify_login(&state, "mallory", TEST_PASSWORD).await,
                Err(LoginError::UnknownUser)
            );
        });
    }

    #[test]
    fn test_search() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let state = seeded_memory(&["alice", "Alicia", "bob"]).await;
            assert_eq!(search(&state, "ALI").await, vec!["alice", "Alicia"]);
            assert_eq!(search(&state, "bo").await, vec!["bob"]);
            assert!(search(&state, "   ").await.is_empty());
            assert!(search(&state, "zed").await.is_empty());
        });
    }

    #[test]
    fn test_net_worth_and_leaderboard() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let mut state = seeded_memory(&["alice", "bob", "carol"]).await;

            // Alice claims, so she leads; bob buys 10 of carol at 10 coins each
            execute(&mut state, TEST_NOW, 1, 10, "alice", &Instruction::Claim).await;
            execute(
                &mut state,
                TEST_NOW,
                2,
                11,
                "bob",
                &Instruction::Buy {
                    owner: "carol".to_string(),
                    amount: 10,
                },
            )
            .await;

            let bob = load_account(&state, "bob").await.unwrap();
            assert_eq!(bob.coins, INITIAL_COINS - 100);
            assert_eq!(net_worth(&state, &bob).await, INITIAL_COINS);

            let board = leaderboard(&state).await;
            let order: Vec<&str> = board.entries.iter().map(|s| s.username.as_str()).collect();
            assert_eq!(order, vec!["alice", "bob", "carol"]);
            assert_eq!(board.entries[0].net_worth, INITIAL_COINS + 100);
        });
    }

    #[test]
    fn test_portfolio_and_quotes() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let mut state = seeded_memory(&["alice", "bob"]).await;
            execute(
                &mut state,
                TEST_NOW,
                1,
                10,
                "alice",
                &Instruction::Buy {
                    owner: "bob".to_string(),
                    amount: 3,
                },
            )
            .await;

            let view = portfolio(&state, "alice").await.unwrap();
            assert_eq!(view.holdings.len(), 1);
            assert_eq!(view.holdings[0].name, "bob");
            assert_eq!(view.holdings[0].amount, 3);
            assert_eq!(view.holdings[0].worth, 3 * view.holdings[0].stock_value);
            assert_eq!(view.net_worth, view.coins + view.holdings[0].worth);

            let quotes = quotes(&state).await;
            assert_eq!(quotes.len(), 2);
            assert_eq!(quotes.get("bob"), Some(&view.holdings[0].stock_value));

            assert!(portfolio(&Memory::default(), "alice").await.is_none());
            assert!(stock_info(&state, "nobody").await.is_none());
            let info = stock_info(&state, "bob").await.unwrap();
            assert_eq!(info.stock_left, 97);
        });
    }
}

//! JSON payloads exchanged with the HTTP API.

use crate::market::{PricePoint, Standing};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub token: String,
}

/// Buy or sell `amount` shares of `user`'s stock
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub user: String,
    pub amount: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoQuery {
    pub user: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingView {
    pub name: String,
    pub amount: u64,
    pub stock_value: u64,
    pub worth: u64,
}

/// An account as its owner sees it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub username: String,
    pub coins: u64,
    pub stock_value: u64,
    pub stock_left: u64,
    pub net_worth: u64,
    pub holdings: Vec<HoldingView>,
    pub last_claim: u64,
    pub last_refresh: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub username: String,
    pub stock_value: u64,
    pub stock_left: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Home {
    pub portfolio: Portfolio,
    pub featured: Vec<Quote>,
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyStocks {
    pub portfolio: Portfolio,
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub results: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardView {
    pub rank: u32,
    pub net_worth: u64,
    pub top: Vec<Standing>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInfo {
    pub owner: String,
    pub stock_value: u64,
    pub stock_left: u64,
    pub history: Vec<PricePoint>,
}

/// Result of a buy, sell, claim or refresh
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub message: Option<String>,
    /// Set when the action was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u8>,
    pub portfolio: Portfolio,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u8>,
}

/// Username to current stock value
pub type Quotes = BTreeMap<String, u64>;

/// Pushed to `/ticker` subscribers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketUpdate {
    Trade {
        trader: String,
        owner: String,
        amount: u64,
        price: u64,
        buy: bool,
    },
    Price {
        username: String,
        stock_value: u64,
    },
    Listed {
        username: String,
        stock_value: u64,
    },
}

/// Minimum username length
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Maximum username length
pub const MAX_USERNAME_LENGTH: usize = 20;

/// Minimum password length (bytes)
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length (bytes)
pub const MAX_PASSWORD_LENGTH: usize = 64;

/// Coins granted on signup
pub const INITIAL_COINS: u64 = 1_000;

/// Shares every user issues of their own stock
pub const INITIAL_STOCK_SUPPLY: u64 = 100;

/// Coins granted by a daily claim
pub const DAILY_REWARD: u64 = 100;

/// Seconds between daily claims
pub const CLAIM_COOLDOWN_SECS: u64 = 60 * 60 * 24;

/// Seconds between featured stock refreshes
pub const REFRESH_COOLDOWN_SECS: u64 = 10;

/// Stocks picked by a refresh
pub const FEATURED_STOCKS: usize = 5;

/// Net worth per unit of stock value
pub const STOCK_VALUE_DIVISOR: u64 = 100;

/// Floor for any stock value
pub const MIN_STOCK_VALUE: u64 = 1;

/// Price points retained per stock
pub const MAX_HISTORY: usize = 64;

/// Entries shown on the leaderboard
pub const LEADERBOARD_SIZE: usize = 10;

/// Maximum search results
pub const SEARCH_LIMIT: usize = 50;

/// Upper bound on distinct holdings per account
pub const MAX_HOLDINGS: usize = 10_000;

/// Upper bound on registered accounts
pub const MAX_ACCOUNTS: usize = 1_000_000;

/// Error codes for Rejected events
pub const ERROR_ACCOUNT_EXISTS: u8 = 1;
pub const ERROR_ACCOUNT_NOT_FOUND: u8 = 2;
pub const ERROR_INSUFFICIENT_FUNDS: u8 = 3;
pub const ERROR_INSUFFICIENT_SUPPLY: u8 = 4;
pub const ERROR_INSUFFICIENT_HOLDINGS: u8 = 5;
pub const ERROR_INVALID_AMOUNT: u8 = 6;
pub const ERROR_COOLDOWN: u8 = 7;
pub const ERROR_INVALID_USERNAME: u8 = 8;
pub const ERROR_INVALID_PASSWORD: u8 = 9;
pub const ERROR_PASSWORD_MISMATCH: u8 = 10;
pub const ERROR_SELF_TRADE: u8 = 11;
pub const ERROR_TOO_MANY_HOLDINGS: u8 = 12;
pub const ERROR_MARKET_FULL: u8 = 13;

mod account;
mod rewards;
mod trading;

pub use rewards::format_wait;

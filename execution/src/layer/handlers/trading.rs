use super::super::*;
use bourse_types::market::{
    ERROR_ACCOUNT_NOT_FOUND, ERROR_INSUFFICIENT_FUNDS, ERROR_INSUFFICIENT_HOLDINGS,
    ERROR_INSUFFICIENT_SUPPLY, ERROR_INVALID_AMOUNT, ERROR_SELF_TRADE, ERROR_TOO_MANY_HOLDINGS,
    MAX_HOLDINGS,
};

impl<'a, S: State> Layer<'a, S> {
    /// Checks shared by buy and sell, returning the trader and the owner.
    async fn load_trade(
        &self,
        trader: &str,
        owner: &str,
        amount: u64,
    ) -> Result<(Account, Account), Vec<Event>> {
        if amount == 0 {
            return Err(Self::reject(
                trader,
                ERROR_INVALID_AMOUNT,
                "Amount must be positive",
            ));
        }
        if trader == owner {
            return Err(Self::reject(
                trader,
                ERROR_SELF_TRADE,
                "You can't trade your own stock",
            ));
        }
        let Some(trader_account) = load_account(self, trader).await else {
            return Err(Self::reject(
                trader,
                ERROR_ACCOUNT_NOT_FOUND,
                "Please login first",
            ));
        };
        let Some(owner_account) = load_account(self, owner).await else {
            return Err(Self::reject(
                trader,
                ERROR_ACCOUNT_NOT_FOUND,
                format!("{owner} does not exist"),
            ));
        };
        Ok((trader_account, owner_account))
    }

    pub(in crate::layer) async fn handle_buy(
        &mut self,
        buyer: &str,
        owner: &str,
        amount: u64,
    ) -> Vec<Event> {
        let (mut buyer_account, mut owner_account) =
            match self.load_trade(buyer, owner, amount).await {
                Ok(accounts) => accounts,
                Err(events) => return events,
            };

        let Some(cost) = amount.checked_mul(owner_account.stock_value) else {
            return Self::reject(buyer, ERROR_INSUFFICIENT_FUNDS, "Not enough coins");
        };
        if buyer_account.coins < cost {
            return Self::reject(buyer, ERROR_INSUFFICIENT_FUNDS, "Not enough coins");
        }
        if owner_account.stock_left < amount {
            return Self::reject(
                buyer,
                ERROR_INSUFFICIENT_SUPPLY,
                format!("{owner} stock not enough..."),
            );
        }
        if buyer_account.holding(owner) == 0 && buyer_account.stocks.len() >= MAX_HOLDINGS {
            return Self::reject(
                buyer,
                ERROR_TOO_MANY_HOLDINGS,
                format!("You can't hold more than {MAX_HOLDINGS} different stocks"),
            );
        }

        // Coins paid leave circulation
        owner_account.stock_left -= amount;
        self.insert(
            Key::Account(owner.to_string()),
            Value::Account(owner_account),
        );
        buyer_account.coins -= cost;
        buyer_account.add_holding(owner, amount);

        let mut events = vec![Event::Bought {
            buyer: buyer.to_string(),
            owner: owner.to_string(),
            amount,
            cost,
        }];
        events.extend(self.store_account(buyer_account).await);
        events
    }

    pub(in crate::layer) async fn handle_sell(
        &mut self,
        seller: &str,
        owner: &str,
        amount: u64,
    ) -> Vec<Event> {
        let (mut seller_account, mut owner_account) =
            match self.load_trade(seller, owner, amount).await {
                Ok(accounts) => accounts,
                Err(events) => return events,
            };

        if !seller_account.remove_holding(owner, amount) {
            return Self::reject(
                seller,
                ERROR_INSUFFICIENT_HOLDINGS,
                "You don't have so much stocks!",
            );
        }
        let earned = amount.saturating_mul(owner_account.stock_value);

        owner_account.stock_left = owner_account.stock_left.saturating_add(amount);
        self.insert(
            Key::Account(owner.to_string()),
            Value::Account(owner_account),
        );
        seller_account.coins = seller_account.coins.saturating_add(earned);

        let mut events = vec![Event::Sold {
            seller: seller.to_string(),
            owner: owner.to_string(),
            amount,
            earned,
        }];
        events.extend(self.store_account(seller_account).await);
        events
    }
}

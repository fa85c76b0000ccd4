use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, ReadRangeExt, Write};
use commonware_cryptography::sha256::Digest;
use serde::{Deserialize, Serialize};

use super::{
    read_string, read_strings, string_encode_size, strings_encode_size, write_string,
    write_strings, FEATURED_STOCKS, INITIAL_COINS, INITIAL_STOCK_SUPPLY, MAX_HISTORY,
    MAX_HOLDINGS, MAX_USERNAME_LENGTH, MIN_STOCK_VALUE, STOCK_VALUE_DIVISOR,
};

/// Salted password digest
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub salt: u64,
    pub digest: Digest,
}

impl Write for Credential {
    fn write(&self, writer: &mut impl BufMut) {
        self.salt.write(writer);
        self.digest.write(writer);
    }
}

impl Read for Credential {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            salt: u64::read(reader)?,
            digest: Digest::read(reader)?,
        })
    }
}

impl EncodeSize for Credential {
    fn encode_size(&self) -> usize {
        self.salt.encode_size() + self.digest.encode_size()
    }
}

/// Shares of one stock held by an account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Holding {
    pub name: String,
    pub amount: u64,
}

impl Write for Holding {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.name, writer);
        self.amount.write(writer);
    }
}

impl Read for Holding {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            name: read_string(reader, MAX_USERNAME_LENGTH)?,
            amount: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Holding {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.name) + self.amount.encode_size()
    }
}

/// A stock value observed at a point in time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub at: u64,
    pub value: u64,
}

impl Write for PricePoint {
    fn write(&self, writer: &mut impl BufMut) {
        self.at.write(writer);
        self.value.write(writer);
    }
}

impl Read for PricePoint {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            at: u64::read(reader)?,
            value: u64::read(reader)?,
        })
    }
}

impl EncodeSize for PricePoint {
    fn encode_size(&self) -> usize {
        self.at.encode_size() + self.value.encode_size()
    }
}

/// Stock value implied by a net worth
pub fn stock_value_for(net_worth: u64) -> u64 {
    (net_worth / STOCK_VALUE_DIVISOR).max(MIN_STOCK_VALUE)
}

/// A player and the stock they issue
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub credential: Credential,
    pub coins: u64,
    /// Current price of one share of this account's stock.
    pub stock_value: u64,
    /// Shares of this account's stock not held by anyone.
    pub stock_left: u64,
    pub stocks: Vec<Holding>,
    pub history: Vec<PricePoint>,
    pub last_claim: u64,
    pub last_refresh: u64,
    pub featured: Vec<String>,
    pub created_at: u64,
}

impl Account {
    pub fn new(username: String, credential: Credential, now: u64) -> Self {
        let stock_value = stock_value_for(INITIAL_COINS);
        Self {
            username,
            credential,
            coins: INITIAL_COINS,
            stock_value,
            stock_left: INITIAL_STOCK_SUPPLY,
            stocks: Vec::new(),
            history: vec![PricePoint {
                at: now,
                value: stock_value,
            }],
            // Allow an immediate first claim and refresh
            last_claim: 0,
            last_refresh: 0,
            featured: Vec::new(),
            created_at: now,
        }
    }

    /// Shares of `name` held by this account.
    pub fn holding(&self, name: &str) -> u64 {
        self.stocks
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.amount)
            .unwrap_or(0)
    }

    pub fn add_holding(&mut self, name: &str, amount: u64) {
        match self.stocks.iter_mut().find(|h| h.name == name) {
            Some(holding) => holding.amount = holding.amount.saturating_add(amount),
            None => self.stocks.push(Holding {
                name: name.to_string(),
                amount,
            }),
        }
    }

    /// Removes `amount` shares of `name`, dropping the entry once empty.
    ///
    /// Returns false (and leaves the account untouched) if fewer shares are held.
    pub fn remove_holding(&mut self, name: &str, amount: u64) -> bool {
        let Some(idx) = self.stocks.iter().position(|h| h.name == name) else {
            return false;
        };
        let holding = &mut self.stocks[idx];
        if holding.amount < amount {
            return false;
        }
        holding.amount -= amount;
        if holding.amount == 0 {
            self.stocks.remove(idx);
        }
        true
    }

    /// Sets a new stock value, appending it to the history if it changed.
    pub fn record_price(&mut self, at: u64, value: u64) -> bool {
        if value == self.stock_value {
            return false;
        }
        self.stock_value = value;
        self.history.push(PricePoint { at, value });
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        true
    }
}

impl Write for Account {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.username, writer);
        self.credential.write(writer);
        self.coins.write(writer);
        self.stock_value.write(writer);
        self.stock_left.write(writer);
        self.stocks.write(writer);
        self.history.write(writer);
        self.last_claim.write(writer);
        self.last_refresh.write(writer);
        write_strings(&self.featured, writer);
        self.created_at.write(writer);
    }
}

impl Read for Account {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            username: read_string(reader, MAX_USERNAME_LENGTH)?,
            credential: Credential::read(reader)?,
            coins: u64::read(reader)?,
            stock_value: u64::read(reader)?,
            stock_left: u64::read(reader)?,
            stocks: Vec::<Holding>::read_range(reader, 0..=MAX_HOLDINGS)?,
            history: Vec::<PricePoint>::read_range(reader, 0..=MAX_HISTORY)?,
            last_claim: u64::read(reader)?,
            last_refresh: u64::read(reader)?,
            featured: read_strings(reader, FEATURED_STOCKS, MAX_USERNAME_LENGTH)?,
            created_at: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Account {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.username)
            + self.credential.encode_size()
            + self.coins.encode_size()
            + self.stock_value.encode_size()
            + self.stock_left.encode_size()
            + self.stocks.encode_size()
            + self.history.encode_size()
            + self.last_claim.encode_size()
            + self.last_refresh.encode_size()
            + strings_encode_size(&self.featured)
            + self.created_at.encode_size()
    }
}

/// Whether `username` is 3-20 ASCII letters, digits or underscores.
pub fn is_valid_username(username: &str) -> bool {
    (super::MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&username.len())
        && username
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};

use crate::market::{
    read_string, string_encode_size, write_string, Account, Directory, MAX_USERNAME_LENGTH,
};

#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Debug)]
pub enum Key {
    /// Account by username (tag 0)
    Account(String),

    /// Registered usernames (tag 1)
    Directory,
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Account(username) => {
                0u8.write(writer);
                write_string(username, writer);
            }
            Self::Directory => 1u8.write(writer),
        }
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let key = match u8::read(reader)? {
            0 => Self::Account(read_string(reader, MAX_USERNAME_LENGTH)?),
            1 => Self::Directory,
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(key)
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Account(username) => string_encode_size(username),
                Self::Directory => 0,
            }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Value {
    Account(Account),
    Directory(Directory),

    /// Commit metadata: number of instructions applied so far
    Commit { sequence: u64 },
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Account(account) => {
                0u8.write(writer);
                account.write(writer);
            }
            Self::Directory(directory) => {
                1u8.write(writer);
                directory.write(writer);
            }
            Self::Commit { sequence } => {
                2u8.write(writer);
                sequence.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = match u8::read(reader)? {
            0 => Self::Account(Account::read(reader)?),
            1 => Self::Directory(Directory::read(reader)?),
            2 => Self::Commit {
                sequence: u64::read(reader)?,
            },
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(value)
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Account(account) => account.encode_size(),
                Self::Directory(directory) => directory.encode_size(),
                Self::Commit { sequence } => sequence.encode_size(),
            }
    }
}

/// A mutation requested on behalf of a user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    SignUp {
        password: String,
        confirm_password: String,
    },
    Buy {
        owner: String,
        amount: u64,
    },
    Sell {
        owner: String,
        amount: u64,
    },
    Claim,
    Refresh,
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignUp { .. } => "signup",
            Self::Buy { .. } => "buy",
            Self::Sell { .. } => "sell",
            Self::Claim => "claim",
            Self::Refresh => "refresh",
        }
    }
}

/// Outcome of applying an instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    SignedUp {
        username: String,
    },
    Bought {
        buyer: String,
        owner: String,
        amount: u64,
        cost: u64,
    },
    Sold {
        seller: String,
        owner: String,
        amount: u64,
        earned: u64,
    },
    Claimed {
        username: String,
        amount: u64,
    },
    Refreshed {
        username: String,
        featured: Vec<String>,
    },
    Repriced {
        username: String,
        stock_value: u64,
    },
    Rejected {
        username: String,
        code: u8,
        message: String,
    },
}

impl Event {
    /// The rejection carried by this event, if any.
    pub fn rejection(&self) -> Option<(u8, &str)> {
        match self {
            Self::Rejected { code, message, .. } => Some((*code, message.as_str())),
            _ => None,
        }
    }
}

use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, Write};

use super::{read_strings, strings_encode_size, write_strings, MAX_ACCOUNTS, MAX_USERNAME_LENGTH};

/// Every registered username, in signup order
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Directory {
    pub usernames: Vec<String>,
}

impl Directory {
    pub fn contains(&self, username: &str) -> bool {
        self.usernames.iter().any(|u| u == username)
    }

    /// Appends `username` unless it is already listed.
    pub fn register(&mut self, username: &str) -> bool {
        if self.contains(username) {
            return false;
        }
        self.usernames.push(username.to_string());
        true
    }
}

impl Write for Directory {
    fn write(&self, writer: &mut impl BufMut) {
        write_strings(&self.usernames, writer);
    }
}

impl Read for Directory {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            usernames: read_strings(reader, MAX_ACCOUNTS, MAX_USERNAME_LENGTH)?,
        })
    }
}

impl EncodeSize for Directory {
    fn encode_size(&self) -> usize {
        strings_encode_size(&self.usernames)
    }
}

mod account;
mod codec;
mod constants;
mod directory;
mod leaderboard;

pub use account::*;
pub use codec::{
    read_string, read_strings, string_encode_size, strings_encode_size, write_string,
    write_strings,
};
pub use constants::*;
pub use directory::*;
pub use leaderboard::*;

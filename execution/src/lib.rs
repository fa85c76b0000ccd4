pub mod password;
pub mod queries;
pub mod state_transition;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

mod layer;

mod state;

pub use layer::{format_wait, Layer};
pub use queries::LoginError;
pub use state::{
    load_account, load_directory, restored_sequence, Adb, Memory, State, Status,
};
pub use state_transition::execute;

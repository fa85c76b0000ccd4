//! Shared types for bourse: stored records and their binary encoding,
//! instructions and events, and the JSON payloads of the HTTP API.

pub mod api;
pub mod execution;
pub mod market;

pub use execution::{Event, Instruction, Key, Value};

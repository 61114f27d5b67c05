//! Protocol messages and error types.

pub mod error;
pub mod message;

pub use error::*;
pub use message::*;

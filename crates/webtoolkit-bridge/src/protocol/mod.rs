//! Coordinator protocol handling.

pub mod handler;

pub use handler::Coordinator;

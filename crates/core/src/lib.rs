//! Core business logic for Pulse.

pub mod services;

pub use services::*;

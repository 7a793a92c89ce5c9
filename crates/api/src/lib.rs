//! HTTP API layer for Pulse.
//!
//! This crate provides the REST API and the live message relay:
//!
//! - **Endpoints**: accounts, social graph, posts, stories, chat and notifications
//! - **Extractors**: the authenticated caller
//! - **Middleware**: bearer token verification
//! - **Streaming**: per-user WebSocket channels for new messages
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod streaming;

pub use endpoints::{health, router};
pub use streaming::{StreamingState, streaming_handler};

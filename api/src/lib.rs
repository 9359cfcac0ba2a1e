//! FlowLens API Module
//!
//! HTTP endpoints serving lineage, flow status and processor logs to the
//! browser client.

pub mod handlers;
pub mod models;
pub mod server;

pub use handlers::*;
pub use models::*;
pub use server::*;

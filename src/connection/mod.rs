// Event source connection: dial, parse, reconnect with backoff

mod backoff;
mod client;

pub use backoff::Backoff;
pub use client::{ConnectionConfig, ConnectionManager, ConnectionStats};

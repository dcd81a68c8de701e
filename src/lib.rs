// Event model and validation
pub mod event;

// Agent store, reducer and move indicator expiry
pub mod state;

// Event source connection with reconnect backoff
pub mod connection;

// Renderer-facing HTTP API
pub mod api;

// Configuration loading
pub mod config;

// Demo event producer
pub mod demo;

pub use connection::ConnectionManager;
pub use event::DeckEvent;
pub use state::AgentStore;

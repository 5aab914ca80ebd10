// Configuration (TOML + environment overrides)
pub mod config;

// Wire protocol
pub mod protocol;

// Relay hub, session registry and staleness sweeper
pub mod hub;

// Per-connection WebSocket lifecycle
pub mod connection;

// HTTP and WebSocket APIs
pub mod api;

// Client-side scheduler and remote entity reconciliation
pub mod client;

// Per-connection WebSocket lifecycle

pub mod manager;

pub use manager::ConnectionManager;

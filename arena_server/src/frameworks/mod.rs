// Frameworks layer: configuration, tracing bootstrap, server wiring and signals.

pub mod config;
pub mod server;
pub mod shutdown;

// Use cases layer: the session runtime and the apps it hosts.

pub mod app;
pub mod battle;
pub mod inactivity;
pub mod lifecycle;
pub mod registry;
pub mod router;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{AppManifest, AppRegistry, AppRegistryError, SessionApp};
pub use inactivity::{InactivityConfig, InactivityMonitor};
pub use session::{SessionHandle, SessionSettings, spawn_session};
pub use types::{ConnectionHandle, Outbound, SessionEvent, SessionStatus};

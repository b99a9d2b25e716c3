//! Settings synchronization for MSI monitors.
//!
//! [`controller::MonitorController`] decides whether the settings shown for a
//! monitor come from the local cache or from the hardware, keeps LED state the
//! monitor cannot report, and drops responses for superseded requests.
//! Everything it remembers between runs lives in one JSON document managed by
//! [`store::JsonStore`].

pub mod cache;
pub mod controller;
pub mod directory;
pub mod persisted;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use controller::{ControllerState, LoadPhase, MonitorController, SettingsSource};
pub use session::{Severity, Toast, UiSession};

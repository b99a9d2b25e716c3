//! Hardware seam for MSI monitors.
//!
//! [`Transport`] is the only way the rest of the application talks to a
//! monitor: one typed [`Command`] in, one [`Response`] or [`TransportError`]
//! out. [`MsigdTransport`] implements it on top of the `msigd` CLI.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use shared::{Command, Monitor, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod executor;
pub mod parser;

pub use executor::MsigdExecutor;
pub use parser::{ListedMonitor, MsigdParser};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("msigd is not available: {0}")]
    Unavailable(String),

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("command rejected: {0}")]
    Rejected(String),

    #[error("msigd did not answer within {0:?}")]
    Timeout(Duration),

    #[error("monitor not found: {0}")]
    UnknownMonitor(String),

    #[error("unexpected response to {0}")]
    UnexpectedResponse(String),
}

/// Issues one command against the hardware and waits for it to settle.
pub trait Transport: Send + Sync {
    fn invoke(
        &self,
        command: Command,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

/// [`Transport`] backed by the msigd CLI.
///
/// msigd addresses monitors by enumeration index, which changes with the
/// plug order. Callers use the stable ids from [`MsigdParser::parse_monitor_list`];
/// the index for each id is taken from the latest enumeration.
pub struct MsigdTransport {
    executor: MsigdExecutor,
    indices: Mutex<HashMap<String, String>>,
}

impl MsigdTransport {
    pub fn new(executor: MsigdExecutor) -> Self {
        Self {
            executor,
            indices: Mutex::new(HashMap::new()),
        }
    }

    async fn list(&self) -> Result<Vec<Monitor>, TransportError> {
        let output = self.executor.list_monitors().await?;
        let listed = MsigdParser::parse_monitor_list(&output);

        let mut indices = self.indices.lock().unwrap_or_else(PoisonError::into_inner);
        indices.clear();
        for entry in &listed {
            indices.insert(entry.monitor.id.clone(), entry.index.clone());
        }
        drop(indices);

        debug!(count = listed.len(), "enumerated monitors");
        Ok(listed.into_iter().map(|entry| entry.monitor).collect())
    }

    fn cached_index(&self, monitor_id: &str) -> Option<String> {
        self.indices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(monitor_id)
            .cloned()
    }

    /// Re-enumerates once when the id is unknown (hot-plug since the last listing).
    async fn resolve(&self, monitor_id: &str) -> Result<String, TransportError> {
        if let Some(index) = self.cached_index(monitor_id) {
            return Ok(index);
        }
        info!(monitor = %monitor_id, "unknown monitor id, re-enumerating");
        self.list().await?;
        self.cached_index(monitor_id)
            .ok_or_else(|| TransportError::UnknownMonitor(monitor_id.to_string()))
    }

    async fn dispatch(&self, command: Command) -> Result<Response, TransportError> {
        match command {
            Command::ListMonitors => self.list().await.map(Response::Monitors),
            Command::GetMonitorSettings { monitor_id } => {
                let index = self.resolve(&monitor_id).await?;
                let output = self.executor.query_monitor(&index).await?;
                Ok(Response::Settings(MsigdParser::parse_settings(&output)))
            }
            Command::ApplySetting { monitor_id, update } => {
                let key = update.key();
                if !key.is_queryable() {
                    return Err(TransportError::Rejected(format!(
                        "{} must be sent as a mystic light configuration",
                        key.label()
                    )));
                }
                let index = self.resolve(&monitor_id).await?;
                self.executor
                    .set_value(&index, key.msigd_name(), &update.wire_value())
                    .await?;
                Ok(Response::Ack)
            }
            Command::SetMysticLight { monitor_id, led } => {
                let index = self.resolve(&monitor_id).await?;
                self.executor
                    .set_mystic_light(&index, &led.mystic_arg())
                    .await?;
                Ok(Response::Ack)
            }
            Command::CheckAvailable => Ok(Response::Available(self.executor.check_available().await)),
        }
    }
}

impl Transport for MsigdTransport {
    async fn invoke(&self, command: Command) -> Result<Response, TransportError> {
        let name = command.name();
        debug!(command = %name, "invoking");

        let result = self.dispatch(command).await;
        if let Err(err) = &result {
            warn!(command = %name, error = %err, "hardware command failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::SettingUpdate;

    fn missing_binary() -> MsigdTransport {
        MsigdTransport::new(MsigdExecutor::new("/nonexistent/msigd-binary"))
    }

    #[tokio::test]
    async fn led_fields_cannot_go_through_apply_setting() {
        let transport = missing_binary();
        let err = transport
            .invoke(Command::ApplySetting {
                monitor_id: "SN1".into(),
                update: SettingUpdate::LedColor("#00ff00".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)));
    }

    #[tokio::test]
    async fn unavailable_binary_surfaces_on_every_command() {
        let transport = missing_binary();
        let err = transport
            .invoke(Command::GetMonitorSettings { monitor_id: "SN1".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));

        let available = transport.invoke(Command::CheckAvailable).await.unwrap();
        assert_eq!(available, Response::Available(false));
    }
}

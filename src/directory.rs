use std::sync::Arc;

use hardware::{Transport, TransportError};
use shared::{Command, Monitor, Response};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("monitor list unavailable: {0}")]
    Unavailable(#[from] TransportError),
}

/// Lists the monitors connected right now. Never cached: every call goes to
/// the hardware so hot-plugged units show up (and vanish) immediately.
pub struct MonitorDirectory<T> {
    transport: Arc<T>,
}

impl<T: Transport> MonitorDirectory<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    pub async fn list(&self) -> Result<Vec<Monitor>, DirectoryError> {
        match self.transport.invoke(Command::ListMonitors).await? {
            Response::Monitors(monitors) => Ok(monitors),
            _ => Err(TransportError::UnexpectedResponse(Command::ListMonitors.name()).into()),
        }
    }
}

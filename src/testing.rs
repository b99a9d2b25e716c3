//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use hardware::{Transport, TransportError};
use shared::{Command, LedSettings, Monitor, MonitorSettings, Response};
use tokio::sync::oneshot;

pub fn monitor(id: &str) -> Monitor {
    Monitor {
        id: id.to_string(),
        serial: id.to_string(),
        model: "MAG274QRF-QD".to_string(),
        firmware: "1.0.5".to_string(),
    }
}

pub fn settings_with_brightness(brightness: u8) -> MonitorSettings {
    MonitorSettings {
        brightness,
        ..MonitorSettings::default()
    }
}

#[derive(Default)]
struct Inner {
    monitors: Vec<Monitor>,
    list_error: Option<String>,
    hardware: HashMap<String, MonitorSettings>,
    query_errors: HashMap<String, TransportError>,
    gates: HashMap<String, VecDeque<oneshot::Receiver<()>>>,
    calls: Vec<Command>,
}

/// Answers like a monitor would, including never reporting LED state.
/// Settings queries can be held open per monitor with [`FakeTransport::hold`].
#[derive(Default)]
pub struct FakeTransport {
    inner: Mutex<Inner>,
}

impl FakeTransport {
    pub fn new(monitors: Vec<Monitor>) -> Self {
        let fake = Self::default();
        fake.set_monitors(monitors);
        fake
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_monitors(&self, monitors: Vec<Monitor>) {
        self.lock().monitors = monitors;
    }

    pub fn fail_listing(&self, message: &str) {
        self.lock().list_error = Some(message.to_string());
    }

    pub fn set_hardware(&self, monitor_id: &str, settings: MonitorSettings) {
        self.lock().hardware.insert(monitor_id.to_string(), settings);
    }

    pub fn fail_queries(&self, monitor_id: &str, error: TransportError) {
        self.lock().query_errors.insert(monitor_id.to_string(), error);
    }

    /// The next settings query for `monitor_id` waits until the sender fires.
    pub fn hold(&self, monitor_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock()
            .gates
            .entry(monitor_id.to_string())
            .or_default()
            .push_back(rx);
        tx
    }

    pub fn calls(&self) -> Vec<Command> {
        self.lock().calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.count(|c| matches!(c, Command::ListMonitors))
    }

    pub fn query_calls(&self) -> usize {
        self.count(|c| matches!(c, Command::GetMonitorSettings { .. }))
    }

    fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, command: &Command) -> Option<oneshot::Receiver<()>> {
        let mut inner = self.lock();
        inner.calls.push(command.clone());
        match command {
            Command::GetMonitorSettings { monitor_id } => {
                inner.gates.get_mut(monitor_id)?.pop_front()
            }
            _ => None,
        }
    }

    pub async fn wait_for_queries(&self, n: usize) {
        while self.query_calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

impl Transport for FakeTransport {
    async fn invoke(&self, command: Command) -> Result<Response, TransportError> {
        if let Some(gate) = self.record(&command) {
            let _ = gate.await;
        }

        let inner = self.lock();
        match command {
            Command::ListMonitors => match &inner.list_error {
                Some(message) => Err(TransportError::Unavailable(message.clone())),
                None => Ok(Response::Monitors(inner.monitors.clone())),
            },
            Command::GetMonitorSettings { monitor_id } => {
                if let Some(err) = inner.query_errors.get(&monitor_id) {
                    return Err(err.clone());
                }
                let settings = inner.hardware.get(&monitor_id).cloned().unwrap_or_default();
                Ok(Response::Settings(settings.with_led(LedSettings::default())))
            }
            Command::ApplySetting { .. } | Command::SetMysticLight { .. } => Ok(Response::Ack),
            Command::CheckAvailable => Ok(Response::Available(true)),
        }
    }
}

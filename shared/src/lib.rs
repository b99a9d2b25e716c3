use serde::{Deserialize, Serialize};

mod settings;

pub use settings::*;

// ==========================================
// MONITORS & UI TABS
// ==========================================

/// One connected monitor as reported by a single enumeration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    pub id: String,
    pub serial: String,
    pub model: String,
    pub firmware: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Display,
    Color,
    Led,
    Advanced,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Display, Tab::Color, Tab::Led, Tab::Advanced];

    pub fn label(self) -> &'static str {
        match self {
            Tab::Display => "Display",
            Tab::Color => "Color",
            Tab::Led => "LED",
            Tab::Advanced => "Advanced",
        }
    }

    pub fn next(self) -> Tab {
        let idx = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

// ==========================================
// THE COMMANDS (Controller -> Hardware)
// ==========================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ListMonitors,
    GetMonitorSettings { monitor_id: String },
    ApplySetting { monitor_id: String, update: SettingUpdate },
    SetMysticLight { monitor_id: String, led: LedSettings },
    CheckAvailable,
}

impl Command {
    /// Stable command name, used in logs.
    pub fn name(&self) -> String {
        match self {
            Command::ListMonitors => "list_monitors".into(),
            Command::GetMonitorSettings { .. } => "get_monitor_settings".into(),
            Command::ApplySetting { update, .. } => {
                format!("set_{}", update.key().msigd_name())
            }
            Command::SetMysticLight { .. } => "set_mystic_light".into(),
            Command::CheckAvailable => "check_msigd_available".into(),
        }
    }
}

// ==========================================
// THE RESPONSES (Hardware -> Controller)
// ==========================================

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ack,
    Monitors(Vec<Monitor>),
    Settings(MonitorSettings),
    Available(bool),
}

impl SettingUpdate {
    /// The hardware command that makes the monitor match this update.
    ///
    /// LED fields can only be sent together, so those take the full LED state
    /// from `settings`, which must already contain the update.
    pub fn hardware_command(&self, monitor_id: &str, settings: &MonitorSettings) -> Command {
        if self.key().is_queryable() {
            Command::ApplySetting {
                monitor_id: monitor_id.to_string(),
                update: self.clone(),
            }
        } else {
            Command::SetMysticLight {
                monitor_id: monitor_id.to_string(),
                led: settings.led(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_follow_setting_keys() {
        let cmd = Command::ApplySetting {
            monitor_id: "1".into(),
            update: SettingUpdate::RefreshRateDisplay(true),
        };
        assert_eq!(cmd.name(), "set_refresh_display");
        assert_eq!(Command::ListMonitors.name(), "list_monitors");
    }

    #[test]
    fn led_updates_become_mystic_light_commands() {
        let mut settings = MonitorSettings::default();
        let update = SettingUpdate::LedMode(LedMode::Meteor);
        settings.apply(update.clone());

        match update.hardware_command("SN1", &settings) {
            Command::SetMysticLight { monitor_id, led } => {
                assert_eq!(monitor_id, "SN1");
                assert_eq!(led.mode, LedMode::Meteor);
                assert_eq!(led.color, DEFAULT_LED_COLOR);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn tabs_serialize_lowercase_and_cycle() {
        assert_eq!(serde_json::to_string(&Tab::Led).unwrap(), "\"led\"");
        assert_eq!(Tab::Advanced.next(), Tab::Display);
        assert_eq!(Tab::default(), Tab::Display);
    }
}

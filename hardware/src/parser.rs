use std::collections::HashMap;

use shared::{ColorRgb, Monitor, MonitorSettings, SettingKey, SettingUpdate};
use tracing::warn;

/// A monitor from `msigd --list` together with the index msigd addresses it by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedMonitor {
    pub index: String,
    pub monitor: Monitor,
}

pub struct MsigdParser;

impl MsigdParser {
    /// Parses `--list` output. Each line is `index,serial,vendor,model,device`:
    ///
    /// ```text
    /// 1,A02019010700,MS,MSI Gaming Controller,/dev/hidraw4
    /// 2,B02019010701,MS,MAG274QRF-QD,/dev/hidraw1
    /// ```
    ///
    /// The monitor id is the serial number when it is unique in the listing,
    /// so the same physical unit keeps its id across replugs. Duplicate or
    /// missing serials get `serial#index`.
    pub fn parse_monitor_list(output: &str) -> Vec<ListedMonitor> {
        let rows: Vec<Vec<&str>> = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.split(',').map(str::trim).collect::<Vec<_>>())
            .filter(|parts| parts.len() >= 4)
            .collect();

        let mut serial_counts: HashMap<&str, usize> = HashMap::new();
        for parts in &rows {
            *serial_counts.entry(parts[1]).or_default() += 1;
        }

        rows.iter()
            .map(|parts| {
                let (index, serial) = (parts[0], parts[1]);
                let unique = !serial.is_empty() && serial_counts.get(serial) == Some(&1);
                let id = if unique {
                    serial.to_string()
                } else {
                    format!("{serial}#{index}")
                };
                ListedMonitor {
                    index: index.to_string(),
                    monitor: Monitor {
                        id,
                        serial: serial.to_string(),
                        model: parts[3].to_string(),
                        // not part of the list output
                        firmware: "Unknown".to_string(),
                    },
                }
            })
            .collect()
    }

    /// Parses `--query --numeric` output (`key : value` per line) on top of
    /// the defaults. LED fields are never reported and keep their defaults.
    pub fn parse_settings(output: &str) -> MonitorSettings {
        let mut values: HashMap<String, String> = HashMap::new();
        for line in output.lines() {
            if let Some((key, value)) = line.trim().split_once(':') {
                let key = key.trim().to_lowercase().replace(' ', "_");
                values.insert(key, value.trim().to_string());
            }
        }

        let mut settings = MonitorSettings::default();
        for key in SettingKey::ALL.iter().copied().filter(|k| k.is_queryable()) {
            let Some(raw) = values.get(key.msigd_name()) else {
                continue;
            };
            match SettingUpdate::parse(key, raw) {
                Some(update) => settings.apply(update),
                None => warn!(setting = key.msigd_name(), value = %raw, "unrecognised msigd value"),
            }
        }

        if let Some(rgb) = Self::parse_split_rgb(&values) {
            settings.color_rgb = rgb;
        }
        settings
    }

    /// Some firmware reports the custom colour as three separate lines.
    fn parse_split_rgb(values: &HashMap<String, String>) -> Option<ColorRgb> {
        let channel = |long: &str, short: &str| {
            values
                .get(long)
                .or_else(|| values.get(short))
                .and_then(|v| v.parse::<u8>().ok())
        };
        Some(ColorRgb {
            r: channel("color_red", "red")?,
            g: channel("color_green", "green")?,
            b: channel("color_blue", "blue")?,
        })
    }
}

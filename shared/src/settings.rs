use serde::{Deserialize, Serialize};

use crate::Tab;

pub const DEFAULT_LED_COLOR: &str = "#ff0000";
pub const DEFAULT_LED_COLOR2: &str = "#0000ff";

/// Colours offered when stepping through LED colours without a picker.
pub const LED_PALETTE: &[&str] = &[
    "#ff0000", "#ff8000", "#ffff00", "#00ff00", "#00ffff", "#0000ff", "#ff00ff", "#ffffff",
];

// ==========================================
// VALUE BEHAVIOUR
// ==========================================

/// Behaviour every setting value shares: how it looks on the msigd command
/// line and how a single UI step moves it.
pub trait SettingValue: Sized {
    fn wire(&self) -> String;
    fn parse_wire(raw: &str) -> Option<Self>;
    fn step(&self, key: SettingKey, forward: bool) -> Self;
}

impl SettingValue for u8 {
    fn wire(&self) -> String {
        self.to_string()
    }

    fn parse_wire(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }

    fn step(&self, key: SettingKey, forward: bool) -> Self {
        let (lo, hi) = key.range();
        let inc = key.increment();
        if forward {
            self.saturating_add(inc).min(hi)
        } else {
            self.saturating_sub(inc).max(lo)
        }
    }
}

impl SettingValue for bool {
    fn wire(&self) -> String {
        if *self { "on".into() } else { "off".into() }
    }

    fn parse_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "on" | "1" | "true" => Some(true),
            "off" | "0" | "false" => Some(false),
            _ => None,
        }
    }

    fn step(&self, _key: SettingKey, _forward: bool) -> Self {
        !*self
    }
}

impl SettingValue for String {
    fn wire(&self) -> String {
        self.clone()
    }

    fn parse_wire(raw: &str) -> Option<Self> {
        Some(raw.trim().to_string())
    }

    fn step(&self, _key: SettingKey, forward: bool) -> Self {
        let len = LED_PALETTE.len();
        let next = match LED_PALETTE.iter().position(|c| c.eq_ignore_ascii_case(self)) {
            Some(cur) if forward => (cur + 1) % len,
            Some(cur) => (cur + len - 1) % len,
            None => 0,
        };
        LED_PALETTE[next].to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl SettingValue for ColorRgb {
    fn wire(&self) -> String {
        format!("{},{},{}", self.r, self.g, self.b)
    }

    /// `r,g,b` or `r:g:b`.
    fn parse_wire(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split([',', ':']).map(|p| p.trim().parse::<u8>());
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(r)), Some(Ok(g)), Some(Ok(b)), None) => Some(Self { r, g, b }),
            _ => None,
        }
    }

    /// Moves all three channels together (0-100 per channel).
    fn step(&self, _key: SettingKey, forward: bool) -> Self {
        let shift = |c: u8| {
            if forward {
                c.saturating_add(5).min(100)
            } else {
                c.saturating_sub(5)
            }
        };
        Self {
            r: shift(self.r),
            g: shift(self.g),
            b: shift(self.b),
        }
    }
}

// ==========================================
// ENUMERATED MODES
// ==========================================

macro_rules! choice {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            /// Accepts the wire name or the numeric index `msigd --numeric` prints.
            pub fn parse(raw: &str) -> Option<Self> {
                let raw = raw.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(raw))
                    .or_else(|| raw.parse::<usize>().ok().and_then(|i| Self::ALL.get(i).copied()))
            }
        }

        impl SettingValue for $name {
            fn wire(&self) -> String {
                self.as_str().to_string()
            }

            fn parse_wire(raw: &str) -> Option<Self> {
                Self::parse(raw)
            }

            fn step(&self, _key: SettingKey, forward: bool) -> Self {
                let len = Self::ALL.len();
                let cur = Self::ALL.iter().position(|v| v == self).unwrap_or(0);
                let next = if forward { (cur + 1) % len } else { (cur + len - 1) % len };
                Self::ALL[next]
            }
        }
    };
}

choice!(ResponseTime {
    Normal => "normal",
    Fast => "fast",
    Fastest => "fastest",
});

choice!(ImageEnhancement {
    Off => "off",
    Weak => "weak",
    Medium => "medium",
    Strong => "strong",
    Strongest => "strongest",
});

choice!(ColorPreset {
    Cool => "cool",
    Normal => "normal",
    Warm => "warm",
    Custom => "custom",
});

choice!(NightVision {
    Off => "off",
    Normal => "normal",
    Strong => "strong",
    Strongest => "strongest",
    Ai => "ai",
});

choice!(
    /// OSD corner used by the refresh-rate overlay and the alarm clock.
    Position {
        LeftTop => "left_top",
        RightTop => "right_top",
        LeftBottom => "left_bottom",
        RightBottom => "right_bottom",
    }
);

choice!(ScreenAssistance {
    Off => "off",
    Red1 => "red1",
    Red2 => "red2",
    Red3 => "red3",
    Red4 => "red4",
    Red5 => "red5",
    Red6 => "red6",
    White1 => "white1",
    White2 => "white2",
    White3 => "white3",
    White4 => "white4",
    White5 => "white5",
    White6 => "white6",
});

choice!(AlarmClock {
    Off => "off",
    One => "1",
    Two => "2",
    Three => "3",
    Four => "4",
});

choice!(GameMode {
    User => "user",
    Fps => "fps",
    Racing => "racing",
    Rts => "rts",
    Rpg => "rpg",
    PremiumColor => "premium_color",
});

choice!(ProMode {
    User => "user",
    Reader => "reader",
    Cinema => "cinema",
    Designer => "designer",
    Office => "office",
    Srgb => "srgb",
    AdobeRgb => "adobe_rgb",
    DciP3 => "dci_p3",
    Eco => "eco",
    AntiBlue => "anti_blue",
    Movie => "movie",
});

choice!(InputSource {
    Hdmi1 => "hdmi1",
    Hdmi2 => "hdmi2",
    Dp => "dp",
    Usbc => "usbc",
});

choice!(ScreenSize {
    Auto => "auto",
    Ratio4x3 => "4:3",
    Ratio16x9 => "16:9",
    Ratio21x9 => "21:9",
    Ratio1x1 => "1:1",
    Size19 => "19",
    Size24 => "24",
});

choice!(PowerButton {
    Off => "off",
    Standby => "standby",
});

choice!(KvmMode {
    Auto => "auto",
    Upstream => "upstream",
    TypeC => "type_c",
});

choice!(AudioSource {
    Analog => "analog",
    Digital => "digital",
});

choice!(
    /// Mystic Light effect. The monitor accepts it but cannot report it back.
    LedMode {
        Off => "off",
        Static => "static",
        Breathing => "breathing",
        Blinking => "blinking",
        Flashing => "flashing",
        Blinds => "blinds",
        Meteor => "meteor",
        Rainbow => "rainbow",
        Random => "random",
    }
);

// ==========================================
// THE SETTINGS SNAPSHOT
// ==========================================

macro_rules! setting_fields {
    ($($field:ident: $ty:ty => $variant:ident, $label:literal, $msigd:literal, $tab:ident;)+) => {
        /// Full snapshot of one monitor's configurable state.
        ///
        /// Fields missing from a stored snapshot decode to their defaults, so
        /// older cache entries stay readable as fields are added.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        pub struct MonitorSettings {
            $(pub $field: $ty),+
        }

        /// Identifies one field of [`MonitorSettings`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub enum SettingKey {
            $($variant),+
        }

        /// A single field paired with its new value.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "key", content = "value", rename_all = "camelCase")]
        pub enum SettingUpdate {
            $($variant($ty)),+
        }

        impl SettingKey {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            /// Option name on the msigd command line.
            pub fn msigd_name(self) -> &'static str {
                match self {
                    $(Self::$variant => $msigd),+
                }
            }

            pub fn tab(self) -> Tab {
                match self {
                    $(Self::$variant => Tab::$tab),+
                }
            }
        }

        impl SettingUpdate {
            pub fn key(&self) -> SettingKey {
                match self {
                    $(Self::$variant(_) => SettingKey::$variant),+
                }
            }

            /// Value as passed to msigd.
            pub fn wire_value(&self) -> String {
                match self {
                    $(Self::$variant(v) => v.wire()),+
                }
            }

            /// Decodes a raw msigd value for `key`.
            pub fn parse(key: SettingKey, raw: &str) -> Option<Self> {
                match key {
                    $(SettingKey::$variant => <$ty as SettingValue>::parse_wire(raw).map(Self::$variant)),+
                }
            }

            pub fn stepped(&self, forward: bool) -> Self {
                match self {
                    $(Self::$variant(v) => Self::$variant(v.step(SettingKey::$variant, forward))),+
                }
            }
        }

        impl MonitorSettings {
            /// Shallow merge of one field.
            pub fn apply(&mut self, update: SettingUpdate) {
                match update {
                    $(SettingUpdate::$variant(v) => self.$field = v),+
                }
            }

            pub fn get(&self, key: SettingKey) -> SettingUpdate {
                match key {
                    $(SettingKey::$variant => SettingUpdate::$variant(self.$field.clone())),+
                }
            }
        }
    };
}

setting_fields! {
    brightness: u8 => Brightness, "Brightness", "brightness", Display;
    contrast: u8 => Contrast, "Contrast", "contrast", Display;
    sharpness: u8 => Sharpness, "Sharpness", "sharpness", Display;
    response_time: ResponseTime => ResponseTime, "Response Time", "response_time", Display;
    eye_saver: bool => EyeSaver, "Eye Saver", "eye_saver", Display;
    image_enhancement: ImageEnhancement => ImageEnhancement, "Image Enhancement", "image_enhancement", Display;
    hdcr: bool => Hdcr, "HDCR", "hdcr", Display;
    night_vision: NightVision => NightVision, "Night Vision", "night_vision", Display;
    black_tuner: u8 => BlackTuner, "Black Tuner", "black_tuner", Display;
    zero_latency: bool => ZeroLatency, "Zero Latency", "zero_latency", Display;
    free_sync: bool => FreeSync, "FreeSync", "free_sync", Display;
    color_preset: ColorPreset => ColorPreset, "Color Preset", "color_preset", Color;
    color_rgb: ColorRgb => ColorRgb, "Custom RGB", "color_rgb", Color;
    game_mode: GameMode => GameMode, "Game Mode", "game_mode", Color;
    pro_mode: ProMode => ProMode, "Pro Mode", "pro_mode", Color;
    led_mode: LedMode => LedMode, "LED Mode", "mystic", Led;
    led_color: String => LedColor, "LED Color", "mystic", Led;
    led_color2: String => LedColor2, "LED Color 2", "mystic", Led;
    rgb_led: bool => RgbLed, "RGB LED", "rgb_led", Led;
    refresh_rate_display: bool => RefreshRateDisplay, "Refresh Rate Display", "refresh_display", Advanced;
    refresh_position: Position => RefreshPosition, "Refresh Rate Position", "refresh_position", Advanced;
    osd_transparency: u8 => OsdTransparency, "OSD Transparency", "osd_transparency", Advanced;
    osd_timeout: u8 => OsdTimeout, "OSD Timeout", "osd_timeout", Advanced;
    screen_assistance: ScreenAssistance => ScreenAssistance, "Screen Assistance", "screen_assistance", Advanced;
    alarm_clock: AlarmClock => AlarmClock, "Alarm Clock", "alarm_clock", Advanced;
    alarm_position: Position => AlarmPosition, "Alarm Position", "alarm_position", Advanced;
    sound_enable: bool => SoundEnable, "Sound", "sound_enable", Advanced;
    input: InputSource => Input, "Input", "input", Advanced;
    auto_scan: bool => AutoScan, "Auto Scan", "auto_scan", Advanced;
    screen_info: bool => ScreenInfo, "Screen Info", "screen_info", Advanced;
    screen_size: ScreenSize => ScreenSize, "Screen Size", "screen_size", Advanced;
    power_button: PowerButton => PowerButton, "Power Button", "power_button", Advanced;
    hdmi_cec: bool => HdmiCec, "HDMI CEC", "hdmi_cec", Advanced;
    kvm: KvmMode => Kvm, "KVM", "kvm", Advanced;
    audio_source: AudioSource => AudioSource, "Audio Source", "audio_source", Advanced;
}

impl SettingKey {
    /// False for the LED fields: the monitor accepts them but never reports them.
    pub fn is_queryable(self) -> bool {
        !matches!(self, Self::LedMode | Self::LedColor | Self::LedColor2)
    }

    /// Bounds used when stepping numeric fields from the UI.
    pub fn range(self) -> (u8, u8) {
        match self {
            Self::Sharpness | Self::OsdTransparency => (0, 5),
            Self::OsdTimeout => (0, 30),
            Self::BlackTuner => (0, 20),
            _ => (0, 100),
        }
    }

    pub fn increment(self) -> u8 {
        match self {
            Self::Brightness | Self::Contrast => 5,
            _ => 1,
        }
    }

    pub fn for_tab(tab: Tab) -> impl Iterator<Item = SettingKey> {
        Self::ALL.iter().copied().filter(move |k| k.tab() == tab)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            brightness: 50,
            contrast: 50,
            sharpness: 0,
            response_time: ResponseTime::Normal,
            eye_saver: false,
            image_enhancement: ImageEnhancement::Off,
            hdcr: false,
            night_vision: NightVision::Off,
            black_tuner: 10,
            zero_latency: false,
            free_sync: false,
            color_preset: ColorPreset::Normal,
            color_rgb: ColorRgb { r: 50, g: 50, b: 50 },
            game_mode: GameMode::User,
            pro_mode: ProMode::User,
            led_mode: LedMode::Off,
            led_color: DEFAULT_LED_COLOR.to_string(),
            led_color2: DEFAULT_LED_COLOR2.to_string(),
            rgb_led: true,
            refresh_rate_display: false,
            refresh_position: Position::LeftTop,
            osd_transparency: 0,
            osd_timeout: 20,
            screen_assistance: ScreenAssistance::Off,
            alarm_clock: AlarmClock::Off,
            alarm_position: Position::LeftTop,
            sound_enable: true,
            input: InputSource::Hdmi1,
            auto_scan: true,
            screen_info: true,
            screen_size: ScreenSize::Auto,
            power_button: PowerButton::Off,
            hdmi_cec: false,
            kvm: KvmMode::Auto,
            audio_source: AudioSource::Analog,
        }
    }
}

// ==========================================
// NON-QUERYABLE LED STATE
// ==========================================

/// The LED fields of a snapshot. Only the local cache knows their real value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedSettings {
    pub mode: LedMode,
    pub color: String,
    pub color2: String,
}

impl Default for LedSettings {
    fn default() -> Self {
        Self {
            mode: LedMode::Off,
            color: DEFAULT_LED_COLOR.to_string(),
            color2: DEFAULT_LED_COLOR2.to_string(),
        }
    }
}

impl LedSettings {
    /// Argument for `msigd --mystic`: `all:<mode>:<rrggbb>,<rrggbb>`.
    pub fn mystic_arg(&self) -> String {
        let hex = |c: &str| c.trim_start_matches('#').to_ascii_lowercase();
        format!(
            "all:{}:{},{}",
            self.mode.as_str(),
            hex(&self.color),
            hex(&self.color2)
        )
    }
}

impl MonitorSettings {
    pub fn led(&self) -> LedSettings {
        LedSettings {
            mode: self.led_mode,
            color: self.led_color.clone(),
            color2: self.led_color2.clone(),
        }
    }

    /// Replaces the LED fields, leaving everything the hardware reported untouched.
    pub fn with_led(mut self, led: LedSettings) -> Self {
        self.led_mode = led.mode;
        self.led_color = led.color;
        self.led_color2 = led.color2;
        self
    }
}

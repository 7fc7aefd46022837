use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::monitor::EscalationPolicy;

/// Application settings (from config file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Port of the local session-context listener
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// Interval between automatic polls in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Consecutive failures before the indicator turns gray
    #[serde(default = "default_gray_mode_threshold")]
    pub gray_mode_threshold: u32,

    /// Consecutive failures before the auth-failure notification fires
    #[serde(default = "default_notification_threshold")]
    pub notification_threshold: u32,

    /// Timeout for a single fetch or greeting send in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,

    /// Proxy URL for outbound requests (empty = direct)
    #[serde(default)]
    pub proxy: String,

    /// Write logs to a file next to the config file
    #[serde(default = "default_file_logging")]
    pub enable_file_logging: bool,

    /// Low/zero quota notification settings
    #[serde(default)]
    pub low_value_notifications: LowValueSettings,

    /// Offline demo simulation settings
    #[serde(default)]
    pub demo_mode: DemoSettings,

    /// Scheduled greeting settings
    #[serde(default)]
    pub greeting: GreetingSettings,

    /// Work-hours window for automatic polls
    #[serde(default)]
    pub work_hours: WorkHoursSettings,
}

fn default_server_port() -> u16 {
    8383
}

fn default_poll_interval() -> u64 {
    60
}

fn default_gray_mode_threshold() -> u32 {
    5
}

fn default_notification_threshold() -> u32 {
    10
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_file_logging() -> bool {
    true
}

/// Low/zero quota notification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowValueSettings {
    #[serde(default = "default_low_value_enabled")]
    pub enabled: bool,

    /// Remaining percentage at or below which the low-quota notification fires
    #[serde(default = "default_low_value_threshold")]
    pub threshold: u8,

    /// Phrases for the low-quota notification
    #[serde(default = "default_low_phrases")]
    pub phrases: Vec<String>,

    /// Phrases for the zero-quota notification
    #[serde(default = "default_zero_phrases")]
    pub zero_phrases: Vec<String>,
}

fn default_low_value_enabled() -> bool {
    true
}

fn default_low_value_threshold() -> u8 {
    20
}

fn default_low_phrases() -> Vec<String> {
    [
        "Time to head home!",
        "The system is tired. So are you.",
        "Time for a break!",
        "The API says: enough for today!",
    ]
    .map(String::from)
    .to_vec()
}

fn default_zero_phrases() -> Vec<String> {
    [
        "That's it, all gone!",
        "Zero is not a number, it's a verdict.",
        "Game over!",
        "Quota exhausted!",
    ]
    .map(String::from)
    .to_vec()
}

impl Default for LowValueSettings {
    fn default() -> Self {
        Self {
            enabled: default_low_value_enabled(),
            threshold: default_low_value_threshold(),
            phrases: default_low_phrases(),
            zero_phrases: default_zero_phrases(),
        }
    }
}

/// Offline demo simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Length of one 100 -> 0 decline cycle in seconds
    #[serde(default = "default_demo_duration")]
    pub duration_seconds: u64,
}

fn default_demo_duration() -> u64 {
    60
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_seconds: default_demo_duration(),
        }
    }
}

impl DemoSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }
}

/// Scheduled greeting settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingSettings {
    /// `HH:MM` or a `m h * * *` cron expression; empty disables the greeting
    #[serde(default = "default_greeting_schedule")]
    pub schedule: String,

    /// Message text (defaults to "Ok" when empty)
    #[serde(default = "default_greeting_text")]
    pub text: String,

    /// Destination chat id; empty disables the greeting
    #[serde(default)]
    pub chat_id: String,
}

fn default_greeting_schedule() -> String {
    "0 8 * * *".to_string()
}

fn default_greeting_text() -> String {
    "Ok".to_string()
}

impl Default for GreetingSettings {
    fn default() -> Self {
        Self {
            schedule: default_greeting_schedule(),
            text: default_greeting_text(),
            chat_id: String::new(),
        }
    }
}

impl GreetingSettings {
    /// Both a schedule and a destination are required to arm the trigger
    pub fn is_configured(&self) -> bool {
        !self.schedule.trim().is_empty() && !self.chat_id.trim().is_empty()
    }

    pub fn text_or_default(&self) -> &str {
        if self.text.is_empty() {
            "Ok"
        } else {
            &self.text
        }
    }
}

/// Local time of day in `HH:MM` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|_| ConfigError::InvalidTime(s.to_string()))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.0.format("%H:%M").to_string()
    }
}

/// Work-hours window for automatic polls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkHoursSettings {
    #[serde(default = "default_work_hours_enabled")]
    pub enabled: bool,

    /// Window start (inclusive)
    #[serde(default = "default_work_start")]
    pub start: TimeOfDay,

    /// Window end (exclusive); earlier than `start` wraps past midnight
    #[serde(default = "default_work_end")]
    pub end: TimeOfDay,
}

fn default_work_hours_enabled() -> bool {
    true
}

fn default_work_start() -> TimeOfDay {
    TimeOfDay(NaiveTime::MIN + chrono::TimeDelta::hours(8))
}

fn default_work_end() -> TimeOfDay {
    TimeOfDay(NaiveTime::MIN + chrono::TimeDelta::hours(20))
}

impl Default for WorkHoursSettings {
    fn default() -> Self {
        Self {
            enabled: default_work_hours_enabled(),
            start: default_work_start(),
            end: default_work_end(),
        }
    }
}

impl WorkHoursSettings {
    /// Whether an automatic poll may run at the given local time of day.
    ///
    /// Always true when the window is disabled. `start == end` is an empty window.
    pub fn allows(&self, now: NaiveTime) -> bool {
        if !self.enabled {
            return true;
        }
        let (start, end) = (self.start.time(), self.end.time());
        if start <= end {
            now >= start && now < end
        } else {
            now >= start || now < end
        }
    }
}

/// Values forced from the command line; re-applied after every reload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub poll_interval_seconds: Option<u64>,
    pub demo: bool,
}

impl Overrides {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(interval) = self.poll_interval_seconds {
            settings.poll_interval_seconds = interval;
        }
        if self.demo {
            settings.demo_mode.enabled = true;
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_port: default_server_port(),
            poll_interval_seconds: default_poll_interval(),
            gray_mode_threshold: default_gray_mode_threshold(),
            notification_threshold: default_notification_threshold(),
            fetch_timeout_seconds: default_fetch_timeout(),
            proxy: String::new(),
            enable_file_logging: default_file_logging(),
            low_value_notifications: LowValueSettings::default(),
            demo_mode: DemoSettings::default(),
            greeting: GreetingSettings::default(),
            work_hours: WorkHoursSettings::default(),
        }
    }
}

impl Settings {
    /// Default config file location (`<config_dir>/quotamon/config.toml`)
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("quotamon").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load settings from a file, validating the result
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Settings =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate();
        Ok(settings)
    }

    /// Load settings, writing a default file first if none exists
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            Self::write_default(path)?;
            tracing::info!("Created default config file at {:?}", path);
        }
        Self::load_from(path)
    }

    /// Write the default settings to `path`, creating parent directories
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let write_err = |message: String| ConfigError::Write {
            path: path.to_path_buf(),
            message,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| write_err(e.to_string()))?;
        }
        let content =
            toml::to_string_pretty(&Settings::default()).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| write_err(e.to_string()))
    }

    /// Validate and normalize settings values
    ///
    /// Intervals, timeouts and thresholds have a minimum of 1 so that a zero
    /// in the file cannot spin the poll loop or disable escalation.
    pub fn validate(&mut self) {
        const MIN: u64 = 1;

        self.poll_interval_seconds = self.poll_interval_seconds.max(MIN);
        self.fetch_timeout_seconds = self.fetch_timeout_seconds.max(MIN);
        self.demo_mode.duration_seconds = self.demo_mode.duration_seconds.max(MIN);
        self.gray_mode_threshold = self.gray_mode_threshold.max(1);
        self.notification_threshold = self.notification_threshold.max(1);
        self.low_value_notifications.threshold = self.low_value_notifications.threshold.min(100);
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    /// Proxy URL, `None` when unset
    pub fn proxy(&self) -> Option<&str> {
        let proxy = self.proxy.trim();
        (!proxy.is_empty()).then_some(proxy)
    }

    pub fn escalation_policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            gray_mode_threshold: self.gray_mode_threshold,
            notification_threshold: self.notification_threshold,
        }
    }
}

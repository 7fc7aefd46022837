use serde::Serialize;

/// Remaining percentage above which the indicator is in the high band
const HIGH_BAND: u8 = 40;
/// Remaining percentage above which the indicator is in the mid band
const MID_BAND: u8 = 20;

/// Value shown on the indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "Option<u8>")]
pub enum DisplayValue {
    /// No data yet (no session, or nothing fetched)
    #[default]
    Unknown,
    Percent(u8),
}

impl DisplayValue {
    /// Short text drawn on the indicator
    pub fn glyph(&self) -> String {
        match self {
            DisplayValue::Unknown => "--".to_string(),
            DisplayValue::Percent(v) => v.to_string(),
        }
    }

    pub fn percent(&self) -> Option<u8> {
        match self {
            DisplayValue::Unknown => None,
            DisplayValue::Percent(v) => Some(*v),
        }
    }
}

impl From<DisplayValue> for Option<u8> {
    fn from(value: DisplayValue) -> Self {
        value.percent()
    }
}

/// Color band of the indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorCategory {
    NormalHigh,
    NormalMid,
    NormalLow,
    /// Gray: unknown value or sustained fetch failure
    Error,
}

impl ColorCategory {
    /// Band for a value when no error state applies
    pub fn for_value(value: DisplayValue) -> Self {
        match value {
            DisplayValue::Unknown => ColorCategory::Error,
            DisplayValue::Percent(v) if v > HIGH_BAND => ColorCategory::NormalHigh,
            DisplayValue::Percent(v) if v > MID_BAND => ColorCategory::NormalMid,
            DisplayValue::Percent(_) => ColorCategory::NormalLow,
        }
    }
}

/// Receiver of indicator updates (tray icon, status endpoint, ...)
pub trait DisplaySink: Send + Sync {
    fn update_display(&self, value: DisplayValue, color: ColorCategory, tooltip: &str);
}

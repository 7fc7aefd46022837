use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use quotamon_core::monitor::{ColorCategory, DisplaySink, DisplayValue};

/// What the indicator currently shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorState {
    pub value: DisplayValue,
    pub color: ColorCategory,
    pub glyph: String,
    pub tooltip: String,
    pub updated_at: Option<DateTime<Local>>,
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self {
            value: DisplayValue::Unknown,
            color: ColorCategory::Error,
            glyph: DisplayValue::Unknown.glyph(),
            tooltip: String::new(),
            updated_at: None,
        }
    }
}

/// Text indicator standing in for a tray icon
#[derive(Debug, Default)]
pub struct Indicator {
    state: RwLock<IndicatorState>,
}

impl Indicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IndicatorState {
        self.state.read().clone()
    }
}

impl DisplaySink for Indicator {
    fn update_display(&self, value: DisplayValue, color: ColorCategory, tooltip: &str) {
        let mut state = self.state.write();
        let changed = state.value != value || state.color != color;

        state.value = value;
        state.color = color;
        state.glyph = value.glyph();
        state.tooltip = tooltip.to_string();
        state.updated_at = Some(Local::now());

        if changed {
            info!(glyph = %state.glyph, color = ?color, "Indicator updated");
        } else {
            debug!(glyph = %state.glyph, "Indicator refreshed");
        }
    }
}

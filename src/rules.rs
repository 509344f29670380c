//! Engraving rules: every layout constant, in layout units unless noted.
//!
//! One layout unit is `unit_in_pixels` engine pixels. Distances handed to
//! and returned by the [`Engine`](crate::engine::Engine) are in pixels.

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngravingRules {
    // ── Units ───────────────────────────────────────────────────────────
    /// Engine pixels per layout unit.
    pub unit_in_pixels: f64,

    // ── Horizontal justification ────────────────────────────────────────
    /// Added to the engine's minimum width; its spacing is conservative.
    pub justification_margin: f64,
    /// Width of a measure column that holds no voices at all.
    pub default_measure_width: f64,
    /// Floor for any column that holds voices.
    pub min_measure_width: f64,
    pub measure_left_padding: f64,
    pub measure_right_padding: f64,

    // ── Page ────────────────────────────────────────────────────────────
    pub page_width: f64,
    pub page_left_margin: f64,
    pub page_right_margin: f64,
    pub page_top_margin: f64,
    pub title_top_distance: f64,
    pub sheet_title_height: f64,
    pub title_bottom_distance: f64,

    // ── Systems ─────────────────────────────────────────────────────────
    pub system_left_margin: f64,
    /// Vertical increment per staff line inside a system.
    pub staff_line_distance: f64,
    /// Gap between consecutive systems on a page.
    pub system_distance: f64,
    /// Single-staff simplified layout; vertical stacking is skipped.
    pub lead_sheet: bool,

    // ── Lyrics ──────────────────────────────────────────────────────────
    pub lyrics_height: f64,
    pub staff_height: f64,
    /// Estimated glyph width relative to the font height.
    pub lyrics_char_width_factor: f64,
}

impl Default for EngravingRules {
    fn default() -> Self {
        Self {
            unit_in_pixels: 10.0,
            justification_margin: 5.0,
            default_measure_width: 200.0,
            min_measure_width: 5.0,
            measure_left_padding: 1.4,
            measure_right_padding: 1.4,
            page_width: 210.0,
            page_left_margin: 5.0,
            page_right_margin: 5.0,
            page_top_margin: 5.0,
            title_top_distance: 9.0,
            sheet_title_height: 4.0,
            title_bottom_distance: 1.0,
            system_left_margin: 0.0,
            staff_line_distance: 10.0,
            system_distance: 5.0,
            lead_sheet: false,
            lyrics_height: 2.0,
            staff_height: 4.0,
            lyrics_char_width_factor: 0.55,
        }
    }
}

impl EngravingRules {
    /// Decode rules from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Vertical offset of the first system on every page.
    pub fn first_system_top(&self) -> f64 {
        self.page_top_margin + self.title_top_distance + self.sheet_title_height + self.title_bottom_distance
    }

    /// Width available to measures in one system.
    pub fn system_content_width(&self) -> f64 {
        self.page_width - self.page_left_margin - self.page_right_margin - self.system_left_margin
    }
}

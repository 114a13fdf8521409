//! Caption appearance.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where captions sit on screen, using the ASS numpad convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPosition {
    Bottom,
    #[default]
    Center,
    Top,
}

impl CaptionPosition {
    /// ASS `Alignment` value (2 = bottom center, 5 = middle center, 8 = top center).
    pub fn ass_alignment(&self) -> u8 {
        match self {
            CaptionPosition::Bottom => 2,
            CaptionPosition::Center => 5,
            CaptionPosition::Top => 8,
        }
    }
}

/// Visual style applied to burned-in captions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionStyle {
    /// Font family name
    #[serde(default = "default_font")]
    pub font: String,

    /// Font size in points
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Text colour as `RRGGBB`
    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_bold")]
    pub bold: bool,

    #[serde(default)]
    pub position: CaptionPosition,
}

fn default_font() -> String {
    "Arial".to_string()
}
fn default_font_size() -> u32 {
    50
}
fn default_color() -> String {
    "FFFF00".to_string()
}
fn default_bold() -> bool {
    true
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font: default_font(),
            font_size: default_font_size(),
            color: default_color(),
            bold: default_bold(),
            position: CaptionPosition::default(),
        }
    }
}

impl CaptionStyle {
    /// Colour in ASS `&HAABBGGRR` notation (fully opaque).
    ///
    /// Falls back to yellow when `color` is not a 6-digit hex value.
    pub fn ass_primary_colour(&self) -> String {
        let hex = self.color.trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return "&H0000FFFF".to_string();
        }
        let (r, g, b) = (&hex[0..2], &hex[2..4], &hex[4..6]);
        format!("&H00{}{}{}", b, g, r).to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_style_is_yellow_bold_centered() {
        let style = CaptionStyle::default();
        assert_eq!(style.font, "Arial");
        assert_eq!(style.font_size, 50);
        assert!(style.bold);
        assert_eq!(style.position.ass_alignment(), 5);
        assert_eq!(style.ass_primary_colour(), "&H0000FFFF");
    }

    #[test]
    fn test_ass_colour_is_bgr() {
        let style = CaptionStyle {
            color: "#112233".to_string(),
            ..Default::default()
        };
        assert_eq!(style.ass_primary_colour(), "&H00332211");
    }

    #[test]
    fn test_invalid_colour_falls_back() {
        let style = CaptionStyle {
            color: "yellow".to_string(),
            ..Default::default()
        };
        assert_eq!(style.ass_primary_colour(), "&H0000FFFF");
    }
}

use crate::error::NodeError;
use data_encoding::HEXLOWER_PERMISSIVE;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<&csscolorparser::Color> for Rgb {
    fn from(color: &csscolorparser::Color) -> Self {
        let [r, g, b, _a] = color.to_rgba8();
        Self { r, g, b }
    }
}

impl From<Rgb> for serde_json::Value {
    fn from(rgb: Rgb) -> Self {
        serde_json::json!({"r": rgb.r, "g": rgb.g, "b": rgb.b})
    }
}

/// Parses `#RRGGBB` (case-insensitive, `#` optional) into its channels
pub fn hex_to_rgb(hex: &str) -> Result<Rgb, NodeError> {
    let invalid = || NodeError::InvalidFormat(format!("Invalid hex color: {hex}"));

    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 {
        return Err(invalid());
    }

    match HEXLOWER_PERMISSIVE.decode(digits.as_bytes()) {
        Ok(bytes) => match bytes.as_slice() {
            [r, g, b] => Ok(Rgb::new(*r, *g, *b)),
            _ => Err(invalid()),
        },
        Err(_) => Err(invalid()),
    }
}

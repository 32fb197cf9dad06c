use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// A command name as advertised in a device's `supportCmds` list.
///
/// Names that we don't know about are kept verbatim in `Other`, so that
/// new firmware features don't break list parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum_macros::EnumString)]
pub enum SupportedCommand {
    #[strum(serialize = "turn")]
    Turn,
    #[strum(serialize = "brightness")]
    Brightness,
    #[strum(serialize = "color")]
    Color,
    #[strum(serialize = "colorTem")]
    ColorTem,
    #[strum(serialize = "mode")]
    Mode,
    #[strum(serialize = "gear")]
    Gear,
    #[strum(default)]
    Other(String),
}

impl SupportedCommand {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Turn => "turn",
            Self::Brightness => "brightness",
            Self::Color => "color",
            Self::ColorTem => "colorTem",
            Self::Mode => "mode",
            Self::Gear => "gear",
            Self::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Parse a command name. Unknown names land in `Other`.
    pub fn parse(name: &str) -> Self {
        Self::from_str(name).unwrap_or_else(|_| Self::Other(name.to_string()))
    }
}

impl std::fmt::Display for SupportedCommand {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl Serialize for SupportedCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SupportedCommand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::parse(&name))
    }
}

#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::EnumString,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OnOff {
    On,
    Off,
}

impl From<bool> for OnOff {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

/// The `cmd` member of a control request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub value: JsonValue,
}

impl Command {
    pub fn new<N: Into<String>, V: Into<JsonValue>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn turn(state: OnOff) -> Self {
        Self::new("turn", state.to_string())
    }
}

/// Interprets a free-form command value the way a user would expect
/// when typing into a text field: JSON if it parses, otherwise the
/// literal string.
pub fn parse_generic_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

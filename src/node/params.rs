use crate::color::{hex_to_rgb, Rgb};
use crate::command::{parse_generic_value, Command, OnOff, SupportedCommand};
use crate::error::NodeError;
use crate::node::Resource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

const DEFAULT_BRIGHTNESS: u64 = 100;
const DEFAULT_COLOR_TEMPERATURE: u64 = 5000;
const DEFAULT_MODE: i64 = 1;
const DEFAULT_CHANNEL: u8 = 255;

const INVALID_COMMANDS_JSON: &str =
    r#"Invalid JSON in Commands field. Expected an array like: [{"name": "turn", "value": "on"}]"#;

/// The named parameters of a single input item.
///
/// Retrieval is typed and per-item: a missing or malformed parameter
/// fails only the item that carries it.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct ItemParameters(JsonMap<String, JsonValue>);

impl ItemParameters {
    pub fn raw(&self, name: &str) -> Option<&JsonValue> {
        match self.0.get(name) {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(value),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, name: &'static str) -> Result<Option<T>, NodeError> {
        match self.raw(name) {
            None => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|err| NodeError::InvalidParameter {
                    name,
                    message: err.to_string(),
                }),
        }
    }

    pub fn get_or<T: DeserializeOwned>(&self, name: &'static str, default: T) -> Result<T, NodeError> {
        Ok(self.get(name)?.unwrap_or(default))
    }

    pub fn required<T: DeserializeOwned>(&self, name: &'static str) -> Result<T, NodeError> {
        self.get(name)?.ok_or(NodeError::MissingParameter(name))
    }

    /// `options.validateCommand`
    pub fn validate_command(&self) -> Result<bool, NodeError> {
        #[derive(Deserialize, Default)]
        struct ControlOptions {
            #[serde(rename = "validateCommand", default)]
            validate_command: bool,
        }

        let options: ControlOptions = self.get_or("options", ControlOptions::default())?;
        Ok(options.validate_command)
    }

    /// The command to send for a `control` operation, with its value taken
    /// from the parameter dedicated to that command.
    pub fn control_command(&self, resource: Resource) -> Result<Command, NodeError> {
        let name: String = self.get_or("command", "turn".to_string())?;

        let value: JsonValue = match (resource, SupportedCommand::parse(&name)) {
            (_, SupportedCommand::Turn) => {
                return Ok(Command::turn(self.get_or("turnValue", OnOff::On)?));
            }
            (Resource::Device, SupportedCommand::Brightness) => {
                self.get_or("brightnessValue", DEFAULT_BRIGHTNESS)?.into()
            }
            (Resource::Device, SupportedCommand::Color) => self.color()?.into(),
            (Resource::Device, SupportedCommand::ColorTem) => self
                .get_or("colorTemValue", DEFAULT_COLOR_TEMPERATURE)?
                .into(),
            (Resource::Appliance, SupportedCommand::Mode) => {
                self.get_or("modeValue", DEFAULT_MODE)?.into()
            }
            _ => self.generic_value(),
        };

        Ok(Command::new(name, value))
    }

    fn color(&self) -> Result<Rgb, NodeError> {
        match self.get::<String>("colorValue")? {
            Some(hex) => hex_to_rgb(&hex),
            None => Ok(Rgb::new(
                self.get_or("colorR", DEFAULT_CHANNEL)?,
                self.get_or("colorG", DEFAULT_CHANNEL)?,
                self.get_or("colorB", DEFAULT_CHANNEL)?,
            )),
        }
    }

    fn generic_value(&self) -> JsonValue {
        match self.raw("genericCommandValue") {
            None => JsonValue::String(String::new()),
            Some(JsonValue::String(text)) => parse_generic_value(text),
            Some(value) => value.clone(),
        }
    }

    /// The `commands` list of a `multiControl` operation; either a JSON
    /// text or an already decoded array.
    pub fn commands(&self) -> Result<Vec<Command>, NodeError> {
        let value: JsonValue = match self.raw("commands") {
            None => return Err(NodeError::MissingParameter("commands")),
            Some(JsonValue::String(text)) => serde_json::from_str(text)
                .map_err(|_| NodeError::InvalidFormat(INVALID_COMMANDS_JSON.to_string()))?,
            Some(value) => value.clone(),
        };

        let JsonValue::Array(entries) = value else {
            return Err(NodeError::InvalidFormat(
                "Commands must be a JSON array".to_string(),
            ));
        };

        entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                serde_json::from_value(entry).map_err(|err| {
                    NodeError::InvalidFormat(format!(
                        "Command #{idx} must look like {{\"name\": \"turn\", \"value\": \"on\"}}: {err}"
                    ))
                })
            })
            .collect()
    }
}

impl From<JsonMap<String, JsonValue>> for ItemParameters {
    fn from(map: JsonMap<String, JsonValue>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
pub(crate) fn params(value: JsonValue) -> ItemParameters {
    match value {
        JsonValue::Object(map) => map.into(),
        other => panic!("item parameters must be an object, got {other}"),
    }
}

use crate::error::NodeError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

pub mod execute;
pub mod load_options;
pub mod params;

pub use params::ItemParameters;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::EnumString,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Resource {
    Device,
    Appliance,
}

impl Resource {
    /// Capitalized name for use at the start of a message
    pub fn label(&self) -> &'static str {
        match self {
            Self::Device => "Device",
            Self::Appliance => "Appliance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "camelCase")]
pub enum DeviceOperation {
    GetAll,
    Get,
    GetState,
    GetCapabilities,
    Control,
    MultiControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "camelCase")]
pub enum ApplianceOperation {
    GetAll,
    Control,
}

/// Every (resource, operation) pair that we know how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOperation {
    Device(DeviceOperation),
    Appliance(ApplianceOperation),
}

impl NodeOperation {
    pub fn parse(resource: &str, operation: &str) -> Result<Self, NodeError> {
        let unknown_operation = |_| NodeError::UnknownOperation(operation.to_string());

        match Resource::from_str(resource)
            .map_err(|_| NodeError::UnknownResource(resource.to_string()))?
        {
            Resource::Device => DeviceOperation::from_str(operation)
                .map(Self::Device)
                .map_err(unknown_operation),
            Resource::Appliance => ApplianceOperation::from_str(operation)
                .map(Self::Appliance)
                .map_err(unknown_operation),
        }
    }
}

impl std::fmt::Display for NodeOperation {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Device(op) => write!(fmt, "device: {op}"),
            Self::Appliance(op) => write!(fmt, "appliance: {op}"),
        }
    }
}

fn default_resource() -> String {
    Resource::Device.to_string()
}

fn default_operation() -> String {
    DeviceOperation::GetAll.to_string()
}

/// One execution: the operation is chosen once for the whole batch,
/// while every item carries its own parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(default = "default_resource")]
    pub resource: String,
    #[serde(default = "default_operation")]
    pub operation: String,
    #[serde(default)]
    pub continue_on_fail: bool,
    #[serde(default)]
    pub items: Vec<ItemParameters>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedItem {
    pub item: usize,
}

/// An output row, linked back to the input item that produced it
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub json: JsonValue,
    pub paired_item: PairedItem,
}

impl ExecutionRecord {
    pub fn new(json: JsonValue, item: usize) -> Self {
        Self {
            json,
            paired_item: PairedItem { item },
        }
    }

    pub fn error(err: &NodeError, item: usize) -> Self {
        Self::new(serde_json::json!({ "error": err.to_string() }), item)
    }

    pub fn is_error(&self) -> bool {
        self.json.get("error").is_some()
    }
}

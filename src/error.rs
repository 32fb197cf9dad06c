use crate::node::Resource;
use serde_json::Value as JsonValue;

/// Failure talking to the Govee REST API.
///
/// Every variant keeps the request URL so that the error message alone
/// is enough to tell which call failed; `Status` additionally keeps the
/// upstream payload for diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request {url} status {status}: {reason}. Response body: {body}")]
    Status {
        url: String,
        status: u16,
        reason: String,
        body: String,
        payload: Option<JsonValue>,
    },

    #[error("parsing {url} response: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    /// The HTTP status code, if the server responded at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Decode { .. } => None,
        }
    }

    /// The `message` field of the upstream error payload, if any
    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            Self::Status {
                payload: Some(payload),
                ..
            } => payload.get("message").and_then(|m| m.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("{} with MAC address \"{id}\" not found", .resource.label())]
    NotFound { resource: Resource, id: String },

    #[error(
        "{} \"{device}\" does not support the \"{command}\" command. Supported: {}",
        .resource.label(),
        .supported.join(", ")
    )]
    NotSupported {
        resource: Resource,
        device: String,
        command: String,
        supported: Vec<String>,
    },

    #[error("{0}")]
    InvalidFormat(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Missing required parameter \"{0}\"")]
    MissingParameter(&'static str),

    #[error("Parameter \"{name}\" is invalid: {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error(transparent)]
    RemoteApi(#[from] ApiError),

    #[error("encoding output record: {0}")]
    Output(#[from] serde_json::Error),
}

/// A batch aborted because an item failed and continue-on-fail was off
#[derive(Debug, thiserror::Error)]
#[error("item {item}: {source}")]
pub struct BatchError {
    pub item: usize,
    #[source]
    pub source: NodeError,
}

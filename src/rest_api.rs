use crate::command::{Command, SupportedCommand};
use crate::error::ApiError;
use crate::opt_env_var;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

// This file implements the Govee developer REST API as described in:
// <https://govee-public.s3.amazonaws.com/developer-docs/GoveeDeveloperAPIReference.pdf>

pub const SERVER: &str = "https://developer-api.govee.com";
const API_KEY_HEADER: &str = "Govee-API-Key";

#[derive(clap::Parser, Debug)]
pub struct GoveeApiArguments {
    /// The Govee API Key. If not passed here, it will be read from
    /// the GOVEE_API_KEY environment variable.
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Override the API server. If not passed here, it will be read
    /// from the GOVEE_API_URL environment variable, falling back to
    /// the public Govee endpoint.
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

impl GoveeApiArguments {
    pub fn opt_api_key(&self) -> anyhow::Result<Option<String>> {
        match &self.api_key {
            Some(key) => Ok(Some(key.to_string())),
            None => opt_env_var("GOVEE_API_KEY"),
        }
    }

    pub fn api_key(&self) -> anyhow::Result<String> {
        self.opt_api_key()?.ok_or_else(|| {
            anyhow::anyhow!(
                "Please specify the api key either via the \
                --api-key parameter or by setting $GOVEE_API_KEY"
            )
        })
    }

    pub fn api_url(&self) -> anyhow::Result<String> {
        match &self.api_url {
            Some(url) => Ok(url.to_string()),
            None => Ok(opt_env_var("GOVEE_API_URL")?.unwrap_or_else(|| SERVER.to_string())),
        }
    }

    pub fn api_client(&self) -> anyhow::Result<RestApiClient> {
        let key = self.api_key()?;
        let url = self.api_url()?;
        Ok(RestApiClient::with_server(key, url))
    }
}

#[derive(Clone)]
pub struct RestApiClient {
    key: String,
    server: String,
    client: reqwest::Client,
}

impl RestApiClient {
    pub fn with_server<K: Into<String>, S: Into<String>>(key: K, server: S) -> Self {
        let server: String = server.into();
        Self {
            key: key.into(),
            server: server.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server)
    }

    pub async fn list_devices(&self) -> Result<Vec<RestDeviceInfo>, ApiError> {
        let resp: GetDevicesResponse = self.get_request_with_json_response("/v1/devices", &[]).await?;
        note_unknown_commands(&resp.data.devices);
        Ok(resp.data.devices)
    }

    pub async fn list_appliances(&self) -> Result<Vec<RestDeviceInfo>, ApiError> {
        let resp: GetDevicesResponse = self
            .get_request_with_json_response("/v1/appliance/devices", &[])
            .await?;
        note_unknown_commands(&resp.data.devices);
        Ok(resp.data.devices)
    }

    pub async fn get_device_state(
        &self,
        device: &str,
        model: &str,
    ) -> Result<RestDeviceState, ApiError> {
        let resp: GetDeviceStateResponse = self
            .get_request_with_json_response(
                "/v1/devices/state",
                &[("device", device), ("model", model)],
            )
            .await?;
        Ok(resp.data)
    }

    pub async fn control_device(
        &self,
        device: &str,
        model: &str,
        cmd: &Command,
    ) -> Result<ControlResponse, ApiError> {
        self.control("/v1/devices/control", device, model, cmd).await
    }

    pub async fn control_appliance(
        &self,
        device: &str,
        model: &str,
        cmd: &Command,
    ) -> Result<ControlResponse, ApiError> {
        self.control("/v1/appliance/devices/control", device, model, cmd)
            .await
    }

    async fn control(
        &self,
        path: &str,
        device: &str,
        model: &str,
        cmd: &Command,
    ) -> Result<ControlResponse, ApiError> {
        let request = ControlRequest { device, model, cmd };
        let resp: ControlResponse = self
            .request_with_json_response(Method::PUT, path, &request)
            .await?;

        log::trace!("{} response: {resp:?}", cmd.name);

        Ok(resp)
    }

    /// Verifies that the key is accepted by issuing the cheapest
    /// authenticated call there is.
    pub async fn check_credentials(&self) -> Result<(), ApiError> {
        let _: JsonValue = self.get_request_with_json_response("/v1/devices", &[]).await?;
        Ok(())
    }

    async fn get_request_with_json_response<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<R, ApiError> {
        self.send(Method::GET, path, None::<&()>, query).await
    }

    async fn request_with_json_response<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        self.send(method, path, Some(body), &[]).await
    }

    async fn send<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> Result<R, ApiError> {
        let url = self.endpoint(path);
        log::debug!("{method} {url}");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(API_KEY_HEADER, &self.key);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;

        if let Some(limits) = RateLimitStatus::from_headers(response.headers()) {
            log::debug!("{method} {path}: {limits}");
        }

        http_response_body(response).await
    }
}

fn note_unknown_commands(devices: &[RestDeviceInfo]) {
    for device in devices {
        for cmd in device.supported_commands.iter().filter(|cmd| !cmd.is_known()) {
            log::debug!("{} {} advertises unfamiliar command {cmd}", device.model, device.device);
        }
    }
}

/// Decode `text` as `T`, reporting the JSON path of any mismatch
pub fn from_json<T: DeserializeOwned, S: AsRef<[u8]>>(text: S) -> Result<T, String> {
    let text = text.as_ref();
    serde_json_path_to_error::from_slice(text)
        .map_err(|err| format!("{err}. Input: {}", String::from_utf8_lossy(text)))
}

pub async fn http_response_body<R: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<R, ApiError> {
    let url = response.url().to_string();
    let status = response.status();

    let data = response
        .bytes()
        .await
        .map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
    log::trace!("{url} {status}: {}", String::from_utf8_lossy(&data));

    if !status.is_success() {
        return Err(ApiError::Status {
            url,
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body: String::from_utf8_lossy(&data).to_string(),
            payload: serde_json::from_slice(&data).ok(),
        });
    }

    from_json(&data).map_err(|message| ApiError::Decode { url, message })
}

/// The quota headers that Govee attaches to its responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub remaining: u64,
    pub limit: Option<u64>,
    pub reset: Option<DateTime<Utc>>,
}

impl RateLimitStatus {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        fn number(headers: &HeaderMap, name: &str) -> Option<u64> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        }

        let remaining = number(headers, "API-RateLimit-Remaining")
            .or_else(|| number(headers, "X-RateLimit-Remaining"))?;
        let limit = number(headers, "API-RateLimit-Limit")
            .or_else(|| number(headers, "X-RateLimit-Limit"));
        let reset = number(headers, "API-RateLimit-Reset")
            .or_else(|| number(headers, "X-RateLimit-Reset"))
            .and_then(|secs| DateTime::from_timestamp(i64::try_from(secs).ok()?, 0));

        Some(Self {
            remaining,
            limit,
            reset,
        })
    }
}

impl std::fmt::Display for RateLimitStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "rate limit remaining {}", self.remaining)?;
        if let Some(limit) = self.limit {
            write!(fmt, "/{limit}")?;
        }
        if let Some(reset) = &self.reset {
            write!(fmt, ", resets at {}", reset.to_rfc3339())?;
        }
        Ok(())
    }
}

#[derive(Serialize, Debug)]
struct ControlRequest<'a> {
    device: &'a str,
    model: &'a str,
    cmd: &'a Command,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
/// The control reply envelope. Fields beyond `code`/`message`/`data`
/// are kept so that the record reflects the whole reply.
pub struct ControlResponse {
    #[serde(default)]
    pub code: u32,
    #[serde(alias = "msg", default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(flatten)]
    pub extras: JsonMap<String, JsonValue>,
}

#[derive(Deserialize, Serialize, Debug)]
struct GetDevicesResponse {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: GetDevicesDeviceList,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
struct GetDevicesDeviceList {
    #[serde(default)]
    devices: Vec<RestDeviceInfo>,
}

#[derive(Deserialize, Serialize, Debug)]
struct GetDeviceStateResponse {
    code: u32,
    message: String,
    data: RestDeviceState,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RestDeviceState {
    pub device: String,
    pub model: String,
    /// A list of single-entry objects such as `{"powerState": "on"}`
    #[serde(default)]
    pub properties: Vec<JsonMap<String, JsonValue>>,
    #[serde(flatten)]
    pub extras: JsonMap<String, JsonValue>,
}

/// A device or appliance as returned by the list endpoints
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RestDeviceInfo {
    pub device: String,
    pub model: String,
    #[serde(rename = "deviceName", default)]
    pub device_name: String,
    #[serde(default)]
    pub controllable: bool,
    #[serde(default)]
    pub retrievable: bool,
    #[serde(rename = "supportCmds", default)]
    pub supported_commands: Vec<SupportedCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<RestDeviceProperties>,
    #[serde(flatten)]
    pub extras: JsonMap<String, JsonValue>,
}

impl RestDeviceInfo {
    pub fn supports(&self, command: &str) -> bool {
        self.supported_commands
            .iter()
            .any(|cmd| cmd.as_str() == command)
    }

    pub fn supported_command_names(&self) -> Vec<String> {
        self.supported_commands
            .iter()
            .map(|cmd| cmd.to_string())
            .collect()
    }

    pub fn mode_options(&self) -> &[ModeOption] {
        self.properties
            .as_ref()
            .and_then(|p| p.mode.as_ref())
            .map(|mode| mode.options.as_slice())
            .unwrap_or_default()
    }

    pub fn color_temperature_range(&self) -> Option<RestRange> {
        self.properties
            .as_ref()?
            .color_temperature
            .as_ref()
            .map(|c| c.range)
    }
}

#[derive(Default, Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RestDeviceProperties {
    #[serde(rename = "colorTem", default, skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<ColorTemperatureProperties>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ModeProperties>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gear: Option<JsonValue>,

    #[serde(flatten)]
    pub extras: JsonMap<String, JsonValue>,
}

#[derive(Default, Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ColorTemperatureProperties {
    pub range: RestRange,
}

#[derive(Default, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestRange {
    pub min: i64,
    pub max: i64,
}

#[derive(Default, Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModeProperties {
    #[serde(default)]
    pub options: Vec<ModeOption>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModeOption {
    pub name: String,
    pub value: JsonValue,
}

use crate::cache::ListCache;
use crate::command::SupportedCommand;
use crate::error::{BatchError, NodeError};
use crate::node::{
    ApplianceOperation, Batch, DeviceOperation, ExecutionRecord, ItemParameters, NodeOperation,
    Resource,
};
use crate::rest_api::{ControlResponse, RestApiClient, RestDeviceInfo, RestDeviceProperties};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// The subset of a device record reported by `getCapabilities`
#[derive(Serialize, Debug)]
struct Capabilities<'a> {
    device: &'a str,
    #[serde(rename = "deviceName")]
    device_name: &'a str,
    model: &'a str,
    controllable: bool,
    retrievable: bool,
    #[serde(rename = "supportCmds")]
    supported_commands: &'a [SupportedCommand],
    #[serde(skip_serializing_if = "Option::is_none")]
    properties: Option<&'a RestDeviceProperties>,
}

impl<'a> From<&'a RestDeviceInfo> for Capabilities<'a> {
    fn from(info: &'a RestDeviceInfo) -> Self {
        Self {
            device: &info.device,
            device_name: &info.device_name,
            model: &info.model,
            controllable: info.controllable,
            retrievable: info.retrievable,
            supported_commands: &info.supported_commands,
            properties: info.properties.as_ref(),
        }
    }
}

fn to_records<T: Serialize>(items: &[T]) -> Result<Vec<JsonValue>, NodeError> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(NodeError::from))
        .collect()
}

fn tag_with_command(response: &ControlResponse, command: &str) -> Result<JsonValue, NodeError> {
    let mut record = serde_json::to_value(response)?;
    if let Some(obj) = record.as_object_mut() {
        obj.insert("_command".to_string(), command.into());
    }
    Ok(record)
}

/// Fails with `NotSupported` when `device` is known and does not list
/// every one of `commands` in its `supportCmds`.
/// A device that is absent from the list is not validated.
pub async fn ensure_supported<'c>(
    cache: &mut ListCache<'_>,
    resource: Resource,
    device: &str,
    commands: impl IntoIterator<Item = &'c str>,
) -> Result<(), NodeError> {
    let Some(info) = cache.find(resource, device).await? else {
        log::warn!(
            "{} {device} is not in the {resource} list; not validating commands",
            resource.label()
        );
        return Ok(());
    };

    for command in commands {
        if !info.supports(command) {
            return Err(NodeError::NotSupported {
                resource,
                device: device.to_string(),
                command: command.to_string(),
                supported: info.supported_command_names(),
            });
        }
    }
    Ok(())
}

/// Runs the items of one batch in order against the Govee API.
/// `execute` consumes the executor, so the list cache lives exactly as
/// long as the batch.
pub struct Executor<'a> {
    client: &'a RestApiClient,
    cache: ListCache<'a>,
}

impl<'a> Executor<'a> {
    pub fn new(client: &'a RestApiClient) -> Self {
        Self {
            client,
            cache: ListCache::new(client),
        }
    }

    pub async fn execute(mut self, batch: &Batch) -> Result<Vec<ExecutionRecord>, BatchError> {
        let mut records = vec![];

        for (item, params) in batch.items.iter().enumerate() {
            let result = match NodeOperation::parse(&batch.resource, &batch.operation) {
                Ok(op) => self.run(op, params).await,
                Err(err) => Err(err),
            };

            match result {
                Ok(values) => {
                    records.extend(values.into_iter().map(|json| ExecutionRecord::new(json, item)))
                }
                Err(err) if batch.continue_on_fail => {
                    log::warn!("item {item}: {err:#}");
                    records.push(ExecutionRecord::error(&err, item));
                }
                Err(source) => return Err(BatchError { item, source }),
            }
        }

        Ok(records)
    }

    async fn run(
        &mut self,
        op: NodeOperation,
        params: &ItemParameters,
    ) -> Result<Vec<JsonValue>, NodeError> {
        log::debug!("running {op}");
        match op {
            NodeOperation::Device(DeviceOperation::GetAll) => {
                to_records(self.cache.devices().await?)
            }
            NodeOperation::Device(DeviceOperation::Get) => {
                let id: String = params.required("device")?;
                let device = self.lookup(Resource::Device, &id).await?;
                Ok(vec![serde_json::to_value(device)?])
            }
            NodeOperation::Device(DeviceOperation::GetState) => {
                let device: String = params.required("device")?;
                let model: String = params.required("model")?;
                let state = self.client.get_device_state(&device, &model).await?;
                Ok(vec![serde_json::to_value(state)?])
            }
            NodeOperation::Device(DeviceOperation::GetCapabilities) => {
                let id = params
                    .get::<String>("device")?
                    .filter(|id| !id.is_empty());
                match id {
                    Some(id) => {
                        let device = self.lookup(Resource::Device, &id).await?;
                        Ok(vec![serde_json::to_value(Capabilities::from(device))?])
                    }
                    None => {
                        let caps: Vec<Capabilities> =
                            self.cache.devices().await?.iter().map(Capabilities::from).collect();
                        to_records(&caps)
                    }
                }
            }
            NodeOperation::Device(DeviceOperation::Control) => {
                self.control(Resource::Device, params).await
            }
            NodeOperation::Device(DeviceOperation::MultiControl) => {
                self.multi_control(params).await
            }
            NodeOperation::Appliance(ApplianceOperation::GetAll) => {
                to_records(self.cache.appliances().await?)
            }
            NodeOperation::Appliance(ApplianceOperation::Control) => {
                self.control(Resource::Appliance, params).await
            }
        }
    }

    async fn lookup(&mut self, resource: Resource, id: &str) -> Result<&RestDeviceInfo, NodeError> {
        self.cache
            .find(resource, id)
            .await?
            .ok_or_else(|| NodeError::NotFound {
                resource,
                id: id.to_string(),
            })
    }

    async fn control(
        &mut self,
        resource: Resource,
        params: &ItemParameters,
    ) -> Result<Vec<JsonValue>, NodeError> {
        let device: String = params.required("device")?;
        let model: String = params.required("model")?;

        if params.validate_command()? {
            let name: String = params.get_or("command", "turn".to_string())?;
            ensure_supported(&mut self.cache, resource, &device, [name.as_str()]).await?;
        }

        let cmd = params.control_command(resource)?;
        let response = match resource {
            Resource::Device => self.client.control_device(&device, &model, &cmd).await?,
            Resource::Appliance => self.client.control_appliance(&device, &model, &cmd).await?,
        };
        Ok(vec![serde_json::to_value(response)?])
    }

    async fn multi_control(&mut self, params: &ItemParameters) -> Result<Vec<JsonValue>, NodeError> {
        let device: String = params.required("device")?;
        let model: String = params.required("model")?;
        let commands = params.commands()?;

        if params.validate_command()? {
            ensure_supported(
                &mut self.cache,
                Resource::Device,
                &device,
                commands.iter().map(|cmd| cmd.name.as_str()),
            )
            .await?;
        }

        let mut results = Vec::with_capacity(commands.len());
        for cmd in &commands {
            let response = self.client.control_device(&device, &model, cmd).await?;
            results.push(tag_with_command(&response, &cmd.name)?);
        }
        Ok(results)
    }
}

/// Executes `batch` with a fresh list cache
pub async fn execute_batch(
    client: &RestApiClient,
    batch: &Batch,
) -> Result<Vec<ExecutionRecord>, BatchError> {
    Executor::new(client).execute(batch).await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::params::params;
    use mockito::{Matcher, Mock, ServerGuard};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const LIST_DEVICES: &str = include_str!("../../test-data/rest-list-devices.json");
    const LIST_APPLIANCES: &str = include_str!("../../test-data/rest-appliances.json");
    const CONTROL_OK: &str = r#"{"code":200,"message":"Success","data":{}}"#;
    const STRIP: &str = "99:E5:A4:C1:38:29:DA:7B";
    const PLUG: &str = "7C:A6:D4:AD:FC:5C:B6:F1";

    async fn mock_device_list(server: &mut ServerGuard) -> Mock {
        mock_device_list_times(server, 1).await
    }

    async fn mock_device_list_times(server: &mut ServerGuard, hits: usize) -> Mock {
        server
            .mock("GET", "/v1/devices")
            .with_status(200)
            .with_body(LIST_DEVICES)
            .expect(hits)
            .create_async()
            .await
    }

    async fn mock_control(server: &mut ServerGuard, path: &str, body: JsonValue) -> Mock {
        server
            .mock("PUT", path)
            .match_body(Matcher::Json(body))
            .with_status(200)
            .with_body(CONTROL_OK)
            .expect(1)
            .create_async()
            .await
    }

    fn batch(operation: &str, continue_on_fail: bool, items: Vec<JsonValue>) -> Batch {
        Batch {
            resource: "device".to_string(),
            operation: operation.to_string(),
            continue_on_fail,
            items: items.into_iter().map(params).collect(),
        }
    }

    fn payloads(records: &[ExecutionRecord]) -> Vec<JsonValue> {
        records.iter().map(|r| r.json.clone()).collect()
    }

    #[tokio::test]
    async fn get_all_then_get() {
        let mut server = mockito::Server::new_async().await;
        // One list request per batch, shared by every item of that batch
        let list = mock_device_list_times(&mut server, 2).await;
        let client = RestApiClient::with_server("key", server.url());

        let all = execute_batch(&client, &batch("getAll", false, vec![json!({})]))
            .await
            .unwrap();
        k9::assert_equal!(all.len(), 3);
        assert!(all.iter().all(|r| r.paired_item.item == 0));

        let lookups = all
            .iter()
            .map(|r| json!({"device": r.json["device"].clone()}))
            .collect();
        let got = execute_batch(&client, &batch("get", false, lookups))
            .await
            .unwrap();
        k9::assert_equal!(payloads(&got), payloads(&all));
        let items: Vec<_> = got.iter().map(|r| r.paired_item.item).collect();
        k9::assert_equal!(items, vec![0, 1, 2]);

        list.assert_async().await;
    }

    #[tokio::test]
    async fn lists_are_refetched_for_each_batch() {
        let mut server = mockito::Server::new_async().await;
        let list = mock_device_list_times(&mut server, 3).await;
        let client = RestApiClient::with_server("key", server.url());
        let lookup = batch("get", false, vec![json!({"device": STRIP}), json!({"device": PLUG})]);

        for _ in 0..3 {
            let records = execute_batch(&client, &lookup).await.unwrap();
            k9::assert_equal!(records.len(), 2);
        }

        list.assert_async().await;
    }

    #[tokio::test]
    async fn get_unknown_device() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_device_list(&mut server).await;
        let client = RestApiClient::with_server("key", server.url());

        let err = execute_batch(
            &client,
            &batch("get", false, vec![json!({"device": "00:11"})]),
        )
        .await
        .unwrap_err();

        k9::assert_equal!(err.item, 0);
        assert!(matches!(
            err.source,
            NodeError::NotFound {
                resource: Resource::Device,
                ..
            }
        ));
        k9::assert_equal!(
            err.to_string(),
            "item 0: Device with MAC address \"00:11\" not found"
        );
    }

    #[tokio::test]
    async fn get_state() {
        let mut server = mockito::Server::new_async().await;
        let state = server
            .mock("GET", "/v1/devices/state")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("device".into(), STRIP.into()),
                Matcher::UrlEncoded("model".into(), "H6159".into()),
            ]))
            .with_status(200)
            .with_body(include_str!("../../test-data/rest-device-state.json"))
            .create_async()
            .await;
        let client = RestApiClient::with_server("key", server.url());

        let records = execute_batch(
            &client,
            &batch("getState", false, vec![json!({"device": STRIP, "model": "H6159"})]),
        )
        .await
        .unwrap();

        state.assert_async().await;
        k9::assert_equal!(
            payloads(&records),
            vec![json!({
                "device": STRIP,
                "model": "H6159",
                "properties": [
                    {"online": "true"},
                    {"powerState": "on"},
                    {"brightness": 82},
                    {"color": {"r": 255, "g": 0, "b": 136}},
                ],
            })]
        );
    }

    #[tokio::test]
    async fn get_capabilities() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_device_list_times(&mut server, 2).await;
        let client = RestApiClient::with_server("key", server.url());

        let one = execute_batch(
            &client,
            &batch("getCapabilities", false, vec![json!({"device": PLUG})]),
        )
        .await
        .unwrap();
        k9::assert_equal!(
            payloads(&one),
            vec![json!({
                "device": PLUG,
                "deviceName": "Kettle Plug",
                "model": "H5080",
                "controllable": true,
                "retrievable": false,
                "supportCmds": ["turn"],
            })]
        );

        let all = execute_batch(
            &client,
            &batch("getCapabilities", false, vec![json!({"device": ""})]),
        )
        .await
        .unwrap();
        k9::assert_equal!(all.len(), 3);
        k9::assert_equal!(
            all[0].json["properties"],
            json!({"colorTem": {"range": {"min": 2000, "max": 9000}}})
        );
    }

    #[tokio::test]
    async fn control_color() {
        let mut server = mockito::Server::new_async().await;
        let control = server
            .mock("PUT", "/v1/devices/control")
            .match_body(Matcher::Json(json!({
                "device": STRIP,
                "model": "H6159",
                "cmd": {"name": "color", "value": {"r": 0, "g": 255, "b": 136}},
            })))
            .with_status(200)
            .with_body(r#"{"code":200,"message":"Success","data":{},"requestId":"abc"}"#)
            .expect(1)
            .create_async()
            .await;
        let client = RestApiClient::with_server("key", server.url());

        let records = execute_batch(
            &client,
            &batch(
                "control",
                false,
                vec![json!({
                    "device": STRIP,
                    "model": "H6159",
                    "command": "color",
                    "colorValue": "00ff88",
                })],
            ),
        )
        .await
        .unwrap();

        control.assert_async().await;
        // The whole reply envelope is the record
        k9::assert_equal!(
            payloads(&records),
            vec![json!({"code": 200, "message": "Success", "data": {}, "requestId": "abc"})]
        );
    }

    #[tokio::test]
    async fn validation_rejects_unsupported_command() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_device_list(&mut server).await;
        let control = server
            .mock("PUT", "/v1/devices/control")
            .expect(0)
            .create_async()
            .await;
        let client = RestApiClient::with_server("key", server.url());

        let err = execute_batch(
            &client,
            &batch(
                "control",
                false,
                vec![json!({
                    "device": PLUG,
                    "model": "H5080",
                    "command": "brightness",
                    "brightnessValue": 10,
                    "options": {"validateCommand": true},
                })],
            ),
        )
        .await
        .unwrap_err();

        control.assert_async().await;
        k9::assert_equal!(
            err.source.to_string(),
            format!("Device \"{PLUG}\" does not support the \"brightness\" command. Supported: turn")
        );
    }

    #[tokio::test]
    async fn validation_skips_unlisted_device() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_device_list(&mut server).await;
        let control = mock_control(
            &mut server,
            "/v1/devices/control",
            json!({"device": "00:11", "model": "H6199", "cmd": {"name": "turn", "value": "off"}}),
        )
        .await;
        let client = RestApiClient::with_server("key", server.url());

        execute_batch(
            &client,
            &batch(
                "control",
                false,
                vec![json!({
                    "device": "00:11",
                    "model": "H6199",
                    "turnValue": "off",
                    "options": {"validateCommand": true},
                })],
            ),
        )
        .await
        .unwrap();

        control.assert_async().await;
    }

    #[tokio::test]
    async fn multi_control_in_order() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_device_list(&mut server).await;
        let sent = Arc::new(Mutex::new(vec![]));
        let control = {
            let sent = sent.clone();
            server
                .mock("PUT", "/v1/devices/control")
                .match_body(Matcher::PartialJson(json!({"device": STRIP, "model": "H6159"})))
                .with_status(200)
                .with_body_from_request(move |request| {
                    let body: JsonValue = serde_json::from_slice(request.body().unwrap()).unwrap();
                    let mut sent = sent.lock().unwrap();
                    sent.push(body["cmd"].clone());
                    serde_json::to_vec(&json!({
                        "code": 200,
                        "message": "Success",
                        "data": {"seq": sent.len(), "applied": body["cmd"]["name"]},
                    }))
                    .unwrap()
                })
                .expect(3)
                .create_async()
                .await
        };
        let client = RestApiClient::with_server("key", server.url());

        let records = execute_batch(
            &client,
            &batch(
                "multiControl",
                false,
                vec![json!({
                    "device": STRIP,
                    "model": "H6159",
                    "commands": r#"[
                        {"name": "turn", "value": "on"},
                        {"name": "brightness", "value": 40},
                        {"name": "colorTem", "value": 2700}
                    ]"#,
                    "options": {"validateCommand": true},
                })],
            ),
        )
        .await
        .unwrap();

        control.assert_async().await;
        k9::assert_equal!(
            sent.lock().unwrap().clone(),
            vec![
                json!({"name": "turn", "value": "on"}),
                json!({"name": "brightness", "value": 40}),
                json!({"name": "colorTem", "value": 2700}),
            ]
        );
        let tags: Vec<_> = records
            .iter()
            .map(|r| r.json["_command"].as_str().unwrap())
            .collect();
        k9::assert_equal!(tags, vec!["turn", "brightness", "colorTem"]);
        k9::assert_equal!(
            records[1].json,
            json!({
                "code": 200,
                "message": "Success",
                "data": {"seq": 2, "applied": "brightness"},
                "_command": "brightness",
            })
        );
    }

    #[tokio::test]
    async fn multi_control_validates_before_sending() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_device_list(&mut server).await;
        let control = server
            .mock("PUT", "/v1/devices/control")
            .expect(0)
            .create_async()
            .await;
        let client = RestApiClient::with_server("key", server.url());

        let err = execute_batch(
            &client,
            &batch(
                "multiControl",
                false,
                vec![json!({
                    "device": PLUG,
                    "model": "H5080",
                    "commands": [{"name": "turn", "value": "on"}, {"name": "color", "value": {"r": 1, "g": 2, "b": 3}}],
                    "options": {"validateCommand": true},
                })],
            ),
        )
        .await
        .unwrap_err();

        control.assert_async().await;
        assert!(matches!(err.source, NodeError::NotSupported { ref command, .. } if command == "color"));
    }

    #[tokio::test]
    async fn continue_on_fail() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_device_list(&mut server).await;
        let client = RestApiClient::with_server("key", server.url());
        let batch: Batch =
            serde_json::from_str(include_str!("../../test-data/batch-continue-on-fail.json"))
                .unwrap();

        let records = execute_batch(&client, &batch).await.unwrap();

        k9::assert_equal!(records.len(), 3);
        let items: Vec<_> = records.iter().map(|r| r.paired_item.item).collect();
        k9::assert_equal!(items, vec![0, 1, 2]);
        assert!(!records[0].is_error());
        k9::assert_equal!(records[0].json["device"], json!(STRIP));
        k9::assert_equal!(
            records[1].json,
            json!({"error": "Device with MAC address \"00:00:00:00:00:00:00:00\" not found"})
        );
        k9::assert_equal!(records[2].json["device"], json!(PLUG));
    }

    #[tokio::test]
    async fn failure_aborts_without_continue_on_fail() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_device_list(&mut server).await;
        let client = RestApiClient::with_server("key", server.url());
        let mut batch: Batch =
            serde_json::from_str(include_str!("../../test-data/batch-continue-on-fail.json"))
                .unwrap();
        batch.continue_on_fail = false;

        let err = execute_batch(&client, &batch).await.unwrap_err();
        k9::assert_equal!(err.item, 1);
    }

    #[tokio::test]
    async fn remote_errors_become_records() {
        let mut server = mockito::Server::new_async().await;
        let _state = server
            .mock("GET", "/v1/devices/state")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":400,"message":"devices not exist"}"#)
            .create_async()
            .await;
        let client = RestApiClient::with_server("key", server.url());

        let records = execute_batch(
            &client,
            &batch(
                "getState",
                true,
                vec![json!({"device": "00:11", "model": "H6159"}), json!({"device": "00:11"})],
            ),
        )
        .await
        .unwrap();

        k9::assert_equal!(records.len(), 2);
        let first = records[0].json["error"].as_str().unwrap();
        assert!(first.contains("status 400"), "{first}");
        assert!(first.contains("devices not exist"), "{first}");
        k9::assert_equal!(
            records[1].json,
            json!({"error": "Missing required parameter \"model\""})
        );
    }

    #[tokio::test]
    async fn unknown_operation_fails_each_item() {
        let client = RestApiClient::with_server("key", "http://127.0.0.1:9");
        let mut batch = batch("getState", true, vec![json!({}), json!({})]);
        batch.resource = "appliance".to_string();

        let records = execute_batch(&client, &batch).await.unwrap();
        k9::assert_equal!(
            payloads(&records),
            vec![
                json!({"error": "Unknown operation: getState"}),
                json!({"error": "Unknown operation: getState"}),
            ]
        );
    }

    #[tokio::test]
    async fn appliance_get_all_and_control() {
        let mut server = mockito::Server::new_async().await;
        let list = server
            .mock("GET", "/v1/appliance/devices")
            .with_status(200)
            .with_body(LIST_APPLIANCES)
            .expect(2)
            .create_async()
            .await;
        let purifier = mock_control(
            &mut server,
            "/v1/appliance/devices/control",
            json!({
                "device": "0B:AC:D0:C9:07:4E:C3:6A",
                "model": "H7121",
                "cmd": {"name": "mode", "value": 16},
            }),
        )
        .await;
        let humidifier = mock_control(
            &mut server,
            "/v1/appliance/devices/control",
            json!({
                "device": "E2:31:D4:AD:FC:28:7F:0A",
                "model": "H7141",
                "cmd": {"name": "mode", "value": 3},
            }),
        )
        .await;
        let client = RestApiClient::with_server("key", server.url());

        let mut get_all = batch("getAll", false, vec![json!({})]);
        get_all.resource = "appliance".to_string();
        let all = execute_batch(&client, &get_all).await.unwrap();
        k9::assert_equal!(all.len(), 2);
        k9::assert_equal!(all[1].json["deviceName"], json!("Nursery Humidifier"));

        // Both validations of this batch share one list request
        let mut control_batch = batch(
            "control",
            false,
            vec![
                json!({
                    "device": "0B:AC:D0:C9:07:4E:C3:6A",
                    "model": "H7121",
                    "command": "mode",
                    "modeValue": 16,
                    "options": {"validateCommand": true},
                }),
                json!({
                    "device": "E2:31:D4:AD:FC:28:7F:0A",
                    "model": "H7141",
                    "command": "mode",
                    "modeValue": 3,
                    "options": {"validateCommand": true},
                }),
            ],
        );
        control_batch.resource = "appliance".to_string();
        let records = execute_batch(&client, &control_batch).await.unwrap();
        k9::assert_equal!(records.len(), 2);

        list.assert_async().await;
        purifier.assert_async().await;
        humidifier.assert_async().await;
    }
}

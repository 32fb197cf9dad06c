//! Option lists for pickers: each helper degrades to an empty list when
//! the API can't be reached, so that a UI can still render.
use crate::cache::ListCache;
use crate::error::ApiError;
use crate::node::Resource;
use crate::rest_api::{RestApiClient, RestDeviceInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OptionEntry {
    pub name: String,
    pub value: JsonValue,
}

impl OptionEntry {
    fn new<N: Into<String>, V: Into<JsonValue>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

fn or_empty(what: &str, result: Result<Vec<OptionEntry>, ApiError>) -> Vec<OptionEntry> {
    match result {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("Unable to load {what}: {err:#}");
            vec![]
        }
    }
}

async fn with_list<F>(
    client: &RestApiClient,
    resource: Resource,
    what: &str,
    func: F,
) -> Vec<OptionEntry>
where
    F: FnOnce(&[RestDeviceInfo]) -> Vec<OptionEntry>,
{
    let mut cache = ListCache::new(client);
    or_empty(what, cache.list(resource).await.map(func))
}

/// One entry per device, labelled `"<deviceName> (<model>)"`
pub async fn targets(client: &RestApiClient, resource: Resource) -> Vec<OptionEntry> {
    with_list(client, resource, "targets", |list| {
        list.iter()
            .map(|d| OptionEntry::new(format!("{} ({})", d.device_name, d.model), d.device.as_str()))
            .collect()
    })
    .await
}

pub async fn models(
    client: &RestApiClient,
    resource: Resource,
    device: Option<&str>,
) -> Vec<OptionEntry> {
    let Some(device) = device.filter(|d| !d.is_empty()) else {
        return vec![];
    };
    with_list(client, resource, "models", |list| {
        list.iter()
            .filter(|d| d.device == device)
            .map(|d| OptionEntry::new(d.model.as_str(), d.model.as_str()))
            .collect()
    })
    .await
}

/// The commands of `device` in the order it advertises them. When no
/// device is selected, or the selected one isn't listed, this is the
/// sorted union of every listed device's commands.
pub async fn commands(
    client: &RestApiClient,
    resource: Resource,
    device: Option<&str>,
) -> Vec<OptionEntry> {
    let device = device.filter(|d| !d.is_empty());
    with_list(client, resource, "commands", |list| {
        let names = match device.and_then(|device| list.iter().find(|d| d.device == device)) {
            Some(found) => found.supported_command_names(),
            None => list
                .iter()
                .flat_map(|d| d.supported_command_names())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };
        names
            .into_iter()
            .map(|name| OptionEntry::new(name.clone(), name))
            .collect()
    })
    .await
}

pub async fn appliance_modes(client: &RestApiClient, device: Option<&str>) -> Vec<OptionEntry> {
    let Some(device) = device.filter(|d| !d.is_empty()) else {
        return vec![];
    };
    with_list(client, Resource::Appliance, "modes", |list| {
        list.iter()
            .filter(|d| d.device == device)
            .flat_map(|d| d.mode_options())
            .map(|opt| OptionEntry::new(opt.name.as_str(), opt.value.clone()))
            .collect()
    })
    .await
}

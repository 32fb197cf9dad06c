use crate::error::ApiError;
use crate::node::Resource;
use crate::rest_api::{RestApiClient, RestDeviceInfo};

/// Memoizes the device and appliance lists for the duration of one
/// batch. Create a fresh one per batch; nothing outlives it.
pub struct ListCache<'a> {
    client: &'a RestApiClient,
    devices: Option<Vec<RestDeviceInfo>>,
    appliances: Option<Vec<RestDeviceInfo>>,
}

impl<'a> ListCache<'a> {
    pub fn new(client: &'a RestApiClient) -> Self {
        Self {
            client,
            devices: None,
            appliances: None,
        }
    }

    pub async fn devices(&mut self) -> Result<&[RestDeviceInfo], ApiError> {
        if self.devices.is_none() {
            let devices = self.client.list_devices().await?;
            log::debug!("cached {} devices for this batch", devices.len());
            self.devices.replace(devices);
        }
        Ok(self.devices.as_deref().unwrap_or_default())
    }

    pub async fn appliances(&mut self) -> Result<&[RestDeviceInfo], ApiError> {
        if self.appliances.is_none() {
            let appliances = self.client.list_appliances().await?;
            log::debug!("cached {} appliances for this batch", appliances.len());
            self.appliances.replace(appliances);
        }
        Ok(self.appliances.as_deref().unwrap_or_default())
    }

    pub async fn list(&mut self, resource: Resource) -> Result<&[RestDeviceInfo], ApiError> {
        match resource {
            Resource::Device => self.devices().await,
            Resource::Appliance => self.appliances().await,
        }
    }

    /// Look up an entry by its device id
    pub async fn find(
        &mut self,
        resource: Resource,
        id: &str,
    ) -> Result<Option<&RestDeviceInfo>, ApiError> {
        Ok(self.list(resource).await?.iter().find(|d| d.device == id))
    }
}

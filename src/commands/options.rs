use crate::node::load_options;
use crate::node::Resource;

#[derive(clap::Parser, Debug)]
pub struct OptionsCommand {
    #[arg(value_enum)]
    list: OptionList,

    /// Use the appliance list rather than the device list
    #[arg(long)]
    appliance: bool,

    /// The selected device, for the lists that depend on it
    #[arg(long)]
    device: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OptionList {
    Devices,
    Models,
    Commands,
    Modes,
}

impl OptionsCommand {
    pub async fn run(&self, args: &crate::Args) -> anyhow::Result<()> {
        let client = args.api_args.api_client()?;
        let resource = if self.appliance {
            Resource::Appliance
        } else {
            Resource::Device
        };
        let device = self.device.as_deref();

        let entries = match self.list {
            OptionList::Devices => load_options::targets(&client, resource).await,
            OptionList::Models => load_options::models(&client, resource, device).await,
            OptionList::Commands => load_options::commands(&client, resource, device).await,
            OptionList::Modes => load_options::appliance_modes(&client, device).await,
        };

        println!("{}", serde_json::to_string_pretty(&entries)?);
        Ok(())
    }
}

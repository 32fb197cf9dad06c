use crate::cache::ListCache;
use crate::color::Rgb;
use crate::command::{parse_generic_value, Command, OnOff};
use crate::node::execute::ensure_supported;
use crate::node::Resource;
use anyhow::Context;

#[derive(clap::Parser, Debug)]
pub struct ControlCommand {
    /// The device id (MAC address) to control
    #[arg(long)]
    pub id: String,

    /// The device model. Looked up from the device list when omitted.
    #[arg(long)]
    pub model: Option<String>,

    /// Target the appliance endpoints rather than the light endpoints
    #[arg(long)]
    pub appliance: bool,

    /// Refuse to send a command that the device doesn't advertise
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    cmd: SubCommand,
}

#[derive(clap::Parser, Debug, PartialEq)]
enum SubCommand {
    On,
    Off,
    Brightness {
        percent: u8,
    },
    Temperature {
        kelvin: u32,
    },
    Color {
        color: csscolorparser::Color,
    },
    Mode {
        value: i64,
    },
    /// Send an arbitrary command; the value is parsed as JSON when possible
    Raw {
        name: String,
        value: String,
    },
}

impl SubCommand {
    fn command(&self) -> Command {
        match self {
            Self::On | Self::Off => Command::turn(OnOff::from(*self == Self::On)),
            Self::Brightness { percent } => Command::new("brightness", *percent),
            Self::Temperature { kelvin } => Command::new("colorTem", *kelvin),
            Self::Color { color } => Command::new("color", Rgb::from(color)),
            Self::Mode { value } => Command::new("mode", *value),
            Self::Raw { name, value } => Command::new(name.as_str(), parse_generic_value(value)),
        }
    }
}

impl ControlCommand {
    fn resource(&self) -> Resource {
        if self.appliance {
            Resource::Appliance
        } else {
            Resource::Device
        }
    }

    pub async fn run(&self, args: &crate::Args) -> anyhow::Result<()> {
        let client = args.api_args.api_client()?;
        let resource = self.resource();
        let mut cache = ListCache::new(&client);
        let cmd = self.cmd.command();

        if self.validate {
            ensure_supported(&mut cache, resource, &self.id, [cmd.name.as_str()]).await?;

            if let SubCommand::Temperature { kelvin } = &self.cmd {
                let range = cache
                    .find(resource, &self.id)
                    .await?
                    .and_then(|d| d.color_temperature_range());
                if let Some(range) = range {
                    if !(range.min..=range.max).contains(&i64::from(*kelvin)) {
                        log::warn!(
                            "{kelvin}K is outside the {}-{}K range advertised by {}",
                            range.min,
                            range.max,
                            self.id
                        );
                    }
                }
            }
        }

        let model = match &self.model {
            Some(model) => model.to_string(),
            None => cache
                .find(resource, &self.id)
                .await
                .context("looking up the device model")?
                .map(|d| d.model.clone())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "{} {} not found; pass --model to control it anyway",
                        resource.label(),
                        self.id
                    )
                })?,
        };

        let result = match resource {
            Resource::Device => client.control_device(&self.id, &model, &cmd).await,
            Resource::Appliance => client.control_appliance(&self.id, &model, &cmd).await,
        }
        .with_context(|| format!("sending {} to {}", cmd.name, self.id))?;

        println!("{result:#?}");
        Ok(())
    }
}

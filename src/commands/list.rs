use anyhow::Context;

#[derive(clap::Parser, Debug)]
pub struct ListCommand {
    /// List appliances (purifiers, humidifiers, ...) rather than lights
    #[arg(long)]
    appliances: bool,

    /// Print the raw records as JSON
    #[arg(long)]
    json: bool,
}

impl ListCommand {
    pub async fn run(&self, args: &crate::Args) -> anyhow::Result<()> {
        let client = args.api_args.api_client()?;
        let devices = if self.appliances {
            client.list_appliances().await
        } else {
            client.list_devices().await
        }
        .context("listing devices")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&devices)?);
            return Ok(());
        }

        for d in devices {
            println!(
                "{model:<7} {id} {name} [{cmds}]",
                model = d.model,
                id = d.device,
                name = d.device_name,
                cmds = d.supported_command_names().join(", ")
            );
        }
        Ok(())
    }
}

use clap::Parser;
use std::str::FromStr;

mod cache;
mod color;
mod command;
mod commands;
mod error;
mod node;
mod rest_api;

#[derive(clap::Parser, Debug)]
#[command(version, about = "Drive Govee devices and appliances through the developer API")]
pub struct Args {
    #[command(flatten)]
    api_args: rest_api::GoveeApiArguments,

    #[command(subcommand)]
    cmd: SubCommand,
}

#[derive(clap::Parser, Debug)]
enum SubCommand {
    /// Run a batch of items through one resource/operation
    Exec(commands::exec::ExecCommand),
    /// Print the device or appliance list
    List(commands::list::ListCommand),
    /// Send a single control command
    Control(commands::control::ControlCommand),
    /// Print the option lists used to populate pickers
    Options(commands::options::OptionsCommand),
    /// Verify that the API key is accepted
    Check(commands::check::CheckCommand),
}

impl Args {
    async fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            SubCommand::Exec(cmd) => cmd.run(self).await,
            SubCommand::List(cmd) => cmd.run(self).await,
            SubCommand::Control(cmd) => cmd.run(self).await,
            SubCommand::Options(cmd) => cmd.run(self).await,
            SubCommand::Check(cmd) => cmd.run(self).await,
        }
    }
}

pub fn opt_env_var<T: FromStr>(name: &str) -> anyhow::Result<Option<T>>
where
    <T as FromStr>::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(p) => {
            Ok(Some(p.trim().parse().map_err(|err| {
                anyhow::anyhow!("parsing ${name}: {err:#}")
            })?))
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => anyhow::bail!("${name} is invalid: {err:#}"),
    }
}

fn setup_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    color_backtrace::install();
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loading environment overrides from {path:?}");
    }
    setup_logger();

    let args = Args::parse();
    args.run().await
}

#[derive(clap::Parser, Debug)]
pub struct CheckCommand {}

impl CheckCommand {
    pub async fn run(&self, args: &crate::Args) -> anyhow::Result<()> {
        let client = args.api_args.api_client()?;
        match client.check_credentials().await {
            Ok(()) => {
                println!("API key accepted");
                Ok(())
            }
            Err(err) => {
                let reason = err.upstream_message().unwrap_or("request failed");
                match err.status() {
                    Some(status) => anyhow::bail!("API key rejected with status {status}: {reason}"),
                    None => anyhow::bail!("Unable to verify the API key: {err:#}"),
                }
            }
        }
    }
}

use crate::node::execute::execute_batch;
use crate::node::Batch;
use anyhow::Context;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(clap::Parser, Debug)]
pub struct ExecCommand {
    /// The batch file to run; `-` reads it from stdin
    #[arg(long, default_value = "-")]
    file: PathBuf,

    /// Record failing items as `{"error": ...}` rather than aborting,
    /// regardless of the batch's own setting
    #[arg(long)]
    continue_on_fail: bool,

    /// Print one compact record per line instead of a pretty array
    #[arg(long)]
    lines: bool,
}

fn load_batch(path: &Path) -> anyhow::Result<Batch> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading batch from stdin")?;
        text
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };

    serde_json_path_to_error::from_str(&text)
        .with_context(|| format!("parsing batch {}", path.display()))
}

impl ExecCommand {
    pub async fn run(&self, args: &crate::Args) -> anyhow::Result<()> {
        let mut batch = load_batch(&self.file)?;
        if self.continue_on_fail {
            batch.continue_on_fail = true;
        }
        log::info!(
            "{}: {} {} item(s)",
            self.file.display(),
            batch.operation,
            batch.items.len()
        );

        let client = args.api_args.api_client()?;
        let records = execute_batch(&client, &batch).await?;
        let failed = records.iter().filter(|r| r.is_error()).count();
        if failed > 0 {
            log::warn!("{failed} of {} record(s) are errors", records.len());
        }

        if self.lines {
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
        } else {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn batch_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(include_bytes!("../../test-data/batch-continue-on-fail.json"))
            .unwrap();

        let batch = load_batch(file.path()).unwrap();
        k9::assert_equal!(batch.resource, "device");
        k9::assert_equal!(batch.operation, "get");
        assert!(batch.continue_on_fail);
        k9::assert_equal!(batch.items.len(), 3);
        k9::assert_equal!(
            batch.items[1].raw("device"),
            Some(&serde_json::json!("00:00:00:00:00:00:00:00"))
        );
    }

    #[test]
    fn bad_batch_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"items": {"device": "AA"}}"#).unwrap();

        let err = load_batch(file.path()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("parsing batch"), "{message}");
        assert!(message.contains("items"), "{message}");

        let err = load_batch(Path::new("/does/not/exist.json")).unwrap_err();
        assert!(format!("{err:#}").contains("reading /does/not/exist.json"));
    }
}

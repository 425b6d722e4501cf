use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use temps_forms::{collect, CollectOptions, InputElement};
use tracing::debug;

#[derive(Args)]
pub struct FormCommand {
    #[command(subcommand)]
    command: FormCommands,
}

#[derive(Subcommand)]
enum FormCommands {
    /// Collect values from a JSON array of input elements
    Collect(CollectArgs),
}

#[derive(Args)]
struct CollectArgs {
    /// JSON file holding `[{"name", "type", "value", "checked", "disabled"}, ...]`
    file: PathBuf,

    /// Skip empty values and unchecked checkboxes
    #[arg(long)]
    ignore_empty: bool,

    /// Skip disabled elements
    #[arg(long)]
    ignore_disabled: bool,
}

impl FormCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            FormCommands::Collect(args) => {
                let options = CollectOptions {
                    ignore_empty_values: args.ignore_empty,
                    ignore_disabled: args.ignore_disabled,
                };
                let values = collect_file(&args.file, options)?;
                println!("{}", serde_json::to_string_pretty(&values)?);
                Ok(())
            }
        }
    }
}

fn collect_file(path: &Path, options: CollectOptions) -> anyhow::Result<serde_json::Value> {
    let raw = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let elements: Vec<InputElement> = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("{} is not a list of input elements: {}", path.display(), e))?;

    debug!("Collecting {} elements from {}", elements.len(), path.display());
    Ok(collect(&elements, options).to_json())
}

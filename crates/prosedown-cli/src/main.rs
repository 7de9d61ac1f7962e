use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prosedown_config::{profile_capabilities, Config};
use prosedown_engine::{Capabilities, MarkdownTransformer, Node, Schema};

#[derive(Parser)]
#[command(name = "prosedown", about = "Markdown <-> document tree transform")]
struct Cli {
    /// Path to a prosedown.toml; overrides --profile when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capability preset: article or message.
    #[arg(long, default_value = "article")]
    profile: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse markdown into a JSON document tree.
    Parse { file: PathBuf },
    /// Serialize a JSON document tree back to markdown.
    Serialize { file: PathBuf },
    /// Parse markdown and emit its canonical markdown form.
    Roundtrip { file: PathBuf },
}

fn capabilities(cli: &Cli) -> Result<Capabilities> {
    if let Some(path) = &cli.config {
        let config = Config::load_from_path(path)?
            .with_context(|| format!("config file not found: {}", path.display()))?;
        return Ok(config.capabilities()?);
    }
    Ok(profile_capabilities(&cli.profile)?)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let schema = Arc::new(Schema::new(capabilities(&cli)?));
    let transformer = MarkdownTransformer::new(schema.clone());

    match &cli.command {
        Command::Parse { file } => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let tree = transformer.parse(&text)?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
        Command::Serialize { file } => {
            let json = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let tree: Node = serde_json::from_str(&json)
                .with_context(|| format!("parsing tree from {}", file.display()))?;
            schema.check(&tree).context("tree does not match the schema")?;
            println!("{}", transformer.encode(&tree)?);
        }
        Command::Roundtrip { file } => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let tree = transformer.parse(&text)?;
            println!("{}", transformer.encode(&tree)?);
        }
    }
    Ok(())
}

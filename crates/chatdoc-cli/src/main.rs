//! CLI entry point for ChatDoc: ask questions about one document.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chatdoc_core::{app_data_dir, config_path, load_config, save_config, status, Config, Pipeline};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "chatdoc")]
#[command(about = "ChatDoc: answers questions from a single document")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Per-run overrides of values from config.toml.
#[derive(clap::Args)]
struct Overrides {
    /// Ollama base URL.
    #[arg(long, global = true)]
    url: Option<String>,
    /// Chat model used for answers.
    #[arg(long, global = true)]
    model: Option<String>,
    /// Embedding model for chunks and questions.
    #[arg(long, global = true)]
    embed_model: Option<String>,
    #[arg(long, global = true)]
    top_k: Option<usize>,
    /// Minimum similarity score for a chunk to be used as context.
    #[arg(long, global = true)]
    threshold: Option<f32>,
    #[arg(long, global = true)]
    chunk_size: Option<usize>,
    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,
}

impl Overrides {
    fn apply(self, mut config: Config) -> Config {
        if let Some(v) = self.url {
            config.ollama_url = v;
        }
        if let Some(v) = self.model {
            config.chat_model = v;
        }
        if let Some(v) = self.embed_model {
            config.embed_model = v;
        }
        if let Some(v) = self.top_k {
            config.top_k = v;
        }
        if let Some(v) = self.threshold {
            config.score_threshold = v;
        }
        if let Some(v) = self.chunk_size {
            config.chunk_size = v;
        }
        if let Some(v) = self.chunk_overlap {
            config.chunk_overlap = v;
        }
        config
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status (for dev).
    Status,
    /// Show where ChatDoc stores its config (app data directory).
    DataDir,
    /// Print the effective config.
    Config {
        /// Validate and write the effective config (with any overrides) to config.toml.
        #[arg(long)]
        save: bool,
    },
    /// Load a document and answer one question about it.
    Ask {
        /// PDF, markdown or text file.
        #[arg(value_name = "PATH")]
        path: PathBuf,
        #[arg(value_name = "QUESTION")]
        question: String,
    },
    /// Interactive session. Type questions; /load <path>, /clear and /quit are commands.
    Chat {
        /// Document to load at start.
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.overrides.apply(load_config());

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            println!("ChatDoc backend");
            println!("  core: {}", status());
        }
        Commands::DataDir => {
            let Some(p) = app_data_dir() else {
                bail!("could not determine app data directory");
            };
            println!("{}", p.display());
        }
        Commands::Config { save } => show_config(&config, save)?,
        Commands::Ask { path, question } => ask_once(&config, &path, &question).await?,
        Commands::Chat { path } => chat(&config, path.as_deref()).await?,
    }
    Ok(())
}

/// Logs go to stderr; `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn show_config(config: &Config, save: bool) -> anyhow::Result<()> {
    if let Some(p) = config_path() {
        println!("# {}", p.display());
    }
    let s = toml::to_string_pretty(config).context("failed to render config")?;
    print!("{}", s);
    config.validate().context("invalid config")?;
    if save {
        save_config(config).context("failed to save config")?;
        eprintln!("Saved.");
    }
    Ok(())
}

async fn ask_once(config: &Config, path: &Path, question: &str) -> anyhow::Result<()> {
    let mut pipeline = Pipeline::from_config(config).context("failed to set up pipeline")?;
    pipeline
        .ingest(path)
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;
    let answer = pipeline.ask(question).await.context("failed to answer")?;
    println!("{}", answer);
    Ok(())
}

async fn chat(config: &Config, path: Option<&Path>) -> anyhow::Result<()> {
    let mut pipeline = Pipeline::from_config(config).context("failed to set up pipeline")?;
    if let Some(path) = path {
        load(&mut pipeline, path).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            return Ok(());
        };
        let line = line.trim();
        match line.split_once(' ').unwrap_or((line, "")) {
            ("", _) => continue,
            ("/quit", _) | ("/exit", _) => return Ok(()),
            ("/clear", _) => {
                pipeline.clear();
                println!("Cleared.");
            }
            ("/load", rest) if !rest.trim().is_empty() => {
                load(&mut pipeline, Path::new(rest.trim())).await;
            }
            ("/load", _) => eprintln!("Usage: /load <path>"),
            _ => match pipeline.ask(line).await {
                Ok(answer) => println!("{}", answer),
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }
}

async fn load(pipeline: &mut Pipeline, path: &Path) {
    match pipeline.ingest(path).await {
        Ok(report) => {
            print!("Loaded {} ({} chunk(s)", report.source.display(), report.chunks);
            if report.dropped_chunks > 0 {
                print!(", {} dropped", report.dropped_chunks);
            }
            println!(")");
        }
        Err(e) => eprintln!("Error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::parse_from(["chatdoc", "--model", "llama3.2", "--top-k", "5", "config"]);
        assert!(matches!(cli.command, Some(Commands::Config { save: false })));
        let config = cli.overrides.apply(Config::default());
        assert_eq!(config.chat_model, "llama3.2");
        assert_eq!(config.top_k, 5);
        assert_eq!(config.embed_model, Config::default().embed_model);
    }

    #[test]
    fn ask_takes_path_and_question() {
        let cli = Cli::parse_from(["chatdoc", "ask", "doc.pdf", "What color is the sky?", "--threshold", "0.3"]);
        match cli.command {
            Some(Commands::Ask { path, question }) => {
                assert_eq!(path, PathBuf::from("doc.pdf"));
                assert_eq!(question, "What color is the sky?");
            }
            _ => panic!("expected ask"),
        }
        assert_eq!(cli.overrides.threshold, Some(0.3));
    }

    #[test]
    fn config_save_flag_keeps_overrides() {
        let cli = Cli::parse_from(["chatdoc", "config", "--save", "--chunk-size", "800"]);
        assert!(matches!(cli.command, Some(Commands::Config { save: true })));
        let config = cli.overrides.apply(Config::default());
        assert_eq!(config.chunk_size, 800);
        assert!(config.validate().is_ok());
    }
}

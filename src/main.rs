//! # kbrag CLI (`kb`)
//!
//! The `kb` binary ingests a directory of documents into fixed-size chunk
//! files and answers questions with the most similar chunk.
//!
//! ## Usage
//!
//! ```bash
//! kb --config ./config/kb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb ingest` | Extract, chunk and store every document under the knowledge root |
//! | `kb ask "<query>"` | Answer a single question |
//! | `kb chat` | Interactive question loop |
//! | `kb serve` | Start the HTTP chat server |
//!
//! ## Examples
//!
//! ```bash
//! # Chunk everything under ./knowledge_base into ./knowledge_base/base
//! kb ingest
//!
//! # Preview without writing
//! kb ingest --dry-run
//!
//! # One-off question
//! kb ask "qual é a política de férias?"
//!
//! # HTTP server on [server].bind
//! RUST_LOG=kbrag=debug kb serve
//! ```

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use kbrag::config::{self, Config};
use kbrag::extract::ExtractorRegistry;
use kbrag::ingest;
use kbrag::retriever::Retriever;
use kbrag::server;

/// kbrag: chunked document ingestion and TF-IDF question answering.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "kb",
    about = "kbrag: chunked document ingestion and TF-IDF question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, chunk and store every document under the knowledge root.
    ///
    /// Chunk files are written to `[knowledge].output_dir`. Files whose
    /// content did not change are left untouched.
    Ingest {
        /// Report counts without writing any chunk file.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a single question.
    Ask {
        /// The question.
        query: String,

        /// Print the answer as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Interactive question loop. Type `sair`, `exit` or `quit` to leave.
    Chat,

    /// Start the HTTP chat server on `[server].bind`.
    Serve,
}

const EXIT_WORDS: &[&str] = &["sair", "exit", "quit"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;
    let registry = Arc::new(ExtractorRegistry::from_config(&cfg));

    match cli.command {
        Commands::Ingest { dry_run } => {
            let report = ingest::run_ingest(&cfg, &registry, dry_run)?;
            ingest::print_report(&report, dry_run);
        }
        Commands::Ask { query, json } => {
            let retriever = Arc::new(Retriever::from_config(&cfg, registry));
            let answer = retriever.answer_with_timeout(query.trim().to_string()).await?;
            if json {
                let mut value = serde_json::to_value(&answer)?;
                value["response"] = serde_json::Value::String(answer.to_string());
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", answer);
            }
        }
        Commands::Chat => {
            let retriever = Arc::new(Retriever::from_config(&cfg, registry));
            run_chat(&cfg, retriever).await?;
        }
        Commands::Serve => {
            let retriever = Arc::new(Retriever::from_config(&cfg, registry));
            server::run_server(&cfg, retriever).await?;
        }
    }

    Ok(())
}

async fn run_chat(cfg: &Config, retriever: Arc<Retriever>) -> anyhow::Result<()> {
    println!(
        "Chatbot pronto. Base de conhecimento: {}. Digite 'sair' para encerrar.",
        cfg.knowledge.root.display()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Você: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if EXIT_WORDS.contains(&query.to_lowercase().as_str()) {
            break;
        }

        match retriever.answer_with_timeout(query.to_string()).await {
            Ok(answer) => println!("Chatbot: {}\n", answer),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    println!("Encerrando o programa. Até logo!");
    Ok(())
}

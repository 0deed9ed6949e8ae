use anyhow::Result;
use clap::{Parser, Subcommand};
use pdf_qa::commands::{ask_question, index_path, show_status};
use pdf_qa::config::{Config, show_config};
use pdf_qa::server::serve;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdf-qa")]
#[command(about = "Upload PDFs, index them into a local vector store and ask questions about them")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $PDF_QA_CONFIG, then ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind, overriding server.host
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overriding server.port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Index a PDF, text file or directory into the vector store
    Index {
        /// File or directory to index
        path: PathBuf,
    },
    /// Ask a question about the indexed documents
    Ask {
        question: String,
        /// Number of chunks to retrieve as context
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Print the effective configuration
    Config {
        /// Show a styled summary instead of TOML
        #[arg(long)]
        show: bool,
    },
    /// Check the vector store and the Ollama server
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_sources(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            serve(config).await?;
        }
        Commands::Index { path } => {
            index_path(config, &path).await?;
        }
        Commands::Ask { question, top_k } => {
            ask_question(config, &question, top_k).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config);
            } else {
                print!("{}", config.to_toml_string()?);
            }
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}

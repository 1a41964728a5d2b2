use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wil_job_agent::Result;
use wil_job_agent::catalog::JobQuery;
use wil_job_agent::commands::{
    Transport, list_jobs, search_jobs, serve_mcp, show_config, show_job,
};
use wil_job_agent::config::Config;
use wil_job_agent::logging;

#[derive(Parser)]
#[command(name = "wil-job-agent")]
#[command(about = "An MCP server for searching Work-Integrated Learning job postings")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server (default)
    Serve {
        /// Transport to serve the MCP protocol over
        #[arg(long, value_enum, default_value_t = Transport::Sse)]
        transport: Transport,
    },
    /// List every job in the catalog
    List,
    /// Search the catalog the same way the search_wil_jobs tool does
    Search {
        /// Keyword to match against titles, descriptions and tags (repeatable)
        #[arg(long = "keyword", short = 'k')]
        keywords: Vec<String>,
        /// Location substring, e.g. "Toronto"
        #[arg(long)]
        location: Option<String>,
        /// Program area substring, e.g. "Computer Programming"
        #[arg(long)]
        program: Option<String>,
    },
    /// Show the details of a single job
    Show {
        /// Job ID to look up
        job_id: String,
    },
    /// Print the effective configuration
    Config,
}

impl Commands {
    /// Only the server writes the log file; one-shot commands log to stderr
    fn logs_to_file(&self) -> bool {
        matches!(self, Self::Serve { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Commands::Serve {
        transport: Transport::Sse,
    });

    if command.logs_to_file() {
        logging::init(&config.logging)?;
    } else {
        logging::init_console(&config.logging)?;
    }

    match command {
        Commands::Serve { transport } => {
            serve_mcp(&config, transport).await?;
        }
        Commands::List => {
            list_jobs(&config)?;
        }
        Commands::Search {
            keywords,
            location,
            program,
        } => {
            let query = JobQuery {
                keywords,
                location,
                program,
            };
            search_jobs(&config, &query)?;
        }
        Commands::Show { job_id } => {
            show_job(&config, &job_id)?;
        }
        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

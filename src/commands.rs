use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

use crate::catalog::{Catalog, JobQuery, JobRecord};
use crate::config::Config;
use crate::mcp::{build_server, sse};

/// Transport used by the MCP server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// HTTP with Server-Sent Events
    #[default]
    Sse,
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
}

/// Load the configured catalog, or the built-in one
#[inline]
pub fn load_catalog(config: &Config) -> Result<Arc<Catalog>> {
    let catalog = match &config.catalog.path {
        Some(path) => {
            info!("Loading job catalog from {}", path.display());
            Catalog::load(path)
                .with_context(|| format!("Failed to load catalog: {}", path.display()))?
        }
        None => Catalog::builtin(),
    };

    info!(
        "Catalog ready: {} jobs, {} employers, {} job titles",
        catalog.jobs().len(),
        catalog.employers().len(),
        catalog.job_titles().len()
    );
    Ok(Arc::new(catalog))
}

/// Start the MCP server on the chosen transport
#[inline]
pub async fn serve_mcp(config: &Config, transport: Transport) -> Result<()> {
    let catalog = load_catalog(config)?;
    let server = Arc::new(
        build_server(&config.server, catalog).context("Failed to register MCP handlers")?,
    );

    match transport {
        Transport::Sse => {
            let banner = format!("Starting MCP Server on {} …", config.server.sse_url());
            println!("{}", banner);
            info!("{}", banner);
            sse::serve(server, &config.server).await
        }
        Transport::Stdio => server.serve_stdio().await,
    }
}

/// Print every job in the catalog
#[inline]
pub fn list_jobs(config: &Config) -> Result<()> {
    let catalog = load_catalog(config)?;
    let jobs: Vec<&JobRecord> = catalog.jobs().iter().collect();

    if jobs.is_empty() {
        println!("The job catalog is empty.");
        return Ok(());
    }

    println!("WIL Jobs ({} total):", jobs.len());
    println!();
    print!("{}", format_jobs(&jobs));
    Ok(())
}

/// Run a search against the catalog and print the matches
#[inline]
pub fn search_jobs(config: &Config, query: &JobQuery) -> Result<()> {
    let catalog = load_catalog(config)?;
    let jobs = catalog.search(query);

    if jobs.is_empty() {
        println!("No jobs matched the search criteria.");
        return Ok(());
    }

    println!("Matching Jobs ({} found):", jobs.len());
    println!();
    print!("{}", format_jobs(&jobs));
    Ok(())
}

/// Print a single job, or a not-found message
#[inline]
pub fn show_job(config: &Config, job_id: &str) -> Result<()> {
    let catalog = load_catalog(config)?;

    match catalog.find(job_id) {
        Some(job) => {
            let json = serde_json::to_string_pretty(job)?;
            println!("{}", json);
        }
        None => {
            println!("No job found with id '{}'.", job_id);
            println!("Use 'wil-job-agent list' to see available jobs.");
        }
    }
    Ok(())
}

/// Print the effective configuration as TOML
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

/// Human-readable listing used by the CLI commands
#[inline]
pub fn format_jobs(jobs: &[&JobRecord]) -> String {
    let mut output = String::new();
    for job in jobs {
        let _ = writeln!(output, "💼 {} (ID: {})", job.title, job.id);
        let _ = writeln!(output, "   Company: {}", job.company);
        let _ = writeln!(output, "   Location: {}", job.location);
        let _ = writeln!(output, "   Program: {}", job.program_area);
        if !job.keywords.is_empty() {
            let _ = writeln!(output, "   Keywords: {}", job.keywords.join(", "));
        }
        let _ = writeln!(output, "   {}", job.description);
        output.push('\n');
    }
    output
}

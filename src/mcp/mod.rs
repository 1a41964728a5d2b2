//! MCP (Model Context Protocol) Server Implementation
//!
//! This module provides the MCP server for the job agent, following the
//! JSON-RPC 2.0 specification, with stdio and HTTP+SSE transports.


pub mod errors;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod sse;
pub mod tools;

pub use errors::McpError;
pub use protocol::*;
pub use server::{ConnectionState, McpServer, MessageHandler, ResourceHandler, ToolHandler};

use crate::catalog::Catalog;
use crate::config::ServerConfig;
use anyhow::Result;
use resources::{ReferenceList, ReferenceListHandler};
use std::sync::Arc;
use tools::{JobDetailsHandler, SearchJobsHandler};

/// Build the job agent server with every tool and resource registered
#[inline]
pub fn build_server(config: &ServerConfig, catalog: Arc<Catalog>) -> Result<McpServer> {
    let mut server = McpServer::new(
        config.name.clone(),
        env!("CARGO_PKG_VERSION").to_string(),
    )
    .with_instructions(
        "Search Work-Integrated Learning (WIL) job postings by keyword, location and program, \
         and look up individual postings by id.",
    );

    server.register_tool(
        SearchJobsHandler::tool_definition(),
        SearchJobsHandler::new(Arc::clone(&catalog)),
    )?;
    server.register_tool(
        JobDetailsHandler::tool_definition(),
        JobDetailsHandler::new(Arc::clone(&catalog)),
    )?;

    for list in [ReferenceList::Employers, ReferenceList::JobTitles] {
        let handler = ReferenceListHandler::new(Arc::clone(&catalog), list);
        server.register_resource(handler.resource_definition(), handler)?;
    }

    Ok(server)
}

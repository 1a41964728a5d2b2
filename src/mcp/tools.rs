//! MCP Tools Implementation
//!
//! Concrete tool implementations for searching the WIL job catalog.

use crate::catalog::{Catalog, JobQuery};
use crate::mcp::errors::McpError;
use crate::mcp::protocol::*;
use crate::mcp::server::ToolHandler;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

/// Arguments accepted by `search_wil_jobs`
#[derive(Debug, Deserialize)]
struct SearchJobsArgs {
    #[serde(default)]
    keywords: Option<Vec<String>>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    program: Option<String>,
}

/// Arguments accepted by `get_job_details`
#[derive(Debug, Deserialize)]
struct JobDetailsArgs {
    job_id: String,
}

/// Job search tool handler
pub struct SearchJobsHandler {
    catalog: Arc<Catalog>,
}

/// Job lookup tool handler
pub struct JobDetailsHandler {
    catalog: Arc<Catalog>,
}

impl SearchJobsHandler {
    pub const NAME: &'static str = "search_wil_jobs";

    /// Create a new search handler
    #[inline]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Create the search_wil_jobs tool definition
    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            description: Some(
                "Searches for WIL job postings based on keywords, location, and program area."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "keywords": {
                        "anyOf": [
                            {"type": "array", "items": {"type": "string"}},
                            {"type": "null"}
                        ],
                        "description": "Keywords to look for in job titles, descriptions and tags; any one may match"
                    },
                    "location": {
                        "anyOf": [{"type": "string"}, {"type": "null"}],
                        "description": "Desired job location (e.g., \"Toronto, ON\", \"Remote\")"
                    },
                    "program": {
                        "anyOf": [{"type": "string"}, {"type": "null"}],
                        "description": "Student's program area (e.g., \"Computer Programming\")"
                    }
                },
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for SearchJobsHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args: SearchJobsArgs = parse_arguments(Self::NAME, params.arguments)?;

        let query = JobQuery {
            keywords: args.keywords.unwrap_or_default(),
            location: args.location,
            program: args.program,
        };

        let results = self.catalog.search(&query);
        debug!(
            "Searched jobs: keywords={:?}, location={:?}, program={:?}, matches={}",
            query.keywords,
            query.location,
            query.program,
            results.len()
        );

        json_result(serde_json::to_value(results)?)
    }
}

impl JobDetailsHandler {
    pub const NAME: &'static str = "get_job_details";

    /// Create a new lookup handler
    #[inline]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Create the get_job_details tool definition
    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            description: Some("Retrieves the details for a specific job ID.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "job_id": {
                        "type": "string",
                        "description": "The ID of the job to retrieve"
                    }
                },
                "required": ["job_id"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for JobDetailsHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args: JobDetailsArgs = parse_arguments(Self::NAME, params.arguments)?;

        match self.catalog.find(&args.job_id) {
            Some(job) => {
                debug!("Found job {}", job.id);
                json_result(serde_json::to_value(job)?)
            }
            None => {
                debug!("Job not found: {}", args.job_id);
                Ok(CallToolResult {
                    content: vec![ToolContent::Text {
                        text: format!("No job found with id '{}'", args.job_id),
                    }],
                    structured_content: Some(json!({ "result": null })),
                    is_error: Some(false),
                })
            }
        }
    }
}

/// Deserialize tool arguments, treating missing arguments as an empty object
fn parse_arguments<T: DeserializeOwned>(
    tool: &str,
    arguments: Option<serde_json::Map<String, Value>>,
) -> Result<T> {
    let arguments = Value::Object(arguments.unwrap_or_default());
    serde_json::from_value(arguments).map_err(|e| {
        McpError::InvalidToolParameters {
            tool: tool.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Wrap a JSON value as both text and structured tool output
fn json_result(value: Value) -> Result<CallToolResult> {
    Ok(CallToolResult {
        content: vec![ToolContent::Text {
            text: serde_json::to_string_pretty(&value)?,
        }],
        structured_content: Some(json!({ "result": value })),
        is_error: Some(false),
    })
}

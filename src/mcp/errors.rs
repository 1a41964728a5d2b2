//! MCP Error Handling
//!
//! Errors raised while serving MCP requests, and their mapping onto
//! JSON-RPC error objects.

use crate::mcp::protocol::*;
use thiserror::Error;

/// MCP-specific errors that can occur during server operation
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },

    #[error("Invalid parameters for tool '{tool}': {message}")]
    InvalidToolParameters { tool: String, message: String },

    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },
}

impl McpError {
    /// Convert MCP error to JSON-RPC error
    #[inline]
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        let code = match self {
            Self::ToolNotFound { .. } => mcp_error_codes::TOOL_NOT_FOUND,
            Self::ResourceNotFound { .. } => mcp_error_codes::RESOURCE_NOT_FOUND,
            Self::InvalidToolParameters { .. } | Self::InvalidParameters { .. } => {
                error_codes::INVALID_PARAMS
            }
            Self::MethodNotFound { .. } => error_codes::METHOD_NOT_FOUND,
        };
        JsonRpcError::new(code, self.to_string(), None)
    }
}

/// Map any handler error onto a JSON-RPC error object
///
/// [`McpError`]s keep their specific code, anything else is reported as an
/// internal error.
#[inline]
pub fn to_jsonrpc_error(error: &anyhow::Error) -> JsonRpcError {
    match error.downcast_ref::<McpError>() {
        Some(mcp_error) => mcp_error.to_jsonrpc_error(),
        None => JsonRpcError::internal_error(Some(error.to_string())),
    }
}

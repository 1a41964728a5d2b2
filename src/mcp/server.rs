//! MCP Server Implementation
//!
//! This module provides the core MCP server framework: the tool and resource
//! registries, per-connection message routing, and the stdio transport.

use crate::mcp::errors::{McpError, to_jsonrpc_error};
use crate::mcp::protocol::*;
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// MCP Server state and configuration
///
/// Tools and resources are registered before the server is shared and are
/// read-only afterwards.
pub struct McpServer {
    /// Server implementation information
    pub server_info: Implementation,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Instructions returned to clients on initialization
    pub instructions: Option<String>,
    tools: BTreeMap<String, RegisteredTool>,
    resources: BTreeMap<String, RegisteredResource>,
}

struct RegisteredTool {
    tool: Tool,
    handler: Box<dyn ToolHandler>,
}

struct RegisteredResource {
    resource: Resource,
    handler: Box<dyn ResourceHandler>,
}

/// Connection state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Tool handler trait for implementing tool execution
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult>;
}

/// Resource handler trait for implementing resource access
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn handle(&self, uri: &str) -> Result<Vec<ResourceContents>>;
}

/// Message handler for one client connection
#[derive(Clone)]
pub struct MessageHandler {
    server: Arc<McpServer>,
    connection_state: Arc<RwLock<ConnectionState>>,
}

impl McpServer {
    /// Create a new MCP server with no tools or resources
    #[inline]
    pub fn new(name: String, version: String) -> Self {
        let server_info = Implementation { name, version };

        let capabilities = ServerCapabilities {
            logging: Some(LoggingCapability {}),
            resources: Some(ResourcesCapability {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        };

        Self {
            server_info,
            capabilities,
            instructions: None,
            tools: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }

    /// Set the instructions sent in the initialize response
    #[inline]
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Register a tool with the server
    #[inline]
    pub fn register_tool<H>(&mut self, tool: Tool, handler: H) -> Result<()>
    where
        H: ToolHandler + 'static,
    {
        let tool_name = tool.name.clone();
        if self.tools.contains_key(&tool_name) {
            anyhow::bail!("Tool already registered: {}", tool_name);
        }

        self.tools.insert(
            tool_name.clone(),
            RegisteredTool {
                tool,
                handler: Box::new(handler),
            },
        );

        debug!("Registered tool: {}", tool_name);
        Ok(())
    }

    /// Register a resource with the server
    #[inline]
    pub fn register_resource<H>(&mut self, resource: Resource, handler: H) -> Result<()>
    where
        H: ResourceHandler + 'static,
    {
        let resource_uri = resource.uri.clone();
        if self.resources.contains_key(&resource_uri) {
            anyhow::bail!("Resource already registered: {}", resource_uri);
        }

        self.resources.insert(
            resource_uri.clone(),
            RegisteredResource {
                resource,
                handler: Box::new(handler),
            },
        );

        debug!("Registered resource: {}", resource_uri);
        Ok(())
    }

    /// Names of the registered tools, sorted
    #[inline]
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// URIs of the registered resources, sorted
    #[inline]
    pub fn resource_uris(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        self.serve_lines(io::stdin(), io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC messages until the reader hits EOF
    #[inline]
    pub async fn serve_lines<R, W>(self: Arc<Self>, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let handler = MessageHandler::new(self);
        let mut reader = BufReader::new(reader);

        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let parsed = match std::str::from_utf8(&buffer) {
                        Ok(line) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            parse_message(line)
                        }
                        Err(e) => {
                            error!("Received a line that is not valid UTF-8: {}", e);
                            Err(JsonRpcError::parse_error())
                        }
                    };

                    let reply = match parsed {
                        Ok(message) => handler.process_message(message).await,
                        Err(error) => {
                            Some(JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(
                                error, None,
                            )))
                        }
                    };

                    if let Some(reply) = reply {
                        send_message(&mut writer, &reply).await?;
                    }
                }
                Err(e) => {
                    error!("Error reading from stdin: {}", e);
                    break;
                }
            }
        }

        handler.close().await;
        info!("MCP server stopped");
        Ok(())
    }
}

/// Parse one raw JSON-RPC message
///
/// Returns the JSON-RPC error to send back when the text is not JSON or not
/// a JSON-RPC 2.0 message.
#[inline]
pub fn parse_message(raw: &str) -> std::result::Result<JsonRpcMessage, JsonRpcError> {
    let raw_value: Value = serde_json::from_str(raw).map_err(|e| {
        error!("Failed to parse JSON: {}", e);
        JsonRpcError::parse_error()
    })?;

    match serde_json::from_value::<JsonRpcMessage>(raw_value) {
        Ok(message) if message.has_valid_version() => Ok(message),
        Ok(_) => {
            error!("Message validation failed: unsupported jsonrpc version");
            Err(JsonRpcError::invalid_request())
        }
        Err(e) => {
            error!("Message validation failed: {}", e);
            Err(JsonRpcError::invalid_request())
        }
    }
}

/// Write a message followed by a newline and flush
async fn send_message<W>(writer: &mut W, message: &JsonRpcMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(message)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>, method: &str) -> Result<T> {
    let params = params.ok_or_else(|| McpError::InvalidParameters {
        message: format!("{} request missing parameters", method),
    })?;

    serde_json::from_value(params).map_err(|e| {
        McpError::InvalidParameters {
            message: format!("{}: {}", method, e),
        }
        .into()
    })
}

impl MessageHandler {
    /// Create a handler for a new connection
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self {
            server,
            connection_state: Arc::new(RwLock::new(ConnectionState::Uninitialized)),
        }
    }

    /// Get current connection state
    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().await
    }

    /// Mark the connection as closed
    #[inline]
    pub async fn close(&self) {
        *self.connection_state.write().await = ConnectionState::Closed;
    }

    /// Process an incoming message, returning the reply to send, if any
    #[inline]
    pub async fn process_message(&self, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await;
                None
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                None
            }
        }
    }

    /// Handle a JSON-RPC request
    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        debug!("Handling request {} (id {:?})", request.method, request.id);

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(request.params).await,
            "resources/list" => self.handle_list_resources(),
            "resources/read" => self.handle_read_resource(request.params).await,
            "resources/templates/list" => {
                to_value(&ListResourceTemplatesResult {
                    resource_templates: Vec::new(),
                })
            }
            "ping" => Ok(serde_json::json!({})),
            _ => Err(McpError::MethodNotFound {
                method: request.method.clone(),
            }
            .into()),
        };

        match response {
            Ok(result) => JsonRpcMessage::Response(JsonRpcResponse::new(result, request.id)),
            Err(e) => {
                error!("Error handling request {}: {}", request.method, e);
                JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(
                    to_jsonrpc_error(&e),
                    Some(request.id),
                ))
            }
        }
    }

    /// Handle a JSON-RPC notification
    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => self.handle_initialized().await,
            "notifications/cancelled" => {
                debug!("Received cancellation notification");
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
            }
        }
    }

    /// Handle initialize request
    async fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let params: InitializeParams = parse_params(params, "initialize")?;

        let protocol_version = if is_protocol_version_supported(&params.protocol_version) {
            params.protocol_version.clone()
        } else {
            warn!(
                "Client requested unsupported protocol version {}, offering {}",
                params.protocol_version, MCP_VERSION
            );
            MCP_VERSION.to_string()
        };

        *self.connection_state.write().await = ConnectionState::Initializing;

        let result = InitializeResult {
            protocol_version,
            capabilities: self.server.capabilities.clone(),
            server_info: self.server.server_info.clone(),
            instructions: self.server.instructions.clone(),
        };

        info!(
            "Client initialized: {} {}",
            params.client_info.name, params.client_info.version
        );
        to_value(&result)
    }

    /// Handle initialized notification
    async fn handle_initialized(&self) {
        *self.connection_state.write().await = ConnectionState::Ready;
        info!("Server ready to handle requests");
    }

    /// Handle list tools request
    fn handle_list_tools(&self) -> Result<Value> {
        let tools = self
            .server
            .tools
            .values()
            .map(|registered| registered.tool.clone())
            .collect();

        to_value(&ListToolsResult { tools })
    }

    /// Handle call tool request
    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value> {
        let params: CallToolParams = parse_params(params, "tools/call")?;

        let registered =
            self.server
                .tools
                .get(&params.name)
                .ok_or_else(|| McpError::ToolNotFound {
                    name: params.name.clone(),
                })?;

        debug!("Calling tool {} with {:?}", params.name, params.arguments);
        let result = registered.handler.handle(params).await?;
        to_value(&result)
    }

    /// Handle list resources request
    fn handle_list_resources(&self) -> Result<Value> {
        let resources = self
            .server
            .resources
            .values()
            .map(|registered| registered.resource.clone())
            .collect();

        to_value(&ListResourcesResult { resources })
    }

    /// Handle read resource request
    async fn handle_read_resource(&self, params: Option<Value>) -> Result<Value> {
        let params: ReadResourceParams = parse_params(params, "resources/read")?;

        let registered =
            self.server
                .resources
                .get(&params.uri)
                .ok_or_else(|| McpError::ResourceNotFound {
                    uri: params.uri.clone(),
                })?;

        let contents = registered.handler.handle(&params.uri).await?;
        to_value(&ReadResourceResult { contents })
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

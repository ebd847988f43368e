//! Error types for the Maestro domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for a full agent run.
#[derive(Debug, Error)]
pub enum AgentError {
    // --- Catalog / conversation configuration ---
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The model named a function absent from the dispatch map.
    /// Fatal inside the primary dispatch loop; the `PluginManager`
    /// indirection layer downgrades it to a sentinel observation instead.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The model's function-call text failed both strict-JSON and
    /// permissive-literal parsing. Guessing intent risks executing the
    /// wrong tool with wrong arguments, so this aborts the run.
    #[error("Malformed function-call payload: {0}")]
    MalformedCall(String),

    // --- Model backend ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors that escaped the tool's own error policy ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Memory service ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    /// The model never emitted a final answer within the turn budget.
    #[error("Turn limit exceeded after {limit} completions")]
    TurnLimitExceeded { limit: u32 },

    /// The caller cancelled the run between loop iterations.
    #[error("Run cancelled")]
    Cancelled,
}

/// Result type alias using our error.
pub type Result<T> = std::result::Result<T, AgentError>;

// --- Bounded context errors ---

/// Malformed or duplicate tool declarations, detected before any model
/// call is made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Duplicate tool name in catalog: {0}")]
    DuplicateToolName(String),

    #[error("Malformed argument schema for tool {tool}: {reason}")]
    MalformedSchema { tool: String, reason: String },

    #[error("System message must be set before the first user turn")]
    SystemMessageLocked,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    /// A declared tool fault whose configured policy is to propagate.
    #[error("Tool {tool_name} failed: {message}")]
    Fault { tool_name: String, message: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),
}

use thiserror::Error;

/// Errors that can occur while bridging a tool call to the backend interpreter.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("failed to encode arguments: {message}")]
    ArgumentEncoding { message: String },

    #[error("failed to spawn interpreter '{command}': {message}")]
    ProcessSpawn { command: String, message: String },

    #[error("interpreter timed out after {timeout_ms}ms and was terminated")]
    ProcessTimeout { timeout_ms: u64 },

    #[error("interpreter exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("failed to decode interpreter output: {message} (output: {excerpt})")]
    Decode { message: String, excerpt: String },

    /// Structured `{"error": ...}` payload from the backend, passed through verbatim.
    #[error("{message}")]
    Backend { message: String },

    #[error("internal bridge error: {message}")]
    Internal { message: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {}", c),
        None => "a signal".to_string(),
    }
}

/// Error taxonomy reported to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownTool,
    InvalidArguments,
    ArgumentEncodingError,
    ProcessSpawnError,
    ProcessTimeout,
    NonZeroExit,
    DecodeError,
    BackendBusinessError,
    Internal,
    Transport,
    Config,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownTool => "UnknownTool",
            Self::InvalidArguments => "InvalidArguments",
            Self::ArgumentEncodingError => "ArgumentEncodingError",
            Self::ProcessSpawnError => "ProcessSpawnError",
            Self::ProcessTimeout => "ProcessTimeout",
            Self::NonZeroExit => "NonZeroExit",
            Self::DecodeError => "DecodeError",
            Self::BackendBusinessError => "BackendBusinessError",
            Self::Internal => "Internal",
            Self::Transport => "Transport",
            Self::Config => "Config",
        }
    }
}

impl BridgeError {
    /// Classifies this error into the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool { .. } => ErrorKind::UnknownTool,
            Self::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            Self::ArgumentEncoding { .. } | Self::Json(_) => ErrorKind::ArgumentEncodingError,
            Self::ProcessSpawn { .. } => ErrorKind::ProcessSpawnError,
            Self::ProcessTimeout { .. } => ErrorKind::ProcessTimeout,
            Self::NonZeroExit { .. } => ErrorKind::NonZeroExit,
            Self::Decode { .. } => ErrorKind::DecodeError,
            Self::Backend { .. } => ErrorKind::BackendBusinessError,
            Self::Internal { .. } | Self::Io(_) => ErrorKind::Internal,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Returns `true` for errors that end the whole process rather than a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Config)
    }
}

/// A classified error as surfaced to the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&BridgeError> for ErrorEnvelope {
    fn from(err: &BridgeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Convenience alias for results using `BridgeError`.
pub type Result<T> = std::result::Result<T, BridgeError>;

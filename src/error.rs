use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("report error: {0}")]
    Report(#[from] ReportError),
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("malformed report: {0}")]
    Malformed(String),
    #[error("report parse failed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown ABI type `{ty}` in `{method}`")]
    UnknownType { method: String, ty: String },
    #[error("argument #{index} `{token}` of `{method}` does not fit type `{ty}`: {reason}")]
    InvalidArgument {
        method: String,
        index: usize,
        ty: String,
        token: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o failure while running `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} stage reported `{marker}` after {attempts} attempt(s)")]
    Marker {
        stage: String,
        marker: String,
        attempts: u32,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    MissingConfig(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

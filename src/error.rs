use thiserror::Error;

#[derive(Error, Debug)]
pub enum DubError {
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Audio encoding failed: {0}")]
    Encoding(String),

    #[error("Remux failed: {0}")]
    Mux(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Required tool missing: {0}")]
    ToolMissing(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DubError {
    /// Name of the processing stage this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            DubError::Decode(_) => "decode",
            DubError::Encoding(_) => "encode",
            DubError::Mux(_) => "remux",
            DubError::FileNotFound(_) | DubError::Config(_) | DubError::ToolMissing(_) => "setup",
            DubError::Cancelled => "cancelled",
            DubError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, DubError>;

//! Error types for Porter

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PorterError {
    #[error("No port blocks available outside of ephemeral range {min}-{max}")]
    RangeExhausted { min: u16, max: u16 },

    #[error(
        "Block size too big or too many blocks allocated: \
         {lower_bound} + {blocks}*{block_size} exceeds 65535"
    )]
    BlockTooLarge {
        lower_bound: u16,
        blocks: u32,
        block_size: u32,
    },

    #[error("Could not reserve anchor port {port}: {source}")]
    ReservationFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Insufficient ports: requested {requested}, {available} available")]
    InsufficientPorts { requested: usize, available: usize },

    #[error("Unsupported OS: {0}")]
    UnsupportedOs(String),

    #[error("Ephemeral range query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Regex error: {0}")]
    RegexError(String),
}

impl From<regex::Error> for PorterError {
    fn from(err: regex::Error) -> Self {
        PorterError::RegexError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PorterError>;

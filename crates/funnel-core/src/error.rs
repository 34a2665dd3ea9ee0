#[derive(Debug, thiserror::Error)]
pub enum FunnelError {
    #[error("unknown line: {0}")]
    UnknownLine(String),
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FunnelError>;

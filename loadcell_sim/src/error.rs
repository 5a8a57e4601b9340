use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("broker session not connected")]
    NotConnected,
    #[error("publish acknowledgement refused")]
    AckRefused,
    #[error("lookup timeout")]
    Timeout,
    #[error("order {0} not found")]
    OrderNotFound(String),
    #[error("fixture error: {0}")]
    Fixture(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;

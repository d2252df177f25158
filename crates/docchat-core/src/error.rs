use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing required settings: {}", .0.join(", "))]
    MissingSettings(Vec<String>),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackwiseError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Service error: {0}")]
    Service(#[from] crate::gemini::ServiceError),
}

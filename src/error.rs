use thiserror::Error;

#[derive(Error, Debug)]
pub enum PKError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid model configuration: {0}")]
    InvalidModel(String),

    #[error("Invalid dose: {0}")]
    InvalidDose(String),

    #[error("Sampling error: {0}")]
    Sampling(String),

    #[error("Parameter validation error: {0}")]
    Validation(String),
}

pub type PKResult<T> = Result<T, PKError>;

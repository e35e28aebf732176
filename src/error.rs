use thiserror::Error;

#[derive(Error, Debug)]
pub enum DonorInsightsError {
    #[error("Unsupported file format '{0}': expected a .csv, .tsv or .txt export")]
    UnsupportedFormat(String),

    #[error("Empty import: {0}")]
    EmptyFile(String),

    #[error("Missing header row: {0}")]
    MissingHeader(String),

    #[error("Invalid configuration for '{field}': {details}")]
    InvalidConfig { field: String, details: String },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DonorInsightsError>;

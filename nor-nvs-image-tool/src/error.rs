use thiserror::Error;

/// Errors that can occur during CSV parsing, image generation, or image
/// parsing.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("base64 decoding error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("nvs error: {0}")]
    NvsError(#[from] nor_nvs::error::Error),
}

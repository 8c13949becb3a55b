use fsklink_core::ModemError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Modem(#[from] ModemError),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),
}

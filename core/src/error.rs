use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input size")]
    InvalidInputSize,

    #[error("{stage} consumed {consumed} items but only {available} were available")]
    ConsumeOverrun {
        stage: &'static str,
        consumed: usize,
        available: usize,
    },

    #[error("{stage} produced {produced} items into a buffer of {capacity}")]
    ProduceOverrun {
        stage: &'static str,
        produced: usize,
        capacity: usize,
    },

    #[error("Sample source error: {0}")]
    Source(String),
}

pub type Result<T> = std::result::Result<T, ModemError>;

use thiserror::Error;

/// Errors the engine recognizes, one variant per failure kind the driver
/// must distinguish between (fatal vs. recoverable vs. "skip this iteration").
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid or inconsistent configuration, caught at setup time.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// A population tensor's leading dim does not match the expected size.
    #[error("shape mismatch: expected leading dim {expected}, got {actual} ({context})")]
    ShapeMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    /// An RL update was requested before the buffer reached `min_sample_timesteps`.
    /// Not fatal: the driver records this in metrics and skips the update.
    #[error("replay buffer has {available} transitions, need at least {required}")]
    EmptyBuffer { available: usize, required: usize },

    /// Non-finite loss or parameter encountered. Fatal, no automatic recovery.
    #[error("numeric failure: {0}")]
    NumericFailure(String),

    /// Checkpoint failed to load. Recoverable by reloading the previous checkpoint.
    #[error("checkpoint I/O error: {0}")]
    CheckpointIOError(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

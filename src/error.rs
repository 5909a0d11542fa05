use thiserror::Error;

/// Main error type for the decision engine
#[derive(Error, Debug)]
pub enum StrataError {
    // Configuration errors (fatal, surface at construction)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing required configuration key: {0}")]
    MissingConfigKey(String),

    #[error("Unknown strategy mode: {0}")]
    UnknownStrategyMode(String),

    #[error("Instrument not in allow-list for strategy {strategy_id}: {key}")]
    MissingInstrument { strategy_id: String, key: String },

    #[error("Unregistered venue: {0}")]
    UnregisteredVenue(String),

    #[error("Malformed instrument key: {0}")]
    MalformedInstrumentKey(String),

    // Runtime degradation (non-fatal, counted into engine health)
    #[error("Rate lookup failed for {asset}: {reason}")]
    RateLookup { asset: String, reason: String },

    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("Strategy failure: {strategy_id} - {reason}")]
    StrategyFailure { strategy_id: String, reason: String },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

/// Specific error types for expected-delta computation.
///
/// These never escape the calculator: an error collapses the result to an
/// empty mapping, which callers must treat as "no-op, investigate".
#[derive(Error, Debug, Clone)]
pub enum DeltaError {
    #[error("Negative amount: {0}")]
    NegativeAmount(rust_decimal::Decimal),

    #[error("Non-positive price: {0}")]
    NonPositivePrice(rust_decimal::Decimal),

    #[error("Non-positive rate: {0}")]
    NonPositiveRate(rust_decimal::Decimal),

    #[error("Transfer token mismatch: {source_token} vs {target}")]
    TransferTokenMismatch { source_token: String, target: String },
}

impl From<DeltaError> for StrataError {
    fn from(err: DeltaError) -> Self {
        StrataError::Validation(err.to_string())
    }
}

use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors reported by a valuation engine while executing a recompute job.
#[derive(Error, Debug, Clone)]
pub enum ValuationError {
    #[error("valuation engine rejected job: {0}")]
    Rejected(String),

    #[error("valuation engine unavailable: {0}")]
    Unavailable(String),

    #[error("failed to decode valuation response: {0}")]
    Decode(String),
}

/// Errors reported by a game result source.
#[derive(Error, Debug, Clone)]
pub enum ResultSourceError {
    #[error("result source unavailable: {0}")]
    Unavailable(String),

    #[error("failed to decode game result for {game_id}: {reason}")]
    Decode { game_id: String, reason: String },
}

/// Contract violations when feeding the calibration harness.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("prediction {0} is already recorded")]
    DuplicatePrediction(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Valuation(#[from] ValuationError),

    #[error(transparent)]
    ResultSource(#[from] ResultSourceError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

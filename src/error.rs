use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Invalid geometry: {0}")]
    Validation(String),

    #[error("Forecast unavailable: {0}")]
    ForecastUnavailable(String),

    #[error("Storage error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Watering blocked by rain forecast for {0}")]
    RainBlocked(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl PlannerError {
    /// Transient provider failures that are worth another attempt.
    pub fn is_forecast_failure(&self) -> bool {
        matches!(self, PlannerError::ForecastUnavailable(_) | PlannerError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;

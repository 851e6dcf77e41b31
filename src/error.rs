use thiserror::Error;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("price source returned HTTP {0}")]
    Status(u16),

    #[error("malformed price response: {0}")]
    Malformed(String),

    #[error("price source returned a non-positive price: {0}")]
    NonPositive(f64),
}

#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("invalid birth date '{0}': expected D/M/YYYY or YYYY-MM-DD")]
    BirthDate(String),
}

impl ProjectionError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CalculationError {
    #[error(transparent)]
    Price(#[from] PriceError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

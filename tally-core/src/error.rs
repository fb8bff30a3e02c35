use chrono::NaiveDate;
use thiserror::Error;

/// Locally detected problems. Raised before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Start date cannot be after End date.")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Description is required.")]
    MissingDescription,

    #[error("Amount is required.")]
    MissingAmount,

    #[error("Amount '{0}' is not a number.")]
    InvalidAmount(String),

    #[error("Unknown category '{0}' (expected one of Food, Bills, Fuel, Entertainment, Other)")]
    UnknownCategory(String),

    #[error("Page must be 1 or greater.")]
    InvalidPage,
}

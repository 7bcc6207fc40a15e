use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum RentalError {
    #[error("invalid name '{0}': names must contain only letters and spaces")]
    InvalidName(String),
    #[error("invalid borrowing duration: {0} days")]
    InvalidDays(i64),
    #[error("reference items cannot be borrowed for more than 14 days (requested {days} for '{item}')")]
    ReferenceBookLimit { item: String, days: i64 },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RentalError>;

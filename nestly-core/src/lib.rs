pub mod booking;
pub mod models;
pub mod repository;
pub mod validation;

pub use booking::{BookingCandidate, BookingConflict, ConflictField, DateRange};
pub use validation::FieldErrors;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),
    #[error("Booking conflict: {0}")]
    BookingConflict(BookingConflict),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {field} {value}")]
    AlreadyExists { field: &'static str, value: String },
    #[error("Concurrent write rejected: {0}")]
    Contention(String),
    #[error("Internal service error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<FieldErrors> for CoreError {
    fn from(errors: FieldErrors) -> Self {
        CoreError::Validation(errors)
    }
}

impl From<BookingConflict> for CoreError {
    fn from(conflict: BookingConflict) -> Self {
        CoreError::BookingConflict(conflict)
    }
}

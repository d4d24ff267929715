//! Booking date rules and the overlap check run before every booking write.
//!
//! Ranges are closed on both ends at day granularity: a booking ending on the
//! 5th and another starting on the 5th share that date and conflict.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Booking, BookingInput};
use crate::validation::FieldErrors;

pub const CONFLICT_MESSAGE: &str = "Sorry, this spot is already booked for the specified dates";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A closed `[start, end]` date range with `end` strictly after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FieldErrors> {
        if end <= start {
            return Err(FieldErrors::single(
                "endDate",
                "endDate cannot be on or before startDate",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        ranges_overlap(self.start, self.end, other.start, other.end)
    }
}

/// Inclusive overlap test: `[s1, e1]` and `[s2, e2]` share at least one date.
pub fn ranges_overlap(s1: NaiveDate, e1: NaiveDate, s2: NaiveDate, e2: NaiveDate) -> bool {
    s1 <= e2 && s2 <= e1
}

fn parse_date(raw: Option<&str>, field: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    match raw.map(str::trim) {
        None | Some("") => {
            errors.add(field, format!("{field} is required"));
            None
        }
        Some(value) => match NaiveDate::parse_from_str(value, DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(_) => {
                errors.add(field, format!("{field} must be a valid date (YYYY-MM-DD)"));
                None
            }
        },
    }
}

/// Parse and check a booking body against `today`.
///
/// Structural problems (missing or malformed dates, dates in the past, an end
/// on or before the start) are all reported here, before any overlap scan.
pub fn check_booking_dates(input: &BookingInput, today: NaiveDate) -> Result<DateRange, FieldErrors> {
    check_dates(input, today, None)
}

/// Like [`check_booking_dates`], for moving an existing booking.
///
/// A stay already in progress keeps its start date, so resubmitting
/// `booking.start_date` is accepted even when it lies before `today`.
pub fn check_rescheduled_dates(
    input: &BookingInput,
    today: NaiveDate,
    booking: &Booking,
) -> Result<DateRange, FieldErrors> {
    check_dates(input, today, Some(booking.start_date))
}

fn check_dates(
    input: &BookingInput,
    today: NaiveDate,
    kept_start: Option<NaiveDate>,
) -> Result<DateRange, FieldErrors> {
    let mut errors = FieldErrors::new();
    let start = parse_date(input.start_date.as_deref(), "startDate", &mut errors);
    let end = parse_date(input.end_date.as_deref(), "endDate", &mut errors);

    if let Some(start) = start {
        if start < today && kept_start != Some(start) {
            errors.add("startDate", "startDate cannot be in the past");
        }
    }
    if let Some(end) = end {
        if end < today {
            errors.add("endDate", "endDate cannot be in the past");
        }
    }

    match (start, end) {
        (Some(start), Some(end)) if errors.is_empty() => DateRange::new(start, end),
        (Some(start), Some(end)) => {
            if end <= start {
                errors.add("endDate", "endDate cannot be on or before startDate");
            }
            Err(errors)
        }
        _ => Err(errors),
    }
}

// ============================================================================
// Overlap Validator
// ============================================================================

/// A booking write waiting to be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingCandidate {
    pub spot_id: i32,
    pub range: DateRange,
    /// Set on updates so a booking never conflicts with itself.
    pub exclude_booking_id: Option<i32>,
}

impl BookingCandidate {
    pub fn new(spot_id: i32, range: DateRange) -> Self {
        Self {
            spot_id,
            range,
            exclude_booking_id: None,
        }
    }

    pub fn replacing(booking: &Booking, range: DateRange) -> Self {
        Self {
            spot_id: booking.spot_id,
            range,
            exclude_booking_id: Some(booking.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictField {
    #[serde(rename = "startDate")]
    StartDate,
    #[serde(rename = "endDate")]
    EndDate,
}

impl ConflictField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictField::StartDate => "startDate",
            ConflictField::EndDate => "endDate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConflict {
    pub field: ConflictField,
    pub message: String,
    pub booking_id: i32,
}

impl BookingConflict {
    fn new(field: ConflictField, booking_id: i32) -> Self {
        let message = match field {
            ConflictField::StartDate => "Start date conflicts with an existing booking",
            ConflictField::EndDate => "End date conflicts with an existing booking",
        };
        Self {
            field,
            message: message.to_string(),
            booking_id,
        }
    }

    /// The `{field: message}` map sent back to clients.
    pub fn errors(&self) -> FieldErrors {
        FieldErrors::single(self.field.as_str(), self.message.clone())
    }
}

impl fmt::Display for BookingConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (booking {})", self.message, self.booking_id)
    }
}

/// Which boundary of `candidate` collides with `existing`, if any.
///
/// A start date inside the booked range is a start conflict; otherwise an end
/// date inside it, or a candidate that swallows the booked range whole, is an
/// end conflict.
fn conflicting_boundary(candidate: &DateRange, existing: &DateRange) -> Option<ConflictField> {
    if !candidate.overlaps(existing) {
        return None;
    }
    if existing.contains(candidate.start) {
        Some(ConflictField::StartDate)
    } else {
        Some(ConflictField::EndDate)
    }
}

/// Reject `candidate` if it overlaps any booking of the same spot.
///
/// Bookings for other spots and the booking being replaced are skipped. The
/// first conflict found is returned.
pub fn validate<'a, I>(candidate: &BookingCandidate, existing: I) -> Result<(), BookingConflict>
where
    I: IntoIterator<Item = &'a Booking>,
{
    for booking in existing {
        if booking.spot_id != candidate.spot_id {
            continue;
        }
        if candidate.exclude_booking_id == Some(booking.id) {
            continue;
        }
        let booked = DateRange {
            start: booking.start_date,
            end: booking.end_date,
        };
        if let Some(field) = conflicting_boundary(&candidate.range, &booked) {
            tracing::debug!(
                spot_id = candidate.spot_id,
                booking_id = booking.id,
                field = field.as_str(),
                "booking overlaps an existing booking"
            );
            return Err(BookingConflict::new(field, booking.id));
        }
    }
    Ok(())
}

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::BookingError;

/// Upper bound on seats a single booking may claim.
pub const MAX_SEATS_PER_BOOKING: usize = 5;

/// A seat identifier such as `A1` or `J9`: one row letter followed by a
/// seat number. Always stored upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatLabel(String);

impl SeatLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn row(&self) -> char {
        // Constructors guarantee a leading ASCII letter.
        self.0.chars().next().unwrap_or('A')
    }

    pub fn number(&self) -> u16 {
        self.0[1..].parse().unwrap_or(0)
    }
}

impl FromStr for SeatLabel {
    type Err = BookingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let mut chars = trimmed.chars();
        let row = chars
            .next()
            .filter(|c| c.is_ascii_alphabetic())
            .ok_or_else(|| BookingError::InvalidRequest(format!("Malformed seat label: {:?}", raw)))?;

        let digits = chars.as_str();
        let valid_number = !digits.is_empty()
            && !digits.starts_with('0')
            && digits.len() <= 3
            && digits.chars().all(|c| c.is_ascii_digit());
        if !valid_number {
            return Err(BookingError::InvalidRequest(format!("Malformed seat label: {:?}", raw)));
        }

        Ok(Self(format!("{}{}", row.to_ascii_uppercase(), digits)))
    }
}

impl TryFrom<String> for SeatLabel {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeatLabel> for String {
    fn from(label: SeatLabel) -> Self {
        label.0
    }
}

impl fmt::Display for SeatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn join_labels(labels: &[SeatLabel]) -> String {
    labels.iter().map(SeatLabel::as_str).collect::<Vec<_>>().join(", ")
}

/// Physical seating of an auditorium: rows `A`..=`last_row`, seats
/// `1..=seats_per_row` in each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatLayout {
    pub last_row: char,
    pub seats_per_row: u16,
}

impl Default for SeatLayout {
    /// Ten rows of nine seats, the auditorium every show is sold against.
    fn default() -> Self {
        Self {
            last_row: 'J',
            seats_per_row: 9,
        }
    }
}

impl SeatLayout {
    pub fn contains(&self, label: &SeatLabel) -> bool {
        let row = label.row();
        let number = label.number();
        ('A'..=self.last_row).contains(&row) && (1..=self.seats_per_row).contains(&number)
    }

    pub fn capacity(&self) -> usize {
        let rows = (self.last_row as u8).saturating_sub(b'A') as usize + 1;
        rows * self.seats_per_row as usize
    }
}

/// A validated reservation attempt: non-empty, unique, inside the layout and
/// within the per-booking cap. Preserves the order the caller chose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatSelection(Vec<SeatLabel>);

impl SeatSelection {
    pub fn validate<S: AsRef<str>>(
        raw: &[S],
        layout: &SeatLayout,
        max_seats: usize,
    ) -> Result<Self, BookingError> {
        if raw.is_empty() {
            return Err(BookingError::InvalidRequest("Select at least one seat".to_string()));
        }
        if raw.len() > max_seats {
            return Err(BookingError::InvalidRequest(format!(
                "You can select a maximum of {} seats",
                max_seats
            )));
        }

        let mut seen = HashSet::with_capacity(raw.len());
        let mut labels = Vec::with_capacity(raw.len());
        for value in raw {
            let label: SeatLabel = value.as_ref().parse()?;
            if !layout.contains(&label) {
                return Err(BookingError::InvalidRequest(format!(
                    "Seat {} does not exist in this auditorium",
                    label
                )));
            }
            if !seen.insert(label.clone()) {
                return Err(BookingError::InvalidRequest(format!("Seat {} selected twice", label)));
            }
            labels.push(label);
        }

        Ok(Self(labels))
    }

    pub fn as_slice(&self) -> &[SeatLabel] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<SeatLabel> {
        self.0
    }
}

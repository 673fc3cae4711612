//! Reporting periods

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Calendar-day range, inclusive on both ends. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, DomainError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(DomainError::validation(format!(
                    "start date {} is after end date {}",
                    start, end
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Unbounded range.
    pub fn all() -> Self {
        Self::default()
    }

    /// Fiscal years follow the calendar year.
    pub fn fiscal_year(year: i32) -> Result<Self, DomainError> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| DomainError::validation(format!("invalid fiscal year: {}", year)))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| DomainError::validation(format!("invalid fiscal year: {}", year)))?;
        Ok(Self {
            start: Some(start),
            end: Some(end),
        })
    }

    /// Explicit bounds win; otherwise fall back to the fiscal year, if any.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        fiscal_year: Option<i32>,
    ) -> Result<Self, DomainError> {
        match (start, end, fiscal_year) {
            (None, None, Some(year)) => Self::fiscal_year(year),
            _ => Self::new(start, end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }

    pub fn is_bounded(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

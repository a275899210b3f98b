//! Month-window arithmetic for fetch runs.

use chrono::{Datelike, NaiveDate};

use crate::ConfigError;

/// How many months the default window spans, including the current month.
const DEFAULT_WINDOW_MONTHS: u32 = 6;

/// An inclusive (year, month) range describing which months to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: i32,
    pub end_month: u32,
}

impl MonthWindow {
    /// Builds a validated window.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a month is outside `1..=12` or
    /// the start lies after the end.
    pub fn new(
        start_year: i32,
        start_month: u32,
        end_year: i32,
        end_month: u32,
    ) -> Result<Self, ConfigError> {
        for (label, month) in [("start", start_month), ("end", end_month)] {
            if !(1..=12).contains(&month) {
                return Err(ConfigError::Validation(format!(
                    "{label} month {month} is out of range 1..=12"
                )));
            }
        }
        if (start_year, start_month) > (end_year, end_month) {
            return Err(ConfigError::Validation(format!(
                "window start {start_month}.{start_year} lies after end {end_month}.{end_year}"
            )));
        }
        Ok(Self {
            start_year,
            start_month,
            end_year,
            end_month,
        })
    }

    /// The trailing six-month window ending at `today`'s month.
    #[must_use]
    pub fn trailing_default(today: NaiveDate) -> Self {
        let end_year = today.year();
        let end_month = today.month();

        let mut start_month = i64::from(end_month) - i64::from(DEFAULT_WINDOW_MONTHS - 1);
        let mut start_year = end_year;
        if start_month <= 0 {
            start_month += 12;
            start_year -= 1;
        }

        Self {
            start_year,
            // The borrow above guarantees 1..=12.
            start_month: u32::try_from(start_month).unwrap_or(1),
            end_year,
            end_month,
        }
    }

    /// Combines per-field overrides with the trailing default window.
    ///
    /// Each field falls back independently, so a caller may pin only the end
    /// year, only the start month, and so on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the combined window is invalid.
    pub fn resolve(
        start_year: Option<i32>,
        start_month: Option<u32>,
        end_year: Option<i32>,
        end_month: Option<u32>,
        today: NaiveDate,
    ) -> Result<Self, ConfigError> {
        let default = Self::trailing_default(today);
        Self::new(
            start_year.unwrap_or(default.start_year),
            start_month.unwrap_or(default.start_month),
            end_year.unwrap_or(default.end_year),
            end_month.unwrap_or(default.end_month),
        )
    }

    /// All (year, month) pairs in the window, in chronological order.
    #[must_use]
    pub fn months(&self) -> Vec<(i32, u32)> {
        let mut out = Vec::new();
        for year in self.start_year..=self.end_year {
            let first = if year == self.start_year {
                self.start_month
            } else {
                1
            };
            let last = if year == self.end_year {
                self.end_month
            } else {
                12
            };
            for month in first..=last {
                out.push((year, month));
            }
        }
        out
    }
}

impl std::fmt::Display for MonthWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} – {}.{}",
            self.start_month, self.start_year, self.end_month, self.end_year
        )
    }
}

//! Simulation clock and time derivations.
//!
//! The clock is the single source of truth for simulated time. It owns a
//! monotonic step counter; days, years, hours and calendar dates are all
//! derived from it and never stored independently.
//!
//! # Conventions
//!
//! - `day = step / steps_per_day`, `year = day / 365`,
//!   `day_of_year = (day % 365) + 1`. Simulated years are always 365 days.
//! - Calendar dates are derived separately: the configured start date plus
//!   the elapsed years, plus `day_of_year - 1` days. Leap days therefore
//!   shift the calendar, not the simulated count.
//! - Before the first step the clock has no current step. Reads report
//!   step 0, and [`SimulationClock::next_step`] is 0.

use chrono::{Days, Months, NaiveDate};

use crate::config::TimeConfig;

/// Length of a simulated year in days.
pub const DAYS_PER_YEAR: u64 = 365;

/// Hours in one simulated day.
pub const HOURS_PER_DAY: u32 = 24;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Step counter would overflow.
    #[error("step counter overflow: cannot advance beyond u64::MAX")]
    StepOverflow,

    /// Invalid time configuration (e.g. zero steps per day).
    #[error("invalid time configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },

    /// The derived calendar date does not fit in the calendar range.
    #[error("calendar date out of range at year {year}, day {day_of_year}")]
    DateOutOfRange {
        /// Simulated year.
        year: u64,
        /// Simulated day of year (1-based).
        day_of_year: u64,
    },
}

/// Monotonic step counter with derived day/year/hour reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationClock {
    /// The step currently executing (or last executed); `None` before the
    /// first step.
    step: Option<u64>,

    /// Steps in one simulated day (at least 1).
    steps_per_day: u32,

    /// Calendar date of step 0.
    start_date: NaiveDate,
}

impl SimulationClock {
    /// Create a clock that has not taken its first step yet.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `steps_per_day` is 0.
    pub fn new(steps_per_day: u32, start_date: NaiveDate) -> Result<Self, ClockError> {
        if steps_per_day == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "steps_per_day must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            step: None,
            steps_per_day,
            start_date,
        })
    }

    /// Create a clock from the scenario's time section.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if the configuration is invalid.
    pub fn from_config(config: &TimeConfig) -> Result<Self, ClockError> {
        Self::new(config.steps_per_day, config.start_date)
    }

    /// Advance to the next step. Returns the new step number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::StepOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        let next = self.next_step()?;
        self.step = Some(next);
        Ok(next)
    }

    /// The step the next call to [`advance`](Self::advance) will move to.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::StepOverflow`] at `u64::MAX`.
    pub fn next_step(&self) -> Result<u64, ClockError> {
        match self.step {
            None => Ok(0),
            Some(step) => step.checked_add(1).ok_or(ClockError::StepOverflow),
        }
    }

    /// Whether the first step has been taken.
    pub const fn has_started(&self) -> bool {
        self.step.is_some()
    }

    /// The current step, or `None` before the first step.
    pub const fn step(&self) -> Option<u64> {
        self.step
    }

    /// The current step (0 before the first step).
    pub const fn now(&self) -> u64 {
        match self.step {
            Some(step) => step,
            None => 0,
        }
    }

    /// Steps in one simulated day.
    pub const fn steps_per_day(&self) -> u32 {
        self.steps_per_day
    }

    /// Steps in one simulated year.
    pub fn steps_per_year(&self) -> u64 {
        u64::from(self.steps_per_day).saturating_mul(DAYS_PER_YEAR)
    }

    /// Calendar date of step 0.
    pub const fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Days elapsed since the start.
    pub fn day(&self) -> u64 {
        self.now()
            .checked_div(u64::from(self.steps_per_day))
            .unwrap_or(0)
    }

    /// Whole simulated years elapsed since the start.
    pub fn year(&self) -> u64 {
        self.day().checked_div(DAYS_PER_YEAR).unwrap_or(0)
    }

    /// Day within the current simulated year, from 1 to 365.
    pub fn day_of_year(&self) -> u64 {
        self.day()
            .checked_rem(DAYS_PER_YEAR)
            .unwrap_or(0)
            .saturating_add(1)
    }

    /// Hours represented by one step.
    pub fn hours_per_step(&self) -> f64 {
        f64::from(HOURS_PER_DAY) / f64::from(self.steps_per_day)
    }

    /// Hour of the day at the start of the current step, in `[0, 24)`.
    pub fn hour(&self) -> f64 {
        let within_day = self
            .now()
            .checked_rem(u64::from(self.steps_per_day))
            .unwrap_or(0);
        // The remainder is below steps_per_day, which is a u32.
        let within_day = u32::try_from(within_day).unwrap_or(0);
        f64::from(within_day) * self.hours_per_step()
    }

    /// Hours elapsed since step 0.
    pub fn hours_since_start(&self) -> f64 {
        // Step counts stay far below 2^52 in any practical run.
        #[allow(clippy::cast_precision_loss)]
        let steps = self.now() as f64;
        steps * self.hours_per_step()
    }

    /// Whether the current step is the last step of its day.
    pub fn is_last_step_of_day(&self) -> bool {
        self.step.is_some_and(|step| {
            step.checked_add(1)
                .and_then(|n| n.checked_rem(u64::from(self.steps_per_day)))
                == Some(0)
        })
    }

    /// Whether the current step is the last step of its simulated year.
    pub fn is_last_step_of_year(&self) -> bool {
        let per_year = self.steps_per_year();
        self.step.is_some_and(|step| {
            step.checked_add(1).and_then(|n| n.checked_rem(per_year)) == Some(0)
        })
    }

    /// Calendar date of the current step.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::DateOutOfRange`] if the date overflows the
    /// calendar.
    pub fn date(&self) -> Result<NaiveDate, ClockError> {
        let year = self.year();
        let day_of_year = self.day_of_year();
        let out_of_range = || ClockError::DateOutOfRange { year, day_of_year };

        let months = u32::try_from(year)
            .ok()
            .and_then(|y| y.checked_mul(12))
            .ok_or_else(out_of_range)?;
        self.start_date
            .checked_add_months(Months::new(months))
            .and_then(|d| d.checked_add_days(Days::new(day_of_year.saturating_sub(1))))
            .ok_or_else(out_of_range)
    }
}

//! Dated dashboard records
//!
//! One record per employee per month. Field names serialize camelCase to
//! match what the dashboard already keeps in storage.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("month {0} is outside 1..=12")]
pub struct InvalidMonth(pub u32);

/// A calendar month; stored data with an out-of-range month fails to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct Period {
    pub year: i32,
    /// 1..=12
    pub month: u32,
}

impl Period {
    /// `None` unless `month` is 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// January of the same year
    pub fn year_start(&self) -> Self {
        Self {
            year: self.year,
            month: 1,
        }
    }
}

#[derive(Deserialize)]
struct RawPeriod {
    year: i32,
    month: u32,
}

impl TryFrom<RawPeriod> for Period {
    type Error = InvalidMonth;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        Self::new(raw.year, raw.month).ok_or(InvalidMonth(raw.month))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Records that can be sliced by period, division and location
pub trait Dimensioned {
    fn period(&self) -> Period;
    fn division(&self) -> &str;
    fn location(&self) -> &str;
}

/// Services delivered by one employee in one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub employee: String,
    pub division: String,
    pub location: String,
    pub period: Period,
    pub unit_price: f64,
    pub count: u32,
    /// Percent of booked hours spent in service
    pub productivity_rate: f64,
    /// Percent of clients who pre-booked their next visit
    pub prebook_rate: f64,
}

impl ServiceRecord {
    pub fn revenue(&self) -> f64 {
        self.unit_price * f64::from(self.count)
    }
}

impl Dimensioned for ServiceRecord {
    fn period(&self) -> Period {
        self.period
    }

    fn division(&self) -> &str {
        &self.division
    }

    fn location(&self) -> &str {
        &self.location
    }
}

/// Payroll for one employee in one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRecord {
    pub employee: String,
    pub division: String,
    pub location: String,
    pub period: Period,
    pub hours: f64,
    pub hourly_rate: f64,
    #[serde(default)]
    pub bonus: f64,
}

impl PayrollRecord {
    pub fn gross_pay(&self) -> f64 {
        self.hours * self.hourly_rate + self.bonus
    }
}

impl Dimensioned for PayrollRecord {
    fn period(&self) -> Period {
        self.period
    }

    fn division(&self) -> &str {
        &self.division
    }

    fn location(&self) -> &str {
        &self.location
    }
}

/// Annual revenue goal, company-wide or for one division
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualGoal {
    pub year: i32,
    #[serde(default)]
    pub division: Option<String>,
    pub revenue_goal: f64,
}

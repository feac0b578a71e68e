//! Dashboard aggregation
//!
//! Records are filtered by period and optional division/location, then
//! reduced to totals, flat means and percent-of-goal figures.

pub mod aggregate;
pub mod import;
pub mod records;

pub use aggregate::{
    DivisionSummary, PayrollRatio, RecordFilter, YtdProgress, division_rollup, mean_rate,
    payroll_to_revenue, percent_of_goal, total_revenue, ytd_progress,
};
pub use import::{ImportError, KpiRow, parse_delimited, validate_rows};
pub use records::{AnnualGoal, Dimensioned, InvalidMonth, PayrollRecord, Period, ServiceRecord};

//! Roll-up pipelines: filter dated records, then reduce
//!
//! Rate fields are averaged with a flat arithmetic mean, not weighted by
//! service count or hours.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::records::{AnnualGoal, Dimensioned, PayrollRecord, Period, ServiceRecord};
use crate::scoring::{ScoreLevel, js_round, score_level, score_percentage};

/// Record selection; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub period: Option<Period>,
    pub division: Option<String>,
    pub location: Option<String>,
}

impl RecordFilter {
    pub fn for_period(period: Period) -> Self {
        Self {
            period: Some(period),
            ..Default::default()
        }
    }

    pub fn division(mut self, division: impl Into<String>) -> Self {
        self.division = Some(division.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn matches<R: Dimensioned>(&self, record: &R) -> bool {
        self.period.is_none_or(|p| record.period() == p)
            && self.division.as_deref().is_none_or(|d| record.division() == d)
            && self.location.as_deref().is_none_or(|l| record.location() == l)
    }

    pub fn apply<'a, R: Dimensioned>(&'a self, records: &'a [R]) -> impl Iterator<Item = &'a R> + 'a {
        records.iter().filter(move |r| self.matches(*r))
    }
}

/// `sum(unit_price * count)`
pub fn total_revenue<'a>(records: impl IntoIterator<Item = &'a ServiceRecord>) -> f64 {
    records.into_iter().map(ServiceRecord::revenue).sum()
}

/// Flat mean of a rate field; `0.0` for no records
pub fn mean_rate<'a, R: 'a>(records: impl IntoIterator<Item = &'a R>, field: impl Fn(&R) -> f64) -> f64 {
    let (sum, n) = records
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), r| (sum + field(r), n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Whole-number percent of goal (zero goal scores 0)
pub fn percent_of_goal(actual: f64, goal: f64) -> i64 {
    score_percentage(actual, goal)
}

/// Per-division summary for one period (or all periods)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionSummary {
    pub revenue: f64,
    pub services: u64,
    pub employees: usize,
    pub avg_productivity: f64,
    pub avg_prebook: f64,
}

/// Group service records by division
pub fn division_rollup(records: &[ServiceRecord], period: Option<Period>) -> BTreeMap<String, DivisionSummary> {
    let filter = RecordFilter {
        period,
        ..Default::default()
    };

    let mut grouped: BTreeMap<&str, Vec<&ServiceRecord>> = BTreeMap::new();
    for record in filter.apply(records) {
        grouped.entry(record.division.as_str()).or_default().push(record);
    }

    grouped
        .into_iter()
        .map(|(division, rows)| {
            let employees: BTreeSet<&str> = rows.iter().map(|r| r.employee.as_str()).collect();
            let summary = DivisionSummary {
                revenue: total_revenue(rows.iter().copied()),
                services: rows.iter().map(|r| u64::from(r.count)).sum(),
                employees: employees.len(),
                avg_productivity: mean_rate(rows.iter().copied(), |r| r.productivity_rate),
                avg_prebook: mean_rate(rows.iter().copied(), |r| r.prebook_rate),
            };
            (division.to_string(), summary)
        })
        .collect()
}

/// Payroll cost relative to revenue for the same slice
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRatio {
    pub payroll: f64,
    pub revenue: f64,
    /// Payroll as a percentage of revenue to one decimal; `None` without revenue
    pub ratio: Option<f64>,
}

pub fn payroll_to_revenue(
    payroll: &[PayrollRecord],
    services: &[ServiceRecord],
    filter: &RecordFilter,
) -> PayrollRatio {
    let payroll_total: f64 = filter.apply(payroll).map(PayrollRecord::gross_pay).sum();
    let revenue = total_revenue(filter.apply(services));
    let ratio = (revenue != 0.0).then(|| js_round(payroll_total / revenue * 1000.0) / 10.0);

    PayrollRatio {
        payroll: payroll_total,
        revenue,
        ratio,
    }
}

/// Year-to-date revenue against an annual goal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YtdProgress {
    pub through: Period,
    pub revenue: f64,
    pub goal: f64,
    /// Revenue as a percent of the full-year goal
    pub percent_of_goal: i64,
    /// Share of the year elapsed, as a percent
    pub expected_percent: f64,
    /// Revenue scored against the pro-rated goal
    pub level: ScoreLevel,
}

/// Revenue from January through `through_month` of the goal's year
///
/// A division goal only counts that division's records. `through_month`
/// is clamped to 1..=12.
pub fn ytd_progress(records: &[ServiceRecord], goal: &AnnualGoal, through_month: u32) -> YtdProgress {
    let month = through_month.clamp(1, 12);
    let through = Period {
        year: goal.year,
        month,
    };

    let revenue = total_revenue(records.iter().filter(|r| {
        r.period >= through.year_start()
            && r.period <= through
            && goal.division.as_deref().is_none_or(|d| r.division == d)
    }));

    let elapsed = f64::from(month) / 12.0;
    YtdProgress {
        through,
        revenue,
        goal: goal.revenue_goal,
        percent_of_goal: percent_of_goal(revenue, goal.revenue_goal),
        expected_percent: elapsed * 100.0,
        level: score_level(revenue, goal.revenue_goal * elapsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(employee: &str, division: &str, location: &str, month: u32, price: f64, count: u32, prod: f64) -> ServiceRecord {
        ServiceRecord {
            employee: employee.into(),
            division: division.into(),
            location: location.into(),
            period: Period::new(2024, month).unwrap(),
            unit_price: price,
            count,
            productivity_rate: prod,
            prebook_rate: prod / 2.0,
        }
    }

    fn payroll(employee: &str, division: &str, month: u32, hours: f64, rate: f64) -> PayrollRecord {
        PayrollRecord {
            employee: employee.into(),
            division: division.into(),
            location: "Downtown".into(),
            period: Period::new(2024, month).unwrap(),
            hours,
            hourly_rate: rate,
            bonus: 0.0,
        }
    }

    fn sample() -> Vec<ServiceRecord> {
        vec![
            service("Ana", "Med Spa", "Downtown", 1, 200.0, 10, 90.0),
            service("Ben", "Med Spa", "Uptown", 1, 150.0, 4, 70.0),
            service("Cai", "Wellness", "Downtown", 1, 80.0, 25, 60.0),
            service("Ana", "Med Spa", "Downtown", 2, 200.0, 12, 95.0),
            service("Cai", "Wellness", "Downtown", 3, 80.0, 30, 65.0),
        ]
    }

    #[test]
    fn test_filter_by_period_and_dimensions() {
        let records = sample();
        let jan = Period::new(2024, 1).unwrap();

        assert_eq!(RecordFilter::for_period(jan).apply(&records).count(), 3);
        assert_eq!(RecordFilter::for_period(jan).division("Med Spa").apply(&records).count(), 2);
        assert_eq!(
            RecordFilter::for_period(jan)
                .division("Med Spa")
                .location("Uptown")
                .apply(&records)
                .count(),
            1
        );
        assert_eq!(RecordFilter::default().apply(&records).count(), records.len());
    }

    #[test]
    fn test_revenue_and_flat_mean() {
        let records = sample();
        let jan = RecordFilter::for_period(Period::new(2024, 1).unwrap());

        assert_eq!(total_revenue(jan.apply(&records)), 2000.0 + 600.0 + 2000.0);
        // Unweighted: Ben's 4 services count as much as Cai's 25
        let avg = mean_rate(jan.apply(&records), |r| r.productivity_rate);
        assert!((avg - (90.0 + 70.0 + 60.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_of_nothing_is_zero() {
        let empty: Vec<ServiceRecord> = Vec::new();
        assert_eq!(mean_rate(&empty, |r| r.prebook_rate), 0.0);
        assert_eq!(total_revenue(&empty), 0.0);
    }

    #[test]
    fn test_percent_of_goal() {
        assert_eq!(percent_of_goal(4600.0, 5000.0), 92);
        assert_eq!(percent_of_goal(7500.0, 5000.0), 150);
        assert_eq!(percent_of_goal(100.0, 0.0), 0);
    }

    #[test]
    fn test_rollup_service_count_does_not_wrap() {
        let busy = vec![
            service("Ana", "Med Spa", "Downtown", 1, 0.0, u32::MAX, 90.0),
            service("Ben", "Med Spa", "Downtown", 1, 0.0, u32::MAX, 70.0),
        ];
        let rollup = division_rollup(&busy, None);
        assert_eq!(rollup["Med Spa"].services, 2 * u64::from(u32::MAX));
    }

    #[test]
    fn test_division_rollup() {
        let rollup = division_rollup(&sample(), Period::new(2024, 1));
        assert_eq!(rollup.keys().collect::<Vec<_>>(), vec!["Med Spa", "Wellness"]);

        let med = &rollup["Med Spa"];
        assert_eq!(med.revenue, 2600.0);
        assert_eq!(med.services, 14);
        assert_eq!(med.employees, 2);
        assert_eq!(med.avg_productivity, 80.0);
        assert_eq!(med.avg_prebook, 40.0);

        let all_time = division_rollup(&sample(), None);
        assert_eq!(all_time["Med Spa"].employees, 2);
        assert_eq!(all_time["Wellness"].revenue, 2000.0 + 2400.0);
    }

    #[test]
    fn test_payroll_ratio() {
        let services = sample();
        let pay = vec![
            payroll("Ana", "Med Spa", 1, 80.0, 20.0),
            payroll("Ben", "Med Spa", 1, 40.0, 18.0),
            payroll("Cai", "Wellness", 1, 100.0, 16.0),
        ];
        let filter = RecordFilter::for_period(Period::new(2024, 1).unwrap()).division("Med Spa");

        let ratio = payroll_to_revenue(&pay, &services, &filter);
        assert_eq!(ratio.payroll, 2320.0);
        assert_eq!(ratio.revenue, 2600.0);
        assert_eq!(ratio.ratio, Some(89.2));

        let nothing = RecordFilter::for_period(Period::new(2024, 6).unwrap());
        assert_eq!(payroll_to_revenue(&pay, &services, &nothing).ratio, None);
    }

    #[test]
    fn test_ytd_progress_company_goal() {
        let goal = AnnualGoal {
            year: 2024,
            division: None,
            revenue_goal: 48_000.0,
        };
        let progress = ytd_progress(&sample(), &goal, 3);

        assert_eq!(progress.through, Period::new(2024, 3).unwrap());
        assert_eq!(progress.revenue, 4600.0 + 2400.0 + 2400.0);
        assert_eq!(progress.percent_of_goal, 20);
        assert_eq!(progress.expected_percent, 25.0);
        // 9,400 against a pro-rated 12,000 is 78%
        assert_eq!(progress.level, ScoreLevel::Warning);
    }

    #[test]
    fn test_ytd_progress_division_goal_excludes_other_divisions_and_years() {
        let mut records = sample();
        let mut last_year = service("Ana", "Med Spa", "Downtown", 12, 200.0, 100, 90.0);
        last_year.period = Period::new(2023, 12).unwrap();
        records.push(last_year);

        let goal = AnnualGoal {
            year: 2024,
            division: Some("Med Spa".into()),
            revenue_goal: 24_000.0,
        };
        let progress = ytd_progress(&records, &goal, 2);

        assert_eq!(progress.revenue, 2600.0 + 2400.0);
        assert_eq!(progress.level, ScoreLevel::Excellent);
    }
}

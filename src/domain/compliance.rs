//! Monthly compliance arithmetic and its quarter, semester and annual
//! rollups.
//!
//! Everything here is pure and works on [`Decimal`] so the spreadsheet and
//! document emitters print exactly the same figures.

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};

/// Upper bound for any user-entered quantity.
pub const MAX_QUANTITY: i64 = 999_999;

pub const MONTHS: usize = 12;

pub const MONTH_NAMES: [&str; MONTHS] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub const MONTH_LABELS: [&str; MONTHS] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Result of comparing a month's realized quantity against its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compliance {
    Percent(Decimal),
    NotApplicable,
}

impl Compliance {
    pub fn value(&self) -> Option<Decimal> {
        match self {
            Compliance::Percent(value) => Some(*value),
            Compliance::NotApplicable => None,
        }
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, Compliance::Percent(_))
    }
}

impl From<Compliance> for Option<Decimal> {
    fn from(value: Compliance) -> Self {
        value.value()
    }
}

impl Serialize for Compliance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Compliance::Percent(value) => Serialize::serialize(value, serializer),
            Compliance::NotApplicable => serializer.serialize_none(),
        }
    }
}

impl fmt::Display for Compliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compliance::Percent(value) => write!(f, "{value:.2}%"),
            Compliance::NotApplicable => f.write_str("N/A"),
        }
    }
}

/// Bounded percentage of the plan that was realized in one month.
///
/// Months without a positive plan are `NotApplicable`; overachievement caps
/// at 100.00 and is tracked as surplus elsewhere.
pub fn compute_compliance(planned: i64, realized: i64) -> Compliance {
    if planned <= 0 {
        return Compliance::NotApplicable;
    }
    let capped = realized.clamp(0, planned);
    let ratio = Decimal::from(capped)
        .checked_div(Decimal::from(planned))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED));
    match ratio {
        Some(value) => Compliance::Percent(round2(value).min(Decimal::ONE_HUNDRED)),
        None => Compliance::NotApplicable,
    }
}

/// Average of a set of monthly compliance values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Value(Decimal),
    NoValues,
}

impl Aggregate {
    pub const NO_VALUES_LABEL: &'static str = "NO VALUES ENTERED";

    pub fn value(&self) -> Option<Decimal> {
        match self {
            Aggregate::Value(value) => Some(*value),
            Aggregate::NoValues => None,
        }
    }
}

impl Serialize for Aggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Aggregate::Value(value) => Serialize::serialize(value, serializer),
            Aggregate::NoValues => serializer.serialize_str(Self::NO_VALUES_LABEL),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Value(value) => write!(f, "{value:.2}%"),
            Aggregate::NoValues => f.write_str(Self::NO_VALUES_LABEL),
        }
    }
}

/// Averages the applicable entries; `NotApplicable` counts towards neither
/// the sum nor the count.
pub fn aggregate<I>(values: I) -> Aggregate
where
    I: IntoIterator<Item = Compliance>,
{
    let (sum, count) = values
        .into_iter()
        .filter_map(|value| value.value())
        .fold((Decimal::ZERO, 0u32), |(sum, count), value| {
            (sum + value, count + 1)
        });
    if count == 0 {
        return Aggregate::NoValues;
    }
    match sum.checked_div(Decimal::from(count)) {
        Some(avg) => Aggregate::Value(round2(avg)),
        None => Aggregate::NoValues,
    }
}

/// Month numbers (1-based) that belong to a quarter (1..=4).
pub fn quarter_months(quarter: usize) -> std::ops::RangeInclusive<usize> {
    let first = (quarter - 1) * 3 + 1;
    first..=first + 2
}

/// Month numbers (1-based) that belong to a semester (1..=2).
pub fn semester_months(semester: usize) -> std::ops::RangeInclusive<usize> {
    let first = (semester - 1) * 6 + 1;
    first..=first + 5
}

pub fn quarter_of(month: usize) -> usize {
    (month - 1) / 3 + 1
}

/// Quarter, semester and annual rollups for one or more activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodSummary {
    pub quarters: [Aggregate; 4],
    pub semesters: [Aggregate; 2],
    pub annual: Aggregate,
}

impl PeriodSummary {
    /// Rolls up one activity's twelve months.
    pub fn from_months(months: &[Compliance; MONTHS]) -> Self {
        Self::from_series(std::slice::from_ref(months))
    }

    /// Rolls up several activities at once. Semesters and the year are
    /// computed over the union of eligible monthly values, never as an
    /// average of quarter averages.
    pub fn from_series(series: &[[Compliance; MONTHS]]) -> Self {
        let rollup = |months: std::ops::RangeInclusive<usize>| {
            aggregate(
                series
                    .iter()
                    .flat_map(|row| months.clone().map(move |month| row[month - 1])),
            )
        };
        Self {
            quarters: [1, 2, 3, 4].map(|quarter| rollup(quarter_months(quarter))),
            semesters: [1, 2].map(|semester| rollup(semester_months(semester))),
            annual: rollup(1..=MONTHS),
        }
    }
}

/// Banding used for unit-level performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Excellent,
    Good,
    Regular,
    Low,
}

impl PerformanceTier {
    pub const ALL: [PerformanceTier; 4] = [
        PerformanceTier::Excellent,
        PerformanceTier::Good,
        PerformanceTier::Regular,
        PerformanceTier::Low,
    ];

    pub fn classify(value: Decimal) -> Self {
        if value >= Decimal::from(80) {
            PerformanceTier::Excellent
        } else if value >= Decimal::from(60) {
            PerformanceTier::Good
        } else if value >= Decimal::from(40) {
            PerformanceTier::Regular
        } else {
            PerformanceTier::Low
        }
    }

    pub fn for_aggregate(aggregate: &Aggregate) -> Option<Self> {
        aggregate.value().map(Self::classify)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "Excellent",
            PerformanceTier::Good => "Good",
            PerformanceTier::Regular => "Regular",
            PerformanceTier::Low => "Low",
        }
    }

    /// Fill color as `0xRRGGBB`.
    pub fn fill(&self) -> u32 {
        match self {
            PerformanceTier::Excellent => 0xD1FAE5,
            PerformanceTier::Good => 0xFEF3C7,
            PerformanceTier::Regular => 0xFED7AA,
            PerformanceTier::Low => 0xFECACA,
        }
    }
}

/// Banding used for a single month in programming tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthStatus {
    Excellent,
    Good,
    Regular,
    Deficient,
    NotApplicable,
}

impl MonthStatus {
    pub fn classify(compliance: Compliance) -> Self {
        let Compliance::Percent(value) = compliance else {
            return MonthStatus::NotApplicable;
        };
        if value >= Decimal::from(90) {
            MonthStatus::Excellent
        } else if value >= Decimal::from(70) {
            MonthStatus::Good
        } else if value >= Decimal::from(50) {
            MonthStatus::Regular
        } else {
            MonthStatus::Deficient
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MonthStatus::Excellent => "Excellent",
            MonthStatus::Good => "Good",
            MonthStatus::Regular => "Regular",
            MonthStatus::Deficient => "Deficient",
            MonthStatus::NotApplicable => "Not applicable",
        }
    }
}

/// Totals across every month of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressTotals {
    pub planned: i64,
    pub realized_capped: i64,
    pub percentage: Compliance,
}

impl ProgressTotals {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let (planned, realized_capped) =
            pairs
                .into_iter()
                .fold((0i64, 0i64), |(planned, realized), (plan, real)| {
                    (
                        planned.saturating_add(plan.max(0)),
                        realized.saturating_add(real.clamp(0, plan.max(0))),
                    )
                });
        Self {
            planned,
            realized_capped,
            percentage: compute_compliance(planned, realized_capped),
        }
    }
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(text: &str) -> Compliance {
        Compliance::Percent(text.parse().unwrap())
    }

    #[test]
    fn non_positive_plan_is_not_applicable() {
        for realized in [-5, 0, 1, 50, MAX_QUANTITY] {
            assert_eq!(compute_compliance(0, realized), Compliance::NotApplicable);
            assert_eq!(compute_compliance(-3, realized), Compliance::NotApplicable);
        }
    }

    #[test]
    fn meeting_or_exceeding_plan_caps_at_one_hundred() {
        for (planned, realized) in [(10, 10), (10, 15), (1, MAX_QUANTITY), (7, 8)] {
            assert_eq!(
                compute_compliance(planned, realized),
                Compliance::Percent(Decimal::ONE_HUNDRED)
            );
        }
    }

    #[test]
    fn partial_progress_is_rounded_to_two_decimals() {
        assert_eq!(compute_compliance(3, 1), pct("33.33"));
        assert_eq!(compute_compliance(3, 2), pct("66.67"));
        assert_eq!(compute_compliance(8, 1), pct("12.50"));
    }

    #[test]
    fn partial_progress_stays_strictly_inside_bounds() {
        for planned in 2..=200 {
            for realized in 1..planned {
                let Compliance::Percent(value) = compute_compliance(planned, realized) else {
                    panic!("expected a percentage for {realized}/{planned}");
                };
                assert!(value > Decimal::ZERO, "{realized}/{planned}");
                assert!(value < Decimal::ONE_HUNDRED, "{realized}/{planned}");
            }
        }
    }

    #[test]
    fn zero_realized_against_a_plan_is_zero_percent() {
        assert_eq!(compute_compliance(10, 0), Compliance::Percent(Decimal::ZERO));
    }

    #[test]
    fn aggregate_of_only_not_applicable_is_no_values() {
        let values = [Compliance::NotApplicable; 3];
        assert_eq!(aggregate(values), Aggregate::NoValues);
        assert_eq!(aggregate(Vec::new()), Aggregate::NoValues);
    }

    #[test]
    fn aggregate_excludes_not_applicable_from_numerator_and_denominator() {
        let values = [Compliance::NotApplicable, pct("50"), pct("100")];
        assert_eq!(aggregate(values), Aggregate::Value(Decimal::from(75)));
    }

    #[test]
    fn first_quarter_scenario() {
        let planned = [10, 10, 10, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let realized = [5, 10, 15, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let months: [Compliance; MONTHS] =
            std::array::from_fn(|idx| compute_compliance(planned[idx], realized[idx]));

        assert_eq!(months[0], pct("50.00"));
        assert_eq!(months[1], pct("100.00"));
        assert_eq!(months[2], pct("100.00"));
        assert!(months[3..].iter().all(|m| *m == Compliance::NotApplicable));

        let summary = PeriodSummary::from_months(&months);
        assert_eq!(summary.quarters[0], Aggregate::Value("83.33".parse().unwrap()));
        assert_eq!(summary.quarters[1], Aggregate::NoValues);
        assert_eq!(summary.semesters[0], Aggregate::Value("83.33".parse().unwrap()));
        assert_eq!(summary.semesters[1], Aggregate::NoValues);
        assert_eq!(summary.annual, Aggregate::Value("83.33".parse().unwrap()));
    }

    #[test]
    fn semester_uses_union_of_months_not_average_of_quarters() {
        let mut months = [Compliance::NotApplicable; MONTHS];
        months[0] = pct("0");
        months[3] = pct("100");
        months[4] = pct("100");
        months[5] = pct("100");

        let summary = PeriodSummary::from_months(&months);
        assert_eq!(summary.quarters[0], Aggregate::Value(Decimal::ZERO));
        assert_eq!(summary.quarters[1], Aggregate::Value(Decimal::ONE_HUNDRED));
        // average of quarters would be 50; the union of months gives 75
        assert_eq!(summary.semesters[0], Aggregate::Value(Decimal::from(75)));
    }

    #[test]
    fn series_rollup_spans_activities() {
        let mut first = [Compliance::NotApplicable; MONTHS];
        let mut second = [Compliance::NotApplicable; MONTHS];
        first[0] = pct("40");
        second[1] = pct("80");
        let summary = PeriodSummary::from_series(&[first, second]);
        assert_eq!(summary.quarters[0], Aggregate::Value(Decimal::from(60)));
        assert_eq!(summary.annual, Aggregate::Value(Decimal::from(60)));
    }

    #[test]
    fn tiers_follow_band_thresholds() {
        assert_eq!(PerformanceTier::classify(Decimal::from(80)), PerformanceTier::Excellent);
        assert_eq!(PerformanceTier::classify("79.99".parse().unwrap()), PerformanceTier::Good);
        assert_eq!(PerformanceTier::classify(Decimal::from(40)), PerformanceTier::Regular);
        assert_eq!(PerformanceTier::classify(Decimal::ZERO), PerformanceTier::Low);
        assert_eq!(PerformanceTier::for_aggregate(&Aggregate::NoValues), None);

        assert_eq!(MonthStatus::classify(pct("90")), MonthStatus::Excellent);
        assert_eq!(MonthStatus::classify(pct("69.99")), MonthStatus::Regular);
        assert_eq!(MonthStatus::classify(pct("10")), MonthStatus::Deficient);
        assert_eq!(
            MonthStatus::classify(Compliance::NotApplicable),
            MonthStatus::NotApplicable
        );
    }

    #[test]
    fn progress_totals_cap_realized_per_month() {
        let totals = ProgressTotals::from_pairs([(10, 5), (10, 15), (0, 4)]);
        assert_eq!(totals.planned, 20);
        assert_eq!(totals.realized_capped, 15);
        assert_eq!(totals.percentage, pct("75.00"));
    }

    #[test]
    fn quarter_and_semester_ranges() {
        assert_eq!(quarter_months(2), 4..=6);
        assert_eq!(semester_months(2), 7..=12);
        assert_eq!(quarter_of(12), 4);
        assert_eq!(quarter_of(1), 1);
    }

    #[test]
    fn serializes_as_decimal_text_or_sentinel() {
        assert_eq!(serde_json::to_value(pct("83.33")).unwrap(), serde_json::json!("83.33"));
        assert_eq!(
            serde_json::to_value(Compliance::NotApplicable).unwrap(),
            serde_json::Value::Null
        );
        assert_eq!(
            serde_json::to_value(Aggregate::Value("50.00".parse().unwrap())).unwrap(),
            serde_json::json!("50.00")
        );
        assert_eq!(
            serde_json::to_value(Aggregate::NoValues).unwrap(),
            serde_json::json!("NO VALUES ENTERED")
        );
    }
}

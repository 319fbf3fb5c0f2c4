use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::compliance::{MAX_QUANTITY, MONTHS};

pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;

pub const OTHER_UNIT_OF_MEASURE: &str = "Other";

pub const UNITS_OF_MEASURE: [&str; 14] = [
    "Unit",
    "Percentage",
    "Document",
    "Report",
    "Event",
    "Person",
    "Meeting",
    "Training",
    "Workshop",
    "Project",
    "Activity",
    "Service",
    "Product",
    OTHER_UNIT_OF_MEASURE,
];

/// Largest amount a NUMERIC(15,2) resource column can hold.
pub fn max_resource_amount() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    pub is_valid: bool,
    pub violations: Vec<FieldError>,
}

impl PolicyEvaluation {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            violations: Vec::new(),
        }
    }

    pub fn with_violation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            violations: vec![FieldError::new(field, message)],
        }
    }

    fn from_violations(violations: Vec<FieldError>) -> Self {
        Self {
            is_valid: violations.is_empty(),
            violations,
        }
    }

    pub fn into_result(self) -> Result<(), Vec<FieldError>> {
        if self.is_valid {
            Ok(())
        } else {
            Err(self.violations)
        }
    }
}

/// Why a user-entered quantity was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityViolation {
    Negative,
    NotWhole,
    TooLarge,
}

impl QuantityViolation {
    pub fn message(&self) -> String {
        match self {
            QuantityViolation::Negative => "must be zero or greater".to_string(),
            QuantityViolation::NotWhole => "must be a whole number".to_string(),
            QuantityViolation::TooLarge => {
                format!("must be between 0 and {MAX_QUANTITY}")
            }
        }
    }
}

pub fn check_quantity(value: i64) -> Result<i64, QuantityViolation> {
    if value < 0 {
        Err(QuantityViolation::Negative)
    } else if value > MAX_QUANTITY {
        Err(QuantityViolation::TooLarge)
    } else {
        Ok(value)
    }
}

/// Accepts any JSON number, including ones that overflow `i64`, and maps it
/// onto the bounded quantity range.
pub fn parse_quantity(raw: &serde_json::Number) -> Result<i64, QuantityViolation> {
    if let Some(value) = raw.as_i64() {
        return check_quantity(value);
    }
    if raw.as_u64().is_some() {
        return Err(QuantityViolation::TooLarge);
    }
    match raw.as_f64() {
        Some(value) if value.fract() != 0.0 && value.is_finite() && value.abs() < 1e15 => {
            Err(QuantityViolation::NotWhole)
        }
        Some(value) if value < 0.0 => Err(QuantityViolation::Negative),
        _ => Err(QuantityViolation::TooLarge),
    }
}

/// Activity fields as submitted, before persistence.
#[derive(Debug, Clone)]
pub struct ActivityDraft<'a> {
    pub description: &'a str,
    pub unit_of_measure: Option<&'a str>,
    pub custom_unit_of_measure: Option<&'a str>,
    pub planned_quantity: i64,
    pub is_quantifiable: bool,
    pub resource_amount: Decimal,
}

/// Resolves the unit-of-measure label stored on the activity.
pub fn resolve_unit_of_measure(
    choice: Option<&str>,
    custom: Option<&str>,
) -> Result<String, FieldError> {
    let choice = choice.map(str::trim).filter(|value| !value.is_empty());
    let Some(choice) = choice else {
        return Err(FieldError::new(
            "unit_of_measure",
            "unit of measure is required",
        ));
    };
    if choice == OTHER_UNIT_OF_MEASURE {
        return match custom.map(str::trim).filter(|value| !value.is_empty()) {
            Some(custom) => Ok(custom.to_string()),
            None => Err(FieldError::new(
                "custom_unit_of_measure",
                "describe the unit of measure when choosing Other",
            )),
        };
    }
    if UNITS_OF_MEASURE.contains(&choice) {
        Ok(choice.to_string())
    } else {
        Err(FieldError::new(
            "unit_of_measure",
            format!("unknown unit of measure: {choice}"),
        ))
    }
}

pub fn evaluate_activity(draft: &ActivityDraft<'_>) -> PolicyEvaluation {
    let mut violations = Vec::new();

    if draft.description.trim().is_empty() {
        violations.push(FieldError::new("description", "description is required"));
    }
    if let Err(err) = resolve_unit_of_measure(draft.unit_of_measure, draft.custom_unit_of_measure)
    {
        violations.push(err);
    }

    if draft.is_quantifiable {
        match check_quantity(draft.planned_quantity) {
            Ok(0) => violations.push(FieldError::new(
                "planned_quantity",
                "quantifiable activities need a planned quantity greater than zero",
            )),
            Ok(_) => {}
            Err(violation) => violations.push(FieldError::new(
                "planned_quantity",
                format!("planned quantity {}", violation.message()),
            )),
        }
    } else if draft.planned_quantity != 0 {
        violations.push(FieldError::new(
            "planned_quantity",
            "non-quantifiable activities cannot carry a planned quantity",
        ));
    }

    if draft.resource_amount < Decimal::ZERO || draft.resource_amount > max_resource_amount() {
        violations.push(FieldError::new(
            "resource_amount",
            format!("resource amount must be between 0 and {}", max_resource_amount()),
        ));
    }

    PolicyEvaluation::from_violations(violations)
}

/// Checks a full year of monthly targets against the activity total.
pub fn evaluate_programming(
    activity_total: i64,
    is_quantifiable: bool,
    monthly: &[i64],
) -> PolicyEvaluation {
    if monthly.len() != MONTHS {
        return PolicyEvaluation::with_violation(
            "monthly_plan",
            format!("expected {MONTHS} monthly values, got {}", monthly.len()),
        );
    }

    let mut violations = Vec::new();
    for (idx, value) in monthly.iter().enumerate() {
        if let Err(violation) = check_quantity(*value) {
            violations.push(FieldError::new(
                format!("monthly_plan[{}]", idx + 1),
                format!("planned quantity {}", violation.message()),
            ));
        }
    }
    if !violations.is_empty() {
        return PolicyEvaluation::from_violations(violations);
    }

    let total: i64 = monthly.iter().sum();
    if !is_quantifiable && total != 0 {
        return PolicyEvaluation::with_violation(
            "monthly_plan",
            "non-quantifiable activities cannot be programmed",
        );
    }
    if total > activity_total {
        return PolicyEvaluation::with_violation(
            "monthly_plan",
            format!(
                "monthly programming adds up to {total}, exceeding the activity total of {activity_total}"
            ),
        );
    }
    PolicyEvaluation::ok()
}

pub fn check_year(year: i32) -> Result<i32, FieldError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(year)
    } else {
        Err(FieldError::new(
            "year",
            format!("year must be between {MIN_YEAR} and {MAX_YEAR}"),
        ))
    }
}

pub fn check_month(month: i16) -> Result<i16, FieldError> {
    if (1..=MONTHS as i16).contains(&month) {
        Ok(month)
    } else {
        Err(FieldError::new("month", "month must be between 1 and 12"))
    }
}

/// Name used when the unit leaves the project name blank.
pub fn default_project_name(year: i32, existing_projects: i64) -> String {
    format!("Operating Project {year} - {}", existing_projects + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft<'a>(unit: Option<&'a str>, planned: i64, quantifiable: bool) -> ActivityDraft<'a> {
        ActivityDraft {
            description: "Neighbourhood workshops",
            unit_of_measure: unit,
            custom_unit_of_measure: None,
            planned_quantity: planned,
            is_quantifiable: quantifiable,
            resource_amount: Decimal::new(150_000, 2),
        }
    }

    #[test]
    fn accepts_a_quantifiable_activity() {
        let evaluation = evaluate_activity(&draft(Some("Workshop"), 12, true));
        assert!(evaluation.is_valid, "{:?}", evaluation.violations);
    }

    #[test]
    fn requires_unit_of_measure() {
        let evaluation = evaluate_activity(&draft(None, 12, true));
        assert!(!evaluation.is_valid);
        assert_eq!(evaluation.violations[0].field, "unit_of_measure");
    }

    #[test]
    fn other_unit_of_measure_needs_custom_label() {
        assert!(resolve_unit_of_measure(Some("Other"), None).is_err());
        assert_eq!(
            resolve_unit_of_measure(Some("Other"), Some(" Hectares ")).unwrap(),
            "Hectares"
        );
    }

    #[test]
    fn non_quantifiable_activity_with_plan_is_rejected() {
        let evaluation = evaluate_activity(&draft(Some("Report"), 3, false));
        assert!(!evaluation.is_valid);
        assert_eq!(evaluation.violations[0].field, "planned_quantity");

        assert!(evaluate_activity(&draft(Some("Report"), 0, false)).is_valid);
    }

    #[test]
    fn quantifiable_activity_needs_bounded_positive_plan() {
        assert!(!evaluate_activity(&draft(Some("Unit"), 0, true)).is_valid);
        assert!(!evaluate_activity(&draft(Some("Unit"), MAX_QUANTITY + 1, true)).is_valid);
        assert!(evaluate_activity(&draft(Some("Unit"), MAX_QUANTITY, true)).is_valid);
    }

    #[test]
    fn programming_cannot_exceed_activity_total() {
        let mut months = [0i64; MONTHS];
        months[0] = 6;
        months[1] = 6;
        let evaluation = evaluate_programming(10, true, &months);
        assert!(!evaluation.is_valid);
        assert_eq!(evaluation.violations[0].field, "monthly_plan");

        months[1] = 4;
        assert!(evaluate_programming(10, true, &months).is_valid);
    }

    #[test]
    fn programming_rejects_wrong_length_and_negative_entries() {
        assert!(!evaluate_programming(10, true, &[1, 2, 3]).is_valid);
        let mut months = [0i64; MONTHS];
        months[4] = -1;
        let evaluation = evaluate_programming(10, true, &months);
        assert_eq!(evaluation.violations[0].field, "monthly_plan[5]");
    }

    #[test]
    fn quantity_parsing_reports_bounded_range() {
        let number = |raw: &str| serde_json::from_str::<serde_json::Number>(raw).unwrap();
        assert_eq!(parse_quantity(&number("42")), Ok(42));
        assert_eq!(parse_quantity(&number("-1")), Err(QuantityViolation::Negative));
        assert_eq!(parse_quantity(&number("1000000")), Err(QuantityViolation::TooLarge));
        assert_eq!(
            parse_quantity(&number("99999999999999999999999")),
            Err(QuantityViolation::TooLarge)
        );
        assert_eq!(parse_quantity(&number("2.5")), Err(QuantityViolation::NotWhole));
    }

    #[test]
    fn default_name_counts_existing_projects() {
        assert_eq!(default_project_name(2025, 2), "Operating Project 2025 - 3");
    }

    #[test]
    fn year_bounds() {
        assert!(check_year(1999).is_err());
        assert!(check_year(2100).is_ok());
        assert!(check_month(0).is_err());
        assert!(check_month(12).is_ok());
    }
}

//! In-memory project trees handed to the report builders.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{
    compliance::{
        aggregate, compute_compliance, Aggregate, Compliance, PerformanceTier, PeriodSummary,
        ProgressTotals, MONTHS,
    },
    models::{Activity, Evidence, Goal, MonthlyProgress, Project, Unit},
};

/// One month of one activity, as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthFigures {
    pub planned: i64,
    pub realized: i64,
    pub cause: Option<String>,
}

impl MonthFigures {
    pub fn compliance(&self) -> Compliance {
        compute_compliance(self.planned, self.realized)
    }

    pub fn surplus(&self) -> i64 {
        (self.realized - self.planned.max(0)).max(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivitySnapshot {
    pub activity: Activity,
    pub months: [MonthFigures; MONTHS],
    pub evidence: Vec<Evidence>,
}

impl ActivitySnapshot {
    /// Missing months read as zero plan and zero progress.
    pub fn new(activity: Activity, progress: Vec<MonthlyProgress>, evidence: Vec<Evidence>) -> Self {
        let mut months: [MonthFigures; MONTHS] = Default::default();
        for entry in progress {
            let Ok(idx) = usize::try_from(entry.month - 1) else {
                continue;
            };
            if let Some(slot) = months.get_mut(idx) {
                *slot = MonthFigures {
                    planned: entry.planned_quantity,
                    realized: entry.realized_quantity,
                    cause: entry.non_compliance_cause,
                };
            }
        }
        Self {
            activity,
            months,
            evidence,
        }
    }

    pub fn compliance(&self) -> [Compliance; MONTHS] {
        std::array::from_fn(|idx| self.months[idx].compliance())
    }

    pub fn summary(&self) -> PeriodSummary {
        PeriodSummary::from_months(&self.compliance())
    }

    /// Month figure for a 1-based month number.
    pub fn month(&self, month: usize) -> &MonthFigures {
        &self.months[month - 1]
    }

    pub fn evidence_for_month(&self, month: usize) -> impl Iterator<Item = &Evidence> {
        self.evidence
            .iter()
            .filter(move |evidence| evidence.month.map(|m| m as usize) == Some(month))
    }

    pub fn totals(&self) -> ProgressTotals {
        ProgressTotals::from_pairs(self.months.iter().map(|m| (m.planned, m.realized)))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalSnapshot {
    pub goal: Goal,
    pub activities: Vec<ActivitySnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSnapshot {
    pub project: Project,
    pub unit_name: String,
    pub approver_email: Option<String>,
    pub goals: Vec<GoalSnapshot>,
}

impl ProjectSnapshot {
    pub fn activities(&self) -> impl Iterator<Item = &ActivitySnapshot> {
        self.goals.iter().flat_map(|goal| goal.activities.iter())
    }

    pub fn goal_count(&self) -> usize {
        self.goals.len()
    }

    pub fn activity_count(&self) -> usize {
        self.activities().count()
    }

    pub fn evidence_count(&self) -> usize {
        self.activities().map(|a| a.evidence.len()).sum()
    }

    pub fn budget_total(&self) -> Decimal {
        self.activities()
            .map(|a| a.activity.resource_amount)
            .fold(Decimal::ZERO, |acc, amount| acc + amount)
    }

    pub fn compliance_series(&self) -> Vec<[Compliance; MONTHS]> {
        self.activities().map(ActivitySnapshot::compliance).collect()
    }

    pub fn summary(&self) -> PeriodSummary {
        PeriodSummary::from_series(&self.compliance_series())
    }

    pub fn totals(&self) -> ProgressTotals {
        ProgressTotals::from_pairs(
            self.activities()
                .flat_map(|a| a.months.iter().map(|m| (m.planned, m.realized))),
        )
    }
}

/// A unit with its rollup over approved, planned projects.
#[derive(Debug, Clone, Serialize)]
pub struct UnitPerformance {
    pub unit: Unit,
    pub total_projects: i64,
    pub approved_projects: i64,
    pub summary: PeriodSummary,
}

impl UnitPerformance {
    pub fn new(
        unit: Unit,
        total_projects: i64,
        approved_projects: i64,
        approved: &[ProjectSnapshot],
    ) -> Self {
        let series: Vec<[Compliance; MONTHS]> = approved
            .iter()
            .filter(|snapshot| !snapshot.project.is_unplanned)
            .flat_map(ProjectSnapshot::compliance_series)
            .collect();
        Self {
            unit,
            total_projects,
            approved_projects,
            summary: PeriodSummary::from_series(&series),
        }
    }

    pub fn performance(&self) -> Aggregate {
        self.summary.annual
    }

    pub fn tier(&self) -> Option<PerformanceTier> {
        PerformanceTier::for_aggregate(&self.summary.annual)
    }
}

/// Unit counts per tier, with their share of the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterSummary {
    pub total_units: usize,
    pub tiers: Vec<(PerformanceTier, usize, Decimal)>,
    pub without_values: usize,
    pub average: Aggregate,
}

impl RosterSummary {
    pub fn from_units(units: &[UnitPerformance]) -> Self {
        let total_units = units.len();
        let share = |count: usize| {
            if total_units == 0 {
                Decimal::ZERO
            } else {
                (Decimal::from(count as u64) * Decimal::ONE_HUNDRED
                    / Decimal::from(total_units as u64))
                .round_dp(2)
            }
        };
        let tiers = PerformanceTier::ALL
            .iter()
            .map(|tier| {
                let count = units.iter().filter(|u| u.tier() == Some(*tier)).count();
                (*tier, count, share(count))
            })
            .collect();
        let without_values = units.iter().filter(|u| u.tier().is_none()).count();
        let average = aggregate(
            units
                .iter()
                .filter_map(|u| u.performance().value())
                .map(Compliance::Percent),
        );
        Self {
            total_units,
            tiers,
            without_values,
            average,
        }
    }
}

/// Case-insensitive unit-name filter used by the quarterly report.
pub fn filter_units<'a>(
    units: &'a [UnitPerformance],
    search: Option<&str>,
) -> Vec<&'a UnitPerformance> {
    let needle = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    units
        .iter()
        .filter(|unit| match &needle {
            Some(needle) => unit.unit.name.to_lowercase().contains(needle),
            None => true,
        })
        .collect()
}

//! Turns snapshots into report documents. Both emitters consume the output,
//! so a PDF and a spreadsheet built from the same snapshot print the same
//! figures.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    domain::{
        compliance::{MonthStatus, PerformanceTier, PeriodSummary, MONTHS, MONTH_NAMES},
        models::{AuditRecord, Evidence, ProjectState, UserRecord},
    },
    infrastructure::config::ReportSettings,
};

use super::{
    document::{format_date, format_timestamp, format_money, Block, Cell, ReportDocument, Sheet, Table},
    snapshot::{filter_units, ActivitySnapshot, ProjectSnapshot, RosterSummary, UnitPerformance},
};

const NO_ACTIVITIES: &str = "No activities registered for this goal.";

fn status_fill(status: MonthStatus) -> Option<u32> {
    match status {
        MonthStatus::Excellent => Some(PerformanceTier::Excellent.fill()),
        MonthStatus::Good => Some(PerformanceTier::Good.fill()),
        MonthStatus::Regular => Some(PerformanceTier::Regular.fill()),
        MonthStatus::Deficient => Some(PerformanceTier::Low.fill()),
        MonthStatus::NotApplicable => None,
    }
}

fn tier_cell(tier: Option<PerformanceTier>) -> Cell {
    match tier {
        Some(tier) => Cell::text(tier.label()).with_fill(Some(tier.fill())),
        None => Cell::text("No values"),
    }
}

fn period_table(first_column: &str) -> Table {
    Table::new(&[
        (first_column, 30.0),
        ("Q1", 12.0),
        ("Q2", 12.0),
        ("Q3", 12.0),
        ("Q4", 12.0),
        ("Semester 1", 14.0),
        ("Semester 2", 14.0),
        ("Annual", 14.0),
    ])
}

/// Single project: general information, executive summary, then one
/// section per goal with its activities, monthly programming and evidence.
pub fn project_detail(
    snapshot: &ProjectSnapshot,
    settings: &ReportSettings,
    generated_at: DateTime<Utc>,
) -> ReportDocument {
    let project = &snapshot.project;
    let mut sheet = Sheet::new("Project detail");
    sheet.push(Block::Title(format!(
        "ANNUAL OPERATING PLAN (POA) {}",
        project.year
    )));
    sheet.push(Block::Subheading(settings.organization_name.clone()));

    sheet.push(Block::Heading("General information".into()));
    let mut info = vec![
        ("Project".to_string(), project.name.clone()),
        ("Unit".to_string(), snapshot.unit_name.clone()),
        ("Year".to_string(), project.year.to_string()),
        ("State".to_string(), project.state.label().to_string()),
        ("Unit objective".to_string(), project.unit_objective.clone()),
    ];
    if let Some(email) = &snapshot.approver_email {
        info.push(("Approved by".to_string(), email.clone()));
    }
    if let Some(at) = project.approved_at {
        info.push(("Approved at".to_string(), format_timestamp(at)));
    }
    if let Some(reason) = &project.rejection_reason {
        info.push(("Rejection reason".to_string(), reason.clone()));
    }
    sheet.push(Block::KeyValues(info));

    let totals = snapshot.totals();
    let summary = snapshot.summary();
    sheet.push(Block::Heading("Executive summary".into()));
    sheet.push(Block::KeyValues(vec![
        ("Goals".into(), snapshot.goal_count().to_string()),
        ("Activities".into(), snapshot.activity_count().to_string()),
        ("Evidence items".into(), snapshot.evidence_count().to_string()),
        ("Total budget".into(), format_money(snapshot.budget_total())),
        ("Total planned".into(), totals.planned.to_string()),
        ("Total realized".into(), totals.realized_capped.to_string()),
        ("Overall progress".into(), totals.percentage.to_string()),
        ("Annual compliance".into(), summary.annual.to_string()),
    ]));
    let mut periods = period_table("Period");
    let mut row = vec![Cell::text("Compliance")];
    row.extend(summary.quarters.iter().map(|q| Cell::aggregate(*q)));
    row.extend(summary.semesters.iter().map(|s| Cell::aggregate(*s)));
    row.push(Cell::aggregate(summary.annual));
    periods.push(row);
    sheet.push_table(periods);

    for (goal_idx, goal) in snapshot.goals.iter().enumerate() {
        sheet.push(Block::PageBreak);
        sheet.push(Block::Heading(format!(
            "Goal {}: {}",
            goal_idx + 1,
            goal.goal.description
        )));
        if goal.activities.is_empty() {
            sheet.push(Block::Paragraph(NO_ACTIVITIES.into()));
            continue;
        }

        let mut activities = Table::new(&[
            ("No.", 6.0),
            ("Activity", 34.0),
            ("Unit of measure", 14.0),
            ("Planned", 10.0),
            ("Verification method", 24.0),
            ("Resources", 22.0),
            ("Amount", 14.0),
        ]);
        for (idx, activity) in goal.activities.iter().enumerate() {
            let a = &activity.activity;
            activities.push(vec![
                Cell::text(format!("{}.{}", goal_idx + 1, idx + 1)),
                Cell::text(a.description.clone()),
                Cell::text(a.unit_of_measure.clone()),
                Cell::integer(a.planned_quantity),
                Cell::text(a.verification_method.clone()),
                Cell::text(a.resource_description.clone()),
                Cell::money(a.resource_amount),
            ]);
        }
        sheet.push_table(activities);

        for (idx, activity) in goal.activities.iter().enumerate() {
            sheet.push(Block::Subheading(format!(
                "Activity {}.{}: {}",
                goal_idx + 1,
                idx + 1,
                activity.activity.description
            )));
            sheet.push_table(programming_table(activity));
            let (evidence, hidden) = evidence_table(activity, settings.evidence_rows_per_activity);
            sheet.push_table(evidence);
            if hidden > 0 {
                sheet.push(Block::Paragraph(format!(
                    "{hidden} more evidence item(s) not listed."
                )));
            }
        }
    }

    ReportDocument {
        title: format!("{} - {}", project.name, snapshot.unit_name),
        generated_at,
        sheets: vec![sheet],
    }
}

/// Months with a plan or recorded progress.
fn programming_table(activity: &ActivitySnapshot) -> Table {
    let mut table = Table::new(&[
        ("Month", 14.0),
        ("Planned", 10.0),
        ("Realized", 10.0),
        ("Compliance", 12.0),
        ("Status", 14.0),
        ("Non-compliance cause", 30.0),
    ]);
    for month in 1..=MONTHS {
        let figures = activity.month(month);
        if figures.planned == 0 && figures.realized == 0 {
            continue;
        }
        let compliance = figures.compliance();
        let status = MonthStatus::classify(compliance);
        table.push(vec![
            Cell::text(MONTH_NAMES[month - 1]),
            Cell::integer(figures.planned),
            Cell::integer(figures.realized),
            Cell::compliance(compliance),
            Cell::text(status.label()).with_fill(status_fill(status)),
            Cell::text(figures.cause.clone().unwrap_or_default()),
        ]);
    }
    table
}

/// Evidence rows up to `limit`, plus the count left out.
fn evidence_table(activity: &ActivitySnapshot, limit: usize) -> (Table, usize) {
    let mut table = Table::new(&[
        ("Month", 12.0),
        ("Type", 10.0),
        ("Description", 30.0),
        ("File or link", 30.0),
        ("Registered", 14.0),
    ]);
    for evidence in activity.evidence.iter().take(limit) {
        table.push(vec![
            Cell::text(evidence_month(evidence)),
            Cell::text(evidence.kind.label()),
            Cell::text(evidence.description.clone()),
            Cell::text(evidence_target(evidence)),
            Cell::text(format_date(evidence.created_at)),
        ]);
    }
    (table, activity.evidence.len().saturating_sub(limit))
}

fn evidence_month(evidence: &Evidence) -> String {
    evidence
        .month
        .and_then(|month| usize::try_from(month).ok())
        .and_then(|month| MONTH_NAMES.get(month.wrapping_sub(1)))
        .map(|name| name.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Every unit with project counts and its annual performance tier.
pub fn unit_roster(
    units: &[UnitPerformance],
    settings: &ReportSettings,
    generated_at: DateTime<Utc>,
) -> ReportDocument {
    let roster = RosterSummary::from_units(units);
    let mut sheet = Sheet::new("Units");
    sheet.push(Block::Title("MUNICIPAL UNITS REPORT".into()));
    sheet.push(Block::Subheading(settings.organization_name.clone()));

    sheet.push(Block::Heading("Summary".into()));
    let mut summary = vec![("Total units".to_string(), roster.total_units.to_string())];
    for (tier, count, share) in &roster.tiers {
        summary.push((tier.label().to_string(), format!("{count} ({share:.2}%)")));
    }
    summary.push(("No values entered".into(), roster.without_values.to_string()));
    summary.push(("Average performance".into(), roster.average.to_string()));
    sheet.push(Block::KeyValues(summary));

    let mut table = Table::new(&[
        ("No.", 6.0),
        ("Unit", 32.0),
        ("Status", 10.0),
        ("Projects", 10.0),
        ("Approved", 10.0),
        ("Performance", 14.0),
        ("Tier", 12.0),
    ]);
    for (idx, unit) in units.iter().enumerate() {
        let tier = unit.tier();
        table.push(vec![
            Cell::integer(idx as i64 + 1),
            Cell::text(unit.unit.name.clone()),
            Cell::text(if unit.unit.active { "Active" } else { "Inactive" }),
            Cell::integer(unit.total_projects),
            Cell::integer(unit.approved_projects),
            Cell::aggregate(unit.performance()).with_fill(tier.map(|t| t.fill())),
            tier_cell(tier),
        ]);
    }
    sheet.push(Block::Heading("Units".into()));
    sheet.push_table(table);

    ReportDocument {
        title: "Units report".into(),
        generated_at,
        sheets: vec![sheet],
    }
}

/// Quarter, semester and annual compliance per unit, optionally filtered
/// by a case-insensitive name fragment.
pub fn quarterly(
    units: &[UnitPerformance],
    search: Option<&str>,
    settings: &ReportSettings,
    generated_at: DateTime<Utc>,
) -> ReportDocument {
    let selected = filter_units(units, search);
    let mut sheet = Sheet::new("Quarterly");
    sheet.push(Block::Title("QUARTERLY COMPLIANCE REPORT".into()));
    sheet.push(Block::Subheading(settings.organization_name.clone()));
    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        sheet.push(Block::Paragraph(format!("Filter: {search}")));
    }

    let mut table = period_table("Unit");
    table.headers.push("Tier".into());
    table.widths.push(12.0);
    for unit in &selected {
        let summary = &unit.summary;
        let mut row = vec![Cell::text(unit.unit.name.clone())];
        row.extend(summary.quarters.iter().map(|q| Cell::aggregate(*q)));
        row.extend(summary.semesters.iter().map(|s| Cell::aggregate(*s)));
        row.push(Cell::aggregate(summary.annual).bold());
        row.push(tier_cell(unit.tier()));
        table.push(row);
    }
    if table.is_empty() {
        sheet.push(Block::Paragraph("No units match the filter.".into()));
    }
    sheet.push_table(table);

    ReportDocument {
        title: "Quarterly report".into(),
        generated_at,
        sheets: vec![sheet],
    }
}

/// All projects in one summary sheet plus an activity-level sheet.
pub fn consolidated(
    projects: &[ProjectSnapshot],
    settings: &ReportSettings,
    generated_at: DateTime<Utc>,
) -> ReportDocument {
    let mut summary = Sheet::new("Summary");
    summary.push(Block::Title("CONSOLIDATED ANNUAL OPERATING PLAN".into()));
    summary.push(Block::Subheading(settings.organization_name.clone()));

    let mut table = Table::new(&[
        ("No.", 6.0),
        ("Unit", 24.0),
        ("Project", 30.0),
        ("Year", 8.0),
        ("State", 12.0),
        ("Goals", 8.0),
        ("Activities", 10.0),
        ("Evidence", 10.0),
        ("Budget", 16.0),
        ("Compliance", 14.0),
        ("Approved at", 16.0),
    ]);
    let mut budget = Decimal::ZERO;
    for (idx, snapshot) in projects.iter().enumerate() {
        let project = &snapshot.project;
        budget += snapshot.budget_total();
        table.push(vec![
            Cell::integer(idx as i64 + 1),
            Cell::text(snapshot.unit_name.clone()),
            Cell::text(project.name.clone()),
            Cell::integer(i64::from(project.year)),
            Cell::text(project.state.label()),
            Cell::integer(snapshot.goal_count() as i64),
            Cell::integer(snapshot.activity_count() as i64),
            Cell::integer(snapshot.evidence_count() as i64),
            Cell::money(snapshot.budget_total()),
            Cell::aggregate(snapshot.summary().annual),
            Cell::text(project.approved_at.map(format_date).unwrap_or_default()),
        ]);
    }
    summary.push(Block::KeyValues(vec![
        ("Projects".into(), projects.len().to_string()),
        ("Total budget".into(), format_money(budget)),
    ]));
    summary.push_table(table);

    let mut detail = Sheet::new("Activities");
    let mut activities = Table::new(&[
        ("Unit", 22.0),
        ("Project", 26.0),
        ("Goal", 28.0),
        ("Activity", 32.0),
        ("Unit of measure", 14.0),
        ("Planned", 10.0),
        ("Realized", 10.0),
        ("Compliance", 12.0),
        ("Resources", 16.0),
    ]);
    for snapshot in projects {
        for goal in &snapshot.goals {
            for activity in &goal.activities {
                let totals = activity.totals();
                let realized: i64 = activity.months.iter().map(|m| m.realized).sum();
                activities.push(vec![
                    Cell::text(snapshot.unit_name.clone()),
                    Cell::text(snapshot.project.name.clone()),
                    Cell::text(goal.goal.description.clone()),
                    Cell::text(activity.activity.description.clone()),
                    Cell::text(activity.activity.unit_of_measure.clone()),
                    Cell::integer(totals.planned),
                    Cell::integer(realized),
                    Cell::aggregate(activity.summary().annual),
                    Cell::money(activity.activity.resource_amount),
                ]);
            }
        }
    }
    detail.push(Block::Title("ACTIVITIES".into()));
    detail.push_table(activities);

    let mut programming = Sheet::new("Monthly programming");
    programming.push(Block::Title("MONTHLY PROGRAMMING".into()));
    let mut months = Table::new(&[
        ("Unit", 22.0),
        ("Project", 26.0),
        ("Activity", 32.0),
        ("Month", 12.0),
        ("Planned", 10.0),
        ("Realized", 10.0),
        ("Compliance", 12.0),
        ("Status", 14.0),
    ]);
    let mut evidence = Sheet::new("Evidence");
    evidence.push(Block::Title("EVIDENCE".into()));
    let mut evidence_rows = Table::new(&[
        ("Unit", 22.0),
        ("Project", 26.0),
        ("Activity", 32.0),
        ("Month", 12.0),
        ("Type", 10.0),
        ("Description", 30.0),
        ("File or link", 30.0),
        ("Uploaded", 12.0),
    ]);
    for snapshot in projects {
        for activity in snapshot.activities() {
            for (idx, figures) in activity.months.iter().enumerate() {
                if figures.planned == 0 && figures.realized == 0 {
                    continue;
                }
                let status = MonthStatus::classify(figures.compliance());
                months.push(vec![
                    Cell::text(snapshot.unit_name.clone()),
                    Cell::text(snapshot.project.name.clone()),
                    Cell::text(activity.activity.description.clone()),
                    Cell::text(MONTH_NAMES[idx]),
                    Cell::integer(figures.planned),
                    Cell::integer(figures.realized),
                    Cell::compliance(figures.compliance()),
                    Cell::text(status.label()).with_fill(status_fill(status)),
                ]);
            }
            for item in &activity.evidence {
                evidence_rows.push(vec![
                    Cell::text(snapshot.unit_name.clone()),
                    Cell::text(snapshot.project.name.clone()),
                    Cell::text(activity.activity.description.clone()),
                    Cell::text(evidence_month(item)),
                    Cell::text(item.kind.label()),
                    Cell::text(item.description.clone()),
                    Cell::text(evidence_target(item)),
                    Cell::text(format_date(item.created_at)),
                ]);
            }
        }
    }
    programming.push_table(months);
    evidence.push_table(evidence_rows);

    let mut sheets = vec![summary, statistics(projects)];
    for sheet in [detail, programming, evidence] {
        if sheet.blocks.len() > 1 {
            sheets.push(sheet);
        }
    }
    ReportDocument {
        title: "Consolidated POA".into(),
        generated_at,
        sheets,
    }
}

/// Counts per state and kind plus the overall compliance of approved,
/// planned work.
fn statistics(projects: &[ProjectSnapshot]) -> Sheet {
    let mut sheet = Sheet::new("Statistics");
    sheet.push(Block::Title("GENERAL STATISTICS".into()));

    let mut states = Table::new(&[("State", 20.0), ("Projects", 12.0)]);
    for state in ProjectState::ALL {
        let count = projects.iter().filter(|p| p.project.state == state).count();
        states.push(vec![Cell::text(state.label()), Cell::integer(count as i64)]);
    }

    let approved_series: Vec<_> = projects
        .iter()
        .filter(|p| p.project.state == ProjectState::Approved && !p.project.is_unplanned)
        .flat_map(ProjectSnapshot::compliance_series)
        .collect();
    let overall = PeriodSummary::from_series(&approved_series).annual;
    let budget = projects
        .iter()
        .map(ProjectSnapshot::budget_total)
        .fold(Decimal::ZERO, |acc, amount| acc + amount);
    sheet.push(Block::KeyValues(vec![
        ("Projects".into(), projects.len().to_string()),
        (
            "Unplanned activity projects".into(),
            projects.iter().filter(|p| p.project.is_unplanned).count().to_string(),
        ),
        (
            "Goals".into(),
            projects.iter().map(ProjectSnapshot::goal_count).sum::<usize>().to_string(),
        ),
        (
            "Activities".into(),
            projects.iter().map(ProjectSnapshot::activity_count).sum::<usize>().to_string(),
        ),
        (
            "Evidence items".into(),
            projects.iter().map(ProjectSnapshot::evidence_count).sum::<usize>().to_string(),
        ),
        ("Total budget".into(), format_money(budget)),
        ("Annual compliance (approved)".into(), Cell::aggregate(overall).display()),
    ]));
    sheet.push(Block::Spacer);
    sheet.push(Block::Table(states));
    sheet
}

/// Standalone statistics: the general figures over every project, then one
/// row per unit with its counts and annual compliance.
pub fn statistics_report(
    projects: &[ProjectSnapshot],
    units: &[UnitPerformance],
    settings: &ReportSettings,
    generated_at: DateTime<Utc>,
) -> ReportDocument {
    let mut sheet = statistics(projects);
    sheet.blocks.insert(1, Block::Subheading(settings.organization_name.clone()));

    let mut table = Table::new(&[
        ("Unit", 32.0),
        ("Projects", 10.0),
        ("Approved", 10.0),
        ("Annual compliance", 16.0),
    ]);
    for unit in units {
        table.push(vec![
            Cell::text(unit.unit.name.clone()),
            Cell::integer(unit.total_projects),
            Cell::integer(unit.approved_projects),
            Cell::aggregate(unit.performance()),
        ]);
    }
    if !table.is_empty() {
        sheet.push(Block::Heading("Units".into()));
        sheet.push_table(table);
    }

    ReportDocument {
        title: "System statistics".into(),
        generated_at,
        sheets: vec![sheet],
    }
}

/// Every account with its role and unit.
pub fn user_roster(
    users: &[UserRecord],
    settings: &ReportSettings,
    generated_at: DateTime<Utc>,
) -> ReportDocument {
    let mut sheet = Sheet::new("Users");
    sheet.push(Block::Title("SYSTEM USERS".into()));
    sheet.push(Block::Subheading(settings.organization_name.clone()));
    sheet.push(Block::KeyValues(vec![(
        "Total users".into(),
        users.len().to_string(),
    )]));

    let mut table = Table::new(&[
        ("Email", 36.0),
        ("Role", 16.0),
        ("Unit", 30.0),
        ("Registered", 14.0),
    ]);
    for record in users {
        table.push(vec![
            Cell::text(record.user.email.clone()),
            Cell::text(record.user.role.label()),
            Cell::text(record.unit_name.clone().unwrap_or_else(|| "N/A".into())),
            Cell::text(format_date(record.user.created_at)),
        ]);
    }
    sheet.push_table(table);

    ReportDocument {
        title: "Users report".into(),
        generated_at,
        sheets: vec![sheet],
    }
}

fn evidence_target(item: &Evidence) -> String {
    item.url
        .clone()
        .or_else(|| item.file_name.clone())
        .unwrap_or_default()
}

/// Audit entries, newest first as given.
pub fn audit_log(records: &[AuditRecord], generated_at: DateTime<Utc>) -> ReportDocument {
    let mut sheet = Sheet::new("Audit log");
    sheet.push(Block::Title("AUDIT LOG".into()));
    let mut table = Table::new(&[
        ("Recorded at", 18.0),
        ("Actor", 28.0),
        ("Action", 10.0),
        ("Table", 14.0),
        ("Record", 38.0),
        ("Origin", 16.0),
        ("Before", 40.0),
        ("After", 40.0),
    ]);
    for record in records {
        let entry = &record.entry;
        let json = |value: &Option<serde_json::Value>| {
            value.as_ref().map(|v| v.to_string()).unwrap_or_default()
        };
        table.push(vec![
            Cell::text(format_timestamp(entry.recorded_at)),
            Cell::text(record.actor_email.clone().unwrap_or_default()),
            Cell::text(entry.action.clone()),
            Cell::text(entry.table_name.clone()),
            Cell::text(entry.record_id.map(|id| id.to_string()).unwrap_or_default()),
            Cell::text(entry.origin_address.clone().unwrap_or_default()),
            Cell::text(json(&entry.before_state)),
            Cell::text(json(&entry.after_state)),
        ]);
    }
    if table.is_empty() {
        sheet.push(Block::Paragraph("No audit entries recorded.".into()));
    }
    sheet.push_table(table);
    ReportDocument {
        title: "Audit log".into(),
        generated_at,
        sheets: vec![sheet],
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;
    use crate::domain::models::{AuditEntry, Role, User};
    use crate::reporting::document::CellValue;
    use crate::reporting::snapshot::fixtures::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 0).unwrap()
    }

    fn tables(report: &ReportDocument) -> Vec<&Table> {
        report
            .sheets
            .iter()
            .flat_map(|sheet| sheet.blocks.iter())
            .filter_map(|block| match block {
                Block::Table(table) => Some(table),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn detail_breaks_page_per_goal_and_caps_evidence() {
        let unit = unit("Parks");
        let mut snapshot = sample_project(&unit);
        let activity = snapshot.goals[0].activities[0].activity.clone();
        for n in 0..10 {
            snapshot.goals[0].activities[0]
                .evidence
                .push(evidence(&activity, 2, &format!("photo-{n}")));
        }
        let settings = ReportSettings::default();
        let report = project_detail(&snapshot, &settings, at());
        let blocks = &report.sheets[0].blocks;

        let breaks = blocks.iter().filter(|b| matches!(b, Block::PageBreak)).count();
        assert_eq!(breaks, 2);

        let evidence_table = tables(&report)
            .into_iter()
            .find(|t| t.headers.first().map(String::as_str) == Some("Month") && t.headers.len() == 5)
            .unwrap();
        assert_eq!(evidence_table.rows.len(), settings.evidence_rows_per_activity);
        assert!(blocks
            .iter()
            .any(|b| matches!(b, Block::Paragraph(text) if text == "3 more evidence item(s) not listed.")));
    }

    #[test]
    fn detail_omits_empty_sections() {
        let unit = unit("Parks");
        let mut snapshot = sample_project(&unit);
        snapshot.goals[1].activities.clear();
        snapshot.goals[0].activities.truncate(1);
        snapshot.goals[0].activities[0].evidence.clear();
        let report = project_detail(&snapshot, &ReportSettings::default(), at());
        let all = tables(&report);
        // periods, one activity table, one programming table
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|table| !table.rows.is_empty()));
    }

    #[test]
    fn programming_rows_follow_planned_months() {
        let unit = unit("Parks");
        let snapshot = sample_project(&unit);
        let table = programming_table(&snapshot.goals[0].activities[0]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0][3], Cell::percent(Decimal::from(50)));
        assert_eq!(table.rows[0][4].display(), "Regular");
        assert_eq!(table.rows[2][3].display(), "100.00%");
    }

    #[test]
    fn roster_lists_units_with_tiers() {
        let parks = unit("Parks");
        let units = vec![
            UnitPerformance::new(parks.clone(), 2, 1, &[sample_project(&parks)]),
            UnitPerformance::new(unit("Archive"), 0, 0, &[]),
        ];
        let report = unit_roster(&units, &ReportSettings::default(), at());
        let table = tables(&report)[0];
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][5].display(), "NO VALUES ENTERED");
        assert_eq!(table.rows[1][6].display(), "No values");
        assert_eq!(table.rows[0][3], Cell::integer(2));
    }

    #[test]
    fn quarterly_filter_leaves_a_note_when_nothing_matches() {
        let units = vec![UnitPerformance::new(unit("Parks"), 0, 0, &[])];
        let report = quarterly(&units, Some("zzz"), &ReportSettings::default(), at());
        assert!(tables(&report).is_empty());
        assert!(report.sheets[0]
            .blocks
            .iter()
            .any(|b| matches!(b, Block::Paragraph(text) if text == "No units match the filter.")));
    }

    #[test]
    fn consolidated_summary_has_eleven_columns() {
        let unit = unit("Parks");
        let report = consolidated(&[sample_project(&unit)], &ReportSettings::default(), at());
        let names: Vec<&str> = report.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Summary", "Statistics", "Activities", "Monthly programming", "Evidence"]
        );
        let all = tables(&report);
        let summary = all[0];
        assert_eq!(summary.column_count(), 11);
        assert_eq!(summary.rows[0][8].value, CellValue::Money(Decimal::from(1800)));
        assert_eq!(all[1].rows[2], vec![Cell::text("Approved"), Cell::integer(1)]);
        assert_eq!(all[2].rows.len(), 3);
        // only months with a plan or a result are listed
        assert_eq!(all[3].rows.len(), 3 + 12 + 4);
        assert_eq!(all[4].rows[0][6].display(), "workshop-january.jpg");
    }

    #[test]
    fn consolidated_without_activities_keeps_summary_sheets() {
        let unit = unit("Parks");
        let mut snapshot = sample_project(&unit);
        snapshot.goals.clear();
        let report = consolidated(&[snapshot], &ReportSettings::default(), at());
        let names: Vec<&str> = report.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Summary", "Statistics"]);
    }

    #[test]
    fn goals_without_activities_say_so() {
        let unit = unit("Parks");
        let mut snapshot = sample_project(&unit);
        snapshot.goals[1].activities.clear();
        let report = project_detail(&snapshot, &ReportSettings::default(), at());
        let blocks = &report.sheets[0].blocks;
        let heading = blocks
            .iter()
            .position(|b| matches!(b, Block::Heading(text) if text == "Goal 2: Publish results"))
            .unwrap();
        assert!(matches!(&blocks[heading + 1], Block::Paragraph(text) if text == NO_ACTIVITIES));
        assert_eq!(blocks.len(), heading + 2);
    }

    #[test]
    fn statistics_report_lists_every_unit() {
        let parks = unit("Parks");
        let units = vec![
            UnitPerformance::new(parks.clone(), 2, 1, &[sample_project(&parks)]),
            UnitPerformance::new(unit("Archive"), 0, 0, &[]),
        ];
        let report =
            statistics_report(&[sample_project(&parks)], &units, &ReportSettings::default(), at());
        assert_eq!(report.sheets.len(), 1);
        assert!(matches!(
            &report.sheets[0].blocks[1],
            Block::Subheading(text) if text == &ReportSettings::default().organization_name
        ));
        let all = tables(&report);
        let per_unit = all.last().unwrap();
        assert_eq!(per_unit.rows.len(), 2);
        assert_eq!(per_unit.rows[0][0].display(), "Parks");
        assert_eq!(per_unit.rows[1][3].display(), "NO VALUES ENTERED");
    }

    #[test]
    fn user_roster_marks_accounts_without_unit() {
        let parks = unit("Parks");
        let users = vec![
            UserRecord {
                user: User {
                    id: Uuid::new_v4(),
                    email: "parks@city.gov".into(),
                    role: Role::Unit,
                    unit_id: Some(parks.id),
                    created_at: at(),
                },
                unit_name: Some(parks.name.clone()),
            },
            UserRecord {
                user: User {
                    id: Uuid::new_v4(),
                    email: "auditor@city.gov".into(),
                    role: Role::Auditor,
                    unit_id: None,
                    created_at: at(),
                },
                unit_name: None,
            },
        ];
        let report = user_roster(&users, &ReportSettings::default(), at());
        let table = tables(&report)[0];
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1].display(), "Unit");
        assert_eq!(table.rows[0][2].display(), "Parks");
        assert_eq!(table.rows[1][2].display(), "N/A");
        assert_eq!(table.rows[1][3].display(), "07/03/2025");
    }

    #[test]
    fn audit_log_prints_json_states() {
        let record = AuditRecord {
            entry: AuditEntry {
                id: Uuid::new_v4(),
                actor_id: None,
                action: "REJECT".into(),
                table_name: "projects".into(),
                record_id: None,
                before_state: Some(serde_json::json!({"state": "submitted"})),
                after_state: Some(serde_json::json!({"state": "rejected"})),
                origin_address: Some("10.0.0.1".into()),
                recorded_at: at(),
            },
            actor_email: Some("admin@city.gov".into()),
        };
        let report = audit_log(&[record], at());
        let table = tables(&report)[0];
        assert_eq!(table.rows[0][6].display(), r#"{"state":"submitted"}"#);
        assert_eq!(table.rows[0][0].display(), "07/03/2025 14:05");
    }
}

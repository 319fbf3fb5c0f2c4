//! Grid layout for the per-unit POA tracking sheet.
//!
//! One row per activity. Project and goal cells merge vertically over their
//! rows; every month takes four columns and each quarter closes with a
//! rollup column. Row and column numbers are zero-based sheet coordinates.

use rust_decimal::Decimal;

use crate::domain::compliance::{
    aggregate, quarter_months, semester_months, Aggregate, Compliance, MONTHS, MONTH_NAMES,
};

use super::snapshot::{ActivitySnapshot, ProjectSnapshot};

pub const TITLE_ROW: u32 = 1;
pub const INFO_FIRST_ROW: u32 = 4;
pub const HEADER_TOP_ROW: u32 = 10;
pub const HEADER_MONTH_ROW: u32 = 11;
pub const HEADER_SUB_ROW: u32 = 12;
pub const DATA_FIRST_ROW: u32 = 13;

pub const FIRST_COL: u16 = 1;
const FIRST_MONTH_COL: u16 = 6;
const QUARTER_SPAN: u16 = 13;

pub const UNPLANNED_TITLE: &str = "UNPLANNED ACTIVITIES";
pub const NOT_PROGRAMMED: &str = "Activity not programmed";
pub const OVER_PLAN: &str =
    "Value exceeds 100%: enter the programmed value and move the surplus to unplanned activities";
pub const UNPLANNED_IDLE: &str = "\u{2014}";

pub const MIN_ROW_HEIGHT: f64 = 30.0;
const LINE_HEIGHT: f64 = 15.0;

pub const FIXED_HEADERS: [&str; 5] = [
    "No.",
    "PROJECTS",
    "GOALS",
    "ACTIVITY",
    "UNIT OF MEASURE",
];
pub const MONTH_SUBHEADERS: [&str; 4] = [
    "Planned",
    "Realized",
    "Compliance",
    "Verification method or non-compliance cause",
];
pub const SUMMARY_HEADERS: [&str; 4] = [
    "SEMESTER 1 TRACKING",
    "SEMESTER 2 TRACKING",
    "ANNUAL AVERAGE",
    "TOTAL RESOURCES $",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Sequence,
    Project,
    Goal,
    Activity,
    UnitOfMeasure,
    /// 1-based month.
    Planned(usize),
    Realized(usize),
    Compliance(usize),
    Verification(usize),
    /// 1-based quarter.
    Quarter(usize),
    /// 1-based semester.
    Semester(usize),
    Annual,
    Resources,
}

impl Column {
    pub const fn index(self) -> u16 {
        match self {
            Column::Sequence => FIRST_COL,
            Column::Project => FIRST_COL + 1,
            Column::Goal => FIRST_COL + 2,
            Column::Activity => FIRST_COL + 3,
            Column::UnitOfMeasure => FIRST_COL + 4,
            Column::Planned(month) => month_base(month),
            Column::Realized(month) => month_base(month) + 1,
            Column::Compliance(month) => month_base(month) + 2,
            Column::Verification(month) => month_base(month) + 3,
            Column::Quarter(quarter) => {
                FIRST_MONTH_COL + (quarter as u16 - 1) * QUARTER_SPAN + QUARTER_SPAN - 1
            }
            Column::Semester(semester) => FIRST_MONTH_COL + 4 * QUARTER_SPAN + semester as u16 - 1,
            Column::Annual => FIRST_MONTH_COL + 4 * QUARTER_SPAN + 2,
            Column::Resources => FIRST_MONTH_COL + 4 * QUARTER_SPAN + 3,
        }
    }

    /// Column width in spreadsheet character units.
    pub fn width(self) -> f64 {
        match self {
            Column::Sequence => 5.0,
            Column::Project => 24.0,
            Column::Goal => 30.0,
            Column::Activity => 36.0,
            Column::UnitOfMeasure => 14.0,
            Column::Planned(_) | Column::Realized(_) => 10.0,
            Column::Compliance(_) => 13.0,
            Column::Verification(_) => 28.0,
            Column::Quarter(_) | Column::Semester(_) | Column::Annual => 14.0,
            Column::Resources => 16.0,
        }
    }

    /// Every column left to right.
    pub fn all() -> Vec<Column> {
        let mut columns = vec![
            Column::Sequence,
            Column::Project,
            Column::Goal,
            Column::Activity,
            Column::UnitOfMeasure,
        ];
        for quarter in 1..=4 {
            for month in quarter_months(quarter) {
                columns.extend([
                    Column::Planned(month),
                    Column::Realized(month),
                    Column::Compliance(month),
                    Column::Verification(month),
                ]);
            }
            columns.push(Column::Quarter(quarter));
        }
        columns.extend([
            Column::Semester(1),
            Column::Semester(2),
            Column::Annual,
            Column::Resources,
        ]);
        columns
    }
}

const fn month_base(month: usize) -> u16 {
    let quarter = (month as u16 - 1) / 3;
    let within = (month as u16 - 1) % 3;
    FIRST_MONTH_COL + quarter * QUARTER_SPAN + within * 4
}

pub const LAST_COL: u16 = Column::Resources.index();

/// Spreadsheet column letters for a zero-based column index.
pub fn column_name(col: u16) -> String {
    let mut n = u32::from(col) + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        name.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// A1-style reference for zero-based coordinates.
pub fn cell_ref(row: u32, col: u16) -> String {
    format!("{}{}", column_name(col), row + 1)
}

/// Live compliance formula for a programmed month. `over_plan_recorded`
/// marks months whose stored realized value already exceeds the plan; those
/// cap at 100% instead of flagging a manual overshoot.
pub fn compliance_formula(row: u32, month: usize, over_plan_recorded: bool) -> String {
    let planned = cell_ref(row, Column::Planned(month).index());
    let realized = cell_ref(row, Column::Realized(month).index());
    if over_plan_recorded {
        format!("=IFERROR(MIN({realized}/{planned},1),\"{NOT_PROGRAMMED}\")")
    } else {
        format!(
            "=IFERROR(IF({realized}/{planned}<=1,{realized}/{planned},\"{OVER_PLAN}\"),\"{NOT_PROGRAMMED}\")"
        )
    }
}

/// Average over the compliance cells of `months` on `row`.
pub fn rollup_formula(row: u32, months: &[usize]) -> String {
    let refs = months
        .iter()
        .map(|month| cell_ref(row, Column::Compliance(*month).index()))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "=IFERROR(AVERAGE({refs}),\"{}\")",
        Aggregate::NO_VALUES_LABEL
    )
}

/// Height for a cell showing `lines` lines of wrapped text.
pub fn row_height(lines: usize) -> f64 {
    (LINE_HEIGHT * lines as f64).max(MIN_ROW_HEIGHT)
}

/// Rough line count for `text` wrapped at `width` characters.
pub fn wrapped_lines(text: &str, width: usize) -> usize {
    let width = width.max(1);
    text.lines()
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum::<usize>()
        .max(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
    pub text: String,
}

impl HeaderCell {
    fn span(first_row: u32, first_col: u16, last_row: u32, last_col: u16, text: impl Into<String>) -> Self {
        Self {
            first_row,
            first_col,
            last_row,
            last_col,
            text: text.into(),
        }
    }

    pub fn is_merged(&self) -> bool {
        self.first_row != self.last_row || self.first_col != self.last_col
    }
}

/// Three header bands: quarter groups, month names, month sub-columns.
pub fn header_cells() -> Vec<HeaderCell> {
    let mut cells = vec![HeaderCell::span(
        HEADER_TOP_ROW,
        Column::Sequence.index(),
        HEADER_TOP_ROW,
        Column::UnitOfMeasure.index(),
        "ANNUAL OPERATING PLAN",
    )];

    let fixed = [
        Column::Sequence,
        Column::Project,
        Column::Goal,
        Column::Activity,
        Column::UnitOfMeasure,
    ];
    for (column, label) in fixed.iter().zip(FIXED_HEADERS) {
        cells.push(HeaderCell::span(
            HEADER_MONTH_ROW,
            column.index(),
            HEADER_SUB_ROW,
            column.index(),
            label,
        ));
    }

    for quarter in 1..=4usize {
        let first_month = *quarter_months(quarter).start();
        cells.push(HeaderCell::span(
            HEADER_TOP_ROW,
            Column::Planned(first_month).index(),
            HEADER_TOP_ROW,
            Column::Quarter(quarter).index(),
            format!("(Q{quarter}) QUARTER {quarter}"),
        ));
        for month in quarter_months(quarter) {
            cells.push(HeaderCell::span(
                HEADER_MONTH_ROW,
                Column::Planned(month).index(),
                HEADER_MONTH_ROW,
                Column::Verification(month).index(),
                MONTH_NAMES[month - 1].to_uppercase(),
            ));
            let subs = [
                Column::Planned(month),
                Column::Realized(month),
                Column::Compliance(month),
                Column::Verification(month),
            ];
            for (column, label) in subs.iter().zip(MONTH_SUBHEADERS) {
                cells.push(HeaderCell::span(
                    HEADER_SUB_ROW,
                    column.index(),
                    HEADER_SUB_ROW,
                    column.index(),
                    label,
                ));
            }
        }
        cells.push(HeaderCell::span(
            HEADER_MONTH_ROW,
            Column::Quarter(quarter).index(),
            HEADER_SUB_ROW,
            Column::Quarter(quarter).index(),
            "QUARTERLY TRACKING",
        ));
    }

    let summary = [
        Column::Semester(1),
        Column::Semester(2),
        Column::Annual,
        Column::Resources,
    ];
    for (column, label) in summary.iter().zip(SUMMARY_HEADERS) {
        cells.push(HeaderCell::span(
            HEADER_TOP_ROW,
            column.index(),
            HEADER_SUB_ROW,
            column.index(),
            label,
        ));
    }
    cells
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Planned,
    Unplanned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthCell {
    /// Planned section, month with a positive plan.
    Programmed {
        planned: i64,
        realized: i64,
        compliance: Compliance,
        surplus: i64,
        note: String,
    },
    /// Planned section, nothing programmed this month.
    NotProgrammed,
    /// Unplanned section, work recorded this month.
    UnplannedDone { realized: i64, note: String },
    /// Unplanned section, nothing recorded.
    UnplannedIdle,
}

impl MonthCell {
    /// Whether the compliance cell takes part in rollups.
    pub fn is_eligible(&self) -> bool {
        matches!(self, MonthCell::Programmed { .. } | MonthCell::UnplannedDone { .. })
    }

    pub fn compliance(&self) -> Compliance {
        match self {
            MonthCell::Programmed { compliance, .. } => *compliance,
            MonthCell::UnplannedDone { .. } => Compliance::Percent(Decimal::ONE_HUNDRED),
            MonthCell::NotProgrammed | MonthCell::UnplannedIdle => Compliance::NotApplicable,
        }
    }
}

/// A rollup cell: the months it averages plus the computed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rollup {
    pub months: Vec<usize>,
    pub value: Aggregate,
}

impl Rollup {
    fn over(cells: &[MonthCell; MONTHS], months: impl Iterator<Item = usize>) -> Self {
        let months: Vec<usize> = months.filter(|m| cells[m - 1].is_eligible()).collect();
        let value = aggregate(months.iter().map(|m| cells[m - 1].compliance()));
        Self { months, value }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingRow {
    pub row: u32,
    pub section: Section,
    pub sequence: usize,
    pub activity: String,
    pub unit_of_measure: String,
    pub months: [MonthCell; MONTHS],
    pub quarters: [Rollup; 4],
    pub semesters: [Rollup; 2],
    pub annual: Rollup,
    pub resources: Decimal,
    pub height: f64,
}

impl TrackingRow {
    /// Literal shown in a rollup cell with nothing to average.
    pub fn empty_rollup_marker(&self) -> &'static str {
        match self.section {
            Section::Planned => Aggregate::NO_VALUES_LABEL,
            Section::Unplanned => UNPLANNED_IDLE,
        }
    }
}

/// Vertical merge over the rows of one project or goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSpan {
    pub column: Column,
    pub first_row: u32,
    pub last_row: u32,
    pub text: String,
}

impl MergeSpan {
    pub fn is_merged(&self) -> bool {
        self.last_row > self.first_row
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoBlock {
    pub unit_name: String,
    pub strategic_objective: String,
    pub unit_objectives: Vec<String>,
    pub objectives_height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingLayout {
    pub title: String,
    pub info: InfoBlock,
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<TrackingRow>,
    pub merges: Vec<MergeSpan>,
    pub unplanned_banner: Option<u32>,
}

impl TrackingLayout {
    pub fn last_row(&self) -> u32 {
        self.rows
            .last()
            .map(|row| row.row)
            .into_iter()
            .chain(self.unplanned_banner)
            .max()
            .unwrap_or(HEADER_SUB_ROW)
    }
}

pub struct TrackingInput<'a> {
    pub unit_name: &'a str,
    pub year: i32,
    pub strategic_objective: Option<&'a str>,
    pub planned: &'a [ProjectSnapshot],
    pub unplanned: Option<&'a ProjectSnapshot>,
}

/// Lays out approved planned projects followed by the unit's unplanned
/// bucket. Projects, goals or activities with nothing to show are skipped.
pub fn build_tracking_layout(input: &TrackingInput<'_>) -> TrackingLayout {
    let mut objectives: Vec<String> = Vec::new();
    for snapshot in input.planned {
        let objective = snapshot.project.unit_objective.trim();
        if !objective.is_empty() && !objectives.iter().any(|o| o == objective) {
            objectives.push(objective.to_string());
        }
    }
    let objective_lines: Vec<String> = objectives.iter().map(|o| format!("- {o}")).collect();
    let info_width = (Column::Goal.width() + Column::Activity.width() + Column::UnitOfMeasure.width())
        as usize;
    let objectives_height = row_height(
        objective_lines
            .iter()
            .map(|line| wrapped_lines(line, info_width))
            .sum::<usize>(),
    );

    let mut builder = RowBuilder {
        next_row: DATA_FIRST_ROW,
        sequence: 0,
        rows: Vec::new(),
        merges: Vec::new(),
    };

    for snapshot in input.planned {
        builder.push_project(snapshot, Section::Planned, &snapshot.project.name);
    }

    let mut unplanned_banner = None;
    if let Some(snapshot) = input.unplanned {
        if snapshot.activity_count() > 0 {
            unplanned_banner = Some(builder.next_row);
            builder.next_row += 1;
            builder.push_project(snapshot, Section::Unplanned, UNPLANNED_TITLE);
        }
    }

    TrackingLayout {
        title: format!("ANNUAL OPERATING PLAN (POA) {}", input.year),
        info: InfoBlock {
            unit_name: input.unit_name.to_string(),
            strategic_objective: input.strategic_objective.unwrap_or_default().to_string(),
            unit_objectives: objective_lines,
            objectives_height,
        },
        headers: header_cells(),
        rows: builder.rows,
        merges: builder.merges,
        unplanned_banner,
    }
}

struct RowBuilder {
    next_row: u32,
    sequence: usize,
    rows: Vec<TrackingRow>,
    merges: Vec<MergeSpan>,
}

impl RowBuilder {
    fn push_project(&mut self, snapshot: &ProjectSnapshot, section: Section, label: &str) {
        let project_first = self.next_row;
        for goal in &snapshot.goals {
            if goal.activities.is_empty() {
                continue;
            }
            let goal_first = self.next_row;
            for activity in &goal.activities {
                let row = self.activity_row(activity, section);
                self.rows.push(row);
                self.next_row += 1;
            }
            self.merges.push(MergeSpan {
                column: Column::Goal,
                first_row: goal_first,
                last_row: self.next_row - 1,
                text: goal.goal.description.clone(),
            });
        }
        if self.next_row > project_first {
            self.merges.push(MergeSpan {
                column: Column::Project,
                first_row: project_first,
                last_row: self.next_row - 1,
                text: label.to_string(),
            });
        }
    }

    fn activity_row(&mut self, snapshot: &ActivitySnapshot, section: Section) -> TrackingRow {
        self.sequence += 1;
        let months: [MonthCell; MONTHS] = std::array::from_fn(|idx| {
            let month = idx + 1;
            let figures = snapshot.month(month);
            let note = month_note(snapshot, month);
            match section {
                Section::Planned if figures.planned > 0 => MonthCell::Programmed {
                    planned: figures.planned,
                    realized: figures.realized,
                    compliance: figures.compliance(),
                    surplus: figures.surplus(),
                    note,
                },
                Section::Planned => MonthCell::NotProgrammed,
                Section::Unplanned if figures.realized > 0 => MonthCell::UnplannedDone {
                    realized: figures.realized,
                    note,
                },
                Section::Unplanned => MonthCell::UnplannedIdle,
            }
        });

        let activity = &snapshot.activity;
        let lines = [
            wrapped_lines(&activity.description, Column::Activity.width() as usize),
            wrapped_lines(&activity.unit_of_measure, Column::UnitOfMeasure.width() as usize),
        ]
        .into_iter()
        .max()
        .unwrap_or(1);

        TrackingRow {
            row: self.next_row,
            section,
            sequence: self.sequence,
            activity: activity.description.clone(),
            unit_of_measure: activity.unit_of_measure.clone(),
            quarters: [1, 2, 3, 4].map(|q| Rollup::over(&months, quarter_months(q))),
            semesters: [1, 2].map(|s| Rollup::over(&months, semester_months(s))),
            annual: Rollup::over(&months, 1..=MONTHS),
            months,
            resources: activity.resource_amount,
            height: row_height(lines),
        }
    }
}

/// Non-compliance cause when given, else the month's evidence descriptions.
fn month_note(snapshot: &ActivitySnapshot, month: usize) -> String {
    if let Some(cause) = snapshot
        .month(month)
        .cause
        .as_deref()
        .map(str::trim)
        .filter(|cause| !cause.is_empty())
    {
        return cause.to_string();
    }
    snapshot
        .evidence_for_month(month)
        .map(|evidence| {
            if !evidence.description.trim().is_empty() {
                evidence.description.clone()
            } else if let Some(url) = &evidence.url {
                url.clone()
            } else {
                evidence.file_name.clone().unwrap_or_default()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

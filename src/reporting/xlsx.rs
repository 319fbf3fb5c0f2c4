//! Spreadsheet emitter. The tracking sheet keeps compliance and rollup cells
//! as live formulas with cached results; every other report is written from
//! the shared block model.

use chrono::{DateTime, Datelike, Timelike, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use rust_xlsxwriter::{
    DocProperties, ExcelDateTime, Format, FormatAlign, FormatBorder, Formula, Workbook, Worksheet,
    XlsxError,
};

use crate::domain::compliance::MONTHS;

use super::{
    document::{Block, Cell, CellValue, ReportDocument, Sheet},
    layout::{
        compliance_formula, rollup_formula, Column, MonthCell, Rollup, TrackingLayout, TrackingRow,
        DATA_FIRST_ROW, INFO_FIRST_ROW, NOT_PROGRAMMED, TITLE_ROW, UNPLANNED_IDLE, UNPLANNED_TITLE,
    },
    ReportError,
};

const HEADER_FILL: u32 = 0x305496;
const UNPLANNED_FILL: u32 = 0x808080;
const INFO_FILL: u32 = 0xD9E1F2;
const SECTION_COLOR: u32 = 0x1E40AF;
const PERCENT_FORMAT: &str = "0%";
const MONEY_FORMAT: &str = "\"$\" #,##0.00";
const SHEET_NAME_LIMIT: usize = 31;

struct Styles {
    title: Format,
    label: Format,
    info: Format,
    header: Format,
    banner: Format,
    wrap: Format,
    merged: Format,
    integer: Format,
    percent: Format,
    money: Format,
    marker: Format,
    section: Format,
}

impl Styles {
    fn new() -> Self {
        let bordered = || Format::new().set_border(FormatBorder::Thin);
        Self {
            title: Format::new()
                .set_bold()
                .set_font_size(16)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            label: bordered().set_bold().set_background_color(INFO_FILL),
            info: bordered()
                .set_text_wrap()
                .set_align(FormatAlign::Top),
            header: bordered()
                .set_bold()
                .set_font_color(0xFFFFFF)
                .set_background_color(HEADER_FILL)
                .set_text_wrap()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            banner: bordered()
                .set_bold()
                .set_font_color(0xFFFFFF)
                .set_background_color(UNPLANNED_FILL)
                .set_align(FormatAlign::Center),
            wrap: bordered().set_text_wrap().set_align(FormatAlign::Top),
            merged: bordered()
                .set_text_wrap()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            integer: bordered()
                .set_num_format("0")
                .set_align(FormatAlign::Center),
            percent: bordered()
                .set_num_format(PERCENT_FORMAT)
                .set_align(FormatAlign::Center)
                .set_text_wrap(),
            money: bordered().set_num_format(MONEY_FORMAT),
            marker: bordered()
                .set_italic()
                .set_text_wrap()
                .set_align(FormatAlign::Center),
            section: Format::new().set_bold().set_font_color(SECTION_COLOR),
        }
    }
}

fn fraction(value: Decimal) -> f64 {
    (value / Decimal::ONE_HUNDRED).to_f64().unwrap_or_default()
}

fn money(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Writes `text` over the span, merging only when it covers more than one
/// cell.
fn write_span(
    sheet: &mut Worksheet,
    (first_row, first_col): (u32, u16),
    (last_row, last_col): (u32, u16),
    text: &str,
    format: &Format,
) -> Result<(), XlsxError> {
    if first_row == last_row && first_col == last_col {
        sheet.write_with_format(first_row, first_col, text, format)?;
    } else {
        sheet.merge_range(first_row, first_col, last_row, last_col, text, format)?;
    }
    Ok(())
}

fn stamp(workbook: &mut Workbook, generated_at: DateTime<Utc>) -> Result<(), XlsxError> {
    let created = ExcelDateTime::from_ymd(
        generated_at.year() as u16,
        generated_at.month() as u8,
        generated_at.day() as u8,
    )?
    .and_hms(
        generated_at.hour() as u16,
        generated_at.minute() as u8,
        generated_at.second(),
    )?;
    let properties = DocProperties::new().set_creation_datetime(&created);
    workbook.set_properties(&properties);
    Ok(())
}

/// The per-unit POA tracking workbook.
pub fn tracking_workbook(
    layout: &TrackingLayout,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, ReportError> {
    let styles = Styles::new();
    let mut workbook = Workbook::new();
    stamp(&mut workbook, generated_at)?;
    let sheet = workbook.add_worksheet();
    sheet.set_name("POA")?;

    for column in Column::all() {
        sheet.set_column_width(column.index(), column.width())?;
    }

    write_span(
        sheet,
        (TITLE_ROW, Column::Sequence.index()),
        (TITLE_ROW, Column::Quarter(1).index()),
        &layout.title,
        &styles.title,
    )?;
    sheet.set_row_height(TITLE_ROW, 30)?;

    let objectives = layout.info.unit_objectives.join("\n");
    let info = [
        ("UNIT", layout.info.unit_name.as_str()),
        ("STRATEGIC OBJECTIVE", layout.info.strategic_objective.as_str()),
        ("UNIT OBJECTIVES", objectives.as_str()),
    ];
    for (offset, (label, value)) in info.iter().enumerate() {
        let row = INFO_FIRST_ROW + offset as u32;
        write_span(
            sheet,
            (row, Column::Sequence.index()),
            (row, Column::Project.index()),
            label,
            &styles.label,
        )?;
        write_span(
            sheet,
            (row, Column::Goal.index()),
            (row, Column::UnitOfMeasure.index()),
            value,
            &styles.info,
        )?;
    }
    sheet.set_row_height(INFO_FIRST_ROW + 2, layout.info.objectives_height)?;

    for cell in &layout.headers {
        write_span(
            sheet,
            (cell.first_row, cell.first_col),
            (cell.last_row, cell.last_col),
            &cell.text,
            &styles.header,
        )?;
    }

    if let Some(row) = layout.unplanned_banner {
        write_span(
            sheet,
            (row, Column::Sequence.index()),
            (row, Column::UnitOfMeasure.index()),
            UNPLANNED_TITLE,
            &styles.banner,
        )?;
    }

    for row in &layout.rows {
        write_tracking_row(sheet, row, &styles)?;
    }

    for span in &layout.merges {
        write_span(
            sheet,
            (span.first_row, span.column.index()),
            (span.last_row, span.column.index()),
            &span.text,
            &styles.merged,
        )?;
    }

    sheet.set_freeze_panes(DATA_FIRST_ROW, Column::Planned(1).index())?;
    Ok(workbook.save_to_buffer()?)
}

fn write_tracking_row(
    sheet: &mut Worksheet,
    row: &TrackingRow,
    styles: &Styles,
) -> Result<(), XlsxError> {
    let r = row.row;
    sheet.set_row_height(r, row.height)?;
    sheet.write_with_format(r, Column::Sequence.index(), row.sequence as f64, &styles.integer)?;
    sheet.write_with_format(r, Column::Activity.index(), row.activity.as_str(), &styles.wrap)?;
    sheet.write_with_format(
        r,
        Column::UnitOfMeasure.index(),
        row.unit_of_measure.as_str(),
        &styles.wrap,
    )?;

    for month in 1..=MONTHS {
        let planned = Column::Planned(month).index();
        let realized = Column::Realized(month).index();
        let compliance = Column::Compliance(month).index();
        let note = Column::Verification(month).index();
        match &row.months[month - 1] {
            MonthCell::Programmed {
                planned: plan,
                realized: done,
                compliance: value,
                surplus,
                note: text,
            } => {
                sheet.write_with_format(r, planned, *plan as f64, &styles.integer)?;
                sheet.write_with_format(r, realized, *done as f64, &styles.integer)?;
                let cached = value
                    .value()
                    .map(|v| fraction(v).to_string())
                    .unwrap_or_else(|| NOT_PROGRAMMED.to_string());
                let formula = Formula::new(compliance_formula(r, month, *surplus > 0))
                    .set_result(cached);
                sheet.write_formula_with_format(r, compliance, formula, &styles.percent)?;
                sheet.write_with_format(r, note, text.as_str(), &styles.wrap)?;
            }
            MonthCell::NotProgrammed => {
                sheet.write_blank(r, planned, &styles.integer)?;
                sheet.write_blank(r, realized, &styles.integer)?;
                let formula = Formula::new(compliance_formula(r, month, false))
                    .set_result(NOT_PROGRAMMED);
                sheet.write_formula_with_format(r, compliance, formula, &styles.marker)?;
                sheet.write_blank(r, note, &styles.wrap)?;
            }
            MonthCell::UnplannedDone {
                realized: done,
                note: text,
            } => {
                sheet.write_blank(r, planned, &styles.integer)?;
                sheet.write_with_format(r, realized, *done as f64, &styles.integer)?;
                sheet.write_with_format(r, compliance, 1.0, &styles.percent)?;
                sheet.write_with_format(r, note, text.as_str(), &styles.wrap)?;
            }
            MonthCell::UnplannedIdle => {
                sheet.write_blank(r, planned, &styles.integer)?;
                sheet.write_blank(r, realized, &styles.integer)?;
                sheet.write_with_format(r, compliance, UNPLANNED_IDLE, &styles.marker)?;
                sheet.write_blank(r, note, &styles.wrap)?;
            }
        }
    }

    let rollups = row
        .quarters
        .iter()
        .enumerate()
        .map(|(idx, rollup)| (Column::Quarter(idx + 1), rollup))
        .chain(
            row.semesters
                .iter()
                .enumerate()
                .map(|(idx, rollup)| (Column::Semester(idx + 1), rollup)),
        )
        .chain(std::iter::once((Column::Annual, &row.annual)));
    for (column, rollup) in rollups {
        write_rollup(sheet, row, column, rollup, styles)?;
    }

    sheet.write_with_format(r, Column::Resources.index(), money(row.resources), &styles.money)?;
    Ok(())
}

fn write_rollup(
    sheet: &mut Worksheet,
    row: &TrackingRow,
    column: Column,
    rollup: &Rollup,
    styles: &Styles,
) -> Result<(), XlsxError> {
    match rollup.value.value() {
        Some(value) if !rollup.months.is_empty() => {
            let formula = Formula::new(rollup_formula(row.row, &rollup.months))
                .set_result(fraction(value).to_string());
            sheet.write_formula_with_format(row.row, column.index(), formula, &styles.percent)?;
        }
        _ => {
            sheet.write_with_format(
                row.row,
                column.index(),
                row.empty_rollup_marker(),
                &styles.marker,
            )?;
        }
    }
    Ok(())
}

/// Any block-model report: one worksheet per sheet.
pub fn sheets_workbook(report: &ReportDocument) -> Result<Vec<u8>, ReportError> {
    let styles = Styles::new();
    let mut workbook = Workbook::new();
    stamp(&mut workbook, report.generated_at)?;
    for sheet_def in &report.sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name(&sheet_def.name))?;
        write_blocks(sheet, sheet_def, &styles)?;
    }
    Ok(workbook.save_to_buffer()?)
}

fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| !matches!(ch, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(SHEET_NAME_LIMIT)
        .collect();
    if cleaned.trim().is_empty() {
        "Report".to_string()
    } else {
        cleaned
    }
}

fn write_blocks(sheet: &mut Worksheet, def: &Sheet, styles: &Styles) -> Result<(), XlsxError> {
    let widths = match def.widest_table() {
        Some(table) => table.widths.clone(),
        None => vec![30.0, 60.0],
    };
    for (col, width) in widths.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }
    let last_col = (widths.len().max(2) - 1) as u16;

    let mut row: u32 = 0;
    for block in &def.blocks {
        match block {
            Block::Title(text) => {
                write_span(sheet, (row, 0), (row, last_col), text, &styles.title)?;
                sheet.set_row_height(row, 28)?;
                row += 1;
            }
            Block::Heading(text) => {
                row += 1;
                sheet.write_with_format(row, 0, text.as_str(), &styles.section)?;
                row += 1;
            }
            Block::Subheading(text) => {
                sheet.write_with_format(row, 0, text.as_str(), &styles.section)?;
                row += 1;
            }
            Block::Paragraph(text) => {
                write_span(sheet, (row, 0), (row, last_col), text, &styles.info)?;
                row += 1;
            }
            Block::KeyValues(pairs) => {
                for (key, value) in pairs {
                    sheet.write_with_format(row, 0, key.as_str(), &styles.label)?;
                    write_span(sheet, (row, 1), (row, last_col), value, &styles.info)?;
                    row += 1;
                }
            }
            Block::Table(table) => {
                for (col, header) in table.headers.iter().enumerate() {
                    sheet.write_with_format(row, col as u16, header.as_str(), &styles.header)?;
                }
                row += 1;
                for cells in &table.rows {
                    for (col, cell) in cells.iter().enumerate() {
                        write_cell(sheet, row, col as u16, cell, styles)?;
                    }
                    row += 1;
                }
                row += 1;
            }
            Block::PageBreak | Block::Spacer => row += 1,
        }
    }
    Ok(())
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    styles: &Styles,
) -> Result<(), XlsxError> {
    let base = match &cell.value {
        CellValue::Integer(_) => &styles.integer,
        CellValue::Money(_) => &styles.money,
        CellValue::Percent(_) => &styles.percent,
        CellValue::Text(_) | CellValue::Empty => &styles.wrap,
    };
    let mut format = base.clone();
    if let Some(fill) = cell.fill {
        format = format.set_background_color(fill);
    }
    if cell.bold {
        format = format.set_bold();
    }
    match &cell.value {
        CellValue::Text(text) => sheet.write_with_format(row, col, text.as_str(), &format)?,
        CellValue::Integer(value) => sheet.write_with_format(row, col, *value as f64, &format)?,
        CellValue::Money(value) => sheet.write_with_format(row, col, money(*value), &format)?,
        CellValue::Percent(value) => sheet.write_with_format(row, col, fraction(*value), &format)?,
        CellValue::Empty => sheet.write_blank(row, col, &format)?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::infrastructure::config::ReportSettings;
    use crate::domain::compliance::Aggregate;
    use crate::reporting::{
        builders,
        layout::{build_tracking_layout, cell_ref, TrackingInput, OVER_PLAN},
        snapshot::{fixtures::*, ProjectSnapshot},
    };

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 0).unwrap()
    }

    #[test]
    fn tracking_workbook_is_a_zip_package() {
        let unit = unit("Parks");
        let projects = vec![sample_project(&unit)];
        let unplanned = unplanned_project(&unit);
        let layout = build_tracking_layout(&TrackingInput {
            unit_name: "Parks",
            year: 2024,
            strategic_objective: Some("Sustainable city"),
            planned: &projects,
            unplanned: Some(&unplanned),
        });
        let bytes = tracking_workbook(&layout, at()).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    fn part(bytes: &[u8], name: &str) -> String {
        use std::io::Read;

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut xml = String::new();
        file.read_to_string(&mut xml).unwrap();
        xml.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
    }

    fn cell<'a>(sheet: &'a str, row: u32, column: Column) -> &'a str {
        let open = format!("<c r=\"{}\"", cell_ref(row, column.index()));
        let start = sheet.find(&open).unwrap_or_else(|| panic!("missing cell {open}"));
        let end = start + sheet[start..].find("</c>").unwrap();
        &sheet[start..end]
    }

    fn parks_layout(unit: &crate::domain::models::Unit) -> (Vec<ProjectSnapshot>, ProjectSnapshot) {
        (vec![sample_project(unit)], unplanned_project(unit))
    }

    #[test]
    fn tracking_sheet_keeps_live_compliance_formulas() {
        let unit = unit("Parks");
        let (projects, unplanned) = parks_layout(&unit);
        let layout = build_tracking_layout(&TrackingInput {
            unit_name: "Parks",
            year: 2024,
            strategic_objective: None,
            planned: &projects,
            unplanned: Some(&unplanned),
        });
        let bytes = tracking_workbook(&layout, at()).unwrap();
        let sheet = part(&bytes, "xl/worksheets/sheet1.xml");

        let workshops = layout.rows.iter().find(|row| row.activity == "Run workshops").unwrap();
        let r = workshops.row;
        let planned = |m| cell_ref(r, Column::Planned(m).index());
        let realized = |m| cell_ref(r, Column::Realized(m).index());

        let january = cell(&sheet, r, Column::Compliance(1));
        let ratio = format!("{}/{}", realized(1), planned(1));
        assert!(january.contains(&format!(
            "<f>IFERROR(IF({ratio}<=1,{ratio},\"{OVER_PLAN}\"),\"{NOT_PROGRAMMED}\")</f>"
        )));

        // March was recorded over plan, so the cell caps at 100%.
        let march = cell(&sheet, r, Column::Compliance(3));
        assert!(march.contains(&format!(
            "<f>IFERROR(MIN({}/{},1),\"{NOT_PROGRAMMED}\")</f>",
            realized(3),
            planned(3)
        )));

        // April has no plan: the formula stays but falls back to the marker.
        let april = cell(&sheet, r, Column::Compliance(4));
        assert!(april.contains("<f>IFERROR(IF("));
        assert!(april.contains(NOT_PROGRAMMED));
    }

    #[test]
    fn tracking_rollups_average_eligible_months_only() {
        let unit = unit("Parks");
        let (projects, unplanned) = parks_layout(&unit);
        let layout = build_tracking_layout(&TrackingInput {
            unit_name: "Parks",
            year: 2024,
            strategic_objective: None,
            planned: &projects,
            unplanned: Some(&unplanned),
        });
        let bytes = tracking_workbook(&layout, at()).unwrap();
        let sheet = part(&bytes, "xl/worksheets/sheet1.xml");
        let compliance = |row: u32, m| cell_ref(row, Column::Compliance(m).index());

        let workshops = layout.rows.iter().find(|row| row.activity == "Run workshops").unwrap();
        let q1 = cell(&sheet, workshops.row, Column::Quarter(1));
        assert!(q1.contains(&format!(
            "<f>IFERROR(AVERAGE({},{},{}),\"{}\")</f>",
            compliance(workshops.row, 1),
            compliance(workshops.row, 2),
            compliance(workshops.row, 3),
            Aggregate::NO_VALUES_LABEL
        )));
        let q2 = cell(&sheet, workshops.row, Column::Quarter(2));
        assert!(!q2.contains("<f>"));

        let bulletin = layout
            .rows
            .iter()
            .find(|row| row.activity == "Quarterly bulletin")
            .unwrap();
        let q1 = cell(&sheet, bulletin.row, Column::Quarter(1));
        assert!(q1.contains(&format!(
            "<f>IFERROR(AVERAGE({}),\"{}\")</f>",
            compliance(bulletin.row, 3),
            Aggregate::NO_VALUES_LABEL
        )));
        assert!(!q1.contains(&compliance(bulletin.row, 1)));

        let shared = part(&bytes, "xl/sharedStrings.xml");
        assert!(shared.contains(Aggregate::NO_VALUES_LABEL));
    }

    #[test]
    fn unplanned_rows_use_literals_and_markers() {
        let unit = unit("Parks");
        let (projects, unplanned) = parks_layout(&unit);
        let layout = build_tracking_layout(&TrackingInput {
            unit_name: "Parks",
            year: 2024,
            strategic_objective: None,
            planned: &projects,
            unplanned: Some(&unplanned),
        });
        let bytes = tracking_workbook(&layout, at()).unwrap();
        let sheet = part(&bytes, "xl/worksheets/sheet1.xml");
        let cleanup = layout.rows.iter().find(|row| row.activity == "Storm cleanup").unwrap();

        let february = cell(&sheet, cleanup.row, Column::Compliance(2));
        assert!(february.contains("<v>1</v>"));
        assert!(!february.contains("<f>"));

        let january = cell(&sheet, cleanup.row, Column::Compliance(1));
        assert!(january.contains("t=\"s\""));
        assert!(!january.contains("<f>"));

        let shared = part(&bytes, "xl/sharedStrings.xml");
        assert!(shared.contains(UNPLANNED_IDLE));
        assert!(shared.contains(UNPLANNED_TITLE));
    }

    #[test]
    fn tracking_styles_carry_percent_and_currency_formats() {
        let unit = unit("Parks");
        let (projects, _) = parks_layout(&unit);
        let layout = build_tracking_layout(&TrackingInput {
            unit_name: "Parks",
            year: 2024,
            strategic_objective: None,
            planned: &projects,
            unplanned: None,
        });
        let bytes = tracking_workbook(&layout, at()).unwrap();
        let styles = part(&bytes, "xl/styles.xml");
        assert!(styles.contains(&format!("formatCode=\"{MONEY_FORMAT}\"")));
        // "0%" is a built-in format and may be referenced by id only.
        assert!(styles.contains("numFmtId=\"9\"") || styles.contains("formatCode=\"0%\""));
    }

    #[test]
    fn tracking_workbook_handles_units_without_activities() {
        let layout = build_tracking_layout(&TrackingInput {
            unit_name: "Archive",
            year: 2024,
            strategic_objective: None,
            planned: &[],
            unplanned: None,
        });
        let bytes = tracking_workbook(&layout, at()).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn block_reports_render_every_sheet() {
        let unit = unit("Parks");
        let report = builders::consolidated(&[sample_project(&unit)], &ReportSettings::default(), at());
        let bytes = sheets_workbook(&report).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn sheet_names_are_sanitized() {
        assert_eq!(sheet_name("Audit/log: 2025"), "Auditlog 2025");
        assert_eq!(sheet_name("???"), "Report");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }

    #[test]
    fn fractions_feed_the_percent_format() {
        assert_eq!(fraction(Decimal::new(8333, 2)), 0.8333);
        assert_eq!(fraction(Decimal::ONE_HUNDRED), 1.0);
    }
}

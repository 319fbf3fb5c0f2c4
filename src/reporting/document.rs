//! Format-neutral report content shared by the spreadsheet and PDF
//! emitters. Builders produce these values once; each emitter decides how
//! to draw them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::compliance::{Aggregate, Compliance};

pub const GENERATED_FOOTER: &str = "Automatically generated document";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Money(Decimal),
    /// Percentage on a 0..=100 scale.
    Percent(Decimal),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub value: CellValue,
    /// Background as `0xRRGGBB`.
    pub fill: Option<u32>,
    pub bold: bool,
}

impl Cell {
    fn of(value: CellValue) -> Self {
        Self {
            value,
            fill: None,
            bold: false,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::of(CellValue::Text(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Self::of(CellValue::Integer(value))
    }

    pub fn money(value: Decimal) -> Self {
        Self::of(CellValue::Money(value))
    }

    pub fn percent(value: Decimal) -> Self {
        Self::of(CellValue::Percent(value))
    }

    pub fn empty() -> Self {
        Self::of(CellValue::Empty)
    }

    pub fn compliance(value: Compliance) -> Self {
        match value {
            Compliance::Percent(value) => Self::percent(value),
            Compliance::NotApplicable => Self::text("N/A"),
        }
    }

    pub fn aggregate(value: Aggregate) -> Self {
        match value {
            Aggregate::Value(value) => Self::percent(value),
            Aggregate::NoValues => Self::text(Aggregate::NO_VALUES_LABEL),
        }
    }

    pub fn with_fill(mut self, fill: Option<u32>) -> Self {
        self.fill = fill;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Text as printed in the paginated document.
    pub fn display(&self) -> String {
        match &self.value {
            CellValue::Text(text) => text.clone(),
            CellValue::Integer(value) => value.to_string(),
            CellValue::Money(value) => format_money(*value),
            CellValue::Percent(value) => format!("{value:.2}%"),
            CellValue::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    /// Column widths in character units; the PDF emitter scales them to
    /// the page.
    pub widths: Vec<f64>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: &[(&str, f64)]) -> Self {
        Self {
            headers: columns.iter().map(|(name, _)| name.to_string()).collect(),
            widths: columns.iter().map(|(_, width)| *width).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Heading(String),
    Subheading(String),
    Paragraph(String),
    KeyValues(Vec<(String, String)>),
    Table(Table),
    PageBreak,
    Spacer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub blocks: Vec<Block>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Adds the table unless it has no rows.
    pub fn push_table(&mut self, table: Table) {
        if !table.is_empty() {
            self.blocks.push(Block::Table(table));
        }
    }

    /// Widest table in the sheet, used for spreadsheet column widths.
    pub fn widest_table(&self) -> Option<&Table> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Table(table) => Some(table),
                _ => None,
            })
            .max_by_key(|table| table.column_count())
    }
}

/// A whole report. The spreadsheet emitter writes one worksheet per sheet;
/// the PDF emitter prints the sheets one after another.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub sheets: Vec<Sheet>,
}

impl ReportDocument {
    pub fn footer(&self) -> String {
        format!(
            "{GENERATED_FOOTER} - {}",
            format_timestamp(self.generated_at)
        )
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y").to_string()
}

/// `$1,234,567.89` with the sign ahead of the currency symbol.
pub fn format_money(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{fraction}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn money_is_grouped_by_thousands() {
        assert_eq!(format_money(Decimal::new(150000, 2)), "$1,500.00");
        assert_eq!(format_money(Decimal::new(9999999999, 2)), "$99,999,999.99");
        assert_eq!(format_money(Decimal::ZERO), "$0.00");
        assert_eq!(format_money(Decimal::new(-12345, 1)), "-$1,234.50");
        assert_eq!(format_money(Decimal::new(999, 0)), "$999.00");
    }

    #[test]
    fn cells_render_markers_and_percentages() {
        assert_eq!(Cell::compliance(Compliance::NotApplicable).display(), "N/A");
        assert_eq!(
            Cell::aggregate(Aggregate::NoValues).display(),
            "NO VALUES ENTERED"
        );
        assert_eq!(
            Cell::aggregate(Aggregate::Value(Decimal::new(8333, 2))).display(),
            "83.33%"
        );
        assert_eq!(Cell::integer(42).display(), "42");
    }

    #[test]
    fn empty_tables_are_not_added() {
        let mut sheet = Sheet::new("Summary");
        sheet.push_table(Table::new(&[("Unit", 20.0)]));
        assert!(sheet.blocks.is_empty());
        let mut table = Table::new(&[("Unit", 20.0), ("Projects", 10.0)]);
        table.push(vec![Cell::text("Parks"), Cell::integer(2)]);
        sheet.push_table(table);
        assert_eq!(sheet.blocks.len(), 1);
        assert_eq!(sheet.widest_table().map(Table::column_count), Some(2));
    }

    #[test]
    fn footer_carries_generation_time() {
        let report = ReportDocument {
            title: "Units".into(),
            generated_at: Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 0).unwrap(),
            sheets: Vec::new(),
        };
        assert_eq!(
            report.footer(),
            "Automatically generated document - 07/03/2025 14:05"
        );
    }
}

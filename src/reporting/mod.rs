//! Report generation: snapshot assembly, grid layout and the spreadsheet /
//! document emitters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod builders;
pub mod document;
pub mod layout;
pub mod pdf;
pub mod snapshot;
pub mod xlsx;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("spreadsheet generation failed: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
    #[error("document generation failed: {0}")]
    Document(#[from] lopdf::Error),
    #[error("document content could not be encoded: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// Finished download: bytes plus the name and media type to send them with.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub filename: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Replaces whitespace runs with `_` and drops characters that break a
/// `Content-Disposition` header.
pub fn filename_component(value: &str) -> String {
    value
        .split_whitespace()
        .map(|part| {
            part.chars()
                .filter(|ch| !matches!(ch, '"' | '/' | '\\' | ':' | '*' | '?' | '<' | '>' | '|'))
                .collect::<String>()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn tracking_filename(unit_name: &str, year: i32) -> String {
    format!("POA_{}_{year}.xlsx", filename_component(unit_name))
}

pub fn project_detail_filename(
    unit_name: &str,
    year: i32,
    generated_at: DateTime<Utc>,
    format: ExportFormat,
) -> String {
    format!(
        "POA_Detail_{}_{year}_{}.{}",
        filename_component(unit_name),
        generated_at.format("%Y%m%d"),
        format.extension()
    )
}

pub fn units_filename(generated_at: DateTime<Utc>, format: ExportFormat) -> String {
    format!(
        "Units_Report_{}.{}",
        generated_at.format("%Y%m%d_%H%M"),
        format.extension()
    )
}

pub fn quarterly_filename(generated_at: DateTime<Utc>, format: ExportFormat) -> String {
    format!(
        "Quarterly_Report_{}.{}",
        generated_at.format("%Y%m%d_%H%M"),
        format.extension()
    )
}

pub fn consolidated_filename(generated_at: DateTime<Utc>, format: ExportFormat) -> String {
    format!(
        "POA_Consolidated_{}.{}",
        generated_at.format("%Y%m%d"),
        format.extension()
    )
}

pub fn audit_log_filename(generated_at: DateTime<Utc>, format: ExportFormat) -> String {
    format!(
        "Audit_Log_{}.{}",
        generated_at.format("%Y%m%d_%H%M"),
        format.extension()
    )
}

pub fn users_filename(generated_at: DateTime<Utc>, format: ExportFormat) -> String {
    format!(
        "Users_Report_{}.{}",
        generated_at.format("%Y%m%d_%H%M"),
        format.extension()
    )
}

pub fn statistics_filename(generated_at: DateTime<Utc>, format: ExportFormat) -> String {
    format!(
        "Statistics_Report_{}.{}",
        generated_at.format("%Y%m%d_%H%M"),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filenames_embed_unit_and_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 0).unwrap();
        assert_eq!(
            tracking_filename("Public  Works Dept", 2025),
            "POA_Public_Works_Dept_2025.xlsx"
        );
        assert_eq!(
            project_detail_filename("Parks", 2025, at, ExportFormat::Pdf),
            "POA_Detail_Parks_2025_20250307.pdf"
        );
        assert_eq!(
            units_filename(at, ExportFormat::Xlsx),
            "Units_Report_20250307_1405.xlsx"
        );
        assert_eq!(
            quarterly_filename(at, ExportFormat::Pdf),
            "Quarterly_Report_20250307_1405.pdf"
        );
        assert_eq!(
            consolidated_filename(at, ExportFormat::Xlsx),
            "POA_Consolidated_20250307.xlsx"
        );
        assert_eq!(
            audit_log_filename(at, ExportFormat::Pdf),
            "Audit_Log_20250307_1405.pdf"
        );
        assert_eq!(
            users_filename(at, ExportFormat::Xlsx),
            "Users_Report_20250307_1405.xlsx"
        );
        assert_eq!(
            statistics_filename(at, ExportFormat::Pdf),
            "Statistics_Report_20250307_1405.pdf"
        );
    }

    #[test]
    fn filename_component_strips_header_breaking_characters() {
        assert_eq!(filename_component("Health / \"Care\""), "Health_Care");
    }
}

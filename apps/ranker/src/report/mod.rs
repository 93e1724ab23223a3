//! Report Builder: turns a scoring outcome into a downloadable artifact.
//!
//! Column layout is fixed: `Candidate Name`, one column per criterion in request
//! order, `Total Score`. Everything is built in memory and returned as the response
//! body; nothing touches the filesystem.
//!
//! Every format also gets the per-file status list and the non-model cells as JSON
//! response headers, so a CSV consumer can tell a defaulted 0 from a scored 0.

use std::fmt;
use std::str::FromStr;

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderName;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::errors::AppError;
use crate::ranking::criteria::Criterion;
use crate::ranking::scoring::{FileStatus, ScoreOrigin, ScoringOutcome};

mod csv;
mod xlsx;

pub const NAME_COLUMN: &str = "Candidate Name";
pub const TOTAL_COLUMN: &str = "Total Score";

const FAILED_FILES_HEADER: HeaderName = HeaderName::from_static("x-ranker-failed-files");
const DEGRADED_ROWS_HEADER: HeaderName = HeaderName::from_static("x-ranker-degraded-rows");
const FILE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-ranker-file-status");
const FLAGGED_CELLS_HEADER: HeaderName = HeaderName::from_static("x-ranker-flagged-cells");

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("Spreadsheet write failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON write failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error while building report: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Csv,
    Xlsx,
    Json,
}

impl ReportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Csv => "text/csv; charset=utf-8",
            ReportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ReportFormat::Json => "application/json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Xlsx => "xlsx",
            ReportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "xlsx" | "excel" => Ok(ReportFormat::Xlsx),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!(
                "unknown report format '{other}' (expected csv, xlsx or json)"
            )),
        }
    }
}

/// A score cell whose value did not come straight from the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedCell {
    /// 1-based data row in the report, header excluded.
    pub row: usize,
    pub file_name: String,
    pub criterion: String,
    pub value: u8,
    pub origin: ScoreOrigin,
}

/// A finished artifact plus the status details surfaced as response headers.
#[derive(Debug)]
pub struct Report {
    pub format: ReportFormat,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub failed_files: usize,
    pub degraded_rows: usize,
    pub files: Vec<FileStatus>,
    pub flagged_cells: Vec<FlaggedCell>,
}

impl IntoResponse for Report {
    fn into_response(self) -> Response {
        let file_status = match ascii_json(&self.files) {
            Ok(value) => value,
            Err(e) => return AppError::from(e).into_response(),
        };
        let flagged_cells = match ascii_json(&self.flagged_cells) {
            Ok(value) => value,
            Err(e) => return AppError::from(e).into_response(),
        };

        (
            [
                (CONTENT_TYPE, self.format.content_type().to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", self.file_name),
                ),
                (FAILED_FILES_HEADER, self.failed_files.to_string()),
                (DEGRADED_ROWS_HEADER, self.degraded_rows.to_string()),
                (FILE_STATUS_HEADER, file_status),
                (FLAGGED_CELLS_HEADER, flagged_cells),
            ],
            self.bytes,
        )
            .into_response()
    }
}

/// Compact JSON with every character outside visible ASCII written as a `\uXXXX`
/// escape, so the result is always a valid header value.
fn ascii_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ReportError> {
    let raw = serde_json::to_string(value)?;
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == ' ' || c.is_ascii_graphic() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    Ok(out)
}

/// Every non-`Model` cell, in row then column order.
pub fn flagged_cells(criteria: &[Criterion], outcome: &ScoringOutcome) -> Vec<FlaggedCell> {
    outcome
        .rows
        .iter()
        .enumerate()
        .flat_map(|(index, row)| {
            row.cells
                .iter()
                .zip(criteria)
                .filter(|(cell, _)| cell.origin != ScoreOrigin::Model)
                .map(move |(cell, criterion)| FlaggedCell {
                    row: index + 1,
                    file_name: row.file_name.clone(),
                    criterion: criterion.as_str().to_string(),
                    value: cell.value,
                    origin: cell.origin,
                })
        })
        .collect()
}

pub fn build_report(
    criteria: &[Criterion],
    outcome: &ScoringOutcome,
    format: ReportFormat,
    generated_at: DateTime<Utc>,
) -> Result<Report, ReportError> {
    let bytes = match format {
        ReportFormat::Csv => csv::write(criteria, outcome)?,
        ReportFormat::Xlsx => xlsx::write(criteria, outcome)?,
        ReportFormat::Json => write_json(criteria, outcome)?,
    };

    Ok(Report {
        format,
        file_name: format!(
            "scores-{}.{}",
            generated_at.format("%Y%m%dT%H%M%SZ"),
            format.extension()
        ),
        bytes,
        failed_files: outcome.failed_files(),
        degraded_rows: outcome.degraded_rows(),
        files: outcome.files.clone(),
        flagged_cells: flagged_cells(criteria, outcome),
    })
}

/// Header row with each criterion passed through `clean`.
fn header_row(criteria: &[Criterion], clean: fn(&str) -> String) -> Vec<String> {
    std::iter::once(NAME_COLUMN.to_string())
        .chain(criteria.iter().map(|c| clean(c.as_str())))
        .chain(std::iter::once(TOTAL_COLUMN.to_string()))
        .collect()
}

/// Control characters become spaces and surrounding whitespace is trimmed.
pub fn clean_text(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Neutralises text for CSV cells, which a spreadsheet may evaluate: `clean_text`
/// plus a `'` before a leading formula trigger (`=`, `+`, `-`, `@`).
pub fn sanitize_cell(value: &str) -> String {
    let cleaned = clean_text(value);
    if cleaned.starts_with(['=', '+', '-', '@']) {
        format!("'{cleaned}")
    } else {
        cleaned
    }
}

fn write_json(criteria: &[Criterion], outcome: &ScoringOutcome) -> Result<Vec<u8>, ReportError> {
    let columns: Vec<&str> = std::iter::once(NAME_COLUMN)
        .chain(criteria.iter().map(Criterion::as_str))
        .chain(std::iter::once(TOTAL_COLUMN))
        .collect();

    let rows: Vec<_> = outcome
        .rows
        .iter()
        .map(|row| {
            json!({
                "candidate_name": row.candidate_name,
                "file_name": row.file_name,
                "scores": row.cells,
                "total": row.total,
                "degraded": row.degraded(),
            })
        })
        .collect();

    let body = json!({
        "columns": columns,
        "rows": rows,
        "files": outcome.files,
    });

    Ok(serde_json::to_vec_pretty(&body)?)
}

use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};

use super::{clean_text, header_row, ReportError};
use crate::ranking::criteria::Criterion;
use crate::ranking::scoring::{FileOutcome, ScoreOrigin, ScoringOutcome};

const SCORES_SHEET: &str = "Scores";
const STATUS_SHEET: &str = "File Status";
const FLAGGED_FILL: u32 = 0xFFEB9C;

/// Workbook with a `Scores` sheet and a `File Status` sheet.
///
/// Text goes through `write_string`, which never creates a formula, so cells only
/// lose control characters and keep a leading `=` as typed.
pub(super) fn write(criteria: &[Criterion], outcome: &ScoringOutcome) -> Result<Vec<u8>, ReportError> {
    let mut workbook = Workbook::new();

    write_scores(workbook.add_worksheet(), criteria, outcome)?;
    write_file_status(workbook.add_worksheet(), outcome)?;

    Ok(workbook.save_to_buffer()?)
}

fn write_scores(
    sheet: &mut Worksheet,
    criteria: &[Criterion],
    outcome: &ScoringOutcome,
) -> Result<(), XlsxError> {
    let bold = Format::new().set_bold();
    let flagged = Format::new().set_background_color(Color::RGB(FLAGGED_FILL));

    sheet.set_name(SCORES_SHEET)?;

    for (col, title) in header_row(criteria, clean_text).into_iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, title, &bold)?;
    }
    sheet.set_column_width(0, 28)?;
    sheet.set_freeze_panes(1, 0)?;

    for (i, row) in outcome.rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, clean_text(&row.candidate_name))?;

        for (j, cell) in row.cells.iter().enumerate() {
            let col = j as u16 + 1;
            if cell.origin == ScoreOrigin::Model {
                sheet.write_number(r, col, cell.value)?;
            } else {
                sheet.write_number_with_format(r, col, cell.value, &flagged)?;
            }
        }

        sheet.write_number(r, row.cells.len() as u16 + 1, row.total)?;
    }

    Ok(())
}

fn write_file_status(sheet: &mut Worksheet, outcome: &ScoringOutcome) -> Result<(), XlsxError> {
    let bold = Format::new().set_bold();

    sheet.set_name(STATUS_SHEET)?;
    for (col, title) in ["File", "Status", "Detail"].into_iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, title, &bold)?;
    }
    sheet.set_column_width(0, 32)?;
    sheet.set_column_width(2, 60)?;

    for (i, file) in outcome.files.iter().enumerate() {
        let r = i as u32 + 1;
        let (status, detail) = match &file.outcome {
            FileOutcome::Scored => ("scored", String::new()),
            FileOutcome::Degraded { defaulted, clamped } => (
                "degraded",
                format!("{defaulted} score(s) defaulted to 0, {clamped} clamped"),
            ),
            FileOutcome::ExtractionFailed { reason } => ("extraction failed", reason.clone()),
            FileOutcome::ScoringFailed { reason, .. } => ("scoring failed", reason.clone()),
        };

        sheet.write_string(r, 0, clean_text(&file.file_name))?;
        sheet.write_string(r, 1, status)?;
        sheet.write_string(r, 2, clean_text(&detail))?;
    }

    Ok(())
}

use ::csv::WriterBuilder;

use super::{header_row, sanitize_cell, ReportError};
use crate::ranking::criteria::Criterion;
use crate::ranking::scoring::ScoringOutcome;

/// RFC 4180 CSV with only the fixed columns. File status and non-model cells are
/// reported in the `X-Ranker-File-Status` and `X-Ranker-Flagged-Cells` headers.
pub(super) fn write(criteria: &[Criterion], outcome: &ScoringOutcome) -> Result<Vec<u8>, ReportError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(header_row(criteria, sanitize_cell))?;

    for row in &outcome.rows {
        let mut record = Vec::with_capacity(row.cells.len() + 2);
        record.push(sanitize_cell(&row.candidate_name));
        record.extend(row.cells.iter().map(|c| c.value.to_string()));
        record.push(row.total.to_string());
        writer.write_record(&record)?;
    }

    writer.into_inner().map_err(|e| ReportError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_outcome;

    fn read_back(bytes: &[u8]) -> Vec<Vec<String>> {
        ::csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes)
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_columns_and_totals() {
        let (criteria, outcome) = sample_outcome();
        let records = read_back(&write(&criteria, &outcome).unwrap());

        assert_eq!(
            records[0],
            vec![
                "Candidate Name",
                "5+ years Python experience",
                "AWS Certification",
                "Total Score"
            ]
        );
        assert_eq!(records[1], vec!["Doe, Jane", "4", "5", "9"]);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_comma_in_name_keeps_alignment() {
        let (criteria, outcome) = sample_outcome();
        let bytes = write(&criteria, &outcome).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();

        assert!(text.contains("\"Doe, Jane\",4,5,9"));
        assert!(read_back(&bytes).iter().all(|r| r.len() == 4));
    }

    #[test]
    fn test_formula_name_is_neutralised() {
        let (criteria, outcome) = sample_outcome();
        let records = read_back(&write(&criteria, &outcome).unwrap());
        assert_eq!(records[2][0], "'=HYPERLINK(\"http://x\")");
        assert_eq!(records[2][3], "2");
    }
}

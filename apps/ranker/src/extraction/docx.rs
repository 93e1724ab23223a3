use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild, TableCellContent, TableChild, TableRowChild};

use super::{ExtractedText, ExtractionError};

/// Concatenates paragraph text in document order, one paragraph per line.
/// Paragraphs inside tables are emitted row by row.
pub(super) fn extract(bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| ExtractionError::Corrupt(format!("failed to parse DOCX: {e}")))?;

    let mut lines: Vec<String> = Vec::new();

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => lines.push(paragraph_text(p)),
            DocumentChild::Table(t) => {
                for row in &t.rows {
                    let TableChild::TableRow(r) = row;
                    for cell in &r.cells {
                        let TableRowChild::TableCell(c) = cell;
                        for content in &c.children {
                            if let TableCellContent::Paragraph(p) = content {
                                lines.push(paragraph_text(p));
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(ExtractedText {
        text: lines.join("\n"),
        skipped_pages: 0,
    })
}

fn paragraph_text(p: &Paragraph) -> String {
    let mut text = String::new();

    for child in &p.children {
        match child {
            ParagraphChild::Run(r) => push_run_children(&mut text, &r.children),
            ParagraphChild::Hyperlink(h) => {
                for child in &h.children {
                    if let ParagraphChild::Run(r) = child {
                        push_run_children(&mut text, &r.children);
                    }
                }
            }
            _ => {}
        }
    }

    text
}

fn push_run_children(text: &mut String, children: &[RunChild]) {
    for run_child in children {
        match run_child {
            RunChild::Text(t) => text.push_str(&t.text),
            RunChild::Tab(_) => text.push('\t'),
            RunChild::Break(_) => text.push('\n'),
            _ => {}
        }
    }
}

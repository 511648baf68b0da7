//! Plain-text extraction from uploaded documents

use crate::error::{GenerationError, Result};
use std::path::Path;

/// Document kinds text can be pulled out of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Pdf,
    Word,
}

impl DocumentKind {
    /// Detect the kind from a file name's extension
    pub fn from_name(name: &str) -> Result<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("txt") | Some("md") => Ok(DocumentKind::PlainText),
            Some("pdf") => Ok(DocumentKind::Pdf),
            Some("docx") => Ok(DocumentKind::Word),
            _ => Err(GenerationError::UnsupportedFileFormat(name.to_string())),
        }
    }
}

/// Turns an uploaded file into plain text.
///
/// Implementations are synchronous; callers move them onto the blocking pool.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<String>;
}

/// Extractor for `.txt`/`.md`, `.pdf` and `.docx` files
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<String> {
        match DocumentKind::from_name(name)? {
            DocumentKind::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
            DocumentKind::Pdf => extract_pdf(name, bytes),
            DocumentKind::Word => extract_docx(name, bytes),
        }
    }
}

fn extraction_failed(name: &str, err: impl std::fmt::Display) -> GenerationError {
    GenerationError::ExtractionFailed {
        file: name.to_string(),
        message: err.to_string(),
    }
}

fn extract_pdf(name: &str, bytes: &[u8]) -> Result<String> {
    let document = lopdf::Document::load_mem(bytes).map_err(|e| extraction_failed(name, e))?;

    let mut pages = Vec::new();
    for (page_num, _) in document.get_pages() {
        match document.extract_text(&[page_num]) {
            Ok(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    pages.push(trimmed.to_string());
                }
            }
            Err(err) => {
                tracing::debug!(file = name, page = page_num, error = %err, "skipping unreadable PDF page");
            }
        }
    }
    Ok(pages.join("\n"))
}

fn extract_docx(name: &str, bytes: &[u8]) -> Result<String> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| extraction_failed(name, e))?;

    let mut lines = Vec::new();
    for child in &docx.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(paragraph) => {
                let text = paragraph_text(paragraph);
                if !text.trim().is_empty() {
                    lines.push(text);
                }
            }
            docx_rs::DocumentChild::Table(table) => table_lines(table, &mut lines),
            _ => {}
        }
    }
    Ok(lines.join("\n"))
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut buffer = String::new();
    for child in &paragraph.children {
        push_paragraph_child(child, &mut buffer);
    }
    buffer
}

fn push_paragraph_child(child: &docx_rs::ParagraphChild, buffer: &mut String) {
    match child {
        docx_rs::ParagraphChild::Run(run) => push_run(run, buffer),
        docx_rs::ParagraphChild::Hyperlink(link) => {
            for link_child in &link.children {
                push_paragraph_child(link_child, buffer);
            }
        }
        docx_rs::ParagraphChild::Insert(insert) => {
            for insert_child in &insert.children {
                if let docx_rs::InsertChild::Run(run) = insert_child {
                    push_run(run, buffer);
                }
            }
        }
        _ => {}
    }
}

fn push_run(run: &docx_rs::Run, buffer: &mut String) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(text) => buffer.push_str(&text.text),
            docx_rs::RunChild::Tab(_) => buffer.push('\t'),
            docx_rs::RunChild::Break(_) => buffer.push('\n'),
            _ => {}
        }
    }
}

/// One line per table row, cells separated by ` | `
fn table_lines(table: &docx_rs::Table, lines: &mut Vec<String>) {
    for row in &table.rows {
        let docx_rs::TableChild::TableRow(row) = row;
        let mut cells = Vec::new();
        for cell in &row.cells {
            let docx_rs::TableRowChild::TableCell(cell) = cell;
            let text = cell_text(cell);
            if !text.trim().is_empty() {
                cells.push(text);
            }
        }
        if !cells.is_empty() {
            lines.push(cells.join(" | "));
        }
    }
}

fn cell_text(cell: &docx_rs::TableCell) -> String {
    let mut parts = Vec::new();
    for content in &cell.children {
        match content {
            docx_rs::TableCellContent::Paragraph(paragraph) => {
                let text = paragraph_text(paragraph);
                if !text.trim().is_empty() {
                    parts.push(text);
                }
            }
            docx_rs::TableCellContent::Table(nested) => {
                let mut nested_lines = Vec::new();
                table_lines(nested, &mut nested_lines);
                if !nested_lines.is_empty() {
                    parts.push(nested_lines.join(" "));
                }
            }
            _ => {}
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = docx_rs::Docx::new();
        for text in paragraphs {
            docx = docx.add_paragraph(
                docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text(*text)),
            );
        }
        let mut cursor = std::io::Cursor::new(Vec::new());
        docx.build().pack(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_kind_detection() {
        assert_eq!(DocumentKind::from_name("notes.TXT").unwrap(), DocumentKind::PlainText);
        assert_eq!(DocumentKind::from_name("README.md").unwrap(), DocumentKind::PlainText);
        assert_eq!(DocumentKind::from_name("spec.pdf").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_name("brief.docx").unwrap(), DocumentKind::Word);
        assert!(matches!(
            DocumentKind::from_name("sheet.xlsx"),
            Err(GenerationError::UnsupportedFileFormat(name)) if name == "sheet.xlsx"
        ));
        assert!(DocumentKind::from_name("Makefile").is_err());
    }

    #[test]
    fn test_plain_text_is_lossy_utf8() {
        let text = DocumentExtractor
            .extract("req.txt", b"Users can log in\n\xFF")
            .unwrap();
        assert!(text.starts_with("Users can log in\n"));
    }

    #[test]
    fn test_docx_paragraphs() {
        let bytes = docx_bytes(&["Checkout flow", "", "Supports coupons"]);
        let text = DocumentExtractor.extract("brief.docx", &bytes).unwrap();
        assert_eq!(text, "Checkout flow\nSupports coupons");
    }

    #[test]
    fn test_garbage_pdf_fails_extraction() {
        let err = DocumentExtractor
            .extract("broken.pdf", b"definitely not a pdf")
            .unwrap_err();
        assert!(matches!(err, GenerationError::ExtractionFailed { ref file, .. } if file == "broken.pdf"));
    }

    #[test]
    fn test_garbage_docx_fails_extraction() {
        let err = DocumentExtractor.extract("broken.docx", b"PK nope").unwrap_err();
        assert!(matches!(err, GenerationError::ExtractionFailed { .. }));
    }
}

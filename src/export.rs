//! Export of selected test cases

use crate::model::TestCase;
use crate::store::Store;
use anyhow::Context;
use thiserror::Error;

const CSV_HEADERS: [&str; 9] = [
    "ID",
    "Title",
    "Description",
    "Preconditions",
    "Steps",
    "Expected Result",
    "Priority",
    "Category",
    "Created At",
];
const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No test cases selected for export")]
    NothingSelected,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "test_cases.json",
            ExportFormat::Csv => "test_cases.csv",
        }
    }
}

/// Render every selected test case in `format`, oldest first
pub fn export_selected(store: &Store, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    let mut selected = store.find::<TestCase>(|c| c.is_selected)?;
    if selected.is_empty() {
        return Err(ExportError::NothingSelected);
    }
    selected.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let bytes = match format {
        ExportFormat::Json => to_json(&selected)?,
        ExportFormat::Csv => to_csv(&selected)?,
    };
    tracing::info!(count = selected.len(), format = ?format, "exported test cases");
    Ok(bytes)
}

pub fn to_json(cases: &[TestCase]) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec_pretty(cases).context("Failed to serialize test cases")
}

/// One row per case; steps share a cell, one per line
pub fn to_csv(cases: &[TestCase]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for case in cases {
        writer.write_record([
            case.id.to_string(),
            case.title.clone(),
            case.description.clone(),
            case.preconditions.clone(),
            case.steps.join("\n"),
            case.expected_result.clone(),
            case.priority.to_string(),
            case.category.clone(),
            case.created_at.format(CREATED_AT_FORMAT).to_string(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV export: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn case(title: &str, selected: bool) -> TestCase {
        let mut case = TestCase::new(
            title.to_string(),
            "Checks the flow".to_string(),
            "Account exists".to_string(),
            vec!["Open app".to_string(), "Tap \"Sign in\"".to_string()],
            "Home screen, greeting shown".to_string(),
        )
        .with_priority(Priority::High);
        case.is_selected = selected;
        case
    }

    #[test]
    fn test_nothing_selected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.insert(case("Unselected", false)).unwrap();

        let err = export_selected(&store, ExportFormat::Json).unwrap_err();
        assert!(matches!(err, ExportError::NothingSelected));
    }

    #[test]
    fn test_json_export_only_selected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store
            .insert_many(&[case("Picked", true), case("Skipped", false)])
            .unwrap();

        let bytes = export_selected(&store, ExportFormat::Json).unwrap();
        let exported: Vec<TestCase> = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].title, "Picked");
    }

    #[test]
    fn test_csv_layout() {
        let mut login = case("Login", true);
        login.created_at = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();

        let bytes = to_csv(&[login.clone()]).unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), CSV_HEADERS.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(&row[0], login.id.to_string());
        assert_eq!(&row[4], "Open app\nTap \"Sign in\"");
        assert_eq!(&row[5], "Home screen, greeting shown");
        assert_eq!(&row[6], "High");
        assert_eq!(&row[7], "Functional");
        assert_eq!(&row[8], "2024-03-01 09:30:00");
    }
}

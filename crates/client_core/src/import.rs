//! Bulk book import from CSV and spreadsheet files.
//!
//! The first row is a header. Columns are matched by name against a small set
//! of synonyms, so sheets exported in Uzbek or English both work.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use shared::domain::BookDraft;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    controller::BookListController,
    error::ClientError,
    view::{ErrorContext, FetchTrigger},
};

const NAME_HEADERS: &[&str] = &["name", "nomi", "title", "kitob nomi", "kitob", "book"];
const AUTHOR_HEADERS: &[&str] = &["author", "muallif", "writer"];
const PUBLISHER_HEADERS: &[&str] = &["publisher", "nashriyot", "nashriyoti"];
const QUANTITY_HEADERS: &[&str] = &["quantity_in_library", "quantity", "soni", "count", "miqdori"];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read {path}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("unsupported file type `{0}` (expected csv, xlsx, xls or ods)")]
    UnsupportedFormat(String),
    #[error("the file has no header row")]
    Empty,
    #[error("no {0} column found in the header row")]
    MissingColumn(&'static str),
    #[error("row {row} was rejected: {source}")]
    Row {
        row: usize,
        #[source]
        source: ClientError,
    },
    #[error("rows were submitted but the list could not be reloaded: {0}")]
    Refresh(#[source] ClientError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    /// 1-based data row; the header is not counted.
    pub row: usize,
    pub draft: BookDraft,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSheet {
    pub rows: Vec<ImportRow>,
    pub skipped: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub submitted: usize,
    pub skipped: Vec<usize>,
}

#[derive(Debug, Default)]
struct Columns {
    name: Option<usize>,
    author: Option<usize>,
    publisher: Option<usize>,
    quantity: Option<usize>,
}

impl Columns {
    fn from_header(header: &[String]) -> Self {
        let mut columns = Self::default();
        for (index, label) in header.iter().enumerate() {
            let label = label.trim().to_lowercase();
            let slot = if NAME_HEADERS.contains(&label.as_str()) {
                &mut columns.name
            } else if AUTHOR_HEADERS.contains(&label.as_str()) {
                &mut columns.author
            } else if PUBLISHER_HEADERS.contains(&label.as_str()) {
                &mut columns.publisher
            } else if QUANTITY_HEADERS.contains(&label.as_str()) {
                &mut columns.quantity
            } else {
                continue;
            };
            if slot.is_none() {
                *slot = Some(index);
            }
        }
        columns
    }
}

fn cell(row: &[String], index: Option<usize>) -> Option<&str> {
    index
        .and_then(|index| row.get(index))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Accepts integers and integral floats such as `3.0`.
pub fn parse_quantity(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(quantity) = raw.parse::<u32>() {
        return Some(quantity);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value) {
        Some(value as u32)
    } else {
        None
    }
}

/// Splits a table into importable drafts and skipped row numbers.
pub fn parse_rows(table: Vec<Vec<String>>) -> Result<ParsedSheet, ImportError> {
    let mut rows = table.into_iter();
    let header = rows.next().ok_or(ImportError::Empty)?;
    let columns = Columns::from_header(&header);
    if columns.name.is_none() {
        return Err(ImportError::MissingColumn("name"));
    }
    if columns.author.is_none() {
        return Err(ImportError::MissingColumn("author"));
    }

    let mut sheet = ParsedSheet::default();
    for (offset, row) in rows.enumerate() {
        let number = offset + 1;
        let (Some(name), Some(author)) = (cell(&row, columns.name), cell(&row, columns.author))
        else {
            sheet.skipped.push(number);
            continue;
        };
        let mut draft = BookDraft::new(name, author);
        if let Some(publisher) = cell(&row, columns.publisher) {
            draft = draft.with_publisher(publisher);
        }
        if let Some(quantity) = cell(&row, columns.quantity).and_then(parse_quantity) {
            draft = draft.with_quantity(quantity);
        }
        sheet.rows.push(ImportRow { row: number, draft });
    }
    Ok(sheet)
}

fn read_error(path: &Path, reason: impl ToString) -> ImportError {
    ImportError::Read {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn read_csv(path: &Path) -> Result<Vec<Vec<String>>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|err| read_error(path, err))?;
    reader
        .records()
        .map(|record| {
            record
                .map(|record| record.iter().map(str::to_string).collect())
                .map_err(|err| read_error(path, err))
        })
        .collect()
}

fn cell_text(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Float(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
            format!("{}", *number as i64)
        }
        other => other.to_string(),
    }
}

fn read_workbook(path: &Path) -> Result<Vec<Vec<String>>, ImportError> {
    let mut workbook = open_workbook_auto(path).map_err(|err| read_error(path, err))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::Empty)?
        .map_err(|err| read_error(path, err))?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

/// Reads the first sheet of a workbook or a CSV file as rows of text cells.
pub fn read_table(path: &Path) -> Result<Vec<Vec<String>>, ImportError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => read_csv(path),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path),
        _ => Err(ImportError::UnsupportedFormat(extension)),
    }
}

/// Submits every complete row in order, then reloads the list once.
///
/// Stops at the first rejected row. Rows already submitted stay on the server.
pub async fn import_books(
    controller: &mut BookListController,
    path: &Path,
) -> Result<ImportReport, ImportError> {
    let sheet = parse_rows(read_table(path)?)?;
    for row in &sheet.skipped {
        warn!(row, "import: row skipped, name or author missing");
    }

    let mut submitted = 0;
    for ImportRow { row, draft } in &sheet.rows {
        if let Err(source) = controller.submit(draft).await {
            warn!(row, submitted, "import aborted: {source}");
            if submitted > 0 && !source.requires_reauth() {
                if let Err(err) = controller.refresh(FetchTrigger::PostMutation).await {
                    warn!("import: reload after abort failed: {err}");
                }
            }
            controller.show_error(ErrorContext::Import, &source);
            return Err(ImportError::Row { row: *row, source });
        }
        submitted += 1;
    }

    if submitted > 0 {
        controller
            .refresh(FetchTrigger::PostMutation)
            .await
            .map_err(ImportError::Refresh)?;
    }
    info!(
        path = %path.display(),
        submitted,
        skipped = sheet.skipped.len(),
        "import finished"
    );
    Ok(ImportReport {
        submitted,
        skipped: sheet.skipped,
    })
}

#[cfg(test)]
#[path = "tests/import_tests.rs"]
mod tests;

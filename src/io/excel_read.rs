use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use chrono::{Days, NaiveDate};
use tracing::{debug, warn};

use crate::error::Result;

/// String date layouts accepted by [`parse_date_str`], tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%Y%m%d",
    "%m/%d/%Y",
];

/// One worksheet pulled into memory: a header row plus data rows.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<DataType>>,
}

impl Sheet {
    /// Index of the first candidate column present in this sheet.
    pub fn column_index(&self, candidates: &[String]) -> Option<usize> {
        candidates
            .iter()
            .find_map(|candidate| self.headers.iter().position(|header| header == candidate))
    }

    /// Cell for the first candidate column carrying a non-empty value in the
    /// given row.
    pub fn value<'a>(&self, row: &'a [DataType], candidates: &[String]) -> Option<&'a DataType> {
        for candidate in candidates {
            let Some(index) = self.headers.iter().position(|header| header == candidate) else {
                continue;
            };
            match row.get(index) {
                Some(DataType::Empty) | None => continue,
                Some(cell) => {
                    if cell_to_string(Some(cell)).is_empty() {
                        continue;
                    }
                    return Some(cell);
                }
            }
        }
        None
    }

    /// String form of [`Sheet::value`], `None` when blank.
    pub fn text(&self, row: &[DataType], candidates: &[String]) -> Option<String> {
        self.value(row, candidates)
            .map(|cell| cell_to_string(Some(cell)))
            .filter(|text| !text.is_empty())
    }
}

/// Reads every worksheet of the workbook into memory. Sheets that fail to
/// load are skipped with a warning so a single corrupt sheet does not abort
/// the run.
pub fn read_workbook(path: &Path) -> Result<Vec<Sheet>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names = workbook.sheet_names().to_vec();

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let Some(range_result) = workbook.worksheet_range(&name) else {
            warn!(sheet = %name, "worksheet range unavailable, skipping");
            continue;
        };
        let range = match range_result {
            Ok(range) => range,
            Err(error) => {
                warn!(sheet = %name, %error, "failed to load sheet, skipping");
                continue;
            }
        };

        let mut row_iter = range.rows();
        let headers: Vec<String> = match row_iter.next() {
            Some(first_row) => first_row
                .iter()
                .map(|cell| cell_to_string(Some(cell)))
                .collect(),
            None => Vec::new(),
        };
        let rows: Vec<Vec<DataType>> = row_iter.map(|row| row.to_vec()).collect();

        debug!(sheet = %name, rows = rows.len(), "loaded sheet");
        sheets.push(Sheet {
            name,
            headers,
            rows,
        });
    }

    Ok(sheets)
}

/// Renders a cell as trimmed text; empty cells become the empty string.
pub fn cell_to_string(cell: Option<&DataType>) -> String {
    let raw = match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => {
            // Integer-valued floats render without the trailing ".0" the
            // export system leaves behind, so coded columns compare cleanly.
            if value.fract() == 0.0 && value.abs() < 1e15 {
                format!("{}", *value as i64)
            } else {
                value.to_string()
            }
        }
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    };
    raw.trim().to_string()
}

/// Parses a cell as a calendar date: serial numbers use the 1900 epoch,
/// strings fall back through [`DATE_FORMATS`].
pub fn cell_to_date(cell: Option<&DataType>) -> Option<NaiveDate> {
    match cell {
        Some(DataType::DateTime(serial)) => excel_serial_to_date(*serial),
        Some(DataType::Float(value)) => excel_serial_to_date(*value),
        Some(DataType::Int(value)) => excel_serial_to_date(*value as f64),
        Some(DataType::String(value)) => parse_date_str(value),
        Some(DataType::Empty) | None => None,
        Some(other) => parse_date_str(&other.to_string()),
    }
}

/// Converts an Excel 1900-epoch serial number to a date. The 1899-12-30 base
/// absorbs Excel's phantom 1900 leap day.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > 200_000.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial as u64))
}

/// Parses a date string through the known layouts, tolerating a trailing
/// time component.
pub fn parse_date_str(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    // ISO datetimes ("2021-06-15 00:00:00" or with a 'T'): keep the date part.
    if let Some((date_part, _)) = trimmed.split_once(['T', ' ']) {
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
                return Some(date);
            }
        }
    }

    None
}

//! Tabular view of a spreadsheet and its `.xlsx` encoding.
//!
//! Reading goes through `calamine`, writing through `rust_xlsxwriter`. Only the
//! first worksheet is used; its first row holds the column names.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use calamine::{Data, Reader, Xlsx, XlsxError, open_workbook};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};

use crate::error::{DriveError, Result};

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    /// Excel serial date-time.
    DateTime(f64),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            // rust_xlsxwriter writes "" as a blank cell, so read it as one
            Data::String(s) if s.is_empty() => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Text(e.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) | CellValue::DateTime(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            CellValue::Text(s) => f.write_str(s),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

/// Rows of a worksheet, each addressable by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Unique column names, in sheet order.
    pub columns: Vec<String>,
    /// Data rows, each with one value per column.
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Table { columns, rows }
    }

    /// Position of `column` in the header, if present.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Value at `row` (0-based, header excluded) under `column`.
    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)
    }

    /// Replace the value at `row` under `column`.
    ///
    /// # Returns
    ///
    /// The previous value, or `None` (and no change) if the row or column does
    /// not exist.
    pub fn set(&mut self, row: usize, column: &str, value: CellValue) -> Option<CellValue> {
        let col = self.column_index(column)?;
        let cell = self.rows.get_mut(row)?.get_mut(col)?;
        Some(std::mem::replace(cell, value))
    }

    /// Row `row` as a column name to value mapping.
    pub fn record(&self, row: usize) -> Option<BTreeMap<&str, &CellValue>> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(values.iter())
                .collect(),
        )
    }

    /// Check that an edited table still has `original`'s columns and that
    /// every row carries one value per column.
    pub fn check_shape(&self, original: &Table) -> Result<()> {
        if self.columns != original.columns {
            return Err(DriveError::Shape(format!(
                "expected columns {:?}, got {:?}",
                original.columns, self.columns
            )));
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(DriveError::Shape(format!(
                    "row {} has {} values for {} columns",
                    i,
                    row.len(),
                    self.columns.len()
                )));
            }
        }
        Ok(())
    }

    /// Parse the first worksheet of the `.xlsx` file at `path`.
    pub fn read_xlsx(path: impl AsRef<Path>) -> Result<Table> {
        let workbook: Xlsx<BufReader<File>> =
            open_workbook(path.as_ref()).map_err(|e: XlsxError| DriveError::Parse(e.to_string()))?;
        from_workbook(workbook)
    }

    pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Table> {
        let workbook =
            Xlsx::new(Cursor::new(bytes)).map_err(|e| DriveError::Parse(e.to_string()))?;
        from_workbook(workbook)
    }

    /// Encode as a single-sheet `.xlsx`: header row, then data rows.
    pub fn to_xlsx(&self) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);
        let worksheet = workbook.add_worksheet();

        for (c, name) in self.columns.iter().enumerate() {
            worksheet
                .write_string(0, c as u16, name.as_str())
                .map_err(write_error)?;
        }

        for (r, row) in self.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (c, value) in row.iter().enumerate() {
                let c = c as u16;
                let written = match value {
                    CellValue::Empty => continue,
                    CellValue::Number(n) => worksheet.write_number(r, c, *n),
                    CellValue::Text(s) => worksheet.write_string(r, c, s.as_str()),
                    CellValue::Bool(b) => worksheet.write_boolean(r, c, *b),
                    CellValue::DateTime(n) => {
                        worksheet.write_number_with_format(r, c, *n, &datetime_format)
                    }
                };
                written.map_err(write_error)?;
            }
        }

        workbook.save_to_buffer().map_err(write_error)
    }
}

fn write_error(e: rust_xlsxwriter::XlsxError) -> DriveError {
    DriveError::Io(std::io::Error::other(e))
}

fn from_workbook<RS: Read + Seek>(mut workbook: Xlsx<RS>) -> Result<Table> {
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| DriveError::Parse("workbook has no worksheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| DriveError::Parse(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };

    let columns = column_names(header);
    let width = columns.len();
    let mut data: Vec<Vec<CellValue>> = rows
        .map(|row| {
            let mut values: Vec<CellValue> = row.iter().map(CellValue::from_data).collect();
            values.resize(width, CellValue::Empty);
            values
        })
        .collect();

    // Trailing blank rows are not written back, so don't read them either.
    while data
        .last()
        .is_some_and(|row| row.iter().all(CellValue::is_empty))
    {
        data.pop();
    }

    Ok(Table::new(columns, data))
}

/// Header cells as column names. Blank names become `Unnamed: <i>` and
/// repeated names get `.1`, `.2`, ... suffixes.
fn column_names(header: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(header.len());

    for (i, cell) in header.iter().enumerate() {
        let text = CellValue::from_data(cell).to_string();
        let base = if text.is_empty() {
            format!("Unnamed: {i}")
        } else {
            text
        };

        let name = match seen.get(&base).copied() {
            Some(mut count) => {
                let mut candidate = base.clone();
                while seen.contains_key(&candidate) {
                    count += 1;
                    candidate = format!("{base}.{count}");
                }
                seen.insert(base, count);
                candidate
            }
            None => base,
        };
        seen.entry(name.clone()).or_insert(0);
        names.push(name);
    }

    names
}

#[cfg(test)]
#[path = "tests/workbook_tests.rs"]
mod tests;

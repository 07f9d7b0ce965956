//! Spreadsheet assembly.
//!
//! Records are first laid out as a plain table model (`Workbook` of named
//! `Sheet`s) and then encoded to xlsx with `rust_xlsxwriter`. A sheet is only
//! created for a non-empty record list.

use std::borrow::Cow;

use rust_xlsxwriter::Format;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::domain::{DescriptiveItem, McqItem};
use crate::error::AssemblyError;
use crate::util::truncate_chars;

pub const MCQ_SHEET: &str = "MCQ Questions";
pub const DESCRIPTIVE_SHEET: &str = "Descriptive Questions";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
/// xlsx cell text limit, in characters.
pub const MAX_CELL_CHARS: usize = 32_767;

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
  Text(String),
  Number(f64),
  Bool(bool),
  Empty,
}

impl From<&Value> for Cell {
  fn from(v: &Value) -> Self {
    match v {
      Value::Null => Cell::Empty,
      Value::Bool(b) => Cell::Bool(*b),
      Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or_else(|| Cell::Text(n.to_string())),
      Value::String(s) => Cell::Text(s.clone()),
      nested => Cell::Text(nested.to_string()),
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
  pub name: String,
  pub header: Vec<String>,
  pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
  /// Columns are the union of record keys in first-seen order.
  fn from_records(name: &str, records: &[Map<String, Value>]) -> Self {
    let mut header: Vec<String> = Vec::new();
    for rec in records {
      for key in rec.keys() {
        if !header.iter().any(|h| h == key) {
          header.push(key.clone());
        }
      }
    }
    let rows = records
      .iter()
      .map(|rec| header.iter().map(|h| rec.get(h).map(Cell::from).unwrap_or(Cell::Empty)).collect())
      .collect();
    Self { name: name.to_string(), header, rows }
  }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Workbook {
  pub sheets: Vec<Sheet>,
}

/// Lay out the records; empty record lists produce no sheet.
pub fn build_workbook(mcq: &[McqItem], descriptive: &[DescriptiveItem]) -> Workbook {
  let mut sheets = Vec::new();
  if !mcq.is_empty() {
    let records: Vec<Map<String, Value>> = mcq.iter().map(|m| m.fields().clone()).collect();
    sheets.push(Sheet::from_records(MCQ_SHEET, &records));
  }
  if !descriptive.is_empty() {
    sheets.push(Sheet::from_records(DESCRIPTIVE_SHEET, &as_records(descriptive)));
  }
  Workbook { sheets }
}

fn as_records<T: Serialize>(items: &[T]) -> Vec<Map<String, Value>> {
  items
    .iter()
    .filter_map(|it| match serde_json::to_value(it) {
      Ok(Value::Object(map)) => Some(map),
      _ => None,
    })
    .collect()
}

/// Encode the table model as an xlsx buffer. The format needs at least one sheet.
#[instrument(level = "debug", skip_all, fields(sheets = book.sheets.len()))]
pub fn encode_xlsx(book: &Workbook) -> Result<Vec<u8>, AssemblyError> {
  if book.sheets.is_empty() {
    return Err(AssemblyError::EmptyWorkbook);
  }

  let mut xlsx = rust_xlsxwriter::Workbook::new();
  let bold = Format::new().set_bold();

  for sheet in &book.sheets {
    let ws = xlsx.add_worksheet();
    ws.set_name(&sheet.name)?;

    for (c, title) in sheet.header.iter().enumerate() {
      ws.write_string_with_format(0, col(c)?, fit_cell(&sheet.name, title), &bold)?;
    }
    for (r, row) in sheet.rows.iter().enumerate() {
      let r = u32::try_from(r + 1).map_err(|_| AssemblyError::TooLarge)?;
      for (c, cell) in row.iter().enumerate() {
        let c = col(c)?;
        match cell {
          Cell::Text(s) => { ws.write_string(r, c, fit_cell(&sheet.name, s))?; }
          Cell::Number(n) => { ws.write_number(r, c, *n)?; }
          Cell::Bool(b) => { ws.write_boolean(r, c, *b)?; }
          Cell::Empty => {}
        }
      }
    }
    debug!(target: "report", sheet = %sheet.name, rows = sheet.rows.len(), cols = sheet.header.len(), "Sheet written");
  }

  Ok(xlsx.save_to_buffer()?)
}

/// Oversized text is cut to the cell limit rather than failing the workbook.
fn fit_cell<'a>(sheet: &str, text: &'a str) -> Cow<'a, str> {
  let cut = truncate_chars(text, MAX_CELL_CHARS);
  if let Cow::Owned(_) = cut {
    warn!(target: "report", sheet, chars = text.chars().count(), max = MAX_CELL_CHARS, "Cell text truncated");
  }
  cut
}

fn col(c: usize) -> Result<u16, AssemblyError> {
  u16::try_from(c).map_err(|_| AssemblyError::TooLarge)
}

/// Build and encode in one step.
pub fn build_spreadsheet(mcq: &[McqItem], descriptive: &[DescriptiveItem]) -> Result<Vec<u8>, AssemblyError> {
  encode_xlsx(&build_workbook(mcq, descriptive))
}

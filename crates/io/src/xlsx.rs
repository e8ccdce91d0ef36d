// Excel import (xlsx, xlsm, xls, xlsb, ods) and artifact export (xlsx only)
//
// Import: values only. Numbers, booleans and dates are rendered to strings for
// the engine. Export: a fresh workbook, saved atomically. Updating an existing
// workbook in place lives in `update`.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};
use racematch_recon::Table;
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};

use crate::error::IoError;
use crate::publish::write_atomic;

/// Excel's day zero for the 1900 date system (accounts for the 1900 leap-year bug).
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

const DATE_FORMAT: &str = "yyyy-mm-dd";

/// A single cell value, independent of the reader and writer libraries.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date (1900 system).
    Date(f64),
}

impl Cell {
    /// Render for the engine and for CSV output.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Cell::Date(serial) => format_serial(*serial),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Number(n as f64)
    }
}

/// One worksheet's values. `bold_header` styles the first row on export.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
    pub bold_header: bool,
}

impl SheetData {
    pub fn to_table(&self) -> Table {
        let mut rows = self
            .rows
            .iter()
            .map(|r| r.iter().map(Cell::to_text).collect::<Vec<_>>());
        let headers = rows.next().unwrap_or_default();
        Table::new(headers, rows.collect())
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<Sheets<std::io::BufReader<std::fs::File>>, IoError> {
    open_workbook_auto(path).map_err(|e| IoError::open(path, e))
}

fn read_range(
    workbook: &mut Sheets<std::io::BufReader<std::fs::File>>,
    path: &Path,
    sheet_name: &str,
) -> Result<Vec<Vec<Cell>>, IoError> {
    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| IoError::read(path, format!("sheet '{sheet_name}': {e}")))?;

    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = (0..start_row).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut cells: Vec<Cell> = (0..start_col).map(|_| Cell::Empty).collect();
        cells.extend(row.iter().map(convert));
        rows.push(cells);
    }
    Ok(rows)
}

fn convert(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
        Data::DateTime(dt) => Cell::Date(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Load one worksheet (the first one when `sheet` is `None`) as a table.
///
/// Leading rows that are completely empty are skipped; the first non-empty
/// row is the header.
pub fn read_table(path: &Path, sheet: Option<&str>) -> Result<Table, IoError> {
    let mut workbook = open(path)?;
    let names = workbook.sheet_names();

    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| {
                IoError::sheet(path, format!("no sheet named '{wanted}' (found {names:?})"))
            })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| IoError::sheet(path, "workbook contains no sheets"))?,
    };

    let mut rows = read_range(&mut workbook, path, &name)?
        .into_iter()
        .map(|r| r.iter().map(Cell::to_text).collect::<Vec<String>>())
        .skip_while(|r| r.iter().all(|c| c.trim().is_empty()));

    let headers: Vec<String> = match rows.next() {
        Some(h) => h.into_iter().map(|c| c.trim().to_string()).collect(),
        None => return Ok(Table::default()),
    };
    let rows = rows
        .filter(|r| !r.iter().all(|c| c.trim().is_empty()))
        .collect();

    log::debug!("{} [{name}]: {} header columns", path.display(), headers.len());
    Ok(Table::new(headers, rows))
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Write `sheets` in order to a new workbook at `path`, atomically.
pub fn write_workbook(sheets: &[SheetData], path: &Path) -> Result<(), IoError> {
    let mut workbook = XlsxWorkbook::new();
    let bold = Format::new().set_bold();
    let date = Format::new().set_num_format(DATE_FORMAT);

    for sheet in sheets {
        let worksheet = workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| IoError::write(path, format!("sheet '{}': {e}", sheet.name)))?;

        for (r, row) in sheet.rows.iter().enumerate() {
            let r = r as u32;
            let header = sheet.bold_header && r == 0;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                let written = match cell {
                    Cell::Empty => continue,
                    Cell::Text(s) if header => worksheet.write_string_with_format(r, c, s, &bold),
                    Cell::Text(s) => worksheet.write_string(r, c, s),
                    Cell::Number(n) => worksheet.write_number(r, c, *n),
                    Cell::Bool(b) => worksheet.write_boolean(r, c, *b),
                    Cell::Date(serial) => worksheet.write_number_with_format(r, c, *serial, &date),
                };
                written.map_err(|e| IoError::write(path, e))?;
            }
        }
    }

    write_atomic(path, |tmp| workbook.save(tmp).map_err(|e| IoError::write(path, e)))
}

// ---------------------------------------------------------------------------
// Value formatting
// ---------------------------------------------------------------------------

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Serial date → `YYYY-MM-DD`, or `YYYY-MM-DD HH:MM:SS` when a time part is present.
fn format_serial(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(EXCEL_EPOCH.0, EXCEL_EPOCH.1, EXCEL_EPOCH.2) else {
        return format_number(serial);
    };
    let days = serial.floor();
    let Some(date) = Duration::try_days(days as i64).and_then(|d| epoch.checked_add_signed(d)) else {
        return format_number(serial);
    };
    let secs = ((serial - days) * 86_400.0).round() as i64;
    if secs == 0 {
        return date.format("%Y-%m-%d").to_string();
    }
    match date.and_hms_opt(0, 0, 0) {
        Some(midnight) => (midnight + Duration::seconds(secs))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => date.format("%Y-%m-%d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sheet(name: &str, rows: Vec<Vec<Cell>>) -> SheetData {
        SheetData {
            name: name.into(),
            rows,
            bold_header: true,
        }
    }

    #[test]
    fn serial_dates_render_iso() {
        // 45829 = 2025-06-21
        assert_eq!(format_serial(45829.0), "2025-06-21");
        assert_eq!(format_serial(45829.5), "2025-06-21 12:00:00");
        assert_eq!(format_serial(1.0), "1899-12-31");
    }

    #[test]
    fn integral_floats_have_no_decimal_point() {
        assert_eq!(Cell::Number(101.0).to_text(), "101");
        assert_eq!(Cell::Number(2.5).to_text(), "2.5");
        assert_eq!(Cell::Bool(true).to_text(), "TRUE");
        assert_eq!(Cell::from("").to_text(), "");
    }

    #[test]
    fn write_then_read_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("usat.xlsx");
        write_workbook(
            &[sheet(
                "Races",
                vec![
                    vec!["Name".into(), "2LetterCode".into(), "RaceDate".into(), "ApplicationID".into()],
                    vec!["Boulder Sprint Tri".into(), "CO".into(), Cell::Date(45829.0), Cell::Number(101.0)],
                ],
            )],
            &path,
        )
        .unwrap();

        let table = read_table(&path, None).unwrap();
        assert_eq!(table.headers, vec!["Name", "2LetterCode", "RaceDate", "ApplicationID"]);
        assert_eq!(table.rows, vec![vec!["Boulder Sprint Tri", "CO", "2025-06-21", "101"]]);
    }

    #[test]
    fn named_sheet_and_missing_sheet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trifind.xlsx");
        write_workbook(
            &[
                sheet("Notes", vec![vec!["ignore me".into()]]),
                sheet(
                    "All Events",
                    vec![
                        vec!["title".into(), "state".into()],
                        vec!["Lake Tahoe Triathlon".into(), "Nevada".into()],
                    ],
                ),
            ],
            &path,
        )
        .unwrap();

        let table = read_table(&path, Some("All Events")).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][1], "Nevada");

        let err = read_table(&path, Some("Events 2024")).unwrap_err();
        assert!(matches!(err, IoError::Sheet { .. }));
    }

    #[test]
    fn invalid_sheet_name_is_write_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.xlsx");
        let err = write_workbook(&[sheet("bad[name]", vec![])], &path).unwrap_err();
        assert!(matches!(err, IoError::Write { .. }));
        assert!(!path.exists());
    }
}

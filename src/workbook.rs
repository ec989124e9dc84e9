// Workbook input: cells, spreadsheet columns, sheets, and the readers that
// turn an Excel file, a directory of CSV sheets or a JSON export into a
// `Workbook`.
//
// Nothing here interprets clinical meaning; rows stay positional until the
// normalizer maps them through its column table.
use crate::error::{ReportError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use serde::{Deserialize, Deserializer};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One raw scalar cell as exported from the spreadsheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Wrap a raw text field; an empty field becomes [`Cell::Empty`].
    pub fn from_text(raw: &str) -> Self {
        if raw.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(raw.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Render the cell the way a spreadsheet shows it as text.
    ///
    /// Integral numbers drop their fraction (`45`, not `45.0`), so an ID
    /// stored as a number reads back the same as one stored as text.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Cell::Empty => Cow::Borrowed(""),
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    Cow::Owned(format!("{}", *n as i64))
                } else {
                    Cow::Owned(n.to_string())
                }
            }
        }
    }
}

impl From<serde_json::Value> for Cell {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Cell::Empty,
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
            Value::String(s) => Cell::from_text(&s),
            Value::Bool(b) => Cell::Text(b.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Cell::from)
    }
}

/// A zero-based spreadsheet column, written as letters (`A`, `Z`, `AA`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Column(usize);

impl Column {
    /// Build a column from its letters at compile time.
    ///
    /// Panics (during const evaluation) on anything but `A`..`Z` letters.
    pub const fn from_letters(letters: &str) -> Column {
        let bytes = letters.as_bytes();
        assert!(!bytes.is_empty(), "column letters must not be empty");
        let mut n = 0usize;
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            assert!(b >= b'A' && b <= b'Z', "column letters must be A-Z");
            n = n * 26 + (b - b'A' + 1) as usize;
            i += 1;
        }
        Column(n - 1)
    }

    /// Parse column letters, case-insensitively. Returns `None` for anything
    /// that is not a run of ASCII letters.
    pub fn parse(letters: &str) -> Option<Column> {
        let letters = letters.trim();
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let mut n = 0usize;
        for b in letters.to_ascii_uppercase().bytes() {
            n = n.checked_mul(26)?.checked_add((b - b'A' + 1) as usize)?;
        }
        Some(Column(n - 1))
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn letters(self) -> String {
        let mut n = self.0 + 1;
        let mut out = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            out.push(b'A' + rem as u8);
            n = (n - 1) / 26;
        }
        out.reverse();
        String::from_utf8(out).unwrap_or_default()
    }
}

/// One named partition of the workbook: an ordered list of positional rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

/// An ordered collection of sheets, as read from one source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct JsonSheet {
    name: String,
    #[serde(default)]
    rows: Vec<BTreeMap<String, Cell>>,
}

impl Workbook {
    /// Read a workbook from a path, picking the reader by shape: an Excel
    /// file, a directory of `*.csv` sheets, a single `.csv` sheet, or a
    /// `.json` export.
    pub fn open(path: &Path) -> Result<Workbook> {
        if path.is_dir() {
            return Self::from_csv_dir(path);
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(Workbook {
                sheets: vec![Self::read_csv_file(path)?],
            }),
            Some("json") => Self::from_json_file(path),
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => Self::from_spreadsheet(path),
            _ => Err(ReportError::UnsupportedSource(path.to_path_buf())),
        }
    }

    /// Every sheet of an Excel (or ODS) file, in workbook order. Cells keep
    /// their absolute column, so column A is always index 0 even when the
    /// used range starts further right.
    pub fn from_spreadsheet(path: &Path) -> Result<Workbook> {
        let bytes = std::fs::read(path).map_err(|source| ReportError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut book =
            open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(ReportError::Spreadsheet)?;

        let mut sheets = Vec::new();
        for name in book.sheet_names() {
            let range = match book.worksheet_range(&name) {
                Ok(r) => r,
                Err(e) => {
                    warn!("sheet '{}': skipping unreadable worksheet: {}", name, e);
                    continue;
                }
            };
            let first_col = range.start().map_or(0, |(_, c)| c as usize);
            let rows = range
                .rows()
                .map(|row| {
                    let mut cells = vec![Cell::Empty; first_col];
                    cells.extend(row.iter().map(cell_from_data));
                    cells
                })
                .collect();
            sheets.push(Sheet { name, rows });
        }
        Ok(Workbook { sheets })
    }

    /// Every `*.csv` file in `dir` becomes one sheet named after its file stem.
    /// Files are taken in file-name order.
    pub fn from_csv_dir(dir: &Path) -> Result<Workbook> {
        let entries = std::fs::read_dir(dir).map_err(|source| ReportError::FileRead {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
            if path.is_file() && is_csv {
                paths.push(path);
            }
        }
        paths.sort();

        let mut sheets = Vec::with_capacity(paths.len());
        for path in &paths {
            sheets.push(Self::read_csv_file(path)?);
        }
        Ok(Workbook { sheets })
    }

    fn read_csv_file(path: &Path) -> Result<Sheet> {
        let file = File::open(path).map_err(|source| ReportError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::read_csv_sheet(name, file)
    }

    /// Read one header-less CSV sheet. Every field stays text; records the
    /// CSV parser rejects are skipped, not fatal.
    pub fn read_csv_sheet<R: Read>(name: impl Into<String>, reader: R) -> Result<Sheet> {
        let name = name.into();
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    warn!("sheet '{}': skipping unreadable record {}: {}", name, line + 1, e);
                    continue;
                }
            };
            rows.push(record.iter().map(Cell::from_text).collect());
        }
        Ok(Sheet { name, rows })
    }

    pub fn from_json_file(path: &Path) -> Result<Workbook> {
        let content = std::fs::read_to_string(path).map_err(|source| ReportError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse a JSON export: an array of `{ "name": ..., "rows": [...] }`
    /// where each row maps column letters to scalar values.
    pub fn from_json_str(content: &str) -> Result<Workbook> {
        let raw: Vec<JsonSheet> = serde_json::from_str(content)?;
        let sheets = raw
            .into_iter()
            .map(|sheet| {
                let rows = sheet
                    .rows
                    .into_iter()
                    .map(|row| positional_row(&sheet.name, row))
                    .collect();
                Sheet {
                    name: sheet.name,
                    rows,
                }
            })
            .collect();
        Ok(Workbook { sheets })
    }
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
        Data::String(s) => Cell::from_text(s),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_text(s),
        // Empty and formula errors
        _ => Cell::Empty,
    }
}

fn positional_row(sheet: &str, row: BTreeMap<String, Cell>) -> Vec<Cell> {
    let mut cells: Vec<Cell> = Vec::new();
    for (key, cell) in row {
        let Some(col) = Column::parse(&key) else {
            debug!("sheet '{}': ignoring non-column key '{}'", sheet, key);
            continue;
        };
        if cells.len() <= col.index() {
            cells.resize(col.index() + 1, Cell::Empty);
        }
        cells[col.index()] = cell;
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_column_letters_round_trip_edges() {
        assert_eq!(Column::from_letters("A").index(), 0);
        assert_eq!(Column::from_letters("Z").index(), 25);
        assert_eq!(Column::from_letters("AA").index(), 26);
        assert_eq!(Column::from_letters("AY").index(), 50);
        assert_eq!(Column::from_letters("AY").letters(), "AY");
        assert_eq!(Column::parse("ae"), Some(Column::from_letters("AE")));
        assert_eq!(Column::parse("A1"), None);
        assert_eq!(Column::parse(""), None);
    }

    #[test]
    fn test_cell_text_renders_integral_numbers_without_fraction() {
        assert_eq!(Cell::Number(45.0).text(), "45");
        assert_eq!(Cell::Number(4.5).text(), "4.5");
        assert_eq!(Cell::Text("P001".into()).text(), "P001");
        assert_eq!(Cell::Empty.text(), "");
    }

    #[test]
    fn test_json_workbook_places_cells_by_column() {
        let json = r#"[
            {"name": "Jan 2025", "rows": [{"A": "P001", "E": 45, "T": 6, "zz1": "ignored"}]},
            {"name": "Summary 2025"}
        ]"#;
        let wb = Workbook::from_json_str(json).unwrap();
        assert_eq!(wb.sheets.len(), 2);
        let row = &wb.sheets[0].rows[0];
        assert_eq!(row.len(), 20);
        assert_eq!(row[0], Cell::Text("P001".into()));
        assert_eq!(row[4], Cell::Number(45.0));
        assert_eq!(row[19], Cell::Number(6.0));
        assert!(row[1].is_empty());
        assert!(wb.sheets[1].rows.is_empty());
    }

    #[test]
    fn test_json_null_and_empty_string_are_empty_cells() {
        let json = r#"[{"name": "Feb 2025", "rows": [{"A": null, "B": ""}]}]"#;
        let wb = Workbook::from_json_str(json).unwrap();
        assert!(wb.sheets[0].rows[0].iter().all(Cell::is_empty));
    }

    #[test]
    fn test_csv_sheet_keeps_header_rows_and_empty_fields() {
        let data = "ID,,,,AGE\nP001,,,,45\n";
        let sheet = Workbook::read_csv_sheet("Mar 2025", data.as_bytes()).unwrap();
        assert_eq!(sheet.name, "Mar 2025");
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1][0], Cell::Text("P001".into()));
        assert!(sheet.rows[1][1].is_empty());
        assert_eq!(sheet.rows[1][4], Cell::Text("45".into()));
    }

    #[test]
    fn test_open_csv_dir_orders_sheets_by_file_name() {
        let tmp = TempDir::new().expect("tempdir");
        for name in ["Feb 2025.csv", "Jan 2025.csv", "notes.txt"] {
            let mut f = File::create(tmp.path().join(name)).expect("create");
            writeln!(f, "P001,,,,40").expect("write");
        }
        let wb = Workbook::open(tmp.path()).unwrap();
        let names: Vec<&str> = wb.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Feb 2025", "Jan 2025"]);
    }

    #[test]
    fn test_open_rejects_unknown_extension() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("cases.txt");
        File::create(&path).expect("create");
        let err = Workbook::open(&path).unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedSource(_)));
    }

    #[test]
    fn test_cell_from_data() {
        assert_eq!(cell_from_data(&Data::Float(7.5)), Cell::Number(7.5));
        assert_eq!(cell_from_data(&Data::Int(45)), Cell::Number(45.0));
        assert_eq!(cell_from_data(&Data::Bool(true)), Cell::Number(1.0));
        assert_eq!(cell_from_data(&Data::String("Y".into())), Cell::Text("Y".into()));
        assert_eq!(cell_from_data(&Data::String(String::new())), Cell::Empty);
        assert_eq!(cell_from_data(&Data::Empty), Cell::Empty);
    }

    #[test]
    fn test_open_xlsx_reads_every_sheet_by_column_position() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("aps_data.xlsx");

        let mut book = rust_xlsxwriter::Workbook::new();
        let jan = book.add_worksheet();
        jan.set_name("Jan 2025").expect("name");
        jan.write_string(0, 0, "HN001").expect("write");
        jan.write_number(0, 1, 45).expect("write");
        jan.write_string(0, 3, "Male").expect("write");
        jan.write_string(1, 0, "HN002").expect("write");
        let summary = book.add_worksheet();
        summary.set_name("Summary").expect("name");
        summary.write_string(2, 2, "total").expect("write");
        book.save(&path).expect("save xlsx");

        let wb = Workbook::open(&path).unwrap();
        let names: Vec<&str> = wb.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Jan 2025", "Summary"]);

        let jan = &wb.sheets[0];
        assert_eq!(jan.rows.len(), 2);
        assert_eq!(jan.rows[0][0], Cell::Text("HN001".into()));
        assert_eq!(jan.rows[0][1], Cell::Number(45.0));
        assert_eq!(jan.rows[0][2], Cell::Empty);
        assert_eq!(jan.rows[0][3], Cell::Text("Male".into()));
        assert_eq!(jan.rows[1][0], Cell::Text("HN002".into()));

        // Used range starts at C3; column C must still land at index 2.
        let summary = &wb.sheets[1];
        assert_eq!(summary.rows[0][2], Cell::Text("total".into()));
        assert!(summary.rows[0][..2].iter().all(Cell::is_empty));
    }

    #[test]
    fn test_open_corrupt_xlsx_is_spreadsheet_error() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("cases.xlsx");
        std::fs::write(&path, b"not a zip archive").expect("write");
        let err = Workbook::open(&path).unwrap_err();
        assert!(matches!(err, ReportError::Spreadsheet(_)));
    }

    #[test]
    fn test_open_missing_xlsx_is_file_read_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = Workbook::open(&tmp.path().join("missing.xlsx")).unwrap_err();
        assert!(matches!(err, ReportError::FileRead { .. }));
    }

    #[test]
    fn test_open_missing_json_is_file_read_error() {
        let err = Workbook::open(Path::new("/definitely/missing/aps.json")).unwrap_err();
        assert!(matches!(err, ReportError::FileRead { .. }));
    }
}

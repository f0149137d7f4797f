//! Dataset loading for data-driven runs
//!
//! Each row becomes one iteration's bindings. The loader is chosen by file
//! extension; spreadsheets are read from their first sheet.

use std::path::Path;

use calamine::{Data, DataType, Reader};
use serde_json::{Number, Value};

use crate::common::{Error, Result};
use crate::script::Bindings;

/// Load every row of a `.csv`, `.json`, `.xlsx` or `.xls` dataset
pub fn load_dataset(path: &Path) -> Result<Vec<Bindings>> {
    if !path.is_file() {
        return Err(Error::DataFile(format!("Data file not found: {}", path.display())));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let rows = match extension.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        "xlsx" | "xls" => load_excel(path)?,
        other => {
            return Err(Error::DataFile(format!(
                "Unsupported data file type '{}': {}",
                other,
                path.display()
            )))
        }
    };

    tracing::debug!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn load_csv(path: &Path) -> Result<Vec<Bindings>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::DataFile(format!("{}: {}", path.display(), e)))?;

    let headers = reader
        .headers()
        .map_err(|e| Error::DataFile(format!("{}: {}", path.display(), e)))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::DataFile(format!("{}: {}", path.display(), e)))?;
        let row: Bindings = headers
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| (name.to_string(), infer_scalar(cell)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn load_json(path: &Path) -> Result<Vec<Bindings>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| Error::DataFile(format!("{}: {}", path.display(), e)))?;

    let not_rows = || {
        Error::DataFile(format!(
            "{}: expected an object or an array of objects",
            path.display()
        ))
    };

    match value {
        Value::Object(map) => Ok(vec![map.into_iter().collect()]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map.into_iter().collect()),
                _ => Err(not_rows()),
            })
            .collect(),
        _ => Err(not_rows()),
    }
}

fn load_excel(path: &Path) -> Result<Vec<Bindings>> {
    let sheet_err = |e: calamine::Error| Error::DataFile(format!("{}: {}", path.display(), e));

    let mut workbook = calamine::open_workbook_auto(path).map_err(sheet_err)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(sheet_err)?,
        None => return Err(Error::DataFile(format!("{}: workbook has no sheets", path.display()))),
    };

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|cell| cell.to_string().trim().to_string()).collect(),
        None => return Ok(Vec::new()),
    };

    let mut dataset = Vec::new();
    for cells in rows {
        let row: Bindings = headers
            .iter()
            .zip(cells)
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, cell)| (name.clone(), cell_value(cell)))
            .collect();
        dataset.push(row);
    }
    Ok(dataset)
}

/// Type a spreadsheet cell; whole floats become integers
fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::from(*f as i64),
        Data::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => infer_scalar(s.trim()),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) => Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Value::String(cell.to_string()),
        },
        other => Value::String(other.to_string()),
    }
}

/// Type a CSV cell: integer, float, boolean, empty as null, else string
fn infer_scalar(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = cell.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_csv_rows_with_inference() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "users.csv", "name,age,score,active,note\nann,31,4.5,true,\nbob,7,1,FALSE,hi\n");

        let rows = load_dataset(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], json!("ann"));
        assert_eq!(rows[0]["age"], json!(31));
        assert_eq!(rows[0]["score"], json!(4.5));
        assert_eq!(rows[0]["active"], json!(true));
        assert_eq!(rows[0]["note"], Value::Null);
        assert_eq!(rows[1]["active"], json!(false));
        // header order is kept
        assert_eq!(rows[1].keys().next().map(String::as_str), Some("name"));
    }

    #[test]
    fn test_json_array_and_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let array = write_file(&dir, "rows.json", r#"[{"id": 1}, {"id": 2}]"#);
        assert_eq!(load_dataset(&array).unwrap().len(), 2);

        let single = write_file(&dir, "row.json", r#"{"id": 1, "name": "x"}"#);
        let rows = load_dataset(&single).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("x"));

        let scalar = write_file(&dir, "bad.json", "[1, 2]");
        assert!(matches!(load_dataset(&scalar), Err(Error::DataFile(_))));
    }

    #[test]
    fn test_excel_first_sheet_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in ["name", "age", "score", "active", "note"].iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        sheet.write_string(1, 0, "ann").unwrap();
        sheet.write_number(1, 1, 31).unwrap();
        sheet.write_number(1, 2, 4.5).unwrap();
        sheet.write_boolean(1, 3, true).unwrap();
        sheet.write_string(2, 0, "bob").unwrap();
        sheet.write_string(2, 1, "7").unwrap();
        sheet.write_number(2, 2, 1).unwrap();
        sheet.write_boolean(2, 3, false).unwrap();
        sheet.write_string(2, 4, "hi").unwrap();
        workbook.add_worksheet().write_string(0, 0, "ignored").unwrap();
        workbook.save(&path).unwrap();

        let rows = load_dataset(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], json!("ann"));
        assert_eq!(rows[0]["age"], json!(31));
        assert_eq!(rows[0]["score"], json!(4.5));
        assert_eq!(rows[0]["active"], json!(true));
        assert_eq!(rows[0]["note"], Value::Null);
        assert_eq!(rows[1]["age"], json!(7));
        assert_eq!(rows[1]["active"], json!(false));
        assert_eq!(rows[1]["note"], json!("hi"));
        assert_eq!(rows[1].keys().next().map(String::as_str), Some("name"));
    }

    #[test]
    fn test_missing_corrupt_and_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        assert!(matches!(load_dataset(&missing), Err(Error::DataFile(_))));

        let corrupt = write_file(&dir, "sheet.xlsx", "not a workbook");
        assert_eq!(load_dataset(&corrupt).unwrap_err().kind(), "DATA_FILE");

        let yaml = write_file(&dir, "rows.yaml", "- id: 1\n");
        let err = load_dataset(&yaml).unwrap_err();
        assert!(err.to_string().contains("Unsupported data file type 'yaml'"));
    }
}

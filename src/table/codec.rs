//! Versioned JSON contract for report requests.
//!
//! Payload shape (version 1):
//!
//! ```json
//! {
//!   "version": 1,
//!   "data": [
//!     [ { "columns": ["A", "B"], "data": [[1, 1], [2, 2]], "mask": [["green", "green"], [null, null]] } ]
//!   ]
//! }
//! ```
//!
//! `data` holds reports; each report is a list of table descriptions.
//! `columns` and `mask` are optional. A missing `version` is read as 1.
//! Every rejection names the offending JSON path.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::table::model::{CellValue, ColorMask, Report, ReportRequest, Table, TableDesc};

/// Current payload version.
pub const PAYLOAD_VERSION: u64 = 1;

// ── Wire types ──────────────────────────────────────────────────────

/// Wire form of a [`TableDesc`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTableDesc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    pub data: Vec<Vec<CellValue>>,
    #[serde(default)]
    pub mask: Option<Vec<Vec<Option<String>>>>,
}

/// Wire form of a [`ReportRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequest {
    pub version: u64,
    pub data: Vec<Vec<WireTableDesc>>,
}

impl From<&TableDesc> for WireTableDesc {
    fn from(desc: &TableDesc) -> Self {
        Self {
            columns: Some(desc.data.columns().to_vec()),
            data: desc.data.rows().to_vec(),
            mask: desc.mask.as_ref().map(ColorMask::to_rows),
        }
    }
}

// ── Encode ──────────────────────────────────────────────────────────

/// Encode a table description.
pub fn encode_table_desc(desc: &TableDesc) -> Value {
    // Cells and masks are plain JSON scalars; serialization cannot fail.
    serde_json::to_value(WireTableDesc::from(desc)).unwrap_or(Value::Null)
}

/// Encode a whole request at [`PAYLOAD_VERSION`].
pub fn encode_request(request: &ReportRequest) -> Value {
    let wire = WireRequest {
        version: PAYLOAD_VERSION,
        data: request
            .reports()
            .iter()
            .map(|report| report.iter().map(WireTableDesc::from).collect())
            .collect(),
    };
    serde_json::to_value(wire).unwrap_or(Value::Null)
}

// ── Decode ──────────────────────────────────────────────────────────

/// Parse and validate a JSON payload into a report request.
pub fn decode_request(json: &str) -> Result<ReportRequest, SchemaError> {
    let value: Value = serde_json::from_str(json)?;
    decode_request_value(&value)
}

/// Validate an already-parsed payload.
pub fn decode_request_value(value: &Value) -> Result<ReportRequest, SchemaError> {
    let root = value
        .as_object()
        .ok_or_else(|| SchemaError::violation("$", "expected an object"))?;

    match root.get("version") {
        None => {}
        Some(v) => {
            let found = v
                .as_u64()
                .ok_or_else(|| SchemaError::violation("$.version", "expected a non-negative integer"))?;
            if found != PAYLOAD_VERSION {
                return Err(SchemaError::UnsupportedVersion {
                    found,
                    expected: PAYLOAD_VERSION,
                });
            }
        }
    }

    let reports = root
        .get("data")
        .ok_or_else(|| SchemaError::violation("$.data", "required field missing"))?
        .as_array()
        .ok_or_else(|| SchemaError::violation("$.data", "expected an array of reports"))?;
    if reports.is_empty() {
        return Err(SchemaError::violation("$.data", "at least one report is required"));
    }

    let reports = reports
        .iter()
        .enumerate()
        .map(|(i, report)| decode_report(report, &format!("$.data[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ReportRequest::new(reports))
}

fn decode_report(value: &Value, path: &str) -> Result<Report, SchemaError> {
    let tables = value
        .as_array()
        .ok_or_else(|| SchemaError::violation(path, "expected an array of tables"))?;
    if tables.is_empty() {
        return Err(SchemaError::violation(path, "a report needs at least one table"));
    }
    tables
        .iter()
        .enumerate()
        .map(|(j, table)| decode_table_desc(table, &format!("{path}[{j}]")))
        .collect()
}

/// Validate one table description at `path`.
pub fn decode_table_desc(value: &Value, path: &str) -> Result<TableDesc, SchemaError> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaError::violation(path, "expected an object"))?;

    let data_path = format!("{path}.data");
    let rows = obj
        .get("data")
        .ok_or_else(|| SchemaError::violation(&data_path, "required field missing"))?;
    let rows = decode_grid(rows, &data_path, decode_cell)?;
    let width = rows.first().map_or(0, Vec::len);

    let columns = match obj.get("columns") {
        None | Some(Value::Null) => (0..width).map(|i| i.to_string()).collect(),
        Some(cols) => {
            let cols_path = format!("{path}.columns");
            let cols = cols
                .as_array()
                .ok_or_else(|| SchemaError::violation(&cols_path, "expected an array of strings"))?;
            let names = cols
                .iter()
                .enumerate()
                .map(|(k, c)| {
                    c.as_str().map(str::to_string).ok_or_else(|| {
                        SchemaError::violation(format!("{cols_path}[{k}]"), "expected a string")
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if !rows.is_empty() && names.len() != width {
                return Err(SchemaError::violation(
                    cols_path,
                    format!("{} headers for rows of width {width}", names.len()),
                ));
            }
            names
        }
    };

    let table = Table::new(columns, rows)
        .map_err(|e| SchemaError::violation(&data_path, e.to_string()))?;

    let mask = match obj.get("mask") {
        None | Some(Value::Null) => None,
        Some(mask) => {
            let mask_path = format!("{path}.mask");
            let cells = decode_grid(mask, &mask_path, decode_color)?;
            let mask = ColorMask::from_rows(cells)
                .map_err(|e| SchemaError::violation(&mask_path, e.to_string()))?;
            let expected_cols = if table.n_rows() == 0 { 0 } else { table.n_cols() };
            if mask.shape() != (table.n_rows(), expected_cols) {
                return Err(SchemaError::violation(
                    mask_path,
                    format!(
                        "mask is {}x{} but data is {}x{}",
                        mask.n_rows(),
                        mask.n_cols(),
                        table.n_rows(),
                        table.n_cols()
                    ),
                ));
            }
            Some(mask)
        }
    };

    Ok(TableDesc::new(table, mask))
}

/// Decode an array of equal-length arrays, converting each cell with `cell`.
fn decode_grid<T>(
    value: &Value,
    path: &str,
    cell: fn(&Value, &str) -> Result<T, SchemaError>,
) -> Result<Vec<Vec<T>>, SchemaError> {
    let rows = value
        .as_array()
        .ok_or_else(|| SchemaError::violation(path, "expected an array of rows"))?;

    let mut width = None;
    let mut out = Vec::with_capacity(rows.len());
    for (r, row) in rows.iter().enumerate() {
        let row_path = format!("{path}[{r}]");
        let cells = row
            .as_array()
            .ok_or_else(|| SchemaError::violation(&row_path, "expected an array of cells"))?;
        match width {
            None => width = Some(cells.len()),
            Some(w) if w != cells.len() => {
                return Err(SchemaError::violation(
                    row_path,
                    format!("row has {} cells, expected {w}", cells.len()),
                ));
            }
            Some(_) => {}
        }
        let decoded = cells
            .iter()
            .enumerate()
            .map(|(c, v)| cell(v, &format!("{row_path}[{c}]")))
            .collect::<Result<Vec<_>, _>>()?;
        out.push(decoded);
    }
    Ok(out)
}

fn decode_cell(value: &Value, path: &str) -> Result<CellValue, SchemaError> {
    match value {
        Value::Null => Ok(CellValue::Null),
        Value::Bool(b) => Ok(CellValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(CellValue::Int)
            .or_else(|| n.as_f64().map(CellValue::Float))
            .ok_or_else(|| SchemaError::violation(path, "number out of range")),
        Value::String(s) => Ok(CellValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => {
            Err(SchemaError::violation(path, "expected a scalar cell value"))
        }
    }
}

fn decode_color(value: &Value, path: &str) -> Result<Option<String>, SchemaError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if !s.trim().is_empty() => Ok(Some(s.clone())),
        _ => Err(SchemaError::violation(path, "expected a color name or null")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::table::demo::demo_request;
    use crate::table::mask::{Axis, DEFAULT_COLOR, derive_mask};

    fn violation_path(err: SchemaError) -> String {
        match err {
            SchemaError::Violation { path, .. } => path,
            other => panic!("expected a violation, got {other:?}"),
        }
    }

    #[test]
    fn demo_request_survives_encoding() {
        let request = demo_request().unwrap();
        let encoded = encode_request(&request);
        assert_eq!(encoded["version"], 1);
        let decoded = decode_request(&encoded.to_string()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn empty_table_with_headers_and_mask_survives_encoding() {
        let table = Table::new(vec!["A".into(), "B".into()], Vec::new()).unwrap();
        let mask = derive_mask::<i64>(&table, &[], Axis::Rows, None, DEFAULT_COLOR).unwrap();
        let request = ReportRequest::new(vec![vec![TableDesc::new(table, Some(mask))]]);

        let decoded = decode_request(&encode_request(&request).to_string()).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.reports()[0][0].data.columns(), ["A", "B"]);
    }

    #[test]
    fn missing_version_and_columns_are_defaulted() {
        let payload = json!({ "data": [[{ "data": [[1, "x"], [2.5, null]] }]] });
        let request = decode_request_value(&payload).unwrap();
        let desc = &request.reports()[0][0];
        assert_eq!(desc.data.columns(), ["0", "1"]);
        assert_eq!(desc.data.rows()[1], vec![CellValue::Float(2.5), CellValue::Null]);
        assert!(desc.mask.is_none());
    }

    #[test]
    fn table_desc_encoding_keeps_mask() {
        let request = demo_request().unwrap();
        let value = encode_table_desc(&request.reports()[0][0]);
        assert_eq!(value["mask"][0][0], "green");
        assert_eq!(value["columns"], json!(["A", "B", "C"]));
    }

    #[test]
    fn rejects_wrong_version() {
        let err = decode_request_value(&json!({ "version": 2, "data": [] })).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UnsupportedVersion { found: 2, expected: 1 }
        ));
    }

    #[test]
    fn rejects_missing_data() {
        let err = decode_request_value(&json!({ "version": 1 })).unwrap_err();
        assert_eq!(violation_path(err), "$.data");
    }

    #[test]
    fn rejects_empty_batch_and_empty_report() {
        let err = decode_request_value(&json!({ "data": [] })).unwrap_err();
        assert_eq!(violation_path(err), "$.data");
        let err = decode_request_value(&json!({ "data": [[]] })).unwrap_err();
        assert_eq!(violation_path(err), "$.data[0]");
    }

    #[test]
    fn ragged_rows_name_the_row() {
        let payload = json!({ "data": [[{ "data": [[1, 2]] }, { "data": [[1, 2], [3]] }]] });
        let err = decode_request_value(&payload).unwrap_err();
        assert_eq!(violation_path(err), "$.data[0][1].data[1]");
    }

    #[test]
    fn nested_cell_is_rejected() {
        let payload = json!({ "data": [[{ "data": [[1, [2]]] }]] });
        let err = decode_request_value(&payload).unwrap_err();
        assert_eq!(violation_path(err), "$.data[0][0].data[0][1]");
    }

    #[test]
    fn mask_shape_must_match_data() {
        let payload = json!({ "data": [[{ "data": [[1, 2], [3, 4]], "mask": [["red", "red"]] }]] });
        let err = decode_request_value(&payload).unwrap_err();
        assert_eq!(violation_path(err), "$.data[0][0].mask");
    }

    #[test]
    fn mask_cells_must_be_strings_or_null() {
        let payload = json!({ "data": [[{ "data": [[1]], "mask": [[3]] }]] });
        let err = decode_request_value(&payload).unwrap_err();
        assert_eq!(violation_path(err), "$.data[0][0].mask[0][0]");
    }

    #[test]
    fn header_count_must_match_width() {
        let payload = json!({ "data": [[{ "columns": ["A"], "data": [[1, 2]] }]] });
        let err = decode_request_value(&payload).unwrap_err();
        assert_eq!(violation_path(err), "$.data[0][0].columns");
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(decode_request("{not json"), Err(SchemaError::Json(_))));
    }
}

//! Built-in demo request used by test mode.

use crate::error::TableError;
use crate::table::mask::{Axis, ColorMapping, DEFAULT_COLOR, derive_mask};
use crate::table::model::{CellValue, ReportRequest, Table, TableDesc};

/// One report holding a 4x3 table whose first row is green and the rest red.
pub fn demo_request() -> Result<ReportRequest, TableError> {
    let column = || -> Vec<CellValue> { [1, 2, 3, 4].into_iter().map(CellValue::from).collect() };
    let table = Table::from_columns([("A", column()), ("B", column()), ("C", column())])?;

    let mask = derive_mask(
        &table,
        &[1, 2, 2, 2],
        Axis::Rows,
        Some(&ColorMapping::binary()),
        DEFAULT_COLOR,
    )?;

    Ok(ReportRequest::new(vec![vec![TableDesc::new(table, Some(mask))]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_has_one_masked_table() {
        let request = demo_request().unwrap();
        assert_eq!(request.len(), 1);
        let desc = &request.reports()[0][0];
        assert_eq!(desc.data.shape(), (4, 3));
        let mask = desc.mask.as_ref().unwrap();
        assert_eq!(mask.get(0, 2), Some("green"));
        assert_eq!(mask.get(3, 0), Some("red"));
    }
}

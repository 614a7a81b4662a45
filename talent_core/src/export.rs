//! Export of query results for download or rendering

use crate::error::{QueryError, Result};
use crate::table::{Table, Value};
use crate::types::ChartSpec;
use rust_xlsxwriter::{Workbook, XlsxError};

/// Sheet holding an exported result table
pub const RESULT_SHEET: &str = "Filtered Results";

/// Serialize a result table as CSV bytes, header row first.
pub fn table_to_csv(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(table.column_names())
        .map_err(std::io::Error::from)?;
    for row in 0..table.row_count() {
        let cells: Vec<String> = table.row(row).iter().map(|v| v.to_string()).collect();
        writer.write_record(&cells).map_err(std::io::Error::from)?;
    }

    writer
        .into_inner()
        .map_err(|e| QueryError::Io(e.into_error()))
}

/// Serialize a result table as an `.xlsx` workbook with one sheet.
///
/// Numbers are written as numeric cells; missing cells are left blank.
pub fn table_to_xlsx(table: &Table) -> Result<Vec<u8>> {
    let columns = u16::try_from(table.width())
        .map_err(|_| QueryError::Export(format!("{} columns do not fit a sheet", table.width())))?;
    let rows = u32::try_from(table.row_count())
        .map_err(|_| QueryError::Export(format!("{} rows do not fit a sheet", table.row_count())))?;

    let mut workbook = Workbook::new();
    write_sheet(&mut workbook, table, columns, rows).map_err(xlsx_error)?;
    workbook.save_to_buffer().map_err(xlsx_error)
}

fn write_sheet(
    workbook: &mut Workbook,
    table: &Table,
    columns: u16,
    rows: u32,
) -> std::result::Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(RESULT_SHEET)?;

    for (col, column) in (0..columns).zip(table.columns()) {
        sheet.write_string(0, col, &column.name)?;
        for (row, value) in (1..=rows).zip(&column.values) {
            match value {
                Value::Number(n) => {
                    sheet.write_number(row, col, *n)?;
                }
                Value::Text(s) => {
                    sheet.write_string(row, col, s)?;
                }
                Value::Missing => {}
            }
        }
    }
    Ok(())
}

fn xlsx_error(e: XlsxError) -> QueryError {
    QueryError::Export(e.to_string())
}

/// Chart description as JSON for an external renderer
pub fn chart_to_json(chart: &ChartSpec) -> Result<String> {
    Ok(serde_json::to_string(chart)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use crate::types::ChartKind;

    #[test]
    fn test_table_to_csv() {
        let table = Table::new(vec![
            Column::from_raw("talent_name", &["talent_1", "talent_2"]),
            Column::from_raw("note", &["a, b", ""]),
            Column::from_raw("age", &["31", "40.5"]),
        ])
        .unwrap();

        let bytes = table_to_csv(&table).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "talent_name,note,age\ntalent_1,\"a, b\",31\ntalent_2,,40.5\n"
        );
    }

    #[test]
    fn test_empty_table_csv() {
        let table = Table::new(vec![Column::from_raw::<&str>("email", &[])]).unwrap();
        let text = String::from_utf8(table_to_csv(&table).unwrap()).unwrap();
        assert_eq!(text, "email\n");
    }

    #[test]
    fn test_table_to_xlsx_reads_back() {
        use calamine::{open_workbook_auto_from_rs, Data, Reader};

        let table = Table::new(vec![
            Column::from_raw("talent_name", &["talent_1", "talent_2"]),
            Column::from_raw("age", &["31", ""]),
        ])
        .unwrap();
        let bytes = table_to_xlsx(&table).unwrap();

        let mut workbook = open_workbook_auto_from_rs(std::io::Cursor::new(bytes.clone())).unwrap();
        assert_eq!(workbook.sheet_names(), vec![RESULT_SHEET.to_string()]);
        let range = workbook.worksheet_range(RESULT_SHEET).unwrap();
        assert_eq!(range.get_value((0, 1)), Some(&Data::String("age".to_string())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(31.0)));

        // Loading the export yields the same table
        let loaded = crate::loader::load_spreadsheet(&bytes).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_chart_to_json() {
        let chart = ChartSpec {
            kind: ChartKind::Pie,
            column: "department".to_string(),
            top_n: Some(10),
            value_counts: vec![("HR".to_string(), 2)],
        };
        let json: serde_json::Value = serde_json::from_str(&chart_to_json(&chart).unwrap()).unwrap();
        assert_eq!(json["column"], "department");
        assert_eq!(json["value_counts"][0][0], "HR");
        assert_eq!(json["value_counts"][0][1], 2);
    }
}

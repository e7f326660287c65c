use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook};

use super::{cell_text, decode_error, encode_error, TableFormat};
use crate::domain::enriched::{EnrichedTable, ExportCell, TableView};
use crate::domain::table::{CellValue, RawRow, RawTable};
use crate::errors::TableError;

const SHEET_NAME: &str = "Products";

/// Reads the first worksheet; its first row is the header.
pub(super) fn decode(bytes: &[u8]) -> Result<RawTable, TableError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))
        .map_err(|error: calamine::XlsxError| decode_error(TableFormat::Xlsx, error))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| decode_error(TableFormat::Xlsx, "workbook has no worksheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|error| decode_error(TableFormat::Xlsx, error))?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(RawTable::default());
    };
    let columns: Vec<String> =
        header_row.iter().map(|cell| cell.to_string().trim().to_string()).collect();

    let mut rows = Vec::new();
    for sheet_row in sheet_rows {
        let mut row = RawRow::new();
        for (column, cell) in columns.iter().zip(sheet_row) {
            if column.is_empty() {
                continue;
            }
            row.insert(column.clone(), cell_value(cell));
        }
        if row.is_blank() {
            continue;
        }
        rows.push(row);
    }

    Ok(RawTable::new(columns.into_iter().filter(|column| !column.is_empty()).collect(), rows))
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(value) => CellValue::Number(Decimal::from(*value)),
        Data::Float(value) => Decimal::from_f64(*value)
            .map_or_else(|| CellValue::text(value.to_string()), CellValue::Number),
        Data::String(text) => CellValue::text(text.as_str()),
        other => CellValue::text(other.to_string()),
    }
}

pub(super) fn encode(table: &EnrichedTable, view: TableView) -> Result<Vec<u8>, TableError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME).map_err(|error| encode_error(TableFormat::Xlsx, error))?;

    for (index, column) in view.columns().iter().enumerate() {
        let col = column_index(index)?;
        worksheet
            .write_string_with_format(0, col, *column, &header_format)
            .map_err(|error| encode_error(TableFormat::Xlsx, error))?;
    }

    for (row_index, record) in table.records.iter().enumerate() {
        let row = u32::try_from(row_index + 1)
            .map_err(|_| encode_error(TableFormat::Xlsx, "too many rows for a worksheet"))?;
        for (index, column) in view.columns().iter().enumerate() {
            let col = column_index(index)?;
            let written = match record.export_cell(column) {
                ExportCell::Empty => continue,
                ExportCell::Number(value) => match value.to_f64() {
                    Some(number) => worksheet.write_number(row, col, number),
                    None => worksheet.write_string(row, col, value.to_string()),
                },
                ExportCell::Integer(value) => worksheet.write_number(row, col, value as f64),
                ExportCell::Bool(value) => worksheet.write_boolean(row, col, value),
                other => worksheet.write_string(row, col, cell_text(&other)),
            };
            written.map_err(|error| encode_error(TableFormat::Xlsx, error))?;
        }
    }

    workbook.save_to_buffer().map_err(|error| encode_error(TableFormat::Xlsx, error))
}

fn column_index(index: usize) -> Result<u16, TableError> {
    u16::try_from(index).map_err(|_| encode_error(TableFormat::Xlsx, "too many columns"))
}

#[cfg(test)]
mod tests {
    use calamine::Data;
    use rust_decimal::Decimal;

    use super::{cell_value, decode};
    use crate::domain::table::CellValue;

    #[test]
    fn sheet_cells_map_onto_table_cells() {
        assert_eq!(cell_value(&Data::Int(7)), CellValue::Number(Decimal::from(7)));
        assert_eq!(cell_value(&Data::Float(12.5)), CellValue::Number(Decimal::new(125, 1)));
        assert_eq!(cell_value(&Data::String("  ".to_string())), CellValue::Empty);
        assert_eq!(cell_value(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn bytes_that_are_not_a_workbook_fail_to_decode() {
        assert!(decode(b"Product,Cost\nTea,6\n").is_err());
    }
}

use csv::{ReaderBuilder, Trim, WriterBuilder};

use super::{cell_text, decode_error, encode_error, TableFormat};
use crate::domain::enriched::{EnrichedTable, TableView};
use crate::domain::table::{CellValue, RawRow, RawTable};
use crate::errors::TableError;

pub(super) fn decode(bytes: &[u8]) -> Result<RawTable, TableError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|error| decode_error(TableFormat::Csv, error))?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|error| decode_error(TableFormat::Csv, error))?;
        let mut row = RawRow::new();
        for (column, value) in columns.iter().zip(record.iter()) {
            row.insert(column.clone(), CellValue::text(value));
        }
        if row.is_blank() {
            continue;
        }
        rows.push(row);
    }

    Ok(RawTable::new(columns, rows))
}

pub(super) fn encode(table: &EnrichedTable, view: TableView) -> Result<Vec<u8>, TableError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    let columns = view.columns();

    writer.write_record(columns).map_err(|error| encode_error(TableFormat::Csv, error))?;
    for record in &table.records {
        let cells = columns.iter().map(|column| cell_text(&record.export_cell(column)));
        writer.write_record(cells).map_err(|error| encode_error(TableFormat::Csv, error))?;
    }

    writer.into_inner().map_err(|error| encode_error(TableFormat::Csv, error.error()))
}

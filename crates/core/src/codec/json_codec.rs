use std::str::FromStr;

use serde_json::{Map, Number, Value};

use super::{decode_error, encode_error, TableFormat};
use crate::domain::enriched::{EnrichedTable, ExportCell, TableView};
use crate::domain::table::{parse_decimal, CellValue, RawRow, RawTable};
use crate::errors::TableError;

/// Expects an array of objects. Columns are the union of keys in first-seen order.
pub(super) fn decode(bytes: &[u8]) -> Result<RawTable, TableError> {
    let objects: Vec<Map<String, Value>> =
        serde_json::from_slice(bytes).map_err(|error| decode_error(TableFormat::Json, error))?;

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(objects.len());
    for object in objects {
        let mut row = RawRow::new();
        for (key, value) in object {
            let column = key.trim().to_string();
            if !columns.contains(&column) {
                columns.push(column.clone());
            }
            row.insert(column, cell_value(value));
        }
        if row.is_blank() {
            continue;
        }
        rows.push(row);
    }

    Ok(RawTable::new(columns, rows))
}

fn cell_value(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Number(number) => {
            let raw = number.to_string();
            parse_decimal(&raw).map_or_else(|| CellValue::text(raw), CellValue::Number)
        }
        Value::String(text) => CellValue::text(text),
        Value::Bool(flag) => CellValue::text(flag.to_string()),
        Value::Array(items) => {
            let numbers: Option<Vec<_>> = items
                .iter()
                .map(|item| match item {
                    Value::Number(number) => parse_decimal(&number.to_string()),
                    Value::String(text) => parse_decimal(text),
                    _ => None,
                })
                .collect();
            numbers
                .map_or_else(|| CellValue::text(Value::Array(items).to_string()), CellValue::List)
        }
        object @ Value::Object(_) => CellValue::text(object.to_string()),
    }
}

pub(super) fn encode(table: &EnrichedTable, view: TableView) -> Result<Vec<u8>, TableError> {
    serde_json::to_vec_pretty(&to_rows(table, view))
        .map_err(|error| encode_error(TableFormat::Json, error))
}

/// One ordered object per record, keys in view column order.
pub(super) fn to_rows(table: &EnrichedTable, view: TableView) -> Vec<Value> {
    table
        .records
        .iter()
        .map(|record| {
            let object: Map<String, Value> = view
                .columns()
                .iter()
                .map(|column| ((*column).to_string(), json_value(record.export_cell(column))))
                .collect();
            Value::Object(object)
        })
        .collect()
}

fn json_value(cell: ExportCell) -> Value {
    let number = |value: rust_decimal::Decimal| {
        Number::from_str(&value.normalize().to_string())
            .map_or_else(|_| Value::String(value.to_string()), Value::Number)
    };

    match cell {
        ExportCell::Empty => Value::Null,
        ExportCell::Text(text) => Value::String(text),
        ExportCell::Number(value) => number(value),
        ExportCell::Integer(value) => Value::from(value),
        ExportCell::Bool(flag) => Value::Bool(flag),
        ExportCell::Sequence(values) => Value::Array(values.into_iter().map(number).collect()),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{decode, json_value};
    use crate::domain::enriched::ExportCell;
    use crate::domain::table::CellValue;

    #[test]
    fn arrays_of_numbers_become_lists() {
        let input = json!([
            {"Product": "Tea", "Price_History": [10, 12.5], "Cost": null},
            {"Product": "Coffee", "Location": "us"}
        ]);

        let table = decode(input.to_string().as_bytes()).unwrap();

        assert_eq!(table.columns, vec!["Product", "Price_History", "Cost", "Location"]);
        assert_eq!(
            table.rows[0].get("Price_History"),
            &CellValue::List(vec![Decimal::from(10), Decimal::new(125, 1)])
        );
        assert!(table.rows[0].get("Cost").is_empty());
    }

    #[test]
    fn non_array_documents_are_rejected() {
        assert!(decode(br#"{"Product": "Tea"}"#).is_err());
    }

    #[test]
    fn derived_numbers_are_written_as_json_numbers() {
        assert_eq!(json_value(ExportCell::Number(Decimal::new(1550, 2))), json!(15.5));
        assert_eq!(json_value(ExportCell::Empty), json!(null));
        assert_eq!(
            json_value(ExportCell::Sequence(vec![Decimal::from(1), Decimal::from(2)])),
            json!([1, 2])
        );
    }
}

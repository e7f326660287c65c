//! Tabular ingestion and export in the three supported file formats.

mod csv_codec;
mod json_codec;
mod xlsx_codec;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::enriched::{EnrichedTable, ExportCell, TableView};
use crate::domain::table::RawTable;
use crate::errors::{TableError, UnsupportedFormatError};
use crate::history::encode_history;

pub const SUPPORTED_FORMATS: &str = "csv|xlsx|json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    Xlsx,
    Json,
}

impl TableFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Json => "application/json",
        }
    }

    /// Picks the format from a file name's extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, UnsupportedFormatError> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
        if extension.is_empty() {
            return Err(unsupported(&path.display().to_string()));
        }
        extension.parse()
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableFormat {
    type Err = UnsupportedFormatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            "json" => Ok(Self::Json),
            _ => Err(unsupported(value)),
        }
    }
}

fn unsupported(requested: &str) -> UnsupportedFormatError {
    UnsupportedFormatError { requested: requested.to_string(), supported: SUPPORTED_FORMATS }
}

/// Decodes an uploaded file. Fully blank rows are skipped; a table left with
/// no data rows is [`TableError::Empty`].
pub fn decode_table(bytes: &[u8], format: TableFormat) -> Result<RawTable, TableError> {
    let table = match format {
        TableFormat::Csv => csv_codec::decode(bytes)?,
        TableFormat::Xlsx => xlsx_codec::decode(bytes)?,
        TableFormat::Json => json_codec::decode(bytes)?,
    };
    if table.rows.is_empty() {
        return Err(TableError::Empty);
    }
    Ok(table)
}

pub fn encode_table(
    table: &EnrichedTable,
    view: TableView,
    format: TableFormat,
) -> Result<Vec<u8>, TableError> {
    match format {
        TableFormat::Csv => csv_codec::encode(table, view),
        TableFormat::Xlsx => xlsx_codec::encode(table, view),
        TableFormat::Json => json_codec::encode(table, view),
    }
}

/// The rows of `table` as JSON objects, the shape the JSON export writes.
pub fn json_rows(table: &EnrichedTable, view: TableView) -> Vec<serde_json::Value> {
    json_codec::to_rows(table, view)
}

/// Plain-text rendering shared by the CSV and XLSX writers; sequences become
/// JSON array text so exported files can be ingested again.
fn cell_text(cell: &ExportCell) -> String {
    match cell {
        ExportCell::Empty => String::new(),
        ExportCell::Text(text) => text.clone(),
        ExportCell::Number(value) => value.normalize().to_string(),
        ExportCell::Integer(value) => value.to_string(),
        ExportCell::Bool(value) => value.to_string(),
        ExportCell::Sequence(values) => encode_history(values),
    }
}

fn decode_error(format: TableFormat, message: impl fmt::Display) -> TableError {
    TableError::Decode { format: format.as_str(), message: message.to_string() }
}

fn encode_error(format: TableFormat, message: impl fmt::Display) -> TableError {
    TableError::Encode { format: format.as_str(), message: message.to_string() }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{decode_table, encode_table, TableFormat};
    use crate::domain::enriched::TableView;
    use crate::domain::record::columns;
    use crate::errors::TableError;
    use crate::metrics::MetricsSettings;
    use crate::pipeline::PricingPipeline;
    use crate::recommendation::RuleBasedRecommender;

    const SAMPLE_CSV: &str = "\
Product,Current_Price,Cost,Current_Stock,Sales_30d,Competitor_Price,Price_History,Sales_History
Green tea,12,8,800,60,10,\"[10, 12]\",\"[100, 80]\"
Coffee,20,15,30,90,,,
";

    #[test]
    fn formats_parse_from_names_and_paths() {
        assert_eq!("CSV".parse::<TableFormat>(), Ok(TableFormat::Csv));
        assert_eq!(".xlsx".parse::<TableFormat>(), Ok(TableFormat::Xlsx));
        assert_eq!(TableFormat::from_path("upload/products.json"), Ok(TableFormat::Json));

        let error = "xls".parse::<TableFormat>().unwrap_err();
        assert_eq!(error.requested, "xls");
        assert_eq!(error.supported, "csv|xlsx|json");
        assert!(TableFormat::from_path("README").is_err());
    }

    #[test]
    fn header_only_input_is_empty() {
        let bytes = b"Product,Current_Price,Cost,Current_Stock,Sales_30d\n";

        assert_eq!(decode_table(bytes, TableFormat::Csv), Err(TableError::Empty));
    }

    #[tokio::test]
    async fn exported_files_can_be_ingested_again() {
        let raw = decode_table(SAMPLE_CSV.as_bytes(), TableFormat::Csv).unwrap();
        let pipeline = PricingPipeline::new(MetricsSettings::default(), RuleBasedRecommender);
        let first = pipeline.process(&raw).await.unwrap();

        for format in [TableFormat::Csv, TableFormat::Xlsx, TableFormat::Json] {
            let bytes = encode_table(&first, TableView::Full, format).unwrap();
            let reread = decode_table(&bytes, format).unwrap();
            let second = pipeline.process(&reread).await.unwrap();

            assert_eq!(first.records, second.records, "{format} export did not re-ingest cleanly");
        }
    }

    #[tokio::test]
    async fn simple_view_exports_only_summary_columns() {
        let raw = decode_table(SAMPLE_CSV.as_bytes(), TableFormat::Csv).unwrap();
        let pipeline = PricingPipeline::new(MetricsSettings::default(), RuleBasedRecommender);
        let enriched = pipeline.process(&raw).await.unwrap();

        let bytes = encode_table(&enriched, TableView::Simple, TableFormat::Csv).unwrap();
        let reread = decode_table(&bytes, TableFormat::Csv).unwrap();

        assert_eq!(reread.columns, TableView::Simple.columns());
        assert_eq!(reread.rows.len(), 2);
        assert_eq!(
            reread.rows[0].get(columns::CURRENT_PRICE).as_decimal(),
            Some(Decimal::from(12))
        );
    }
}

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

/// One cell of an ingested table, before any column-specific coercion.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Number(Decimal),
    Text(String),
    List(Vec<Decimal>),
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(value) => value.trim().is_empty(),
            Self::Number(_) | Self::List(_) => false,
        }
    }

    /// Numeric coercion: numbers pass through, text is parsed, anything else is absent.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(value) => parse_decimal(value),
            Self::Empty | Self::List(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(value) => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Number(value) => write!(f, "{}", value.normalize()),
            Self::Text(value) => f.write_str(value),
            Self::List(values) => {
                let rendered: Vec<String> =
                    values.iter().map(|value| value.normalize().to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed).ok().or_else(|| Decimal::from_scientific(trimmed).ok())
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawRow {
    cells: HashMap<String, CellValue>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        self.cells.insert(column.into(), value);
    }

    pub fn with(mut self, column: impl Into<String>, value: CellValue) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&EMPTY_CELL)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(CellValue::is_empty)
    }
}

/// A column-name-indexed table as delivered by the ingestion collaborator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { columns, rows }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|candidate| candidate == column)
    }

    /// Every entry of `required` that is not a column of this table, in the given order.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|column| !self.has_column(column))
            .map(|column| (*column).to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{parse_decimal, CellValue, RawRow, RawTable};

    #[test]
    fn text_cells_coerce_to_decimals() {
        assert_eq!(CellValue::text(" 12.50 ").as_decimal(), Some(Decimal::new(1250, 2)));
        assert_eq!(CellValue::text("1e3").as_decimal(), Some(Decimal::from(1000)));
        assert_eq!(CellValue::text("n/a").as_decimal(), None);
        assert_eq!(CellValue::text("   "), CellValue::Empty);
    }

    #[test]
    fn missing_cells_read_as_empty() {
        let row = RawRow::new().with("Product", CellValue::text("Tea"));

        assert_eq!(row.get("Cost"), &CellValue::Empty);
        assert_eq!(row.get("Product").as_text().as_deref(), Some("Tea"));
    }

    #[test]
    fn missing_columns_are_collected_in_order() {
        let table = RawTable::new(vec!["Product".to_string(), "Current_Price".to_string()], vec![]);

        assert_eq!(
            table.missing_columns(&["Product", "Cost", "Current_Price", "Sales_30d"]),
            vec!["Cost".to_string(), "Sales_30d".to_string()]
        );
    }

    #[test]
    fn parse_decimal_rejects_blank_input() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("-4"), Some(Decimal::from(-4)));
    }
}

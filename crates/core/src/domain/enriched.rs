use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::record::{columns, DerivedMetrics, ProductRecord};
use crate::errors::UnknownViewError;

/// A degraded row: processed with neutral values in place of bad inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowWarning {
    /// Zero-based position in the input table.
    pub row: usize,
    pub product: String,
    pub message: String,
}

/// The output of one pipeline run, rows in input order. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnrichedTable {
    pub correlation_id: String,
    pub strategy: String,
    pub records: Vec<ProductRecord>,
    pub warnings: Vec<RowWarning>,
}

impl EnrichedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn degraded_rows(&self) -> usize {
        let mut rows: Vec<usize> = self.warnings.iter().map(|warning| warning.row).collect();
        rows.dedup();
        rows.len()
    }
}

const SIMPLE_COLUMNS: &[&str] = &[
    columns::PRODUCT,
    columns::CURRENT_PRICE,
    columns::COST,
    columns::CURRENT_STOCK,
    columns::SALES_30D,
    columns::COMPETITOR_PRICE,
    columns::HISTORY,
    columns::RECOMMENDATION,
];

const FULL_COLUMNS: &[&str] = &[
    columns::PRODUCT,
    columns::CURRENT_PRICE,
    columns::COST,
    columns::CURRENT_STOCK,
    columns::SALES_30D,
    columns::COMPETITOR_PRICE,
    columns::LOCATION,
    columns::PAST_PERIOD_SALES,
    columns::PRICE_HISTORY,
    columns::SALES_HISTORY,
    columns::SALES_VELOCITY,
    columns::STOCK_RUNWAY,
    columns::DISCOUNT_MARGIN,
    columns::COMPETITOR_GAP,
    columns::PS_UNITS,
    columns::PS_REVENUE,
    columns::SEASONAL_DEMAND_FACTOR,
    columns::IS_HOLIDAY_PERIOD,
    columns::HISTORY,
    columns::RECOMMENDATION,
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableView {
    #[default]
    Full,
    Simple,
}

impl TableView {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Simple => "simple",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Full => FULL_COLUMNS,
            Self::Simple => SIMPLE_COLUMNS,
        }
    }
}

impl FromStr for TableView {
    type Err = UnknownViewError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "simple" => Ok(Self::Simple),
            _ => Err(UnknownViewError { requested: value.to_string() }),
        }
    }
}

/// One output cell, typed so each codec can choose its own representation.
#[derive(Clone, Debug, PartialEq)]
pub enum ExportCell {
    Empty,
    Text(String),
    Number(Decimal),
    Integer(u64),
    Bool(bool),
    Sequence(Vec<Decimal>),
}

impl ProductRecord {
    /// The value of `column` for export. Unknown columns and derived columns
    /// of a record that was never enriched are empty.
    pub fn export_cell(&self, column: &str) -> ExportCell {
        let number = |value: Option<Decimal>| value.map_or(ExportCell::Empty, ExportCell::Number);
        let metrics = self.metrics.as_ref();
        let metric = |pick: fn(&DerivedMetrics) -> Decimal| {
            metrics.map_or(ExportCell::Empty, |metrics| ExportCell::Number(pick(metrics)))
        };

        match column {
            columns::PRODUCT => ExportCell::Text(self.product.clone()),
            columns::CURRENT_PRICE => number(self.current_price),
            columns::COST => number(self.cost),
            columns::CURRENT_STOCK => {
                self.current_stock.map_or(ExportCell::Empty, ExportCell::Integer)
            }
            columns::SALES_30D => number(self.sales_30d),
            columns::COMPETITOR_PRICE => number(self.competitor_price),
            columns::LOCATION => ExportCell::Text(self.location.clone()),
            columns::PAST_PERIOD_SALES => number(self.past_period_sales),
            columns::PRICE_HISTORY => ExportCell::Sequence(self.price_history.clone()),
            columns::SALES_HISTORY => ExportCell::Sequence(self.sales_history.clone()),
            columns::SALES_VELOCITY => metric(|m| m.sales_velocity),
            columns::STOCK_RUNWAY => number(metrics.and_then(|m| m.stock_runway)),
            columns::DISCOUNT_MARGIN => metric(|m| m.discount_margin),
            columns::COMPETITOR_GAP => metric(|m| m.competitor_gap),
            columns::PS_UNITS => metric(|m| m.ps_units),
            columns::PS_REVENUE => metric(|m| m.ps_revenue),
            columns::SEASONAL_DEMAND_FACTOR => metric(|m| m.seasonal_demand_factor),
            columns::IS_HOLIDAY_PERIOD => {
                metrics.map_or(ExportCell::Empty, |m| ExportCell::Bool(m.is_holiday_period))
            }
            columns::HISTORY => {
                metrics.map_or(ExportCell::Empty, |m| ExportCell::Text(m.history.clone()))
            }
            columns::RECOMMENDATION => {
                self.recommendation.clone().map_or(ExportCell::Empty, ExportCell::Text)
            }
            _ => ExportCell::Empty,
        }
    }
}

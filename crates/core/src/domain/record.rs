use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::table::{CellValue, RawRow};
use crate::history::parse_history;

pub mod columns {
    pub const PRODUCT: &str = "Product";
    pub const CURRENT_PRICE: &str = "Current_Price";
    pub const COST: &str = "Cost";
    pub const CURRENT_STOCK: &str = "Current_Stock";
    pub const SALES_30D: &str = "Sales_30d";
    pub const COMPETITOR_PRICE: &str = "Competitor_Price";
    pub const PRICE_HISTORY: &str = "Price_History";
    pub const SALES_HISTORY: &str = "Sales_History";
    pub const LOCATION: &str = "Location";
    pub const PAST_PERIOD_SALES: &str = "Past_Period_Sales";

    pub const SALES_VELOCITY: &str = "Sales_Velocity";
    pub const STOCK_RUNWAY: &str = "Stock_Runway";
    pub const DISCOUNT_MARGIN: &str = "Discount_Margin";
    pub const COMPETITOR_GAP: &str = "Competitor_Gap";
    pub const PS_UNITS: &str = "PS_units";
    pub const PS_REVENUE: &str = "PS_revenue";
    pub const SEASONAL_DEMAND_FACTOR: &str = "Seasonal_Demand_Factor";
    pub const IS_HOLIDAY_PERIOD: &str = "Is_Holiday_Period";
    pub const HISTORY: &str = "History";
    pub const RECOMMENDATION: &str = "Recommendation";

    pub const REQUIRED: [&str; 5] = [PRODUCT, CURRENT_PRICE, COST, CURRENT_STOCK, SALES_30D];
}

/// One product row, typed. Input fields are `None` when the cell was blank or
/// failed numeric coercion.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductRecord {
    pub product: String,
    pub current_price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub current_stock: Option<u64>,
    pub sales_30d: Option<Decimal>,
    pub competitor_price: Option<Decimal>,
    /// Chronological, most recent last. Never empty when `current_price` is known.
    pub price_history: Vec<Decimal>,
    pub sales_history: Vec<Decimal>,
    pub location: String,
    pub past_period_sales: Option<Decimal>,
    pub metrics: Option<DerivedMetrics>,
    pub recommendation: Option<String>,
}

/// Written by the metrics engine; never read back as input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DerivedMetrics {
    pub sales_velocity: Decimal,
    /// `None` when the stock level is unknown; no stock rule applies then.
    pub stock_runway: Option<Decimal>,
    pub discount_margin: Decimal,
    pub competitor_gap: Decimal,
    pub ps_units: Decimal,
    pub ps_revenue: Decimal,
    pub seasonal_demand_factor: Decimal,
    pub is_holiday_period: bool,
    pub history: String,
}

impl ProductRecord {
    /// A record with only the required fields set; optional fields are absent
    /// and histories are empty.
    pub fn new(
        product: impl Into<String>,
        current_price: Decimal,
        cost: Decimal,
        current_stock: u64,
        sales_30d: Decimal,
    ) -> Self {
        Self {
            product: product.into(),
            current_price: Some(current_price),
            cost: Some(cost),
            current_stock: Some(current_stock),
            sales_30d: Some(sales_30d),
            competitor_price: None,
            price_history: Vec::new(),
            sales_history: Vec::new(),
            location: crate::config::DEFAULT_REGION.to_string(),
            past_period_sales: None,
            metrics: None,
            recommendation: None,
        }
    }

    /// Builds the typed record from one raw row, parsing histories and applying
    /// the single-point history fallback. Returns the row-level warnings raised
    /// along the way; none of them are fatal.
    pub fn from_row(row: &RawRow, default_region: &str) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();

        let product = row.get(columns::PRODUCT).as_text().unwrap_or_else(|| {
            warnings.push(format!("{} is missing", columns::PRODUCT));
            String::new()
        });

        let current_price = required_amount(row, columns::CURRENT_PRICE, &mut warnings);
        let cost = required_amount(row, columns::COST, &mut warnings);
        let sales_30d = required_amount(row, columns::SALES_30D, &mut warnings);
        let current_stock = required_amount(row, columns::CURRENT_STOCK, &mut warnings)
            .and_then(|stock| whole_units(stock, &mut warnings));
        let competitor_price = optional_amount(row, columns::COMPETITOR_PRICE, &mut warnings);
        let past_period_sales = optional_amount(row, columns::PAST_PERIOD_SALES, &mut warnings);

        let mut price_history = history(row, columns::PRICE_HISTORY, &mut warnings);
        if price_history.is_empty() {
            price_history.extend(current_price);
        }
        let mut sales_history = history(row, columns::SALES_HISTORY, &mut warnings);
        if sales_history.is_empty() {
            sales_history.extend(sales_30d);
        }

        let location = row
            .get(columns::LOCATION)
            .as_text()
            .map(|code| code.to_ascii_uppercase())
            .unwrap_or_else(|| default_region.to_ascii_uppercase());

        let record = Self {
            product,
            current_price,
            cost,
            current_stock,
            sales_30d,
            competitor_price,
            price_history,
            sales_history,
            location,
            past_period_sales,
            metrics: None,
            recommendation: None,
        };
        (record, warnings)
    }
}

fn required_amount(row: &RawRow, column: &str, warnings: &mut Vec<String>) -> Option<Decimal> {
    let cell = row.get(column);
    if cell.is_empty() {
        warnings.push(format!("{column} is missing"));
        return None;
    }
    coerce_amount(cell, column, warnings)
}

fn optional_amount(row: &RawRow, column: &str, warnings: &mut Vec<String>) -> Option<Decimal> {
    let cell = row.get(column);
    if cell.is_empty() {
        return None;
    }
    coerce_amount(cell, column, warnings)
}

fn coerce_amount(cell: &CellValue, column: &str, warnings: &mut Vec<String>) -> Option<Decimal> {
    match cell.as_decimal() {
        Some(value) if value.is_sign_negative() && !value.is_zero() => {
            warnings.push(format!("{column} must not be negative, got `{cell}`"));
            None
        }
        Some(value) => Some(value),
        None => {
            warnings.push(format!("{column} `{cell}` is not a number"));
            None
        }
    }
}

fn whole_units(stock: Decimal, warnings: &mut Vec<String>) -> Option<u64> {
    let Some(units) = stock.trunc().to_u64() else {
        warnings.push(format!("{} `{stock}` is out of range", columns::CURRENT_STOCK));
        return None;
    };
    if !stock.fract().is_zero() {
        warnings.push(format!(
            "{} `{stock}` is not a whole number; truncated to {units}",
            columns::CURRENT_STOCK
        ));
    }
    Some(units)
}

fn history(row: &RawRow, column: &str, warnings: &mut Vec<String>) -> Vec<Decimal> {
    parse_history(row.get(column)).unwrap_or_else(|error| {
        warnings.push(format!("{column}: {error}; treated as empty"));
        Vec::new()
    })
}

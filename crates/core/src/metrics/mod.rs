//! Per-product metric formulas. Every function here is a pure function of its
//! arguments; degenerate inputs resolve to the neutral value documented on
//! each formula instead of failing.

pub mod guards;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use self::guards::{floor_nonzero, round_to, safe_ratio};
use crate::config::PipelineConfig;
use crate::domain::record::{DerivedMetrics, ProductRecord};
use crate::holiday::HolidayCalendar;

/// Replaces a zero sales velocity so runway never divides by zero.
pub const VELOCITY_FLOOR: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
pub const NO_HISTORY: &str = "No data";

const SALES_WINDOW_DAYS: Decimal = Decimal::from_parts(30, 0, 0, false, 0);
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Fixed date the holiday window starts at; configuration, not wall-clock time.
    pub reference_date: NaiveDate,
    pub calendar: HolidayCalendar,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl MetricsSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            reference_date: config.reference_date,
            calendar: HolidayCalendar::new(&config.default_region),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PriceSensitivity {
    pub units: Decimal,
    pub revenue: Decimal,
}

pub fn compute_metrics(record: &ProductRecord, settings: &MetricsSettings) -> DerivedMetrics {
    let velocity = sales_velocity(record.sales_30d);
    let sensitivity = price_sensitivity(&record.price_history, &record.sales_history);

    DerivedMetrics {
        sales_velocity: velocity,
        stock_runway: stock_runway(record.current_stock, velocity),
        discount_margin: discount_margin(record.current_price, record.cost),
        competitor_gap: competitor_gap(record.current_price, record.competitor_price),
        ps_units: sensitivity.units,
        ps_revenue: sensitivity.revenue,
        seasonal_demand_factor: seasonal_demand_factor(record.sales_30d, record.past_period_sales),
        is_holiday_period: settings
            .calendar
            .is_holiday_window(&record.location, settings.reference_date),
        history: format_history(&record.price_history, &record.sales_history),
    }
}

/// `Sales_30d / 30` to 2 places, floored to [`VELOCITY_FLOOR`] when zero or unknown.
pub fn sales_velocity(sales_30d: Option<Decimal>) -> Decimal {
    let per_day = sales_30d
        .and_then(|sales| safe_ratio(sales, SALES_WINDOW_DAYS))
        .map(|value| round_to(value, 2))
        .unwrap_or(Decimal::ZERO);
    floor_nonzero(per_day, VELOCITY_FLOOR)
}

/// Days of stock left at `velocity`, 1 place; `None` when stock is unknown.
pub fn stock_runway(current_stock: Option<u64>, velocity: Decimal) -> Option<Decimal> {
    let stock = Decimal::from(current_stock?);
    Some(safe_ratio(stock, velocity).map_or(Decimal::ZERO, |days| round_to(days, 1)))
}

/// Gross margin percentage at the current price, 1 place; `0` for a zero or unknown price.
pub fn discount_margin(current_price: Option<Decimal>, cost: Option<Decimal>) -> Decimal {
    let (Some(price), Some(cost)) = (current_price, cost) else {
        return Decimal::ZERO;
    };
    price
        .checked_sub(cost)
        .and_then(|margin| percentage(margin, price))
        .map(|pct| round_to(pct, 1))
        .unwrap_or(Decimal::ZERO)
}

/// Percentage above (positive) or below the competitor's price, 1 place;
/// `0` when there is no positive competitor price.
pub fn competitor_gap(
    current_price: Option<Decimal>,
    competitor_price: Option<Decimal>,
) -> Decimal {
    let (Some(price), Some(competitor)) = (current_price, competitor_price) else {
        return Decimal::ZERO;
    };
    if competitor <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    price
        .checked_sub(competitor)
        .and_then(|gap| percentage(gap, competitor))
        .map(|pct| round_to(pct, 1))
        .unwrap_or(Decimal::ZERO)
}

/// Slopes of unit sales and of revenue over the most recent price change,
/// unrounded. Zero when either history has fewer than two points or the last
/// two prices are equal.
pub fn price_sensitivity(
    price_history: &[Decimal],
    sales_history: &[Decimal],
) -> PriceSensitivity {
    let (Some((last_price, prev_price)), Some((last_sales, prev_sales))) =
        (last_two(price_history), last_two(sales_history))
    else {
        return PriceSensitivity::default();
    };

    let Some(price_change) = last_price.checked_sub(prev_price) else {
        return PriceSensitivity::default();
    };

    let units = last_sales
        .checked_sub(prev_sales)
        .and_then(|change| safe_ratio(change, price_change))
        .unwrap_or(Decimal::ZERO);

    let revenue = last_sales
        .checked_mul(last_price)
        .zip(prev_sales.checked_mul(prev_price))
        .and_then(|(last_revenue, prev_revenue)| last_revenue.checked_sub(prev_revenue))
        .and_then(|change| safe_ratio(change, price_change))
        .unwrap_or(Decimal::ZERO);

    PriceSensitivity { units, revenue }
}

/// `Sales_30d / Past_Period_Sales`, 2 places; `1` without a positive past period.
pub fn seasonal_demand_factor(
    sales_30d: Option<Decimal>,
    past_period_sales: Option<Decimal>,
) -> Decimal {
    match (sales_30d, past_period_sales) {
        (Some(sales), Some(past)) if past > Decimal::ZERO => {
            safe_ratio(sales, past).map(|factor| round_to(factor, 2)).unwrap_or(Decimal::ONE)
        }
        _ => Decimal::ONE,
    }
}

/// `"Price {p} - {s} units."` per history point, joined by `", "`; [`NO_HISTORY`]
/// when either side is empty or the lengths differ.
pub fn format_history(price_history: &[Decimal], sales_history: &[Decimal]) -> String {
    if price_history.is_empty() || price_history.len() != sales_history.len() {
        return NO_HISTORY.to_string();
    }

    price_history
        .iter()
        .zip(sales_history)
        .map(|(price, sales)| {
            format!("Price {} - {} units.", round_to(*price, 0), round_to(*sales, 0))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn last_two(values: &[Decimal]) -> Option<(Decimal, Decimal)> {
    match values {
        [.., prev, last] => Some((*last, *prev)),
        _ => None,
    }
}

fn percentage(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    safe_ratio(numerator, denominator)?.checked_mul(HUNDRED)
}

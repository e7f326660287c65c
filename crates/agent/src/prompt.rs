use pricepromo_core::domain::record::{DerivedMetrics, ProductRecord};
use pricepromo_core::metrics::guards::round_to;
use rust_decimal::Decimal;

const NOT_AVAILABLE: &str = "N/A";

/// Builds the per-product prompt. Only this product's inputs and derived
/// metrics are included.
pub fn build_prompt(record: &ProductRecord, metrics: &DerivedMetrics) -> String {
    let holiday = if metrics.is_holiday_period { "yes" } else { "no" };

    format!(
        "For the product \"{product}\":\n\
         - Price: {price} | Cost: {cost}\n\
         - Stock: {stock} | Sales over 30 days: {sales}\n\
         - Competitor price: {competitor}\n\
         - History: {history}\n\
         - Sales velocity: {velocity} units/day\n\
         - Stock runway: {runway} days\n\
         - Price sensitivity (units): {ps_units}\n\
         - Holiday ahead: {holiday}\n\
         \n\
         Suggest a promotion in exactly this format:\n\
         Analysis: [1-2 sentences about the current situation]\n\
         Recommendation: [a concrete action]\n\
         Expected effect: [the expected result]",
        product = record.product,
        price = amount(record.current_price),
        cost = amount(record.cost),
        stock = record.current_stock.map_or_else(|| NOT_AVAILABLE.to_string(), |s| s.to_string()),
        sales = amount(record.sales_30d),
        competitor = amount(record.competitor_price),
        history = metrics.history,
        velocity = metrics.sales_velocity.normalize(),
        runway = amount(metrics.stock_runway),
        ps_units = round_to(metrics.ps_units, 3).normalize(),
    )
}

fn amount(value: Option<Decimal>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |value| value.normalize().to_string())
}

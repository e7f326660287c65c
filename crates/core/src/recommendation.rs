//! The recommendation seam and its always-available rule-based variant.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::record::{DerivedMetrics, ProductRecord};
use crate::metrics::guards::round_to;

pub const EXCESS_RUNWAY_DAYS: Decimal = Decimal::from_parts(60, 0, 0, false, 0);
pub const LOW_RUNWAY_DAYS: Decimal = Decimal::from_parts(15, 0, 0, false, 0);
/// `PS_units` below this counts as price-sensitive demand.
pub const PRICE_SENSITIVE_BELOW: Decimal = Decimal::from_parts(1, 0, 0, true, 1);

/// Produces the textual recommendation for one product whose metrics are known.
#[async_trait]
pub trait Recommender: Send + Sync {
    fn name(&self) -> &'static str;

    async fn recommend(&self, record: &ProductRecord, metrics: &DerivedMetrics) -> String;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleBranch {
    ExcessStock,
    LowStock,
    UpcomingHoliday,
    Stable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub branch: RuleBranch,
    pub analysis: String,
    pub action: String,
    pub effect: String,
}

impl Recommendation {
    /// The fixed three-line form.
    pub fn render(&self) -> String {
        format!(
            "Analysis: {}\nRecommendation: {}\nExpected effect: {}",
            self.analysis, self.action, self.effect
        )
    }
}

/// First matching rule wins, in this order: excess price-sensitive stock, low
/// stock, upcoming holiday, stable. Neither stock rule matches an unknown runway.
pub fn select_branch(metrics: &DerivedMetrics) -> RuleBranch {
    let runway = metrics.stock_runway;
    if runway.is_some_and(|days| days > EXCESS_RUNWAY_DAYS)
        && metrics.ps_units < PRICE_SENSITIVE_BELOW
    {
        RuleBranch::ExcessStock
    } else if runway.is_some_and(|days| days < LOW_RUNWAY_DAYS) {
        RuleBranch::LowStock
    } else if metrics.is_holiday_period {
        RuleBranch::UpcomingHoliday
    } else {
        RuleBranch::Stable
    }
}

pub fn rule_based_recommendation(metrics: &DerivedMetrics) -> Recommendation {
    let branch = select_branch(metrics);
    let runway = metrics.stock_runway.unwrap_or_default().normalize();

    let (analysis, action, effect) = match branch {
        RuleBranch::ExcessStock => (
            format!(
                "Excess stock: {runway} days of runway and price-sensitive demand (PS_units {}).",
                round_to(metrics.ps_units, 3).normalize()
            ),
            "Run a 15% discount promotion.".to_string(),
            "Faster sell-through of surplus stock and lower holding costs.".to_string(),
        ),
        RuleBranch::LowStock => (
            format!(
                "Low stock: {runway} days of runway at {} units per day.",
                metrics.sales_velocity.normalize()
            ),
            "Raise the price by 10%.".to_string(),
            "Higher margin per unit while the remaining stock lasts longer.".to_string(),
        ),
        RuleBranch::UpcomingHoliday => (
            "Upcoming holiday: a public holiday falls within the next 8 days.".to_string(),
            "Run a 10% holiday discount.".to_string(),
            "Holiday demand captured and higher sales volume.".to_string(),
        ),
        RuleBranch::Stable => (
            match metrics.stock_runway {
                Some(_) => format!("Stable: {runway} days of runway and no holiday ahead."),
                None => "Stable: stock level unknown and no holiday ahead.".to_string(),
            },
            "Hold the current price.".to_string(),
            "Steady sales and margin.".to_string(),
        ),
    };

    Recommendation { branch, analysis, action, effect }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RuleBasedRecommender;

#[async_trait]
impl Recommender for RuleBasedRecommender {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn recommend(&self, _record: &ProductRecord, metrics: &DerivedMetrics) -> String {
        rule_based_recommendation(metrics).render()
    }
}

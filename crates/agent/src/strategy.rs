//! LLM-backed recommendations and the once-per-run strategy selection.

use std::time::Duration;

use async_trait::async_trait;
use pricepromo_core::config::LlmConfig;
use pricepromo_core::domain::record::{DerivedMetrics, ProductRecord};
use pricepromo_core::recommendation::{Recommender, RuleBasedRecommender};
use secrecy::SecretString;
use tracing::{info, warn};

use crate::llm::{CompletionRequest, LlmClient, LlmError, OpenAiClient};
use crate::prompt::build_prompt;

/// Asks the completion service for each product; any failure for a row
/// yields the rule-based text for that row instead.
pub struct LlmRecommender<C> {
    client: C,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    secret: Option<SecretString>,
    fallback: RuleBasedRecommender,
}

impl<C: LlmClient> LlmRecommender<C> {
    pub fn new(client: C, model: impl Into<String>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
            timeout,
            secret: None,
            fallback: RuleBasedRecommender,
        }
    }

    /// Registers the credential so it can be scrubbed from logged errors.
    pub fn with_secret(mut self, secret: SecretString) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn ask(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.client.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl<C: LlmClient> Recommender for LlmRecommender<C> {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn recommend(&self, record: &ProductRecord, metrics: &DerivedMetrics) -> String {
        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: build_prompt(record, metrics),
            max_tokens: self.max_tokens,
        };

        match self.ask(&request).await {
            Ok(text) => text,
            Err(error) => {
                warn!(
                    event_name = "recommendation.llm.fallback",
                    product = %record.product,
                    error = %error.redacted(self.secret.as_ref()),
                    "completion failed; using rule-based recommendation"
                );
                self.fallback.recommend(record, metrics).await
            }
        }
    }
}

/// The two recommendation variants. Chosen once when a run starts.
pub enum RecommendationStrategy<C = OpenAiClient> {
    RuleBased(RuleBasedRecommender),
    LlmBacked(LlmRecommender<C>),
}

impl RecommendationStrategy<OpenAiClient> {
    /// LLM-backed when a non-blank credential is configured, rule-based otherwise.
    pub fn from_config(config: &LlmConfig) -> Self {
        match OpenAiClient::from_config(config) {
            Ok(Some(client)) => {
                let secret = client.api_key().clone();
                info!(
                    event_name = "recommendation.strategy.selected",
                    strategy = "llm",
                    model = %config.model,
                    "LLM credential configured"
                );
                Self::LlmBacked(
                    LlmRecommender::new(
                        client,
                        config.model.clone(),
                        config.max_tokens,
                        Duration::from_secs(config.timeout_secs),
                    )
                    .with_secret(secret),
                )
            }
            Ok(None) => {
                warn!(
                    event_name = "recommendation.strategy.selected",
                    strategy = "rule_based",
                    "no LLM credential configured; using rule-based recommendations"
                );
                Self::RuleBased(RuleBasedRecommender)
            }
            Err(error) => {
                warn!(
                    event_name = "recommendation.strategy.selected",
                    strategy = "rule_based",
                    error = %error.redacted(config.credential()),
                    "LLM client could not be built; using rule-based recommendations"
                );
                Self::RuleBased(RuleBasedRecommender)
            }
        }
    }
}

impl<C> RecommendationStrategy<C> {
    pub fn is_llm_backed(&self) -> bool {
        matches!(self, Self::LlmBacked(_))
    }
}

#[async_trait]
impl<C: LlmClient> Recommender for RecommendationStrategy<C> {
    fn name(&self) -> &'static str {
        match self {
            Self::RuleBased(recommender) => recommender.name(),
            Self::LlmBacked(recommender) => recommender.name(),
        }
    }

    async fn recommend(&self, record: &ProductRecord, metrics: &DerivedMetrics) -> String {
        match self {
            Self::RuleBased(recommender) => recommender.recommend(record, metrics).await,
            Self::LlmBacked(recommender) => recommender.recommend(record, metrics).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use pricepromo_core::config::LlmConfig;
    use pricepromo_core::domain::record::{columns, DerivedMetrics, ProductRecord};
    use pricepromo_core::domain::table::{CellValue, RawRow, RawTable};
    use pricepromo_core::metrics::MetricsSettings;
    use pricepromo_core::pipeline::PricingPipeline;
    use pricepromo_core::recommendation::{rule_based_recommendation, Recommender};
    use rust_decimal::Decimal;
    use secrecy::SecretString;

    use super::{LlmRecommender, RecommendationStrategy};
    use crate::llm::{CompletionRequest, LlmClient, LlmError};

    struct CannedClient {
        reply: Result<String, LlmError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    struct StalledClient;

    /// Stalls only for prompts naming `slow_product`; answers every other one.
    struct SelectiveClient {
        slow_product: &'static str,
    }

    #[async_trait]
    impl LlmClient for SelectiveClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
            if request.prompt.contains(&format!("\"{}\"", self.slow_product)) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok("Analysis: a\nRecommendation: b\nExpected effect: c".to_string())
        }
    }

    #[async_trait]
    impl LlmClient for StalledClient {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    fn fixture() -> (ProductRecord, DerivedMetrics) {
        let record =
            ProductRecord::new("Tea", Decimal::from(10), Decimal::from(6), 20, Decimal::from(60));
        let metrics = DerivedMetrics {
            sales_velocity: Decimal::from(2),
            stock_runway: Some(Decimal::from(10)),
            discount_margin: Decimal::from(40),
            competitor_gap: Decimal::ZERO,
            ps_units: Decimal::ZERO,
            ps_revenue: Decimal::ZERO,
            seasonal_demand_factor: Decimal::ONE,
            is_holiday_period: false,
            history: "Price 10 - 60 units.".to_string(),
        };
        (record, metrics)
    }

    fn canned(reply: Result<String, LlmError>) -> CannedClient {
        CannedClient { reply, calls: AtomicUsize::new(0) }
    }

    #[tokio::test]
    async fn successful_completion_is_used_verbatim() {
        let (record, metrics) = fixture();
        let recommender = LlmRecommender::new(
            canned(Ok("Analysis: a\nRecommendation: b\nExpected effect: c".to_string())),
            "gpt-3.5-turbo",
            150,
            Duration::from_secs(10),
        );

        let text = recommender.recommend(&record, &metrics).await;

        assert_eq!(text, "Analysis: a\nRecommendation: b\nExpected effect: c");
        assert_eq!(recommender.client().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn service_errors_fall_back_to_rule_based() {
        let (record, metrics) = fixture();
        let errors = [
            LlmError::Transport("connection refused".to_string()),
            LlmError::Status { status: 500, body: "oops".to_string() },
            LlmError::MalformedResponse("missing choices".to_string()),
        ];

        for error in errors {
            let recommender =
                LlmRecommender::new(canned(Err(error)), "m", 150, Duration::from_secs(10))
                    .with_secret(SecretString::from("sk-secret".to_string()));

            let text = recommender.recommend(&record, &metrics).await;

            assert_eq!(text, rule_based_recommendation(&metrics).render());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_calls_time_out_into_rule_based() {
        let (record, metrics) = fixture();
        let recommender = LlmRecommender::new(StalledClient, "m", 150, Duration::from_secs(10));

        let text = recommender.recommend(&record, &metrics).await;

        assert_eq!(text, rule_based_recommendation(&metrics).render());
    }

    #[tokio::test(start_paused = true)]
    async fn one_timed_out_row_leaves_the_rest_of_the_batch_intact() {
        let table = RawTable::new(
            columns::REQUIRED.iter().map(|column| (*column).to_string()).collect(),
            ["Tea", "Coffee", "Cocoa"]
                .into_iter()
                .map(|product| {
                    RawRow::new()
                        .with(columns::PRODUCT, CellValue::text(product))
                        .with(columns::CURRENT_PRICE, CellValue::text("10"))
                        .with(columns::COST, CellValue::text("6"))
                        .with(columns::CURRENT_STOCK, CellValue::text("20"))
                        .with(columns::SALES_30D, CellValue::text("60"))
                })
                .collect(),
        );
        let strategy = RecommendationStrategy::LlmBacked(LlmRecommender::new(
            SelectiveClient { slow_product: "Coffee" },
            "m",
            150,
            Duration::from_secs(10),
        ));
        let pipeline = PricingPipeline::new(MetricsSettings::default(), strategy);

        let enriched = pipeline.process(&table).await.unwrap();

        assert_eq!(enriched.strategy, "llm");
        let texts: Vec<&str> = enriched
            .records
            .iter()
            .map(|record| record.recommendation.as_deref().unwrap())
            .collect();
        let coffee = enriched.records[1].metrics.as_ref().unwrap();
        assert_eq!(texts[0], "Analysis: a\nRecommendation: b\nExpected effect: c");
        assert_eq!(texts[1], rule_based_recommendation(coffee).render());
        assert_eq!(texts[2], "Analysis: a\nRecommendation: b\nExpected effect: c");
    }

    #[tokio::test]
    async fn missing_or_blank_credential_selects_rule_based() {
        let mut config = LlmConfig {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 10,
            max_tokens: 150,
        };
        assert!(!RecommendationStrategy::from_config(&config).is_llm_backed());

        config.api_key = Some(SecretString::from("   ".to_string()));
        let strategy = RecommendationStrategy::from_config(&config);
        assert!(!strategy.is_llm_backed());
        assert_eq!(strategy.name(), "rule_based");
    }

    #[tokio::test]
    async fn configured_credential_selects_llm_backed() {
        let config = LlmConfig {
            api_key: Some(SecretString::from("sk-test".to_string())),
            base_url: "http://127.0.0.1:9".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 1,
            max_tokens: 150,
        };

        let strategy = RecommendationStrategy::from_config(&config);

        assert!(strategy.is_llm_backed());
        assert_eq!(strategy.name(), "llm");
    }
}

//! Drives one raw table through record parsing, metrics and recommendation.

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::enriched::{EnrichedTable, RowWarning};
use crate::domain::record::{columns, ProductRecord};
use crate::domain::table::RawTable;
use crate::errors::{MissingColumnError, PipelineError};
use crate::metrics::{compute_metrics, MetricsSettings};
use crate::recommendation::Recommender;

pub struct PricingPipeline<R> {
    settings: MetricsSettings,
    recommender: R,
}

impl<R: Recommender> PricingPipeline<R> {
    pub fn new(settings: MetricsSettings, recommender: R) -> Self {
        Self { settings, recommender }
    }

    pub fn settings(&self) -> &MetricsSettings {
        &self.settings
    }

    pub fn recommender(&self) -> &R {
        &self.recommender
    }

    /// Processes `raw` under a fresh correlation id.
    pub async fn process(&self, raw: &RawTable) -> Result<EnrichedTable, PipelineError> {
        self.process_with_id(raw, Uuid::new_v4().to_string()).await
    }

    /// Fails before any row work if required columns are absent; otherwise
    /// every input row yields exactly one enriched record, in input order.
    pub async fn process_with_id(
        &self,
        raw: &RawTable,
        correlation_id: String,
    ) -> Result<EnrichedTable, PipelineError> {
        let missing = raw.missing_columns(&columns::REQUIRED);
        if !missing.is_empty() {
            warn!(
                event_name = "pipeline.run.rejected",
                correlation_id = %correlation_id,
                missing = %missing.join(","),
                "input table is missing required columns"
            );
            return Err(MissingColumnError { columns: missing }.into());
        }

        info!(
            event_name = "pipeline.run.started",
            correlation_id = %correlation_id,
            rows = raw.rows.len(),
            strategy = self.recommender.name(),
            "pricing pipeline run started"
        );

        let default_region = self.settings.calendar.fallback().code();
        let mut records = Vec::with_capacity(raw.rows.len());
        let mut warnings = Vec::new();

        for (index, row) in raw.rows.iter().enumerate() {
            let (mut record, row_warnings) = ProductRecord::from_row(row, default_region);
            for message in row_warnings {
                warn!(
                    event_name = "pipeline.row.degraded",
                    correlation_id = %correlation_id,
                    row = index,
                    product = %record.product,
                    reason = %message,
                    "row processed with neutral values"
                );
                warnings.push(RowWarning { row: index, product: record.product.clone(), message });
            }

            let metrics = compute_metrics(&record, &self.settings);
            let recommendation = self.recommender.recommend(&record, &metrics).await;
            record.metrics = Some(metrics);
            record.recommendation = Some(recommendation);
            records.push(record);
        }

        info!(
            event_name = "pipeline.run.completed",
            correlation_id = %correlation_id,
            rows = records.len(),
            degraded = warnings.len(),
            "pricing pipeline run completed"
        );

        Ok(EnrichedTable {
            correlation_id,
            strategy: self.recommender.name().to_string(),
            records,
            warnings,
        })
    }
}

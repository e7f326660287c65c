pub mod codec;
pub mod config;
pub mod domain;
pub mod errors;
pub mod history;
pub mod holiday;
pub mod metrics;
pub mod pipeline;
pub mod recommendation;
pub mod snapshot;

pub use codec::{decode_table, encode_table, json_rows, TableFormat};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::enriched::{EnrichedTable, ExportCell, RowWarning, TableView};
pub use domain::record::{DerivedMetrics, ProductRecord};
pub use domain::table::{CellValue, RawRow, RawTable};
pub use errors::{
    HistoryParseError, InterfaceError, MissingColumnError, NoDataError, PipelineError, TableError,
    UnknownViewError, UnsupportedFormatError,
};
pub use holiday::{is_holiday_window, HolidayCalendar, HolidayLookupError, Region};
pub use metrics::{compute_metrics, MetricsSettings};
pub use pipeline::PricingPipeline;
pub use recommendation::{Recommender, RuleBasedRecommender, RuleBranch};
pub use snapshot::SnapshotStore;

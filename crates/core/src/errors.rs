use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("missing required columns: {}", columns.join(", "))]
pub struct MissingColumnError {
    pub columns: Vec<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("could not parse history value `{raw}`")]
pub struct HistoryParseError {
    pub raw: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unsupported format `{requested}` (expected {supported})")]
pub struct UnsupportedFormatError {
    pub requested: String,
    pub supported: &'static str,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown view `{requested}` (expected full|simple)")]
pub struct UnknownViewError {
    pub requested: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("no processed dataset is available; upload a product file first")]
pub struct NoDataError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormatError),
    #[error("could not decode {format} input: {message}")]
    Decode { format: &'static str, message: String },
    #[error("could not encode {format} output: {message}")]
    Encode { format: &'static str, message: String },
    #[error("input table has a header but no data rows")]
    Empty,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    MissingColumns(#[from] MissingColumnError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    NoData(#[from] NoDataError),
}

impl From<UnsupportedFormatError> for PipelineError {
    fn from(value: UnsupportedFormatError) -> Self {
        Self::Table(TableError::UnsupportedFormat(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unsupported media: {message}")]
    UnsupportedMedia { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The uploaded table could not be processed. Check the listed columns and try again."
            }
            Self::UnsupportedMedia { .. } => {
                "The requested file format is not supported. Use csv, xlsx or json."
            }
            Self::NotFound { .. } => "No processed dataset is available. Upload a file first.",
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::UnsupportedMedia { message, .. }
            | Self::NotFound { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::UnsupportedMedia { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl PipelineError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::UnsupportedMedia { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<PipelineError> for InterfaceError {
    fn from(value: PipelineError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            PipelineError::MissingColumns(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            PipelineError::Table(TableError::UnsupportedFormat(error)) => {
                Self::UnsupportedMedia { message: error.to_string(), correlation_id }
            }
            PipelineError::Table(error @ (TableError::Decode { .. } | TableError::Empty)) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            PipelineError::Table(error @ TableError::Encode { .. }) => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
            PipelineError::NoData(error) => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{
        InterfaceError, MissingColumnError, NoDataError, PipelineError, TableError,
        UnsupportedFormatError,
    };

    #[test]
    fn missing_columns_are_listed_in_the_message() {
        let error = MissingColumnError { columns: vec!["Cost".to_owned(), "Sales_30d".to_owned()] };

        assert_eq!(error.to_string(), "missing required columns: Cost, Sales_30d");
    }

    #[test]
    fn missing_columns_map_to_bad_request_with_column_detail() {
        let interface = PipelineError::from(MissingColumnError { columns: vec!["Cost".to_owned()] })
            .into_interface("run-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, ref message }
                if correlation_id == "run-1" && message.contains("Cost")
        ));
    }

    #[test]
    fn unsupported_format_maps_to_unsupported_media() {
        let interface = PipelineError::from(UnsupportedFormatError {
            requested: "parquet".to_owned(),
            supported: "csv|xlsx|json",
        })
        .into_interface("run-2");

        assert!(matches!(interface, InterfaceError::UnsupportedMedia { .. }));
        assert!(interface.message().contains("parquet"));
        assert_eq!(
            interface.user_message(),
            "The requested file format is not supported. Use csv, xlsx or json."
        );
    }

    #[test]
    fn no_data_maps_to_not_found() {
        let interface = PipelineError::from(NoDataError).into_interface("run-3");

        assert!(matches!(interface, InterfaceError::NotFound { .. }));
        assert_eq!(interface.correlation_id(), "run-3");
    }

    #[test]
    fn encode_failures_map_to_internal() {
        let interface = PipelineError::from(TableError::Encode {
            format: "xlsx",
            message: "sheet too large".to_owned(),
        })
        .into_interface("run-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}

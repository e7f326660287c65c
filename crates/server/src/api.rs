//! Upload, query and export endpoints over the latest processed dataset.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pricepromo_agent::RecommendationStrategy;
use pricepromo_core::domain::enriched::{RowWarning, TableView};
use pricepromo_core::errors::{InterfaceError, PipelineError};
use pricepromo_core::metrics::MetricsSettings;
use pricepromo_core::pipeline::PricingPipeline;
use pricepromo_core::{decode_table, encode_table, json_rows, TableFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bootstrap::AppState;

const FILE_FIELD: &str = "file";

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.server.max_upload_bytes;
    Router::new()
        .route("/api/v1/upload", post(upload))
        .route("/api/v1/data", get(data))
        .route("/api/v1/export/{format}", get(export))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub view: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub correlation_id: String,
    pub file_name: Option<String>,
    pub format: TableFormat,
    pub rows: usize,
    pub degraded_rows: usize,
    pub strategy: String,
    pub warnings: Vec<RowWarning>,
}

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub correlation_id: String,
    pub view: TableView,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub correlation_id: String,
}

/// Maps the interface taxonomy onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::UnsupportedMedia { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(
                event_name = "server.request.failed",
                correlation_id = %self.0.correlation_id(),
                error = %self.0,
                "request failed"
            );
        } else {
            warn!(
                event_name = "server.request.rejected",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "request rejected"
            );
        }

        let detail = match &self.0 {
            InterfaceError::Internal { .. } => None,
            other => Some(other.message().to_string()),
        };
        let body = ErrorBody {
            error: self.0.user_message(),
            detail,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>, correlation_id: &str) -> ApiError {
    ApiError(InterfaceError::BadRequest {
        message: message.into(),
        correlation_id: correlation_id.to_string(),
    })
}

fn parse_view(query: &ViewQuery, correlation_id: &str) -> Result<TableView, ApiError> {
    match query.view.as_deref() {
        None => Ok(TableView::Full),
        Some(view) => view.parse().map_err(|error| bad_request(format!("{error}"), correlation_id)),
    }
}

struct UploadedFile {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile, String> {
    while let Some(field) = multipart.next_field().await.map_err(|error| error.body_text())? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|error| error.body_text())?;
        return Ok(UploadedFile { file_name, bytes: bytes.to_vec() });
    }
    Err(format!("multipart form has no `{FILE_FIELD}` part"))
}

pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let file = read_file_field(&mut multipart)
        .await
        .map_err(|message| bad_request(message, &correlation_id))?;

    let format = match (query.format.as_deref(), file.file_name.as_deref()) {
        (Some(format), _) => format.parse(),
        (None, Some(name)) => TableFormat::from_path(name),
        (None, None) => "".parse(),
    }
    .map_err(|error| PipelineError::from(error).into_interface(&correlation_id))?;

    let _run = state.upload_lock.lock().await;

    let raw = decode_table(&file.bytes, format)
        .map_err(|error| PipelineError::from(error).into_interface(&correlation_id))?;

    let strategy = RecommendationStrategy::from_config(&state.config.llm);
    let pipeline =
        PricingPipeline::new(MetricsSettings::from_config(&state.config.pipeline), strategy);
    let enriched = pipeline
        .process_with_id(&raw, correlation_id.clone())
        .await
        .map_err(|error| error.into_interface(&correlation_id))?;

    let table = state.store.replace(enriched);
    info!(
        event_name = "server.upload.accepted",
        correlation_id = %correlation_id,
        format = %format,
        rows = table.len(),
        degraded_rows = table.degraded_rows(),
        "upload processed and published"
    );

    Ok(Json(UploadResponse {
        correlation_id,
        file_name: file.file_name,
        format,
        rows: table.len(),
        degraded_rows: table.degraded_rows(),
        strategy: table.strategy.clone(),
        warnings: table.warnings.clone(),
    }))
}

pub async fn data(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<DataResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let view = parse_view(&query, &correlation_id)?;
    let table = state
        .store
        .require_latest()
        .map_err(|error| PipelineError::from(error).into_interface(&correlation_id))?;

    Ok(Json(DataResponse {
        correlation_id: table.correlation_id.clone(),
        view,
        columns: view.columns().to_vec(),
        rows: json_rows(&table, view),
    }))
}

pub async fn export(
    State(state): State<AppState>,
    Path(format): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<Response, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let format: TableFormat = format
        .parse()
        .map_err(|error| PipelineError::from(error).into_interface(&correlation_id))?;
    let view = parse_view(&query, &correlation_id)?;
    let table = state
        .store
        .require_latest()
        .map_err(|error| PipelineError::from(error).into_interface(&correlation_id))?;

    let bytes = encode_table(&table, view, format)
        .map_err(|error| PipelineError::from(error).into_interface(&correlation_id))?;

    info!(
        event_name = "server.export.completed",
        correlation_id = %table.correlation_id,
        format = %format,
        view = view.as_str(),
        bytes = bytes.len(),
        "dataset exported"
    );

    let disposition = format!("attachment; filename=\"pricepromo_{}.{}\"", view.as_str(), format);
    let headers = [
        (header::CONTENT_TYPE, format.content_type().to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
        Router,
    };
    use pricepromo_core::config::AppConfig;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::router;
    use crate::bootstrap::AppState;

    const BOUNDARY: &str = "pricepromo-test-boundary";
    const PRODUCTS: &str = "\
Product,Current_Price,Cost,Current_Stock,Sales_30d,Competitor_Price
Green tea,12,8,800,60,10
Coffee,20,15,30,90,
";

    fn app() -> (Router, AppState) {
        let state = AppState::new(AppConfig::default());
        (router(state.clone()), state)
    }

    fn upload_request(uri: &str, file_name: &str, contents: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {contents}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn queries_before_any_upload_are_not_found() {
        let (app, _) = app();

        let response = app.clone().oneshot(get("/api/v1/data")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get("/api/v1/export/csv")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_missing_columns_is_a_bad_request_naming_them() {
        let (app, state) = app();
        let contents = "Product,Current_Price,Current_Stock\nTea,10,20\n";

        let response =
            app.oneshot(upload_request("/api/v1/upload", "products.csv", contents)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.contains("Cost") && detail.contains("Sales_30d"), "{detail}");
        assert!(state.store.latest().is_none());
    }

    #[tokio::test]
    async fn upload_with_unsupported_extension_is_rejected() {
        let (app, _) = app();

        let response =
            app.oneshot(upload_request("/api/v1/upload", "products.xls", PRODUCTS)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body = json_body(response).await;
        assert!(body["detail"].as_str().unwrap().contains("csv|xlsx|json"));
    }

    #[tokio::test]
    async fn uploaded_dataset_is_queryable_and_exportable() {
        let (app, _) = app();

        let response = app
            .clone()
            .oneshot(upload_request("/api/v1/upload", "products.csv", PRODUCTS))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let uploaded = json_body(response).await;
        assert_eq!(uploaded["rows"], 2);
        assert_eq!(uploaded["strategy"], "rule_based");

        let response = app.clone().oneshot(get("/api/v1/data?view=simple")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let data = json_body(response).await;
        assert_eq!(data["correlation_id"], uploaded["correlation_id"]);
        assert_eq!(data["columns"].as_array().unwrap().len(), 8);
        assert_eq!(data["rows"][0]["Product"], "Green tea");
        assert!(data["rows"][1]["Recommendation"].as_str().unwrap().contains("10%"));

        let response = app.clone().oneshot(get("/api/v1/export/csv?view=full")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        let csv = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&csv).starts_with("Product,Current_Price,Cost"));

        let response = app.clone().oneshot(get("/api/v1/export/pdf")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = app.oneshot(get("/api/v1/data?view=compact")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn format_query_parameter_overrides_the_file_name() {
        let (app, _) = app();

        let response = app
            .oneshot(upload_request("/api/v1/upload?format=csv", "products.txt", PRODUCTS))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}

use crate::config::{Config, ExtractionConfig};
use crate::engines::{EngineInfo, EngineRegistry};
use crate::error::ExtractError;
use crate::extractors::{
    NativeTextExtractor, OpticalTextSource, RasterOcrExtractor, UnavailableOcr,
};
use crate::orchestrator::ExtractionOrchestrator;
use crate::preprocessing::{Pipeline, Preset};
use crate::record::ExtractionResult;
use crate::registry::ParserRegistry;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::Method,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ExtractionOrchestrator>,
    pub engines: Arc<Vec<EngineInfo>>,
    pub config: Arc<Config>,
}

/// Extraction response: the result plus request bookkeeping
#[derive(Serialize)]
pub struct ExtractResponse {
    pub filename: String,
    #[serde(flatten)]
    pub result: ExtractionResult,
    pub processing_time_ms: u64,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub parsers: Vec<&'static str>,
    pub ocr_available: bool,
    pub ocr_engine: Option<String>,
    pub available_engines: Vec<EngineInfo>,
    pub preprocess: Preset,
    pub thresholds: ExtractionConfig,
    pub max_file_size_bytes: usize,
    pub extraction_timeout_secs: u64,
}

impl AppState {
    /// Start the OCR engines (unless disabled) and build the orchestrator.
    /// Blocking: engines may download their models on first run.
    pub fn initialize(config: Config) -> Self {
        let (optical, engines): (Box<dyn OpticalTextSource>, Vec<EngineInfo>) =
            if config.disable_ocr {
                tracing::info!("OCR disabled by configuration");
                (Box::new(UnavailableOcr) as Box<dyn OpticalTextSource>, Vec::new())
            } else {
                let ocr = config.ocr();
                let registry = EngineRegistry::new(&ocr);
                let engines = registry.info();
                let pipeline = Pipeline::new(ocr.preprocess);
                (RasterOcrExtractor::from_registry(&registry, pipeline), engines)
            };

        let orchestrator = ExtractionOrchestrator::new(
            Box::new(NativeTextExtractor),
            optical,
            ParserRegistry::with_defaults(),
            config.extraction(),
        );
        Self::new(orchestrator, engines, config)
    }

    pub fn new(
        orchestrator: ExtractionOrchestrator,
        engines: Vec<EngineInfo>,
        config: Config,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            engines: Arc::new(engines),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size.saturating_add(MULTIPART_OVERHEAD);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST]);

    Router::new()
        .route("/extract", post(handle_extract))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = tokio::task::spawn_blocking(move || AppState::initialize(config)).await?;

    tracing::info!(
        parsers = ?state.orchestrator.registry().names(),
        ocr_engine = state.orchestrator.ocr_engine().unwrap_or("none"),
        "Extraction engine ready"
    );

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Handle extraction requests
async fn handle_extract(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>, ExtractError> {
    let start = Instant::now();

    let mut file_data: Option<Bytes> = None;
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ExtractError::InvalidRequest(format!("Failed to parse multipart: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        filename = field.file_name().map(str::to_string);
        content_type = field.content_type().map(str::to_string);
        file_data = Some(field.bytes().await.map_err(|e| {
            ExtractError::InvalidRequest(format!("Failed to read file data: {e}"))
        })?);
    }

    let data = file_data.ok_or(ExtractError::MissingFile)?;
    if data.len() > state.config.max_file_size {
        return Err(ExtractError::FileTooLarge {
            size: data.len(),
            max: state.config.max_file_size,
        });
    }

    let filename = filename.unwrap_or_else(|| "upload.pdf".to_string());
    if let Some(mime) = content_type.as_deref().filter(|m| *m != "application/pdf") {
        tracing::warn!(filename = %filename, content_type = mime, "Upload is not labelled as PDF");
    }

    let timeout = state.config.extraction_timeout;
    let orchestrator = state.orchestrator.clone();
    let name = filename.clone();
    let task = tokio::task::spawn_blocking(move || orchestrator.extract(&data, &name));

    // The blocking task keeps running after a timeout; its result is dropped
    let result = match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined
            .map_err(|e| ExtractError::Internal(format!("Extraction task failed: {e}")))?,
        Err(_) => {
            tracing::warn!(
                filename = %filename,
                timeout_secs = timeout.as_secs(),
                "Extraction timed out"
            );
            ExtractionResult::failed(format!(
                "Extraction timed out after {}s",
                timeout.as_secs()
            ))
        }
    };

    Ok(Json(ExtractResponse {
        filename,
        result,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let orchestrator = &state.orchestrator;
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        parsers: orchestrator.registry().names(),
        ocr_available: orchestrator.ocr_available(),
        ocr_engine: orchestrator.ocr_engine().map(str::to_string),
        available_engines: state.engines.as_ref().clone(),
        preprocess: state.config.preprocess,
        thresholds: orchestrator.config().clone(),
        max_file_size_bytes: state.config.max_file_size,
        extraction_timeout_secs: state.config.extraction_timeout.as_secs(),
    })
}

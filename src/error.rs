use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error(
        "No text layer found and optical recognition is not installed. \
         Rebuild with `--features engine-ocrs` (or `engine-leptess`) to read scanned reports, \
         or enter the results manually."
    )]
    OcrUnavailable,

    #[error("No extractable text: the document has no usable text layer and optical recognition produced none")]
    NoExtractableText,

    #[error("Unreadable or corrupt PDF: {0}")]
    CorruptDocument(String),

    #[error("PDF is password-protected and cannot be read")]
    PasswordProtected,

    #[error("OCR failed: {0}")]
    OcrProcessing(String),

    #[error("Preprocessing failed: {0}")]
    PreprocessingError(String),

    #[error("Parser '{parser}' failed: {message}")]
    ParserFault { parser: String, message: String },

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// Stable machine-readable code, shared by HTTP responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            ExtractError::InitializationError(_) => "INIT_ERROR",
            ExtractError::OcrUnavailable => "OCR_UNAVAILABLE",
            ExtractError::NoExtractableText => "NO_EXTRACTABLE_TEXT",
            ExtractError::CorruptDocument(_) => "CORRUPT_DOCUMENT",
            ExtractError::PasswordProtected => "PASSWORD_PROTECTED",
            ExtractError::OcrProcessing(_) => "OCR_ERROR",
            ExtractError::PreprocessingError(_) => "PREPROCESSING_ERROR",
            ExtractError::ParserFault { .. } => "PARSER_FAULT",
            ExtractError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            ExtractError::MissingFile => "MISSING_FILE",
            ExtractError::InvalidRequest(_) => "INVALID_REQUEST",
            ExtractError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ExtractError {
    fn into_response(self) -> Response {
        let status = match &self {
            ExtractError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ExtractError::MissingFile | ExtractError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ExtractError::CorruptDocument(_) | ExtractError::PasswordProtected => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}

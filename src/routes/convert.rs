//! EPUB conversion endpoints
//!
//! - `POST /convertEpubToChapters`: upload an EPUB, get chapters and toc labels
//! - `POST /convertEpubToMd`: same endpoint under its historical name
//!
//! The file is read from the multipart field `file` (or `epub`). The optional
//! `format` query parameter selects raw chapter markup (`html`, the default),
//! plain text (`text`) or Markdown (`markdown`, needs `MARKDOWN_COMMAND`).

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::epub::{self, Conversion};
use crate::error::{AppError, Result};
use crate::html::{convert_chapters, MarkupConverter};
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Requested chapter format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Html,
    Text,
    Markdown,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertQuery {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Conversion response
#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub chapters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toc: Option<Vec<String>>,
}

/// An uploaded EPUB file
struct Upload {
    filename: String,
    data: Vec<u8>,
}

/// Create the conversion router
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/convertEpubToChapters", post(convert_epub))
        .route("/convertEpubToMd", post(convert_epub))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
}

/// Convert an uploaded EPUB into chapters
async fn convert_epub(
    State(state): State<AppState>,
    Query(query): Query<ConvertQuery>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>> {
    let converter: Option<&dyn MarkupConverter> = match query.format {
        OutputFormat::Html => None,
        OutputFormat::Text => Some(state.text_converter()),
        OutputFormat::Markdown => match state.markdown_converter() {
            Some(converter) => Some(converter),
            None => {
                return Err(AppError::BadRequest(
                    "Markdown output is not configured on this server".to_string(),
                ))
            }
        },
    };

    let upload = read_upload(&mut multipart, state.config().conversion.max_upload_bytes).await?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "convert",
        %request_id,
        file = %upload.filename,
        bytes = upload.data.len(),
        format = ?query.format,
    );

    let conversion = {
        let span = span.clone();
        tokio::task::spawn_blocking(move || span.in_scope(|| epub::convert(upload.data)))
            .await
            .map_err(|e| AppError::Internal(format!("Conversion task failed: {}", e)))??
    };

    let Conversion { chapters, toc } = conversion;
    let chapters = match converter {
        Some(converter) => convert_chapters(converter, chapters).await,
        None => chapters,
    };

    span.in_scope(|| {
        tracing::info!(
            chapters = chapters.len(),
            toc_entries = toc.as_ref().map(Vec::len),
            "Converted EPUB"
        )
    });

    Ok(Json(ConvertResponse {
        chapters: chapters.into_iter().map(|chapter| chapter.text).collect(),
        toc,
    }))
}

/// Pull the EPUB file out of the multipart body
async fn read_upload(multipart: &mut Multipart, max_bytes: usize) -> Result<Upload> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        if name != "file" && name != "epub" {
            tracing::debug!("Ignoring multipart field '{}'", name);
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        if !has_epub_extension(&filename) {
            return Err(AppError::BadRequest(format!(
                "Expected a .epub file, got '{}'",
                filename
            )));
        }

        let data = field.bytes().await.map_err(multipart_error)?;
        if data.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "{} bytes exceeds the {} byte limit",
                data.len(),
                max_bytes
            )));
        }

        tracing::debug!("Read {} bytes from '{}'", data.len(), filename);
        return Ok(Upload {
            filename,
            data: data.to_vec(),
        });
    }

    Err(AppError::BadRequest(
        "No file provided. Use field name 'file' or 'epub'".to_string(),
    ))
}

fn has_epub_extension(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".epub")
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(format!("Failed to read upload: {}", e.body_text()))
    }
}

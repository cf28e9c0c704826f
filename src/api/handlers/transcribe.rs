//! The transcription relay endpoint.
//!
//! One request moves through a fixed sequence of phases: parse the multipart
//! form, spool the audio to a temporary file, upload it to the provider file
//! store, request a transcript, respond. A failure in any phase short-circuits
//! to the uniform error response; the temporary file is owned by a value on
//! the handler's stack and is removed on every exit path.

use crate::AppState;
use crate::api::models::{ErrorResponse, TranscriptionResponse};
use crate::errors::{Error, Result};
use axum::{
    Json,
    extract::{Multipart, State},
};
use std::io::Write;
use tempfile::NamedTempFile;

/// An uploaded audio file spooled to disk for the duration of one request.
///
/// Dropping this value unlinks the temporary file, which covers success,
/// failure, and early-return paths alike.
struct AudioUpload {
    file: NamedTempFile,
    media_type: String,
    filename: String,
    size_bytes: u64,
}

#[utoipa::path(
    post,
    path = "/process-audio",
    tag = "transcription",
    summary = "Transcribe audio to LRC",
    description = "Upload an audio file together with a provider API key and receive timestamped lyrics in the LRC format.",
    request_body(
        content_type = "multipart/form-data",
        description = "Form with an `apiKey` text field and a `file` audio field"
    ),
    responses(
        (status = 200, description = "Generated LRC transcript", body = TranscriptionResponse),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Parse, upload, or generation failure", body = ErrorResponse)
    )
)]
pub async fn process_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>> {
    let mut api_key: Option<String> = None;
    let mut upload: Option<AudioUpload> = None;

    // Process multipart fields as they stream in
    while let Some(mut field) = multipart.next_field().await.map_err(|e| Error::InvalidUpload {
        message: format!("Failed to parse multipart data: {}", e),
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "apiKey" => {
                api_key = Some(field.text().await.map_err(|e| Error::InvalidUpload {
                    message: format!("Failed to read apiKey: {}", e),
                })?);
            }
            "file" => {
                let filename = field.file_name().unwrap_or("audio").to_string();
                let media_type = field.content_type().map(|s| s.to_string()).unwrap_or_else(|| {
                    mime_guess::from_path(&filename).first_or_octet_stream().to_string()
                });

                let mut file = match &state.config.files.upload_dir {
                    Some(dir) => NamedTempFile::new_in(dir)?,
                    None => NamedTempFile::new()?,
                };

                let mut size_bytes = 0u64;
                while let Some(chunk) = field.chunk().await.map_err(|e| Error::InvalidUpload {
                    message: format!("Failed to read file chunk: {}", e),
                })? {
                    size_bytes += chunk.len() as u64;
                    file.write_all(&chunk)?;
                }
                file.flush()?;

                tracing::debug!(
                    filename = %filename,
                    media_type = %media_type,
                    size_bytes,
                    "Spooled upload to temporary file"
                );

                upload = Some(AudioUpload {
                    file,
                    media_type,
                    filename,
                    size_bytes,
                });
            }
            _ => {
                // Ignore unknown fields (forward compatibility)
            }
        }
    }

    // Validate we received required data
    let api_key = api_key.ok_or_else(|| Error::InvalidUpload {
        message: "Missing required field: 'apiKey'".to_string(),
    })?;

    let upload = upload.ok_or_else(|| Error::InvalidUpload {
        message: "Missing required field: 'file'".to_string(),
    })?;

    if upload.size_bytes == 0 {
        return Err(Error::InvalidUpload {
            message: "File cannot be empty".to_string(),
        });
    }

    let handle = state
        .transcriber
        .upload_file(&api_key, upload.file.path(), &upload.media_type)
        .await?;

    tracing::info!(
        filename = %upload.filename,
        uri = %handle.uri,
        "Audio accepted by provider file store"
    );

    let lrc_content = state.transcriber.generate_transcript(&api_key, &handle).await?;

    tracing::info!(
        filename = %upload.filename,
        transcript_bytes = lrc_content.len(),
        "Transcript generated"
    );

    Ok(Json(TranscriptionResponse { lrc_content }))
}

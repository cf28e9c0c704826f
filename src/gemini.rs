//! Client for the Google Generative Language API.
//!
//! Two calls make up a transcription: the audio bytes are first pushed to the
//! provider's file store, then a single `generateContent` request references
//! the stored file together with the configured instruction prompt. The
//! caller's API key is forwarded per request; nothing is retained between
//! requests beyond the pooled HTTP client.

use crate::config::TranscriptionConfig;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};
use url::Url;

/// Header carrying the caller-supplied credential
const API_KEY_HEADER: &str = "x-goog-api-key";
/// Upload protocol marker for one-shot media uploads
const UPLOAD_PROTOCOL_HEADER: &str = "X-Goog-Upload-Protocol";

/// Errors surfaced by the provider client.
///
/// The relay collapses all of these into one generic client-facing message;
/// the variants exist so server-side logs stay actionable.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// File store rejected the upload (bad credential, unsupported type, quota, ...)
    #[error("file upload failed: {status}: {body}")]
    Upload { status: StatusCode, body: String },

    /// Generation request was rejected
    #[error("transcript generation failed: {status}: {body}")]
    Generation { status: StatusCode, body: String },

    /// Provider answered 200 but the response carried no transcript text
    #[error("provider response contained no transcript text")]
    EmptyTranscript,

    /// Provider response body could not be decoded
    #[error("error decoding provider response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Transport-level failure (connect, timeout, TLS, ...)
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Reading the spooled audio file failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Endpoint URL could not be constructed from the configured base
    #[error("invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Opaque reference issued by the provider's file store after an upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHandle {
    pub uri: String,
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileHandle,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

/// One part of a generation request: either a stored-file reference or text.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Makes sure a url has a trailing slash.
///
/// This fixes a weird idiosyncracy in rusts 'join' method on urls, where joining URLs like
/// '/hello', 'world' gives you '/world', but '/hello/', 'world' gives you '/hello/world'.
/// Basically, call this before calling .join
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

/// HTTP client for the provider's file store and generation endpoints.
///
/// The base URL, model identifier, prompt, and per-call timeout come from
/// [`TranscriptionConfig`]; the credential is supplied by the caller on every
/// request.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: Url,
    model: String,
    prompt: String,
}

impl GeminiClient {
    pub fn new(config: &TranscriptionConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            prompt: config.prompt.clone(),
        }
    }

    /// Upload the spooled audio file to the provider file store.
    #[instrument(skip(self, api_key), fields(media_type = %media_type))]
    pub async fn upload_file(&self, api_key: &str, path: &Path, media_type: &str) -> Result<FileHandle, ProviderError> {
        let url = ensure_slash(&self.base_url).join("upload/v1beta/files")?;

        let bytes = tokio::fs::read(path).await?;
        debug!(size_bytes = bytes.len(), "Uploading audio to provider file store");

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .header(UPLOAD_PROTOCOL_HEADER, "raw")
            .header(header::CONTENT_TYPE, media_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Provider file store rejected upload");
            return Err(ProviderError::Upload { status, body });
        }

        let body_text = response.text().await?;
        debug!("File store response body: {}", body_text);

        let parsed: UploadResponse = serde_json::from_str(&body_text).inspect_err(|e| {
            tracing::error!("Failed to parse file store response as JSON. Error: {}", e);
            tracing::error!("Response body was: {}", body_text);
        })?;

        Ok(parsed.file)
    }

    /// Request a transcript of an uploaded file.
    ///
    /// Issues one `generateContent` call referencing the file handle plus the
    /// configured instruction prompt. No streaming, no multi-turn context.
    #[instrument(skip(self, api_key), fields(model = %self.model, file_uri = %file.uri))]
    pub async fn generate_transcript(&self, api_key: &str, file: &FileHandle) -> Result<String, ProviderError> {
        let url = ensure_slash(&self.base_url).join(&format!("v1beta/models/{}:generateContent", self.model))?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        file_data: Some(FileData {
                            mime_type: file.mime_type.clone(),
                            file_uri: file.uri.clone(),
                        }),
                        text: None,
                    },
                    Part {
                        file_data: None,
                        text: Some(self.prompt.clone()),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Provider rejected generation request");
            return Err(ProviderError::Generation { status, body });
        }

        let body_text = response.text().await?;
        debug!("Generation response body: {}", body_text);

        let parsed: GenerateContentResponse = serde_json::from_str(&body_text).inspect_err(|e| {
            tracing::error!("Failed to parse generation response as JSON. Error: {}", e);
            tracing::error!("Response body was: {}", body_text);
        })?;

        // The transcript is the concatenated text of the first candidate's parts
        let transcript: String = parsed
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if transcript.is_empty() {
            return Err(ProviderError::EmptyTranscript);
        }

        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> GeminiClient {
        let config = TranscriptionConfig {
            base_url: base_url.parse().unwrap(),
            ..TranscriptionConfig::default()
        };
        GeminiClient::new(&config)
    }

    fn spooled_audio(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, content).unwrap();
        file
    }

    #[tokio::test]
    async fn upload_returns_file_handle() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .and(header("x-goog-api-key", "test-key-123"))
            .and(header("X-Goog-Upload-Protocol", "raw"))
            .and(header("content-type", "audio/mpeg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "file": {
                    "name": "files/abc",
                    "uri": "file://abc",
                    "mimeType": "audio/mpeg"
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let audio = spooled_audio(b"ID3fakeaudio");

        let handle = client
            .upload_file("test-key-123", audio.path(), "audio/mpeg")
            .await
            .unwrap();

        assert_eq!(handle.uri, "file://abc");
        assert_eq!(handle.mime_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn upload_rejection_surfaces_status_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"message": "API key not valid"}
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let audio = spooled_audio(b"ID3fakeaudio");

        let err = client
            .upload_file("bad-key", audio.path(), "audio/mpeg")
            .await
            .unwrap_err();

        match err {
            ProviderError::Upload { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(body.contains("API key not valid"));
            }
            other => panic!("expected Upload error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_sends_file_reference_and_prompt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key-123"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{
                    "parts": [
                        {"fileData": {"mimeType": "audio/mpeg", "fileUri": "file://abc"}},
                        {"text": "Generate a transcript of the audio with timestamps in LRC format."}
                    ]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"parts": [{"text": "[00:01.00]Hello\n"}, {"text": "[00:04.00]World"}]}
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let handle = FileHandle {
            uri: "file://abc".to_string(),
            mime_type: "audio/mpeg".to_string(),
        };

        let transcript = client.generate_transcript("test-key-123", &handle).await.unwrap();

        // Multiple text parts are concatenated
        assert_eq!(transcript, "[00:01.00]Hello\n[00:04.00]World");
    }

    #[tokio::test]
    async fn empty_candidates_are_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let handle = FileHandle {
            uri: "file://abc".to_string(),
            mime_type: "audio/mpeg".to_string(),
        };

        let err = client.generate_transcript("test-key-123", &handle).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyTranscript));
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let audio = spooled_audio(b"ID3fakeaudio");

        let err = client
            .upload_file("test-key-123", audio.path(), "audio/mpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}

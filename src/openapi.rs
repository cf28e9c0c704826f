//! OpenAPI documentation for the relay API.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(crate::api::handlers::transcribe::process_audio),
    components(schemas(
        crate::api::models::TranscriptionResponse,
        crate::api::models::ErrorResponse
    )),
    tags(
        (name = "transcription", description = "Audio to LRC transcription relay")
    )
)]
pub struct ApiDoc;

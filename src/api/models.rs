//! Wire models for the relay API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Successful relay response carrying the generated transcript.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResponse {
    /// LRC-formatted lyrics with `[mm:ss.xx]` timestamp markers
    pub lrc_content: String,
}

/// JSON body returned for any failed relay request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

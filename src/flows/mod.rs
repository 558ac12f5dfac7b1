//! Generative AI flows.
//!
//! A flow is one prompt plus one model call, with its output reshaped into a
//! local type. Flows that have nothing to ask the model about (an empty route,
//! an empty time window) answer locally without a call.

mod live;
mod report;
mod route_alert;
mod speech;
mod trends;

pub use live::fetch_live_incidents;
pub use report::analyze_incident_report;
pub use route_alert::{generate_route_alert, match_route_incidents};
pub use speech::{text_to_speech, MAX_SPEECH_CHARS};
pub use trends::summarize_trends;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::errors::AppError;
use crate::services::gemini::InlineData;

/// Largest decoded media payload accepted for analysis.
pub const MAX_MEDIA_BYTES: usize = 10 * 1024 * 1024;

/// Body limit for routes carrying media: the base64 form of
/// [`MAX_MEDIA_BYTES`] plus room for the data URI prefix and other fields.
pub const MAX_MEDIA_REQUEST_BYTES: usize = (MAX_MEDIA_BYTES + 2) / 3 * 4 + 64 * 1024;

/// Parse `data:<mime>;base64,<payload>` into inline media for the model.
///
/// Only image and video payloads are accepted, and the payload must decode to
/// between 1 byte and [`MAX_MEDIA_BYTES`].
pub fn parse_media_data_uri(uri: &str) -> Result<InlineData, AppError> {
    let invalid = |msg: &str| AppError::Validation(format!("Invalid media: {}", msg));

    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| invalid("expected a data URI"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("missing payload"))?;
    let mime_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| invalid("payload must be base64 encoded"))?
        .trim()
        .to_ascii_lowercase();

    if !(mime_type.starts_with("image/") || mime_type.starts_with("video/")) {
        return Err(invalid(&format!("unsupported media type {:?}", mime_type)));
    }

    // Cheap size check before decoding: base64 inflates by 4/3.
    if payload.len() / 4 * 3 > MAX_MEDIA_BYTES + 3 {
        return Err(invalid("payload is larger than 10 MiB"));
    }
    let decoded = STANDARD
        .decode(payload)
        .map_err(|e| invalid(&format!("payload is not valid base64 ({})", e)))?;
    if decoded.is_empty() {
        return Err(invalid("payload is empty"));
    }
    if decoded.len() > MAX_MEDIA_BYTES {
        return Err(invalid("payload is larger than 10 MiB"));
    }

    Ok(InlineData {
        mime_type,
        data: payload.to_string(),
    })
}

//! Payload encoding: raw document bytes → base64 for the multimodal request.
//!
//! Vision APIs accept attachments as base64 inside the JSON body. PDFs and
//! images are forwarded byte-for-byte; nothing is re-encoded, so the model sees
//! exactly what the user uploaded.
//!
//! Inputs that arrive as `data:` URLs carry a `data:<mime>;base64,` prefix that
//! must not end up in the payload; [`parse_data_url`] splits such a URL into
//! MIME type and decoded bytes, which are then re-encoded without it.

use crate::error::Math2WordError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Encode raw bytes as standard base64 (no data-URL prefix).
pub fn encode_payload(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} bytes base64", bytes.len(), b64.len());
    b64
}

/// Split a `data:<mime>;base64,<payload>` URL into MIME type and decoded bytes.
///
/// The MIME part is optional (`data:;base64,...`); only base64 payloads are
/// accepted.
pub fn parse_data_url(input: &str) -> Result<(Option<String>, Vec<u8>), Math2WordError> {
    let invalid = |reason: &str| Math2WordError::InvalidInput {
        input: truncate_for_display(input),
        reason: reason.to_string(),
    };

    let rest = input
        .strip_prefix("data:")
        .ok_or_else(|| invalid("not a data URL"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("data URL has no ',' separator"))?;

    let mut params = header.split(';');
    let mime = params
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| m.to_ascii_lowercase());
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(invalid("only base64 data URLs are supported"));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| invalid(&format!("invalid base64 payload: {e}")))?;
    Ok((mime, bytes))
}

fn truncate_for_display(input: &str) -> String {
    const MAX: usize = 48;
    match input.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}\u{2026}", &input[..idx]),
        None => input.to_string(),
    }
}

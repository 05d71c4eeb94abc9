//! Internal module for decoding message bodies.

use crate::mail::{Message, MessageBody, MessagePayload};
use crate::matcher::Matcher;
use base64::alphabet;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

/// Base64url decoder tolerant of both padded and unpadded data, since
/// providers emit both.
static BODY_DECODER: Lazy<GeneralPurpose> = Lazy::new(|| {
    GeneralPurpose::new(
        &alphabet::URL_SAFE,
        GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
    )
});

/// Result of attempting to extract a match from a message.
#[derive(Debug)]
pub(crate) enum ExtractResult {
    /// A match was found
    Match(String),
    /// No match in this message
    NoMatch,
    /// Message carried no decodable text (logged, but the caller can
    /// continue to the next message)
    Undecodable,
}

/// Extracts matching content from a full message using the provided matcher.
///
/// Designed to be resilient: a message with no decodable body is logged
/// and skipped rather than failing the whole fetch.
pub(crate) fn extract_match(message: &Message, pattern_matcher: &dyn Matcher) -> ExtractResult {
    let id = message.id.as_str();

    let Some(payload) = &message.payload else {
        debug!(id, "Message has no payload");
        return ExtractResult::Undecodable;
    };

    let Some(text) = body_text(payload) else {
        warn!(id, "No decodable text in message, skipping");
        return ExtractResult::Undecodable;
    };

    if let Some(result) = pattern_matcher.find_match(&text) {
        debug!(
            id,
            matcher = %pattern_matcher.description(),
            matched_len = result.len(),
            "Found match in message"
        );
        ExtractResult::Match(result.into_owned())
    } else {
        debug!(
            id,
            matcher = %pattern_matcher.description(),
            "No match found in message body"
        );
        ExtractResult::NoMatch
    }
}

/// Extracts text from a payload: the first multi-part segment with
/// decodable data wins, a single-part body is the fallback.
fn body_text(payload: &MessagePayload) -> Option<String> {
    if let Some(parts) = &payload.parts {
        for part in parts {
            if let Some(text) = part.body.as_ref().and_then(decode_body) {
                return Some(text);
            }
        }
    }

    payload.body.as_ref().and_then(decode_body)
}

/// Decodes a base64url body into text, lossy on invalid UTF-8.
fn decode_body(body: &MessageBody) -> Option<String> {
    let data = body.data.as_deref()?;
    match BODY_DECODER.decode(data) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(error) => {
            warn!(%error, "Body data is not valid base64url");
            None
        }
    }
}

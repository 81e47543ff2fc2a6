//! Share and preview URLs
//!
//! State is serialized to JSON and compressed with lz-string's URI-safe
//! alphabet into a single `code` parameter. Older links carried the plain
//! source as base64; those still decode.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::form_urlencoded;

use crate::config::ParamType;
use crate::frame_set::Width;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedState {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widths: Option<Vec<Width>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SharedState {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }
}

pub fn encode_state(state: &SharedState) -> String {
    let json = serde_json::to_string(state).unwrap_or_default();
    lz_str::compress_to_encoded_uri_component(json.as_str())
}

/// Decode a `code` parameter value, falling back to the legacy base64 form
pub fn decode_state(param: &str) -> Option<SharedState> {
    // query parsing turns the alphabet's '+' into spaces
    let param = param.trim().replace(' ', "+");
    if param.is_empty() {
        return None;
    }

    let compressed = lz_str::decompress_from_encoded_uri_component(param.as_str())
        .and_then(|wide| String::from_utf16(&wide).ok())
        .and_then(|json| serde_json::from_str::<SharedState>(&json).ok());
    if compressed.is_some() {
        return compressed;
    }

    let legacy = STANDARD
        .decode(&param)
        .or_else(|_| URL_SAFE_NO_PAD.decode(param.trim_end_matches('=')))
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());
    match legacy {
        Some(code) => {
            debug!("Decoded legacy base64 share link");
            Some(SharedState::new(code))
        }
        None => {
            debug!("Unreadable share link parameter");
            None
        }
    }
}

fn with_code_param(base: &str, params_type: ParamType, encoded: &str) -> String {
    match params_type {
        ParamType::Hash => format!("{}#?code={}", base, encoded),
        ParamType::Search => format!("{}?code={}", base, encoded),
    }
}

/// Link that reopens the editor with `state`
pub fn create_url(base_url: &str, params_type: ParamType, state: &SharedState) -> String {
    with_code_param(base_url, params_type, &encode_state(state))
}

/// Link to the chrome-less preview of `state`
pub fn create_preview_url(base_url: &str, params_type: ParamType, state: &SharedState) -> String {
    let base = if base_url.is_empty() || base_url.ends_with('/') {
        format!("{}preview/", base_url)
    } else {
        format!("{}/preview/", base_url)
    };
    with_code_param(&base, params_type, &encode_state(state))
}

/// Read the shared state out of a full URL, from either the hash or the query
pub fn decode_url(url: &str) -> Option<SharedState> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or_default();
    let param = form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())?;
    decode_state(&param)
}

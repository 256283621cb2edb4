//! Generation request parameters.
//!
//! Clients send a partial request; [`resolve`] merges it field-by-field over
//! fixed defaults so the upstream call is always complete. Numeric ranges
//! are deliberately not validated here: the upstream provider is the
//! authority on parameter validity, so out-of-range values are forwarded
//! and rejected remotely.

use serde::{Deserialize, Serialize};

/// Prompt text used when the client supplies none.
pub const DEFAULT_PROMPT_TEXT: &str = " ";

/// Generation length used when the client supplies none.
pub const DEFAULT_LENGTH: u32 = 100;

/// Prompt section of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPrompt {
    /// Text to generate from.
    pub text: String,
    /// Whether this prompt is the tail of previously generated text and the
    /// provider should continue rather than start fresh.
    pub is_continuation: bool,
}

/// Fully resolved request payload sent to the upstream provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: GenerationPrompt,
    /// Number of characters to generate (provider-defined unit).
    pub length: u32,
    /// Nucleus sampling parameter; provider default when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Sampling temperature; provider default when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub stream_response: bool,
}

/// Partial request as received from a client. Unset fields take defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialGenerationRequest {
    pub prompt: Option<PartialPrompt>,
    pub length: Option<u32>,
    pub top_p: Option<f64>,
    pub temperature: Option<f64>,
    pub stream_response: Option<bool>,
}

/// Partial prompt section; merged field-by-field, not whole-object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialPrompt {
    pub text: Option<String>,
    pub is_continuation: Option<bool>,
}

/// Merge a partial request over the fixed defaults.
///
/// The merge is deep: supplying only `prompt.text` still yields
/// `prompt.isContinuation = false` from the defaults. The result is never
/// missing a prompt text. Pure function, no side effects.
pub fn resolve(raw: PartialGenerationRequest) -> GenerationRequest {
    let prompt = raw.prompt.unwrap_or_default();
    GenerationRequest {
        prompt: GenerationPrompt {
            text: prompt.text.unwrap_or_else(|| DEFAULT_PROMPT_TEXT.to_string()),
            is_continuation: prompt.is_continuation.unwrap_or(false),
        },
        length: raw.length.unwrap_or(DEFAULT_LENGTH),
        top_p: raw.top_p,
        temperature: raw.temperature,
        stream_response: raw.stream_response.unwrap_or(true),
    }
}

//! # Token-Cost Estimator
//!
//! Produces a non-negative integer token cost from a request body without
//! consuming it for downstream stages (§4.5). The body is always read in
//! full and handed back intact; the estimate is a side artifact.
//!
//! ## Heuristic
//!
//! ```text
//! empty body              → cost = 1
//! valid JSON {messages,prompt} → Σ (len(content)/4) + len(prompt)/4, floor 5
//!   (each message's content is floored individually, then summed)
//! anything else (not JSON, or JSON without those fields) → max(1, len(body)/4)
//! ```
//!
//! 4 characters ≈ 1 token throughout; this is the only tokenization Nexus
//! performs and is deliberately approximate.

use serde::Deserialize;

const CHARS_PER_TOKEN: usize = 4;
const DECODED_FLOOR: u64 = 5;

#[derive(Debug, Deserialize)]
struct EstimatorBody {
    #[serde(default)]
    #[allow(dead_code)]
    model: Option<String>,
    #[serde(default)]
    messages: Vec<EstimatorMessage>,
    #[serde(default)]
    prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EstimatorMessage {
    #[serde(default)]
    #[allow(dead_code)]
    role: Option<String>,
    #[serde(default)]
    content: String,
}

/// Estimates token cost for `body`. Never fails: an unparseable body falls
/// back to the raw byte-length heuristic rather than erroring, since the
/// estimator's own failure mode (`BodyReadFailed`) belongs to the caller
/// that actually reads the hyper body stream, not to this pure function.
pub fn estimate_tokens(body: &[u8]) -> u64 {
    if body.is_empty() {
        return 1;
    }

    match serde_json::from_slice::<EstimatorBody>(body) {
        Ok(parsed) => {
            let message_tokens: usize = parsed
                .messages
                .iter()
                .map(|m| m.content.len() / CHARS_PER_TOKEN)
                .sum();
            let prompt_chars = parsed.prompt.as_deref().map(str::len).unwrap_or(0);
            let cost = message_tokens + (prompt_chars / CHARS_PER_TOKEN);
            (cost as u64).max(DECODED_FLOOR)
        }
        Err(_) => ((body.len() / CHARS_PER_TOKEN) as u64).max(1),
    }
}

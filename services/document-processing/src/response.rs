//! Response Parser
//!
//! Turns raw model output into a document, keeping the raw text when it does
//! not parse.

use serde_json::Value;

use intake_models::ApplicationDocument;

/// Outcome of parsing one model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Parsed {
        value: Value,
        document: ApplicationDocument,
    },
    Malformed {
        raw: String,
        error: String,
    },
}

impl ParsedResponse {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Parse `raw` as a JSON object of the application shape.
///
/// Surrounding whitespace and one Markdown code fence are tolerated. Text that
/// is not JSON and JSON that is not an object come back as `Malformed`. Inside
/// an object, badly shaped sections read as absent or empty.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let malformed = |error: String| ParsedResponse::Malformed {
        raw: raw.to_string(),
        error,
    };

    let value: Value = match serde_json::from_str(strip_code_fence(raw)) {
        Ok(value) => value,
        Err(e) => return malformed(format!("invalid JSON: {}", e)),
    };

    if !value.is_object() {
        return malformed("expected a JSON object".to_string());
    }

    match ApplicationDocument::from_value(value.clone()) {
        Ok(document) => ParsedResponse::Parsed { value, document },
        Err(e) => malformed(format!("unexpected document shape: {}", e)),
    }
}

/// Body of a single Markdown code fence (with or without a `json` info
/// string), or the trimmed input when there is none.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

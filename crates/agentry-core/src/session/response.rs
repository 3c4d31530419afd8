//! Model response parsing.
//!
//! Responses should be a single JSON object matching `AgentResponse`.
//! Models wrap JSON in prose or code fences often enough that strict
//! parsing alone loses real responses, so on failure the parser scans
//! for the first balanced JSON object in the text and retries on that.
//! If neither works, the raw text is preserved in the error.

use agentry_types::error::EngineError;
use agentry_types::llm::AgentResponse;

/// Parse raw model output into a structured response.
pub fn parse_agent_response(raw: &str) -> Result<AgentResponse, EngineError> {
    let trimmed = raw.trim();
    if let Ok(response) = serde_json::from_str::<AgentResponse>(trimmed) {
        return Ok(response);
    }

    if let Some(candidate) = first_json_object(trimmed)
        && let Ok(response) = serde_json::from_str::<AgentResponse>(candidate)
    {
        return Ok(response);
    }

    Err(EngineError::Parse {
        raw: raw.to_string(),
    })
}

/// Find the first balanced `{ ... }` span, respecting strings and
/// escapes so braces inside string values do not confuse the depth
/// count.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

//! Pulling structured JSON out of free-form model output.

use serde_json::Value;
use sluice_error::JsonError;

/// Locate the JSON payload in a model response.
///
/// Tried in order:
/// 1. a fenced code block (```` ```json ```` or a bare fence)
/// 2. the first balanced `{...}` or `[...]`, whichever opens first
/// 3. the trimmed response itself
///
/// # Example
///
/// ```
/// use sluice_rules::extract_json;
///
/// let output = "Findings:\n```json\n{\"Remarks\": []}\n```\nDone.";
/// assert_eq!(extract_json(output), "{\"Remarks\": []}");
///
/// assert_eq!(extract_json("sure: [1, 2] ok"), "[1, 2]");
/// ```
pub fn extract_json(output: &str) -> &str {
    if let Some(block) = fenced_block(output) {
        return block;
    }

    let object = output.find('{');
    let array = output.find('[');
    let (open, close) = match (object, array) {
        (Some(o), Some(a)) if a < o => ('[', ']'),
        (Some(_), _) => ('{', '}'),
        (None, Some(_)) => ('[', ']'),
        (None, None) => return output.trim(),
    };

    balanced(output, open, close).unwrap_or_else(|| output.trim())
}

/// Extract and parse the JSON payload of a model response.
///
/// # Errors
///
/// Returns [`JsonError`] if the located payload is not valid JSON.
pub fn parse_output(output: &str) -> Result<Value, JsonError> {
    serde_json::from_str(extract_json(output))
        .map_err(|e| JsonError::new(format!("Unparsable model output: {}", e)))
}

fn fenced_block(output: &str) -> Option<&str> {
    const TAGGED: &str = "```json";

    let body_start = match output.find(TAGGED) {
        Some(at) => at + TAGGED.len(),
        None => {
            let at = output.find("```")? + 3;
            // Bare fence: the info string, if any, runs to the end of the line.
            output[at..].find('\n').map_or(at, |n| at + n + 1)
        }
    };

    let rest = &output[body_start..];
    // An unterminated fence means the response was cut off; keep what arrived.
    let body = rest.find("```").map_or(rest, |end| &rest[..end]);
    Some(body.trim())
}

fn balanced(output: &str, open: char, close: char) -> Option<&str> {
    let start = output.find(open)?;
    let mut depth = 0usize;
    let mut quoted = false;
    let mut escaped = false;

    for (offset, ch) in output[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == open && !quoted => depth += 1,
            c if c == close && !quoted => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&output[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

//! Lenient parsing of JSON answers from judge and ranker models.

use serde::de::DeserializeOwned;

/// Strip a surrounding Markdown code fence, if any.
pub(crate) fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse `raw` as `T`, tolerating a code fence. `None` on any failure.
pub(crate) fn parse_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    serde_json::from_str(strip_fences(raw)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn plain_json_is_untouched() {
        assert_eq!(strip_fences(" {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"score\": 7}\n```";
        let v: Value = parse_json(raw).unwrap();
        assert_eq!(v["score"], 7);
    }

    #[test]
    fn prose_is_rejected() {
        assert!(parse_json::<Value>("I'd give it a 7").is_none());
    }
}

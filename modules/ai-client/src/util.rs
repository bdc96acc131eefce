/// Strip markdown code blocks from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse a model response as a JSON value.
///
/// Tries the whole (fence-stripped) text first, then the span between the
/// first `{` and the last `}`. Models routinely wrap JSON in prose.
pub fn parse_json_lenient(response: &str) -> Option<serde_json::Value> {
    let text = strip_code_blocks(response);
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }

    #[test]
    fn lenient_parse_accepts_fenced_json() {
        let value = parse_json_lenient("```json\n{\"topic\": \"EV\"}\n```").unwrap();
        assert_eq!(value["topic"], "EV");
    }

    #[test]
    fn lenient_parse_digs_object_out_of_prose() {
        let value =
            parse_json_lenient("Sure! Here is the graph: {\"nodes\": []} Hope it helps.").unwrap();
        assert!(value["nodes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn lenient_parse_rejects_garbage() {
        assert!(parse_json_lenient("").is_none());
        assert!(parse_json_lenient("no json here").is_none());
        assert!(parse_json_lenient("} backwards {").is_none());
        assert!(parse_json_lenient("{not: valid}").is_none());
    }
}

//! Pulls the generated text out of the response shapes completion backends
//! are known to return.

use serde_json::Value;

use mdchat_markdown::strip_reasoning;

/// Extracts the generated text from a completion response body.
///
/// Shapes are tried in order: `choices[0].message.content`,
/// `choices[0].text`, `results[].content[].text` (concatenated),
/// `response`, then top-level `content` or `text`. A body with a non-empty
/// `choices` array never falls through to the later shapes.
pub fn extract_generated_text(body: &Value) -> String {
    if let Some(choice) = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    {
        return choice
            .get("message")
            .and_then(|m| m.get("content"))
            .or_else(|| choice.get("text"))
            .map(text_of)
            .unwrap_or_default();
    }

    if let Some(results) = body.get("results").and_then(Value::as_array) {
        return results
            .iter()
            .filter_map(|item| item.get("content").and_then(Value::as_array))
            .flatten()
            .filter_map(|part| part.get("text"))
            .map(text_of)
            .collect();
    }

    ["response", "content", "text"]
        .iter()
        .find_map(|key| body.get(*key))
        .map(text_of)
        .unwrap_or_default()
}

/// Removes reasoning blocks and surrounding whitespace.
pub fn clean_response_text(text: &str) -> String {
    strip_reasoning(text)
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_message_content() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]});
        assert_eq!(extract_generated_text(&body), "hello");
    }

    #[test]
    fn legacy_choice_text() {
        let body = json!({"choices": [{"text": "legacy"}]});
        assert_eq!(extract_generated_text(&body), "legacy");
    }

    #[test]
    fn choices_without_text_do_not_fall_through() {
        let body = json!({"choices": [{"index": 0}], "response": "ignored"});
        assert_eq!(extract_generated_text(&body), "");
    }

    #[test]
    fn empty_choices_fall_through() {
        let body = json!({"choices": [], "response": "used"});
        assert_eq!(extract_generated_text(&body), "used");
    }

    #[test]
    fn results_content_is_concatenated() {
        let body = json!({"results": [
            {"content": [{"text": "a"}, {"type": "image"}, {"text": "b"}]},
            {"content": [{"text": "c"}]},
            {"other": true}
        ]});
        assert_eq!(extract_generated_text(&body), "abc");
    }

    #[test]
    fn top_level_fields_in_order() {
        assert_eq!(extract_generated_text(&json!({"response": "r", "text": "t"})), "r");
        assert_eq!(extract_generated_text(&json!({"content": "c", "text": "t"})), "c");
        assert_eq!(extract_generated_text(&json!({"text": "t"})), "t");
        assert_eq!(extract_generated_text(&json!({"unknown": 1})), "");
    }

    #[test]
    fn reasoning_blocks_are_stripped() {
        let text = "<reasoning>thinking\nhard</reasoning>\n\nThe answer is 4.";
        assert_eq!(clean_response_text(text), "The answer is 4.");
        assert_eq!(clean_response_text(""), "");
    }
}

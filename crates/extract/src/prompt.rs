/// Longest slice of the input text sent to the model
const MAX_PROMPT_TEXT_CHARS: usize = 1000;

pub fn build_extraction_prompt(text: &str, language: &str) -> String {
    let truncated: String = text.chars().take(MAX_PROMPT_TEXT_CHARS).collect();
    format!(
        r#"Extract all named entities from the following text (language code: {}).

INSTRUCTIONS:
1. Identify named entities (people, organizations, locations, products, events, concepts, dates, times, amounts of money, quantities)
2. Give each entity a confidence score between 0.0 and 1.0
3. Output ONLY valid JSON, nothing else
4. Use the exact schema below

SCHEMA:
{{
  "entities": [
    {{"name": "Entity Name", "type": "PERSON|ORGANIZATION|LOCATION|PRODUCT|EVENT|CONCEPT|DATE|TIME|MONEY|QUANTITY", "confidence": 0.95}}
  ]
}}

RULES:
- Copy entity names exactly as they appear in the text, do not translate them
- Entity types must be one of the listed values
- Output ONLY the JSON object, no markdown, no explanations

TEXT:
{}

JSON OUTPUT:"#,
        language, truncated
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        invalid_json
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_truncates_long_text() {
        let long = "x".repeat(5000);
        let prompt = build_extraction_prompt(&long, "en");
        assert!(prompt.contains(&"x".repeat(MAX_PROMPT_TEXT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_PROMPT_TEXT_CHARS + 1)));
        assert!(prompt.contains("language code: en"));
    }
}

//! Reading JSON objects out of free-form model replies
//!
//! Models are asked for a bare JSON object but often wrap it in prose or code
//! fences. Parsing goes strict → regex extraction → give up, and never errors.

use regex::Regex;
use serde::de::DeserializeOwned;

/// How a model reply was understood.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput<T> {
    /// The whole reply was the JSON object.
    Strict(T),
    /// A JSON object was found inside surrounding text.
    Extracted(T),
    /// Nothing usable; the caller applies its default.
    Unparsed,
}

impl<T> ModelOutput<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            ModelOutput::Strict(v) | ModelOutput::Extracted(v) => Some(v),
            ModelOutput::Unparsed => None,
        }
    }
}

pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> ModelOutput<T> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return ModelOutput::Strict(value);
    }

    for candidate in json_object_candidates(trimmed) {
        if let Ok(value) = serde_json::from_str::<T>(candidate) {
            return ModelOutput::Extracted(value);
        }
    }

    ModelOutput::Unparsed
}

/// Brace-delimited substrings: the widest span first, then the first
/// innermost-shortest one.
fn json_object_candidates(text: &str) -> Vec<&str> {
    [r"(?s)\{.*\}", r"(?s)\{.*?\}"]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .filter_map(|re| re.find(text).map(|m| m.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pair {
        a: i32,
    }

    #[test]
    fn test_strict_parse() {
        assert_eq!(
            parse_model_json::<Pair>("  {\"a\": 1}\n"),
            ModelOutput::Strict(Pair { a: 1 })
        );
    }

    #[test]
    fn test_extracts_object_from_code_fence() {
        let raw = "Sure! Here you go:\n```json\n{\"a\": 2}\n```\nAnything else?";
        assert_eq!(
            parse_model_json::<Pair>(raw),
            ModelOutput::Extracted(Pair { a: 2 })
        );
    }

    #[test]
    fn test_falls_back_to_shortest_object_when_widest_is_invalid() {
        let raw = "first {\"a\": 3} then {\"b\": }";
        assert_eq!(
            parse_model_json::<Pair>(raw),
            ModelOutput::Extracted(Pair { a: 3 })
        );
    }

    #[test]
    fn test_plain_prose_is_unparsed() {
        let out = parse_model_json::<Pair>("I think the student is confused.");
        assert_eq!(out, ModelOutput::Unparsed);
        assert_eq!(out.into_option(), None);
    }

    #[test]
    fn test_wrong_shape_is_unparsed() {
        assert_eq!(
            parse_model_json::<Pair>("{\"a\": \"not a number\"}"),
            ModelOutput::Unparsed
        );
    }
}

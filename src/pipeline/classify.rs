//! Pure mapping from a matching-service answer to a [`ClassificationRecord`].

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use url::form_urlencoded;

use crate::error::PipelineError;
use crate::types::{Category, ClassificationRecord};

/// Keys like `_st123` mark a merged search token.
static TOKEN_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_st[0-9]+").expect("token key pattern is valid"));

const PRESET_KEY: &str = "preset";

/// `;` is data inside catalog values, not a pair separator.
const VALUE_SEMICOLON: char = ';';
const ESCAPED_SEMICOLON: &str = "%3B";

#[derive(Debug, Default, Deserialize)]
struct ExactMatchResponse {
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    catalog_value: String,
}

/// Decode `body` and classify its catalog value. No I/O and no shared state.
pub fn classify(body: &[u8]) -> Result<ClassificationRecord, PipelineError> {
    let response: ExactMatchResponse =
        serde_json::from_slice(body).map_err(|e| PipelineError::Decode(e.to_string()))?;
    let Metadata {
        name,
        catalog_value,
    } = response.metadata;

    let params = parse_catalog_value(&catalog_value)?;

    let mut has_preset = false;
    let mut has_token = false;
    let mut preset_ids = Vec::new();
    for (key, value) in params {
        if key == PRESET_KEY {
            has_preset = true;
            preset_ids.push(value);
        } else if TOKEN_KEY.is_match(&key) {
            has_token = true;
        }
    }

    Ok(ClassificationRecord {
        text: name,
        category: Category::from_features(has_preset, has_token),
        filter_value: catalog_value,
        preset_ids,
    })
}

/// Parse a catalog value as URL query parameters, keeping `;` inside values.
pub fn parse_catalog_value(raw: &str) -> Result<Vec<(String, String)>, PipelineError> {
    let escaped = raw.replace(VALUE_SEMICOLON, ESCAPED_SEMICOLON);
    check_percent_escapes(&escaped)?;
    Ok(form_urlencoded::parse(escaped.as_bytes())
        .into_owned()
        .filter(|(k, _)| !k.is_empty())
        .collect())
}

fn check_percent_escapes(s: &str) -> Result<(), PipelineError> {
    let bytes = s.as_bytes();
    for (idx, _) in s.match_indices('%') {
        let valid = bytes
            .get(idx + 1..idx + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            return Err(PipelineError::Decode(format!(
                "invalid percent escape at byte {idx} of {s:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(name: &str, catalog_value: &str) -> Vec<u8> {
        serde_json::json!({
            "metadata": { "name": name, "catalog_value": catalog_value }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn truth_table_all_four_cases() {
        let cases = [
            ("preset=5&_st1=x", Category::ExtendSearch),
            ("preset=7", Category::Preset),
            ("subject=3&_st42=abc", Category::Merger),
            ("subject=3&kind=1", Category::Unknown),
        ];
        for (catalog_value, expected) in cases {
            let record = classify(&body("q", catalog_value)).unwrap();
            assert_eq!(record.category, expected, "{catalog_value}");
        }
    }

    #[test]
    fn record_keeps_raw_filter_value_and_preset_order() {
        let record = classify(&body("red dress", "preset=9&preset=3&sort=popular")).unwrap();
        assert_eq!(record.text, "red dress");
        assert_eq!(record.filter_value, "preset=9&preset=3&sort=popular");
        assert_eq!(record.preset_ids, ["9", "3"]);
        assert_eq!(record.category, Category::Preset);
    }

    #[test]
    fn semicolon_is_value_data() {
        let record = classify(&body("shoes", "subject=1;2;3&_st7=t")).unwrap();
        assert_eq!(record.category, Category::Merger);
        assert_eq!(record.filter_value, "subject=1;2;3&_st7=t");

        let params = parse_catalog_value("preset=5;_st1=x").unwrap();
        assert_eq!(params, [("preset".to_string(), "5;_st1=x".to_string())]);
    }

    #[test]
    fn token_key_matches_anywhere_in_key() {
        assert_eq!(
            classify(&body("q", "x_st12y=1")).unwrap().category,
            Category::Merger
        );
        assert_eq!(
            classify(&body("q", "_st=1")).unwrap().category,
            Category::Unknown
        );
    }

    #[test]
    fn percent_decoded_preset_ids() {
        let record = classify(&body("q", "preset=a%2Cb&_st1=1")).unwrap();
        assert_eq!(record.preset_ids, ["a,b"]);
        assert_eq!(record.category, Category::ExtendSearch);
    }

    #[test]
    fn missing_fields_decode_as_empty() {
        let record = classify(br#"{"other": 1}"#).unwrap();
        assert_eq!(record.text, "");
        assert_eq!(record.filter_value, "");
        assert_eq!(record.category, Category::Unknown);
    }

    #[test]
    fn malformed_input_is_decode_error() {
        assert!(matches!(
            classify(b"not json"),
            Err(PipelineError::Decode(_))
        ));
        assert!(matches!(
            classify(&body("q", "preset=%zz")),
            Err(PipelineError::Decode(_))
        ));
        assert!(matches!(
            classify(&body("q", "preset=5%")),
            Err(PipelineError::Decode(_))
        ));
    }
}

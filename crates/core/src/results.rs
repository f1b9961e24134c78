//! Decoding of image-generation result payloads.
//!
//! Backends have shipped two shapes for `result.results`: a list of bare
//! URL strings, and a list of `{ url, slotIndex }` objects. Both decode to
//! [`ResultImage`] here so nothing downstream branches on shape.

use serde::Serialize;
use serde_json::Value;

/// One generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultImage {
    pub url: String,
    /// Card slot the image was generated for, when the backend reports it.
    pub slot_index: Option<u32>,
}

/// Extract the images from a `done` result payload.
///
/// Entries that are neither a non-empty string nor an object with a
/// non-empty `url` are skipped.
pub fn result_images(result: &Value) -> Vec<ResultImage> {
    let Some(entries) = result.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries.iter().filter_map(decode_entry).collect()
}

/// Number of usable images in a result payload.
pub fn result_count(result: &Value) -> usize {
    result_images(result).len()
}

fn decode_entry(entry: &Value) -> Option<ResultImage> {
    match entry {
        Value::String(url) => non_empty(url).map(|url| ResultImage {
            url,
            slot_index: None,
        }),
        Value::Object(map) => {
            let url = map.get("url").and_then(Value::as_str).and_then(non_empty)?;
            let slot_index = map
                .get("slotIndex")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok());
            Some(ResultImage { url, slot_index })
        }
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn string_results() {
        let result = json!({ "results": ["a.png", "b.png"] });
        assert_eq!(result_count(&result), 2);
        assert_eq!(result_images(&result)[0].url, "a.png");
    }

    #[test]
    fn object_results_keep_slot_index() {
        let result = json!({ "results": [{ "url": "/assets/x.png", "slotIndex": 3 }] });
        let images = result_images(&result);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].slot_index, Some(3));
    }

    #[test]
    fn mixed_and_invalid_entries_are_skipped() {
        let result = json!({ "results": ["ok.png", "", null, 7, { "slotIndex": 1 }, { "url": "y.png" }] });
        let urls: Vec<_> = result_images(&result).into_iter().map(|i| i.url).collect();
        assert_eq!(urls, vec!["ok.png", "y.png"]);
    }

    #[test]
    fn missing_results_is_empty() {
        assert_eq!(result_count(&json!(null)), 0);
        assert_eq!(result_count(&json!({ "results": "nope" })), 0);
    }
}

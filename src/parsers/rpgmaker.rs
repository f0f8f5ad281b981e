use std::collections::HashMap;

use serde_json::Value;

use crate::error::ParseError;
use crate::model::entry::TranslationEntry;

/// Collects every non-blank string leaf of an RPG Maker data file.
///
/// Object members named in `skip_keys` are not descended into.
pub fn extract(
    text: &str,
    skip_keys: &[String],
) -> Result<(Value, Vec<TranslationEntry>), ParseError> {
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let document: Value = serde_json::from_str(text)?;

    let mut entries = Vec::new();
    let mut path = Vec::new();
    walk(&document, &mut path, skip_keys, &mut entries);

    Ok((document, entries))
}

fn walk(
    value: &Value,
    path: &mut Vec<String>,
    skip_keys: &[String],
    out: &mut Vec<TranslationEntry>,
) {
    match value {
        Value::String(s) => {
            if !s.trim().is_empty() {
                out.push(TranslationEntry::new(path.join("."), s.clone()));
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(i.to_string());
                walk(item, path, skip_keys, out);
                path.pop();
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                if skip_keys.iter().any(|s| s == k) {
                    continue;
                }
                path.push(k.clone());
                walk(v, path, skip_keys, out);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Writes translated entries back into a copy of `document`.
///
/// Untranslated entries and empty translations leave the original leaf.
pub fn rebuild(document: &Value, entries: &[TranslationEntry]) -> Value {
    let translations: HashMap<&str, &str> = entries
        .iter()
        .filter(|e| e.is_translated && !e.translation.is_empty())
        .map(|e| (e.key.as_str(), e.translation.as_str()))
        .collect();

    let mut out = document.clone();
    if !translations.is_empty() {
        let mut path = Vec::new();
        replace(&mut out, &mut path, &translations);
    }
    out
}

fn replace(value: &mut Value, path: &mut Vec<String>, translations: &HashMap<&str, &str>) {
    match value {
        Value::String(s) => {
            if let Some(t) = translations.get(path.join(".").as_str()) {
                *s = (*t).to_string();
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                path.push(i.to_string());
                replace(item, path, translations);
                path.pop();
            }
        }
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                path.push(k.clone());
                replace(v, path, translations);
                path.pop();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::settings::default_skip_keys;

    const MAP: &str = r#"{
        "displayName": "村",
        "events": [
            null,
            {
                "name": "EV001",
                "characterName": "Actor1",
                "pages": [
                    { "list": [ { "code": 401, "parameters": ["こんにちは"] },
                                { "code": 0, "parameters": [] } ] }
                ]
            }
        ],
        "note": "  "
    }"#;

    #[test]
    fn extracts_leaves_with_dotted_keys() {
        let (_, entries) = extract(MAP, &default_skip_keys()).unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "displayName",
                "events.1.name",
                "events.1.pages.0.list.0.parameters.0",
            ]
        );
        assert!(entries.iter().all(|e| !e.is_translated));
        assert_eq!(entries[2].original, "こんにちは");
    }

    #[test]
    fn rebuild_replaces_only_translated_leaves() {
        let (doc, mut entries) = extract(MAP, &default_skip_keys()).unwrap();
        entries[0].translation = "Làng".into();
        entries[0].is_translated = true;
        entries[2].translation = "Xin chào".into();
        entries[2].is_translated = true;
        entries[1].translation = "ignored".into();

        let out = rebuild(&doc, &entries);
        assert_eq!(out["displayName"], "Làng");
        assert_eq!(out["events"][1]["name"], "EV001");
        assert_eq!(out["events"][1]["characterName"], "Actor1");
        assert_eq!(out["events"][1]["pages"][0]["list"][0]["parameters"][0], "Xin chào");
        assert_eq!(out["events"][0], Value::Null);
    }

    #[test]
    fn key_order_is_preserved() {
        let (doc, entries) = extract(r#"{"b":"x","a":"y"}"#, &[]).unwrap();
        let out = serde_json::to_string(&rebuild(&doc, &entries)).unwrap();
        assert_eq!(out, r#"{"b":"x","a":"y"}"#);
    }

    #[test]
    fn rejects_empty_and_invalid() {
        assert!(matches!(extract("  ", &[]), Err(ParseError::Empty)));
        assert!(matches!(extract("{", &[]), Err(ParseError::Json(_))));
    }
}

use std::collections::HashMap;
use std::path::Path;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;
use crate::services::store;

pub const DICTIONARY_FILE: &str = "dictionary.json";

/// One glossary substitution.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DictEntry {
    pub find: String,

    #[serde(default)]
    pub replace: String,

    #[serde(default)]
    pub ignore_case: bool,
}

/// User glossary applied to every translated string.
///
/// All terms are compiled into one alternation and replaced in a single
/// left-to-right pass, so replacement text is never rewritten again.
#[derive(Default)]
pub struct Dictionary {
    entries: Vec<DictEntry>,
    pattern: Option<Regex>,
    replacements: Vec<String>,
}

impl Dictionary {
    pub fn new(entries: Vec<DictEntry>) -> Self {
        let mut ordered: Vec<&DictEntry> = entries.iter().filter(|e| !e.find.is_empty()).collect();
        // Longer terms first so "Hero Lv" wins over "Hero" at the same position.
        ordered.sort_by(|a, b| b.find.chars().count().cmp(&a.find.chars().count()));

        let alternatives: Vec<String> = ordered
            .iter()
            .map(|e| {
                let term = regex::escape(&e.find);
                if e.ignore_case {
                    format!("((?i:{term}))")
                } else {
                    format!("({term})")
                }
            })
            .collect();
        let replacements = ordered.iter().map(|e| e.replace.clone()).collect();

        let pattern = if alternatives.is_empty() {
            None
        } else {
            match Regex::new(&alternatives.join("|")) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(terms = alternatives.len(), error = %err, "dictionary disabled");
                    None
                }
            }
        };

        Self {
            entries,
            pattern,
            replacements,
        }
    }

    pub fn entries(&self) -> &[DictEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn apply(&self, text: &str) -> String {
        let Some(re) = &self.pattern else {
            return text.to_string();
        };

        re.replace_all(text, |caps: &Captures| {
            // Group i+1 belongs to the i-th ordered term.
            (1..caps.len())
                .find(|&i| caps.get(i).is_some())
                .and_then(|i| self.replacements.get(i - 1))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
    }
}

pub fn load(dir: &Path) -> Vec<DictEntry> {
    let entries: Vec<DictEntry> = store::read_json_or_default(&dir.join(DICTIONARY_FILE));
    normalize(entries)
}

pub fn save(dir: &Path, entries: Vec<DictEntry>) -> Result<Vec<DictEntry>, StoreError> {
    let entries = normalize(entries);
    store::write_json(&dir.join(DICTIONARY_FILE), &entries)?;
    Ok(entries)
}

/// Drops empty terms, keeps the last entry per `(find, ignore_case)`, sorts.
fn normalize(entries: Vec<DictEntry>) -> Vec<DictEntry> {
    let mut map: HashMap<(String, bool), DictEntry> = HashMap::new();

    for e in entries {
        if e.find.trim().is_empty() {
            continue;
        }
        map.insert((e.find.clone(), e.ignore_case), e);
    }

    let mut out: Vec<DictEntry> = map.into_values().collect();
    out.sort_by(|a, b| (a.find.as_str(), a.ignore_case).cmp(&(b.find.as_str(), b.ignore_case)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(find: &str, replace: &str, ignore_case: bool) -> DictEntry {
        DictEntry {
            find: find.into(),
            replace: replace.into(),
            ignore_case,
        }
    }

    #[test]
    fn longest_term_wins() {
        let d = Dictionary::new(vec![
            entry("Hero", "Anh hùng", false),
            entry("Hero Lv", "Cấp anh hùng", false),
        ]);
        assert_eq!(d.apply("Hero Lv 5, Hero"), "Cấp anh hùng 5, Anh hùng");
    }

    #[test]
    fn replacement_text_is_not_rewritten() {
        let d = Dictionary::new(vec![
            entry("Hero Lv", "Level of Hero", false),
            entry("Hero", "Anh hùng", false),
        ]);
        assert_eq!(d.apply("Hero Lv 5, Hero"), "Level of Hero 5, Anh hùng");
    }

    #[test]
    fn mixed_case_rules_in_one_pass() {
        let d = Dictionary::new(vec![
            entry("gold", "vàng", true),
            entry("Gold Coin", "Xu vàng", false),
        ]);
        assert_eq!(d.apply("Gold Coin, GOLD, gold coin"), "Xu vàng, vàng, vàng coin");
    }

    #[test]
    fn case_insensitive_and_literal_replacement() {
        let d = Dictionary::new(vec![entry("potion", "Thuốc $1", true)]);
        assert_eq!(d.apply("POTION x2, Potion"), "Thuốc $1 x2, Thuốc $1");
    }

    #[test]
    fn empty_dictionary_is_identity() {
        let d = Dictionary::new(vec![entry("", "x", false)]);
        assert!(d.is_empty());
        assert_eq!(d.apply("giữ nguyên"), "giữ nguyên");
    }

    #[test]
    fn save_dedups_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save(
            dir.path(),
            vec![
                entry("Slime", "Chất nhờn", false),
                entry("  ", "bỏ", false),
                entry("Slime", "Slime xanh", false),
                entry("Gold", "Vàng", false),
            ],
        )
        .unwrap();

        assert_eq!(
            saved,
            vec![entry("Gold", "Vàng", false), entry("Slime", "Slime xanh", false)]
        );
        assert_eq!(load(dir.path()), saved);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path()).is_empty());
    }
}

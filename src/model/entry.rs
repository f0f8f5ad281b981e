use serde::{Deserialize, Serialize};

/// One translatable string leaf of an uploaded JSON document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TranslationEntry {
    /// Dotted path of the leaf (`events.1.pages.0.list.3.parameters.0`).
    pub key: String,

    #[serde(default)]
    pub original: String,

    #[serde(default)]
    pub translation: String,

    #[serde(default, rename = "isTranslated")]
    pub is_translated: bool,
}

impl TranslationEntry {
    pub fn new(key: String, original: String) -> Self {
        Self {
            key,
            original,
            translation: String::new(),
            is_translated: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    #[default]
    Pending,
    Translated,
    Error,
}

impl RowStatus {
    pub fn is_done(self) -> bool {
        !matches!(self, RowStatus::Pending)
    }
}

use serde::{Deserialize, Serialize};

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_target_language() -> String {
    "Vietnamese".to_string()
}

fn default_target_code() -> String {
    "vi".to_string()
}

fn default_tabular_batch_size() -> usize {
    100
}

fn default_json_batch_size() -> usize {
    50
}

fn default_tabular_delay_ms() -> u64 {
    400
}

fn default_json_delay_ms() -> u64 {
    1000
}

fn default_max_attempts() -> usize {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_jitter_ms() -> u64 {
    200
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.3
}

/// RPG Maker fields holding asset file names; translating them breaks lookups.
pub fn default_skip_keys() -> Vec<String> {
    [
        "characterName",
        "faceName",
        "battlerName",
        "battleback1Name",
        "battleback2Name",
        "parallaxName",
        "tilesetNames",
        "title1Name",
        "title2Name",
        "animationName",
        "animation1Name",
        "animation2Name",
        "bgm",
        "bgs",
        "me",
        "se",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppSettings {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Empty means "read `TIENICH_API_KEY` from the environment".
    #[serde(default)]
    pub api_key: String,

    /// Overrides the provider endpoint (any OpenAI-compatible server).
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_target_language", alias = "target_lang")]
    pub target_language: String,

    /// Used for the `<stem>_<code>.json` export name.
    #[serde(default = "default_target_code")]
    pub target_code: String,

    /// Free-form style instruction appended to every prompt.
    #[serde(default)]
    pub style: String,

    #[serde(default = "default_tabular_batch_size")]
    pub tabular_batch_size: usize,

    #[serde(default = "default_json_batch_size")]
    pub json_batch_size: usize,

    #[serde(default = "default_tabular_delay_ms")]
    pub tabular_delay_ms: u64,

    #[serde(default = "default_json_delay_ms")]
    pub json_delay_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_jitter_ms")]
    pub backoff_jitter_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_skip_keys")]
    pub skip_keys: Vec<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: String::new(),
            base_url: String::new(),
            target_language: default_target_language(),
            target_code: default_target_code(),
            style: String::new(),
            tabular_batch_size: default_tabular_batch_size(),
            json_batch_size: default_json_batch_size(),
            tabular_delay_ms: default_tabular_delay_ms(),
            json_delay_ms: default_json_delay_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_jitter_ms: default_backoff_jitter_ms(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            skip_keys: default_skip_keys(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_matches_default() {
        let parsed: AppSettings = serde_json::from_str("{}").unwrap();
        let d = AppSettings::default();
        assert_eq!(parsed.tabular_batch_size, d.tabular_batch_size);
        assert_eq!(parsed.json_delay_ms, d.json_delay_ms);
        assert_eq!(parsed.skip_keys, d.skip_keys);
        assert_eq!(d.tabular_batch_size, 100);
        assert_eq!(d.json_batch_size, 50);
    }

    #[test]
    fn accepts_legacy_alias() {
        let parsed: AppSettings = serde_json::from_str(r#"{"target_lang":"English"}"#).unwrap();
        assert_eq!(parsed.target_language, "English");
    }
}

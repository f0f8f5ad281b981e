use std::fs;
use std::path::Path;

use serde_json::{json, Value};
use tracing::info;

use super::{required_str, text_field, Core};
use crate::error::{CoreError, StoreError};
use crate::model::settings::AppSettings;
use crate::services::dictionary::{self, DictEntry, Dictionary};
use crate::services::numfmt::{self, RepaymentMethod};
use crate::services::structured::{self, FortuneReading, QuizSet};
use crate::services::{encoding, settings};

const DEFAULT_QUIZ_SIZE: u64 = 5;
const MAX_QUIZ_SIZE: u64 = 20;

fn amount_field(payload: &Value, key: &str) -> Result<f64, CoreError> {
    let invalid = || CoreError::invalid(format!("payload.{key} không phải là số hợp lệ"));
    match payload.get(key) {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(invalid),
        Some(Value::String(s)) => numfmt::parse_amount(s).ok_or_else(invalid),
        _ => Err(CoreError::invalid(format!("payload.{key} is required"))),
    }
}

impl Core {
    pub(super) fn settings_get(&self) -> Result<Value, CoreError> {
        Ok(json!({
            "settings": self.settings,
            "data_dir": self.data_dir.to_string_lossy()
        }))
    }

    pub(super) fn settings_save(&mut self, payload: &Value) -> Result<Value, CoreError> {
        let raw = payload
            .get("settings")
            .cloned()
            .ok_or_else(|| CoreError::invalid("payload.settings is required"))?;
        let incoming: AppSettings = serde_json::from_value(raw)
            .map_err(|e| CoreError::invalid(format!("invalid payload.settings: {e}")))?;

        self.settings = settings::save(&self.data_dir, incoming)?;
        info!(provider = %self.settings.provider, model = %self.settings.model, "settings saved");
        Ok(json!({ "settings": self.settings }))
    }

    pub(super) fn detect_encoding(&self, payload: &Value) -> Result<Value, CoreError> {
        let path = required_str(payload, "path")?;
        let bytes = fs::read(Path::new(path)).map_err(StoreError::from)?;
        Ok(json!(encoding::detect(&bytes)))
    }

    pub(super) fn dictionary_save(&mut self, payload: &Value) -> Result<Value, CoreError> {
        let raw = payload
            .get("entries")
            .cloned()
            .ok_or_else(|| CoreError::invalid("payload.entries must be an array"))?;
        let entries: Vec<DictEntry> = serde_json::from_value(raw)
            .map_err(|e| CoreError::invalid(format!("invalid payload.entries: {e}")))?;

        let saved = dictionary::save(&self.data_dir, entries)?;
        info!(terms = saved.len(), "dictionary saved");
        self.dictionary = Dictionary::new(saved);
        Ok(json!({ "entries": self.dictionary.entries() }))
    }

    pub(super) fn dictionary_apply(&self, payload: &Value) -> Result<Value, CoreError> {
        let text = payload
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::invalid("payload.text is required"))?;
        Ok(json!({ "text": self.dictionary.apply(text) }))
    }

    pub(super) fn quiz_generate(&self, payload: &Value) -> Result<Value, CoreError> {
        let topic = required_str(payload, "topic")?;
        let count = payload
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_QUIZ_SIZE)
            .clamp(1, MAX_QUIZ_SIZE) as usize;

        let settings = self.request_settings(payload);
        let language = text_field(payload, "language").unwrap_or(&settings.target_language);
        let prompt = structured::quiz_prompt(topic, count, language);

        let mut completer = self.completer_for(&settings)?;
        let quiz: QuizSet = structured::generate(completer.as_mut(), &prompt)?;
        Ok(json!(quiz))
    }

    pub(super) fn fortune_generate(&self, payload: &Value) -> Result<Value, CoreError> {
        let name = required_str(payload, "name")?;
        let birth_date = required_str(payload, "birth_date")?;

        let settings = self.request_settings(payload);
        let language = text_field(payload, "language").unwrap_or(&settings.target_language);
        let prompt = structured::fortune_prompt(name, birth_date, language);

        let mut completer = self.completer_for(&settings)?;
        let reading: FortuneReading = structured::generate(completer.as_mut(), &prompt)?;
        Ok(json!(reading))
    }
}

pub(super) fn loan_schedule(payload: &Value) -> Result<Value, CoreError> {
    let principal = amount_field(payload, "principal")?;
    let rate = amount_field(payload, "annual_rate")?;
    let months = payload
        .get("months")
        .and_then(Value::as_u64)
        .ok_or_else(|| CoreError::invalid("payload.months is required"))?;
    // Out-of-range terms are rejected by `amortize`.
    let months = u32::try_from(months).unwrap_or(u32::MAX);

    let method = match text_field(payload, "method").unwrap_or("annuity") {
        "annuity" => RepaymentMethod::Annuity,
        "declining" => RepaymentMethod::Declining,
        other => return Err(CoreError::invalid(format!("unknown repayment method `{other}`"))),
    };

    Ok(json!(numfmt::amortize(principal, rate, months, method)?))
}

pub(super) fn number_format(payload: &Value) -> Result<Value, CoreError> {
    let value = amount_field(payload, "value")?;
    let currency = payload.get("currency").and_then(Value::as_bool).unwrap_or(false);

    let text = if currency {
        numfmt::format_vnd(value)
    } else {
        let decimals = payload.get("decimals").and_then(Value::as_u64).unwrap_or(0).min(10) as usize;
        numfmt::format_number(value, decimals)
    };
    Ok(json!({ "text": text }))
}

pub(super) fn number_parse(payload: &Value) -> Result<Value, CoreError> {
    let text = required_str(payload, "text")?;
    let value = numfmt::parse_amount(text)
        .ok_or_else(|| CoreError::invalid(format!("`{text}` không phải là số hợp lệ")))?;
    Ok(json!({ "value": value }))
}

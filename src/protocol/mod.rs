use std::path::PathBuf;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{AiError, CoreError};
use crate::model::settings::AppSettings;
use crate::services::ai::{AiConfig, Completer, HttpCompleter, Sleeper, ThreadSleeper};
use crate::services::dictionary::{self, Dictionary};
use crate::services::session::{JsonSession, Progress, TableSession};
use crate::services::settings;

mod command;
mod documents;
mod tools;

use command::Command;

/// Builds the remote completion client for one request.
pub type CompleterFactory = Box<dyn Fn(&AiConfig) -> Result<Box<dyn Completer>, AiError>>;

fn get_cmd(req: &Value) -> &str {
    req.get("cmd").and_then(|v| v.as_str()).unwrap_or("")
}

fn get_id(req: &Value) -> Value {
    req.get("id").cloned().unwrap_or(Value::Null)
}

fn get_payload(req: &Value) -> &Value {
    static EMPTY: Value = Value::Null;
    req.get("payload").unwrap_or(&EMPTY)
}

fn ok(id: Value, payload: Value) -> String {
    json!({
        "id": id,
        "status": "ok",
        "payload": payload
    })
    .to_string()
}

fn err(id: Value, message: impl Into<String>) -> String {
    json!({
        "id": id,
        "status": "error",
        "message": message.into()
    })
    .to_string()
}

fn progress_event(id: &Value, scope: &str, progress: Progress) -> Value {
    json!({
        "event": "progress",
        "id": id,
        "scope": scope,
        "progress": progress
    })
}

fn text_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn required_str<'a>(payload: &'a Value, key: &str) -> Result<&'a str, CoreError> {
    text_field(payload, key).ok_or_else(|| CoreError::invalid(format!("payload.{key} is required")))
}

fn required_index(payload: &Value, key: &str) -> Result<usize, CoreError> {
    payload
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| CoreError::invalid(format!("payload.{key} must be a non-negative integer")))
}

fn http_completer(cfg: &AiConfig) -> Result<Box<dyn Completer>, AiError> {
    Ok(Box::new(HttpCompleter::new(cfg)?))
}

/// Everything that lives between two requests.
pub struct Core {
    data_dir: PathBuf,
    settings: AppSettings,
    dictionary: Dictionary,
    table: Option<TableSession>,
    json: Option<JsonSession>,
    make_completer: CompleterFactory,
    sleeper: Box<dyn Sleeper>,
}

impl Core {
    /// Loads settings and dictionary from `data_dir` and talks to the real API.
    pub fn open(data_dir: PathBuf) -> Self {
        let settings = settings::load(&data_dir).unwrap_or_else(|e| {
            warn!(dir = %data_dir.display(), error = %e, "settings unreadable, using defaults");
            AppSettings::default()
        });
        let dictionary = Dictionary::new(dictionary::load(&data_dir));

        Self::with_backend(
            data_dir,
            settings,
            dictionary,
            Box::new(http_completer),
            Box::new(ThreadSleeper),
        )
    }

    pub fn with_backend(
        data_dir: PathBuf,
        settings: AppSettings,
        dictionary: Dictionary,
        make_completer: CompleterFactory,
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        Self {
            data_dir,
            settings,
            dictionary,
            table: None,
            json: None,
            make_completer,
            sleeper,
        }
    }

    /// Stored settings with the per-request overrides from `payload` applied.
    fn request_settings(&self, payload: &Value) -> AppSettings {
        let mut s = self.settings.clone();

        if let Some(v) = text_field(payload, "provider") {
            s.provider = v.to_string();
        }
        if let Some(v) = text_field(payload, "api_key") {
            s.api_key = v.to_string();
        }
        if let Some(v) = text_field(payload, "model") {
            s.model = v.to_string();
        }
        if let Some(v) = text_field(payload, "base_url") {
            s.base_url = v.to_string();
        }
        if let Some(v) = text_field(payload, "target_language") {
            s.target_language = v.to_string();
        }
        if let Some(v) = text_field(payload, "style") {
            s.style = v.to_string();
        }
        if let Some(n) = payload.get("batch_size").and_then(Value::as_u64) {
            let n = (n as usize).max(1);
            s.tabular_batch_size = n;
            s.json_batch_size = n;
        }

        s
    }

    fn completer_for(&self, settings: &AppSettings) -> Result<Box<dyn Completer>, CoreError> {
        Ok((self.make_completer)(&AiConfig::from_settings(settings))?)
    }

    /// Handles one request line and returns the response line.
    ///
    /// Long runs report progress through `notify` before the response.
    pub fn handle(&mut self, input: &str, notify: &mut dyn FnMut(Value)) -> String {
        let req: Value = match serde_json::from_str(input) {
            Ok(v) => v,
            Err(_) => {
                return json!({
                    "status": "error",
                    "message": "invalid json"
                })
                .to_string();
            }
        };

        let id = get_id(&req);
        let cmd_str = get_cmd(&req);
        let payload = get_payload(&req);

        debug!(cmd = cmd_str, "request");

        let result = match Command::from(cmd_str) {
            Command::Ping => Ok(json!({ "message": "tienich-core alive" })),

            Command::SettingsGet => self.settings_get(),
            Command::SettingsSave => self.settings_save(payload),
            Command::DetectEncoding => self.detect_encoding(payload),

            Command::TableLoad => self.table_load(payload),
            Command::TableDesignate => self.table_designate(payload),
            Command::TableTranslateAll => self.table_translate_all(&id, payload, notify),
            Command::TableTranslateRow => self.table_translate_row(payload),
            Command::TableMutateRow => self.table_mutate_row(payload),
            Command::TableReset => self.table_reset(),
            Command::TableExport => self.table_export(payload),
            Command::TableQa => self.table_qa(),

            Command::JsonLoad => self.json_load(payload),
            Command::JsonTranslateAll => self.json_translate_all(&id, payload, notify),
            Command::JsonTranslateEntry => self.json_translate_entry(payload),
            Command::JsonMutateEntry => self.json_mutate_entry(payload),
            Command::JsonReset => self.json_reset(),
            Command::JsonExport => self.json_export(payload),
            Command::JsonQa => self.json_qa(),

            Command::DictionaryList => Ok(json!({ "entries": self.dictionary.entries() })),
            Command::DictionarySave => self.dictionary_save(payload),
            Command::DictionaryApply => self.dictionary_apply(payload),

            Command::QuizGenerate => self.quiz_generate(payload),
            Command::FortuneGenerate => self.fortune_generate(payload),
            Command::LoanSchedule => tools::loan_schedule(payload),
            Command::NumberFormat => tools::number_format(payload),
            Command::NumberParse => tools::number_parse(payload),

            Command::Unknown => return err(id, "unknown command"),
        };

        match result {
            Ok(payload) => ok(id, payload),
            Err(e) => {
                debug!(cmd = cmd_str, error = %e, "request failed");
                err(id, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{EchoCompleter, RecordingSleeper, ScriptedCompleter};

    fn echo_core(dir: &std::path::Path) -> Core {
        Core::with_backend(
            dir.to_path_buf(),
            AppSettings::default(),
            Dictionary::default(),
            Box::new(|_: &AiConfig| -> Result<Box<dyn Completer>, AiError> {
                Ok(Box::new(EchoCompleter::default()))
            }),
            Box::new(RecordingSleeper::default()),
        )
    }

    fn call(core: &mut Core, req: Value) -> (Value, Vec<Value>) {
        let mut events = Vec::new();
        let line = core.handle(&req.to_string(), &mut |e: Value| events.push(e));
        (serde_json::from_str(&line).unwrap(), events)
    }

    #[test]
    fn ping_and_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let mut core = echo_core(dir.path());

        let (resp, _) = call(&mut core, json!({"id": 1, "cmd": "ping"}));
        assert_eq!(resp["status"], "ok");
        assert_eq!(resp["id"], 1);

        let (resp, _) = call(&mut core, json!({"id": 2, "cmd": "nope"}));
        assert_eq!(resp["status"], "error");
        assert_eq!(resp["message"], "unknown command");

        let line = core.handle("{not json", &mut |_: Value| {});
        assert!(line.contains("invalid json"));
    }

    #[test]
    fn table_flow_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut core = echo_core(dir.path());

        let (resp, _) = call(
            &mut core,
            json!({"id": 1, "cmd": "table.load", "payload": {
                "file_name": "menu.csv",
                "text": "jp,note\nこんにちは,greet\nありがとう,thanks\nさようなら,bye"
            }}),
        );
        assert_eq!(resp["status"], "ok", "{resp}");
        assert_eq!(resp["payload"]["table"]["rows"].as_array().unwrap().len(), 3);

        let (resp, events) = call(
            &mut core,
            json!({"id": 2, "cmd": "table.translate_all", "payload": {"batch_size": 2}}),
        );
        assert_eq!(resp["status"], "ok", "{resp}");
        assert_eq!(resp["payload"]["report"]["batches"], 2);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "progress");
        assert_eq!(events[1]["progress"]["translated"], 3);

        let table = &resp["payload"]["table"];
        assert_eq!(table["header"][2], "translation");
        assert_eq!(table["rows"][0][2], "[vi] こんにちは");

        let (resp, _) = call(&mut core, json!({"id": 3, "cmd": "table.export", "payload": {}}));
        assert_eq!(resp["payload"]["file_name"], "menu_translated.csv");
        assert_eq!(resp["payload"]["complete"], true);

        let (resp, _) = call(
            &mut core,
            json!({"id": 4, "cmd": "table.export", "payload": {"dir": dir.path().to_str().unwrap()}}),
        );
        let path = resp["payload"]["path"].as_str().unwrap().to_string();
        assert!(std::fs::read_to_string(path).unwrap().starts_with("jp,note,translation\n"));
    }

    #[test]
    fn table_commands_need_a_loaded_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut core = echo_core(dir.path());

        let (resp, _) = call(&mut core, json!({"id": 1, "cmd": "table.reset"}));
        assert_eq!(resp["status"], "error");

        let (resp, _) = call(
            &mut core,
            json!({"id": 2, "cmd": "table.load", "payload": {"file_name": "x.csv", "text": "  "}}),
        );
        assert_eq!(resp["status"], "error");
    }

    #[test]
    fn json_flow_with_manual_edit() {
        let dir = tempfile::tempdir().unwrap();
        let mut core = echo_core(dir.path());

        let (resp, _) = call(
            &mut core,
            json!({"id": 1, "cmd": "json.load", "payload": {
                "file_name": "System.json",
                "text": r#"{"gameTitle":"勇者","terms":{"basic":["レベル","HP"]},"faceName":"Actor1"}"#
            }}),
        );
        assert_eq!(resp["status"], "ok", "{resp}");
        assert_eq!(resp["payload"]["entries"].as_array().unwrap().len(), 3);

        let (resp, _) = call(
            &mut core,
            json!({"id": 2, "cmd": "json.mutate_entry", "payload": {"index": 0, "translation": "Dũng sĩ"}}),
        );
        assert_eq!(resp["status"], "ok");

        let (resp, _) = call(&mut core, json!({"id": 3, "cmd": "json.export", "payload": {"lang": "vi"}}));
        assert_eq!(resp["payload"]["file_name"], "System_vi.json");
        let doc: Value = serde_json::from_str(resp["payload"]["content"].as_str().unwrap()).unwrap();
        assert_eq!(doc["gameTitle"], "Dũng sĩ");
        assert_eq!(doc["faceName"], "Actor1");
    }

    #[test]
    fn dictionary_is_saved_and_applied() {
        let dir = tempfile::tempdir().unwrap();
        let mut core = echo_core(dir.path());

        let (resp, _) = call(
            &mut core,
            json!({"id": 1, "cmd": "dictionary.save", "payload": {"entries": [
                {"find": "Hero", "replace": "Anh hùng"},
                {"find": "", "replace": "x"}
            ]}}),
        );
        assert_eq!(resp["payload"]["entries"].as_array().unwrap().len(), 1);

        let (resp, _) = call(
            &mut core,
            json!({"id": 2, "cmd": "dictionary.apply", "payload": {"text": "Hero rises"}}),
        );
        assert_eq!(resp["payload"]["text"], "Anh hùng rises");

        assert_eq!(dictionary::load(dir.path()).len(), 1);
    }

    #[test]
    fn settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut core = echo_core(dir.path());

        let (resp, _) = call(
            &mut core,
            json!({"id": 1, "cmd": "settings.save", "payload": {"settings": {"model": "gpt-4o", "tabular_batch_size": 0}}}),
        );
        assert_eq!(resp["payload"]["settings"]["model"], "gpt-4o");
        assert_eq!(resp["payload"]["settings"]["tabular_batch_size"], 1);

        let (resp, _) = call(&mut core, json!({"id": 2, "cmd": "settings.get"}));
        assert_eq!(resp["payload"]["settings"]["model"], "gpt-4o");
        assert_eq!(settings::load(dir.path()).unwrap().model, "gpt-4o");
    }

    #[test]
    fn quiz_validation_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut core = Core::with_backend(
            dir.path().to_path_buf(),
            AppSettings::default(),
            Dictionary::default(),
            Box::new(|_: &AiConfig| -> Result<Box<dyn Completer>, AiError> {
                Ok(Box::new(ScriptedCompleter::new(vec![Ok("no json here".into())])))
            }),
            Box::new(RecordingSleeper::default()),
        );

        let (resp, _) = call(
            &mut core,
            json!({"id": 1, "cmd": "quiz.generate", "payload": {"topic": "Lịch sử"}}),
        );
        assert_eq!(resp["status"], "error");
        assert_eq!(resp["message"], "Phản hồi AI không chứa JSON");
    }

    #[test]
    fn missing_api_key_fails_before_any_call() {
        let dir = tempfile::tempdir().unwrap();
        let mut core = Core::with_backend(
            dir.path().to_path_buf(),
            AppSettings::default(),
            Dictionary::default(),
            Box::new(|_: &AiConfig| -> Result<Box<dyn Completer>, AiError> {
                Err(AiError::Config("api_key is required".into()))
            }),
            Box::new(RecordingSleeper::default()),
        );

        call(
            &mut core,
            json!({"id": 1, "cmd": "table.load", "payload": {"file_name": "a.csv", "text": "a\nx"}}),
        );
        let (resp, events) = call(&mut core, json!({"id": 2, "cmd": "table.translate_all"}));
        assert_eq!(resp["status"], "error");
        assert!(events.is_empty());
    }

    #[test]
    fn number_tools() {
        let dir = tempfile::tempdir().unwrap();
        let mut core = echo_core(dir.path());

        let (resp, _) = call(
            &mut core,
            json!({"id": 1, "cmd": "number.parse", "payload": {"text": "1.234.567 đ"}}),
        );
        assert_eq!(resp["payload"]["value"], 1_234_567.0);

        let (resp, _) = call(
            &mut core,
            json!({"id": 2, "cmd": "number.format", "payload": {"value": 1500000, "currency": true}}),
        );
        assert_eq!(resp["payload"]["text"], "1.500.000 ₫");

        let (resp, _) = call(
            &mut core,
            json!({"id": 3, "cmd": "loan.schedule", "payload": {
                "principal": "12.000.000", "annual_rate": 12, "months": 12, "method": "declining"
            }}),
        );
        assert_eq!(resp["status"], "ok", "{resp}");
        assert_eq!(resp["payload"]["total_interest"], 780_000.0);

        for months in [4_294_967_295_u64, 1_000_000_000_000] {
            let (resp, _) = call(
                &mut core,
                json!({"id": 4, "cmd": "loan.schedule", "payload": {
                    "principal": 1000, "annual_rate": 5, "months": months
                }}),
            );
            assert_eq!(resp["status"], "error");
        }
    }
}

//! `table.*` and `json.*` commands: the two translator sessions.

use std::path::Path;

use serde_json::{json, Value};
use tracing::{debug, info};

use super::{progress_event, required_index, text_field, Core};
use crate::error::CoreError;
use crate::services::encoding;
use crate::services::export::Export;
use crate::services::pipeline::{DispatchOptions, Dispatcher};
use crate::services::session::{JsonSession, Progress, TableSession};
use crate::services::{qa, store};

/// `(file_name, text)` from `payload.text` or, failing that, `payload.path`.
fn source_text(payload: &Value, fallback_name: &str) -> Result<(String, String), CoreError> {
    if let Some(text) = payload.get("text").and_then(Value::as_str) {
        let name = text_field(payload, "file_name").unwrap_or(fallback_name);
        return Ok((name.to_string(), text.to_string()));
    }

    let path = text_field(payload, "path")
        .map(Path::new)
        .ok_or_else(|| CoreError::invalid("payload.text or payload.path is required"))?;

    let (text, enc) = encoding::read_text(path)?;
    debug!(path = %path.display(), encoding = enc, "decoded input file");

    let name = text_field(payload, "file_name")
        .or_else(|| path.file_name().and_then(|n| n.to_str()))
        .unwrap_or(fallback_name);
    Ok((name.to_string(), text))
}

fn context_of(payload: &Value) -> Option<String> {
    text_field(payload, "context").map(str::to_string)
}

/// Writes the export next to `payload.dir` when given.
fn deliver(export: Export, payload: &Value) -> Result<Value, CoreError> {
    let mut out = serde_json::to_value(&export).map_err(|e| CoreError::invalid(e.to_string()))?;

    if let Some(dir) = text_field(payload, "dir") {
        let path = Path::new(dir).join(&export.file_name);
        store::write_atomic(&path, export.content.as_bytes())?;
        info!(path = %path.display(), complete = export.complete, "exported");
        out["path"] = json!(path.to_string_lossy());
    }

    Ok(out)
}

fn table_snapshot(s: &TableSession) -> Value {
    let table = s.table();
    json!({
        "file_name": s.file_name(),
        "delimiter": table.delimiter,
        "header": table.header(),
        "rows": table.rows(),
        "statuses": s.tracker().statuses(),
        "source_column": s.source_column(),
        "target_column": s.target_column(),
        "progress": s.tracker().progress()
    })
}

fn json_snapshot(s: &JsonSession) -> Value {
    json!({
        "file_name": s.file_name(),
        "entries": s.entries(),
        "statuses": s.tracker().statuses(),
        "progress": s.tracker().progress()
    })
}

fn no_table() -> CoreError {
    CoreError::invalid("Chưa tải tệp CSV/TSV")
}

fn no_json() -> CoreError {
    CoreError::invalid("Chưa tải tệp JSON")
}

impl Core {
    pub(super) fn table_load(&mut self, payload: &Value) -> Result<Value, CoreError> {
        let (file_name, text) = source_text(payload, "data.csv")?;
        let session = TableSession::load(&file_name, &text)?;
        info!(
            file = %file_name,
            rows = session.table().row_count(),
            columns = session.table().width(),
            "table loaded"
        );

        let snapshot = table_snapshot(&session);
        self.table = Some(session);
        Ok(json!({ "table": snapshot }))
    }

    pub(super) fn table_designate(&mut self, payload: &Value) -> Result<Value, CoreError> {
        let source = required_index(payload, "source_column")?;
        let target = payload
            .get("target_column")
            .and_then(Value::as_u64)
            .map(|v| v as usize);

        let session = self.table.as_mut().ok_or_else(no_table)?;
        session.designate(source, target)?;
        Ok(json!({ "table": table_snapshot(session) }))
    }

    pub(super) fn table_translate_all(
        &mut self,
        id: &Value,
        payload: &Value,
        notify: &mut dyn FnMut(Value),
    ) -> Result<Value, CoreError> {
        if self.table.is_none() {
            return Err(no_table());
        }
        let settings = self.request_settings(payload);
        let options = DispatchOptions::tabular(&settings).with_context(context_of(payload));
        let mut completer = self.completer_for(&settings)?;

        let session = self.table.as_mut().ok_or_else(no_table)?;
        let mut dispatcher = Dispatcher::new(
            completer.as_mut(),
            self.sleeper.as_mut(),
            &self.dictionary,
            options,
        );

        let report = session.translate_all(&mut dispatcher, &mut |p: Progress| {
            notify(progress_event(id, "table", p))
        });

        Ok(json!({
            "report": report,
            "table": table_snapshot(session)
        }))
    }

    pub(super) fn table_translate_row(&mut self, payload: &Value) -> Result<Value, CoreError> {
        let row = required_index(payload, "row")?;
        if self.table.is_none() {
            return Err(no_table());
        }
        let settings = self.request_settings(payload);
        let options = DispatchOptions::tabular(&settings).with_context(context_of(payload));
        let mut completer = self.completer_for(&settings)?;

        let session = self.table.as_mut().ok_or_else(no_table)?;
        let mut dispatcher = Dispatcher::new(
            completer.as_mut(),
            self.sleeper.as_mut(),
            &self.dictionary,
            options,
        );

        let outcome = session.translate_row(&mut dispatcher, row)?;
        Ok(json!({
            "outcome": outcome,
            "row": session.table().rows().get(row),
            "progress": session.tracker().progress()
        }))
    }

    pub(super) fn table_mutate_row(&mut self, payload: &Value) -> Result<Value, CoreError> {
        let row = required_index(payload, "row")?;
        let value = payload
            .get("value")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::invalid("payload.value is required"))?
            .to_string();

        let session = self.table.as_mut().ok_or_else(no_table)?;
        let column = match payload.get("column").and_then(Value::as_u64) {
            Some(c) => c as usize,
            None => session
                .target_column()
                .ok_or_else(|| CoreError::invalid("payload.column is required"))?,
        };

        session.mutate_row(row, column, value)?;
        Ok(json!({ "row": session.table().rows().get(row) }))
    }

    pub(super) fn table_reset(&mut self) -> Result<Value, CoreError> {
        let session = self.table.as_mut().ok_or_else(no_table)?;
        session.reset();
        Ok(json!({ "progress": session.tracker().progress() }))
    }

    pub(super) fn table_export(&mut self, payload: &Value) -> Result<Value, CoreError> {
        let session = self.table.as_ref().ok_or_else(no_table)?;
        deliver(session.export()?, payload)
    }

    pub(super) fn table_qa(&mut self) -> Result<Value, CoreError> {
        let session = self.table.as_ref().ok_or_else(no_table)?;
        Ok(json!({ "issues": qa::run_table(session) }))
    }

    pub(super) fn json_load(&mut self, payload: &Value) -> Result<Value, CoreError> {
        let (file_name, text) = source_text(payload, "data.json")?;
        let session = JsonSession::load(&file_name, &text, &self.settings.skip_keys)?;
        info!(file = %file_name, entries = session.entries().len(), "json loaded");

        let snapshot = json_snapshot(&session);
        self.json = Some(session);
        Ok(snapshot)
    }

    pub(super) fn json_translate_all(
        &mut self,
        id: &Value,
        payload: &Value,
        notify: &mut dyn FnMut(Value),
    ) -> Result<Value, CoreError> {
        if self.json.is_none() {
            return Err(no_json());
        }
        let settings = self.request_settings(payload);
        let options = DispatchOptions::json(&settings).with_context(context_of(payload));
        let mut completer = self.completer_for(&settings)?;

        let session = self.json.as_mut().ok_or_else(no_json)?;
        let mut dispatcher = Dispatcher::new(
            completer.as_mut(),
            self.sleeper.as_mut(),
            &self.dictionary,
            options,
        );

        let report = session.translate_all(&mut dispatcher, &mut |p: Progress| {
            notify(progress_event(id, "json", p))
        });

        let mut out = json_snapshot(session);
        out["report"] = json!(report);
        Ok(out)
    }

    pub(super) fn json_translate_entry(&mut self, payload: &Value) -> Result<Value, CoreError> {
        let index = required_index(payload, "index")?;
        if self.json.is_none() {
            return Err(no_json());
        }
        let settings = self.request_settings(payload);
        let options = DispatchOptions::json(&settings).with_context(context_of(payload));
        let mut completer = self.completer_for(&settings)?;

        let session = self.json.as_mut().ok_or_else(no_json)?;
        let mut dispatcher = Dispatcher::new(
            completer.as_mut(),
            self.sleeper.as_mut(),
            &self.dictionary,
            options,
        );

        let outcome = session.translate_entry(&mut dispatcher, index)?;
        Ok(json!({
            "outcome": outcome,
            "entry": session.entries().get(index),
            "progress": session.tracker().progress()
        }))
    }

    pub(super) fn json_mutate_entry(&mut self, payload: &Value) -> Result<Value, CoreError> {
        let index = required_index(payload, "index")?;
        let translation = payload
            .get("translation")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::invalid("payload.translation is required"))?
            .to_string();

        let session = self.json.as_mut().ok_or_else(no_json)?;
        session.mutate_entry(index, translation)?;
        Ok(json!({ "entry": session.entries().get(index) }))
    }

    pub(super) fn json_reset(&mut self) -> Result<Value, CoreError> {
        let session = self.json.as_mut().ok_or_else(no_json)?;
        session.reset();
        Ok(json!({ "progress": session.tracker().progress() }))
    }

    pub(super) fn json_export(&mut self, payload: &Value) -> Result<Value, CoreError> {
        let lang = text_field(payload, "lang").unwrap_or(&self.settings.target_code);
        let session = self.json.as_ref().ok_or_else(no_json)?;
        deliver(session.export(lang)?, payload)
    }

    pub(super) fn json_qa(&mut self) -> Result<Value, CoreError> {
        let session = self.json.as_ref().ok_or_else(no_json)?;
        Ok(json!({ "issues": qa::run_entries(session) }))
    }
}

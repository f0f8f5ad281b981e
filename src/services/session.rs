//! Owned state of the two translation tools.
//!
//! Each session is mutated only between remote calls by the single protocol
//! loop, so a batch's writes land before the next batch is sent.

use std::ops::Range;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CoreError, ParseError};
use crate::model::entry::{RowStatus, TranslationEntry};
use crate::model::table::Table;
use crate::parsers::{rpgmaker, tabular};
use crate::services::ai_types::{BatchOutcome, RunReport};
use crate::services::export::{self, Export};
use crate::services::pipeline::Dispatcher;

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Progress {
    pub total: usize,
    pub pending: usize,
    pub translated: usize,
    pub errors: usize,
    pub percent: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusTracker {
    statuses: Vec<RowStatus>,
}

impl StatusTracker {
    pub fn new(len: usize) -> Self {
        Self {
            statuses: vec![RowStatus::Pending; len],
        }
    }

    pub fn reset(&mut self, len: usize) {
        self.statuses.clear();
        self.statuses.resize(len, RowStatus::Pending);
    }

    pub fn statuses(&self) -> &[RowStatus] {
        &self.statuses
    }

    pub fn get(&self, index: usize) -> Option<RowStatus> {
        self.statuses.get(index).copied()
    }

    pub fn set(&mut self, index: usize, status: RowStatus) {
        if let Some(s) = self.statuses.get_mut(index) {
            *s = status;
        }
    }

    pub fn mark(&mut self, range: Range<usize>, status: RowStatus) {
        let end = range.end.min(self.statuses.len());
        let start = range.start.min(end);
        for s in &mut self.statuses[start..end] {
            *s = status;
        }
    }

    pub fn progress(&self) -> Progress {
        let total = self.statuses.len();
        let done = self.statuses.iter().filter(|s| s.is_done()).count();
        let translated = self.count(RowStatus::Translated);
        let errors = done - translated;
        let percent = if total == 0 {
            100.0
        } else {
            done as f64 * 100.0 / total as f64
        };

        Progress {
            total,
            pending: total - done,
            translated,
            errors,
            percent,
        }
    }

    pub fn all_translated(&self) -> bool {
        self.statuses.iter().all(|s| *s == RowStatus::Translated)
    }

    fn count(&self, status: RowStatus) -> usize {
        self.statuses.iter().filter(|s| **s == status).count()
    }
}

/// Outcome of a single-row (or single-entry) translation.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SingleOutcome {
    pub index: usize,
    pub status: RowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SingleOutcome {
    fn from_result(index: usize, result: &Result<String, crate::error::AiError>) -> Self {
        match result {
            Ok(t) => Self {
                index,
                status: RowStatus::Translated,
                translation: Some(t.clone()),
                error: None,
            },
            Err(e) => Self {
                index,
                status: RowStatus::Error,
                translation: None,
                error: Some(format!("Lỗi dịch dòng {}: {e}", index + 1)),
            },
        }
    }
}

/// CSV/TSV translator state.
#[derive(Debug, Clone)]
pub struct TableSession {
    file_name: String,
    table: Table,
    source_column: usize,
    target_column: Option<usize>,
    tracker: StatusTracker,
}

impl TableSession {
    pub fn load(file_name: &str, text: &str) -> Result<Self, ParseError> {
        let table = tabular::parse(file_name, text)?;
        let tracker = StatusTracker::new(table.row_count());

        Ok(Self {
            file_name: file_name.to_string(),
            table,
            source_column: 0,
            target_column: None,
            tracker,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    pub fn source_column(&self) -> usize {
        self.source_column
    }

    pub fn target_column(&self) -> Option<usize> {
        self.target_column
    }

    /// Chooses the source column and, optionally, an existing target column.
    ///
    /// Without a target the `translation` column is used, created on demand.
    pub fn designate(&mut self, source: usize, target: Option<usize>) -> Result<(), CoreError> {
        let width = self.table.width();
        if source >= width {
            return Err(CoreError::invalid(format!("Cột nguồn {source} không tồn tại")));
        }
        if let Some(t) = target {
            if t >= width {
                return Err(CoreError::invalid(format!("Cột đích {t} không tồn tại")));
            }
            if t == source {
                return Err(CoreError::invalid("Cột nguồn và cột đích phải khác nhau"));
            }
        }

        self.source_column = source;
        self.target_column = target;
        Ok(())
    }

    fn ensure_target(&mut self) -> usize {
        match self.target_column {
            Some(t) => t,
            None => {
                let t = self.table.ensure_translation_column(self.source_column);
                self.target_column = Some(t);
                t
            }
        }
    }

    /// Manual edit of one cell; the row status is left alone.
    pub fn mutate_row(&mut self, row: usize, column: usize, value: String) -> Result<(), CoreError> {
        if self.table.set_cell(row, column, value) {
            Ok(())
        } else {
            Err(CoreError::invalid(format!("Ô ({row}, {column}) không tồn tại")))
        }
    }

    /// Every row back to pending; cell contents are kept.
    pub fn reset(&mut self) {
        self.tracker.reset(self.table.row_count());
    }

    pub fn translate_all(
        &mut self,
        dispatcher: &mut Dispatcher,
        on_progress: &mut dyn FnMut(Progress),
    ) -> RunReport {
        let target = self.ensure_target();
        let sources = self.table.column(self.source_column);
        self.tracker.reset(sources.len());

        let table = &mut self.table;
        let tracker = &mut self.tracker;

        dispatcher.run(&sources, &mut |outcome: BatchOutcome| {
            match outcome.result {
                Ok(lines) => {
                    for (row, line) in outcome.range.clone().zip(lines) {
                        table.set_cell(row, target, line);
                    }
                    tracker.mark(outcome.range, RowStatus::Translated);
                }
                Err(_) => tracker.mark(outcome.range, RowStatus::Error),
            }
            on_progress(tracker.progress());
        })
    }

    pub fn translate_row(
        &mut self,
        dispatcher: &mut Dispatcher,
        row: usize,
    ) -> Result<SingleOutcome, CoreError> {
        if row >= self.table.row_count() {
            return Err(CoreError::invalid(format!("Dòng {row} không tồn tại")));
        }

        let target = self.ensure_target();
        let source = self
            .table
            .cell(row, self.source_column)
            .unwrap_or_default()
            .to_string();

        let result = dispatcher.translate_one(&source);
        let outcome = SingleOutcome::from_result(row, &result);

        if let Ok(t) = result {
            self.table.set_cell(row, target, t);
        }
        self.tracker.set(row, outcome.status);

        Ok(outcome)
    }

    pub fn export(&self) -> Result<Export, ParseError> {
        export::table(&self.file_name, &self.table, self.tracker.all_translated())
    }
}

/// RPG Maker JSON translator state.
#[derive(Debug, Clone)]
pub struct JsonSession {
    file_name: String,
    document: Value,
    entries: Vec<TranslationEntry>,
    tracker: StatusTracker,
}

impl JsonSession {
    pub fn load(file_name: &str, text: &str, skip_keys: &[String]) -> Result<Self, ParseError> {
        let (document, entries) = rpgmaker::extract(text, skip_keys)?;
        let tracker = StatusTracker::new(entries.len());

        Ok(Self {
            file_name: file_name.to_string(),
            document,
            entries,
            tracker,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn entries(&self) -> &[TranslationEntry] {
        &self.entries
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    /// Manual edit of one translation; the status is left alone.
    pub fn mutate_entry(&mut self, index: usize, translation: String) -> Result<(), CoreError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| CoreError::invalid(format!("Mục {index} không tồn tại")))?;

        entry.is_translated = !translation.is_empty();
        entry.translation = translation;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.tracker.reset(self.entries.len());
    }

    pub fn translate_all(
        &mut self,
        dispatcher: &mut Dispatcher,
        on_progress: &mut dyn FnMut(Progress),
    ) -> RunReport {
        let sources: Vec<String> = self.entries.iter().map(|e| e.original.clone()).collect();
        self.tracker.reset(sources.len());

        let entries = &mut self.entries;
        let tracker = &mut self.tracker;

        dispatcher.run(&sources, &mut |outcome: BatchOutcome| {
            match outcome.result {
                Ok(lines) => {
                    for (i, line) in outcome.range.clone().zip(lines) {
                        let entry = &mut entries[i];
                        entry.translation = line;
                        entry.is_translated = true;
                    }
                    tracker.mark(outcome.range, RowStatus::Translated);
                }
                Err(_) => tracker.mark(outcome.range, RowStatus::Error),
            }
            on_progress(tracker.progress());
        })
    }

    pub fn translate_entry(
        &mut self,
        dispatcher: &mut Dispatcher,
        index: usize,
    ) -> Result<SingleOutcome, CoreError> {
        let source = self
            .entries
            .get(index)
            .map(|e| e.original.clone())
            .ok_or_else(|| CoreError::invalid(format!("Mục {index} không tồn tại")))?;

        let result = dispatcher.translate_one(&source);
        let outcome = SingleOutcome::from_result(index, &result);

        if let Ok(t) = result {
            let entry = &mut self.entries[index];
            entry.translation = t;
            entry.is_translated = true;
        }
        self.tracker.set(index, outcome.status);

        Ok(outcome)
    }

    pub fn export(&self, lang_code: &str) -> Result<Export, ParseError> {
        let document = rpgmaker::rebuild(&self.document, &self.entries);
        export::json(
            &self.file_name,
            lang_code,
            &document,
            self.tracker.all_translated(),
        )
    }
}

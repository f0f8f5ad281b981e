use std::ops::Range;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::AiError;
use crate::model::settings::AppSettings;
use crate::services::ai::{complete_with_retry, Completer, RetryPolicy, Sleeper};
use crate::services::ai_types::{BatchOutcome, RunReport};
use crate::services::dictionary::Dictionary;
use crate::services::prompts::{self, PromptSpec};
use crate::services::reconcile::{self, Reconciliation};

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
    pub retry: RetryPolicy,
    pub target_language: String,
    pub style: String,
    pub context: Option<String>,
}

impl DispatchOptions {
    fn base(settings: &AppSettings, batch_size: usize, delay_ms: u64) -> Self {
        Self {
            batch_size,
            inter_batch_delay: Duration::from_millis(delay_ms),
            retry: RetryPolicy::from_settings(settings),
            target_language: settings.target_language.clone(),
            style: settings.style.clone(),
            context: None,
        }
    }

    /// CSV/TSV rows: 100 per batch, 400 ms apart by default.
    pub fn tabular(settings: &AppSettings) -> Self {
        Self::base(settings, settings.tabular_batch_size, settings.tabular_delay_ms)
    }

    /// JSON entries: 50 per batch, 1 s apart by default.
    pub fn json(settings: &AppSettings) -> Self {
        Self::base(settings, settings.json_batch_size, settings.json_delay_ms)
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    fn spec(&self) -> PromptSpec<'_> {
        PromptSpec {
            target_language: &self.target_language,
            style: &self.style,
            context: self.context.as_deref(),
        }
    }
}

/// Contiguous, ascending ranges covering `0..count`.
pub fn plan_batches(count: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..count)
        .step_by(size)
        .map(|start| start..(start + size).min(count))
        .collect()
}

/// Sends source strings to the completer batch by batch, one call at a time.
pub struct Dispatcher<'a> {
    completer: &'a mut dyn Completer,
    sleeper: &'a mut dyn Sleeper,
    dictionary: &'a Dictionary,
    options: DispatchOptions,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        completer: &'a mut dyn Completer,
        sleeper: &'a mut dyn Sleeper,
        dictionary: &'a Dictionary,
        options: DispatchOptions,
    ) -> Self {
        Self {
            completer,
            sleeper,
            dictionary,
            options,
        }
    }

    /// Translates every source, batch after batch.
    ///
    /// `sink` sees each batch's outcome before the next batch is sent. A
    /// failed batch is reported and the run continues with the next one.
    pub fn run(&mut self, sources: &[String], sink: &mut dyn FnMut(BatchOutcome)) -> RunReport {
        let batches = plan_batches(sources.len(), self.options.batch_size);
        let mut report = RunReport::default();

        info!(
            units = sources.len(),
            batches = batches.len(),
            batch_size = self.options.batch_size,
            "translate-all started"
        );

        for (i, range) in batches.iter().enumerate() {
            if i > 0 && !self.options.inter_batch_delay.is_zero() {
                self.sleeper.sleep(self.options.inter_batch_delay);
            }

            debug!(batch = i + 1, start = range.start, end = range.end, "sending batch");
            let (result, realigned) = self.translate_batch(&sources[range.clone()]);

            if let Err(e) = &result {
                error!(start = range.start, end = range.end, error = %e, "batch failed");
            }

            let outcome = BatchOutcome {
                range: range.clone(),
                result,
                realigned,
            };
            report.record(&outcome);
            sink(outcome);
        }

        info!(
            succeeded = report.succeeded_batches,
            failed = report.failed_batches,
            realigned = report.realigned_batches,
            "translate-all finished"
        );

        report
    }

    fn translate_batch(&mut self, items: &[String]) -> (Result<Vec<String>, AiError>, bool) {
        let n = items.len();
        let prompt = prompts::batch_prompt(&self.options.spec(), items);

        let raw = match complete_with_retry(
            &mut *self.completer,
            &mut *self.sleeper,
            &prompt,
            &self.options.retry,
        ) {
            Ok(raw) => raw,
            Err(e) => return (Err(e), false),
        };

        let got = match reconcile::reconcile(&raw, n) {
            Reconciliation::Exact(lines) => return (Ok(self.post_process(lines)), false),
            Reconciliation::Mismatch { got, .. } => got,
        };

        warn!(expected = n, got, "line count mismatch, re-prompting strictly");
        let strict = prompts::strict_batch_prompt(&self.options.spec(), items, got);

        // A strict re-prompt that keeps failing fails the whole batch.
        let raw = match complete_with_retry(
            &mut *self.completer,
            &mut *self.sleeper,
            &strict,
            &self.options.retry,
        ) {
            Ok(raw) => raw,
            Err(e) => return (Err(e), false),
        };

        match reconcile::reconcile(&raw, n) {
            Reconciliation::Exact(lines) => (Ok(self.post_process(lines)), false),
            Reconciliation::Mismatch { items: lines, got, .. } => {
                warn!(expected = n, got, "still mismatched after strict retry, force-aligning");
                let lines = reconcile::force_align(lines, n);
                (Ok(self.post_process(lines)), true)
            }
        }
    }

    fn post_process(&self, lines: Vec<String>) -> Vec<String> {
        if self.dictionary.is_empty() {
            return lines;
        }
        lines.iter().map(|l| self.dictionary.apply(l)).collect()
    }

    /// One string, no numbering and no reconciliation.
    pub fn translate_one(&mut self, source: &str) -> Result<String, AiError> {
        let prompt = prompts::single_prompt(&self.options.spec(), source);
        let raw = complete_with_retry(
            &mut *self.completer,
            &mut *self.sleeper,
            &prompt,
            &self.options.retry,
        )?;
        Ok(self.dictionary.apply(raw.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dictionary::DictEntry;
    use crate::test_support::{EchoCompleter, RecordingSleeper, ScriptedCompleter};
    use proptest::prelude::*;

    fn options(batch_size: usize) -> DispatchOptions {
        let mut o = DispatchOptions::tabular(&AppSettings::default());
        o.batch_size = batch_size;
        o.retry.jitter_ms = 0;
        o
    }

    fn sources(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn batches_run_in_order_with_delay_between() {
        let mut completer = EchoCompleter::default();
        let mut sleeper = RecordingSleeper::default();
        let dict = Dictionary::default();
        let mut d = Dispatcher::new(&mut completer, &mut sleeper, &dict, options(2));

        let mut seen = Vec::new();
        let report = d.run(&sources(5), &mut |o: BatchOutcome| seen.push((o.range.clone(), o.result.unwrap())));

        assert_eq!(report.batches, 3);
        assert_eq!(report.translated_units, 5);
        assert_eq!(
            seen.iter().map(|(r, _)| r.clone()).collect::<Vec<_>>(),
            vec![0..2, 2..4, 4..5]
        );
        assert_eq!(seen[2].1, vec!["[vi] line 4"]);
        assert_eq!(sleeper.sleeps, vec![Duration::from_millis(400); 2]);
    }

    #[test]
    fn mismatch_twice_forces_padding() {
        let mut completer = ScriptedCompleter::new(vec![
            Ok("1. Một\n2. Hai".into()),
            Ok("1. Một\n2. Hai".into()),
        ]);
        let mut sleeper = RecordingSleeper::default();
        let dict = Dictionary::default();
        let mut d = Dispatcher::new(&mut completer, &mut sleeper, &dict, options(10));

        let mut out = Vec::new();
        let report = d.run(&sources(3), &mut |o: BatchOutcome| out.push(o));

        assert_eq!(out.len(), 1);
        assert!(out[0].realigned);
        assert_eq!(out[0].result.as_ref().unwrap(), &vec!["Một", "Hai", ""]);
        assert_eq!(report.realigned_batches, 1);
        assert_eq!(completer.calls(), 2);
        assert!(completer.prompts[1].contains("contained 2 items but exactly 3"));
    }

    #[test]
    fn strict_retry_can_fix_the_count() {
        let mut completer = ScriptedCompleter::new(vec![
            Ok("Một Hai Ba".into()),
            Ok("1. Một\n2. Hai\n3. Ba".into()),
        ]);
        let mut sleeper = RecordingSleeper::default();
        let dict = Dictionary::default();
        let mut d = Dispatcher::new(&mut completer, &mut sleeper, &dict, options(10));

        let mut out = Vec::new();
        d.run(&sources(3), &mut |o: BatchOutcome| out.push(o));

        assert!(!out[0].realigned);
        assert_eq!(out[0].result.as_ref().unwrap(), &vec!["Một", "Hai", "Ba"]);
    }

    #[test]
    fn failing_strict_retry_fails_the_batch() {
        let mut completer = ScriptedCompleter::new(vec![
            Ok("1. Một".into()),
            Err(AiError::Transport("down".into())),
            Err(AiError::Transport("down".into())),
            Err(AiError::Transport("down".into())),
        ]);
        let mut sleeper = RecordingSleeper::default();
        let dict = Dictionary::default();
        let mut d = Dispatcher::new(&mut completer, &mut sleeper, &dict, options(10));

        let mut out = Vec::new();
        let report = d.run(&sources(2), &mut |o: BatchOutcome| out.push(o));

        assert!(out[0].result.is_err());
        assert_eq!(report.failed_units, 2);
        assert_eq!(completer.calls(), 4);
    }

    #[test]
    fn failed_batch_does_not_stop_the_run() {
        let mut completer = EchoCompleter {
            fail_containing: vec!["line 1".into()],
            ..Default::default()
        };
        let mut sleeper = RecordingSleeper::default();
        let dict = Dictionary::default();
        let mut d = Dispatcher::new(&mut completer, &mut sleeper, &dict, options(2));

        let mut results = Vec::new();
        let report = d.run(&sources(4), &mut |o: BatchOutcome| results.push(o.result.is_ok()));

        assert_eq!(results, vec![false, true]);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.errors[0].start, 0);
        assert!(report.errors[0].message.starts_with("Lỗi dịch dòng 1–2"));
        // 3 attempts for the failing batch, 1 for the good one
        assert_eq!(completer.prompts.len(), 4);
        assert_eq!(
            sleeper.sleeps,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_millis(400)
            ]
        );
    }

    #[test]
    fn dictionary_runs_on_every_line() {
        let mut completer = EchoCompleter::default();
        let mut sleeper = RecordingSleeper::default();
        let dict = Dictionary::new(vec![DictEntry {
            find: "[vi]".into(),
            replace: "VI:".into(),
            ignore_case: false,
        }]);
        let mut d = Dispatcher::new(&mut completer, &mut sleeper, &dict, options(10));

        let mut out = Vec::new();
        d.run(&sources(2), &mut |o: BatchOutcome| out.push(o.result.unwrap()));
        assert_eq!(out[0], vec!["VI: line 0", "VI: line 1"]);

        assert_eq!(d.translate_one("chào").unwrap(), "VI: chào");
    }

    #[test]
    fn single_translate_retries() {
        let mut completer = ScriptedCompleter::new(vec![
            Err(AiError::Transport("x".into())),
            Ok("  Xin chào \n".into()),
        ]);
        let mut sleeper = RecordingSleeper::default();
        let dict = Dictionary::default();
        let mut d = Dispatcher::new(&mut completer, &mut sleeper, &dict, options(10));

        assert_eq!(d.translate_one("Hello").unwrap(), "Xin chào");
        assert_eq!(sleeper.sleeps, vec![Duration::from_secs(1)]);
    }

    #[test]
    fn empty_input_sends_nothing() {
        let mut completer = ScriptedCompleter::new(vec![]);
        let mut sleeper = RecordingSleeper::default();
        let dict = Dictionary::default();
        let mut d = Dispatcher::new(&mut completer, &mut sleeper, &dict, options(10));

        let report = d.run(&[], &mut |_: BatchOutcome| {});
        assert_eq!(report, RunReport::default());
        assert_eq!(completer.calls(), 0);
    }

    proptest! {
        #[test]
        fn batches_partition_the_range(count in 0usize..500, size in 0usize..120) {
            let batches = plan_batches(count, size);
            let mut next = 0;
            for b in &batches {
                prop_assert_eq!(b.start, next);
                prop_assert!(b.end > b.start);
                prop_assert!(b.len() <= size.max(1));
                next = b.end;
            }
            prop_assert_eq!(next, count);
        }
    }
}

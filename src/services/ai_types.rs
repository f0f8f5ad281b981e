use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::AiError;

/// Result of one batch, handed to the caller before the next batch starts.
#[derive(Debug)]
pub struct BatchOutcome {
    pub range: Range<usize>,
    pub result: Result<Vec<String>, AiError>,
    /// The answer had the wrong item count and was padded or truncated.
    pub realigned: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BatchError {
    pub start: usize,
    pub end: usize,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub batches: usize,
    pub succeeded_batches: usize,
    pub failed_batches: usize,
    pub translated_units: usize,
    pub failed_units: usize,
    pub realigned_batches: usize,
    pub errors: Vec<BatchError>,
}

impl RunReport {
    pub fn record(&mut self, outcome: &BatchOutcome) {
        self.batches += 1;
        let len = outcome.range.len();

        match &outcome.result {
            Ok(_) => {
                self.succeeded_batches += 1;
                self.translated_units += len;
                if outcome.realigned {
                    self.realigned_batches += 1;
                }
            }
            Err(e) => {
                self.failed_batches += 1;
                self.failed_units += len;
                self.errors.push(BatchError {
                    start: outcome.range.start,
                    end: outcome.range.end,
                    message: format!(
                        "Lỗi dịch dòng {}–{}: {e}",
                        outcome.range.start + 1,
                        outcome.range.end
                    ),
                });
            }
        }
    }
}

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::entry::RowStatus;
use crate::services::session::{JsonSession, TableSession};

/// RPG Maker escape codes (`\V[1]`, `\C[2]`, `\G`), `%1`, `{0}`/`{name}`, `<tags>`.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\[A-Za-z]+\[\d+\]|\\[A-Za-z{}$.|!><^]|%\d+|\{[A-Za-z0-9_]*\}|</?[A-Za-z][^<>]*>")
        .expect("placeholder regex")
});

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct QaIssue {
    pub index: usize,
    pub code: String,
    pub message: String,
}

fn placeholders(text: &str) -> Vec<&str> {
    let mut v: Vec<&str> = PLACEHOLDER.find_iter(text).map(|m| m.as_str()).collect();
    v.sort_unstable();
    v
}

pub fn check(index: usize, original: &str, translation: &str, status: RowStatus) -> Vec<QaIssue> {
    let mut issues = Vec::new();
    let original_trim = original.trim();
    let translation_trim = translation.trim();

    let issue = |code: &str, message: String| QaIssue {
        index,
        code: code.to_string(),
        message,
    };

    if status == RowStatus::Error {
        issues.push(issue(
            "FAILED",
            "Dòng này dịch lỗi, hãy thử dịch lại từng dòng".to_string(),
        ));
    }

    if status == RowStatus::Translated && translation_trim.is_empty() && !original_trim.is_empty() {
        issues.push(issue(
            "TRANSLATED_BUT_EMPTY",
            "Đã đánh dấu dịch xong nhưng bản dịch trống".to_string(),
        ));
    }

    if !translation_trim.is_empty() && translation_trim == original_trim {
        issues.push(issue(
            "SAME_AS_ORIGINAL",
            "Bản dịch giống hệt bản gốc".to_string(),
        ));
    }

    if !translation_trim.is_empty() {
        let expected = placeholders(original);
        let found = placeholders(translation);
        if expected != found {
            issues.push(issue(
                "PLACEHOLDER_MISMATCH",
                format!(
                    "Mã giữ chỗ không khớp: gốc [{}], bản dịch [{}]",
                    expected.join(" "),
                    found.join(" ")
                ),
            ));
        }
    }

    issues
}

pub fn run_table(session: &TableSession) -> Vec<QaIssue> {
    let Some(target) = session.target_column() else {
        return Vec::new();
    };
    let table = session.table();
    let source = session.source_column();

    (0..table.row_count())
        .flat_map(|row| {
            check(
                row,
                table.cell(row, source).unwrap_or_default(),
                table.cell(row, target).unwrap_or_default(),
                session.tracker().get(row).unwrap_or_default(),
            )
        })
        .collect()
}

pub fn run_entries(session: &JsonSession) -> Vec<QaIssue> {
    session
        .entries()
        .iter()
        .enumerate()
        .flat_map(|(i, e)| {
            check(
                i,
                &e.original,
                &e.translation,
                session.tracker().get(i).unwrap_or_default(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(issues: &[QaIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn detects_lost_placeholders() {
        let issues = check(
            0,
            "\\N[1] got %1 gold! <br>",
            "\\N[1] nhận được vàng!",
            RowStatus::Translated,
        );
        assert_eq!(codes(&issues), vec!["PLACEHOLDER_MISMATCH"]);
    }

    #[test]
    fn reordered_placeholders_are_fine() {
        let issues = check(0, "{0} hits {1}", "{1} bị {0} đánh", RowStatus::Translated);
        assert!(issues.is_empty());
    }

    #[test]
    fn status_issues() {
        assert_eq!(
            codes(&check(2, "Hello", "", RowStatus::Translated)),
            vec!["TRANSLATED_BUT_EMPTY"]
        );
        assert_eq!(codes(&check(2, "Hello", "", RowStatus::Error)), vec!["FAILED"]);
        assert_eq!(
            codes(&check(2, "OK", " OK ", RowStatus::Translated)),
            vec!["SAME_AS_ORIGINAL"]
        );
        assert!(check(2, "", "", RowStatus::Pending).is_empty());
    }

    #[test]
    fn table_without_target_has_no_issues() {
        let s = TableSession::load("x.csv", "a,b\n1,2").unwrap();
        assert!(run_table(&s).is_empty());
    }
}

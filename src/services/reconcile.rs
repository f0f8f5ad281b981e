use once_cell::sync::Lazy;
use regex::Regex;

/// `12. text` at the start of a line; the text may be empty.
static NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\.(?:\s+|$)(.*)$").expect("numbered-line regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Exact(Vec<String>),
    Mismatch {
        items: Vec<String>,
        expected: usize,
        got: usize,
    },
}

fn is_fence(line: &str) -> bool {
    line.trim().starts_with("```")
}

fn is_noise(line: &str) -> bool {
    line.trim().is_empty() || is_fence(line)
}

/// Splits a model answer into items.
///
/// Numbered lines start items and unnumbered lines continue the previous
/// one (joined with `\n`, blank lines inside an item kept, trailing ones
/// dropped); anything before the first number is dropped. Without any
/// numbered line every non-blank line is an item.
pub fn parse_items(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut numbered = false;

    for line in raw.lines() {
        if is_fence(line) {
            continue;
        }

        if let Some(caps) = NUMBERED.captures(line) {
            numbered = true;
            let text = caps.get(1).map_or("", |m| m.as_str());
            items.push(text.trim().to_string());
        } else if let Some(last) = items.last_mut() {
            last.push('\n');
            last.push_str(line.trim());
        }
    }

    if numbered {
        return items
            .into_iter()
            .map(|item| item.trim_end_matches('\n').to_string())
            .collect();
    }

    raw.lines()
        .filter(|l| !is_noise(l))
        .map(|l| l.trim().to_string())
        .collect()
}

pub fn reconcile(raw: &str, expected: usize) -> Reconciliation {
    let items = parse_items(raw);
    let got = items.len();

    if got == expected {
        Reconciliation::Exact(items)
    } else {
        Reconciliation::Mismatch {
            items,
            expected,
            got,
        }
    }
}

/// Truncates or pads with empty strings so the result has exactly `n` items.
pub fn force_align(mut items: Vec<String>, n: usize) -> Vec<String> {
    items.resize(n, String::new());
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn blank_lines_inside_an_item_survive() {
        let raw = "1. a\n\nb\n\n\n2. c\n";
        assert_eq!(parse_items(raw), vec!["a\n\nb", "c"]);
    }

    #[test]
    fn numbered_items_with_continuations() {
        let raw = "Here you go:\n1. Xin chào\n2. Dòng một\nDòng hai\n\n3. Tạm biệt";
        assert_eq!(
            parse_items(raw),
            vec!["Xin chào", "Dòng một\nDòng hai", "Tạm biệt"]
        );
    }

    #[test]
    fn empty_numbered_item_counts() {
        let raw = "1. Một\n2.\n3. Ba";
        assert_eq!(parse_items(raw), vec!["Một", "", "Ba"]);
    }

    #[test]
    fn decimals_are_not_markers() {
        let raw = "1. Giá 1.5 kg\n2.5kg là nhiều";
        assert_eq!(parse_items(raw), vec!["Giá 1.5 kg\n2.5kg là nhiều"]);
    }

    #[test]
    fn falls_back_to_raw_lines() {
        let raw = "```\nMột\n\nHai\n```";
        assert_eq!(parse_items(raw), vec!["Một", "Hai"]);
    }

    #[test]
    fn reconcile_reports_mismatch() {
        assert_eq!(
            reconcile("1. a\n2. b", 2),
            Reconciliation::Exact(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            reconcile("1. a\n2. b", 3),
            Reconciliation::Mismatch {
                items: vec!["a".into(), "b".into()],
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn force_align_pads_and_truncates() {
        let two = vec!["x".to_string(), "y".to_string()];
        assert_eq!(force_align(two.clone(), 3), vec!["x", "y", ""]);
        assert_eq!(force_align(two, 1), vec!["x"]);
    }

    proptest! {
        #[test]
        fn aligned_output_has_exactly_n_items(raw in "[0-9a-z. \n`]{0,80}", n in 0usize..20) {
            let items = match reconcile(&raw, n) {
                Reconciliation::Exact(items) => items,
                Reconciliation::Mismatch { items, .. } => force_align(items, n),
            };
            prop_assert_eq!(items.len(), n);
        }
    }
}

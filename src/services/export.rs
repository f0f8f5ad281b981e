use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::model::table::Table;
use crate::parsers::tabular;

/// A file ready to be handed back to the user.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Export {
    pub file_name: String,
    pub content: String,
    /// Every unit ended the last run as translated.
    pub complete: bool,
}

fn stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("output")
        .to_string()
}

/// `people.csv` -> `people_translated.csv` (`.tsv` for tab tables).
pub fn table_file_name(file_name: &str, table: &Table) -> String {
    format!("{}_translated.{}", stem(file_name), table.delimiter.extension())
}

/// `Map001.json` + `vi` -> `Map001_vi.json`.
pub fn json_file_name(file_name: &str, lang_code: &str) -> String {
    let code = lang_code.trim();
    let code = if code.is_empty() { "translated" } else { code };
    format!("{}_{}.json", stem(file_name), code)
}

pub fn table(file_name: &str, table: &Table, complete: bool) -> Result<Export, ParseError> {
    Ok(Export {
        file_name: table_file_name(file_name, table),
        content: tabular::serialize(table)?,
        complete,
    })
}

pub fn json(
    file_name: &str,
    lang_code: &str,
    document: &Value,
    complete: bool,
) -> Result<Export, ParseError> {
    Ok(Export {
        file_name: json_file_name(file_name, lang_code),
        content: serde_json::to_string_pretty(document)?,
        complete,
    })
}

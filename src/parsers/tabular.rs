use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};

use crate::error::ParseError;
use crate::model::table::{Delimiter, Table};

/// How much of the text is scanned when the extension does not decide.
const SAMPLE_CHARS: usize = 2048;

pub fn detect_delimiter(file_name: &str, text: &str) -> Delimiter {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("tsv") => return Delimiter::Tab,
        Some("csv") => return Delimiter::Comma,
        _ => {}
    }

    let (mut tabs, mut commas) = (0usize, 0usize);
    for ch in text.chars().take(SAMPLE_CHARS) {
        match ch {
            '\t' => tabs += 1,
            ',' => commas += 1,
            _ => {}
        }
    }

    // Tab has to strictly win; ties go to comma.
    if tabs > commas {
        Delimiter::Tab
    } else {
        Delimiter::Comma
    }
}

fn normalize(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

fn is_blank(record: &StringRecord) -> bool {
    match record.len() {
        0 => true,
        1 => record.get(0).map_or(true, |c| c.trim().is_empty()),
        _ => false,
    }
}

/// Parses uploaded delimited text into a table.
///
/// The first non-blank record is the header. Quoted cells may hold the
/// delimiter, doubled quotes and line breaks. Data rows are padded or cut
/// to the header width.
pub fn parse(file_name: &str, raw: &str) -> Result<Table, ParseError> {
    let text = normalize(raw);
    let delimiter = detect_delimiter(file_name, &text);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter.as_byte())
        .from_reader(text.as_bytes());

    let mut records: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        if is_blank(&record) {
            continue;
        }
        records.push(record.iter().map(str::to_string).collect());
    }

    let mut iter = records.into_iter();
    let header = iter.next().ok_or(ParseError::Empty)?;

    Ok(Table::new(delimiter, header, iter.collect()))
}

/// Serializes a table with its own delimiter.
///
/// Cells holding the delimiter, a quote or a line break are quoted with
/// inner quotes doubled. Tab output is escaped the same way, so embedded
/// tabs and newlines survive a round trip.
pub fn serialize(table: &Table) -> Result<String, ParseError> {
    let mut writer = WriterBuilder::new()
        .delimiter(table.delimiter.as_byte())
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(table.header())?;
    for row in table.rows() {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ParseError::Write(e.to_string()))?;
    let mut out = String::from_utf8(bytes).map_err(|e| ParseError::Write(e.to_string()))?;

    if out.ends_with('\n') {
        out.pop();
    }

    Ok(out)
}

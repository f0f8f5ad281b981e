use serde::{Deserialize, Serialize};

pub const TRANSLATION_COLUMN: &str = "translation";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Delimiter::Comma => "csv",
            Delimiter::Tab => "tsv",
        }
    }
}

/// Header plus a rectangular grid of cells.
///
/// Every row always has exactly `header.len()` cells; constructors and column
/// insertion keep that true, so callers may index `rows[r][c]` freely.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Table {
    pub delimiter: Delimiter,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(delimiter: Delimiter, header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = header.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Self {
            delimiter,
            header,
            rows,
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h.trim() == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// Returns false when the cell is out of range.
    pub fn set_cell(&mut self, row: usize, column: usize, value: String) -> bool {
        match self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    pub fn column(&self, column: usize) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.get(column).cloned().unwrap_or_default())
            .collect()
    }

    /// Appends a column (empty in every row) and returns its index.
    pub fn push_column(&mut self, name: &str) -> usize {
        self.header.push(name.to_string());
        for row in self.rows.iter_mut() {
            row.push(String::new());
        }
        self.header.len() - 1
    }

    /// Index of a `translation` column other than `source`, appending one
    /// if there is none.
    pub fn ensure_translation_column(&mut self, source: usize) -> usize {
        let existing = self
            .header
            .iter()
            .enumerate()
            .position(|(i, h)| i != source && h.trim() == TRANSLATION_COLUMN);

        match existing {
            Some(i) => i,
            None => self.push_column(TRANSLATION_COLUMN),
        }
    }
}

//! Turns the raw text of a dropped file into a typed record.
//!
//! Tabular input is split on `;`, one row per line, ragged rows kept as-is.
//! Letter input only uses the first non-empty line, which must carry at
//! least seven whitespace-separated tokens.

use crate::config::OutputFormat;
use crate::error::ParseError;

pub const TABULAR_DELIMITER: char = ';';
pub const LETTER_FIELD_COUNT: usize = 7;

/// Rows of text cells in file order. Rows may differ in length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularRecord {
    rows: Vec<Vec<String>>,
}

impl TabularRecord {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Widest row; shorter rows simply have no cells past their end.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// 1-based cell lookup, matching spreadsheet addressing.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        if row == 0 || column == 0 {
            return None;
        }
        self.rows
            .get(row - 1)
            .and_then(|r| r.get(column - 1))
            .map(String::as_str)
    }
}

/// The seven positional fields of a credit-note data line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterRecord {
    pub id: String,
    pub labor_cost: String,
    pub parts_cost: String,
    pub total: String,
    pub movement_reference: String,
    pub debit_code: String,
    pub debit_amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRecord {
    Tabular(TabularRecord),
    Letter(LetterRecord),
}

impl ParsedRecord {
    pub fn format(&self) -> OutputFormat {
        match self {
            ParsedRecord::Tabular(_) => OutputFormat::Tabular,
            ParsedRecord::Letter(_) => OutputFormat::Letter,
        }
    }
}

pub fn parse(format: OutputFormat, content: &str) -> Result<ParsedRecord, ParseError> {
    match format {
        OutputFormat::Tabular => parse_tabular(content).map(ParsedRecord::Tabular),
        OutputFormat::Letter => parse_letter(content).map(ParsedRecord::Letter),
    }
}

pub fn parse_tabular(content: &str) -> Result<TabularRecord, ParseError> {
    let content = strip_bom(content);
    if content.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let rows = content
        .lines()
        .map(|line| {
            line.split(TABULAR_DELIMITER)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(TabularRecord::new(rows))
}

pub fn parse_letter(content: &str) -> Result<LetterRecord, ParseError> {
    let content = strip_bom(content);

    let (index, line) = content
        .lines()
        .enumerate()
        .find(|(_, line)| !line.trim().is_empty())
        .ok_or(ParseError::EmptyInput)?;

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < LETTER_FIELD_COUNT {
        return Err(ParseError::InsufficientFields {
            line: index + 1,
            found: tokens.len(),
            required: LETTER_FIELD_COUNT,
        });
    }

    Ok(LetterRecord {
        id: tokens[0].to_string(),
        labor_cost: tokens[1].to_string(),
        parts_cost: tokens[2].to_string(),
        total: tokens[3].to_string(),
        movement_reference: tokens[4].to_string(),
        debit_code: tokens[5].to_string(),
        debit_amount: tokens[6].to_string(),
    })
}

fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

//! Document extraction records.

use serde::{Deserialize, Serialize};

/// A table recovered from a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub table_num: usize,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    /// Markdown rendering, when the backend only returns that.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Table {
    /// Render as RFC 4180 CSV: header line (if any) then one line per row.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        if !self.headers.is_empty() {
            push_csv_record(&mut out, &self.headers);
        }
        for row in &self.rows {
            push_csv_record(&mut out, row);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }
}

fn push_csv_record(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) || field.starts_with(' ') || field.ends_with(' ') {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// Text and structure extracted from one document. Produced once, consumed once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub tables: Vec<Table>,
    pub formulas: Vec<String>,
    pub page_count: usize,
    pub word_count: usize,
    pub char_count: usize,
}

/// Record as emitted by the extraction model, before normalisation.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawExtractionRecord {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tables: Vec<Table>,
    #[serde(default)]
    formulas: Vec<serde_json::Value>,
    #[serde(default, alias = "page_count")]
    pages: Option<usize>,
    #[serde(default)]
    word_count: Option<usize>,
    #[serde(default)]
    char_count: Option<usize>,
    #[serde(default)]
    output: Option<RawOutputBlock>,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOutputBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    num_pages: Option<usize>,
}

impl From<RawExtractionRecord> for ExtractionResult {
    fn from(raw: RawExtractionRecord) -> Self {
        let text = raw
            .text
            .or_else(|| raw.output.and_then(|o| o.text))
            .unwrap_or_default();
        let formulas = raw
            .formulas
            .into_iter()
            .filter_map(|f| match f {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Object(map) => map
                    .get("latex")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                _ => None,
            })
            .collect();
        let tables = raw
            .tables
            .into_iter()
            .enumerate()
            .map(|(i, mut t)| {
                if t.table_num == 0 {
                    t.table_num = i;
                }
                t
            })
            .collect();

        Self {
            word_count: raw
                .word_count
                .unwrap_or_else(|| text.split_whitespace().count()),
            char_count: raw.char_count.unwrap_or_else(|| text.chars().count()),
            page_count: raw
                .pages
                .or_else(|| raw.metadata.and_then(|m| m.num_pages))
                .unwrap_or_default(),
            text,
            tables,
            formulas,
        }
    }
}

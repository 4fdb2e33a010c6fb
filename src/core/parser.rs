use crate::core::{ParseError, Record};
use serde_json::Value;

/// 解析結果：成功的記錄與每一行的錯誤
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    pub records: Vec<Record>,
    pub errors: Vec<ParseError>,
}

/// Parses line-delimited JSON. Blank lines are skipped; bad lines are
/// reported and parsing carries on with the next one.
pub fn parse(raw: &str) -> ParsedBatch {
    let mut batch = ParsedBatch::default();

    for (line_index, line) in raw.split('\n').enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(value) => match Record::from_value(value) {
                Some(record) => batch.records.push(record),
                None => batch.errors.push(ParseError {
                    line_index,
                    message: "expected a JSON object".to_string(),
                }),
            },
            Err(e) => batch.errors.push(ParseError {
                line_index,
                message: e.to_string(),
            }),
        }
    }

    tracing::debug!(
        "Parsed {} records ({} invalid lines)",
        batch.records.len(),
        batch.errors.len()
    );

    batch
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// 單筆結構化日誌事件；鍵的順序與輸入一致
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// Returns `None` when the value is not a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(data) => Some(Self { data }),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.data)
    }
}

/// Opaque timestamp; whatever the callback hands back is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub Value);

impl Timestamp {
    /// Sentinel used whenever the callback does not supply a timestamp.
    pub fn sentinel() -> Self {
        Self(Value::from(0))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::sentinel()
    }
}

/// Replacement record(s) returned by the callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Single(Record),
    /// Fan-out: every element becomes its own output line.
    Split(Vec<Record>),
}

/// 依 return code 區分的回呼結果
#[derive(Debug, Clone, PartialEq)]
pub enum FilterResult {
    /// code 0: keep the original record and timestamp.
    Keep,
    /// code 1: replace both timestamp and record.
    Replace {
        timestamp: Option<Timestamp>,
        payload: Option<Payload>,
    },
    /// code 2: replace the record, keep the timestamp.
    ReplaceRecord { payload: Option<Payload> },
    /// Any other code: the record is dropped.
    Drop { code: i64 },
}

/// Result of invoking the callback on one record.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Success(FilterResult),
    Failure(String),
}

impl CallbackOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        CallbackOutcome::Failure(reason.into())
    }
}

/// One rendered output event: `[timestamp, record]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLine {
    pub timestamp: Timestamp,
    pub record: Record,
}

impl OutputLine {
    pub fn new(timestamp: Timestamp, record: Record) -> Self {
        Self { timestamp, record }
    }

    pub fn to_json_line(&self) -> String {
        Value::Array(vec![self.timestamp.0.clone(), self.record.clone().into_value()]).to_string()
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_line())
    }
}

/// Input line that could not become a record. `line_index` is zero-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {}: {message}", .line_index + 1)]
pub struct ParseError {
    pub line_index: usize,
    pub message: String,
}

/// Per-record callback failure; never escalates to the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event {index}: {reason}")]
pub struct RecordError {
    pub index: usize,
    pub reason: String,
}

/// 最後一次成功執行的輸入與 filter 文字
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub input: String,
    pub filter: String,
}

const SAMPLE_FILTER: &str = r#"function cb_filter(tag, ts, record)
  local number_start, number_end = record.log:find('%d+')
  local num = tonumber(record.log:sub(number_start, number_end))

  if num % 15 == 0 then
    record.log = 'FizzBuzz'
  elseif num % 5 == 0 then
    record.log = 'Buzz'
  elseif num % 3 == 0 then
    record.log = 'Fizz'
  end

  return 1, ts, record
end
"#;

impl Session {
    pub fn new(input: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            filter: filter.into(),
        }
    }

    /// Built-in content used on first start and after a reset.
    pub fn sample() -> Self {
        let input = (1..=15)
            .map(|i| format!(r#"{{"log": "line {}"}}"#, i))
            .collect::<Vec<_>>()
            .join("\n");
        Self::new(input, SAMPLE_FILTER)
    }
}

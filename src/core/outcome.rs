//! Coercion of raw backend results into [`CallbackOutcome`]s.
//!
//! Both backends speak the runner wire format: one object per record, either
//! `{"result": [code, ts, payload]}` or `{"error": "..."}`.

use crate::core::{CallbackOutcome, FilterResult, Payload, Record, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-record entry as returned by a runner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RawOutcome {
    pub fn result(value: Value) -> Self {
        Self {
            result: Some(value),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
        }
    }
}

impl From<RawOutcome> for CallbackOutcome {
    fn from(raw: RawOutcome) -> Self {
        if let Some(error) = raw.error {
            return CallbackOutcome::Failure(error);
        }
        match raw.result {
            Some(result) => coerce_result(result),
            None => CallbackOutcome::failure("missing result"),
        }
    }
}

/// Interprets a `[code, ts, payload]` tuple.
pub fn coerce_result(result: Value) -> CallbackOutcome {
    let mut tuple = match result {
        Value::Array(items) if !items.is_empty() => items.into_iter(),
        Value::Array(_) => return CallbackOutcome::failure("empty result tuple"),
        other => {
            return CallbackOutcome::failure(format!("result must be an array, got {}", other))
        }
    };

    let code = match tuple.next().and_then(|code| integral(&code)) {
        Some(code) => code,
        None => return CallbackOutcome::failure("return code must be an integer"),
    };

    let filter_result = match code {
        0 => FilterResult::Keep,
        1 | 2 => {
            let timestamp = tuple.next().and_then(non_null).map(Timestamp);
            let payload = match tuple.next().and_then(non_null).map(coerce_payload) {
                Some(Ok(payload)) => Some(payload),
                Some(Err(reason)) => return CallbackOutcome::Failure(reason),
                None => None,
            };
            if code == 1 {
                FilterResult::Replace { timestamp, payload }
            } else {
                FilterResult::ReplaceRecord { payload }
            }
        }
        code => FilterResult::Drop { code },
    };

    CallbackOutcome::Success(filter_result)
}

fn integral(value: &Value) -> Option<i64> {
    if let Some(code) = value.as_i64() {
        return Some(code);
    }
    // Lua numbers may come back as floats (1.0)
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

fn non_null(value: Value) -> Option<Value> {
    (!value.is_null()).then_some(value)
}

fn coerce_payload(value: Value) -> std::result::Result<Payload, String> {
    match value {
        Value::Object(data) => Ok(Payload::Single(Record::new(data))),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                Record::from_value(item)
                    .ok_or_else(|| format!("split payload element {} is not an object", i))
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Payload::Split),
        other => Err(format!(
            "payload must be an object or an array of objects, got {}",
            other
        )),
    }
}

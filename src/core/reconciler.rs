use crate::core::{
    CallbackOutcome, FilterResult, OutputLine, Payload, Record, RecordError, Timestamp,
};
use crate::utils::error::{LabError, Result};

/// 一次執行的彙整結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub output: Vec<OutputLine>,
    pub errors: Vec<RecordError>,
    /// Records dropped on purpose by the callback (not errors).
    pub dropped: usize,
}

/// Turns backend outcomes into the output sequence.
///
/// Outcome `i` belongs to `records[i]`; each index contributes a contiguous
/// segment of zero or more lines, in index order. A count mismatch fails the
/// whole batch before anything is emitted. Per-record problems are collected
/// into [`Reconciliation::errors`] and never abort the batch.
pub fn reconcile(records: &[Record], outcomes: Vec<CallbackOutcome>) -> Result<Reconciliation> {
    if records.len() != outcomes.len() {
        return Err(LabError::BatchShapeMismatch {
            records: records.len(),
            outcomes: outcomes.len(),
        });
    }

    let mut reconciliation = Reconciliation::default();

    for (index, (record, outcome)) in records.iter().zip(outcomes).enumerate() {
        let result = match outcome {
            CallbackOutcome::Success(result) => result,
            CallbackOutcome::Failure(reason) => {
                tracing::warn!("Error processing event {}: {}", index, reason);
                reconciliation.errors.push(RecordError { index, reason });
                continue;
            }
        };

        let (timestamp, payload) = match result {
            FilterResult::Keep => (Timestamp::sentinel(), Payload::Single(record.clone())),
            FilterResult::Replace {
                timestamp: Some(timestamp),
                payload: Some(payload),
            } => (timestamp, payload),
            FilterResult::Replace { timestamp, .. } => {
                let missing = if timestamp.is_none() {
                    "timestamp"
                } else {
                    "record"
                };
                reconciliation.errors.push(malformed(index, 1, missing));
                continue;
            }
            FilterResult::ReplaceRecord {
                payload: Some(payload),
            } => (Timestamp::sentinel(), payload),
            FilterResult::ReplaceRecord { payload: None } => {
                reconciliation.errors.push(malformed(index, 2, "record"));
                continue;
            }
            FilterResult::Drop { code } => {
                tracing::trace!("Event {} dropped (code {})", index, code);
                reconciliation.dropped += 1;
                continue;
            }
        };

        emit(&mut reconciliation.output, timestamp, payload);
    }

    Ok(reconciliation)
}

fn malformed(index: usize, code: i64, missing: &str) -> RecordError {
    let error = RecordError {
        index,
        reason: format!("return code {} requires a {} but none was returned", code, missing),
    };
    tracing::warn!("Invalid result for {}", error);
    error
}

fn emit(output: &mut Vec<OutputLine>, timestamp: Timestamp, payload: Payload) {
    match payload {
        Payload::Single(record) => output.push(OutputLine::new(timestamp, record)),
        Payload::Split(records) => output.extend(
            records
                .into_iter()
                .map(|record| OutputLine::new(timestamp.clone(), record)),
        ),
    }
}

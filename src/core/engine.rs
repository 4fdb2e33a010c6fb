use crate::core::parser::parse;
use crate::core::reconciler::reconcile;
use crate::core::{ExecutionBackend, OutputLine, ParseError, RecordError, Session, SessionStore};
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 單次執行的統計數據
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub backend: String,
    pub records: usize,
    pub invalid_lines: usize,
    pub emitted: usize,
    pub dropped: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Everything a successful run produced, diagnostics included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub session: Session,
    pub output: Vec<OutputLine>,
    pub parse_errors: Vec<ParseError>,
    pub record_errors: Vec<RecordError>,
    pub stats: RunStats,
}

impl RunReport {
    /// Output events, one JSON array per line.
    pub fn render(&self) -> String {
        self.output
            .iter()
            .map(OutputLine::to_json_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse → execute → reconcile → persist, once per call.
pub struct FilterEngine<S: SessionStore> {
    backend: Arc<dyn ExecutionBackend>,
    store: S,
}

impl<S: SessionStore> FilterEngine<S> {
    pub fn new(backend: Arc<dyn ExecutionBackend>, store: S) -> Self {
        Self { backend, store }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs the filter over the session's input.
    ///
    /// Batch-level failures (backend errors, outcome count mismatch) are
    /// returned as errors and nothing is persisted. Invalid input lines and
    /// per-record callback failures end up in the report instead.
    pub async fn run(&self, session: &Session) -> Result<RunReport> {
        let started = Instant::now();

        let batch = parse(&session.input);
        for error in &batch.errors {
            tracing::warn!("Skipping invalid input {}", error);
        }

        tracing::debug!(
            "Executing filter on {} records with '{}' backend",
            batch.records.len(),
            self.backend.name()
        );
        let outcomes = self.backend.execute(&batch.records, &session.filter).await?;

        let reconciliation = reconcile(&batch.records, outcomes)?;

        self.store.save(session).await?;

        let stats = RunStats {
            backend: self.backend.name().to_string(),
            records: batch.records.len(),
            invalid_lines: batch.errors.len(),
            emitted: reconciliation.output.len(),
            dropped: reconciliation.dropped,
            failed: reconciliation.errors.len(),
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "📊 Run finished - records: {}, emitted: {}, dropped: {}, failed: {}, invalid lines: {}, time: {:?}",
            stats.records,
            stats.emitted,
            stats.dropped,
            stats.failed,
            stats.invalid_lines,
            stats.elapsed
        );

        Ok(RunReport {
            session: session.clone(),
            output: reconciliation.output,
            parse_errors: batch.errors,
            record_errors: reconciliation.errors,
            stats,
        })
    }
}

//! Debounced, single-flight scheduling of filter runs.
//!
//! The controller is an actor task. It owns the pending request together
//! with its deadline and the state of the in-flight run, so scheduling
//! decisions never race with each other. Callers talk to it through a
//! [`ControllerHandle`].

use crate::core::engine::{FilterEngine, RunReport};
use crate::core::{Session, SessionStore};
use crate::utils::error::{LabError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};

pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(1000);

/// Work the controller dispatches once a request survives the quiet interval.
#[async_trait::async_trait]
pub trait RunTask: Send + Sync + 'static {
    async fn execute_run(&self, session: Session) -> Result<RunReport>;
}

#[async_trait::async_trait]
impl<S: SessionStore + 'static> RunTask for FilterEngine<S> {
    async fn execute_run(&self, session: Session) -> Result<RunReport> {
        self.run(&session).await
    }
}

/// Observable controller transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A request was (re)scheduled; any earlier pending request is gone.
    Scheduled,
    Started,
    /// The quiet interval elapsed while a run was in flight.
    Discarded,
    Completed { emitted: usize },
    Failed { message: String },
}

enum ControllerState {
    Idle,
    Running(JoinHandle<Result<RunReport>>),
}

struct PendingRun {
    session: Session,
    deadline: Instant,
}

pub struct ExecutionController<T: RunTask> {
    task: Arc<T>,
    quiet_interval: Duration,
    state: ControllerState,
    pending: Option<PendingRun>,
    requests: mpsc::UnboundedReceiver<Session>,
    reports: watch::Sender<Option<Arc<RunReport>>>,
    events: broadcast::Sender<ControllerEvent>,
}

impl<T: RunTask> ExecutionController<T> {
    /// Starts the controller on the current tokio runtime.
    ///
    /// The returned join handle resolves once every [`ControllerHandle`] has
    /// been dropped and the in-flight run, if any, has finished. A request
    /// still waiting out its quiet interval at that point is abandoned.
    pub fn spawn(task: Arc<T>, quiet_interval: Duration) -> (ControllerHandle, JoinHandle<()>) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = watch::channel(None);
        let (event_tx, _) = broadcast::channel(64);

        let controller = Self {
            task,
            quiet_interval,
            state: ControllerState::Idle,
            pending: None,
            requests: request_rx,
            reports: report_tx,
            events: event_tx.clone(),
        };

        let join = tokio::spawn(controller.run_loop());
        let handle = ControllerHandle {
            requests: request_tx,
            reports: report_rx,
            events: event_tx,
        };
        (handle, join)
    }

    async fn run_loop(mut self) {
        tracing::debug!("Execution controller started (quiet interval {:?})", self.quiet_interval);

        loop {
            let deadline = self.pending.as_ref().map(|pending| pending.deadline);

            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(session) => self.schedule(session),
                    None => break,
                },
                _ = wait_deadline(deadline), if deadline.is_some() => self.fire(),
                joined = wait_running(&mut self.state), if self.is_running() => self.complete(joined),
            }
        }

        if let ControllerState::Running(handle) = std::mem::replace(&mut self.state, ControllerState::Idle) {
            let joined = handle.await;
            self.complete(joined);
        }
        tracing::debug!("Execution controller stopped");
    }

    fn is_running(&self) -> bool {
        matches!(self.state, ControllerState::Running(_))
    }

    fn schedule(&mut self, session: Session) {
        // 新的請求取代尚未觸發的請求，並重新計時
        self.pending = Some(PendingRun {
            session,
            deadline: Instant::now() + self.quiet_interval,
        });
        self.emit(ControllerEvent::Scheduled);
    }

    fn fire(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        match self.state {
            ControllerState::Running(_) => {
                tracing::debug!("Run discarded: previous run still in flight");
                self.emit(ControllerEvent::Discarded);
            }
            ControllerState::Idle => {
                let task = Arc::clone(&self.task);
                let handle = tokio::spawn(async move { task.execute_run(pending.session).await });
                self.state = ControllerState::Running(handle);
                self.emit(ControllerEvent::Started);
            }
        }
    }

    fn complete(&mut self, joined: std::result::Result<Result<RunReport>, JoinError>) {
        self.state = ControllerState::Idle;

        match joined {
            Ok(Ok(report)) => {
                let emitted = report.output.len();
                self.reports.send_replace(Some(Arc::new(report)));
                self.emit(ControllerEvent::Completed { emitted });
            }
            Ok(Err(e)) => {
                tracing::error!(
                    "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                    e,
                    e.category(),
                    e.severity()
                );
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
                if e.is_batch_level() {
                    tracing::info!("Previous output kept");
                }
                self.emit(ControllerEvent::Failed {
                    message: e.user_friendly_message(),
                });
            }
            Err(join_error) => {
                tracing::error!("❌ Run task aborted: {}", join_error);
                self.emit(ControllerEvent::Failed {
                    message: join_error.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: ControllerEvent) {
        // 沒有訂閱者時忽略
        let _ = self.events.send(event);
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn wait_running(
    state: &mut ControllerState,
) -> std::result::Result<Result<RunReport>, JoinError> {
    match state {
        ControllerState::Running(handle) => handle.await,
        ControllerState::Idle => std::future::pending().await,
    }
}

/// Cloneable front end of a running [`ExecutionController`].
#[derive(Clone)]
pub struct ControllerHandle {
    requests: mpsc::UnboundedSender<Session>,
    reports: watch::Receiver<Option<Arc<RunReport>>>,
    events: broadcast::Sender<ControllerEvent>,
}

impl ControllerHandle {
    /// Asks for a run with this input/filter pair once edits go quiet.
    pub fn request(&self, session: Session) -> Result<()> {
        self.requests
            .send(session)
            .map_err(|_| LabError::ControllerStopped)
    }

    /// Report of the last successful run. Failed runs never replace it.
    pub fn latest_report(&self) -> Option<Arc<RunReport>> {
        self.reports.borrow().clone()
    }

    pub fn reports(&self) -> watch::Receiver<Option<Arc<RunReport>>> {
        self.reports.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }
}

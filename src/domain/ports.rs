use crate::domain::model::{CallbackOutcome, Record, Session};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    /// Returns `Ok(None)` when the file does not exist.
    fn read_file(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Removing a missing file is not an error.
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Runs a filter callback over a batch of records.
///
/// Implementations must return exactly one outcome per record, in input
/// order, or fail the whole call.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, records: &[Record], callback: &str) -> Result<Vec<CallbackOutcome>>;
}

pub trait SessionStore: Send + Sync {
    fn load(&self) -> impl std::future::Future<Output = Result<Option<Session>>> + Send;
    fn save(&self, session: &Session) -> impl std::future::Future<Output = Result<()>> + Send;
    fn clear(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}
